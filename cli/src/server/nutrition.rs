//! REST surface of the nutrition service: food lookup, catalogue and meal diary.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::Local;
use serde::Deserialize;

use fitplat_core::models::{
    ClearSummary, DailyNutritionSummary, DiaryEntry, FoodRecord, FoodResult, FoodSearchResponse,
    FoodWithNutrition, ImportReport, LogMeal, MealType, NewFoodRecord, NewNutritionFacts,
    NutritionFacts, PortionNutrition,
};
use fitplat_core::service::{FoodLookupProvider, NutritionService};

use super::{ApiError, ErrorResponse, bearer_token, blocking, finish_router, parse_date};

const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Clone)]
pub struct NutritionState {
    service: Arc<NutritionService>,
    provider: Arc<dyn FoodLookupProvider>,
    api_key: Option<String>,
}

impl NutritionState {
    pub fn new(
        service: NutritionService,
        provider: Arc<dyn FoodLookupProvider>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            service: Arc::new(service),
            provider,
            api_key,
        }
    }
}

// --- Request types ---

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct CreateFoodRequest {
    #[serde(flatten)]
    food: NewFoodRecord,
    nutrition: Option<NewNutritionFacts>,
}

#[derive(Deserialize)]
struct GramsQuery {
    grams: f64,
}

#[derive(Deserialize)]
struct UserQuery {
    #[serde(alias = "userId")]
    user_id: i64,
}

#[derive(Deserialize)]
struct MealTypeQuery {
    #[serde(alias = "userId")]
    user_id: i64,
    date: Option<String>,
}

#[derive(Deserialize)]
struct WeekQuery {
    #[serde(alias = "userId")]
    user_id: i64,
    #[serde(alias = "startDate")]
    start_date: Option<String>,
}

// --- Middleware ---

async fn require_api_key(
    State(state): State<NutritionState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = bearer_token(&request).is_some_and(|token| token == expected_key);
        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

// --- Lookup handlers ---

async fn search_foods(
    State(state): State<NutritionState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<FoodSearchResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let response = blocking(move || {
        state
            .service
            .search_foods(state.provider.as_ref(), &params.q, limit)
    })
    .await?;
    Ok(Json(response))
}

async fn get_food_by_barcode(
    State(state): State<NutritionState>,
    Path(barcode): Path<String>,
) -> Result<Json<FoodResult>, ApiError> {
    let food =
        blocking(move || state.service.get_by_barcode(state.provider.as_ref(), &barcode)).await?;
    Ok(Json(food))
}

async fn cache_food(
    State(state): State<NutritionState>,
    Path(barcode): Path<String>,
) -> Result<(StatusCode, Json<FoodResult>), ApiError> {
    let food =
        blocking(move || state.service.cache_from_remote(state.provider.as_ref(), &barcode))
            .await?;
    Ok((StatusCode::CREATED, Json(food)))
}

// --- Catalogue handlers ---

async fn list_foods(
    State(state): State<NutritionState>,
) -> Result<Json<Vec<FoodWithNutrition>>, ApiError> {
    Ok(Json(blocking(move || state.service.list_foods()).await?))
}

async fn popular_foods(
    State(state): State<NutritionState>,
) -> Result<Json<Vec<FoodWithNutrition>>, ApiError> {
    Ok(Json(blocking(move || state.service.popular_foods()).await?))
}

async fn create_food(
    State(state): State<NutritionState>,
    Json(req): Json<CreateFoodRequest>,
) -> Result<(StatusCode, Json<FoodWithNutrition>), ApiError> {
    let food =
        blocking(move || state.service.create_food(&req.food, req.nutrition.as_ref())).await?;
    Ok((StatusCode::CREATED, Json(food)))
}

async fn get_food(
    State(state): State<NutritionState>,
    Path(id): Path<i64>,
) -> Result<Json<FoodRecord>, ApiError> {
    Ok(Json(blocking(move || state.service.get_food(id)).await?))
}

async fn get_food_complete(
    State(state): State<NutritionState>,
    Path(id): Path<i64>,
) -> Result<Json<FoodWithNutrition>, ApiError> {
    Ok(Json(blocking(move || state.service.get_food_complete(id)).await?))
}

async fn save_nutrition(
    State(state): State<NutritionState>,
    Path(food_id): Path<i64>,
    Json(req): Json<NewNutritionFacts>,
) -> Result<Json<NutritionFacts>, ApiError> {
    let facts = blocking(move || state.service.save_nutrition(food_id, &req)).await?;
    Ok(Json(facts))
}

async fn get_nutrition(
    State(state): State<NutritionState>,
    Path(food_id): Path<i64>,
) -> Result<Json<NutritionFacts>, ApiError> {
    Ok(Json(blocking(move || state.service.get_nutrition(food_id)).await?))
}

async fn calculate_nutrition(
    State(state): State<NutritionState>,
    Path(food_id): Path<i64>,
    Query(params): Query<GramsQuery>,
) -> Result<Json<PortionNutrition>, ApiError> {
    let portion =
        blocking(move || state.service.calculate_nutrition(food_id, params.grams)).await?;
    Ok(Json(portion))
}

async fn clear_all(State(state): State<NutritionState>) -> Result<Json<ClearSummary>, ApiError> {
    Ok(Json(blocking(move || state.service.clear_all()).await?))
}

async fn import_common(
    State(state): State<NutritionState>,
) -> Result<Json<ImportReport>, ApiError> {
    Ok(Json(blocking(move || state.service.import_common_foods()).await?))
}

async fn import_quick_start(
    State(state): State<NutritionState>,
) -> Result<Json<ImportReport>, ApiError> {
    let report =
        blocking(move || state.service.import_quick_start(state.provider.as_ref())).await?;
    Ok(Json(report))
}

// --- Meal diary handlers ---

async fn log_meal(
    State(state): State<NutritionState>,
    Json(req): Json<LogMeal>,
) -> Result<(StatusCode, Json<DiaryEntry>), ApiError> {
    let entry = blocking(move || state.service.log_meal(&req)).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn meals_today(
    State(state): State<NutritionState>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<DiaryEntry>>, ApiError> {
    let today = Local::now().date_naive();
    let entries = blocking(move || state.service.meals_for_date(params.user_id, today)).await?;
    Ok(Json(entries))
}

async fn meals_for_date(
    State(state): State<NutritionState>,
    Path(date): Path<String>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<DiaryEntry>>, ApiError> {
    let date = parse_date(&date)?;
    let entries = blocking(move || state.service.meals_for_date(params.user_id, date)).await?;
    Ok(Json(entries))
}

async fn meals_for_type(
    State(state): State<NutritionState>,
    Path(meal_type): Path<String>,
    Query(params): Query<MealTypeQuery>,
) -> Result<Json<Vec<DiaryEntry>>, ApiError> {
    let meal_type: MealType = meal_type
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let date = match params.date.as_deref() {
        Some(d) => parse_date(d)?,
        None => Local::now().date_naive(),
    };
    let entries =
        blocking(move || state.service.meals_for_type(params.user_id, date, meal_type)).await?;
    Ok(Json(entries))
}

async fn meals_for_week(
    State(state): State<NutritionState>,
    Query(params): Query<WeekQuery>,
) -> Result<Json<Vec<DiaryEntry>>, ApiError> {
    let start = params.start_date.as_deref().map(parse_date).transpose()?;
    let entries = blocking(move || state.service.meals_for_week(params.user_id, start)).await?;
    Ok(Json(entries))
}

async fn summary_today(
    State(state): State<NutritionState>,
    Query(params): Query<UserQuery>,
) -> Result<Json<DailyNutritionSummary>, ApiError> {
    let today = Local::now().date_naive();
    let summary = blocking(move || state.service.daily_summary(params.user_id, today)).await?;
    Ok(Json(summary))
}

async fn summary_for_date(
    State(state): State<NutritionState>,
    Path(date): Path<String>,
    Query(params): Query<UserQuery>,
) -> Result<Json<DailyNutritionSummary>, ApiError> {
    let date = parse_date(&date)?;
    let summary = blocking(move || state.service.daily_summary(params.user_id, date)).await?;
    Ok(Json(summary))
}

async fn delete_meal(
    State(state): State<NutritionState>,
    Path(entry_id): Path<i64>,
    Query(params): Query<UserQuery>,
) -> Result<StatusCode, ApiError> {
    let user_id = params.user_id;
    if blocking(move || state.service.delete_meal(entry_id, user_id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "Meal entry {entry_id} not found for user {user_id}"
        )))
    }
}

pub fn build_router(state: NutritionState) -> Router {
    let router = Router::new()
        .route("/api/foods", get(list_foods).post(create_food))
        .route("/api/foods/search", get(search_foods))
        .route("/api/foods/popular", get(popular_foods))
        .route("/api/foods/barcode/{barcode}", get(get_food_by_barcode))
        .route("/api/foods/cache/{barcode}", post(cache_food))
        .route("/api/foods/{id}", get(get_food))
        .route("/api/foods/{id}/complete", get(get_food_complete))
        .route(
            "/api/nutrition/foods/{food_id}",
            get(get_nutrition).post(save_nutrition),
        )
        .route(
            "/api/nutrition/foods/{food_id}/calculate",
            get(calculate_nutrition),
        )
        .route("/api/nutrition/clear-all", delete(clear_all))
        .route("/api/nutrition/import/common", post(import_common))
        .route("/api/nutrition/import/quick-start", post(import_quick_start))
        .route("/api/meals/log", post(log_meal))
        .route("/api/meals/today", get(meals_today))
        .route("/api/meals/week", get(meals_for_week))
        .route("/api/meals/date/{date}", get(meals_for_date))
        .route("/api/meals/type/{meal_type}", get(meals_for_type))
        .route("/api/meals/summary/today", get(summary_today))
        .route("/api/meals/summary/{date}", get(summary_for_date))
        .route("/api/meals/{entry_id}", delete(delete_meal))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));
    finish_router(router, "nutrition", state)
}

pub async fn start_server(
    state: NutritionState,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    if let Some(ref key) = state.api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && state.api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let app = build_router(state);
    super::serve(app, bind, port).await
}
