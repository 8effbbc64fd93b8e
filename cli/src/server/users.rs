//! REST surface of the account service.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use fitplat_core::auth::Claims;
use fitplat_core::models::{FitnessSummary, ProfileOptions, ProfileUpdate, User};
use fitplat_core::users::{AccessToken, AuthTokens, Registration, UserService};

use super::{ApiError, bearer_token, blocking, finish_router};

#[derive(Clone)]
pub struct UserState {
    service: Arc<UserService>,
}

impl UserState {
    pub fn new(service: UserService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct BasicRegistration {
    username: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Deserialize)]
struct DeleteAccountRequest {
    password: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct ValidateResponse {
    valid: bool,
    #[serde(flatten)]
    claims: Claims,
}

// --- Middleware ---

/// Verifies the bearer access token and stores its [`Claims`] for the handler.
async fn require_token(
    State(state): State<UserState>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = match bearer_token(&request).map(|t| state.service.validate_token(t)) {
        Some(Ok(claims)) => claims,
        Some(Err(err)) => return ApiError::from(err).into_response(),
        None => {
            return ApiError::Unauthorized("Missing bearer token".to_string()).into_response();
        }
    };
    request.extensions_mut().insert(claims);
    next.run(request).await
}

fn authorize(claims: &Claims, user_id: i64) -> Result<(), ApiError> {
    if claims.user_id == user_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Token does not grant access to this user".to_string(),
        ))
    }
}

// --- Auth handlers ---

async fn register(
    State(state): State<UserState>,
    Json(req): Json<BasicRegistration>,
) -> Result<(StatusCode, Json<AuthTokens>), ApiError> {
    let reg = Registration {
        username: req.username,
        email: req.email,
        password: req.password,
        profile: ProfileUpdate::default(),
    };
    let tokens = blocking(move || state.service.register(&reg)).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

async fn register_full(
    State(state): State<UserState>,
    Json(reg): Json<Registration>,
) -> Result<(StatusCode, Json<AuthTokens>), ApiError> {
    let tokens = blocking(move || state.service.register(&reg)).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

async fn login(
    State(state): State<UserState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthTokens>, ApiError> {
    let tokens = blocking(move || state.service.login(&req.email, &req.password)).await?;
    Ok(Json(tokens))
}

async fn refresh(
    State(state): State<UserState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AccessToken>, ApiError> {
    let token = blocking(move || state.service.refresh(&req.refresh_token)).await?;
    Ok(Json(token))
}

// Tokens are stateless; clients discard them.
async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Logged out successfully",
    })
}

async fn validate(Extension(claims): Extension<Claims>) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        valid: true,
        claims,
    })
}

// --- Profile handlers ---

async fn options(State(state): State<UserState>) -> Json<ProfileOptions> {
    Json(state.service.options())
}

async fn get_profile(
    State(state): State<UserState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    authorize(&claims, user_id)?;
    Ok(Json(blocking(move || state.service.get_profile(user_id)).await?))
}

async fn update_profile(
    State(state): State<UserState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    authorize(&claims, user_id)?;
    let user = blocking(move || state.service.update_profile(user_id, &update)).await?;
    Ok(Json(user))
}

async fn fitness_summary(
    State(state): State<UserState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<Json<FitnessSummary>, ApiError> {
    authorize(&claims, user_id)?;
    Ok(Json(blocking(move || state.service.fitness_summary(user_id)).await?))
}

async fn change_password(
    State(state): State<UserState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    authorize(&claims, user_id)?;
    blocking(move || {
        state
            .service
            .change_password(user_id, &req.current_password, &req.new_password)
    })
    .await?;
    Ok(Json(MessageResponse {
        message: "Password updated successfully",
    }))
}

async fn delete_account(
    State(state): State<UserState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
    Json(req): Json<DeleteAccountRequest>,
) -> Result<StatusCode, ApiError> {
    authorize(&claims, user_id)?;
    blocking(move || state.service.delete_account(user_id, &req.password)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn build_router(state: UserState) -> Router {
    let protected = Router::new()
        .route("/api/auth/validate", post(validate))
        .route(
            "/api/users/{user_id}",
            get(get_profile).put(update_profile).delete(delete_account),
        )
        .route("/api/users/{user_id}/password", put(change_password))
        .route("/api/users/{user_id}/fitness-summary", get(fitness_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    let router = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/register/full", post(register_full))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/users/options", get(options))
        .merge(protected);
    finish_router(router, "users", state)
}

pub async fn start_server(state: UserState, port: u16, bind: &str) -> anyhow::Result<()> {
    let app = build_router(state);
    super::serve(app, bind, port).await
}
