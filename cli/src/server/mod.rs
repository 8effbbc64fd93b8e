pub mod nutrition;
pub mod users;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get},
};
use chrono::NaiveDate;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use fitplat_core::error::{AccountError, LookupError, RemoteError};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

// --- Error handling ---

#[derive(Debug)]
pub(crate) enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    TooManyRequests(String),
    BadGateway(String),
    GatewayTimeout(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            Self::Internal(err) => {
                tracing::error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        tracing::warn!(error = %err, "remote lookup failed");
        let message = err.to_string();
        match err {
            RemoteError::RateLimited => Self::TooManyRequests(message),
            RemoteError::Unavailable(_) | RemoteError::Malformed(_) => Self::BadGateway(message),
            RemoteError::Timeout | RemoteError::Network(_) => Self::GatewayTimeout(message),
        }
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::InvalidInput(msg) => Self::BadRequest(msg),
            LookupError::NotFound(msg) | LookupError::NoNutrition(msg) => Self::NotFound(msg),
            LookupError::Remote(remote) => remote.into(),
            LookupError::Store(err) => Self::Internal(err),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        let message = err.to_string();
        match err {
            AccountError::Invalid(msg) => Self::BadRequest(msg),
            AccountError::EmailTaken => Self::Conflict(message),
            AccountError::InvalidCredentials | AccountError::InvalidToken => {
                Self::Unauthorized(message)
            }
            AccountError::NotFound(_) => Self::NotFound(message),
            AccountError::Inactive => Self::Forbidden(message),
            AccountError::Store(err) => Self::Internal(err),
        }
    }
}

/// Run a synchronous service call on the blocking pool.
pub(crate) async fn blocking<T, E, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("blocking task failed")?
        .map_err(Into::into)
}

pub(crate) fn parse_date(date_str: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{date_str}'. Use YYYY-MM-DD")))
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

pub(crate) fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn health<S: Clone + Send + Sync + 'static>(service: &'static str) -> MethodRouter<S> {
    get(move || async move { Json(serde_json::json!({ "status": "UP", "service": service })) })
}

/// Layers shared by both services. `/health` is added here, outside any auth layer.
pub(crate) fn finish_router<S: Clone + Send + Sync + 'static>(
    router: Router<S>,
    service: &'static str,
    state: S,
) -> Router {
    router
        .route("/health", health(service))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

pub(crate) async fn serve(app: Router, bind: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("Failed to bind {bind}:{port}"))?;
    tracing::info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    pub(crate) async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_errors_map_to_gateway_statuses() {
        let status = |e: LookupError| ApiError::from(e).into_response().status();
        assert_eq!(
            status(RemoteError::RateLimited.into()),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status(RemoteError::Unavailable(503).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(RemoteError::Malformed("x".into()).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status(RemoteError::Timeout.into()), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status(RemoteError::Network("reset".into()).into()),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status(LookupError::InvalidInput("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(LookupError::NotFound("gone".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(LookupError::Store(anyhow::anyhow!("disk"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_account_errors_map_to_auth_statuses() {
        let status = |e: AccountError| ApiError::from(e).into_response().status();
        assert_eq!(status(AccountError::EmailTaken), StatusCode::CONFLICT);
        assert_eq!(
            status(AccountError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status(AccountError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AccountError::Inactive), StatusCode::FORBIDDEN);
        assert_eq!(status(AccountError::NotFound(3)), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert!(parse_date("15/01/2024").is_err());
    }
}
