pub mod broker;
pub mod config;
pub mod db;
pub mod ids;
pub mod protocol;
pub mod rooms;
pub mod users;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::FromRef,
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;

use broker::Broker;
use config::Config;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub broker: Broker,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config) -> Self {
        Self {
            db_pool,
            broker: Broker::new(),
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> anyhow::Result<Router> {
    let origin: HeaderValue = state
        .config
        .cors_origin
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid CORS_ORIGIN {:?}: {e}", state.config.cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    Ok(Router::new()
        .route("/health", get(health))
        .merge(rooms::router())
        .merge(users::router())
        .fallback(not_found)
        .with_state(state)
        .layer(cors))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not Found", "path": uri.path() })),
    )
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(sqlx::Error);

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    #[tokio::test]
    async fn database_errors_render_as_json_500() {
        let response = AppError::from(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }
}
