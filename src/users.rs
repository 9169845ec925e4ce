use axum::{Json, Router, debug_handler, extract::State, http::StatusCode, routing::post};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/users", post(new_user))
}

/// Issues a fresh opaque user id and records it.
pub async fn create_user(db_pool: &SqlitePool) -> Result<String, sqlx::Error> {
    let user_id = Uuid::now_v7().to_string();
    sqlx::query("INSERT INTO users (id) VALUES (?)")
        .bind(&user_id)
        .execute(db_pool)
        .await?;

    tracing::info!(%user_id, "issued user id");
    Ok(user_id)
}

#[debug_handler(state = AppState)]
async fn new_user(State(db_pool): State<SqlitePool>) -> AppResult<(StatusCode, Json<Value>)> {
    let user_id = create_user(&db_pool).await?;
    Ok((StatusCode::CREATED, Json(json!({ "userId": user_id }))))
}
