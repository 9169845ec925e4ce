mod room;
mod msg;
mod new;
mod ws;

use axum::{Json, http::StatusCode, routing::get, Router};
use serde_json::{Value, json};

use crate::{AppState, ids};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/rooms", get(room::list_rooms).post(new::new_room))
        .route("/api/rooms/{id}", get(room::room).post(room::update_room))
        .route("/ws", get(ws::room_ws))
}

/// 404 body that invites the client to create the room instead.
pub(crate) fn not_found(room_id: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Room not found",
            "createRoom": true,
            "suggestedName": ids::generate_display_name(),
            "roomId": room_id,
        })),
    )
}

pub(crate) fn reject(status: StatusCode, error: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": error.to_string() })))
}
