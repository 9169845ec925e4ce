use axum::{
    Json, debug_handler,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::broker::{Broker, RoomError, RoomUpdate};

use super::{not_found, reject};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_rooms(State(broker): State<Broker>) -> impl IntoResponse {
    let rooms = broker.list_public().await;
    Json(json!({ "rooms": rooms }))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room(
    State(broker): State<Broker>,
    Path(room_id): Path<String>,
) -> Response {
    match broker.summary(&room_id).await {
        Ok(summary) => Json(summary).into_response(),
        Err(RoomError::Forbidden) => reject(StatusCode::FORBIDDEN, "Room is private").into_response(),
        Err(_) => not_found(&room_id).into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateRoomQuery {
    user_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_public: Option<bool>,
    #[serde(default)]
    password: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn update_room(
    State(broker): State<Broker>,
    Path(room_id): Path<String>,
    body: Result<Json<UpdateRoomQuery>, JsonRejection>,
) -> Response {
    let Ok(Json(UpdateRoomQuery { user_id, name, is_public, password })) = body else {
        return reject(StatusCode::BAD_REQUEST, "Invalid request body").into_response();
    };
    if user_id.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Invalid request body").into_response();
    }

    let update = RoomUpdate { name, is_public, password };
    match broker.update(&room_id, &user_id, update).await {
        Ok(info) => Json(info).into_response(),
        Err(RoomError::NotFound) => not_found(&room_id).into_response(),
        Err(e @ RoomError::NotCreator) => reject(StatusCode::FORBIDDEN, e).into_response(),
        Err(e) => reject(StatusCode::BAD_REQUEST, e).into_response(),
    }
}
