use axum::{
    Json, debug_handler,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::broker::{Broker, NewRoom};

use super::reject;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewRoomQuery {
    #[serde(default)]
    is_public: bool,
    #[serde(default)]
    password: Option<String>,
    user_id: String,
    #[serde(default)]
    name: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_room(
    State(broker): State<Broker>,
    body: Result<Json<NewRoomQuery>, JsonRejection>,
) -> Response {
    let Ok(Json(NewRoomQuery { is_public, password, user_id, name })) = body else {
        return reject(StatusCode::BAD_REQUEST, "Invalid request body").into_response();
    };
    if user_id.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Invalid request body").into_response();
    }

    let new = NewRoom {
        room_id: None,
        name: name.unwrap_or_default(),
        creator: user_id,
        is_public,
        password: password.filter(|p| !p.is_empty()),
    };

    match broker.create(new).await {
        Ok(info) => (StatusCode::CREATED, Json(info)).into_response(),
        Err(e) => reject(StatusCode::CONFLICT, e).into_response(),
    }
}
