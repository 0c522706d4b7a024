use axum::{
    Extension, Json,
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use snugglr_types::api::{ChatList, Claims, Envelope, GuessRequest, SendMessageRequest};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn list_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chats = state.engine.blocking(move |e| e.chats(claims.sub)).await?;
    Ok(Json(Envelope::ok(ChatList { chats })))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    chat_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(chat_id) = chat_id?;
    let list = state.engine.blocking(move |e| e.messages(chat_id, claims.sub)).await?;
    Ok(Json(Envelope::ok(list)))
}

/// REST twin of the socket `new_message` command; same engine path, same
/// room broadcast and notification.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    chat_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(chat_id) = chat_id?;
    let Json(req) = payload?;
    let text = req.text.unwrap_or_default();

    let message = state
        .engine
        .blocking(move |e| e.send_message(chat_id, claims.sub, &text))
        .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(message))))
}

pub async fn submit_guess(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<GuessRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let (Some(chat_id), Some(guess)) = (req.chat_id, req.guess) else {
        return Err(ApiError::validation("Chat ID and guess are required"));
    };

    let res = state
        .engine
        .blocking(move |e| e.submit_guess(chat_id, claims.sub, &guess))
        .await?;

    let message = if res.revealed {
        "Both guesses correct! Identities revealed!"
    } else if res.both_guessed {
        "At least one guess is incorrect"
    } else {
        "Guess submitted. Waiting for the other user."
    };
    Ok(Json(Envelope::with_message(message, res)))
}

pub async fn reveal_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    chat_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(chat_id) = chat_id?;
    let status = state.engine.blocking(move |e| e.reveal_status(chat_id, claims.sub)).await?;
    Ok(Json(Envelope::ok(status)))
}
