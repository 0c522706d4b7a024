use axum::{
    Extension, Json,
    extract::rejection::{PathRejection, QueryRejection},
    extract::{Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

use snugglr_types::api::{Claims, DeletedCount, Envelope, ModifiedCount, NotificationQuery, UnreadCount};

use crate::auth::AppState;
use crate::error::ApiResult;

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let page = state.engine.blocking(move |e| e.notifications(claims.sub, &query)).await?;
    Ok(Json(Envelope::ok(page)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let unread_count = state.engine.blocking(move |e| e.unread_count(claims.sub)).await?;
    Ok(Json(Envelope::ok(UnreadCount { unread_count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let notification = state
        .engine
        .blocking(move |e| e.mark_notification_read(id, claims.sub))
        .await?;
    Ok(Json(Envelope::with_message("Notification marked as read", notification)))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let modified_count = state
        .engine
        .blocking(move |e| e.mark_all_notifications_read(claims.sub))
        .await?;
    Ok(Json(Envelope::with_message(
        "All notifications marked as read",
        ModifiedCount { modified_count },
    )))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    state.engine.blocking(move |e| e.delete_notification(id, claims.sub)).await?;
    Ok(Json(Envelope::with_message("Notification deleted", serde_json::json!({}))))
}

pub async fn clear_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let deleted_count = state
        .engine
        .blocking(move |e| e.clear_read_notifications(claims.sub))
        .await?;
    Ok(Json(Envelope::with_message(
        "Read notifications cleared",
        DeletedCount { deleted_count },
    )))
}
