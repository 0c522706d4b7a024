use axum::{Extension, Json, extract::State, extract::rejection::JsonRejection, response::IntoResponse};
use tracing::info;

use snugglr_types::api::{CandidateList, Claims, Envelope, MatchList, SwipeRequest};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn swipe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<SwipeRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let target = req
        .target_user_id
        .ok_or_else(|| ApiError::validation("Target user ID is required"))?;
    let action = req
        .action
        .ok_or_else(|| ApiError::validation("Action must be 'like' or 'pass'"))?;

    let actor = claims.sub;
    let res = state.engine.blocking(move |e| e.swipe(actor, target, action)).await?;

    if res.matched {
        info!("{} ({}) swipe on {} -> matched", claims.username, actor, target);
        Ok(Json(Envelope::with_message("It's a match!", res)))
    } else {
        Ok(Json(Envelope::with_message("Swipe recorded", res)))
    }
}

pub async fn matches(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let matches = state.engine.blocking(move |e| e.matches(claims.sub)).await?;
    Ok(Json(Envelope::ok(MatchList { matches })))
}

pub async fn potential_matches(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let users = state.engine.blocking(move |e| e.candidates(claims.sub)).await?;
    Ok(Json(Envelope::ok(CandidateList { users })))
}
