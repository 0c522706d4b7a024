use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};

use snugglr_gateway::verify_token;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate the JWT from the Authorization header. The claims are
/// stored as a request extension for the handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.map_err(|_| ApiError::unauthorized("Not authorized, no token"))?;

    let claims = verify_token(bearer.token(), &state.jwt_secret)
        .ok_or_else(|| ApiError::unauthorized("Not authorized, token failed"))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
