pub mod config;

use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use snugglr_api::auth::{self, AppState};
use snugglr_api::middleware::require_auth;
use snugglr_api::{chat, matches, notifications};
use snugglr_gateway::connection;
use snugglr_gateway::dispatcher::Dispatcher;
use snugglr_gateway::verify_token;

#[derive(Clone)]
struct ServerState {
    app: AppState,
    dispatcher: Dispatcher,
}

/// Assemble the REST routes, the gateway upgrade and the fallbacks.
pub fn build_router(app_state: AppState, dispatcher: Dispatcher) -> Router {
    let public_routes = Router::new()
        .route("/", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/users/potential-matches", get(matches::potential_matches))
        .route("/swipe", post(matches::swipe))
        .route("/matches", get(matches::matches))
        .route("/chat", get(chat::list_chats))
        .route("/chat/guess", post(chat::submit_guess))
        .route("/chat/{chat_id}/messages", get(chat::get_messages))
        .route("/chat/{chat_id}/message", post(chat::send_message))
        .route("/chat/{chat_id}/reveal-status", get(chat::reveal_status))
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", patch(notifications::mark_all_read))
        .route("/notifications/clear-read", delete(notifications::clear_read))
        .route("/notifications/{id}/read", patch(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(ServerState { app: app_state, dispatcher });

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Snugglr API is running!",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}

#[derive(Debug, Deserialize)]
struct GatewayParams {
    token: Option<String>,
}

/// `?token=` authenticates at upgrade time; without it the client must send
/// `identify` as its first frame.
async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(params): Query<GatewayParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let engine = state.app.engine.clone();

    match params.token {
        Some(token) => {
            let Some(claims) = verify_token(&token, &state.app.jwt_secret) else {
                warn!("Gateway upgrade rejected: invalid token");
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "success": false, "message": "Authentication error" })),
                )
                    .into_response();
            };
            ws.on_upgrade(move |socket| {
                connection::handle_connection_authenticated(
                    socket,
                    state.dispatcher,
                    engine,
                    claims.sub,
                    claims.username,
                )
            })
        }
        None => {
            let jwt_secret = state.app.jwt_secret.clone();
            ws.on_upgrade(move |socket| connection::handle_connection(socket, state.dispatcher, engine, jwt_secret))
        }
    }
}
