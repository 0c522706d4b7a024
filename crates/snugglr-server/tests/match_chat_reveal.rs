use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use snugglr_api::auth::AppStateInner;
use snugglr_db::Database;
use snugglr_engine::{Engine, Outbox};
use snugglr_gateway::dispatcher::Dispatcher;
use snugglr_server::build_router;

fn app() -> Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let (outbox, outbox_rx) = Outbox::new();
    let dispatcher = Dispatcher::new();
    tokio::spawn(dispatcher.clone().run_outbox(outbox_rx));

    let state = Arc::new(AppStateInner {
        engine: Engine::new(db, outbox),
        jwt_secret: "test-secret".into(),
        token_days: 1,
    });
    build_router(state, dispatcher)
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

struct Account {
    id: String,
    token: String,
}

async fn register(app: &Router, name: &str, gender: &str) -> Account {
    let body = json!({
        "name": name,
        "email": format!("{}@campus.edu", name.to_lowercase()),
        "password": "hunter22",
        "community": "campus",
        "gender": gender,
    });
    let (status, json) = call(app, "POST", "/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", json);
    Account {
        id: json["data"]["user"]["id"].as_str().unwrap().to_string(),
        token: json["data"]["token"].as_str().unwrap().to_string(),
    }
}

#[tokio::test]
async fn test_match_chat_reveal_over_rest() {
    let app = app();
    let alex = register(&app, "Alex", "male").await;
    let sam = register(&app, "Sam", "female").await;
    let kim = register(&app, "Kim", "female").await;

    // Sam shows up in Alex's feed under an anonymous handle
    let (status, json) = call(&app, "GET", "/users/potential-matches", Some(&alex.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = json["data"]["users"].as_array().unwrap();
    let sam_card = users.iter().find(|u| u["id"] == sam.id.as_str()).unwrap();
    assert!(sam_card.get("name").is_none());

    let (_, json) = call(
        &app,
        "POST",
        "/swipe",
        Some(&alex.token),
        Some(json!({ "targetUserId": sam.id, "action": "like" })),
    )
    .await;
    assert_eq!(json["data"]["matched"], false);

    let (status, json) = call(
        &app,
        "POST",
        "/swipe",
        Some(&sam.token),
        Some(json!({ "targetUserId": alex.id, "action": "like" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["matched"], true);
    let chat_id = json["data"]["chatId"].as_str().unwrap().to_string();

    for account in [&alex, &sam] {
        let (_, json) = call(&app, "GET", "/notifications", Some(&account.token), None).await;
        assert_eq!(json["data"]["total"], 1);
        assert_eq!(json["data"]["notifications"][0]["type"], "new_match");
    }

    let (_, json) = call(&app, "GET", "/matches", Some(&alex.token), None).await;
    assert_eq!(json["data"]["matches"].as_array().unwrap().len(), 1);

    // Outsiders cannot touch the chat
    let (status, json) = call(
        &app,
        "POST",
        "/chat/guess",
        Some(&kim.token),
        Some(json!({ "chatId": chat_id, "guess": "Alex" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["success"], false);

    let (status, json) = call(
        &app,
        "POST",
        &format!("/chat/{}/message", chat_id),
        Some(&alex.token),
        Some(json!({ "text": "  hey there " })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["text"], "hey there");

    let (_, json) = call(
        &app,
        "POST",
        "/chat/guess",
        Some(&alex.token),
        Some(json!({ "chatId": chat_id, "guess": "sam" })),
    )
    .await;
    assert_eq!(json["data"], json!({ "guessSubmitted": true, "bothGuessed": false, "revealed": false }));

    let (_, json) = call(&app, "GET", &format!("/chat/{}/reveal-status", chat_id), Some(&sam.token), None).await;
    assert_eq!(json["data"], json!({ "revealed": false, "users": null }));

    let (_, json) = call(
        &app,
        "POST",
        "/chat/guess",
        Some(&sam.token),
        Some(json!({ "chatId": chat_id, "guess": "Alex " })),
    )
    .await;
    assert_eq!(json["data"], json!({ "guessSubmitted": true, "bothGuessed": true, "revealed": true }));

    let (_, json) = call(&app, "GET", &format!("/chat/{}/reveal-status", chat_id), Some(&alex.token), None).await;
    assert_eq!(json["data"]["revealed"], true);
    let mut names: Vec<_> = json["data"]["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, ["Alex", "Sam"]);

    // Further guesses are rejected and the chat stays revealed
    let (status, _) = call(
        &app,
        "POST",
        "/chat/guess",
        Some(&alex.token),
        Some(json!({ "chatId": chat_id, "guess": "nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = call(&app, "GET", "/notifications/unread-count", Some(&sam.token), None).await;
    // new_match, new_message, identity_revealed
    assert_eq!(json["data"]["unreadCount"], 3);
}

#[tokio::test]
async fn test_auth_and_fallbacks() {
    let app = app();

    let (status, json) = call(&app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Snugglr API is running!");

    let (status, json) = call(&app, "GET", "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({ "success": false, "message": "Route not found" }));

    let (status, json) = call(&app, "GET", "/matches", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (status, _) = call(&app, "GET", "/matches", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let alex = register(&app, "Alex", "male").await;
    let (status, json) = call(&app, "GET", "/auth/me", Some(&alex.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Alex");

    // Same email twice
    let body = json!({ "name": "Alex", "email": "ALEX@campus.edu", "password": "hunter22", "community": "campus" });
    let (status, _) = call(&app, "POST", "/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alex@campus.edu", "password": "wrong-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Invalid credentials");

    let (status, json) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alex@campus.edu", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["id"], alex.id.as_str());

    // Missing fields surface as validation errors
    let (status, json) = call(&app, "POST", "/swipe", Some(&alex.token), Some(json!({ "action": "like" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Target user ID is required");

    let (status, _) = call(
        &app,
        "POST",
        "/swipe",
        Some(&alex.token),
        Some(json!({ "targetUserId": alex.id, "action": "like" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
