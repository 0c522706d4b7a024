use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{info, warn};
use uuid::Uuid;

use snugglr_db::models::NewUser;
use snugglr_engine::{Engine, EngineError};
use snugglr_types::api::{AuthResponse, Claims, Envelope, LoginRequest, RegisterRequest};
use snugglr_types::models::Profile;

use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engine: Engine,
    pub jwt_secret: String,
    pub token_days: i64,
}

const MIN_PASSWORD_LEN: usize = 6;
const USERNAME_ATTEMPTS: usize = 20;

const ADJECTIVES: &[&str] = &[
    "Mystic", "Cosmic", "Silent", "Velvet", "Lunar", "Amber", "Hidden", "Golden", "Misty", "Crimson",
    "Gentle", "Wild", "Secret", "Dreamy", "Starry", "Shy",
];

const NOUNS: &[&str] = &[
    "Fox", "Owl", "Comet", "Willow", "Panda", "Falcon", "Otter", "Maple", "Raven", "Koala", "Nova",
    "Sparrow", "Tiger", "Lotus", "Moth", "Heron",
];

/// Adjective + noun + 2-4 digits, e.g. `VelvetOtter482`.
fn random_username() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Mystic");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("Fox");
    let digits: u32 = rng.random_range(10..=9999);
    format!("{}{}{}", adjective, noun, digits)
}

fn required(field: Option<String>, message: &str) -> ApiResult<String> {
    field
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(message))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;

    let name = required(req.name, "Name is required")?;
    let email = required(req.email, "Email is required")?.to_lowercase();
    let community = required(req.community, "Community is required")?;
    let password = req.password.unwrap_or_default();
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if !email.contains('@') {
        return Err(ApiError::validation("Email is invalid"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let gender = req.gender.map(|g| g.as_str().to_string());
    let created = state
        .engine
        .blocking(move |engine| {
            let db = engine.db();
            if db.get_user_by_email(&email)?.is_some() {
                return Ok(None);
            }

            let mut username = random_username();
            let mut attempts = 1;
            while db.username_taken(&username)? {
                if attempts >= USERNAME_ATTEMPTS {
                    return Err(EngineError::Internal(anyhow::anyhow!("could not generate a free username")));
                }
                username = random_username();
                attempts += 1;
            }

            let id = Uuid::new_v4();
            db.create_user(&NewUser {
                id: id.to_string(),
                name,
                username,
                email,
                password_hash,
                gender,
                community,
            })?;
            engine.profile(id).map(Some)
        })
        .await?;

    let user = created.ok_or_else(|| ApiError::Conflict("User already exists".into()))?;
    info!("Registered {} ({})", user.username, user.id);

    let token = create_token(&state, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message("User registered successfully", AuthResponse { user, token })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let email = required(req.email, "Email and password are required")?.to_lowercase();
    let password = req.password.unwrap_or_default();

    let user = state
        .engine
        .blocking(move |engine| {
            let Some(row) = engine.db().get_user_by_email(&email)? else {
                return Ok(None);
            };

            let Ok(parsed_hash) = PasswordHash::new(&row.password) else {
                warn!("Stored password hash for {} is unreadable", row.id);
                return Ok(None);
            };
            if Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_err() {
                return Ok(None);
            }

            let id = row.id.parse::<Uuid>().map_err(|e| anyhow::anyhow!("corrupt user id: {}", e))?;
            engine.profile(id).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let token = create_token(&state, &user)?;
    Ok(Json(Envelope::with_message("Login successful", AuthResponse { user, token })))
}

pub async fn me(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<impl IntoResponse> {
    let profile = state.engine.blocking(move |e| e.profile(claims.sub)).await?;
    Ok(Json(Envelope::ok(profile)))
}

fn create_token(state: &AppStateInner, user: &Profile) -> ApiResult<String> {
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        exp: (chrono::Utc::now() + chrono::Duration::days(state.token_days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(anyhow::Error::from)?;

    Ok(token)
}
