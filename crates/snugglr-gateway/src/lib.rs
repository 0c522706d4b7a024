pub mod connection;
pub mod dispatcher;

use jsonwebtoken::{DecodingKey, Validation, decode};

use snugglr_types::api::Claims;

/// Validate a bearer token. Shared by the REST middleware and the gateway handshake.
pub fn verify_token(token: &str, jwt_secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}
