use std::sync::Arc;

use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use dareboard_core::Social;
use dareboard_gateway::dispatcher::Dispatcher;
use dareboard_types::api::Claims;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub social: Social,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

/// Mint a bearer token for `user_id`. Production tokens come from the auth
/// provider; this signs the same claims with the shared secret.
pub fn create_token(secret: &str, user_id: Uuid, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
