//! Sessions, cookies and OAuth state tracking for the web UI

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use base64::Engine;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use super::server::AppState;
use crate::models::Player;

pub const SESSION_COOKIE: &str = "playdate";
const SESSION_MAX_AGE_SECS: u64 = 2_000_000;
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(600);

/// 16 random bytes, URL-safe base64
pub fn random_token() -> String {
    base64::engine::general_purpose::URL_SAFE.encode(uuid::Uuid::new_v4().as_bytes())
}

/// Pending OAuth `state` values. Each is valid once and only until its TTL
/// runs out.
pub struct OAuthStateStore {
    states: DashMap<String, Instant>,
    ttl: Duration,
}

impl OAuthStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: DashMap::new(),
            ttl,
        }
    }

    /// Create and remember a fresh state
    pub fn issue(&self) -> String {
        self.purge_expired();
        let state = random_token();
        self.states.insert(state.clone(), Instant::now() + self.ttl);
        state
    }

    /// Forget `state`, returning whether it was known and unexpired
    pub fn consume(&self, state: &str) -> bool {
        match self.states.remove(state) {
            Some((_, expires_at)) => Instant::now() < expires_at,
            None => false,
        }
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.states.retain(|_, expires_at| *expires_at > now);
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_TTL)
    }
}

/// Extract the session id from the request cookies
pub fn get_session_token(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(&prefix)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
}

pub fn create_session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, SESSION_MAX_AGE_SECS
    )
}

/// Clears the session cookie
pub fn create_logout_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// The player behind the session cookie. Handlers taking this never run for
/// anonymous requests; those are sent back to `/`.
#[derive(Debug, Clone)]
pub struct SignedIn(pub Player);

#[async_trait]
impl FromRequestParts<AppState> for SignedIn {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = get_session_token(&parts.headers) else {
            debug!("No session cookie on {}", parts.uri);
            return Err(Redirect::to("/").into_response());
        };

        match state.store.find_player_by_session(&token).await {
            Ok(Some(player)) => Ok(SignedIn(player)),
            Ok(None) => {
                debug!("Unknown session on {}", parts.uri);
                Err((
                    [(header::SET_COOKIE, create_logout_cookie())],
                    Redirect::to("/"),
                )
                    .into_response())
            }
            Err(e) => {
                error!("Failed to resolve session: {}", e);
                Err(Redirect::to("/").into_response())
            }
        }
    }
}
