//! Discord OAuth login

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::auth::{create_session_cookie, random_token};
use super::pages;
use super::server::AppState;
use crate::config::DiscordConfig;
use crate::error::{PlayDateError, Result};
use crate::store::PlayDateStore;

/// Discord OAuth token response
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Discord user info from /users/@me
#[derive(Deserialize, Debug)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
}

/// Query parameters Discord sends back to the redirect URI
#[derive(Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub fn authorize_url(discord: &DiscordConfig, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=none",
        discord.auth_url,
        urlencoding::encode(&discord.client_id),
        urlencoding::encode(&discord.redirect_uri),
        urlencoding::encode(&discord.scopes),
        urlencoding::encode(state),
    )
}

pub async fn exchange_code(
    client: &reqwest::Client,
    discord: &DiscordConfig,
    code: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&discord.token_url)
        .form(&[
            ("client_id", discord.client_id.as_str()),
            ("client_secret", discord.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", discord.redirect_uri.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(PlayDateError::OAuth {
            message: format!("token exchange failed with status {}: {}", status, text),
        });
    }

    Ok(response.json().await?)
}

pub async fn fetch_user(
    client: &reqwest::Client,
    discord: &DiscordConfig,
    token: &TokenResponse,
) -> Result<DiscordUser> {
    let response = client
        .get(&discord.user_api_url)
        .header(
            "Authorization",
            format!("{} {}", token.token_type, token.access_token),
        )
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(PlayDateError::OAuth {
            message: format!("user info request failed with status {}: {}", status, text),
        });
    }

    Ok(response.json().await?)
}

/// GET /discord/login
pub async fn discord_login(State(state): State<AppState>) -> Response {
    if !state.discord.oauth_enabled() {
        warn!("Discord login requested but OAuth is not configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(pages::error_page("Discord login is not configured on this server.")),
        )
            .into_response();
    }

    let oauth_state = state.oauth_states.issue();
    info!("Redirecting user to Discord for authorization");
    Redirect::to(&authorize_url(&state.discord, &oauth_state)).into_response()
}

/// GET /discord/callback
pub async fn discord_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_default();
        warn!("Discord authorization error: {} - {}", error, description);
        return (
            StatusCode::BAD_REQUEST,
            Html(pages::error_page(&format!(
                "Discord authorization error: {} - {}",
                error, description
            ))),
        )
            .into_response();
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        error!("Authorization code missing from callback");
        return (
            StatusCode::BAD_REQUEST,
            Html(pages::error_page("Authorization code not found in callback")),
        )
            .into_response();
    };

    let state_valid = params
        .state
        .as_deref()
        .map(|s| state.oauth_states.consume(s))
        .unwrap_or(false);
    if !state_valid {
        warn!("Invalid or expired OAuth state on callback");
        return (
            StatusCode::UNAUTHORIZED,
            Html(pages::error_page("Invalid or expired login attempt. Please try again.")),
        )
            .into_response();
    }

    match complete_login(&state, &code).await {
        Ok(session_id) => (
            [(SET_COOKIE, create_session_cookie(&session_id))],
            Redirect::to("/"),
        )
            .into_response(),
        Err(e) => {
            error!("Discord OAuth callback failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Html(pages::error_page("Could not complete Discord login. Please try again.")),
            )
                .into_response()
        }
    }
}

/// Player names are unique and alphanumeric; Discord usernames are neither.
/// Strip the username down and append a counter until it is free (or already
/// belongs to this Discord account).
pub async fn unique_player_name(
    store: &dyn PlayDateStore,
    username: &str,
    discord_id: &str,
) -> Result<String> {
    let base: String = username.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let base = if base.is_empty() { "player".to_string() } else { base };

    let mut candidate = base.clone();
    let mut suffix = 1;
    while let Some(owner) = store.find_player_by_name(&candidate).await? {
        if owner.discord_id == discord_id {
            break;
        }
        suffix += 1;
        candidate = format!("{}{}", base, suffix);
    }
    Ok(candidate)
}

async fn complete_login(state: &AppState, code: &str) -> Result<String> {
    let token = exchange_code(&state.http_client, &state.discord, code).await?;
    let user = fetch_user(&state.http_client, &state.discord, &token).await?;
    info!("User authenticated: {} ({})", user.username, user.id);

    let session_id = random_token();
    let name = unique_player_name(state.store.as_ref(), &user.username, &user.id).await?;
    let player = state
        .store
        .upsert_oauth_player(&name, &user.id, &token.access_token, &session_id)
        .await?;
    info!("Player {} ({}) signed in with Discord", player.name, player.id);

    Ok(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_unique_player_name() {
        let store = MemoryStore::new();
        store.register_player("alice", "1", "c").await.unwrap();
        store.register_player("alice2", "2", "c").await.unwrap();

        assert_eq!(unique_player_name(&store, "alice", "9").await.unwrap(), "alice3");
        assert_eq!(unique_player_name(&store, "alice", "1").await.unwrap(), "alice");
        assert_eq!(unique_player_name(&store, "bob.smith_", "9").await.unwrap(), "bobsmith");
        assert_eq!(unique_player_name(&store, "__", "9").await.unwrap(), "player");
    }

    #[test]
    fn test_authorize_url() {
        let vars: HashMap<&str, &str> = [
            ("DISCORD_TOKEN", "t"),
            ("DISCORD_CHANNEL_ID", "1"),
            ("DISCORD_CLIENT_ID", "123"),
            ("DISCORD_SCOPES", "identify email"),
        ]
        .into_iter()
        .collect();
        let discord = DiscordConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        let url = authorize_url(&discord, "abc=");

        assert!(url.starts_with("https://discord.com/api/oauth2/authorize?client_id=123&"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fdiscord%2Fcallback"));
        assert!(url.contains("scope=identify%20email"));
        assert!(url.contains("state=abc%3D"));
        assert!(url.ends_with("&prompt=none"));
    }
}
