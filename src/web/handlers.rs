//! Page, account and playdate handlers

use axum::{
    extract::{Path, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::auth::{
    create_logout_cookie, create_session_cookie, get_session_token, random_token, SignedIn,
};
use super::pages::{self, FormErrors};
use super::server::AppState;
use crate::attendance::{record_vote, seed_reactions, Attendance, VoteContext};
use crate::error::{PlayDateError, Result};
use crate::gateway::defuse_mentions;
use crate::models::{NewPlayDate, PlayDateStatus};
use crate::timefmt::{format_time, parse_form_time};
use poise::serenity_prelude::UserId;

const HX_LOCATION: HeaderName = HeaderName::from_static("hx-location");

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// Full page for normal navigation, bare fragment for HTMX swaps
fn page_or_fragment(headers: &HeaderMap, title: &str, fragment: String) -> Html<String> {
    if is_htmx(headers) {
        Html(fragment)
    } else {
        Html(pages::layout(title, &fragment))
    }
}

/// Send the browser to `/`, the HTMX way when the request came from HTMX
fn go_home(headers: &HeaderMap) -> Response {
    if is_htmx(headers) {
        (StatusCode::OK, [(HX_LOCATION, HeaderValue::from_static("/"))]).into_response()
    } else {
        Redirect::to("/").into_response()
    }
}

fn with_cookie(cookie: String, response: Response) -> Response {
    ([(SET_COOKIE, cookie)], response).into_response()
}

fn parse_discord_id(raw: &str) -> Option<UserId> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(UserId::new)
}

fn new_verification_code() -> String {
    uuid::Uuid::new_v4().to_string()
}

async fn send_verification_code(state: &AppState, discord_id: UserId, code: &str) -> Result<()> {
    state
        .gateway
        .send_direct_message(
            discord_id,
            &format!(
                "Here is your verification code from the PlayDate application!\n`{}`\nUse this to complete your signup/login.",
                code
            ),
        )
        .await
}

/// GET /
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let Some(token) = get_session_token(&headers) else {
        let form = pages::register_form("", "", &FormErrors::new(), None);
        return Ok(Html(pages::layout("PlayDate", &form)).into_response());
    };

    let Some(player) = state.store.find_player_by_session(&token).await? else {
        debug!("Clearing unknown session cookie");
        return Ok(with_cookie(create_logout_cookie(), Redirect::to("/").into_response()));
    };

    let upcoming = state.store.list_playdates(PlayDateStatus::Pending).await?;
    let past = state.store.list_playdates(PlayDateStatus::Done).await?;
    let body = pages::home(&player, &upcoming, &past, state.app.timezone, Utc::now());
    Ok(page_or_fragment(&headers, "PlayDate", body).into_response())
}

/// GET /register
pub async fn register_page(headers: HeaderMap) -> Html<String> {
    page_or_fragment(
        &headers,
        "PlayDate - Register",
        pages::register_form("", "", &FormErrors::new(), None),
    )
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "discID")]
    disc_id: String,
}

/// POST /register
pub async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Result<Html<String>> {
    let name = form.name.trim();
    let mut errors = FormErrors::new();

    if name.is_empty() {
        errors.insert("name", "name is required".to_string());
    } else if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.insert("name", "name must be alphanumeric".to_string());
    }

    let discord_id = if form.disc_id.trim().is_empty() {
        errors.insert("discID", "discID is required".to_string());
        None
    } else {
        let parsed = parse_discord_id(&form.disc_id);
        if parsed.is_none() {
            errors.insert("discID", "discID must be your Discord user ID (try /idme)".to_string());
        }
        parsed
    };

    let existing = match discord_id {
        Some(id) => state.store.find_player_by_discord_id(&id.to_string()).await?,
        None => None,
    };

    if !name.is_empty() && !errors.contains_key("name") {
        if let Some(owner) = state.store.find_player_by_name(name).await? {
            if Some(owner.discord_id.as_str()) != discord_id.map(|id| id.to_string()).as_deref() {
                errors.insert("name", "name is taken".to_string());
            }
        }
    }

    let Some(discord_id) = discord_id.filter(|_| errors.is_empty()) else {
        debug!("Registration form didn't meet validation: {:?}", errors);
        return Ok(Html(pages::register_form(name, &form.disc_id, &errors, None)));
    };

    // An unverified form must not rename an existing account
    let stored_name = existing.as_ref().map(|p| p.name.as_str()).unwrap_or(name);
    let code = new_verification_code();
    let player = state
        .store
        .register_player(stored_name, &discord_id.to_string(), &code)
        .await?;

    if let Err(e) = send_verification_code(&state, discord_id, &code).await {
        warn!("Failed to DM verification code to {}: {}", discord_id, e);
        return Ok(Html(pages::register_form(
            name,
            &form.disc_id,
            &errors,
            Some("Could not send you a Discord DM. Check your Discord ID and privacy settings."),
        )));
    }

    info!("Sent verification code to player {} ({})", player.name, player.id);
    Ok(Html(pages::verify_form(&player.discord_id, &FormErrors::new(), None)))
}

/// GET /login
pub async fn login_page(headers: HeaderMap) -> Html<String> {
    page_or_fragment(
        &headers,
        "PlayDate - Log in",
        pages::login_form("", &FormErrors::new(), None),
    )
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default, rename = "discID")]
    disc_id: String,
}

/// POST /login
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Result<Html<String>> {
    let mut errors = FormErrors::new();
    let Some(discord_id) = parse_discord_id(&form.disc_id) else {
        errors.insert("discID", "a valid discID is required".to_string());
        return Ok(Html(pages::login_form(&form.disc_id, &errors, None)));
    };

    let Some(player) = state
        .store
        .find_player_by_discord_id(&discord_id.to_string())
        .await?
    else {
        return Ok(Html(pages::login_form(
            &form.disc_id,
            &errors,
            Some("User doesn't exist, register first"),
        )));
    };

    let code = new_verification_code();
    state
        .store
        .register_player(&player.name, &player.discord_id, &code)
        .await?;

    if let Err(e) = send_verification_code(&state, discord_id, &code).await {
        warn!("Failed to DM verification code to {}: {}", discord_id, e);
        return Ok(Html(pages::login_form(
            &form.disc_id,
            &errors,
            Some("Could not send you a Discord DM. Check your privacy settings."),
        )));
    }

    Ok(Html(pages::verify_form(&player.discord_id, &FormErrors::new(), None)))
}

#[derive(Deserialize)]
pub struct VerifyForm {
    #[serde(default, rename = "discID")]
    disc_id: String,
    #[serde(default, rename = "verificationCode")]
    verification_code: String,
}

/// POST /verify
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<VerifyForm>,
) -> Result<Response> {
    let mut errors = FormErrors::new();
    let code = form.verification_code.trim();
    if code.is_empty() {
        errors.insert("verificationCode", "verificationCode is required".to_string());
        return Ok(Html(pages::verify_form(&form.disc_id, &errors, None)).into_response());
    }

    let player = match parse_discord_id(&form.disc_id) {
        Some(id) => state.store.find_player_by_discord_id(&id.to_string()).await?,
        None => None,
    };
    let Some(player) = player else {
        return Ok(Html(pages::verify_form(
            &form.disc_id,
            &errors,
            Some("No player with that Discord ID"),
        ))
        .into_response());
    };

    if player.verification_code != code {
        debug!("Verification code mismatch for player {}", player.id);
        errors.insert("verificationCode", "invalid verification code provided".to_string());
        return Ok(Html(pages::verify_form(&form.disc_id, &errors, None)).into_response());
    }

    // Codes are single use
    state
        .store
        .register_player(&player.name, &player.discord_id, &new_verification_code())
        .await?;

    let session_id = random_token();
    state.store.set_session(player.id, &session_id).await?;
    info!("Player {} ({}) verified and signed in", player.name, player.id);

    Ok(with_cookie(create_session_cookie(&session_id), go_home(&headers)))
}

/// GET|DELETE /logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    if let Some(token) = get_session_token(&headers) {
        state.store.clear_session(&token).await?;
    }
    Ok(with_cookie(create_logout_cookie(), go_home(&headers)))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    if let Err(e) = state.store.ping().await {
        error!("Database health check failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "unhealthy",
                "message": "Database connection failed",
                "error": e.to_string(),
            })),
        )
            .into_response();
    }

    if let Err(e) = state.gateway.ping().await {
        error!("Discord health check failed: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "unhealthy",
                "message": "Discord connection failed",
                "error": e.to_string(),
            })),
        )
            .into_response();
    }

    Json(json!({
        "status": "healthy",
        "message": "All services are healthy",
    }))
    .into_response()
}

/// GET /playdate
pub async fn playdate_form(SignedIn(_player): SignedIn) -> Html<String> {
    Html(pages::playdate_form("", "", &FormErrors::new(), None))
}

#[derive(Deserialize)]
pub struct PlayDateForm {
    #[serde(default)]
    game: String,
    #[serde(default)]
    date: String,
}

/// POST /playdate
pub async fn create_playdate(
    State(state): State<AppState>,
    SignedIn(player): SignedIn,
    headers: HeaderMap,
    Form(form): Form<PlayDateForm>,
) -> Result<Response> {
    let game = form.game.trim();
    let tz = state.app.timezone;
    let now = Utc::now();
    let mut errors = FormErrors::new();

    if game.is_empty() {
        errors.insert("game", "game is required".to_string());
    }
    let date = if form.date.trim().is_empty() {
        errors.insert("date", "date is required".to_string());
        None
    } else {
        match parse_form_time(&form.date, tz) {
            None => {
                errors.insert(
                    "date",
                    "invalid format for date/time, please use layout 2025-01-01T12:00".to_string(),
                );
                None
            }
            Some(date) if date < now => {
                errors.insert(
                    "date",
                    format!(
                        "can not make a playdate in the past, {} is before {}",
                        format_time(date, tz),
                        format_time(now, tz)
                    ),
                );
                None
            }
            Some(date) => Some(date),
        }
    };

    let Some(date) = date.filter(|_| errors.is_empty()) else {
        let keep_date = if errors.contains_key("date") { "" } else { form.date.as_str() };
        return Ok(Html(pages::playdate_form(game, keep_date, &errors, None)).into_response());
    };

    let playdate = state
        .store
        .create_playdate(NewPlayDate {
            game: game.to_string(),
            date,
            owner_id: player.id,
        })
        .await?;
    info!("Player {} created playdate {} ({})", player.name, playdate.id, playdate.game);

    let announcement = format!(
        "Playdate {} at {} by {}! Check it out here: {}",
        defuse_mentions(&playdate.game),
        format_time(playdate.date, tz),
        player.name,
        state.app.playdate_url(playdate.id)
    );
    let channel = state.discord.channel_id;
    match state.gateway.send_message(channel, &announcement).await {
        Ok(message_id) => {
            if let Err(e) = state
                .store
                .set_announcement(playdate.id, message_id.get())
                .await
            {
                error!("Failed to store announcement for playdate {}: {}", playdate.id, e);
            }
            seed_reactions(state.gateway.as_ref(), channel, message_id).await;
        }
        Err(e) => error!("Failed to announce playdate {}: {}", playdate.id, e),
    }

    Ok(go_home(&headers))
}

/// GET /playdate/:id
pub async fn show_playdate(
    State(state): State<AppState>,
    SignedIn(_player): SignedIn,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Response> {
    let Some(playdate) = state.store.find_playdate(id).await? else {
        debug!("Playdate {} not found, sending home", id);
        return Ok(Redirect::to("/").into_response());
    };
    let owner = state.store.find_player(playdate.owner_id).await?;
    let attendees = state.store.attendees(playdate.id).await?;

    let body = pages::playdate_detail(
        &playdate,
        owner.as_ref(),
        &attendees,
        state.app.timezone,
        Utc::now(),
    );
    Ok(page_or_fragment(&headers, &format!("PlayDate - {}", playdate.game), body).into_response())
}

/// POST /playdate/:id/:action
pub async fn vote(
    State(state): State<AppState>,
    SignedIn(player): SignedIn,
    Path((id, action)): Path<(i32, String)>,
) -> Result<Response> {
    if !matches!(action.as_str(), "yes" | "maybe" | "no") {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    let Some(playdate) = state.store.find_playdate(id).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let ctx = VoteContext {
        actor: &player,
        playdate: &playdate,
        vote: Attendance::from_action(&action),
    };
    let server_err = match record_vote(state.store.as_ref(), &ctx).await {
        Ok(()) => None,
        Err(PlayDateError::PlayDateClosed { .. }) => Some("This playdate already happened"),
        Err(e) => {
            error!("Failed to record vote of {} on playdate {}: {}", player.name, id, e);
            Some("Could not save your vote, please try again")
        }
    };

    let attendees = state.store.attendees(playdate.id).await?;
    Ok(Html(pages::attendees_table(&playdate, &attendees, server_err)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, DiscordConfig};
    use crate::gateway::recording::{GatewayCall, RecordingGateway};
    use crate::models::Player;
    use crate::store::{MemoryStore, PlayDateStore};
    use crate::web::auth::OAuthStateStore;
    use crate::web::server::router;
    use axum::body::Body;
    use axum::http::{header, Request};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        store: Arc<MemoryStore>,
        gateway: Arc<RecordingGateway>,
        state: AppState,
    }

    fn test_app() -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let env = |name: &str| match name {
            "DISCORD_TOKEN" => Some("token".to_string()),
            "DISCORD_CHANNEL_ID" => Some("77".to_string()),
            "PLAYDATE_TIMEZONE" => Some("UTC".to_string()),
            "WEB_BASE_URL" => Some("https://play.test".to_string()),
            _ => None,
        };
        let state = AppState {
            store: store.clone(),
            gateway: gateway.clone(),
            app: Arc::new(AppConfig::from_lookup(env).unwrap()),
            discord: Arc::new(DiscordConfig::from_lookup(env).unwrap()),
            oauth_states: Arc::new(OAuthStateStore::default()),
            http_client: reqwest::Client::new(),
        };
        TestApp {
            store,
            gateway,
            state,
        }
    }

    async fn signed_in(app: &TestApp) -> (Player, String) {
        let player = app.store.register_player("alice", "1234", "code").await.unwrap();
        app.store.set_session(player.id, "sess").await.unwrap();
        (player, "playdate=sess".to_string())
    }

    fn form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("HX-Request", "true");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_healthy() {
        let app = test_app();
        let response = router(app.state.clone())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_anonymous_index_shows_register() {
        let app = test_app();
        let response = router(app.state.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Join PlayDate"));
    }

    #[tokio::test]
    async fn test_protected_routes_redirect_home() {
        let app = test_app();
        let response = router(app.state.clone())
            .oneshot(Request::builder().uri("/playdate").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
    }

    #[tokio::test]
    async fn test_register_then_verify_signs_in() {
        let app = test_app();

        let response = router(app.state.clone())
            .oneshot(form("/register", "name=bob&discID=5555", None))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("verificationCode"));

        let dm = app
            .gateway
            .calls()
            .into_iter()
            .find_map(|call| match call {
                GatewayCall::DirectMessage { user, content } => Some((user, content)),
                _ => None,
            })
            .unwrap();
        assert_eq!(dm.0, UserId::new(5555));
        let player = app.store.find_player_by_discord_id("5555").await.unwrap().unwrap();
        assert!(dm.1.contains(&player.verification_code));

        let response = router(app.state.clone())
            .oneshot(form(
                "/verify",
                &format!("discID=5555&verificationCode={}", player.verification_code),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.headers()["hx-location"], "/");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        let session = cookie
            .trim_start_matches("playdate=")
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let signed_in = app.store.find_player_by_session(&session).await.unwrap().unwrap();
        assert_eq!(signed_in.id, player.id);
        assert_ne!(signed_in.verification_code, player.verification_code);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let app = test_app();
        app.store.register_player("taken", "1", "c").await.unwrap();

        let body = body_text(
            router(app.state.clone())
                .oneshot(form("/register", "name=taken&discID=2", None))
                .await
                .unwrap(),
        )
        .await;
        assert!(body.contains("name is taken"));

        let body = body_text(
            router(app.state.clone())
                .oneshot(form("/register", "name=no+spaces&discID=", None))
                .await
                .unwrap(),
        )
        .await;
        assert!(body.contains("name must be alphanumeric"));
        assert!(body.contains("discID is required"));
        assert!(app.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_code_is_rejected() {
        let app = test_app();
        app.store.register_player("bob", "5555", "right").await.unwrap();

        let response = router(app.state.clone())
            .oneshot(form("/verify", "discID=5555&verificationCode=wrong", None))
            .await
            .unwrap();

        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(response).await.contains("invalid verification code"));
    }

    #[tokio::test]
    async fn test_create_playdate_announces_and_seeds_reactions() {
        let app = test_app();
        let (_, cookie) = signed_in(&app).await;
        let date = (Utc::now() + chrono::Duration::days(2))
            .format("%Y-%m-%dT%H:%M")
            .to_string();

        let response = router(app.state.clone())
            .oneshot(form("/playdate", &format!("game=Halo&date={}", date), Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.headers()["hx-location"], "/");

        let playdates = app.store.list_playdates(PlayDateStatus::Pending).await.unwrap();
        assert_eq!(playdates.len(), 1);
        let playdate = &playdates[0];
        assert!(playdate.message_id.is_some());

        let sent = app.gateway.sent_messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("Playdate Halo at "));
        assert!(sent[0].ends_with(&format!("by alice! Check it out here: https://play.test/playdate/{}", playdate.id)));
        let reactions = app
            .gateway
            .calls()
            .into_iter()
            .filter(|call| matches!(call, GatewayCall::AddReaction { .. }))
            .count();
        assert_eq!(reactions, 3);
    }

    #[tokio::test]
    async fn test_announcement_defuses_mass_mentions() {
        let app = test_app();
        let (_, cookie) = signed_in(&app).await;
        let date = (Utc::now() + chrono::Duration::days(1))
            .format("%Y-%m-%dT%H:%M")
            .to_string();

        router(app.state.clone())
            .oneshot(form("/playdate", &format!("game=%40here+raid&date={}", date), Some(&cookie)))
            .await
            .unwrap();

        let sent = app.gateway.sent_messages();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].contains("@here"));
    }

    #[tokio::test]
    async fn test_playdate_in_the_past_is_rejected() {
        let app = test_app();
        let (_, cookie) = signed_in(&app).await;

        let body = body_text(
            router(app.state.clone())
                .oneshot(form("/playdate", "game=Halo&date=2001-01-01T10:00", Some(&cookie)))
                .await
                .unwrap(),
        )
        .await;

        assert!(body.contains("can not make a playdate in the past"));
        assert!(app.store.list_playdates(PlayDateStatus::Pending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_web_vote_overwrites() {
        let app = test_app();
        let (player, cookie) = signed_in(&app).await;
        let playdate = app
            .store
            .create_playdate(NewPlayDate {
                game: "Halo".to_string(),
                date: Utc::now() + chrono::Duration::hours(1),
                owner_id: player.id,
            })
            .await
            .unwrap();

        for action in ["yes", "maybe"] {
            router(app.state.clone())
                .oneshot(form(&format!("/playdate/{}/{}", playdate.id, action), "", Some(&cookie)))
                .await
                .unwrap();
        }

        let attendees = app.store.attendees(playdate.id).await.unwrap();
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].attending, Attendance::Maybe);
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let app = test_app();
        let (_, cookie) = signed_in(&app).await;

        let response = router(app.state.clone())
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/logout")
                    .header(header::COOKIE, cookie)
                    .header("HX-Request", "true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
        assert!(app.store.find_player_by_session("sess").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oauth_callback_rejects_unknown_state() {
        let app = test_app();
        let response = router(app.state.clone())
            .oneshot(
                Request::builder()
                    .uri("/discord/callback?code=abc&state=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
