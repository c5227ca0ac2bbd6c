//! Web server: configuration, shared state and routing

use axum::{
    extract::Host,
    handler::HandlerWithoutStateExt,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    BoxError, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::auth::OAuthStateStore;
use super::{handlers, oauth, pages};
use crate::config::{AppConfig, DiscordConfig};
use crate::error::PlayDateError;
use crate::gateway::SharedGateway;
use crate::store::SharedStore;

/// Web server configuration
pub struct WebServerConfig {
    /// Plain HTTP port. Serves the app, or only redirects when TLS is on.
    pub http_port: u16,
    /// HTTPS port, used when TLS is configured
    pub https_port: u16,
    /// Path to certificate PEM file (cert + CA bundle)
    pub cert_path: Option<PathBuf>,
    /// Path to private key PEM file
    pub key_path: Option<PathBuf>,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            https_port: 443,
            cert_path: None,
            key_path: None,
        }
    }
}

impl WebServerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            http_port: lookup("HTTP_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.http_port),
            https_port: lookup("HTTPS_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.https_port),
            cert_path: lookup("TLS_CERT_PATH").map(PathBuf::from),
            key_path: lookup("TLS_KEY_PATH").map(PathBuf::from),
        }
    }

    /// Certificate and key, when both are configured
    pub fn tls_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        Some((self.cert_path.as_ref()?, self.key_path.as_ref()?))
    }
}

/// Ports configuration for HTTP to HTTPS redirect
#[derive(Clone, Copy)]
struct Ports {
    http: u16,
    https: u16,
}

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub gateway: SharedGateway,
    pub app: Arc<AppConfig>,
    pub discord: Arc<DiscordConfig>,
    pub oauth_states: Arc<OAuthStateStore>,
    pub http_client: reqwest::Client,
}

impl IntoResponse for PlayDateError {
    fn into_response(self) -> Response {
        let status = match &self {
            PlayDateError::NotFound { .. } => StatusCode::NOT_FOUND,
            PlayDateError::PlayDateClosed { .. } | PlayDateError::NameTaken { .. } => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Html(pages::error_page(&self.to_string()))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/register", get(handlers::register_page).post(handlers::register))
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/verify", post(handlers::verify))
        .route("/logout", get(handlers::logout).delete(handlers::logout))
        .route("/discord/login", get(oauth::discord_login))
        .route("/discord/callback", get(oauth::discord_callback))
        .route("/health", get(handlers::health))
        .route(
            "/playdate",
            get(handlers::playdate_form).post(handlers::create_playdate),
        )
        .route("/playdate/:id", get(handlers::show_playdate))
        .route("/playdate/:id/:action", post(handlers::vote))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the web UI until the listener fails
pub async fn start_web_server(config: WebServerConfig, state: AppState) -> anyhow::Result<()> {
    let base_url = state.app.base_url.clone();
    let app = router(state);

    info!("=== Discord OAuth Configuration ===");
    info!("Add this Redirect URI in the Discord Developer Portal:");
    info!("  {}/discord/callback", base_url);

    let Some((cert_path, key_path)) = config.tls_paths() else {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Web server listening on http://{}", addr);
        axum::serve(listener, app).await?;
        return Ok(());
    };

    info!("Loading TLS certificates:");
    info!("  Certificate: {}", cert_path.display());
    info!("  Private key: {}", key_path.display());

    if !cert_path.exists() {
        return Err(anyhow::anyhow!(
            "Certificate file not found: {}",
            cert_path.display()
        ));
    }
    if !key_path.exists() {
        return Err(anyhow::anyhow!(
            "Private key file not found: {}",
            key_path.display()
        ));
    }

    let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| anyhow::anyhow!(
            "Failed to load TLS certificates: {}\n  Certificate: {}\n  Private key: {}\n\nHint: The private key must be in PKCS#8 PEM format. If you have an RSA key, convert it with:\n  openssl pkcs8 -topk8 -inform PEM -outform PEM -nocrypt -in private.key -out key.pem",
            e, cert_path.display(), key_path.display()
        ))?;

    let ports = Ports {
        http: config.http_port,
        https: config.https_port,
    };
    tokio::spawn(redirect_http_to_https(ports));

    let https_addr = SocketAddr::from(([0, 0, 0, 0], config.https_port));
    info!("Web server listening on https://0.0.0.0:{}", config.https_port);
    info!("HTTP redirect server on http://0.0.0.0:{}", config.http_port);

    axum_server::bind_rustls(https_addr, tls_config)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

fn make_https(host: &str, uri: Uri, https_port: u16) -> Result<Uri, BoxError> {
    let mut parts = uri.into_parts();

    parts.scheme = Some(axum::http::uri::Scheme::HTTPS);

    if parts.path_and_query.is_none() {
        parts.path_and_query = Some("/".parse()?);
    }

    let authority: axum::http::uri::Authority = host.parse()?;
    let bare_host = authority.host();

    // Only add port if it's not the default HTTPS port
    if https_port == 443 {
        parts.authority = Some(bare_host.parse()?);
    } else {
        parts.authority = Some(format!("{bare_host}:{https_port}").parse()?);
    }

    Ok(Uri::from_parts(parts)?)
}

/// Redirect all HTTP requests to HTTPS
async fn redirect_http_to_https(ports: Ports) {
    let redirect = move |Host(host): Host, uri: Uri| async move {
        match make_https(&host, uri, ports.https) {
            Ok(uri) => Ok(Redirect::permanent(&uri.to_string())),
            Err(error) => {
                warn!(%error, "Failed to convert URI to HTTPS");
                Err(StatusCode::BAD_REQUEST)
            }
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], ports.http));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind HTTP redirect server on port {}: {}", ports.http, e);
            return;
        }
    };

    info!("HTTP redirect server listening on {}", addr);

    if let Err(e) = axum::serve(listener, redirect.into_make_service()).await {
        error!("HTTP redirect server error: {}", e);
    }
}
