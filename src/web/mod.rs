//! Web UI for registering, creating playdates and voting
//!
//! Runs alongside the Discord bot. Pages are small HTML fragments driven by
//! HTMX; sign-in happens through Discord OAuth or a verification code sent
//! by DM.

mod auth;
mod handlers;
mod oauth;
mod pages;
mod server;

pub use auth::OAuthStateStore;
pub use server::{start_web_server, AppState, WebServerConfig};
