use chrono_tz::Tz;
use std::time::Duration;

use crate::error::{PlayDateError, Result};

/// Application settings that are not Discord specific
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string
    pub database_url: String,

    /// Public base URL of the web UI, used in announcement links
    pub base_url: String,

    /// Timezone used to interpret and display playdate times
    pub timezone: Tz,

    /// How often the lifecycle scanner looks for started playdates
    pub scan_interval: Duration,

    /// GitHub `owner/repo` whose latest release is announced on startup
    pub release_notes_repo: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| {
            format!(
                "postgres://{}:{}@{}:{}/{}?sslmode=disable",
                get_or("POSTGRES_USER", "postgres"),
                get_or("POSTGRES_PASSWORD", "postgres"),
                get_or("POSTGRES_HOST", "localhost"),
                get_or("POSTGRES_PORT", "5432"),
                get_or("POSTGRES_DB", "postgres"),
            )
        });

        let timezone_name = get_or("PLAYDATE_TIMEZONE", "America/New_York");
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| PlayDateError::ConfigValidation {
                message: format!("Unknown timezone '{}'", timezone_name),
            })?;

        let scan_secs = match lookup("SCAN_INTERVAL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| PlayDateError::ConfigValidation {
                    message: format!("SCAN_INTERVAL_SECS must be a positive integer, got '{}'", raw),
                })?,
            None => 30,
        };

        Ok(Self {
            database_url,
            base_url: get_or("WEB_BASE_URL", "http://localhost:8080")
                .trim_end_matches('/')
                .to_string(),
            timezone,
            scan_interval: Duration::from_secs(scan_secs),
            release_notes_repo: lookup("RELEASE_NOTES_REPO").filter(|s| !s.trim().is_empty()),
        })
    }

    /// Link to a playdate's page in the web UI
    pub fn playdate_url(&self, id: i32) -> String {
        format!("{}/playdate/{}", self.base_url, id)
    }

    /// Link unregistered users are sent to
    pub fn signup_url(&self) -> String {
        format!("{}/discord/login", self.base_url)
    }
}
