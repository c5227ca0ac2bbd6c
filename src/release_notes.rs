//! Posts the latest GitHub release to the playdate channel on startup

use poise::serenity_prelude::ChannelId;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PlayDateError, Result};
use crate::gateway::{ChatGateway, Embed};

/// Discord's limit for an embed description
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;
const RELEASE_COLOR: u32 = 0xfadde6;

#[derive(Debug, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub name: Option<String>,
    #[serde(default)]
    pub body: String,
    pub html_url: Option<String>,
}

impl GitHubRelease {
    pub fn to_embed(&self) -> Embed {
        let name = self.name.as_deref().unwrap_or(&self.tag_name);
        Embed {
            title: format!("🤯 New PlayDate Release: {} 🤯", name),
            description: truncate_description(&self.body, EMBED_DESCRIPTION_LIMIT),
            url: self.html_url.clone(),
            color: RELEASE_COLOR,
        }
    }
}

pub async fn fetch_latest_release(client: &reqwest::Client, repo: &str) -> Result<GitHubRelease> {
    let url = format!("https://api.github.com/repos/{}/releases/latest", repo);
    debug!("Fetching release notes from {}", url);

    let response = client
        .get(&url)
        .header("User-Agent", concat!("playdate/", env!("CARGO_PKG_VERSION")))
        .header("Accept", "application/vnd.github+json")
        .timeout(Duration::from_secs(10))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(PlayDateError::Internal {
            message: format!("GitHub returned {} for {}", response.status(), url),
        });
    }

    Ok(response.json().await?)
}

/// Fetch and post the latest release. Failures are only logged.
pub async fn announce_latest_release(
    client: &reqwest::Client,
    gateway: &dyn ChatGateway,
    channel: ChannelId,
    repo: &str,
) {
    let release = match fetch_latest_release(client, repo).await {
        Ok(release) => release,
        Err(e) => {
            warn!("Could not fetch release notes for {}: {}", repo, e);
            return;
        }
    };

    match gateway.send_embed(channel, &release.to_embed()).await {
        Ok(_) => info!("Posted release notes for {}", release.tag_name),
        Err(e) => warn!("Failed to post release notes: {}", e),
    }
}

/// Shorten `body` to at most `limit` characters. The last `\r`-separated line
/// (the changelog link) is kept and appended after an ellipsis.
pub fn truncate_description(body: &str, limit: usize) -> String {
    if body.chars().count() <= limit {
        return body.to_string();
    }

    let (notes, changelog) = match body.rsplit_once('\r') {
        Some((notes, changelog)) => (notes, changelog.trim()),
        None => (body, ""),
    };

    let suffix = if changelog.is_empty() {
        "\n...".to_string()
    } else {
        format!("\n...{}", changelog)
    };
    let keep = limit.saturating_sub(suffix.chars().count());
    let mut out: String = notes.chars().take(keep).collect();
    out.push_str(&suffix);
    out
}
