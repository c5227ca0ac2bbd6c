use poise::serenity_prelude::{ChannelId, GuildId};

use crate::error::{PlayDateError, Result};

/// Discord bot and OAuth application settings
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Bot token used by the gateway client
    pub token: String,

    /// Channel where playdates are announced and reacted to
    pub channel_id: ChannelId,

    /// Guild to register slash commands in (global registration when unset)
    pub guild_id: Option<GuildId>,

    // OAuth application
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub user_api_url: String,
    pub scopes: String,
}

impl DiscordConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let token = lookup("DISCORD_TOKEN").ok_or_else(|| PlayDateError::MissingEnv {
            name: "DISCORD_TOKEN".to_string(),
        })?;

        let channel_id = lookup("DISCORD_CHANNEL_ID")
            .ok_or_else(|| PlayDateError::MissingEnv {
                name: "DISCORD_CHANNEL_ID".to_string(),
            })?
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(ChannelId::new)
            .ok_or_else(|| PlayDateError::ConfigValidation {
                message: "DISCORD_CHANNEL_ID must be a non-zero snowflake".to_string(),
            })?;

        let guild_id = lookup("DISCORD_GUILD_ID")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|id| *id != 0)
            .map(GuildId::new);

        Ok(Self {
            token,
            channel_id,
            guild_id,
            client_id: get_or("DISCORD_CLIENT_ID", ""),
            client_secret: get_or("DISCORD_CLIENT_SECRET", ""),
            redirect_uri: get_or(
                "DISCORD_REDIRECT_URI",
                "http://localhost:8080/discord/callback",
            ),
            auth_url: get_or("DISCORD_AUTH_URL", "https://discord.com/api/oauth2/authorize"),
            token_url: get_or("DISCORD_TOKEN_URL", "https://discord.com/api/oauth2/token"),
            user_api_url: get_or("DISCORD_USER_API_URL", "https://discord.com/api/users/@me"),
            scopes: get_or("DISCORD_SCOPES", "identify"),
        })
    }

    /// Whether the OAuth login flow can be offered
    pub fn oauth_enabled(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = DiscordConfig::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "token"),
            ("DISCORD_CHANNEL_ID", "42"),
        ]))
        .unwrap();

        assert_eq!(config.channel_id, ChannelId::new(42));
        assert!(config.guild_id.is_none());
        assert_eq!(config.scopes, "identify");
        assert_eq!(config.token_url, "https://discord.com/api/oauth2/token");
        assert!(!config.oauth_enabled());
    }

    #[test]
    fn test_missing_token_is_error() {
        let result = DiscordConfig::from_lookup(lookup(&[("DISCORD_CHANNEL_ID", "42")]));
        assert!(matches!(result, Err(PlayDateError::MissingEnv { .. })));
    }

    #[test]
    fn test_invalid_channel_is_error() {
        let result = DiscordConfig::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "token"),
            ("DISCORD_CHANNEL_ID", "not-a-number"),
        ]));
        assert!(matches!(result, Err(PlayDateError::ConfigValidation { .. })));
    }
}
