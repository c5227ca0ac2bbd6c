//! Outbound side of the chat platform
//!
//! Everything the bot does *to* Discord goes through [`ChatGateway`], so the
//! reconciler and the scanner can be exercised without a live connection.

mod serenity_gateway;
#[cfg(test)]
pub mod recording;

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, MessageId, ReactionType, UserId};
use std::sync::Arc;

use crate::error::Result;

pub use serenity_gateway::SerenityGateway;

/// The parts of a fetched message the reconciler cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub author: UserId,
    pub content: String,
}

/// Rich embed, converted to serenity's builder at send time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub color: u32,
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<MessageId>;
    async fn send_embed(&self, channel: ChannelId, embed: &Embed) -> Result<MessageId>;
    async fn add_reaction(&self, channel: ChannelId, message: MessageId, glyph: &str) -> Result<()>;
    /// Remove one user's `emoji` reaction from a message. Custom emoji must
    /// keep their id, so this takes the full reaction type.
    async fn remove_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &ReactionType,
        user: UserId,
    ) -> Result<()>;
    async fn fetch_message(&self, channel: ChannelId, message: MessageId)
        -> Result<FetchedMessage>;
    /// Open (or reuse) a DM channel with `user` and post `content` there
    async fn send_direct_message(&self, user: UserId, content: &str) -> Result<()>;
    /// Cheap authenticated call used by the health check
    async fn ping(&self) -> Result<()>;
}

pub type SharedGateway = Arc<dyn ChatGateway>;

/// Break `@everyone`, `@here` and role/user pings typed into free text by
/// putting a zero-width space after every `@`
pub fn defuse_mentions(text: &str) -> String {
    text.replace('@', "@\u{200B}")
}
