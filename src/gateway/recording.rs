//! In-process [`ChatGateway`] that records every call

use async_trait::async_trait;
use parking_lot::Mutex;
use poise::serenity_prelude::{ChannelId, MessageId, ReactionType, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{ChatGateway, Embed, FetchedMessage};
use crate::error::{PlayDateError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    SendMessage { channel: ChannelId, content: String },
    SendEmbed { channel: ChannelId, embed: Embed },
    AddReaction { message: MessageId, glyph: String },
    RemoveReaction { message: MessageId, glyph: String, user: UserId },
    FetchMessage { message: MessageId },
    DirectMessage { user: UserId, content: String },
}

#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    messages: Mutex<HashMap<MessageId, FetchedMessage>>,
    failing_glyphs: Mutex<HashSet<String>>,
    fail_sends: Mutex<bool>,
    next_message_id: AtomicU64,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicU64::new(1000),
            ..Default::default()
        }
    }

    /// Make `fetch_message` return this message
    pub fn put_message(&self, id: MessageId, author: UserId, content: &str) {
        self.messages.lock().insert(
            id,
            FetchedMessage {
                author,
                content: content.to_string(),
            },
        );
    }

    /// Removing `glyph` (unicode, or `name:id` for custom emoji) will fail
    /// from now on
    pub fn fail_removal_of(&self, glyph: &str) {
        self.failing_glyphs.lock().insert(glyph.to_string());
    }

    /// Channel sends fail from now on
    pub fn fail_sends(&self) {
        *self.fail_sends.lock() = true;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::SendMessage { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn removed_glyphs(&self) -> Vec<(String, UserId)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::RemoveReaction { glyph, user, .. } => Some((glyph, user)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().push(call);
    }

    fn next_id(&self) -> MessageId {
        MessageId::new(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<MessageId> {
        self.record(GatewayCall::SendMessage {
            channel,
            content: content.to_string(),
        });
        if *self.fail_sends.lock() {
            return Err(PlayDateError::Discord {
                message: "send rejected".to_string(),
            });
        }
        Ok(self.next_id())
    }

    async fn send_embed(&self, channel: ChannelId, embed: &Embed) -> Result<MessageId> {
        self.record(GatewayCall::SendEmbed {
            channel,
            embed: embed.clone(),
        });
        Ok(self.next_id())
    }

    async fn add_reaction(&self, _channel: ChannelId, message: MessageId, glyph: &str) -> Result<()> {
        self.record(GatewayCall::AddReaction {
            message,
            glyph: glyph.to_string(),
        });
        Ok(())
    }

    async fn remove_reaction(
        &self,
        _channel: ChannelId,
        message: MessageId,
        emoji: &ReactionType,
        user: UserId,
    ) -> Result<()> {
        let glyph = emoji.as_data();
        self.record(GatewayCall::RemoveReaction {
            message,
            glyph: glyph.clone(),
            user,
        });
        if self.failing_glyphs.lock().contains(&glyph) {
            return Err(PlayDateError::Discord {
                message: format!("cannot remove {}", glyph),
            });
        }
        Ok(())
    }

    async fn fetch_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
    ) -> Result<FetchedMessage> {
        self.record(GatewayCall::FetchMessage { message });
        self.messages
            .lock()
            .get(&message)
            .cloned()
            .ok_or_else(|| PlayDateError::not_found("Message", message))
    }

    async fn send_direct_message(&self, user: UserId, content: &str) -> Result<()> {
        self.record(GatewayCall::DirectMessage {
            user,
            content: content.to_string(),
        });
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
