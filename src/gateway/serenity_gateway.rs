use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use serenity::{
    ChannelId, Colour, CreateAllowedMentions, CreateEmbed, CreateMessage, Http, MessageId,
    ReactionType, UserId,
};
use std::sync::Arc;
use tracing::debug;

use super::{ChatGateway, Embed, FetchedMessage};
use crate::error::Result;

/// [`ChatGateway`] backed by serenity's REST client
#[derive(Clone)]
pub struct SerenityGateway {
    http: Arc<Http>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

fn unicode(glyph: &str) -> ReactionType {
    ReactionType::Unicode(glyph.to_string())
}

/// Only explicit user mentions ping; `@everyone`, `@here` and roles never do
fn user_mentions_only() -> CreateAllowedMentions {
    CreateAllowedMentions::new().all_users(true)
}

#[async_trait]
impl ChatGateway for SerenityGateway {
    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<MessageId> {
        let message = channel
            .send_message(
                self.http.as_ref(),
                CreateMessage::new()
                    .content(content)
                    .allowed_mentions(user_mentions_only()),
            )
            .await?;
        debug!("Sent message {} to channel {}", message.id, channel);
        Ok(message.id)
    }

    async fn send_embed(&self, channel: ChannelId, embed: &Embed) -> Result<MessageId> {
        let mut builder = CreateEmbed::new()
            .title(&embed.title)
            .description(&embed.description)
            .colour(Colour::new(embed.color));
        if let Some(url) = &embed.url {
            builder = builder.url(url);
        }

        let message = channel
            .send_message(self.http.as_ref(), CreateMessage::new().embed(builder))
            .await?;
        Ok(message.id)
    }

    async fn add_reaction(&self, channel: ChannelId, message: MessageId, glyph: &str) -> Result<()> {
        self.http
            .create_reaction(channel, message, &unicode(glyph))
            .await?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &ReactionType,
        user: UserId,
    ) -> Result<()> {
        self.http
            .delete_reaction(channel, message, user, emoji)
            .await?;
        Ok(())
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<FetchedMessage> {
        let message = self.http.get_message(channel, message).await?;
        Ok(FetchedMessage {
            author: message.author.id,
            content: message.content,
        })
    }

    async fn send_direct_message(&self, user: UserId, content: &str) -> Result<()> {
        let dm = user.create_dm_channel(self.http.as_ref()).await?;
        dm.say(self.http.as_ref(), content).await?;
        debug!("Sent direct message to user {}", user);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.http.get_current_user().await?;
        Ok(())
    }
}
