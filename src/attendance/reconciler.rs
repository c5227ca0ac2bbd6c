//! Turns emoji reactions on announcements into stored votes

use poise::serenity_prelude::{ChannelId, MessageId, Reaction, ReactionType, UserId};
use tracing::{debug, error, info, warn};

use super::sync::sync_reactions;
use super::vote::Attendance;
use super::{record_vote, VoteContext};
use crate::error::Result;
use crate::gateway::SharedGateway;
use crate::models::PlayDate;
use crate::store::SharedStore;

/// A reaction-added notification, stripped down to what matters here
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionNotice {
    pub reactor: UserId,
    /// Used for the vote mapping only
    pub glyph: String,
    /// The reaction as Discord knows it, needed to take it back
    pub emoji: ReactionType,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

impl ReactionNotice {
    pub fn new(reactor: UserId, emoji: ReactionType, channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            reactor,
            glyph: glyph_of(&emoji),
            emoji,
            channel_id,
            message_id,
        }
    }

    /// `None` when the reaction carries no user (should not happen for adds)
    pub fn from_reaction(reaction: &Reaction) -> Option<Self> {
        Some(Self::new(
            reaction.user_id?,
            reaction.emoji.clone(),
            reaction.channel_id,
            reaction.message_id,
        ))
    }
}

/// Unicode emoji are their own glyph; custom emoji only have a name
fn glyph_of(emoji: &ReactionType) -> String {
    match emoji {
        ReactionType::Unicode(s) => s.clone(),
        ReactionType::Custom { name, .. } => name.clone().unwrap_or_default(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SelfReaction,
    OtherChannel,
    NotAPlayDate,
    UnknownPlayDate,
    PlayDateClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Ignored(IgnoreReason),
    /// The reactor has no account; their reaction was taken back
    Rejected,
    Recorded {
        playdate_id: i32,
        player_id: i32,
        vote: Attendance,
    },
}

pub struct AttendanceReconciler {
    store: SharedStore,
    gateway: SharedGateway,
    bot_id: UserId,
    channel_id: ChannelId,
    signup_url: String,
}

impl AttendanceReconciler {
    pub fn new(
        store: SharedStore,
        gateway: SharedGateway,
        bot_id: UserId,
        channel_id: ChannelId,
        signup_url: String,
    ) -> Self {
        Self {
            store,
            gateway,
            bot_id,
            channel_id,
            signup_url,
        }
    }

    /// Fire-and-forget entry point for the event handler
    pub async fn handle(&self, notice: ReactionNotice) {
        match self.reconcile(&notice).await {
            Ok(ReconcileOutcome::Ignored(reason)) => {
                debug!("Ignoring reaction on message {}: {:?}", notice.message_id, reason);
            }
            Ok(outcome) => {
                debug!("Reaction on message {} reconciled: {:?}", notice.message_id, outcome);
            }
            Err(e) => {
                error!(
                    "Failed to reconcile reaction {} by {} on message {}: {}",
                    notice.glyph, notice.reactor, notice.message_id, e
                );
            }
        }
    }

    pub async fn reconcile(&self, notice: &ReactionNotice) -> Result<ReconcileOutcome> {
        if notice.reactor == self.bot_id {
            return Ok(ReconcileOutcome::Ignored(IgnoreReason::SelfReaction));
        }
        if notice.channel_id != self.channel_id {
            return Ok(ReconcileOutcome::Ignored(IgnoreReason::OtherChannel));
        }

        let playdate = match self.resolve_playdate(notice).await? {
            Ok(playdate) => playdate,
            Err(reason) => return Ok(ReconcileOutcome::Ignored(reason)),
        };
        if !playdate.is_pending() {
            return Ok(ReconcileOutcome::Ignored(IgnoreReason::PlayDateClosed));
        }

        let vote = Attendance::from_glyph(&notice.glyph);

        let player = match self
            .store
            .find_player_by_discord_id(&notice.reactor.to_string())
            .await?
        {
            Some(player) => player,
            None => {
                self.reject_unregistered(notice).await;
                return Ok(ReconcileOutcome::Rejected);
            }
        };

        record_vote(
            self.store.as_ref(),
            &VoteContext {
                actor: &player,
                playdate: &playdate,
                vote,
            },
        )
        .await?;

        let report = sync_reactions(
            self.gateway.as_ref(),
            notice.channel_id,
            notice.message_id,
            notice.reactor,
            vote,
        )
        .await;
        if !report.failed.is_empty() {
            warn!(
                "Vote of {} on playdate {} stored, but {:?} still shown",
                player.name, playdate.id, report.failed
            );
        }

        Ok(ReconcileOutcome::Recorded {
            playdate_id: playdate.id,
            player_id: player.id,
            vote,
        })
    }

    /// Stored message mapping first, then the id at the end of the bot's own
    /// announcement text
    async fn resolve_playdate(
        &self,
        notice: &ReactionNotice,
    ) -> Result<std::result::Result<PlayDate, IgnoreReason>> {
        if let Some(playdate) = self
            .store
            .find_playdate_by_message(notice.message_id.get())
            .await?
        {
            return Ok(Ok(playdate));
        }

        let message = self
            .gateway
            .fetch_message(notice.channel_id, notice.message_id)
            .await?;
        if message.author != self.bot_id {
            return Ok(Err(IgnoreReason::NotAPlayDate));
        }

        let Some(id) = playdate_id_from_text(&message.content) else {
            return Ok(Err(IgnoreReason::NotAPlayDate));
        };

        match self.store.find_playdate(id).await? {
            Some(playdate) => Ok(Ok(playdate)),
            None => Ok(Err(IgnoreReason::UnknownPlayDate)),
        }
    }

    async fn reject_unregistered(&self, notice: &ReactionNotice) {
        info!(
            "Rejecting reaction from unregistered user {} on message {}",
            notice.reactor, notice.message_id
        );

        if let Err(e) = self
            .gateway
            .remove_reaction(
                notice.channel_id,
                notice.message_id,
                &notice.emoji,
                notice.reactor,
            )
            .await
        {
            warn!("Failed to remove reaction of unregistered user {}: {}", notice.reactor, e);
        }

        let guidance = format!(
            "<@{}> please go here to make an account: {}",
            notice.reactor, self.signup_url
        );
        if let Err(e) = self.gateway.send_message(notice.channel_id, &guidance).await {
            warn!("Failed to send sign-up guidance to {}: {}", notice.reactor, e);
        }
    }
}

/// Parse the playdate id from the last `/` segment of an announcement
pub fn playdate_id_from_text(content: &str) -> Option<i32> {
    let (_, tail) = content.trim_end().rsplit_once('/')?;
    tail.parse().ok()
}
