//! Keeps a player's visible reactions in line with their stored vote

use futures::future::join_all;
use poise::serenity_prelude::{ChannelId, MessageId, ReactionType, UserId};
use tracing::{debug, warn};

use super::vote::{Attendance, TRACKED_GLYPHS};
use crate::gateway::ChatGateway;

/// Result of one sync pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub removed: Vec<&'static str>,
    pub failed: Vec<&'static str>,
}

/// Remove every tracked glyph other than `vote`'s from `reactor` on `message`.
///
/// Removals are independent: each is issued concurrently and a failure is
/// logged and counted without affecting the others.
pub async fn sync_reactions(
    gateway: &dyn ChatGateway,
    channel: ChannelId,
    message: MessageId,
    reactor: UserId,
    vote: Attendance,
) -> SyncReport {
    let keep = vote.glyph();
    let stale: Vec<&'static str> = TRACKED_GLYPHS
        .into_iter()
        .filter(|glyph| *glyph != keep)
        .collect();

    let results = join_all(stale.iter().map(|glyph| async move {
        let emoji = ReactionType::Unicode(glyph.to_string());
        let result = gateway.remove_reaction(channel, message, &emoji, reactor).await;
        (*glyph, result)
    }))
    .await;

    let mut report = SyncReport::default();
    for (glyph, result) in results {
        match result {
            Ok(()) => report.removed.push(glyph),
            Err(e) => {
                warn!(
                    "Failed to remove {} from user {} on message {}: {}",
                    glyph, reactor, message, e
                );
                report.failed.push(glyph);
            }
        }
    }

    debug!(
        "Synced reactions for user {} on message {}: kept {}, removed {:?}",
        reactor, message, keep, report.removed
    );
    report
}

/// Put the three voting reactions on a fresh announcement
pub async fn seed_reactions(gateway: &dyn ChatGateway, channel: ChannelId, message: MessageId) {
    for glyph in TRACKED_GLYPHS {
        if let Err(e) = gateway.add_reaction(channel, message, glyph).await {
            warn!("Failed to add {} to message {}: {}", glyph, message, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::vote::{THINKING, THUMBS_DOWN, THUMBS_UP};
    use crate::gateway::recording::{GatewayCall, RecordingGateway};

    const CHANNEL: ChannelId = ChannelId::new(1);
    const MESSAGE: MessageId = MessageId::new(2);
    const REACTOR: UserId = UserId::new(3);

    #[tokio::test]
    async fn test_removes_the_other_two_glyphs() {
        let gateway = RecordingGateway::new();

        let report = sync_reactions(&gateway, CHANNEL, MESSAGE, REACTOR, Attendance::Yes).await;

        let mut removed = gateway.removed_glyphs();
        removed.sort();
        let mut expected = vec![
            (THINKING.to_string(), REACTOR),
            (THUMBS_DOWN.to_string(), REACTOR),
        ];
        expected.sort();
        assert_eq!(removed, expected);
        assert_eq!(report.removed.len(), 2);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_the_other() {
        let gateway = RecordingGateway::new();
        gateway.fail_removal_of(THUMBS_UP);

        let report = sync_reactions(&gateway, CHANNEL, MESSAGE, REACTOR, Attendance::Maybe).await;

        assert_eq!(gateway.removed_glyphs().len(), 2);
        assert_eq!(report.failed, vec![THUMBS_UP]);
        assert_eq!(report.removed, vec![THUMBS_DOWN]);
    }

    #[tokio::test]
    async fn test_seed_adds_all_tracked_glyphs() {
        let gateway = RecordingGateway::new();

        seed_reactions(&gateway, CHANNEL, MESSAGE).await;

        let added: Vec<String> = gateway
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::AddReaction { glyph, .. } => Some(glyph),
                _ => None,
            })
            .collect();
        assert_eq!(added, vec![THUMBS_UP, THINKING, THUMBS_DOWN]);
    }
}
