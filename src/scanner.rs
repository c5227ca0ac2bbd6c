//! Periodic scan that announces playdates as they start and closes them

use chrono::{DateTime, Utc};
use poise::serenity_prelude::ChannelId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::gateway::{defuse_mentions, SharedGateway};
use crate::models::PlayDate;
use crate::store::SharedStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    /// A previous tick was still running
    Skipped,
    Processed {
        /// Playdates marked done in this tick
        closed: Vec<i32>,
        /// Announcements that could not be delivered
        failed_announcements: usize,
    },
}

pub struct LifecycleScanner {
    store: SharedStore,
    gateway: SharedGateway,
    channel_id: ChannelId,
    interval: Duration,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the tick ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl LifecycleScanner {
    pub fn new(
        store: SharedStore,
        gateway: SharedGateway,
        channel_id: ChannelId,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            channel_id,
            interval,
            in_flight: AtomicBool::new(false),
        }
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    /// Scan forever. Errors are logged and the next tick tries again.
    pub async fn run(&self) {
        info!("Lifecycle scanner running every {:?}", self.interval);
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            match self.tick(Utc::now()).await {
                Ok(TickReport::Skipped) => warn!("Previous scan still running, skipping tick"),
                Ok(TickReport::Processed { closed, .. }) if closed.is_empty() => {
                    debug!("No playdates started")
                }
                Ok(report) => debug!("Scan finished: {:?}", report),
                Err(e) => error!("Playdate scan failed: {}", e),
            }
        }
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let Some(_guard) = self.try_begin() else {
            return Ok(TickReport::Skipped);
        };

        let due = self.store.due_playdates(now).await?;
        if !due.is_empty() {
            info!("Found {} playdate(s) starting", due.len());
        }

        let mut closed = Vec::with_capacity(due.len());
        let mut failed_announcements = 0;
        for playdate in due {
            if let Err(e) = self.announce_start(&playdate).await {
                error!("Failed to announce playdate {} ({}): {}", playdate.id, playdate.game, e);
                failed_announcements += 1;
            }

            match self.store.mark_done(playdate.id).await {
                Ok(()) => {
                    info!("Playdate {} ({}) is now done", playdate.id, playdate.game);
                    closed.push(playdate.id);
                }
                Err(e) => error!("Failed to mark playdate {} done: {}", playdate.id, e),
            }
        }

        Ok(TickReport::Processed {
            closed,
            failed_announcements,
        })
    }

    async fn announce_start(&self, playdate: &PlayDate) -> Result<()> {
        let mentions: String = self
            .store
            .attendees(playdate.id)
            .await?
            .iter()
            .filter(|a| a.attending.is_attending())
            .map(|a| a.player.mention())
            .collect();

        let owner = match self.store.find_player(playdate.owner_id).await? {
            Some(owner) => owner.mention(),
            None => {
                warn!("Owner {} of playdate {} not found", playdate.owner_id, playdate.id);
                "someone".to_string()
            }
        };

        let content = start_message(&defuse_mentions(&playdate.game), &owner, &mentions);
        self.gateway.send_message(self.channel_id, &content).await?;
        Ok(())
    }
}

fn start_message(game: &str, owner_mention: &str, mentions: &str) -> String {
    format!(
        "Playdate {} created by {} is happening now! Make sure to join :video_game:!\n{}",
        game, owner_mention, mentions
    )
}
