//! Attendance: votes, the reaction reconciler and reaction sync

pub mod reconciler;
pub mod sync;
pub mod vote;

pub use reconciler::{AttendanceReconciler, ReactionNotice};
pub use sync::seed_reactions;
pub use vote::Attendance;

use tracing::info;

use crate::error::{PlayDateError, Result};
use crate::models::{PlayDate, Player};
use crate::store::PlayDateStore;

/// Everything a vote needs, resolved up front by the caller
#[derive(Debug, Clone, Copy)]
pub struct VoteContext<'a> {
    pub actor: &'a Player,
    pub playdate: &'a PlayDate,
    pub vote: Attendance,
}

/// The single write path for attendance, shared by reactions and the web UI.
///
/// Playdates that already happened refuse new votes.
pub async fn record_vote(store: &dyn PlayDateStore, ctx: &VoteContext<'_>) -> Result<()> {
    if !ctx.playdate.is_pending() {
        return Err(PlayDateError::PlayDateClosed {
            id: ctx.playdate.id,
        });
    }

    store
        .upsert_attendance(ctx.playdate.id, ctx.actor.id, ctx.vote)
        .await?;

    info!(
        "{} voted {} for playdate {} ({})",
        ctx.actor.name, ctx.vote, ctx.playdate.id, ctx.playdate.game
    );
    Ok(())
}
