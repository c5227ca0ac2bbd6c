//! Persistence boundary
//!
//! Three logical tables (playdate, player, playdate_player) behind the
//! [`PlayDateStore`] trait. `PgStore` is the production backend; `MemoryStore`
//! keeps the same semantics in process for local runs and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::attendance::Attendance;
use crate::error::Result;
use crate::models::{Attendee, NewPlayDate, PlayDate, PlayDateStatus, Player};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait PlayDateStore: Send + Sync {
    /// Round-trip to the backend (health check)
    async fn ping(&self) -> Result<()>;

    // Playdates
    async fn find_playdate(&self, id: i32) -> Result<Option<PlayDate>>;
    async fn find_playdate_by_message(&self, message_id: u64) -> Result<Option<PlayDate>>;
    async fn create_playdate(&self, new: NewPlayDate) -> Result<PlayDate>;
    /// Remember which Discord message announced the playdate
    async fn set_announcement(&self, playdate_id: i32, message_id: u64) -> Result<()>;
    /// Pending playdates come back soonest first, done ones most recent first
    async fn list_playdates(&self, status: PlayDateStatus) -> Result<Vec<PlayDate>>;
    /// Pending playdates whose start is at or before `now`
    async fn due_playdates(&self, now: DateTime<Utc>) -> Result<Vec<PlayDate>>;
    /// Set status to done by primary key, unconditionally
    async fn mark_done(&self, playdate_id: i32) -> Result<()>;

    // Players
    async fn find_player(&self, id: i32) -> Result<Option<Player>>;
    async fn find_player_by_discord_id(&self, discord_id: &str) -> Result<Option<Player>>;
    async fn find_player_by_name(&self, name: &str) -> Result<Option<Player>>;
    async fn find_player_by_session(&self, session_id: &str) -> Result<Option<Player>>;
    /// Insert a player, or refresh the verification code (and name) of the
    /// player that already owns `discord_id`
    async fn register_player(
        &self,
        name: &str,
        discord_id: &str,
        verification_code: &str,
    ) -> Result<Player>;
    /// Insert a player from the OAuth flow, or refresh token and session of
    /// the player that already owns `discord_id`
    async fn upsert_oauth_player(
        &self,
        name: &str,
        discord_id: &str,
        oauth_token: &str,
        session_id: &str,
    ) -> Result<Player>;
    async fn set_session(&self, player_id: i32, session_id: &str) -> Result<()>;
    async fn clear_session(&self, session_id: &str) -> Result<()>;

    // Attendance
    /// One row per (playdate, player); a second vote overwrites `attending`
    async fn upsert_attendance(
        &self,
        playdate_id: i32,
        player_id: i32,
        attending: Attendance,
    ) -> Result<()>;
    async fn attendees(&self, playdate_id: i32) -> Result<Vec<Attendee>>;
}

/// Shared store handle
pub type SharedStore = Arc<dyn PlayDateStore>;
