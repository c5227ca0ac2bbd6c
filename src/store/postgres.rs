use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use super::PlayDateStore;
use crate::attendance::Attendance;
use crate::error::{PlayDateError, Result};
use crate::models::{Attendee, NewPlayDate, PlayDate, PlayDateStatus, Player};

const PLAYDATE_COLUMNS: &str = "id, created_date, game, date, status, owner_id, message_id";
const PLAYER_COLUMNS: &str =
    "id, created_date, name, discord_id, verification_code, session_id, oauth_token";

/// Turn a violation of the unique player name into `NameTaken`
fn name_conflict(name: &str) -> impl FnOnce(sqlx::Error) -> PlayDateError + '_ {
    move |err| {
        let constraint = err.as_database_error().and_then(|db| db.constraint());
        if constraint == Some("player_name_key") {
            PlayDateError::NameTaken {
                name: name.to_string(),
            }
        } else {
            err.into()
        }
    }
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, then bring the schema up to date
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Connected to Postgres and applied migrations");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl PlayDateStore for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_playdate(&self, id: i32) -> Result<Option<PlayDate>> {
        let playdate = sqlx::query_as::<_, PlayDate>(&format!(
            "SELECT {PLAYDATE_COLUMNS} FROM playdate WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(playdate)
    }

    async fn find_playdate_by_message(&self, message_id: u64) -> Result<Option<PlayDate>> {
        let playdate = sqlx::query_as::<_, PlayDate>(&format!(
            "SELECT {PLAYDATE_COLUMNS} FROM playdate WHERE message_id = $1"
        ))
        .bind(message_id as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(playdate)
    }

    async fn create_playdate(&self, new: NewPlayDate) -> Result<PlayDate> {
        let playdate = sqlx::query_as::<_, PlayDate>(&format!(
            r#"
            INSERT INTO playdate (game, date, status, owner_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {PLAYDATE_COLUMNS}
            "#
        ))
        .bind(&new.game)
        .bind(new.date)
        .bind(PlayDateStatus::Pending.as_str())
        .bind(new.owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(playdate)
    }

    async fn set_announcement(&self, playdate_id: i32, message_id: u64) -> Result<()> {
        sqlx::query("UPDATE playdate SET message_id = $2 WHERE id = $1")
            .bind(playdate_id)
            .bind(message_id as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_playdates(&self, status: PlayDateStatus) -> Result<Vec<PlayDate>> {
        let order = match status {
            PlayDateStatus::Pending => "ASC",
            PlayDateStatus::Done => "DESC",
        };
        let playdates = sqlx::query_as::<_, PlayDate>(&format!(
            "SELECT {PLAYDATE_COLUMNS} FROM playdate WHERE status = $1 ORDER BY date {order}, id {order}"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(playdates)
    }

    async fn due_playdates(&self, now: DateTime<Utc>) -> Result<Vec<PlayDate>> {
        let playdates = sqlx::query_as::<_, PlayDate>(&format!(
            r#"
            SELECT {PLAYDATE_COLUMNS} FROM playdate
            WHERE status = $1 AND date <= $2
            ORDER BY date ASC
            "#
        ))
        .bind(PlayDateStatus::Pending.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(playdates)
    }

    async fn mark_done(&self, playdate_id: i32) -> Result<()> {
        sqlx::query("UPDATE playdate SET status = $2 WHERE id = $1")
            .bind(playdate_id)
            .bind(PlayDateStatus::Done.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_player(&self, id: i32) -> Result<Option<Player>> {
        let player = sqlx::query_as::<_, Player>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(player)
    }

    async fn find_player_by_discord_id(&self, discord_id: &str) -> Result<Option<Player>> {
        let player = sqlx::query_as::<_, Player>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player WHERE discord_id = $1"
        ))
        .bind(discord_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(player)
    }

    async fn find_player_by_name(&self, name: &str) -> Result<Option<Player>> {
        let player = sqlx::query_as::<_, Player>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(player)
    }

    async fn find_player_by_session(&self, session_id: &str) -> Result<Option<Player>> {
        let player = sqlx::query_as::<_, Player>(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player WHERE session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(player)
    }

    async fn register_player(
        &self,
        name: &str,
        discord_id: &str,
        verification_code: &str,
    ) -> Result<Player> {
        let player = sqlx::query_as::<_, Player>(&format!(
            r#"
            INSERT INTO player (name, discord_id, verification_code)
            VALUES ($1, $2, $3)
            ON CONFLICT (discord_id) DO UPDATE
            SET name = EXCLUDED.name, verification_code = EXCLUDED.verification_code
            RETURNING {PLAYER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(discord_id)
        .bind(verification_code)
        .fetch_one(&self.pool)
        .await
        .map_err(name_conflict(name))?;
        Ok(player)
    }

    async fn upsert_oauth_player(
        &self,
        name: &str,
        discord_id: &str,
        oauth_token: &str,
        session_id: &str,
    ) -> Result<Player> {
        let player = sqlx::query_as::<_, Player>(&format!(
            r#"
            INSERT INTO player (name, discord_id, verification_code, oauth_token, session_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (discord_id) DO UPDATE
            SET oauth_token = EXCLUDED.oauth_token, session_id = EXCLUDED.session_id
            RETURNING {PLAYER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(discord_id)
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(oauth_token)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(name_conflict(name))?;
        Ok(player)
    }

    async fn set_session(&self, player_id: i32, session_id: &str) -> Result<()> {
        sqlx::query("UPDATE player SET session_id = $2 WHERE id = $1")
            .bind(player_id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_session(&self, session_id: &str) -> Result<()> {
        sqlx::query("UPDATE player SET session_id = NULL WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_attendance(
        &self,
        playdate_id: i32,
        player_id: i32,
        attending: Attendance,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO playdate_player (playdate_id, player_id, attending)
            VALUES ($1, $2, $3)
            ON CONFLICT (playdate_id, player_id) DO UPDATE
            SET attending = EXCLUDED.attending
            "#,
        )
        .bind(playdate_id)
        .bind(player_id)
        .bind(attending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn attendees(&self, playdate_id: i32) -> Result<Vec<Attendee>> {
        let attendees = sqlx::query_as::<_, Attendee>(
            r#"
            SELECT p.id, p.created_date, p.name, p.discord_id, p.verification_code,
                   p.session_id, p.oauth_token, pp.attending
            FROM playdate_player pp
            JOIN player p ON p.id = pp.player_id
            WHERE pp.playdate_id = $1
            ORDER BY p.name ASC
            "#,
        )
        .bind(playdate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attendees)
    }
}
