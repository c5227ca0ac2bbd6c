// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attendance::Attendance;

/// Lifecycle of a playdate. Only ever moves from `Pending` to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayDateStatus {
    Pending,
    Done,
}

impl PlayDateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayDateStatus::Pending => "pending",
            PlayDateStatus::Done => "done",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl TryFrom<String> for PlayDateStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(PlayDateStatus::Pending),
            "done" => Ok(PlayDateStatus::Done),
            _ => Err(UnknownVariant {
                kind: "playdate status",
                value,
            }),
        }
    }
}

/// A scheduled gaming session
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayDate {
    pub id: i32,
    pub created_date: DateTime<Utc>,
    pub game: String,
    /// Scheduled start
    pub date: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: PlayDateStatus,
    pub owner_id: i32,
    /// Discord message the playdate was announced in
    pub message_id: Option<i64>,
}

impl PlayDate {
    pub fn is_pending(&self) -> bool {
        self.status == PlayDateStatus::Pending
    }
}

/// Fields needed to create a playdate
#[derive(Debug, Clone)]
pub struct NewPlayDate {
    pub game: String,
    pub date: DateTime<Utc>,
    pub owner_id: i32,
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Player {
    pub id: i32,
    pub created_date: DateTime<Utc>,
    pub name: String,
    /// Discord user ID (snowflake as string)
    pub discord_id: String,
    #[serde(skip)]
    pub verification_code: String,
    #[serde(skip)]
    pub session_id: Option<String>,
    #[serde(skip)]
    pub oauth_token: Option<String>,
}

impl Player {
    /// Discord mention markup for this player
    pub fn mention(&self) -> String {
        format!("<@{}>", self.discord_id)
    }
}

/// A player together with their vote on one playdate
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Attendee {
    #[sqlx(flatten)]
    pub player: Player,
    #[sqlx(try_from = "String")]
    pub attending: Attendance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(
            PlayDateStatus::try_from("pending".to_string()).unwrap(),
            PlayDateStatus::Pending
        );
        assert_eq!(
            PlayDateStatus::try_from("done".to_string()).unwrap(),
            PlayDateStatus::Done
        );
        assert!(PlayDateStatus::try_from("cancelled".to_string()).is_err());
    }

    #[test]
    fn test_player_mention() {
        let player = Player {
            id: 1,
            created_date: Utc::now(),
            name: "colin".to_string(),
            discord_id: "128629520742744065".to_string(),
            verification_code: String::new(),
            session_id: None,
            oauth_token: None,
        };
        assert_eq!(player.mention(), "<@128629520742744065>");
    }
}
