use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use super::PlayDateStore;
use crate::attendance::Attendance;
use crate::error::{PlayDateError, Result};
use crate::models::{Attendee, NewPlayDate, PlayDate, PlayDateStatus, Player};

#[derive(Default)]
struct Tables {
    next_playdate_id: i32,
    next_player_id: i32,
    playdates: BTreeMap<i32, PlayDate>,
    players: BTreeMap<i32, Player>,
    /// (playdate_id, player_id) -> vote
    attendance: HashMap<(i32, i32), Attendance>,
}

/// Volatile store with the same semantics as the Postgres schema
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl Tables {
    fn name_taken_by_other(&self, name: &str, discord_id: &str) -> bool {
        self.players
            .values()
            .any(|p| p.name == name && p.discord_id != discord_id)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attendance rows across all playdates
    pub fn attendance_rows(&self) -> usize {
        self.tables.read().attendance.len()
    }
}

#[async_trait]
impl PlayDateStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_playdate(&self, id: i32) -> Result<Option<PlayDate>> {
        Ok(self.tables.read().playdates.get(&id).cloned())
    }

    async fn find_playdate_by_message(&self, message_id: u64) -> Result<Option<PlayDate>> {
        let tables = self.tables.read();
        Ok(tables
            .playdates
            .values()
            .find(|p| p.message_id == Some(message_id as i64))
            .cloned())
    }

    async fn create_playdate(&self, new: NewPlayDate) -> Result<PlayDate> {
        let mut tables = self.tables.write();
        if !tables.players.contains_key(&new.owner_id) {
            return Err(PlayDateError::not_found("Player", new.owner_id));
        }
        tables.next_playdate_id += 1;
        let playdate = PlayDate {
            id: tables.next_playdate_id,
            created_date: Utc::now(),
            game: new.game,
            date: new.date,
            status: PlayDateStatus::Pending,
            owner_id: new.owner_id,
            message_id: None,
        };
        tables.playdates.insert(playdate.id, playdate.clone());
        Ok(playdate)
    }

    async fn set_announcement(&self, playdate_id: i32, message_id: u64) -> Result<()> {
        if let Some(playdate) = self.tables.write().playdates.get_mut(&playdate_id) {
            playdate.message_id = Some(message_id as i64);
        }
        Ok(())
    }

    async fn list_playdates(&self, status: PlayDateStatus) -> Result<Vec<PlayDate>> {
        let tables = self.tables.read();
        let mut playdates: Vec<PlayDate> = tables
            .playdates
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        playdates.sort_by_key(|p| (p.date, p.id));
        if status == PlayDateStatus::Done {
            playdates.reverse();
        }
        Ok(playdates)
    }

    async fn due_playdates(&self, now: DateTime<Utc>) -> Result<Vec<PlayDate>> {
        let tables = self.tables.read();
        let mut due: Vec<PlayDate> = tables
            .playdates
            .values()
            .filter(|p| p.status == PlayDateStatus::Pending && p.date <= now)
            .cloned()
            .collect();
        due.sort_by_key(|p| p.date);
        Ok(due)
    }

    async fn mark_done(&self, playdate_id: i32) -> Result<()> {
        if let Some(playdate) = self.tables.write().playdates.get_mut(&playdate_id) {
            playdate.status = PlayDateStatus::Done;
        }
        Ok(())
    }

    async fn find_player(&self, id: i32) -> Result<Option<Player>> {
        Ok(self.tables.read().players.get(&id).cloned())
    }

    async fn find_player_by_discord_id(&self, discord_id: &str) -> Result<Option<Player>> {
        let tables = self.tables.read();
        Ok(tables
            .players
            .values()
            .find(|p| p.discord_id == discord_id)
            .cloned())
    }

    async fn find_player_by_name(&self, name: &str) -> Result<Option<Player>> {
        let tables = self.tables.read();
        Ok(tables.players.values().find(|p| p.name == name).cloned())
    }

    async fn find_player_by_session(&self, session_id: &str) -> Result<Option<Player>> {
        let tables = self.tables.read();
        Ok(tables
            .players
            .values()
            .find(|p| p.session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn register_player(
        &self,
        name: &str,
        discord_id: &str,
        verification_code: &str,
    ) -> Result<Player> {
        let mut tables = self.tables.write();
        if tables.name_taken_by_other(name, discord_id) {
            return Err(PlayDateError::NameTaken {
                name: name.to_string(),
            });
        }
        if let Some(existing) = tables
            .players
            .values_mut()
            .find(|p| p.discord_id == discord_id)
        {
            existing.name = name.to_string();
            existing.verification_code = verification_code.to_string();
            return Ok(existing.clone());
        }

        tables.next_player_id += 1;
        let player = Player {
            id: tables.next_player_id,
            created_date: Utc::now(),
            name: name.to_string(),
            discord_id: discord_id.to_string(),
            verification_code: verification_code.to_string(),
            session_id: None,
            oauth_token: None,
        };
        tables.players.insert(player.id, player.clone());
        Ok(player)
    }

    async fn upsert_oauth_player(
        &self,
        name: &str,
        discord_id: &str,
        oauth_token: &str,
        session_id: &str,
    ) -> Result<Player> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables
            .players
            .values_mut()
            .find(|p| p.discord_id == discord_id)
        {
            existing.oauth_token = Some(oauth_token.to_string());
            existing.session_id = Some(session_id.to_string());
            return Ok(existing.clone());
        }
        if tables.name_taken_by_other(name, discord_id) {
            return Err(PlayDateError::NameTaken {
                name: name.to_string(),
            });
        }

        tables.next_player_id += 1;
        let player = Player {
            id: tables.next_player_id,
            created_date: Utc::now(),
            name: name.to_string(),
            discord_id: discord_id.to_string(),
            verification_code: uuid::Uuid::new_v4().to_string(),
            session_id: Some(session_id.to_string()),
            oauth_token: Some(oauth_token.to_string()),
        };
        tables.players.insert(player.id, player.clone());
        Ok(player)
    }

    async fn set_session(&self, player_id: i32, session_id: &str) -> Result<()> {
        match self.tables.write().players.get_mut(&player_id) {
            Some(player) => {
                player.session_id = Some(session_id.to_string());
                Ok(())
            }
            None => Err(PlayDateError::not_found("Player", player_id)),
        }
    }

    async fn clear_session(&self, session_id: &str) -> Result<()> {
        let mut tables = self.tables.write();
        for player in tables.players.values_mut() {
            if player.session_id.as_deref() == Some(session_id) {
                player.session_id = None;
            }
        }
        Ok(())
    }

    async fn upsert_attendance(
        &self,
        playdate_id: i32,
        player_id: i32,
        attending: Attendance,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.playdates.contains_key(&playdate_id) {
            return Err(PlayDateError::not_found("Playdate", playdate_id));
        }
        if !tables.players.contains_key(&player_id) {
            return Err(PlayDateError::not_found("Player", player_id));
        }
        tables.attendance.insert((playdate_id, player_id), attending);
        Ok(())
    }

    async fn attendees(&self, playdate_id: i32) -> Result<Vec<Attendee>> {
        let tables = self.tables.read();
        let mut attendees: Vec<Attendee> = tables
            .attendance
            .iter()
            .filter(|((pd, _), _)| *pd == playdate_id)
            .filter_map(|((_, player_id), attending)| {
                tables.players.get(player_id).map(|player| Attendee {
                    player: player.clone(),
                    attending: *attending,
                })
            })
            .collect();
        attendees.sort_by(|a, b| a.player.name.cmp(&b.player.name));
        Ok(attendees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded() -> (MemoryStore, Player, PlayDate) {
        let store = MemoryStore::new();
        let owner = store.register_player("owner", "100", "code").await.unwrap();
        let playdate = store
            .create_playdate(NewPlayDate {
                game: "Factorio".to_string(),
                date: Utc::now() + Duration::hours(1),
                owner_id: owner.id,
            })
            .await
            .unwrap();
        (store, owner, playdate)
    }

    #[tokio::test]
    async fn test_revote_overwrites_single_row() {
        let (store, owner, playdate) = seeded().await;

        store
            .upsert_attendance(playdate.id, owner.id, Attendance::Yes)
            .await
            .unwrap();
        store
            .upsert_attendance(playdate.id, owner.id, Attendance::Maybe)
            .await
            .unwrap();

        let attendees = store.attendees(playdate.id).await.unwrap();
        assert_eq!(store.attendance_rows(), 1);
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].attending, Attendance::Maybe);
    }

    #[tokio::test]
    async fn test_register_refreshes_code_for_same_discord_id() {
        let store = MemoryStore::new();
        let first = store.register_player("alice", "200", "one").await.unwrap();
        let second = store.register_player("alice", "200", "two").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.verification_code, "two");
    }

    #[tokio::test]
    async fn test_names_are_unique_across_discord_ids() {
        let store = MemoryStore::new();
        store.register_player("alice", "200", "one").await.unwrap();

        let clash = store.register_player("alice", "201", "two").await;
        assert!(matches!(clash, Err(PlayDateError::NameTaken { .. })));

        let clash = store.upsert_oauth_player("alice", "202", "token", "s").await;
        assert!(matches!(clash, Err(PlayDateError::NameTaken { .. })));
        assert!(store.find_player_by_discord_id("202").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_due_playdates_skip_future_and_done() {
        let (store, owner, future) = seeded().await;
        let now = Utc::now();
        let past = store
            .create_playdate(NewPlayDate {
                game: "Halo".to_string(),
                date: now - Duration::minutes(1),
                owner_id: owner.id,
            })
            .await
            .unwrap();
        let finished = store
            .create_playdate(NewPlayDate {
                game: "Doom".to_string(),
                date: now - Duration::minutes(5),
                owner_id: owner.id,
            })
            .await
            .unwrap();
        store.mark_done(finished.id).await.unwrap();

        let due = store.due_playdates(now).await.unwrap();
        let ids: Vec<i32> = due.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![past.id]);
        assert!(!ids.contains(&future.id));
    }

    #[tokio::test]
    async fn test_sessions() {
        let store = MemoryStore::new();
        let player = store.register_player("bob", "300", "code").await.unwrap();

        store.set_session(player.id, "session-1").await.unwrap();
        assert_eq!(
            store.find_player_by_session("session-1").await.unwrap().map(|p| p.id),
            Some(player.id)
        );

        store.clear_session("session-1").await.unwrap();
        assert!(store.find_player_by_session("session-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_by_announcement_message() {
        let (store, _, playdate) = seeded().await;
        store.set_announcement(playdate.id, 555).await.unwrap();

        let found = store.find_playdate_by_message(555).await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(playdate.id));
        assert!(store.find_playdate_by_message(556).await.unwrap().is_none());
    }
}
