use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use rand::Rng;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::peers::ConnectionId;

const SESSION_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SESSION_CODE_LEN: usize = 9;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("session {0} not found")]
    SessionNotFound(String),
    #[error("username {username} is already taken in session {session_id}")]
    UsernameTaken {
        session_id: String,
        username: String,
    },
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: OffsetDateTime,
    pub participants: Vec<String>,
    empty_since: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: String,
    pub username: String,
    pub connection: ConnectionId,
    pub session_id: String,
}

#[derive(Debug, Default)]
pub struct RoomDirectory {
    sessions: HashMap<String, Session>,
    members: HashMap<String, Member>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_room(&mut self) -> String {
        let mut id = generate_session_code();
        while self.sessions.contains_key(&id) {
            id = generate_session_code();
        }
        self.sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                created_at: OffsetDateTime::now_utc(),
                participants: Vec::new(),
                empty_since: Some(Instant::now()),
            },
        );
        id
    }

    pub fn get_room(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn join(
        &mut self,
        session_id: &str,
        username: &str,
        connection: ConnectionId,
    ) -> Result<Member, RoomError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RoomError::SessionNotFound(session_id.to_owned()))?;
        if session.participants.iter().any(|name| name == username) {
            return Err(RoomError::UsernameTaken {
                session_id: session_id.to_owned(),
                username: username.to_owned(),
            });
        }

        session.participants.push(username.to_owned());
        session.empty_since = None;

        let member = Member {
            user_id: Uuid::new_v4().to_string(),
            username: username.to_owned(),
            connection,
            session_id: session_id.to_owned(),
        };
        self.members.insert(member.user_id.clone(), member.clone());
        Ok(member)
    }

    pub fn leave(&mut self, user_id: &str) -> Option<Member> {
        let member = self.members.remove(user_id)?;
        if let Some(session) = self.sessions.get_mut(&member.session_id) {
            session.participants.retain(|name| name != &member.username);
            if session.participants.is_empty() {
                session.empty_since = Some(Instant::now());
            }
        }
        Some(member)
    }

    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.get(user_id)
    }

    pub fn members_of(&self, session_id: &str) -> Vec<&Member> {
        let Some(session) = self.sessions.get(session_id) else {
            return Vec::new();
        };
        session
            .participants
            .iter()
            .filter_map(|name| {
                self.members
                    .values()
                    .find(|m| m.session_id == session_id && &m.username == name)
            })
            .collect()
    }

    pub fn reap_empty(&mut self, ttl: Duration, now: Instant) -> Vec<String> {
        let expired: Vec<String> = self
            .sessions
            .values()
            .filter(|s| {
                s.empty_since
                    .is_some_and(|since| now.saturating_duration_since(since) >= ttl)
            })
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            self.sessions.remove(id);
        }
        expired
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

fn generate_session_code() -> String {
    let mut rng = rand::rng();
    (0..SESSION_CODE_LEN)
        .map(|_| SESSION_CODE_ALPHABET[rng.random_range(0..SESSION_CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_codes_are_uppercase_alphanumeric() {
        let mut rooms = RoomDirectory::new();
        let id = rooms.create_room();
        assert!((8..=9).contains(&id.len()));
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert!(rooms.get_room(&id).unwrap().participants.is_empty());
    }

    #[test]
    fn join_unknown_session_fails() {
        let mut rooms = RoomDirectory::new();
        assert_eq!(
            rooms.join("NOPE", "alice", Uuid::new_v4()),
            Err(RoomError::SessionNotFound("NOPE".into()))
        );
    }

    #[test]
    fn first_registered_username_wins() {
        let mut rooms = RoomDirectory::new();
        let id = rooms.create_room();
        rooms.join(&id, "alice", Uuid::new_v4()).unwrap();
        let err = rooms.join(&id, "alice", Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, RoomError::UsernameTaken { .. }));
        assert_eq!(rooms.get_room(&id).unwrap().participants, vec!["alice"]);
        assert_eq!(rooms.member_count(), 1);
    }

    #[test]
    fn usernames_are_case_sensitive_and_scoped_to_a_session() {
        let mut rooms = RoomDirectory::new();
        let first = rooms.create_room();
        let second = rooms.create_room();
        rooms.join(&first, "alice", Uuid::new_v4()).unwrap();
        rooms.join(&first, "Alice", Uuid::new_v4()).unwrap();
        rooms.join(&second, "alice", Uuid::new_v4()).unwrap();
        assert_eq!(rooms.member_count(), 3);
    }

    #[test]
    fn leave_frees_the_username() {
        let mut rooms = RoomDirectory::new();
        let id = rooms.create_room();
        let alice = rooms.join(&id, "alice", Uuid::new_v4()).unwrap();
        assert_eq!(rooms.leave(&alice.user_id), Some(alice.clone()));
        assert!(rooms.leave(&alice.user_id).is_none());
        assert!(rooms.join(&id, "alice", Uuid::new_v4()).is_ok());
    }

    #[test]
    fn members_of_follows_join_order() {
        let mut rooms = RoomDirectory::new();
        let id = rooms.create_room();
        for name in ["carol", "alice", "bob"] {
            rooms.join(&id, name, Uuid::new_v4()).unwrap();
        }
        let names: Vec<_> = rooms.members_of(&id).iter().map(|m| m.username.as_str()).collect();
        assert_eq!(names, ["carol", "alice", "bob"]);
    }

    #[test]
    fn only_sessions_empty_past_ttl_are_reaped() {
        let mut rooms = RoomDirectory::new();
        let busy = rooms.create_room();
        let idle = rooms.create_room();
        rooms.join(&busy, "alice", Uuid::new_v4()).unwrap();

        let later = Instant::now() + Duration::from_secs(120);
        assert!(rooms.reap_empty(Duration::from_secs(600), later).is_empty());
        assert_eq!(rooms.reap_empty(Duration::from_secs(60), later), vec![idle.clone()]);
        assert!(rooms.get_room(&idle).is_none());
        assert!(rooms.get_room(&busy).is_some());
    }
}
