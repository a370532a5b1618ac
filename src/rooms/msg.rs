use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSummary {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinSession { session_id: String, username: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    SessionJoined {
        session_id: String,
        user_id: String,
        participants: Vec<String>,
    },
    UsernameTaken,
    SessionNotFound,
    ExistingPeers {
        peer_ids: Vec<PeerSummary>,
    },
    Message(RoomNotice),
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RoomNotice {
    UserJoined {
        username: String,
        user_id: String,
        peer_id: String,
    },
    UserLeft {
        username: String,
        user_id: String,
    },
}
