use tracing::{debug, info};

use crate::store::Store;

use super::{
    directory::RoomError,
    msg::{PeerSummary, RoomNotice, ServerEvent},
    peers::ConnectionId,
};

pub fn join(store: &mut Store, connection: ConnectionId, session_id: &str, username: &str) {
    if let Some(user_id) = store.peers.user_of(connection) {
        debug!(%connection, user_id, "join on an already joined connection");
        store.peers.send(
            connection,
            ServerEvent::Error {
                message: "already joined a session on this connection".to_owned(),
            },
        );
        return;
    }

    let member = match store.rooms.join(session_id, username, connection) {
        Ok(member) => member,
        Err(err) => {
            info!(%connection, session_id, username, error = %err, "join rejected");
            let reply = match err {
                RoomError::SessionNotFound(_) => ServerEvent::SessionNotFound,
                RoomError::UsernameTaken { .. } => ServerEvent::UsernameTaken,
            };
            store.peers.send(connection, reply);
            return;
        }
    };
    store.peers.bind(connection, &member.user_id);

    let participants = store
        .rooms
        .get_room(session_id)
        .map(|session| session.participants.clone())
        .unwrap_or_default();
    let others: Vec<(ConnectionId, PeerSummary)> = store
        .rooms
        .members_of(session_id)
        .into_iter()
        .filter(|m| m.user_id != member.user_id)
        .map(|m| {
            (
                m.connection,
                PeerSummary {
                    id: m.user_id.clone(),
                    username: m.username.clone(),
                },
            )
        })
        .collect();

    info!(
        session_id,
        user_id = %member.user_id,
        username,
        peers = others.len(),
        "member joined"
    );

    store.peers.send(
        connection,
        ServerEvent::SessionJoined {
            session_id: session_id.to_owned(),
            user_id: member.user_id.clone(),
            participants,
        },
    );
    store.peers.send(
        connection,
        ServerEvent::ExistingPeers {
            peer_ids: others.iter().map(|(_, peer)| peer.clone()).collect(),
        },
    );

    let notice = ServerEvent::Message(RoomNotice::UserJoined {
        username: member.username.clone(),
        user_id: member.user_id.clone(),
        peer_id: member.user_id.clone(),
    });
    for (other, _) in &others {
        store.peers.send(*other, notice.clone());
    }
}

pub fn invalid_frame(store: &Store, connection: ConnectionId, detail: &str) {
    store.peers.send(
        connection,
        ServerEvent::Error {
            message: format!("invalid message: {detail}"),
        },
    );
}

pub fn disconnect(store: &mut Store, connection: ConnectionId) {
    let Some(user_id) = store.peers.unregister(connection) else {
        debug!(%connection, "connection closed before joining");
        return;
    };
    let Some(member) = store.rooms.leave(&user_id) else {
        return;
    };
    info!(
        session_id = %member.session_id,
        user_id = %member.user_id,
        username = %member.username,
        "member left"
    );

    let notice = ServerEvent::Message(RoomNotice::UserLeft {
        username: member.username.clone(),
        user_id: member.user_id.clone(),
    });
    let remaining: Vec<ConnectionId> = store
        .rooms
        .members_of(&member.session_id)
        .into_iter()
        .map(|m| m.connection)
        .collect();
    for other in remaining {
        store.peers.send(other, notice.clone());
    }
}
