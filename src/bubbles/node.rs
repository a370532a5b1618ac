use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::rooms::msg::{PeerSummary, RoomNotice};

use super::{
    bubble::now_millis,
    event::PeerEvent,
    mesh::{LinkError, MeshRelay, Registered, Transport},
    replica::{Replica, ReplicaError},
};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Replica(#[from] ReplicaError),
    #[error(transparent)]
    Link(#[from] LinkError),
}

pub struct PeerNode<T: Transport> {
    replica: Replica,
    relay: MeshRelay<T::Link>,
    transport: T,
}

impl<T: Transport> PeerNode<T> {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, transport: T) -> Self {
        let user_id = user_id.into();
        Self {
            replica: Replica::new(user_id.clone(), username),
            relay: MeshRelay::new(user_id),
            transport,
        }
    }

    pub fn user_id(&self) -> &str {
        self.replica.local_id()
    }

    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    pub fn relay(&self) -> &MeshRelay<T::Link> {
        &self.relay
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn claim(&mut self, bubble_id: &str) -> Result<usize, NodeError> {
        let event = self.replica.claim(bubble_id, now_millis())?;
        Ok(self.relay.broadcast(&event)?)
    }

    pub fn edit(&mut self, bubble_id: &str, text: impl Into<String>) -> Result<usize, NodeError> {
        let event = self.replica.edit(bubble_id, text.into(), now_millis())?;
        Ok(self.relay.broadcast(&event)?)
    }

    pub fn finalize(&mut self, bubble_id: &str) -> Result<usize, NodeError> {
        let event = self.replica.finalize(bubble_id, now_millis())?;
        Ok(self.relay.broadcast(&event)?)
    }

    pub fn request_sync(&mut self) -> Result<usize, NodeError> {
        let event = self.replica.request_sync_event();
        Ok(self.relay.broadcast(&event)?)
    }

    pub fn connect(&mut self, peer_id: &str) -> bool {
        match self.relay.connect(&self.transport, peer_id) {
            Ok(started) => started,
            Err(err) => {
                warn!(peer_id, error = %err, "could not dial peer");
                false
            }
        }
    }

    pub fn on_existing_peers(&mut self, peers: &[PeerSummary]) {
        for peer in peers {
            self.connect(&peer.id);
        }
    }

    pub fn on_notice(&mut self, notice: &RoomNotice) {
        match notice {
            RoomNotice::UserJoined {
                username, peer_id, ..
            } => {
                info!(peer_id = %peer_id, username = %username, "peer joined the room");
                self.connect(peer_id);
            }
            RoomNotice::UserLeft { username, user_id } => {
                info!(peer_id = %user_id, username = %username, "peer left the room");
                self.relay.disconnect(user_id);
            }
        }
    }

    pub fn on_link_accepted(&mut self, link: T::Link) -> Registered {
        self.relay.accept(link)
    }

    pub fn on_link_open(&mut self, peer_id: &str, link_id: Uuid) {
        if !self.relay.mark_open(peer_id, link_id) {
            return;
        }
        debug!(peer_id, "peer link open, sending sync");
        let sync = self.replica.sync_event();
        if let Err(err) = self.relay.send_to(peer_id, &sync) {
            warn!(peer_id, error = %err, "failed to send sync on open");
        }
    }

    pub fn on_link_closed(&mut self, peer_id: &str, link_id: Uuid) {
        if self.relay.mark_closed(peer_id, link_id) {
            debug!(peer_id, "peer link closed");
        }
    }

    pub fn on_message(&mut self, from: &str, raw: &str) {
        let event = match PeerEvent::decode(raw) {
            Ok(event) => event,
            Err(err) => {
                warn!(peer_id = from, error = %err, "dropping malformed peer event");
                return;
            }
        };
        debug!(peer_id = from, kind = event.kind(), "peer event");
        if let Some(reply) = self.replica.apply(event) {
            if let Err(err) = self.relay.send_to(&reply.to, &reply.event) {
                warn!(peer_id = %reply.to, error = %err, "failed to answer sync request");
            }
        }
    }
}
