//! Direct peer links of one client and best-effort fan-out over them.
//!
//! Every link is tracked as `Connecting -> Open -> Closed`. Only `Open`
//! links receive broadcasts; anything sent while a link is still connecting
//! is lost, and the peers recover through `bubble-sync`.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::event::PeerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Outbound,
    Inbound,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no open link to peer {0}")]
    NotOpen(String),
    #[error("link {0} is closed")]
    Closed(Uuid),
    #[error("failed to encode peer event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(String),
}

pub trait PeerLink {
    fn link_id(&self) -> Uuid;
    fn peer_id(&self) -> &str;
    fn send(&self, payload: &str) -> Result<(), LinkError>;
    fn close(&self);
}

pub trait Transport {
    type Link: PeerLink;

    fn connect(&self, local_id: &str, peer_id: &str) -> Result<Self::Link, LinkError>;
}

struct LinkEntry<L> {
    link: L,
    state: LinkState,
    direction: LinkDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    Active,
    Duplicate,
    SelfLink,
}

pub struct MeshRelay<L: PeerLink> {
    local_id: String,
    links: HashMap<String, LinkEntry<L>>,
}

impl<L: PeerLink> MeshRelay<L> {
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            links: HashMap::new(),
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn connect<T>(&mut self, transport: &T, peer_id: &str) -> Result<bool, LinkError>
    where
        T: Transport<Link = L>,
    {
        if peer_id == self.local_id || self.links.contains_key(peer_id) {
            return Ok(false);
        }
        let link = transport.connect(&self.local_id, peer_id)?;
        debug!(peer_id, link_id = %link.link_id(), "dialing peer");
        Ok(self.register(link, LinkDirection::Outbound) == Registered::Active)
    }

    pub fn accept(&mut self, link: L) -> Registered {
        self.register(link, LinkDirection::Inbound)
    }

    fn register(&mut self, link: L, direction: LinkDirection) -> Registered {
        let peer_id = link.peer_id().to_owned();
        if peer_id == self.local_id {
            link.close();
            return Registered::SelfLink;
        }

        if let Some(existing) = self.links.get(&peer_id) {
            // Both sides dialed at once. Keep the link initiated by the
            // lower id, even over one that is already open.
            let keep_existing = existing.direction == direction
                || existing.direction == self.preferred_direction(&peer_id);
            if keep_existing {
                debug!(peer_id = %peer_id, link_id = %link.link_id(), "closing duplicate link");
                link.close();
                return Registered::Duplicate;
            }
            if let Some(replaced) = self.links.remove(&peer_id) {
                debug!(peer_id = %peer_id, link_id = %replaced.link.link_id(), "closing duplicate link");
                replaced.link.close();
            }
        }

        self.links.insert(
            peer_id,
            LinkEntry {
                link,
                state: LinkState::Connecting,
                direction,
            },
        );
        Registered::Active
    }

    fn preferred_direction(&self, peer_id: &str) -> LinkDirection {
        if self.local_id.as_str() < peer_id {
            LinkDirection::Outbound
        } else {
            LinkDirection::Inbound
        }
    }

    pub fn mark_open(&mut self, peer_id: &str, link_id: Uuid) -> bool {
        match self.links.get_mut(peer_id) {
            Some(entry) if entry.link.link_id() == link_id && entry.state == LinkState::Connecting => {
                entry.state = LinkState::Open;
                true
            }
            _ => false,
        }
    }

    pub fn mark_closed(&mut self, peer_id: &str, link_id: Uuid) -> bool {
        let tracked = self
            .links
            .get(peer_id)
            .is_some_and(|entry| entry.link.link_id() == link_id);
        if tracked {
            self.links.remove(peer_id);
        }
        tracked
    }

    pub fn disconnect(&mut self, peer_id: &str) {
        if let Some(entry) = self.links.remove(peer_id) {
            entry.link.close();
        }
    }

    pub fn state(&self, peer_id: &str) -> LinkState {
        self.links
            .get(peer_id)
            .map(|entry| entry.state)
            .unwrap_or(LinkState::Closed)
    }

    pub fn open_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self
            .links
            .iter()
            .filter(|(_, entry)| entry.state == LinkState::Open)
            .map(|(peer_id, _)| peer_id.clone())
            .collect();
        peers.sort();
        peers
    }

    pub fn broadcast(&mut self, event: &PeerEvent) -> Result<usize, LinkError> {
        let payload = event.encode()?;
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (peer_id, entry) in &self.links {
            if entry.state != LinkState::Open {
                continue;
            }
            match entry.link.send(&payload) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(peer_id = %peer_id, error = %err, kind = event.kind(), "peer link failed, dropping it");
                    failed.push(peer_id.clone());
                }
            }
        }

        for peer_id in failed {
            self.disconnect(&peer_id);
        }
        Ok(delivered)
    }

    pub fn send_to(&mut self, peer_id: &str, event: &PeerEvent) -> Result<(), LinkError> {
        let payload = event.encode()?;
        let Some(entry) = self.links.get(peer_id).filter(|e| e.state == LinkState::Open) else {
            return Err(LinkError::NotOpen(peer_id.to_owned()));
        };
        if let Err(err) = entry.link.send(&payload) {
            warn!(peer_id, error = %err, kind = event.kind(), "peer link failed, dropping it");
            self.disconnect(peer_id);
            return Err(err);
        }
        Ok(())
    }
}
