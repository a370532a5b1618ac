use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::{
    mesh::{LinkError, PeerLink, Transport},
    node::PeerNode,
};

#[derive(Debug)]
pub enum LinkEvent {
    Incoming(ChannelLink),
    Opened { peer_id: String, link_id: Uuid },
    Message { from: String, payload: String },
    Closed { peer_id: String, link_id: Uuid },
}

#[derive(Clone, Default)]
pub struct LocalNetwork {
    inboxes: Arc<Mutex<HashMap<String, UnboundedSender<LinkEvent>>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, peer_id: &str) -> (ChannelTransport, UnboundedReceiver<LinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.lock().insert(peer_id.to_owned(), tx);
        (
            ChannelTransport {
                network: self.clone(),
            },
            rx,
        )
    }

    pub fn leave(&self, peer_id: &str) {
        self.inboxes.lock().remove(peer_id);
    }

    fn inbox(&self, peer_id: &str) -> Result<UnboundedSender<LinkEvent>, LinkError> {
        self.inboxes
            .lock()
            .get(peer_id)
            .cloned()
            .ok_or_else(|| LinkError::Transport(format!("peer {peer_id} is not reachable")))
    }
}

pub struct ChannelTransport {
    network: LocalNetwork,
}

impl Transport for ChannelTransport {
    type Link = ChannelLink;

    fn connect(&self, local_id: &str, peer_id: &str) -> Result<ChannelLink, LinkError> {
        let remote = self.network.inbox(peer_id)?;
        let local = self.network.inbox(local_id)?;
        let link_id = Uuid::new_v4();
        let closed = Arc::new(AtomicBool::new(false));

        let far = ChannelLink {
            link_id,
            local_id: peer_id.to_owned(),
            peer_id: local_id.to_owned(),
            remote_inbox: local.clone(),
            local_inbox: remote.clone(),
            closed: closed.clone(),
        };
        let unreachable = |_| LinkError::Transport(format!("peer {peer_id} is not reachable"));
        remote.send(LinkEvent::Incoming(far)).map_err(unreachable)?;
        remote
            .send(LinkEvent::Opened {
                peer_id: local_id.to_owned(),
                link_id,
            })
            .map_err(unreachable)?;
        let _ = local.send(LinkEvent::Opened {
            peer_id: peer_id.to_owned(),
            link_id,
        });

        Ok(ChannelLink {
            link_id,
            local_id: local_id.to_owned(),
            peer_id: peer_id.to_owned(),
            remote_inbox: remote,
            local_inbox: local,
            closed,
        })
    }
}

#[derive(Debug)]
pub struct ChannelLink {
    link_id: Uuid,
    local_id: String,
    peer_id: String,
    remote_inbox: UnboundedSender<LinkEvent>,
    local_inbox: UnboundedSender<LinkEvent>,
    closed: Arc<AtomicBool>,
}

impl PeerLink for ChannelLink {
    fn link_id(&self) -> Uuid {
        self.link_id
    }

    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn send(&self, payload: &str) -> Result<(), LinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LinkError::Closed(self.link_id));
        }
        self.remote_inbox
            .send(LinkEvent::Message {
                from: self.local_id.clone(),
                payload: payload.to_owned(),
            })
            .map_err(|_| LinkError::Closed(self.link_id))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.remote_inbox.send(LinkEvent::Closed {
            peer_id: self.local_id.clone(),
            link_id: self.link_id,
        });
        let _ = self.local_inbox.send(LinkEvent::Closed {
            peer_id: self.peer_id.clone(),
            link_id: self.link_id,
        });
    }
}

impl PeerNode<ChannelTransport> {
    pub fn handle(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Incoming(link) => {
                self.on_link_accepted(link);
            }
            LinkEvent::Opened { peer_id, link_id } => self.on_link_open(&peer_id, link_id),
            LinkEvent::Message { from, payload } => self.on_message(&from, &payload),
            LinkEvent::Closed { peer_id, link_id } => self.on_link_closed(&peer_id, link_id),
        }
    }

    pub fn pump(&mut self, inbox: &mut UnboundedReceiver<LinkEvent>) -> usize {
        let mut handled = 0;
        while let Ok(event) = inbox.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }
}
