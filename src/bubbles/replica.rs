//! Local replica of the shared transcript and the rules for merging peer
//! events into it.
//!
//! Remote events follow last-writer-wins: a claim overwrites whatever owner
//! a bubble had, so two users claiming the same slot concurrently end up
//! with whichever claim each replica saw last. There is no vector clock and
//! no lease; replicas converge only through a later full `bubble-sync`.
//! Local intents (`claim`, `edit`, `finalize`) are stricter and refuse to
//! touch bubbles the local user does not own.

use thiserror::Error;
use tracing::debug;

use super::{
    bubble::{transcript_order, Bubble, Millis},
    event::PeerEvent,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplicaError {
    #[error("bubble {0} is not in the local replica")]
    UnknownBubble(String),
    #[error("bubble {id} is already claimed by {owner_name}")]
    AlreadyClaimed { id: String, owner_name: String },
    #[error("bubble {0} is not owned by the local user")]
    NotOwner(String),
    #[error("bubble {0} is finalized")]
    Finalized(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directed {
    pub to: String,
    pub event: PeerEvent,
}

#[derive(Debug, Clone)]
pub struct Replica {
    local_id: String,
    local_name: String,
    bubbles: Vec<Bubble>,
}

impl Replica {
    pub fn new(local_id: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            local_name: local_name.into(),
            bubbles: vec![Bubble::unclaimed()],
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn get(&self, bubble_id: &str) -> Option<&Bubble> {
        self.bubbles.iter().find(|b| b.id == bubble_id)
    }

    pub fn ordered(&self) -> Vec<&Bubble> {
        let mut ordered: Vec<&Bubble> = self.bubbles.iter().collect();
        ordered.sort_by(|a, b| transcript_order(a, b));
        ordered
    }

    pub fn sync_event(&self) -> PeerEvent {
        PeerEvent::BubbleSync {
            bubbles: self.bubbles.clone(),
        }
    }

    pub fn request_sync_event(&self) -> PeerEvent {
        PeerEvent::RequestSync {
            requester_id: self.local_id.clone(),
        }
    }

    pub fn apply(&mut self, event: PeerEvent) -> Option<Directed> {
        match event {
            PeerEvent::BubbleClaim {
                bubble_id,
                owner_id,
                owner_name,
                claimed_at,
            } => {
                self.apply_claim(&bubble_id, &owner_id, &owner_name, claimed_at);
                None
            }
            PeerEvent::BubbleUpdate {
                bubble_id, text, ..
            } => {
                self.apply_update(&bubble_id, text);
                None
            }
            PeerEvent::BubbleFinalize {
                bubble_id,
                finalized_at,
            } => {
                self.apply_finalize(&bubble_id, finalized_at);
                None
            }
            PeerEvent::BubbleSync { bubbles } => {
                self.apply_sync(bubbles);
                None
            }
            PeerEvent::RequestSync { requester_id } => {
                if requester_id == self.local_id {
                    return None;
                }
                Some(Directed {
                    to: requester_id,
                    event: self.sync_event(),
                })
            }
        }
    }

    pub fn apply_claim(&mut self, bubble_id: &str, owner_id: &str, owner_name: &str, claimed_at: Millis) {
        match self.bubbles.iter_mut().find(|b| b.id == bubble_id) {
            Some(bubble) => {
                if bubble.is_claimed() && bubble.owner_id != owner_id {
                    debug!(
                        bubble_id,
                        previous_owner = %bubble.owner_id,
                        new_owner = owner_id,
                        "claim overwrites existing owner"
                    );
                }
                bubble.owner_id = owner_id.to_owned();
                bubble.owner_name = owner_name.to_owned();
                bubble.claimed_at = claimed_at;
            }
            None => self.bubbles.push(Bubble {
                owner_id: owner_id.to_owned(),
                owner_name: owner_name.to_owned(),
                claimed_at,
                ..Bubble::unclaimed_with_id(bubble_id)
            }),
        }
        self.ensure_open_slot();
    }

    pub fn apply_update(&mut self, bubble_id: &str, text: String) -> bool {
        let Some(bubble) = self.bubbles.iter_mut().find(|b| b.id == bubble_id) else {
            debug!(bubble_id, "dropping update for unknown bubble");
            return false;
        };
        if bubble.is_finalized {
            debug!(bubble_id, "dropping update for finalized bubble");
            return false;
        }
        if bubble.text == text {
            return false;
        }
        bubble.text = text;
        true
    }

    pub fn apply_finalize(&mut self, bubble_id: &str, finalized_at: Millis) -> bool {
        match self.bubbles.iter_mut().find(|b| b.id == bubble_id) {
            Some(bubble) if !bubble.is_finalized => {
                bubble.is_finalized = true;
                bubble.finalized_at = Some(finalized_at);
                true
            }
            _ => false,
        }
    }

    pub fn apply_sync(&mut self, incoming: Vec<Bubble>) -> bool {
        let has_claims = self.bubbles.iter().any(Bubble::is_claimed);
        if has_claims && self.bubbles.len() > 1 {
            debug!(
                local = self.bubbles.len(),
                incoming = incoming.len(),
                "discarding sync, replica has claimed bubbles"
            );
            return false;
        }
        self.bubbles = incoming;
        self.ensure_open_slot();
        true
    }

    pub fn claim(&mut self, bubble_id: &str, claimed_at: Millis) -> Result<PeerEvent, ReplicaError> {
        let bubble = self.require(bubble_id)?;
        if bubble.is_finalized {
            return Err(ReplicaError::Finalized(bubble_id.to_owned()));
        }
        if bubble.is_claimed() {
            return Err(ReplicaError::AlreadyClaimed {
                id: bubble_id.to_owned(),
                owner_name: bubble.owner_name.clone(),
            });
        }
        let (owner_id, owner_name) = (self.local_id.clone(), self.local_name.clone());
        self.apply_claim(bubble_id, &owner_id, &owner_name, claimed_at);
        Ok(PeerEvent::BubbleClaim {
            bubble_id: bubble_id.to_owned(),
            owner_id,
            owner_name,
            claimed_at,
        })
    }

    pub fn edit(&mut self, bubble_id: &str, text: String, timestamp: Millis) -> Result<PeerEvent, ReplicaError> {
        self.require_owned_open(bubble_id)?;
        self.apply_update(bubble_id, text.clone());
        Ok(PeerEvent::BubbleUpdate {
            bubble_id: bubble_id.to_owned(),
            text,
            timestamp,
        })
    }

    pub fn finalize(&mut self, bubble_id: &str, finalized_at: Millis) -> Result<PeerEvent, ReplicaError> {
        self.require_owned_open(bubble_id)?;
        self.apply_finalize(bubble_id, finalized_at);
        Ok(PeerEvent::BubbleFinalize {
            bubble_id: bubble_id.to_owned(),
            finalized_at,
        })
    }

    fn require(&self, bubble_id: &str) -> Result<&Bubble, ReplicaError> {
        self.get(bubble_id)
            .ok_or_else(|| ReplicaError::UnknownBubble(bubble_id.to_owned()))
    }

    fn require_owned_open(&self, bubble_id: &str) -> Result<(), ReplicaError> {
        let bubble = self.require(bubble_id)?;
        if bubble.owner_id != self.local_id {
            return Err(ReplicaError::NotOwner(bubble_id.to_owned()));
        }
        if bubble.is_finalized {
            return Err(ReplicaError::Finalized(bubble_id.to_owned()));
        }
        Ok(())
    }

    fn ensure_open_slot(&mut self) {
        if !self.bubbles.iter().any(Bubble::is_open_slot) {
            self.bubbles.push(Bubble::unclaimed());
        }
    }
}
