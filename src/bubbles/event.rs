use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bubble::{Bubble, Millis};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PeerEvent {
    BubbleClaim {
        bubble_id: String,
        owner_id: String,
        owner_name: String,
        claimed_at: Millis,
    },
    BubbleUpdate {
        bubble_id: String,
        text: String,
        timestamp: Millis,
    },
    BubbleFinalize {
        bubble_id: String,
        finalized_at: Millis,
    },
    BubbleSync {
        bubbles: Vec<Bubble>,
    },
    RequestSync {
        requester_id: String,
    },
}

#[derive(Debug, Error)]
pub enum MalformedEvent {
    #[error("peer event is not valid json or misses required fields: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("peer event `{kind}` has an empty `{field}`")]
    EmptyField {
        kind: &'static str,
        field: &'static str,
    },
}

impl PeerEvent {
    pub fn decode(raw: &str) -> Result<Self, MalformedEvent> {
        let event: PeerEvent = serde_json::from_str(raw)?;
        event.validate()?;
        Ok(event)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PeerEvent::BubbleClaim { .. } => "bubble-claim",
            PeerEvent::BubbleUpdate { .. } => "bubble-update",
            PeerEvent::BubbleFinalize { .. } => "bubble-finalize",
            PeerEvent::BubbleSync { .. } => "bubble-sync",
            PeerEvent::RequestSync { .. } => "request-sync",
        }
    }

    fn validate(&self) -> Result<(), MalformedEvent> {
        let empty = |field| MalformedEvent::EmptyField {
            kind: self.kind(),
            field,
        };
        match self {
            PeerEvent::BubbleClaim {
                bubble_id,
                owner_id,
                ..
            } => {
                if bubble_id.is_empty() {
                    return Err(empty("bubbleId"));
                }
                if owner_id.is_empty() {
                    return Err(empty("ownerId"));
                }
            }
            PeerEvent::BubbleUpdate { bubble_id, .. }
            | PeerEvent::BubbleFinalize { bubble_id, .. } => {
                if bubble_id.is_empty() {
                    return Err(empty("bubbleId"));
                }
            }
            PeerEvent::BubbleSync { bubbles } => {
                if bubbles.iter().any(|b| b.id.is_empty()) {
                    return Err(empty("bubbles[].id"));
                }
            }
            PeerEvent::RequestSync { requester_id } => {
                if requester_id.is_empty() {
                    return Err(empty("requesterId"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_uses_kebab_tag_and_camel_fields() {
        let event = PeerEvent::BubbleClaim {
            bubble_id: "b1".into(),
            owner_id: "u1".into(),
            owner_name: "alice".into(),
            claimed_at: 100,
        };
        let value: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "bubble-claim");
        assert_eq!(value["bubbleId"], "b1");
        assert_eq!(value["ownerName"], "alice");
        assert_eq!(value["claimedAt"], 100);
    }

    #[test]
    fn decodes_request_sync_from_browser_shape() {
        let event = PeerEvent::decode(r#"{"type":"request-sync","requesterId":"u2"}"#).unwrap();
        assert_eq!(
            event,
            PeerEvent::RequestSync {
                requester_id: "u2".into()
            }
        );
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = PeerEvent::decode(r#"{"type":"bubble-update","bubbleId":"b1"}"#).unwrap_err();
        assert!(matches!(err, MalformedEvent::Shape(_)));
    }

    #[test]
    fn unknown_type_is_malformed() {
        let err = PeerEvent::decode(r#"{"type":"bubble-delete","bubbleId":"b1"}"#).unwrap_err();
        assert!(matches!(err, MalformedEvent::Shape(_)));
    }

    #[test]
    fn anonymous_claim_is_rejected() {
        let raw = r#"{"type":"bubble-claim","bubbleId":"b1","ownerId":"","ownerName":"","claimedAt":1}"#;
        let err = PeerEvent::decode(raw).unwrap_err();
        assert!(matches!(
            err,
            MalformedEvent::EmptyField {
                field: "ownerId",
                ..
            }
        ));
    }
}
