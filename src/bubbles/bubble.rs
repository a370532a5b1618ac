use std::cmp::Ordering;

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type Millis = i64;

const BUBBLE_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const BUBBLE_ID_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bubble {
    pub id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub text: String,
    pub is_finalized: bool,
    pub claimed_at: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<Millis>,
}

impl Bubble {
    pub fn unclaimed() -> Self {
        Self::unclaimed_with_id(generate_bubble_id())
    }

    pub fn unclaimed_with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: String::new(),
            owner_name: String::new(),
            text: String::new(),
            is_finalized: false,
            claimed_at: 0,
            finalized_at: None,
        }
    }

    pub fn is_claimed(&self) -> bool {
        !self.owner_id.is_empty()
    }

    pub fn is_open_slot(&self) -> bool {
        !self.is_claimed() && self.text.trim().is_empty()
    }
}

pub fn generate_bubble_id() -> String {
    let mut rng = rand::rng();
    (0..BUBBLE_ID_LEN)
        .map(|_| BUBBLE_ID_ALPHABET[rng.random_range(0..BUBBLE_ID_ALPHABET.len())] as char)
        .collect()
}

pub fn now_millis() -> Millis {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as Millis
}

pub fn transcript_order(a: &Bubble, b: &Bubble) -> Ordering {
    match (a.is_claimed(), b.is_claimed()) {
        (true, true) => a.claimed_at.cmp(&b.claimed_at),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}
