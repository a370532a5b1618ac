use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::rooms::{directory::RoomDirectory, peers::PeerDirectory};

#[derive(Debug, Default)]
pub struct Store {
    pub rooms: RoomDirectory,
    pub peers: PeerDirectory,
}

pub type SharedStore = Arc<Mutex<Store>>;

impl Store {
    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::default()))
    }
}

pub fn spawn_reaper(store: SharedStore, every: Duration, ttl: Duration) -> JoinHandle<()> {
    let mut interval = tokio::time::interval(every);
    tokio::spawn(async move {
        loop {
            interval.tick().await;
            let reaped = store.lock().rooms.reap_empty(ttl, Instant::now());
            if reaped.is_empty() {
                debug!("no idle sessions to reap");
            } else {
                info!(count = reaped.len(), sessions = ?reaped, "reaped idle sessions");
            }
        }
    })
}
