//! Process-local cache of the latest market snapshot.
//!
//! The cache is a `watch` channel holding an `Arc` of an immutable
//! [`MarketSnapshot`]. Rebuilds replace the whole value; readers clone the
//! `Arc` and never observe a partial build.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::debug;

use crate::models::{ChainId, MarketSnapshot, PassKey};

/// Latest published snapshot plus the inputs new passes must match.
pub struct MarketCache {
    snapshot: watch::Sender<Arc<MarketSnapshot>>,
}

impl MarketCache {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(MarketSnapshot::default()));
        Self { snapshot }
    }

    /// Inputs of the current pass generation.
    pub fn current_key(&self) -> PassKey {
        self.snapshot.borrow().key
    }

    /// Switch to a new input set, invalidating every pass in flight.
    ///
    /// An empty placeholder for the new key is published right away so
    /// readers never see the previous network's data.
    pub fn switch_network(&self, chain_id: Option<ChainId>) -> PassKey {
        let mut key = PassKey::default();
        self.snapshot.send_modify(|current| {
            key = PassKey {
                chain_id,
                epoch: current.key.epoch + 1,
            };
            *current = Arc::new(MarketSnapshot::empty(key));
        });
        debug!(chain = ?chain_id, epoch = key.epoch, "Inputs switched");
        key
    }

    /// Publish a completed pass.
    ///
    /// The snapshot replaces the current one only if it was built for the
    /// current inputs; otherwise it is dropped and `false` is returned.
    /// Among passes with matching inputs the last one published wins.
    pub fn publish(&self, snapshot: MarketSnapshot) -> bool {
        let mut snapshot = Some(snapshot);
        self.snapshot.send_if_modified(|current| {
            match snapshot.take() {
                Some(next) if next.key == current.key => {
                    *current = Arc::new(next);
                    true
                }
                _ => false,
            }
        })
    }

    /// Latest published snapshot.
    pub fn latest(&self) -> Arc<MarketSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Receiver notified on every publication.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MarketSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Age of the latest built snapshot, if any.
    pub fn age(&self) -> Option<chrono::Duration> {
        self.snapshot.borrow().built_at.map(|built| Utc::now() - built)
    }
}

impl Default for MarketCache {
    fn default() -> Self {
        Self::new()
    }
}
