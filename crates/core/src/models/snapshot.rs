//! Immutable snapshots of the cached marketplace views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActivityItem, Catalog, ChainId, MarketState};

/// Inputs a fetch pass was started with.
///
/// `epoch` is bumped on every network switch or wallet disconnect; a pass
/// whose key no longer matches the current one is stale and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PassKey {
    /// Connected chain, `None` while disconnected.
    pub chain_id: Option<ChainId>,
    pub epoch: u64,
}

/// Market state and catalog produced by one complete pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub key: PassKey,
    pub market: MarketState,
    pub catalog: Catalog,
    /// `None` for the placeholder published before the first pass completes.
    pub built_at: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    /// Empty placeholder for a freshly switched input set.
    pub fn empty(key: PassKey) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    /// Whether a pass has completed for this key.
    pub fn is_built(&self) -> bool {
        self.built_at.is_some()
    }
}

/// Result of an activity scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Feed for the inputs the scan was started with, newest first.
    Current(Vec<ActivityItem>),
    /// Inputs changed while scanning; the results were discarded.
    Superseded,
}

impl ActivityOutcome {
    /// Items of a current feed; a superseded scan yields nothing.
    pub fn into_items(self) -> Vec<ActivityItem> {
        match self {
            Self::Current(items) => items,
            Self::Superseded => Vec::new(),
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}
