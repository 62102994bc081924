//! Per-user activity feed items reconstructed from ledger logs.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TxHash;

/// Kind of marketplace action an activity item describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Mint,
    List,
    Purchase,
    AuctionStart,
    AuctionEnd,
    Bid,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::List => "list",
            Self::Purchase => "purchase",
            Self::AuctionStart => "auction_start",
            Self::AuctionEnd => "auction_end",
            Self::Bid => "bid",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement status of the underlying transaction.
///
/// Items are rebuilt from settled logs, so only `Confirmed` is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Confirmed,
    Pending,
    Failed,
}

/// One entry of a user's activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    /// Unique identifier: kind_txhash_logindex.
    pub id: String,
    pub kind: ActivityKind,
    pub title: String,
    pub description: String,
    /// Block timestamp in milliseconds since the epoch.
    pub timestamp_ms: i64,
    /// Transaction that emitted the log.
    pub tx_hash: TxHash,
    /// Log index within the block.
    pub log_index: u64,
    /// Amount in the smallest currency unit, when the action carries one.
    pub amount: Option<u128>,
    /// `amount` rendered with the native currency symbol.
    pub amount_display: Option<String>,
    pub status: ActivityStatus,
}

impl ActivityItem {
    /// Deterministic identifier of the item produced by one log.
    ///
    /// The same transaction may emit several qualifying logs; the log index
    /// keeps their items apart while the same log always maps to the same id.
    pub fn derive_id(kind: ActivityKind, tx_hash: &TxHash, log_index: u64) -> String {
        format!("{}_{}_{}", kind, tx_hash, log_index)
    }
}

/// Sort a feed newest first. Ties keep no particular order.
pub fn sort_newest_first(items: &mut [ActivityItem]) {
    items.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
}
