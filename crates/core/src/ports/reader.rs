//! Port trait for consumers of the marketplace views.
//!
//! The presentation side (GraphQL API, UI bridges) only ever sees this
//! trait, so it stays independent of the ledger adapter in use.

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{ActivityOutcome, Address, MarketSnapshot};

/// Read access to the cached marketplace views plus on-demand scans.
#[async_trait]
pub trait MarketReader: Send + Sync {
    /// Latest published snapshot (market state + catalog).
    fn snapshot(&self) -> Arc<MarketSnapshot>;

    /// Native currency symbol of the connected chain.
    fn currency(&self) -> String;

    /// Reconstruct `user`'s activity feed, newest first, truncated to `limit`.
    async fn activity(&self, user: &Address, limit: Option<usize>) -> ActivityOutcome;

    /// Collections created by `creator` on the connected chain.
    async fn creator_collections(&self, creator: &Address) -> Vec<Address>;

    /// Ask for a fresh rebuild of the cached views.
    ///
    /// Returns `false` when the request could not be queued.
    fn request_refresh(&self) -> bool;
}
