//! Activity Reconstructor - per-user feed rebuilt from historical logs.
//!
//! Each event kind is scanned independently over a fixed window of recent
//! blocks. A failing scan, an undecodable log or a missing block only drops
//! the affected items; the feed itself is always returned.

mod decode;

pub use decode::*;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use futures::{StreamExt, stream};
use tracing::{debug, info, instrument, warn};

use crate::metrics::{
    record_activity_items, record_decode_failure, record_fetch_failure, record_scan_failure,
};
use crate::models::{
    ActivityItem, ActivityKind, ActivityStatus, Address, BlockHash, NetworkDeployment, TxHash,
    format_with_symbol, sort_newest_first,
};
use crate::ports::{BlockRange, EventSource, LedgerGateway, LogEventKind};

// =============================================================================
// Classification
// =============================================================================

/// How a decoded event shows up in a user's feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: ActivityKind,
    pub title: &'static str,
    pub description: String,
    pub amount: Option<u128>,
}

impl Classified {
    fn new(kind: ActivityKind, title: &'static str, description: String, amount: Option<u128>) -> Self {
        Self {
            kind,
            title,
            description,
            amount,
        }
    }
}

/// Classify `event` from the point of view of `user`.
///
/// Returns `None` when the user took no part in the event.
pub fn classify(event: &MarketEvent, user: &Address, currency: &str) -> Option<Classified> {
    let money = |amount: u128| format_with_symbol(amount, currency);

    let classified = match event {
        MarketEvent::ItemListed {
            seller,
            token_id,
            price,
            ..
        } if seller == user => Classified::new(
            ActivityKind::List,
            "Listed NFT for Sale",
            format!("Listed NFT #{} for {}", token_id, money(*price)),
            Some(*price),
        ),
        // A self-trade reads as a purchase
        MarketEvent::ItemSold { buyer, price, .. } if buyer == user => Classified::new(
            ActivityKind::Purchase,
            "Purchased NFT",
            format!("Purchased NFT for {}", money(*price)),
            Some(*price),
        ),
        MarketEvent::ItemSold { seller, price, .. } if seller == user => Classified::new(
            ActivityKind::Purchase,
            "NFT Sold",
            format!("Sold NFT for {}", money(*price)),
            Some(*price),
        ),
        MarketEvent::AuctionCreated {
            seller,
            token_id,
            starting_price,
            ..
        } if seller == user => Classified::new(
            ActivityKind::AuctionStart,
            "Started Auction",
            format!(
                "Started auction for NFT #{} with starting price {}",
                token_id,
                money(*starting_price)
            ),
            Some(*starting_price),
        ),
        MarketEvent::BidPlaced {
            auction_id,
            bidder,
            amount,
        } if bidder == user => Classified::new(
            ActivityKind::Bid,
            "Placed Bid",
            format!("Placed bid of {} on auction #{}", money(*amount), auction_id),
            Some(*amount),
        ),
        MarketEvent::AuctionEnded {
            auction_id,
            winner,
            winning_bid,
        } if winner == user => Classified::new(
            ActivityKind::AuctionEnd,
            "Won Auction",
            format!("Won auction #{} with bid of {}", auction_id, money(*winning_bid)),
            Some(*winning_bid),
        ),
        MarketEvent::CollectionCreated { creator, name, .. } if creator == user => Classified::new(
            ActivityKind::Mint,
            "Created Collection",
            format!("Created new music collection: {}", name),
            None,
        ),
        _ => return None,
    };
    Some(classified)
}

/// A matching log waiting for its block timestamp.
struct Draft {
    classified: Classified,
    tx_hash: TxHash,
    log_index: u64,
    block_hash: BlockHash,
}

impl Draft {
    fn into_item(self, block_secs: u64, currency: &str) -> ActivityItem {
        let Classified {
            kind,
            title,
            description,
            amount,
        } = self.classified;

        ActivityItem {
            id: ActivityItem::derive_id(kind, &self.tx_hash, self.log_index),
            kind,
            title: title.to_string(),
            description,
            timestamp_ms: i64::try_from(block_secs)
                .unwrap_or(i64::MAX)
                .saturating_mul(1000),
            tx_hash: self.tx_hash,
            log_index: self.log_index,
            amount,
            amount_display: amount.map(|a| format_with_symbol(a, currency)),
            status: ActivityStatus::Confirmed,
        }
    }
}

// =============================================================================
// ActivityReconstructor
// =============================================================================

/// Rebuilds a user's activity feed from a bounded window of recent logs.
pub struct ActivityReconstructor<G: LedgerGateway> {
    gateway: Arc<G>,
    lookback_blocks: u64,
    concurrency: usize,
}

impl<G: LedgerGateway> ActivityReconstructor<G> {
    pub fn new(gateway: Arc<G>, lookback_blocks: u64, concurrency: usize) -> Self {
        Self {
            gateway,
            lookback_blocks,
            concurrency: concurrency.max(1),
        }
    }

    /// Feed of `user` on the network described by `deployment`, newest first.
    ///
    /// Sources whose contract is not deployed are skipped without any call.
    #[instrument(skip_all, fields(user = %user.short(), chain = deployment.chain_id))]
    pub async fn reconstruct(&self, user: &Address, deployment: &NetworkDeployment) -> Vec<ActivityItem> {
        let targets: Vec<(LogEventKind, Address)> = LogEventKind::ALL
            .iter()
            .filter_map(|kind| {
                let contract = match kind.source() {
                    EventSource::Marketplace => deployment.marketplace,
                    EventSource::Factory => deployment.factory,
                }?;
                Some((*kind, contract))
            })
            .collect();

        if targets.is_empty() {
            debug!("No contracts deployed on this network, nothing to scan");
            return Vec::new();
        }

        let latest = match self.gateway.latest_block_number().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(error = %e, "⚠️  Failed to read chain head, activity unavailable");
                return Vec::new();
            }
        };
        let range = BlockRange::lookback(latest, self.lookback_blocks);
        let currency = deployment.currency();

        let scans = targets
            .iter()
            .map(|(kind, contract)| self.scan(contract, *kind, range, user, currency));
        let drafts: Vec<Draft> = join_all(scans).await.into_iter().flatten().collect();

        let timestamps = self.block_timestamps(&drafts).await;

        let mut seen = HashSet::new();
        let mut items: Vec<ActivityItem> = drafts
            .into_iter()
            .filter_map(|draft| {
                let secs = *timestamps.get(&draft.block_hash)?;
                let item = draft.into_item(secs, currency);
                seen.insert(item.id.clone()).then_some(item)
            })
            .collect();

        sort_newest_first(&mut items);
        record_activity_items(items.len() as u64);
        info!(
            items = items.len(),
            from = range.from,
            to = range.to,
            "📜 Activity reconstructed"
        );
        items
    }

    /// Scan one event kind and keep the logs involving `user`.
    async fn scan(
        &self,
        contract: &Address,
        kind: LogEventKind,
        range: BlockRange,
        user: &Address,
        currency: &str,
    ) -> Vec<Draft> {
        let logs = match self.gateway.logs(contract, kind, range).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!(event = kind.name(), error = %e, "⚠️  Log scan failed, skipping");
                record_scan_failure(kind.name());
                return Vec::new();
            }
        };

        let mut drafts = Vec::new();
        for log in logs {
            let Some(event) = MarketEvent::decode(&log) else {
                debug!(
                    event = kind.name(),
                    tx = %log.tx_hash,
                    log_index = log.log_index,
                    "Undecodable log skipped"
                );
                record_decode_failure(kind.name());
                continue;
            };

            if let Some(classified) = classify(&event, user, currency) {
                drafts.push(Draft {
                    classified,
                    tx_hash: log.tx_hash,
                    log_index: log.log_index,
                    block_hash: log.block_hash,
                });
            }
        }

        debug!(event = kind.name(), matched = drafts.len(), "Scan complete");
        drafts
    }

    /// Resolve each distinct block once. Failed lookups are left out.
    async fn block_timestamps(&self, drafts: &[Draft]) -> HashMap<BlockHash, u64> {
        let hashes: HashSet<BlockHash> = drafts.iter().map(|d| d.block_hash).collect();

        stream::iter(hashes)
            .map(|hash| async move { (hash, self.gateway.block_timestamp(&hash).await) })
            .buffer_unordered(self.concurrency)
            .filter_map(|(hash, result)| async move {
                match result {
                    Ok(secs) => Some((hash, secs)),
                    Err(e) => {
                        warn!(block = %hash, error = %e, "⚠️  Block lookup failed, dropping its items");
                        record_fetch_failure("block");
                        None
                    }
                }
            })
            .collect()
            .await
    }
}
