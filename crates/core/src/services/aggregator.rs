//! Listing/Auction Aggregator.
//!
//! Enumerates the marketplace's counter-indexed stores and keeps the active
//! records. Every pass recomputes the full set from scratch.

use std::sync::Arc;

use futures::{StreamExt, stream};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ChainResult;
use crate::metrics::record_fetch_failure;
use crate::models::{Address, Auction, Listing, MarketState, datetime_from_secs};
use crate::ports::{LedgerGateway, RawAuction, RawListing};

fn into_listing(listing_id: u64, raw: RawListing) -> Listing {
    Listing {
        listing_id,
        seller: raw.seller,
        nft_contract: raw.nft_contract,
        token_id: raw.token_id,
        price: raw.price,
        is_active: raw.is_active,
        listed_at: datetime_from_secs(raw.listed_at),
    }
}

fn into_auction(auction_id: u64, raw: RawAuction) -> Auction {
    Auction {
        auction_id,
        seller: raw.seller,
        nft_contract: raw.nft_contract,
        token_id: raw.token_id,
        starting_price: raw.starting_price,
        current_bid: raw.current_bid,
        highest_bidder: (!raw.current_bidder.is_zero()).then_some(raw.current_bidder),
        end_time: datetime_from_secs(raw.end_time),
        is_active: raw.is_active,
        started_at: datetime_from_secs(raw.created_at),
    }
}

/// Builds the active listing and auction sets of a marketplace.
pub struct MarketAggregator<G: LedgerGateway> {
    gateway: Arc<G>,
    concurrency: usize,
}

impl<G: LedgerGateway> MarketAggregator<G> {
    /// `concurrency` bounds in-flight per-index reads; 1 reads sequentially.
    pub fn new(gateway: Arc<G>, concurrency: usize) -> Self {
        Self {
            gateway,
            concurrency: concurrency.max(1),
        }
    }

    /// Active market state of the marketplace at `marketplace`.
    ///
    /// Without an address (marketplace not deployed on this network) the
    /// result is empty and no call is made. A failure outside the per-index
    /// reads degrades to an empty state as well.
    #[instrument(skip_all, fields(marketplace = ?marketplace.map(Address::short)))]
    pub async fn aggregate(&self, marketplace: Option<&Address>) -> MarketState {
        let Some(marketplace) = marketplace else {
            debug!("Marketplace not deployed on this network");
            return MarketState::default();
        };

        match self.try_aggregate(marketplace).await {
            Ok(state) => {
                info!(
                    listings = state.listings.len(),
                    auctions = state.auctions.len(),
                    listing_counter = state.listing_counter,
                    auction_counter = state.auction_counter,
                    "🏪 Market state aggregated"
                );
                state
            }
            Err(e) => {
                error!(error = %e, "❌ Market aggregation failed, serving empty state");
                MarketState::default()
            }
        }
    }

    async fn try_aggregate(&self, marketplace: &Address) -> ChainResult<MarketState> {
        let (listing_counter, auction_counter) = tokio::try_join!(
            self.gateway.listing_counter(marketplace),
            self.gateway.auction_counter(marketplace),
        )?;

        let (listings, auctions) = tokio::join!(
            self.active_listings(marketplace, listing_counter),
            self.active_auctions(marketplace, auction_counter),
        );

        Ok(MarketState {
            listing_counter,
            auction_counter,
            listings,
            auctions,
        })
    }

    /// Fetch listings `1..=counter`, keeping the active ones.
    async fn active_listings(&self, marketplace: &Address, counter: u64) -> Vec<Listing> {
        stream::iter(1..=counter)
            .map(|id| async move { (id, self.gateway.listing(marketplace, id).await) })
            .buffered(self.concurrency)
            .filter_map(|(id, result)| async move {
                match result {
                    Ok(raw) if raw.is_active => Some(into_listing(id, raw)),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(listing_id = id, error = %e, "⚠️  Listing fetch failed, skipping");
                        record_fetch_failure("listing");
                        None
                    }
                }
            })
            .collect()
            .await
    }

    /// Fetch auctions `1..=counter`, keeping the active ones.
    async fn active_auctions(&self, marketplace: &Address, counter: u64) -> Vec<Auction> {
        stream::iter(1..=counter)
            .map(|id| async move { (id, self.gateway.auction(marketplace, id).await) })
            .buffered(self.concurrency)
            .filter_map(|(id, result)| async move {
                match result {
                    Ok(raw) if raw.is_active => Some(into_auction(id, raw)),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(auction_id = id, error = %e, "⚠️  Auction fetch failed, skipping");
                        record_fetch_failure("auction");
                        None
                    }
                }
            })
            .collect()
            .await
    }
}
