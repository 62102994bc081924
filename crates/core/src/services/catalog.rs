//! NFT Catalog Joiner.
//!
//! Enumerates every token of every known collection and joins it with the
//! aggregated market state.

use std::sync::Arc;

use futures::{StreamExt, stream};
use tracing::{debug, info, instrument, warn};

use crate::error::ChainResult;
use crate::metrics::record_fetch_failure;
use crate::models::{Address, Catalog, MarketAnnotation, MarketState, NftRecord};
use crate::ports::LedgerGateway;

/// Joins collection tokens with market state into a [`Catalog`].
pub struct CatalogJoiner<G: LedgerGateway> {
    gateway: Arc<G>,
    concurrency: usize,
}

impl<G: LedgerGateway> CatalogJoiner<G> {
    /// `concurrency` bounds in-flight token fetch sets; 1 fetches one token
    /// at a time.
    pub fn new(gateway: Arc<G>, concurrency: usize) -> Self {
        Self {
            gateway,
            concurrency: concurrency.max(1),
        }
    }

    /// Collections registered with the factory at `factory`.
    ///
    /// Empty when the factory is not deployed or the registry read fails.
    #[instrument(skip_all)]
    pub async fn collections(&self, factory: Option<&Address>) -> Vec<Address> {
        let Some(factory) = factory else {
            debug!("Factory not deployed on this network");
            return Vec::new();
        };

        match self.gateway.all_collections(factory).await {
            Ok(collections) => collections,
            Err(e) => {
                warn!(factory = %factory, error = %e, "⚠️  Collection registry read failed");
                record_fetch_failure("registry");
                Vec::new()
            }
        }
    }

    /// Build the catalog of `collections` annotated with `market`.
    #[instrument(skip_all, fields(collections = collections.len()))]
    pub async fn build(&self, collections: &[Address], market: &MarketState) -> Catalog {
        let mut records = Vec::new();

        for collection in collections {
            let supply = match self.gateway.total_supply(collection).await {
                Ok(supply) => supply,
                Err(e) => {
                    warn!(collection = %collection, error = %e, "⚠️  Total supply unavailable, skipping collection");
                    record_fetch_failure("collection");
                    continue;
                }
            };

            let tokens: Vec<NftRecord> = stream::iter(0..supply)
                .map(|token_id| self.fetch_token(collection, token_id, market))
                .buffered(self.concurrency)
                .filter_map(|record| async move { record })
                .collect()
                .await;

            debug!(collection = %collection, supply, fetched = tokens.len(), "Collection joined");
            records.extend(tokens);
        }

        let catalog = Catalog {
            collections: collections.to_vec(),
            records,
        };
        info!(
            tokens = catalog.len(),
            on_market = catalog.on_market().len(),
            "🎵 Catalog joined"
        );
        catalog
    }

    /// Fetch one token and join it. A failed read omits the token.
    async fn fetch_token(
        &self,
        collection: &Address,
        token_id: u64,
        market: &MarketState,
    ) -> Option<NftRecord> {
        match self.try_fetch_token(collection, token_id, market).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection = %collection, token_id, error = %e, "⚠️  Token fetch failed, skipping");
                record_fetch_failure("token");
                None
            }
        }
    }

    async fn try_fetch_token(
        &self,
        collection: &Address,
        token_id: u64,
        market: &MarketState,
    ) -> ChainResult<NftRecord> {
        let (metadata, owner, creator) = tokio::try_join!(
            self.gateway.music_metadata(collection, token_id),
            self.gateway.owner_of(collection, token_id),
            self.gateway.token_creator(collection, token_id),
        )?;

        Ok(join_market(
            NftRecord {
                token_id,
                contract: *collection,
                metadata,
                owner,
                creator,
                market: MarketAnnotation::NotListed,
                listed_at: None,
            },
            market,
        ))
    }
}

/// Attach the market annotation of `record`'s (collection, token) pair.
pub fn join_market(mut record: NftRecord, market: &MarketState) -> NftRecord {
    let listing = market.listing_for(&record.contract, record.token_id);
    let auction = market.auction_for(&record.contract, record.token_id);

    record.market = MarketAnnotation::derive(listing, auction);
    record.listed_at = match &record.market {
        MarketAnnotation::Auction { .. } => auction.map(|a| a.started_at),
        MarketAnnotation::FixedPrice { .. } => listing.map(|l| l.listed_at),
        MarketAnnotation::NotListed => None,
    };
    record
}
