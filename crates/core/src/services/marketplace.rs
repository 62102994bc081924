//! Marketplace service - orchestrates rebuilds and serves the views.
//!
//! The service reacts to [`RefreshTrigger`]s by running the aggregator and
//! the catalog joiner and publishing the result to the [`MarketCache`].
//! Activity feeds are reconstructed on demand and keyed the same way.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::metrics::{PassTimer, record_snapshot_discarded, record_snapshot_published};
use crate::models::{
    ActivityOutcome, Address, Auction, ChainId, Listing, MarketSnapshot, NetworkRegistry,
    NftRecord, native_currency_symbol,
};
use crate::ports::{LedgerGateway, MarketReader};

use super::{ActivityReconstructor, CatalogJoiner, MarketAggregator, MarketCache};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the marketplace service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Number of most recent blocks scanned for activity.
    pub lookback_blocks: u64,
    /// Per-index, per-token and per-block reads in flight (1 = sequential).
    pub fetch_concurrency: usize,
    /// Interval between automatic rebuilds.
    pub refresh_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lookback_blocks: 1_000,
            fetch_concurrency: 1,
            refresh_interval: Duration::from_secs(30),
        }
    }
}

/// Signal that the cached views must be rebuilt.
#[derive(Debug, Clone)]
pub enum RefreshTrigger {
    /// The connected chain changed (or was first detected).
    NetworkChanged(ChainId),
    /// The ledger connection was lost.
    Disconnected,
    /// Explicit refresh request.
    ManualRefresh,
    /// Contract addresses were reloaded.
    RegistryChanged(NetworkRegistry),
}

// =============================================================================
// MarketplaceService
// =============================================================================

/// Cached marketplace views over a ledger gateway.
///
/// # Flow
///
/// 1. A trigger arrives (network switch, refresh, registry reload, timer)
/// 2. Network switches and registry reloads invalidate passes in flight
/// 3. A rebuild pass aggregates the market and joins the catalog
/// 4. The snapshot is published only if its inputs are still current
pub struct MarketplaceService<G: LedgerGateway> {
    config: ServiceConfig,
    gateway: Arc<G>,
    registry: watch::Sender<Arc<NetworkRegistry>>,
    cache: MarketCache,
    aggregator: MarketAggregator<G>,
    joiner: CatalogJoiner<G>,
    reconstructor: ActivityReconstructor<G>,
    triggers: mpsc::Sender<RefreshTrigger>,
}

impl<G: LedgerGateway + 'static> MarketplaceService<G> {
    /// `triggers` is the sending half of the channel later passed to
    /// [`run`](Self::run); it backs [`MarketReader::request_refresh`].
    pub fn new(
        config: ServiceConfig,
        gateway: Arc<G>,
        registry: NetworkRegistry,
        triggers: mpsc::Sender<RefreshTrigger>,
    ) -> Self {
        let concurrency = config.fetch_concurrency;
        let (registry, _) = watch::channel(Arc::new(registry));

        Self {
            aggregator: MarketAggregator::new(Arc::clone(&gateway), concurrency),
            joiner: CatalogJoiner::new(Arc::clone(&gateway), concurrency),
            reconstructor: ActivityReconstructor::new(
                Arc::clone(&gateway),
                config.lookback_blocks,
                concurrency,
            ),
            config,
            gateway,
            registry,
            cache: MarketCache::new(),
            triggers,
        }
    }

    pub fn cache(&self) -> &MarketCache {
        &self.cache
    }

    pub fn registry(&self) -> Arc<NetworkRegistry> {
        Arc::clone(&self.registry.borrow())
    }

    /// Apply a trigger to the current inputs.
    ///
    /// Returns `true` when a rebuild should follow.
    pub fn handle(&self, trigger: RefreshTrigger) -> bool {
        match trigger {
            RefreshTrigger::NetworkChanged(chain_id) => {
                if self.cache.current_key().chain_id == Some(chain_id) {
                    debug!(chain = chain_id, "Network unchanged");
                    return false;
                }
                info!(chain = chain_id, "🔀 Network changed");
                self.cache.switch_network(Some(chain_id));
            }
            RefreshTrigger::Disconnected => {
                warn!("🔌 Ledger disconnected, clearing views");
                self.cache.switch_network(None);
            }
            RefreshTrigger::ManualRefresh => {
                debug!("Manual refresh requested");
            }
            RefreshTrigger::RegistryChanged(registry) => {
                info!(
                    supported = ?registry.supported_chains(),
                    "🗂️  Network registry reloaded"
                );
                self.registry.send_replace(Arc::new(registry));
                self.cache.switch_network(self.cache.current_key().chain_id);
            }
        }
        true
    }

    /// Run one aggregation + catalog pass for the current inputs.
    ///
    /// Returns `true` if the snapshot was published, `false` if the inputs
    /// changed while the pass was running.
    #[instrument(skip(self))]
    pub async fn rebuild(&self) -> bool {
        let key = self.cache.current_key();
        let _timer = PassTimer::new();

        let registry = self.registry();
        let deployment = key.chain_id.and_then(|chain| registry.resolve(chain));
        let marketplace = deployment.and_then(|d| d.marketplace.as_ref());
        let factory = deployment.and_then(|d| d.factory.as_ref());

        // Aggregation and registry enumeration are independent
        let (market, collections) = tokio::join!(
            self.aggregator.aggregate(marketplace),
            self.joiner.collections(factory),
        );
        let catalog = self.joiner.build(&collections, &market).await;

        let snapshot = MarketSnapshot {
            key,
            market,
            catalog,
            built_at: Some(Utc::now()),
        };

        if self.cache.publish(snapshot) {
            record_snapshot_published();
            info!(chain = ?key.chain_id, epoch = key.epoch, "📦 Snapshot published");
            true
        } else {
            record_snapshot_discarded();
            debug!(chain = ?key.chain_id, epoch = key.epoch, "Inputs changed during pass, snapshot discarded");
            false
        }
    }

    /// Main loop: rebuild on every trigger and on timer ticks.
    ///
    /// Passes run as background tasks so a slow pass never delays a network
    /// switch; stale passes are dropped by the cache. A tick that lands
    /// while a pass is still running is skipped.
    #[instrument(skip_all)]
    pub async fn run(
        self: Arc<Self>,
        mut triggers: mpsc::Receiver<RefreshTrigger>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> ServiceResult<()> {
        info!("🎼 Starting marketplace service");

        let mut passes = JoinSet::new();
        let mut ticker = tokio::time::interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                trigger = triggers.recv() => {
                    let Some(trigger) = trigger else {
                        passes.abort_all();
                        return Err(ServiceError::TriggersClosed);
                    };
                    if self.handle(trigger) {
                        self.spawn_rebuild(&mut passes);
                    }
                }
                _ = ticker.tick() => {
                    if passes.is_empty() {
                        self.spawn_rebuild(&mut passes);
                    } else {
                        debug!(in_flight = passes.len(), "Pass still running, tick skipped");
                    }
                }
                Some(joined) = passes.join_next() => {
                    if let Err(e) = joined {
                        error!(error = %e, "❌ Rebuild task failed");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Shutdown requested");
                        passes.abort_all();
                        return Err(ServiceError::ShutdownRequested);
                    }
                }
            }
        }
    }

    fn spawn_rebuild(self: &Arc<Self>, passes: &mut JoinSet<bool>) {
        let service = Arc::clone(self);
        passes.spawn(async move { service.rebuild().await });
    }

    // =========================================================================
    // Produced views
    // =========================================================================

    pub fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.cache.latest()
    }

    pub fn active_listings(&self) -> Vec<Listing> {
        self.snapshot().market.listings.clone()
    }

    pub fn active_auctions(&self) -> Vec<Auction> {
        self.snapshot().market.auctions.clone()
    }

    pub fn listing_for(&self, nft_contract: &Address, token_id: u64) -> Option<Listing> {
        self.snapshot().market.listing_for(nft_contract, token_id).cloned()
    }

    pub fn auction_for(&self, nft_contract: &Address, token_id: u64) -> Option<Auction> {
        self.snapshot().market.auction_for(nft_contract, token_id).cloned()
    }

    pub fn catalog(&self) -> Vec<NftRecord> {
        self.snapshot().catalog.records.clone()
    }

    pub fn owned_by(&self, owner: &Address) -> Vec<NftRecord> {
        self.snapshot()
            .catalog
            .owned_by(owner)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn created_by(&self, creator: &Address) -> Vec<NftRecord> {
        self.snapshot()
            .catalog
            .created_by(creator)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Native currency symbol of the connected chain.
    pub fn currency(&self) -> String {
        let Some(chain_id) = self.cache.current_key().chain_id else {
            return native_currency_symbol(0).to_string();
        };
        match self.registry().resolve(chain_id) {
            Some(deployment) => deployment.currency().to_string(),
            None => native_currency_symbol(chain_id).to_string(),
        }
    }

    /// Reconstruct `user`'s feed for the current inputs.
    ///
    /// If the network switches while scanning, the scan is reported as
    /// [`ActivityOutcome::Superseded`] instead of returning stale items.
    #[instrument(skip(self, user), fields(user = %user.short()))]
    pub async fn activity(&self, user: &Address, limit: Option<usize>) -> ActivityOutcome {
        let key = self.cache.current_key();
        let registry = self.registry();

        let mut items = match key.chain_id.and_then(|chain| registry.resolve(chain)) {
            Some(deployment) => self.reconstructor.reconstruct(user, deployment).await,
            None => {
                debug!("Network unsupported, empty feed");
                Vec::new()
            }
        };

        if self.cache.current_key() != key {
            debug!("Inputs changed during scan, feed discarded");
            return ActivityOutcome::Superseded;
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        ActivityOutcome::Current(items)
    }

    /// Collections created by `creator` on the connected chain.
    pub async fn creator_collections(&self, creator: &Address) -> Vec<Address> {
        let Some(chain_id) = self.cache.current_key().chain_id else {
            return Vec::new();
        };
        let Some(factory) = self.registry().factory(chain_id).copied() else {
            return Vec::new();
        };

        match self.gateway.creator_collections(&factory, creator).await {
            Ok(collections) => collections,
            Err(e) => {
                warn!(creator = %creator, error = %e, "⚠️  Creator collections unavailable");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl<G: LedgerGateway + 'static> MarketReader for MarketplaceService<G> {
    fn snapshot(&self) -> Arc<MarketSnapshot> {
        MarketplaceService::snapshot(self)
    }

    fn currency(&self) -> String {
        MarketplaceService::currency(self)
    }

    async fn activity(&self, user: &Address, limit: Option<usize>) -> ActivityOutcome {
        MarketplaceService::activity(self, user, limit).await
    }

    async fn creator_collections(&self, creator: &Address) -> Vec<Address> {
        MarketplaceService::creator_collections(self, creator).await
    }

    fn request_refresh(&self) -> bool {
        self.triggers.try_send(RefreshTrigger::ManualRefresh).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NetworkDeployment;
    use crate::testing::{MockLedger, ONE, log_event, raw_auction, raw_listing};
    use crate::ports::LogEventKind;
    use serde_json::json;

    const CHAIN: ChainId = 1328;
    const MARKETPLACE: Address = Address([0x01; 20]);
    const FACTORY: Address = Address([0x02; 20]);
    const COLLECTION: Address = Address([0x0c; 20]);
    const ALICE: Address = Address([0xa1; 20]);

    fn registry() -> NetworkRegistry {
        let mut registry = NetworkRegistry::new();
        let mut deployment = NetworkDeployment::new(CHAIN);
        deployment.marketplace = Some(MARKETPLACE);
        deployment.factory = Some(FACTORY);
        registry.insert(deployment);
        registry
    }

    fn market_ledger() -> MockLedger {
        let mut ledger = MockLedger::new(CHAIN);
        ledger.latest_block = 2_000;
        ledger.listing_counter = 1;
        ledger.listings.insert(1, raw_listing(COLLECTION, 0, ONE, true));
        ledger.auction_counter = 1;
        ledger.auctions.insert(1, raw_auction(COLLECTION, 1, ONE / 5, 0));
        ledger.collections.push(COLLECTION);
        ledger.supplies.insert(COLLECTION, 2);
        ledger.add_token(COLLECTION, 0, ALICE, ALICE);
        ledger.add_token(COLLECTION, 1, ALICE, ALICE);
        ledger
    }

    fn service(ledger: MockLedger) -> (Arc<MarketplaceService<MockLedger>>, mpsc::Receiver<RefreshTrigger>) {
        let (tx, rx) = mpsc::channel(8);
        let service = MarketplaceService::new(ServiceConfig::default(), Arc::new(ledger), registry(), tx);
        (Arc::new(service), rx)
    }

    #[tokio::test]
    async fn test_rebuild_publishes_views() {
        let (service, _rx) = service(market_ledger());
        service.handle(RefreshTrigger::NetworkChanged(CHAIN));

        assert!(service.rebuild().await);
        assert_eq!(service.active_listings().len(), 1);
        assert_eq!(service.active_auctions().len(), 1);
        assert_eq!(service.catalog().len(), 2);
        assert_eq!(service.owned_by(&ALICE).len(), 2);
        assert_eq!(service.created_by(&ALICE).len(), 2);
        assert!(service.listing_for(&COLLECTION, 0).is_some());
        assert!(service.auction_for(&COLLECTION, 0).is_none());
        assert_eq!(service.currency(), "SEI");
    }

    // Test critique: réseau sans marketplace configurée = listes vides, pas d'erreur
    #[tokio::test]
    async fn test_unsupported_network_yields_empty_views() {
        let ledger = Arc::new(market_ledger());
        let (tx, _rx) = mpsc::channel(8);
        let service = MarketplaceService::new(
            ServiceConfig::default(),
            Arc::clone(&ledger),
            registry(),
            tx,
        );
        service.handle(RefreshTrigger::NetworkChanged(42));

        assert!(service.rebuild().await);
        assert!(service.active_listings().is_empty());
        assert!(service.active_auctions().is_empty());
        assert!(service.catalog().is_empty());
        assert!(service.activity(&ALICE, None).await.into_items().is_empty());
        assert!(service.creator_collections(&ALICE).await.is_empty());
        assert_eq!(ledger.call_count(), 0);
        assert_eq!(service.currency(), "ETH");
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_switch_discards_pass_in_flight() {
        let mut ledger = market_ledger();
        ledger.delay = Some(Duration::from_secs(1));
        let (service, _rx) = service(ledger);
        service.handle(RefreshTrigger::NetworkChanged(CHAIN));

        let pass = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.rebuild().await }
        });
        tokio::task::yield_now().await;

        service.handle(RefreshTrigger::Disconnected);
        assert!(!pass.await.unwrap());
        assert!(service.active_listings().is_empty());
        assert_eq!(service.snapshot().key.chain_id, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_superseded_by_network_switch() {
        let mut ledger = market_ledger();
        ledger.delay = Some(Duration::from_secs(1));
        let (service, _rx) = service(ledger);
        service.handle(RefreshTrigger::NetworkChanged(CHAIN));

        let scan = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.activity(&ALICE, None).await }
        });
        tokio::task::yield_now().await;

        service.handle(RefreshTrigger::NetworkChanged(133717));
        assert!(scan.await.unwrap().is_superseded());
    }

    #[tokio::test]
    async fn test_activity_truncated_after_sort() {
        let mut ledger = market_ledger();
        for (i, ts) in [100u64, 300, 200].into_iter().enumerate() {
            let block = i as u8 + 1;
            ledger.add_log(
                log_event(
                    LogEventKind::BidPlaced,
                    json!({ "auctionId": "1", "bidder": ALICE.to_hex(), "amount": "10" }),
                    block,
                    0,
                    block,
                ),
                ts,
            );
        }
        let (service, _rx) = service(ledger);
        service.handle(RefreshTrigger::NetworkChanged(CHAIN));

        let items = service.activity(&ALICE, Some(2)).await.into_items();
        let times: Vec<i64> = items.iter().map(|i| i.timestamp_ms).collect();
        assert_eq!(times, vec![300_000, 200_000]);
    }

    #[tokio::test]
    async fn test_registry_change_invalidates_and_reroutes() {
        let (service, _rx) = service(market_ledger());
        service.handle(RefreshTrigger::NetworkChanged(CHAIN));
        service.rebuild().await;
        let before = service.snapshot().key;

        service.handle(RefreshTrigger::RegistryChanged(NetworkRegistry::new()));
        let after = service.snapshot().key;
        assert_eq!(after.chain_id, before.chain_id);
        assert!(after.epoch > before.epoch);

        service.rebuild().await;
        assert!(service.active_listings().is_empty());
    }

    #[tokio::test]
    async fn test_same_network_does_not_invalidate() {
        let (service, _rx) = service(market_ledger());
        service.handle(RefreshTrigger::NetworkChanged(CHAIN));
        let key = service.snapshot().key;
        service.handle(RefreshTrigger::NetworkChanged(CHAIN));
        assert_eq!(service.snapshot().key, key);
    }

    #[tokio::test]
    async fn test_request_refresh_queues_trigger() {
        let (service, mut rx) = service(market_ledger());
        assert!(MarketReader::request_refresh(service.as_ref()));
        assert!(matches!(rx.recv().await, Some(RefreshTrigger::ManualRefresh)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_rebuilds_on_trigger_and_stops_on_shutdown() {
        let (tx, rx) = mpsc::channel(8);
        let service = Arc::new(MarketplaceService::new(
            ServiceConfig::default(),
            Arc::new(market_ledger()),
            registry(),
            tx.clone(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut published = service.cache().subscribe();

        let handle = tokio::spawn(Arc::clone(&service).run(rx, shutdown_rx));
        tx.send(RefreshTrigger::NetworkChanged(CHAIN)).await.unwrap();

        loop {
            published.changed().await.unwrap();
            let snapshot = published.borrow_and_update().clone();
            if snapshot.is_built() && snapshot.key.chain_id == Some(CHAIN) {
                break;
            }
        }
        assert_eq!(service.active_listings().len(), 1);

        shutdown_tx.send(true).unwrap();
        assert!(matches!(
            handle.await.unwrap(),
            Err(ServiceError::ShutdownRequested)
        ));
    }

    // Test critique: un pass lent ne doit pas empiler les rebuilds du timer
    #[tokio::test(start_paused = true)]
    async fn test_slow_pass_skips_timer_ticks() {
        let mut ledger = market_ledger();
        ledger.delay = Some(Duration::from_secs(10));
        let ledger = Arc::new(ledger);

        let (tx, rx) = mpsc::channel(8);
        let config = ServiceConfig {
            refresh_interval: Duration::from_secs(1),
            ..Default::default()
        };
        let service = Arc::new(MarketplaceService::new(config, Arc::clone(&ledger), registry(), tx));
        service.handle(RefreshTrigger::NetworkChanged(CHAIN));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&service).run(rx, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(ledger.passes_started(), 1);
        assert!(!service.snapshot().is_built());

        // The first pass completes at 10s; later ticks start one pass at a time
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(service.snapshot().is_built());
        assert_eq!(ledger.passes_started(), 2);

        shutdown_tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_err());
    }
}
