//! In-memory ledger double shared by the service tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ChainError, ChainResult};
use crate::models::{Address, BlockHash, ChainId, MusicMetadata, TxHash};
use crate::ports::{BlockRange, LedgerGateway, LogEvent, LogEventKind, RawAuction, RawListing};

pub const ONE: u128 = 1_000_000_000_000_000_000;

pub struct MockToken {
    pub metadata: MusicMetadata,
    pub owner: Address,
    pub creator: Address,
}

/// Ledger backed by plain maps. Anything missing from a map is a failed read.
#[derive(Default)]
pub struct MockLedger {
    pub chain_id: ChainId,
    pub latest_block: u64,
    pub listing_counter: u64,
    pub auction_counter: u64,
    pub listings: HashMap<u64, RawListing>,
    pub auctions: HashMap<u64, RawAuction>,
    pub fail_counters: bool,
    pub collections: Vec<Address>,
    pub creator_collections: HashMap<Address, Vec<Address>>,
    pub supplies: HashMap<Address, u64>,
    pub tokens: HashMap<(Address, u64), MockToken>,
    pub logs: HashMap<LogEventKind, Vec<LogEvent>>,
    pub failing_scans: HashSet<LogEventKind>,
    pub block_times: HashMap<BlockHash, u64>,
    /// Delay applied to counter and chain head reads.
    pub delay: Option<Duration>,

    pub calls: AtomicUsize,
    pub listing_counter_reads: AtomicUsize,
    pub fetched_listings: Mutex<Vec<u64>>,
    pub fetched_auctions: Mutex<Vec<u64>>,
    pub scanned: Mutex<Vec<(LogEventKind, BlockRange)>>,
}

impl MockLedger {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            ..Default::default()
        }
    }

    pub fn add_token(&mut self, collection: Address, token_id: u64, owner: Address, creator: Address) {
        self.tokens.insert(
            (collection, token_id),
            MockToken {
                metadata: metadata(&format!("Track {}", token_id)),
                owner,
                creator,
            },
        );
    }

    pub fn add_log(&mut self, log: LogEvent, timestamp: u64) {
        self.block_times.insert(log.block_hash, timestamp);
        self.logs.entry(log.kind).or_default().push(log);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Aggregation passes that reached the ledger (one counter read each).
    pub fn passes_started(&self) -> usize {
        self.listing_counter_reads.load(Ordering::SeqCst)
    }

    fn call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn missing(function: &str) -> ChainError {
    ChainError::CallFailed {
        contract: "mock".into(),
        function: function.into(),
        message: "execution reverted".into(),
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn chain_id(&self) -> ChainResult<ChainId> {
        self.call();
        Ok(self.chain_id)
    }

    async fn latest_block_number(&self) -> ChainResult<u64> {
        self.call();
        self.pause().await;
        Ok(self.latest_block)
    }

    async fn listing_counter(&self, _marketplace: &Address) -> ChainResult<u64> {
        self.call();
        self.listing_counter_reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_counters {
            return Err(ChainError::RpcError("connection reset".into()));
        }
        Ok(self.listing_counter)
    }

    async fn auction_counter(&self, _marketplace: &Address) -> ChainResult<u64> {
        self.call();
        if self.fail_counters {
            return Err(ChainError::RpcError("connection reset".into()));
        }
        Ok(self.auction_counter)
    }

    async fn listing(&self, _marketplace: &Address, listing_id: u64) -> ChainResult<RawListing> {
        self.call();
        self.fetched_listings.lock().unwrap().push(listing_id);
        self.listings
            .get(&listing_id)
            .cloned()
            .ok_or_else(|| missing("getActiveListing"))
    }

    async fn auction(&self, _marketplace: &Address, auction_id: u64) -> ChainResult<RawAuction> {
        self.call();
        self.fetched_auctions.lock().unwrap().push(auction_id);
        self.auctions
            .get(&auction_id)
            .cloned()
            .ok_or_else(|| missing("getActiveAuction"))
    }

    async fn all_collections(&self, _factory: &Address) -> ChainResult<Vec<Address>> {
        self.call();
        Ok(self.collections.clone())
    }

    async fn creator_collections(
        &self,
        _factory: &Address,
        creator: &Address,
    ) -> ChainResult<Vec<Address>> {
        self.call();
        Ok(self
            .creator_collections
            .get(creator)
            .cloned()
            .unwrap_or_default())
    }

    async fn total_supply(&self, collection: &Address) -> ChainResult<u64> {
        self.call();
        self.supplies
            .get(collection)
            .copied()
            .ok_or_else(|| missing("totalSupply"))
    }

    async fn music_metadata(
        &self,
        collection: &Address,
        token_id: u64,
    ) -> ChainResult<MusicMetadata> {
        self.call();
        self.tokens
            .get(&(*collection, token_id))
            .map(|t| t.metadata.clone())
            .ok_or_else(|| missing("getMusicMetadata"))
    }

    async fn owner_of(&self, collection: &Address, token_id: u64) -> ChainResult<Address> {
        self.call();
        self.tokens
            .get(&(*collection, token_id))
            .map(|t| t.owner)
            .ok_or_else(|| missing("ownerOf"))
    }

    async fn token_creator(&self, collection: &Address, token_id: u64) -> ChainResult<Address> {
        self.call();
        self.tokens
            .get(&(*collection, token_id))
            .map(|t| t.creator)
            .ok_or_else(|| missing("tokenCreator"))
    }

    async fn logs(
        &self,
        _contract: &Address,
        kind: LogEventKind,
        range: BlockRange,
    ) -> ChainResult<Vec<LogEvent>> {
        self.call();
        self.scanned.lock().unwrap().push((kind, range));
        if self.failing_scans.contains(&kind) {
            return Err(ChainError::LogQueryFailed {
                event: kind.name().into(),
                message: "query returned more than 10000 results".into(),
            });
        }
        Ok(self.logs.get(&kind).cloned().unwrap_or_default())
    }

    async fn block_timestamp(&self, block_hash: &BlockHash) -> ChainResult<u64> {
        self.call();
        self.block_times
            .get(block_hash)
            .copied()
            .ok_or_else(|| ChainError::BlockNotFound(block_hash.to_hex()))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn metadata(title: &str) -> MusicMetadata {
    MusicMetadata {
        title: title.into(),
        artist: "Nova".into(),
        genre: "Synthwave".into(),
        duration_secs: 184,
        audio_url: "ipfs://audio".into(),
        cover_art: "ipfs://cover".into(),
        created_at: 1_700_000_000,
        is_ai_generated: true,
    }
}

pub fn raw_listing(nft_contract: Address, token_id: u64, price: u128, is_active: bool) -> RawListing {
    RawListing {
        seller: Address([0x5e; 20]),
        nft_contract,
        token_id,
        price,
        is_active,
        listed_at: 1_700_000_100,
    }
}

pub fn raw_auction(
    nft_contract: Address,
    token_id: u64,
    starting_price: u128,
    current_bid: u128,
) -> RawAuction {
    RawAuction {
        seller: Address([0x5e; 20]),
        nft_contract,
        token_id,
        starting_price,
        current_bid,
        current_bidder: if current_bid > 0 { Address([0xb1; 20]) } else { Address::ZERO },
        end_time: 1_900_000_000,
        is_active: true,
        created_at: 1_700_000_200,
    }
}

pub fn log_event(
    kind: LogEventKind,
    args: serde_json::Value,
    tx: u8,
    log_index: u64,
    block: u8,
) -> LogEvent {
    LogEvent {
        kind,
        args,
        tx_hash: TxHash([tx; 32]),
        log_index,
        block_hash: BlockHash([block; 32]),
        block_number: u64::from(block),
    }
}
