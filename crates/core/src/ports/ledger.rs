//! Port trait for the ledger query gateway.
//!
//! This trait defines every read the marketplace services perform against
//! the ledger: contract view calls, historical log queries and block
//! lookups. Implementations live in the infrastructure layer
//! (e.g., `beatchain-evm`).

use async_trait::async_trait;

use crate::error::ChainResult;
use crate::models::{Address, BlockHash, ChainId, MusicMetadata, TxHash};

// =============================================================================
// Raw contract records
// =============================================================================

/// Listing record as stored by the marketplace, before domain transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    pub seller: Address,
    pub nft_contract: Address,
    pub token_id: u64,
    pub price: u128,
    pub is_active: bool,
    /// Seconds since the epoch.
    pub listed_at: u64,
}

/// Auction record as stored by the marketplace, before domain transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAuction {
    pub seller: Address,
    pub nft_contract: Address,
    pub token_id: u64,
    pub starting_price: u128,
    pub current_bid: u128,
    /// Zero address while nobody has bid.
    pub current_bidder: Address,
    /// Seconds since the epoch.
    pub end_time: u64,
    pub is_active: bool,
    /// Seconds since the epoch.
    pub created_at: u64,
}

// =============================================================================
// Logs
// =============================================================================

/// Which deployed contract emits an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Marketplace,
    Factory,
}

/// Historical event kinds the activity reconstructor scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogEventKind {
    ItemListed,
    ItemSold,
    AuctionCreated,
    BidPlaced,
    AuctionEnded,
    CollectionCreated,
}

impl LogEventKind {
    /// Every scanned kind, marketplace events first.
    pub const ALL: [LogEventKind; 6] = [
        Self::ItemListed,
        Self::ItemSold,
        Self::AuctionCreated,
        Self::BidPlaced,
        Self::AuctionEnded,
        Self::CollectionCreated,
    ];

    /// ABI event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ItemListed => "ItemListed",
            Self::ItemSold => "ItemSold",
            Self::AuctionCreated => "AuctionCreated",
            Self::BidPlaced => "BidPlaced",
            Self::AuctionEnded => "AuctionEnded",
            Self::CollectionCreated => "CollectionCreated",
        }
    }

    pub fn source(&self) -> EventSource {
        match self {
            Self::CollectionCreated => EventSource::Factory,
            _ => EventSource::Marketplace,
        }
    }
}

/// Inclusive block window for a log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// The `lookback` most recent blocks ending at `latest`.
    pub fn lookback(latest: u64, lookback: u64) -> Self {
        Self {
            from: latest.saturating_sub(lookback),
            to: latest,
        }
    }
}

/// A log emitted by a settled transaction.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub kind: LogEventKind,
    /// Decoded arguments keyed by ABI parameter name. Addresses are hex
    /// strings, integers decimal strings.
    pub args: serde_json::Value,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_hash: BlockHash,
    pub block_number: u64,
}

// =============================================================================
// Gateway
// =============================================================================

/// Port trait for read-only ledger access.
///
/// Callers resolve contract addresses before calling, so "not deployed on
/// this network" never reaches this layer.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Chain the gateway is connected to.
    async fn chain_id(&self) -> ChainResult<ChainId>;

    /// Most recent block number.
    async fn latest_block_number(&self) -> ChainResult<u64>;

    /// Highest listing identifier assigned so far.
    async fn listing_counter(&self, marketplace: &Address) -> ChainResult<u64>;

    /// Highest auction identifier assigned so far.
    async fn auction_counter(&self, marketplace: &Address) -> ChainResult<u64>;

    /// Listing record at `listing_id`.
    async fn listing(&self, marketplace: &Address, listing_id: u64) -> ChainResult<RawListing>;

    /// Auction record at `auction_id`.
    async fn auction(&self, marketplace: &Address, auction_id: u64) -> ChainResult<RawAuction>;

    /// Every collection registered with the factory.
    async fn all_collections(&self, factory: &Address) -> ChainResult<Vec<Address>>;

    /// Collections created by `creator`.
    async fn creator_collections(
        &self,
        factory: &Address,
        creator: &Address,
    ) -> ChainResult<Vec<Address>>;

    /// Number of tokens minted in a collection.
    async fn total_supply(&self, collection: &Address) -> ChainResult<u64>;

    /// Music metadata of a token.
    async fn music_metadata(&self, collection: &Address, token_id: u64)
    -> ChainResult<MusicMetadata>;

    /// Current owner of a token.
    async fn owner_of(&self, collection: &Address, token_id: u64) -> ChainResult<Address>;

    /// Original creator of a token.
    async fn token_creator(&self, collection: &Address, token_id: u64) -> ChainResult<Address>;

    /// Logs of one event kind emitted by `contract` within `range`.
    async fn logs(
        &self,
        contract: &Address,
        kind: LogEventKind,
        range: BlockRange,
    ) -> ChainResult<Vec<LogEvent>>;

    /// Timestamp of a block, in seconds since the epoch.
    async fn block_timestamp(&self, block_hash: &BlockHash) -> ChainResult<u64>;
}
