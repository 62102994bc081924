//! GraphQL type definitions.
//!
//! Ledger amounts are `u128` values in the smallest currency unit, far beyond
//! GraphQL's `Int`, so they are exposed as decimal strings next to their
//! formatted rendering.

use async_graphql::{EmptySubscription, Schema};
use chrono::{DateTime, Utc};

use beatchain_core::models::{self, format_native, format_with_symbol};

use crate::schema::{MarketMutation, MarketQuery};

/// The marketplace GraphQL schema type.
pub type BeatchainSchema = Schema<MarketQuery, MarketMutation, EmptySubscription>;

/// Snapshot status.
#[derive(async_graphql::SimpleObject)]
pub struct MarketStatus {
    pub chain_id: Option<u64>,
    pub epoch: u64,
    pub built_at: Option<DateTime<Utc>>,
    pub currency: String,
    pub listing_counter: u64,
    pub auction_counter: u64,
    pub active_listings: u64,
    pub active_auctions: u64,
    pub catalog_size: u64,
}

impl MarketStatus {
    pub fn new(snapshot: &models::MarketSnapshot, currency: String) -> Self {
        Self {
            chain_id: snapshot.key.chain_id,
            epoch: snapshot.key.epoch,
            built_at: snapshot.built_at,
            currency,
            listing_counter: snapshot.market.listing_counter,
            auction_counter: snapshot.market.auction_counter,
            active_listings: snapshot.market.listings.len() as u64,
            active_auctions: snapshot.market.auctions.len() as u64,
            catalog_size: snapshot.catalog.len() as u64,
        }
    }
}

/// Fixed-price listing.
#[derive(async_graphql::SimpleObject)]
pub struct Listing {
    pub listing_id: u64,
    pub seller: String,
    pub nft_contract: String,
    pub token_id: u64,
    pub price: String,
    pub price_formatted: String,
    pub is_active: bool,
    pub listed_at: DateTime<Utc>,
}

impl From<&models::Listing> for Listing {
    fn from(l: &models::Listing) -> Self {
        Self {
            listing_id: l.listing_id,
            seller: l.seller.to_hex(),
            nft_contract: l.nft_contract.to_hex(),
            token_id: l.token_id,
            price: l.price.to_string(),
            price_formatted: format_native(l.price),
            is_active: l.is_active,
            listed_at: l.listed_at,
        }
    }
}

/// Auction.
#[derive(async_graphql::SimpleObject)]
pub struct Auction {
    pub auction_id: u64,
    pub seller: String,
    pub nft_contract: String,
    pub token_id: u64,
    pub starting_price: String,
    pub current_bid: String,
    pub current_bid_formatted: String,
    pub has_bids: bool,
    pub highest_bidder: Option<String>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub is_live: bool,
    pub started_at: DateTime<Utc>,
}

impl Auction {
    pub fn new(a: &models::Auction, now: DateTime<Utc>) -> Self {
        Self {
            auction_id: a.auction_id,
            seller: a.seller.to_hex(),
            nft_contract: a.nft_contract.to_hex(),
            token_id: a.token_id,
            starting_price: a.starting_price.to_string(),
            current_bid: a.current_bid.to_string(),
            current_bid_formatted: format_native(a.current_bid),
            has_bids: a.has_bids(),
            highest_bidder: a.highest_bidder.map(|b| b.to_hex()),
            end_time: a.end_time,
            is_active: a.is_active,
            is_live: a.is_live(now),
            started_at: a.started_at,
        }
    }
}

/// What a token's displayed price stands for.
#[derive(async_graphql::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriceLabel {
    CurrentBid,
    StartingPrice,
    FixedPrice,
}

impl From<models::PriceLabel> for PriceLabel {
    fn from(label: models::PriceLabel) -> Self {
        match label {
            models::PriceLabel::CurrentBid => PriceLabel::CurrentBid,
            models::PriceLabel::StartingPrice => PriceLabel::StartingPrice,
            models::PriceLabel::FixedPrice => PriceLabel::FixedPrice,
        }
    }
}

/// Market state of one token. All fields are null when it is not listed.
#[derive(async_graphql::SimpleObject)]
pub struct MarketAnnotation {
    pub is_listed: bool,
    pub listing_id: Option<u64>,
    pub auction_id: Option<u64>,
    pub price: Option<String>,
    pub label: Option<PriceLabel>,
    pub display: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<&models::MarketAnnotation> for MarketAnnotation {
    fn from(m: &models::MarketAnnotation) -> Self {
        let (listing_id, auction_id, end_time) = match m {
            models::MarketAnnotation::NotListed => (None, None, None),
            models::MarketAnnotation::FixedPrice { listing_id, .. } => (Some(*listing_id), None, None),
            models::MarketAnnotation::Auction {
                auction_id,
                end_time,
                ..
            } => (None, Some(*auction_id), Some(*end_time)),
        };

        Self {
            is_listed: m.is_listed(),
            listing_id,
            auction_id,
            price: m.price().map(|p| p.to_string()),
            label: m.label().map(PriceLabel::from),
            display: m.display(),
            end_time,
        }
    }
}

/// Music metadata of a token.
#[derive(async_graphql::SimpleObject)]
pub struct MusicMetadata {
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub duration_secs: u64,
    pub audio_url: String,
    pub cover_art: String,
    pub created_at: u64,
    pub is_ai_generated: bool,
}

impl From<&models::MusicMetadata> for MusicMetadata {
    fn from(m: &models::MusicMetadata) -> Self {
        Self {
            title: m.title.clone(),
            artist: m.artist.clone(),
            genre: m.genre.clone(),
            duration_secs: m.duration_secs,
            audio_url: m.audio_url.clone(),
            cover_art: m.cover_art.clone(),
            created_at: m.created_at,
            is_ai_generated: m.is_ai_generated,
        }
    }
}

/// A music NFT joined with ownership and market data.
#[derive(async_graphql::SimpleObject)]
pub struct Nft {
    pub contract: String,
    pub token_id: u64,
    pub owner: String,
    pub creator: String,
    pub metadata: MusicMetadata,
    pub market: MarketAnnotation,
    pub listed_at: Option<DateTime<Utc>>,
}

impl From<&models::NftRecord> for Nft {
    fn from(r: &models::NftRecord) -> Self {
        Self {
            contract: r.contract.to_hex(),
            token_id: r.token_id,
            owner: r.owner.to_hex(),
            creator: r.creator.to_hex(),
            metadata: MusicMetadata::from(&r.metadata),
            market: MarketAnnotation::from(&r.market),
            listed_at: r.listed_at,
        }
    }
}

/// Activity feed entry.
#[derive(async_graphql::SimpleObject)]
pub struct Activity {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub timestamp_ms: i64,
    pub tx_hash: String,
    pub log_index: u64,
    pub amount: Option<String>,
    pub amount_display: Option<String>,
}

impl Activity {
    pub fn new(item: models::ActivityItem, currency: &str) -> Self {
        Self {
            amount_display: item
                .amount_display
                .or_else(|| item.amount.map(|a| format_with_symbol(a, currency))),
            amount: item.amount.map(|a| a.to_string()),
            id: item.id,
            kind: item.kind.as_str().to_string(),
            title: item.title,
            description: item.description,
            timestamp_ms: item.timestamp_ms,
            tx_hash: item.tx_hash.to_hex(),
            log_index: item.log_index,
        }
    }
}

/// Result of an activity query.
#[derive(async_graphql::SimpleObject)]
pub struct ActivityFeed {
    /// `true` when the network changed while the feed was being rebuilt;
    /// `items` is then empty and the query should be repeated.
    pub superseded: bool,
    pub items: Vec<Activity>,
}
