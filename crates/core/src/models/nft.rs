//! Music NFT records, their market annotation and the joined catalog.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Address, Auction, Listing, format_native};

// =============================================================================
// Music metadata
// =============================================================================

/// On-chain music metadata stored by a collection for each token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicMetadata {
    pub title: String,
    pub artist: String,
    pub genre: String,
    /// Track length in seconds.
    pub duration_secs: u64,
    pub audio_url: String,
    pub cover_art: String,
    /// Mint time, in seconds since the epoch.
    pub created_at: u64,
    pub is_ai_generated: bool,
}

// =============================================================================
// Market annotation
// =============================================================================

/// What a displayed price stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceLabel {
    /// Highest accepted bid of a running auction.
    CurrentBid,
    /// Auction without bids yet.
    StartingPrice,
    /// Fixed-price listing.
    FixedPrice,
}

impl PriceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentBid => "current bid",
            Self::StartingPrice => "starting price",
            Self::FixedPrice => "fixed price",
        }
    }
}

impl fmt::Display for PriceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived market state of a single token.
///
/// At most one of listing or auction is reported, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketAnnotation {
    /// Neither listed nor on auction.
    NotListed,
    /// Offered at a fixed price.
    FixedPrice { listing_id: u64, price: u128 },
    /// On auction; `price` is the current bid or, without bids, the starting price.
    Auction {
        auction_id: u64,
        price: u128,
        label: PriceLabel,
        end_time: DateTime<Utc>,
    },
}

impl MarketAnnotation {
    /// Build the annotation for a token from its active listing and auction.
    ///
    /// The ledger guarantees at most one of them per token. Should both
    /// show up anyway, the auction wins.
    pub fn derive(listing: Option<&Listing>, auction: Option<&Auction>) -> Self {
        if let Some(auction) = auction {
            let (price, label) = if auction.has_bids() {
                (auction.current_bid, PriceLabel::CurrentBid)
            } else {
                (auction.starting_price, PriceLabel::StartingPrice)
            };
            return Self::Auction {
                auction_id: auction.auction_id,
                price,
                label,
                end_time: auction.end_time,
            };
        }

        match listing {
            Some(listing) => Self::FixedPrice {
                listing_id: listing.listing_id,
                price: listing.price,
            },
            None => Self::NotListed,
        }
    }

    /// Displayed price, if any.
    pub fn price(&self) -> Option<u128> {
        match self {
            Self::NotListed => None,
            Self::FixedPrice { price, .. } | Self::Auction { price, .. } => Some(*price),
        }
    }

    /// What the displayed price stands for, if any.
    pub fn label(&self) -> Option<PriceLabel> {
        match self {
            Self::NotListed => None,
            Self::FixedPrice { .. } => Some(PriceLabel::FixedPrice),
            Self::Auction { label, .. } => Some(*label),
        }
    }

    /// Human-readable price, e.g. `"0.5 (current bid)"`.
    pub fn display(&self) -> Option<String> {
        Some(format!("{} ({})", format_native(self.price()?), self.label()?))
    }

    pub fn is_listed(&self) -> bool {
        !matches!(self, Self::NotListed)
    }
}

// =============================================================================
// NFT records
// =============================================================================

/// A music NFT joined with its ownership, authorship and market data.
///
/// `(contract, token_id)` is unique across a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftRecord {
    /// Token identifier within the collection.
    pub token_id: u64,
    /// Collection contract.
    pub contract: Address,
    pub metadata: MusicMetadata,
    /// Current owner.
    pub owner: Address,
    /// Original creator.
    pub creator: Address,
    /// Derived market annotation.
    pub market: MarketAnnotation,
    /// When the token was put on the market (listing or auction creation).
    pub listed_at: Option<DateTime<Utc>>,
}

/// Every token of every known collection, joined with the market state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Collections the catalog was built from.
    pub collections: Vec<Address>,
    /// Successfully fetched tokens.
    pub records: Vec<NftRecord>,
}

impl Catalog {
    /// Tokens currently owned by `owner`.
    pub fn owned_by(&self, owner: &Address) -> Vec<&NftRecord> {
        self.records.iter().filter(|r| &r.owner == owner).collect()
    }

    /// Tokens originally created by `creator`.
    pub fn created_by(&self, creator: &Address) -> Vec<&NftRecord> {
        self.records.iter().filter(|r| &r.creator == creator).collect()
    }

    /// Look up a single token.
    pub fn get(&self, contract: &Address, token_id: u64) -> Option<&NftRecord> {
        self.records
            .iter()
            .find(|r| &r.contract == contract && r.token_id == token_id)
    }

    /// Tokens carrying a listing or auction annotation.
    pub fn on_market(&self) -> Vec<&NftRecord> {
        self.records.iter().filter(|r| r.market.is_listed()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
