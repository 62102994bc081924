//! Typed decoding of marketplace and factory log arguments.
//!
//! Every event kind has an explicit schema. A log missing a field, or
//! carrying a field that does not parse, is undecodable and yields `None`;
//! no field ever defaults to zero.

use serde_json::Value;

use crate::models::Address;
use crate::ports::{LogEvent, LogEventKind};

// =============================================================================
// Event schemas
// =============================================================================

/// Decoded arguments of one scanned event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    ItemListed {
        listing_id: u64,
        seller: Address,
        nft_contract: Address,
        token_id: u64,
        price: u128,
    },
    ItemSold {
        listing_id: u64,
        buyer: Address,
        seller: Address,
        price: u128,
    },
    AuctionCreated {
        auction_id: u64,
        seller: Address,
        nft_contract: Address,
        token_id: u64,
        starting_price: u128,
        end_time: u64,
    },
    BidPlaced {
        auction_id: u64,
        bidder: Address,
        amount: u128,
    },
    AuctionEnded {
        auction_id: u64,
        winner: Address,
        winning_bid: u128,
    },
    CollectionCreated {
        creator: Address,
        collection: Address,
        name: String,
        symbol: String,
    },
}

impl MarketEvent {
    /// Decode the arguments of `log` according to its kind.
    ///
    /// Arguments are looked up by their ABI parameter name.
    pub fn decode(log: &LogEvent) -> Option<Self> {
        let data = &log.args;
        let event = match log.kind {
            LogEventKind::ItemListed => Self::ItemListed {
                listing_id: field(data, "listingId", parse_u64)?,
                seller: field(data, "seller", parse_address)?,
                nft_contract: field(data, "nftContract", parse_address)?,
                token_id: field(data, "tokenId", parse_u64)?,
                price: field(data, "price", parse_amount)?,
            },
            LogEventKind::ItemSold => Self::ItemSold {
                listing_id: field(data, "listingId", parse_u64)?,
                buyer: field(data, "buyer", parse_address)?,
                seller: field(data, "seller", parse_address)?,
                price: field(data, "price", parse_amount)?,
            },
            LogEventKind::AuctionCreated => Self::AuctionCreated {
                auction_id: field(data, "auctionId", parse_u64)?,
                seller: field(data, "seller", parse_address)?,
                nft_contract: field(data, "nftContract", parse_address)?,
                token_id: field(data, "tokenId", parse_u64)?,
                starting_price: field(data, "startingPrice", parse_amount)?,
                end_time: field(data, "endTime", parse_u64)?,
            },
            LogEventKind::BidPlaced => Self::BidPlaced {
                auction_id: field(data, "auctionId", parse_u64)?,
                bidder: field(data, "bidder", parse_address)?,
                amount: field(data, "amount", parse_amount)?,
            },
            LogEventKind::AuctionEnded => Self::AuctionEnded {
                auction_id: field(data, "auctionId", parse_u64)?,
                winner: field(data, "winner", parse_address)?,
                winning_bid: field(data, "winningBid", parse_amount)?,
            },
            LogEventKind::CollectionCreated => Self::CollectionCreated {
                creator: field(data, "creator", parse_address)?,
                collection: field(data, "collection", parse_address)?,
                name: field(data, "name", parse_string)?,
                symbol: field(data, "symbol", parse_string)?,
            },
        };
        Some(event)
    }
}

// =============================================================================
// Field extraction
// =============================================================================

/// Extract a named field from log arguments.
///
/// Arguments that are not a JSON object never match.
///
/// ```ignore
/// let seller = field(args, "seller", parse_address);
/// ```
pub fn field<T>(data: &Value, key: &str, parser: fn(&Value) -> Option<T>) -> Option<T> {
    data.as_object()?.get(key).and_then(parser)
}

/// Parse a 20-byte address from a hex string, in any letter case.
pub fn parse_address(value: &Value) -> Option<Address> {
    match value {
        Value::String(s) => Address::from_hex(s).ok(),
        _ => None,
    }
}

/// Parse an amount (u128) from JSON.
///
/// Accepts JSON numbers, decimal strings and 0x-prefixed hex strings.
/// JSON numbers cannot hold every u128, so adapters send strings.
pub fn parse_amount(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u128::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
}

/// Parse a u64 from JSON.
pub fn parse_u64(value: &Value) -> Option<u64> {
    parse_amount(value).and_then(|v| v.try_into().ok())
}

pub fn parse_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}
