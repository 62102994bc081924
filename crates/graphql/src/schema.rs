//! GraphQL schema definition.
//!
//! Every query reads the latest published snapshot through the
//! [`MarketReader`] port. Only `activity` and `creatorCollections` go to the
//! ledger, since they depend on the address asked about.

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, Object, Result, Schema};
use chrono::Utc;

use beatchain_core::models::{ActivityOutcome, Address};
use beatchain_core::ports::MarketReader;

use crate::types::{Activity, ActivityFeed, Auction, BeatchainSchema, Listing, MarketStatus, Nft};

// -----------------------------------------------------------------------------
// Schema Configuration
// -----------------------------------------------------------------------------

/// Maximum query depth to prevent deeply nested queries (DoS protection).
/// Note: GraphQL introspection requires depth ~13, so we use 15 to allow it.
pub const MAX_QUERY_DEPTH: usize = 15;

/// Maximum query complexity score (DoS protection).
/// Each field has a default complexity of 1, nested objects multiply.
pub const MAX_QUERY_COMPLEXITY: usize = 500;

/// Default number of activity items returned.
const DEFAULT_ACTIVITY_SIZE: i32 = 10;
/// Maximum number of activity items returned.
const MAX_ACTIVITY_SIZE: i32 = 100;
/// Maximum length of an address argument ("0x" + 40 hex chars).
const MAX_ADDRESS_LENGTH: usize = 42;

/// Build the marketplace schema over a reader.
///
/// Includes query depth and complexity limits for DoS protection.
pub fn build_schema<R: MarketReader + 'static>(reader: Arc<R>) -> BeatchainSchema {
    let reader: Arc<dyn MarketReader> = reader;
    Schema::build(MarketQuery, MarketMutation, EmptySubscription)
        .data(reader)
        .limit_depth(MAX_QUERY_DEPTH)
        .limit_complexity(MAX_QUERY_COMPLEXITY)
        .finish()
}

// -----------------------------------------------------------------------------
// Query
// -----------------------------------------------------------------------------

/// Marketplace queries.
#[derive(Default)]
pub struct MarketQuery;

#[Object]
impl MarketQuery {
    /// Status of the latest snapshot.
    async fn status<'ctx>(&self, ctx: &Context<'ctx>) -> Result<MarketStatus> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        Ok(MarketStatus::new(&reader.snapshot(), reader.currency()))
    }

    /// Active fixed-price listings, optionally of one seller.
    async fn listings<'ctx>(&self, ctx: &Context<'ctx>, seller: Option<String>) -> Result<Vec<Listing>> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        let seller = seller.as_deref().map(parse_address).transpose()?;

        let snapshot = reader.snapshot();
        let listings = match seller {
            Some(seller) => snapshot
                .market
                .listings_by_seller(&seller)
                .into_iter()
                .map(Listing::from)
                .collect(),
            None => snapshot.market.listings.iter().map(Listing::from).collect(),
        };
        Ok(listings)
    }

    /// Active auctions, optionally of one seller. With `liveOnly`, auctions
    /// past their end time are left out.
    async fn auctions<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        seller: Option<String>,
        #[graphql(default = false)] live_only: bool,
    ) -> Result<Vec<Auction>> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        let seller = seller.as_deref().map(parse_address).transpose()?;
        let now = Utc::now();

        let snapshot = reader.snapshot();
        Ok(snapshot
            .market
            .auctions
            .iter()
            .filter(|a| seller.is_none_or(|s| a.seller == s))
            .filter(|a| !live_only || a.is_live(now))
            .map(|a| Auction::new(a, now))
            .collect())
    }

    /// Active listing of a token, if any.
    async fn listing_for<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        contract: String,
        token_id: u64,
    ) -> Result<Option<Listing>> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        let contract = parse_address(&contract)?;

        let snapshot = reader.snapshot();
        Ok(snapshot.market.listing_for(&contract, token_id).map(Listing::from))
    }

    /// Active auction of a token, if any.
    async fn auction_for<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        contract: String,
        token_id: u64,
    ) -> Result<Option<Auction>> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        let contract = parse_address(&contract)?;

        let snapshot = reader.snapshot();
        Ok(snapshot
            .market
            .auction_for(&contract, token_id)
            .map(|a| Auction::new(a, Utc::now())))
    }

    /// The full NFT catalog. With `onMarketOnly`, unlisted tokens are left out.
    async fn catalog<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        #[graphql(default = false)] on_market_only: bool,
    ) -> Result<Vec<Nft>> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;

        let snapshot = reader.snapshot();
        Ok(snapshot
            .catalog
            .records
            .iter()
            .filter(|r| !on_market_only || r.market.is_listed())
            .map(Nft::from)
            .collect())
    }

    /// A single NFT.
    async fn nft<'ctx>(&self, ctx: &Context<'ctx>, contract: String, token_id: u64) -> Result<Option<Nft>> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        let contract = parse_address(&contract)?;

        let snapshot = reader.snapshot();
        Ok(snapshot.catalog.get(&contract, token_id).map(Nft::from))
    }

    /// NFTs currently owned by an address.
    async fn owned<'ctx>(&self, ctx: &Context<'ctx>, address: String) -> Result<Vec<Nft>> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        let address = parse_address(&address)?;

        let snapshot = reader.snapshot();
        Ok(snapshot.catalog.owned_by(&address).into_iter().map(Nft::from).collect())
    }

    /// NFTs originally created by an address.
    async fn created<'ctx>(&self, ctx: &Context<'ctx>, address: String) -> Result<Vec<Nft>> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        let address = parse_address(&address)?;

        let snapshot = reader.snapshot();
        Ok(snapshot.catalog.created_by(&address).into_iter().map(Nft::from).collect())
    }

    /// Activity feed of an address, newest first.
    async fn activity<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        address: String,
        #[graphql(default = 10)] first: Option<i32>,
    ) -> Result<ActivityFeed> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        let address = parse_address(&address)?;
        let limit = validate_activity_first(first);

        let feed = match reader.activity(&address, Some(limit)).await {
            ActivityOutcome::Current(items) => {
                let currency = reader.currency();
                ActivityFeed {
                    superseded: false,
                    items: items
                        .into_iter()
                        .map(|item| Activity::new(item, &currency))
                        .collect(),
                }
            }
            ActivityOutcome::Superseded => ActivityFeed {
                superseded: true,
                items: Vec::new(),
            },
        };
        Ok(feed)
    }

    /// Collections deployed through the factory by a creator.
    async fn creator_collections<'ctx>(&self, ctx: &Context<'ctx>, address: String) -> Result<Vec<String>> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        let address = parse_address(&address)?;

        let collections = reader.creator_collections(&address).await;
        Ok(collections.iter().map(Address::to_hex).collect())
    }
}

// -----------------------------------------------------------------------------
// Mutation
// -----------------------------------------------------------------------------

/// Marketplace mutations. Nothing here writes to the ledger.
#[derive(Default)]
pub struct MarketMutation;

#[Object]
impl MarketMutation {
    /// Request a rebuild of the snapshot. Returns `false` if a rebuild could
    /// not be queued.
    async fn refresh<'ctx>(&self, ctx: &Context<'ctx>) -> Result<bool> {
        let reader = ctx.data::<Arc<dyn MarketReader>>()?;
        Ok(reader.request_refresh())
    }
}

// -----------------------------------------------------------------------------
// Helpers & Validation
// -----------------------------------------------------------------------------

/// Parse and validate an address argument.
fn parse_address(s: &str) -> Result<Address> {
    if s.len() > MAX_ADDRESS_LENGTH {
        return Err(async_graphql::Error::new(format!(
            "Address too long: maximum {} characters allowed",
            MAX_ADDRESS_LENGTH
        )));
    }

    Address::from_hex(s).map_err(|e| async_graphql::Error::new(format!("Invalid address: {}", e)))
}

/// Validate and normalize the activity `first` parameter.
fn validate_activity_first(first: Option<i32>) -> usize {
    first.unwrap_or(DEFAULT_ACTIVITY_SIZE).clamp(1, MAX_ACTIVITY_SIZE) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use beatchain_core::models::{
        ActivityItem, ActivityKind, ActivityStatus, Catalog, Listing as CoreListing,
        MarketAnnotation, MarketSnapshot, MarketState, MusicMetadata, NftRecord, PassKey, TxHash,
        datetime_from_secs,
    };

    const ONE: u128 = 1_000_000_000_000_000_000;

    fn addr(byte: u8) -> Address {
        Address([byte; 20])
    }

    struct StubReader {
        snapshot: Arc<MarketSnapshot>,
        activity: ActivityOutcome,
        last_limit: Mutex<Option<usize>>,
        refreshed: AtomicBool,
    }

    impl StubReader {
        fn new(activity: ActivityOutcome) -> Self {
            let listing = CoreListing {
                listing_id: 1,
                seller: addr(0x11),
                nft_contract: addr(0xaa),
                token_id: 0,
                price: ONE,
                is_active: true,
                listed_at: datetime_from_secs(1_000),
            };
            let record = |token_id, market| NftRecord {
                token_id,
                contract: addr(0xaa),
                metadata: MusicMetadata::default(),
                owner: addr(0x11),
                creator: addr(0x22),
                market,
                listed_at: None,
            };
            let snapshot = MarketSnapshot {
                key: PassKey {
                    chain_id: Some(1328),
                    epoch: 3,
                },
                market: MarketState {
                    listing_counter: 2,
                    auction_counter: 0,
                    listings: vec![listing],
                    auctions: vec![],
                },
                catalog: Catalog {
                    collections: vec![addr(0xaa)],
                    records: vec![
                        record(
                            0,
                            MarketAnnotation::FixedPrice {
                                listing_id: 1,
                                price: ONE,
                            },
                        ),
                        record(1, MarketAnnotation::NotListed),
                    ],
                },
                built_at: Some(datetime_from_secs(2_000)),
            };

            Self {
                snapshot: Arc::new(snapshot),
                activity,
                last_limit: Mutex::new(None),
                refreshed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MarketReader for StubReader {
        fn snapshot(&self) -> Arc<MarketSnapshot> {
            self.snapshot.clone()
        }

        fn currency(&self) -> String {
            "SEI".to_string()
        }

        async fn activity(&self, _user: &Address, limit: Option<usize>) -> ActivityOutcome {
            *self.last_limit.lock().unwrap() = limit;
            self.activity.clone()
        }

        async fn creator_collections(&self, creator: &Address) -> Vec<Address> {
            if *creator == addr(0x22) { vec![addr(0xaa)] } else { vec![] }
        }

        fn request_refresh(&self) -> bool {
            self.refreshed.store(true, Ordering::SeqCst);
            true
        }
    }

    fn schema(reader: Arc<StubReader>) -> BeatchainSchema {
        build_schema(reader)
    }

    fn sale_item() -> ActivityItem {
        let tx = TxHash([0x01; 32]);
        ActivityItem {
            id: ActivityItem::derive_id(ActivityKind::Purchase, &tx, 0),
            kind: ActivityKind::Purchase,
            title: "Purchased NFT".into(),
            description: "Bought listing #1 for 1.0 SEI".into(),
            timestamp_ms: 2_000_000,
            tx_hash: tx,
            log_index: 0,
            amount: Some(ONE),
            amount_display: Some("1.0 SEI".into()),
            status: ActivityStatus::Confirmed,
        }
    }

    #[test]
    fn test_parse_address_rejects_invalid_input() {
        assert!(parse_address(&"ab".repeat(100)).is_err());
        assert!(parse_address("0x<script>alert(1)</script>").is_err());
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address(&format!("0x{}", "AB".repeat(20))).is_ok());
    }

    #[test]
    fn test_activity_first_clamping() {
        assert_eq!(validate_activity_first(None), 10);
        assert_eq!(validate_activity_first(Some(-5)), 1);
        assert_eq!(validate_activity_first(Some(10_000)), MAX_ACTIVITY_SIZE as usize);
    }

    #[tokio::test]
    async fn test_status_reports_snapshot() {
        let schema = schema(Arc::new(StubReader::new(ActivityOutcome::Current(vec![]))));
        let res = schema
            .execute("{ status { chainId epoch currency listingCounter activeListings catalogSize } }")
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);

        let data = res.data.into_json().unwrap();
        assert_eq!(data["status"]["chainId"], 1328);
        assert_eq!(data["status"]["epoch"], 3);
        assert_eq!(data["status"]["currency"], "SEI");
        assert_eq!(data["status"]["listingCounter"], 2);
        assert_eq!(data["status"]["activeListings"], 1);
        assert_eq!(data["status"]["catalogSize"], 2);
    }

    #[tokio::test]
    async fn test_catalog_exposes_one_priced_token() {
        let schema = schema(Arc::new(StubReader::new(ActivityOutcome::Current(vec![]))));
        let res = schema
            .execute("{ catalog { tokenId market { isListed display } } }")
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);

        let data = res.data.into_json().unwrap();
        let records = data["catalog"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["market"]["display"], "1.0 (fixed price)");
        assert_eq!(records[1]["market"]["isListed"], false);

        let res = schema.execute("{ catalog(onMarketOnly: true) { tokenId } }").await;
        let data = res.data.into_json().unwrap();
        assert_eq!(data["catalog"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_listings_by_seller_ignores_case() {
        let schema = schema(Arc::new(StubReader::new(ActivityOutcome::Current(vec![]))));
        let query = format!(
            r#"{{ listings(seller: "0x{}") {{ listingId price priceFormatted }} }}"#,
            "11".repeat(20).to_uppercase()
        );
        let res = schema.execute(query).await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);

        let data = res.data.into_json().unwrap();
        assert_eq!(data["listings"][0]["listingId"], 1);
        assert_eq!(data["listings"][0]["price"], ONE.to_string());
        assert_eq!(data["listings"][0]["priceFormatted"], "1.0");

        let other = format!(r#"{{ listings(seller: "0x{}") {{ listingId }} }}"#, "33".repeat(20));
        let data = schema.execute(other).await.data.into_json().unwrap();
        assert!(data["listings"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_address_is_an_error() {
        let schema = schema(Arc::new(StubReader::new(ActivityOutcome::Current(vec![]))));
        let res = schema.execute(r#"{ owned(address: "nope") { tokenId } }"#).await;
        assert_eq!(res.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_activity_passes_clamped_limit() {
        let reader = Arc::new(StubReader::new(ActivityOutcome::Current(vec![sale_item()])));
        let schema = schema(reader.clone());
        let query = format!(
            r#"{{ activity(address: "0x{}", first: 500) {{ superseded items {{ kind title amount amountDisplay }} }} }}"#,
            "11".repeat(20)
        );
        let res = schema.execute(query).await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(*reader.last_limit.lock().unwrap(), Some(MAX_ACTIVITY_SIZE as usize));

        let data = res.data.into_json().unwrap();
        assert_eq!(data["activity"]["superseded"], false);
        assert_eq!(data["activity"]["items"][0]["kind"], "purchase");
        assert_eq!(data["activity"]["items"][0]["amountDisplay"], "1.0 SEI");
    }

    #[tokio::test]
    async fn test_superseded_activity() {
        let schema = schema(Arc::new(StubReader::new(ActivityOutcome::Superseded)));
        let query = format!(
            r#"{{ activity(address: "0x{}") {{ superseded items {{ id }} }} }}"#,
            "11".repeat(20)
        );
        let data = schema.execute(query).await.data.into_json().unwrap();
        assert_eq!(data["activity"]["superseded"], true);
        assert!(data["activity"]["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_creator_collections() {
        let schema = schema(Arc::new(StubReader::new(ActivityOutcome::Current(vec![]))));
        let query = format!(r#"{{ creatorCollections(address: "0x{}") }}"#, "22".repeat(20));
        let data = schema.execute(query).await.data.into_json().unwrap();
        assert_eq!(data["creatorCollections"][0], format!("0x{}", "aa".repeat(20)));
    }

    #[tokio::test]
    async fn test_refresh_mutation() {
        let reader = Arc::new(StubReader::new(ActivityOutcome::Current(vec![])));
        let schema = schema(reader.clone());
        let data = schema.execute("mutation { refresh }").await.data.into_json().unwrap();
        assert_eq!(data["refresh"], true);
        assert!(reader.refreshed.load(Ordering::SeqCst));
    }
}
