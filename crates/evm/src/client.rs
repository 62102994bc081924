//! EVM JSON-RPC client with ABI-driven decoding.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::{Abi, Detokenize, Event, RawLog, Token, Tokenize};
use ethers::contract::Contract;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{BlockId, Filter, H160, H256, Log, U256};
use tracing::{debug, instrument, trace};

use beatchain_core::error::{ChainError, ChainResult};
use beatchain_core::metrics::record_decode_failure;
use beatchain_core::models::{Address, BlockHash, ChainId, MusicMetadata, TxHash};
use beatchain_core::ports::{
    BlockRange, EventSource, LedgerGateway, LogEvent, LogEventKind, RawAuction, RawListing,
};

use crate::abi::ContractAbis;

/// Configuration for the EVM client.
#[derive(Debug, Clone)]
pub struct EvmClientConfig {
    /// HTTP JSON-RPC URL (e.g., "http://localhost:8545").
    pub rpc_url: String,
}

impl Default for EvmClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
        }
    }
}

/// EVM client adapter implementing the LedgerGateway port.
pub struct EvmClient {
    provider: Arc<Provider<Http>>,
    abis: ContractAbis,
}

impl EvmClient {
    /// Connect to an EVM node and check it answers.
    #[instrument(skip_all, fields(url = %config.rpc_url))]
    pub async fn connect(config: EvmClientConfig) -> ChainResult<Self> {
        debug!("Connecting to node");

        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| ChainError::ConnectionFailed(e.to_string()))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| ChainError::ConnectionFailed(e.to_string()))?;

        debug!(chain = %chain_id, "Connected successfully");

        Ok(Self {
            provider: Arc::new(provider),
            abis: ContractAbis::load()?,
        })
    }

    /// Run a read-only contract call.
    async fn call<A, T>(&self, abi: &Abi, contract: &Address, function: &str, args: A) -> ChainResult<T>
    where
        A: Tokenize + Send,
        T: Detokenize + Send,
    {
        let call_failed = |message: String| ChainError::CallFailed {
            contract: contract.to_hex(),
            function: function.to_string(),
            message,
        };

        let instance = Contract::new(H160(contract.0), abi.clone(), Arc::clone(&self.provider));
        instance
            .method::<A, T>(function, args)
            .map_err(|e| call_failed(e.to_string()))?
            .call()
            .await
            .map_err(|e| call_failed(e.to_string()))
    }

    fn event(&self, kind: LogEventKind) -> ChainResult<&Event> {
        let abi = match kind.source() {
            EventSource::Marketplace => &self.abis.marketplace,
            EventSource::Factory => &self.abis.factory,
        };
        abi.event(kind.name())
            .map_err(|e| ChainError::DecodingError(e.to_string()))
    }
}

#[async_trait]
impl LedgerGateway for EvmClient {
    async fn chain_id(&self) -> ChainResult<ChainId> {
        let chain_id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;
        to_u64(chain_id, "chain id")
    }

    async fn latest_block_number(&self) -> ChainResult<u64> {
        let number = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;
        Ok(number.as_u64())
    }

    async fn listing_counter(&self, marketplace: &Address) -> ChainResult<u64> {
        let counter: U256 = self
            .call(&self.abis.marketplace, marketplace, "listingCounter", ())
            .await?;
        to_u64(counter, "listingCounter")
    }

    async fn auction_counter(&self, marketplace: &Address) -> ChainResult<u64> {
        let counter: U256 = self
            .call(&self.abis.marketplace, marketplace, "auctionCounter", ())
            .await?;
        to_u64(counter, "auctionCounter")
    }

    async fn listing(&self, marketplace: &Address, listing_id: u64) -> ChainResult<RawListing> {
        let (seller, nft_contract, token_id, price, is_active, listed_at): (
            H160,
            H160,
            U256,
            U256,
            bool,
            U256,
        ) = self
            .call(
                &self.abis.marketplace,
                marketplace,
                "getActiveListing",
                U256::from(listing_id),
            )
            .await?;

        Ok(RawListing {
            seller: Address(seller.0),
            nft_contract: Address(nft_contract.0),
            token_id: to_u64(token_id, "listing tokenId")?,
            price: to_u128(price, "listing price")?,
            is_active,
            listed_at: to_u64(listed_at, "listing listedAt")?,
        })
    }

    async fn auction(&self, marketplace: &Address, auction_id: u64) -> ChainResult<RawAuction> {
        #[allow(clippy::type_complexity)]
        let (
            seller,
            nft_contract,
            token_id,
            starting_price,
            current_bid,
            current_bidder,
            end_time,
            is_active,
            created_at,
        ): (H160, H160, U256, U256, U256, H160, U256, bool, U256) = self
            .call(
                &self.abis.marketplace,
                marketplace,
                "getActiveAuction",
                U256::from(auction_id),
            )
            .await?;

        Ok(RawAuction {
            seller: Address(seller.0),
            nft_contract: Address(nft_contract.0),
            token_id: to_u64(token_id, "auction tokenId")?,
            starting_price: to_u128(starting_price, "auction startingPrice")?,
            current_bid: to_u128(current_bid, "auction currentBid")?,
            current_bidder: Address(current_bidder.0),
            end_time: to_u64(end_time, "auction endTime")?,
            is_active,
            created_at: to_u64(created_at, "auction createdAt")?,
        })
    }

    async fn all_collections(&self, factory: &Address) -> ChainResult<Vec<Address>> {
        let collections: Vec<H160> = self
            .call(&self.abis.factory, factory, "getAllCollections", ())
            .await?;
        Ok(collections.into_iter().map(|c| Address(c.0)).collect())
    }

    async fn creator_collections(
        &self,
        factory: &Address,
        creator: &Address,
    ) -> ChainResult<Vec<Address>> {
        let collections: Vec<H160> = self
            .call(
                &self.abis.factory,
                factory,
                "getCreatorCollections",
                H160(creator.0),
            )
            .await?;
        Ok(collections.into_iter().map(|c| Address(c.0)).collect())
    }

    async fn total_supply(&self, collection: &Address) -> ChainResult<u64> {
        let supply: U256 = self
            .call(&self.abis.collection, collection, "totalSupply", ())
            .await?;
        to_u64(supply, "totalSupply")
    }

    async fn music_metadata(
        &self,
        collection: &Address,
        token_id: u64,
    ) -> ChainResult<MusicMetadata> {
        let (title, artist, genre, duration, audio_url, cover_art, created_at, is_ai_generated): (
            String,
            String,
            String,
            U256,
            String,
            String,
            U256,
            bool,
        ) = self
            .call(
                &self.abis.collection,
                collection,
                "getMusicMetadata",
                U256::from(token_id),
            )
            .await?;

        Ok(MusicMetadata {
            title,
            artist,
            genre,
            duration_secs: to_u64(duration, "metadata duration")?,
            audio_url,
            cover_art,
            created_at: to_u64(created_at, "metadata createdAt")?,
            is_ai_generated,
        })
    }

    async fn owner_of(&self, collection: &Address, token_id: u64) -> ChainResult<Address> {
        let owner: H160 = self
            .call(&self.abis.collection, collection, "ownerOf", U256::from(token_id))
            .await?;
        Ok(Address(owner.0))
    }

    async fn token_creator(&self, collection: &Address, token_id: u64) -> ChainResult<Address> {
        let creator: H160 = self
            .call(
                &self.abis.collection,
                collection,
                "tokenCreator",
                U256::from(token_id),
            )
            .await?;
        Ok(Address(creator.0))
    }

    #[instrument(skip(self, contract), fields(event = kind.name(), from = range.from, to = range.to))]
    async fn logs(
        &self,
        contract: &Address,
        kind: LogEventKind,
        range: BlockRange,
    ) -> ChainResult<Vec<LogEvent>> {
        let event = self.event(kind)?;
        let filter = Filter::new()
            .address(H160(contract.0))
            .topic0(event.signature())
            .from_block(range.from)
            .to_block(range.to);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| ChainError::LogQueryFailed {
                event: kind.name().to_string(),
                message: e.to_string(),
            })?;

        trace!(count = logs.len(), "Logs fetched");
        Ok(logs
            .into_iter()
            .filter_map(|log| decode_log(kind, event, log))
            .collect())
    }

    async fn block_timestamp(&self, block_hash: &BlockHash) -> ChainResult<u64> {
        let block = self
            .provider
            .get_block(BlockId::Hash(H256(block_hash.0)))
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?
            .ok_or_else(|| ChainError::BlockNotFound(block_hash.to_hex()))?;
        to_u64(block.timestamp, "block timestamp")
    }
}

// =============================================================================
// Log decoding helpers
// =============================================================================

/// Decode a raw log into a [`LogEvent`] with named JSON arguments.
///
/// Logs that do not match the event layout, or that lack their position
/// in the chain (pending logs), are dropped.
fn decode_log(kind: LogEventKind, event: &Event, log: Log) -> Option<LogEvent> {
    let (Some(tx_hash), Some(log_index), Some(block_hash), Some(block_number)) = (
        log.transaction_hash,
        log.log_index,
        log.block_hash,
        log.block_number,
    ) else {
        trace!(event = kind.name(), "Log without position skipped");
        return None;
    };

    let parsed = match event.parse_log(RawLog {
        topics: log.topics,
        data: log.data.to_vec(),
    }) {
        Ok(parsed) => parsed,
        Err(e) => {
            trace!(event = kind.name(), tx = ?tx_hash, error = %e, "Failed to decode log");
            record_decode_failure(kind.name());
            return None;
        }
    };

    let args: serde_json::Map<String, serde_json::Value> = parsed
        .params
        .into_iter()
        .map(|param| (param.name, token_to_json(&param.value)))
        .collect();

    Some(LogEvent {
        kind,
        args: serde_json::Value::Object(args),
        tx_hash: TxHash(tx_hash.0),
        log_index: log_index.low_u64(),
        block_hash: BlockHash(block_hash.0),
        block_number: block_number.as_u64(),
    })
}

// =============================================================================
// ABI Token to JSON conversion
// =============================================================================

/// Convert an ABI token to a JSON value.
///
/// Integers become decimal strings since JSON numbers cannot hold a u256.
fn token_to_json(token: &Token) -> serde_json::Value {
    match token {
        Token::Address(a) => serde_json::Value::String(format!("0x{}", hex::encode(a.0))),
        Token::Uint(n) | Token::Int(n) => serde_json::Value::String(n.to_string()),
        Token::Bool(b) => serde_json::Value::Bool(*b),
        Token::String(s) => serde_json::Value::String(s.clone()),
        Token::Bytes(bytes) | Token::FixedBytes(bytes) => {
            serde_json::Value::String(format!("0x{}", hex::encode(bytes)))
        }
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            serde_json::Value::Array(items.iter().map(token_to_json).collect())
        }
    }
}

// =============================================================================
// Numeric conversion
// =============================================================================

fn to_u64(value: U256, what: &str) -> ChainResult<u64> {
    if value.bits() > 64 {
        return Err(ChainError::ValueOverflow(what.to_string()));
    }
    Ok(value.as_u64())
}

fn to_u128(value: U256, what: &str) -> ChainResult<u128> {
    if value.bits() > 128 {
        return Err(ChainError::ValueOverflow(what.to_string()));
    }
    Ok(value.as_u128())
}
