//! EVM JSON-RPC adapter for the Beatchain marketplace service.
//!
//! This crate implements the [`LedgerGateway`] port from `beatchain-core`,
//! reading the marketplace, factory and collection contracts of any EVM
//! chain over HTTP JSON-RPC.
//!
//! # Features
//!
//! - Read-only contract calls decoded from embedded JSON ABIs
//! - Historical log queries filtered by contract, event and block window
//! - ABI token to JSON conversion for log arguments
//! - Overflow-checked conversion of `uint256` values into domain integers
//!
//! # Usage
//!
//! ```ignore
//! use beatchain_evm::{EvmClient, EvmClientConfig};
//!
//! let config = EvmClientConfig {
//!     rpc_url: "https://evm-rpc-testnet.sei-apis.com".to_string(),
//! };
//!
//! let client = EvmClient::connect(config).await?;
//! let chain_id = client.chain_id().await?;
//! let counter = client.listing_counter(&marketplace).await?;
//! ```
//!
//! [`LedgerGateway`]: beatchain_core::ports::LedgerGateway

mod abi;
mod client;

pub use abi::ContractAbis;
pub use client::{EvmClient, EvmClientConfig};
