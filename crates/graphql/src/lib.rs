//! GraphQL API for the Beatchain marketplace service.
//!
//! Exposes the latest marketplace snapshot (listings, auctions, the NFT
//! catalog) and per-address activity feeds. The schema only depends on the
//! [`MarketReader`] port, so any implementation can back it.
//!
//! ```ignore
//! use beatchain_graphql::{build_schema, serve_with_shutdown, ServerConfig};
//!
//! let schema = build_schema(service.clone());
//! serve_with_shutdown(schema, ServerConfig::default(), shutdown).await?;
//! ```
//!
//! [`MarketReader`]: beatchain_core::ports::MarketReader

mod schema;
mod server;
mod types;

pub use schema::{
    build_schema, MarketMutation, MarketQuery, MAX_QUERY_COMPLEXITY, MAX_QUERY_DEPTH,
};
pub use server::{serve_with_shutdown, ServerConfig};
pub use types::BeatchainSchema;
