//! Core domain layer for the Beatchain marketplace service.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! business logic services that read a music-NFT marketplace from the
//! ledger. It follows hexagonal architecture principles - this is the
//! innermost layer with no dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     beatchain (binary)                      │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │      beatchain-graphql       │        beatchain-evm         │
//! │           (API)              │          (JSON-RPC)          │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                    beatchain-core  ← YOU ARE HERE           │
//! │               (models, ports, services)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (Listing, Auction, NftRecord, ActivityItem, etc.)
//! - [`ports`] - Interface traits for adapters to implement
//! - [`services`] - Aggregator, catalog joiner, activity reconstructor, cache
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! - [`ports::LedgerGateway`] - Read contract state and historical logs
//! - [`ports::MarketReader`] - Read the cached views (implemented here,
//!   consumed by the API layer)
//!
//! ## Snapshot Lifecycle
//!
//! 1. A refresh trigger arrives (network switch, manual refresh, registry reload)
//! 2. The aggregator enumerates active listings and auctions
//! 3. The catalog joiner enumerates collection tokens and joins market state
//! 4. The snapshot is published if its inputs are still current
//! 5. Readers clone the latest snapshot; nothing is mutated in place

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;

#[cfg(test)]
mod testing;
