//! Error types for the marketplace domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`DomainError`] - Invalid domain input (network registry files)
//! - [`ChainError`] - Ledger RPC and contract call errors
//! - [`ServiceError`] - Why the service loop stopped
//!
//! Note that none of these errors ever reach a consumer of the produced
//! views: services degrade every failure to an empty, well-typed result
//! and only log it.

use thiserror::Error;

// =============================================================================
// Domain Errors
// =============================================================================

/// Domain input that cannot be accepted.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Network registry could not be loaded.
    #[error("Network registry error: {0}")]
    RegistryError(String),
}

// =============================================================================
// Chain Errors
// =============================================================================

/// Ledger RPC and connectivity errors.
///
/// These errors occur when reading contract state or historical logs
/// through the ledger gateway.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Connection to the RPC endpoint failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Generic RPC request failure.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// A read-only contract call reverted or could not be encoded.
    #[error("Call {function} on {contract} failed: {message}")]
    CallFailed {
        /// Contract address.
        contract: String,
        /// Function name.
        function: String,
        /// Error details.
        message: String,
    },

    /// Historical log query failed.
    #[error("Log query for {event} failed: {message}")]
    LogQueryFailed {
        /// Event name.
        event: String,
        /// Error details.
        message: String,
    },

    /// Block lookup returned nothing.
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// Returned value does not fit the domain type.
    #[error("Value overflow in {0}")]
    ValueOverflow(String),

    /// Returned payload could not be decoded.
    #[error("Decoding error: {0}")]
    DecodingError(String),
}

// =============================================================================
// Service Errors
// =============================================================================

/// Top-level service orchestration errors.
///
/// This is the error type returned by
/// [`crate::services::MarketplaceService::run`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The refresh trigger channel was closed by every sender.
    #[error("Trigger channel closed")]
    TriggersClosed,

    /// Graceful shutdown was requested.
    ///
    /// This is not really an error but uses the error type for control flow.
    #[error("Service shutdown requested")]
    ShutdownRequested,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
