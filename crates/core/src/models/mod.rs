//! Domain models representing marketplace state read from the ledger.
//!
//! These models are transport-agnostic: adapters convert their wire
//! representation into these types before handing them to the services.

use serde::{Deserialize, Serialize};

mod activity;
mod amount;
mod market;
mod network;
mod nft;
mod snapshot;

pub use activity::*;
pub use amount::*;
pub use market::*;
pub use network::*;
pub use nft::*;
pub use snapshot::*;

/// Numeric chain identifier (EIP-155).
pub type ChainId = u64;

// =============================================================================
// Fixed-size byte newtypes
// =============================================================================

/// Macro to generate fixed-size byte newtypes with common functionality.
///
/// Generates:
/// - `from_hex()` - Parse from hex string (with or without 0x prefix, any case)
/// - `to_hex()` - Convert to 0x-prefixed lowercase hex string
/// - `Display` trait implementation
/// - `From<[u8; N]>` implementation
/// - serde as a hex string
macro_rules! fixed_bytes_newtype {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Parse from hex string (with or without 0x prefix).
            ///
            /// Letter case is irrelevant: `0xABCD...` and `0xabcd...` parse
            /// to the same value.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let s = s.trim();
                let s = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                let bytes = hex::decode(s)?;
                let arr: [u8; $len] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }

            /// Convert to 0x-prefixed hex string.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// Get the inner bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = hex::FromHexError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::from_hex(&s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_hex()
            }
        }
    };
}

fixed_bytes_newtype!(
    /// 20-byte account or contract address.
    ///
    /// Equality is byte equality, so comparisons are insensitive to the
    /// letter case the address arrived in.
    Address,
    20
);

fixed_bytes_newtype!(
    /// 32-byte transaction hash.
    TxHash,
    32
);

fixed_bytes_newtype!(
    /// 32-byte block hash.
    BlockHash,
    32
);

impl Address {
    /// The zero address, used by contracts as "nobody".
    pub const ZERO: Address = Address([0u8; 20]);

    /// Whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Short form for log lines: `0x1234…abcd`.
    pub fn short(&self) -> String {
        let hex = hex::encode(self.0);
        format!("0x{}…{}", &hex[..4], &hex[hex.len() - 4..])
    }
}

// =============================================================================
// Time helpers
// =============================================================================

/// Convert a ledger timestamp in seconds into a UTC datetime.
///
/// Values outside chrono's range collapse to the Unix epoch.
pub fn datetime_from_secs(secs: u64) -> chrono::DateTime<chrono::Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================
