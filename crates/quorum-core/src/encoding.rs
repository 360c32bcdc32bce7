//! Serde helpers for fixed-size byte arrays encoded as lowercase hex.
//!
//! Registry files and bundles are exchanged as JSON/TOML, where raw byte
//! arrays would otherwise serialize as integer lists.

use thiserror::Error;

/// Errors decoding hex text into a fixed-size array.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HexError {
    /// The text is not hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The text decodes to the wrong number of bytes.
    #[error("expected {expected} bytes, got {found}")]
    WrongLength {
        /// Required length.
        expected: usize,
        /// Decoded length.
        found: usize,
    },
}

/// Decode a hex string (optional `0x` prefix) into a fixed-size array.
///
/// # Errors
///
/// - [`HexError::InvalidHex`] if the input is not valid hex.
/// - [`HexError::WrongLength`] if it does not decode to `N` bytes.
pub fn decode_fixed<const N: usize>(text: &str) -> Result<[u8; N], HexError> {
    let trimmed = text.strip_prefix("0x").unwrap_or(text);
    let bytes = hex::decode(trimmed)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| HexError::WrongLength {
        expected: N,
        found: bytes.len(),
    })
}

/// `#[serde(with = "...")]` adapter for `[u8; 32]`.
pub mod hex32 {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::decode_fixed;

    /// Serialize as lowercase hex.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Deserialize from hex (optional `0x` prefix).
    ///
    /// # Errors
    ///
    /// Fails on malformed hex or a length other than 32 bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let text = String::deserialize(deserializer)?;
        decode_fixed::<32>(&text).map_err(D::Error::custom)
    }
}

/// `#[serde(with = "...")]` adapter for `[u8; 64]`.
pub mod hex64 {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::decode_fixed;

    /// Serialize as lowercase hex.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Deserialize from hex (optional `0x` prefix).
    ///
    /// # Errors
    ///
    /// Fails on malformed hex or a length other than 64 bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 64], D::Error> {
        let text = String::deserialize(deserializer)?;
        decode_fixed::<64>(&text).map_err(D::Error::custom)
    }
}
