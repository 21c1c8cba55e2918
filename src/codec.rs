//! Text encoding for secret shares
//!
//! A share is rendered as `<x>-<hex>`: the decimal evaluation point, a dash, and
//! the evaluated payload bytes as lowercase hex (two characters per byte).
//!
//! # Examples
//!
//! ```rust
//! use safeshare::codec::{decode, encode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let encoded = encode(3, &[0xDE, 0xAD, 0xBE, 0xEF]);
//! assert_eq!(encoded.as_str(), "3-deadbeef");
//!
//! let share = decode(encoded.as_str())?;
//! assert_eq!(share.x, 3);
//! assert_eq!(*share.payload, vec![0xDE, 0xAD, 0xBE, 0xEF]);
//! # Ok(())
//! # }
//! ```
//!
//! Decoding checks syntax only. Whether `x` is a usable field element is
//! decided by [`crate::shamir::combine`].

use zeroize::Zeroizing;

use crate::error::ParseError;

/// Separator between the share index and its hex payload
pub const SEPARATOR: char = '-';

/// A validated share string
///
/// Wraps the text in `Zeroizing` so share material is wiped on drop.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedShare(Zeroizing<String>);

impl EncodedShare {
    /// Gets the share as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EncodedShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &*self.0)
    }
}

/// One decoded share
#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    /// Evaluation point as written in the share text
    pub x: u32,
    /// Evaluated payload bytes
    pub payload: Zeroizing<Vec<u8>>,
}

/// Renders a share as `<x>-<hex(payload)>`
#[must_use]
pub fn encode(x: u8, payload: &[u8]) -> EncodedShare {
    EncodedShare(Zeroizing::new(format!(
        "{x}{SEPARATOR}{}",
        hex::encode(payload)
    )))
}

/// Parses a `<x>-<hex>` share string
///
/// Surrounding whitespace is ignored.
///
/// # Errors
/// Returns [`ParseError::MalformedShare`] if the separator is missing, the index
/// is not a base-10 integer, or the payload is not valid even-length hex
pub fn decode(text: &str) -> Result<Share, ParseError> {
    let text = text.trim();
    let (index, payload_hex) = text
        .split_once(SEPARATOR)
        .ok_or_else(|| ParseError::MalformedShare("missing '-' separator".to_string()))?;

    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::MalformedShare(format!(
            "share index '{index}' is not a decimal number"
        )));
    }
    let x: u32 = index
        .parse()
        .map_err(|_| ParseError::MalformedShare(format!("share index '{index}' is too large")))?;

    if payload_hex.len() % 2 != 0 {
        return Err(ParseError::MalformedShare(format!(
            "payload has odd hex length {}",
            payload_hex.len()
        )));
    }
    let payload = hex::decode(payload_hex)
        .map_err(|e| ParseError::MalformedShare(format!("invalid hex payload: {e}")))?;

    Ok(Share {
        x,
        payload: Zeroizing::new(payload),
    })
}
