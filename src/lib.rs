//! Threshold secret sharing over GF(256) with an embedded integrity check,
//! a QR-sized chunk protocol for moving shares between devices, and
//! encrypted file vaults that can be sharded or protected by key files.

pub mod chunk;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
#[cfg(feature = "cli")]
pub mod commands;
pub mod domain;
pub mod error;
pub mod field;
pub mod shamir;
pub mod vault;
pub mod wasm;

pub use error::{Error, IntegrityError, ParseError, Result};
