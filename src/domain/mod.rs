//! Domain types for threshold secret sharing
//!
//! This module contains validated newtypes and configuration for splitting a secret:
//! - [`Threshold`] - Minimum shares required for reconstruction (2..=255)
//! - [`ShareIndex`] - Polynomial evaluation point and 1-based share identity (1..=255)
//! - [`ShareCount`] - Total number of shares to create (2..=255)
//! - [`SplitConfig`] - Validated threshold and share count pair

mod config;
mod share_count;
mod share_index;
mod threshold;

pub use config::SplitConfig;
pub use share_count::ShareCount;
pub use share_index::ShareIndex;
pub use threshold::Threshold;
