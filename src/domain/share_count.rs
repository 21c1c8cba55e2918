//! `ShareCount` newtype for secret sharing

use crate::error::{Error, Result};

/// Number of shares to create (2..=255)
///
/// Share identities are the non-zero elements of GF(256), so at most 255
/// distinct shares exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShareCount(u8);

impl ShareCount {
    /// Minimum valid share count
    pub const MIN: u8 = 2;

    /// Maximum valid share count
    pub const MAX: u8 = 255;

    /// Creates a new share count
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameters`] if count is below 2
    ///
    /// # Examples
    ///
    /// ```rust
    /// use safeshare::domain::ShareCount;
    ///
    /// let count = ShareCount::new(5).unwrap();
    /// assert_eq!(*count, 5);
    ///
    /// let max_count = ShareCount::new(ShareCount::MAX).unwrap();
    /// assert_eq!(*max_count, 255);
    ///
    /// assert!(ShareCount::new(0).is_err());
    /// assert!(ShareCount::new(1).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value < Self::MIN {
            return Err(Error::InvalidParameters(format!(
                "Share count must be at least 2 (got {value})"
            )));
        }
        Ok(Self(value))
    }

    /// Creates a share count from an unbounded integer
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameters`] if the value is outside 2..=255
    pub fn from_usize(value: usize) -> Result<Self> {
        let value = u8::try_from(value).map_err(|_| {
            Error::InvalidParameters(format!(
                "Share count {value} exceeds the maximum of 255 shares"
            ))
        })?;
        Self::new(value)
    }

    /// Iterates over the share indices `1..=count`
    pub fn indices(self) -> impl Iterator<Item = super::ShareIndex> {
        (1..=self.0).filter_map(|x| super::ShareIndex::new(x).ok())
    }
}

impl std::ops::Deref for ShareCount {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
