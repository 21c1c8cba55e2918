//! `ShareIndex` newtype for secret sharing

use crate::error::{Error, Result};

/// Share index (1..=255)
///
/// The x-coordinate at which a share's polynomials are evaluated, and the
/// share's 1-based identity. Zero is excluded because evaluating at x=0 would
/// reveal the secret itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShareIndex(u8);

impl ShareIndex {
    /// Minimum valid share index
    pub const MIN: u8 = 1;

    /// Creates a new share index
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameters`] if index is 0
    ///
    /// # Examples
    ///
    /// ```rust
    /// use safeshare::domain::ShareIndex;
    ///
    /// let index = ShareIndex::new(1).unwrap();
    /// assert_eq!(*index, 1);
    ///
    /// let max_index = ShareIndex::new(255).unwrap();
    /// assert_eq!(*max_index, 255);
    ///
    /// // Invalid: 0 is the secret's own evaluation point
    /// assert!(ShareIndex::new(0).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value < Self::MIN {
            return Err(Error::InvalidParameters(
                "Share index 0 is reserved for the secret".to_string(),
            ));
        }
        Ok(Self(value))
    }
}

impl TryFrom<u32> for ShareIndex {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        let value = u8::try_from(value).map_err(|_| {
            Error::InvalidParameters(format!("Share index {value} is outside GF(256)"))
        })?;
        Self::new(value)
    }
}

impl std::ops::Deref for ShareIndex {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
