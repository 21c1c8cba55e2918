//! Threshold newtype for secret sharing

use crate::error::{Error, Result};

/// Threshold for secret sharing (2..=255)
///
/// Invariant: threshold >= 2 (enforced at construction)
/// A threshold of 1 provides no security benefit since any single share can recover the entire secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Threshold(u8);

impl Threshold {
    /// Smallest meaningful threshold
    pub const MIN: u8 = 2;

    /// Creates a new threshold, returning an error if value < 2
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameters`] if the threshold is less than 2
    ///
    /// # Examples
    ///
    /// ```rust
    /// use safeshare::domain::Threshold;
    ///
    /// let threshold = Threshold::new(3).unwrap();
    /// assert_eq!(*threshold, 3);
    ///
    /// assert!(Threshold::new(1).is_err());
    /// assert!(Threshold::new(0).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value < Self::MIN {
            return Err(Error::InvalidParameters(format!(
                "Threshold must be at least 2 (got {value})"
            )));
        }
        Ok(Self(value))
    }

    /// Creates a threshold from an unbounded integer, rejecting values above 255
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameters`] if the value is outside 2..=255
    pub fn from_usize(value: usize) -> Result<Self> {
        let value = u8::try_from(value).map_err(|_| {
            Error::InvalidParameters(format!("Threshold {value} exceeds the field size (255)"))
        })?;
        Self::new(value)
    }
}

impl std::ops::Deref for Threshold {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
