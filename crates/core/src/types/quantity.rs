//! Cart and order line quantities.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative quantity.
    #[error("quantity must be at least 1")]
    NotPositive,
    /// Quantity above the per-line ceiling.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Maximum allowed quantity per line.
        max: u32,
    },
}

/// A strictly positive number of units on a cart or order line.
///
/// ```
/// use shopfront_core::Quantity;
///
/// assert_eq!(Quantity::try_from(3_i64).unwrap().get(), 3);
/// assert!(Quantity::try_from(0_i64).is_err());
/// assert!(Quantity::try_from(-2_i64).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    /// Largest quantity accepted on a single line.
    pub const MAX: u32 = 10_000;

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns an error for zero or for values above [`Quantity::MAX`].
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 {
            return Err(QuantityError::NotPositive);
        }
        if value > Self::MAX {
            return Err(QuantityError::TooLarge { max: Self::MAX });
        }
        Ok(Self(value))
    }

    /// The number of units.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// The number of units as the signed type the database stores.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // bounded by MAX
    pub const fn as_i32(&self) -> i32 {
        self.0 as i32
    }

    /// Add two quantities, or `None` if the sum is above [`Quantity::MAX`].
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) if sum <= Self::MAX => Some(Self(sum)),
            _ => None,
        }
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value <= 0 {
            return Err(QuantityError::NotPositive);
        }
        let value = u32::try_from(value).map_err(|_| QuantityError::TooLarge { max: Self::MAX })?;
        Self::new(value)
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}
