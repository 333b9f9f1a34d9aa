use serde::{Deserialize, Serialize};

use depot_core::{DomainError, ValueObject};

/// Upper bound for any single quantity or balance. Keeps signed deltas and
/// discrepancies representable as `i64`.
pub const MAX_QUANTITY: u64 = i64::MAX as u64;

/// A strictly positive quantity of stock units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Quantity(u64);

impl Quantity {
    pub fn new(value: u64) -> Result<Self, DomainError> {
        if value == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        if value > MAX_QUANTITY {
            return Err(DomainError::validation("quantity is too large"));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// Lossless: `MAX_QUANTITY` fits in `i64`.
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }
}

impl ValueObject for Quantity {}

impl TryFrom<u64> for Quantity {
    type Error = DomainError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Quantity::new(value)
    }
}

impl From<Quantity> for u64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert!(matches!(Quantity::new(0), Err(DomainError::Validation(_))));
    }

    #[test]
    fn above_max_is_rejected() {
        assert!(Quantity::new(MAX_QUANTITY + 1).is_err());
        assert_eq!(Quantity::new(MAX_QUANTITY).unwrap().as_i64(), i64::MAX);
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("7").unwrap().get(), 7);
    }
}
