use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Errors that can occur during amount arithmetic
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount overflow: {0} + {1}")]
    Overflow(Uint128, Uint128),

    #[error("Amount underflow: {0} - {1}")]
    Underflow(Uint128, Uint128),

    #[error("Invalid amount encoding: {0}")]
    InvalidEncoding(String),
}

/// Unsigned 128-bit balance value
///
/// Ordering and equality cover the full 128-bit range. Arithmetic is checked:
/// callers get an error instead of a wrapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Uint128(u128);

impl Uint128 {
    pub const ZERO: Uint128 = Uint128(0);
    pub const MAX: Uint128 = Uint128(u128::MAX);

    /// Builds an amount from its high and low 64-bit words
    ///
    /// # Arguments
    ///
    /// * `high` - The most significant 64 bits
    /// * `low` - The least significant 64 bits
    pub fn from_ints(high: u64, low: u64) -> Self {
        Uint128(((high as u128) << 64) | low as u128)
    }

    /// The high and low 64-bit words
    pub fn to_ints(self) -> (u64, u64) {
        ((self.0 >> 64) as u64, self.0 as u64)
    }

    pub fn checked_add(self, other: Uint128) -> Result<Uint128, AmountError> {
        self.0
            .checked_add(other.0)
            .map(Uint128)
            .ok_or(AmountError::Overflow(self, other))
    }

    pub fn checked_sub(self, other: Uint128) -> Result<Uint128, AmountError> {
        self.0
            .checked_sub(other.0)
            .map(Uint128)
            .ok_or(AmountError::Underflow(self, other))
    }

    /// Big-endian byte encoding, as used in hash preimages
    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Uint128(u128::from_be_bytes(bytes))
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<u128> for Uint128 {
    fn from(value: u128) -> Self {
        Uint128(value)
    }
}

impl From<Uint128> for u128 {
    fn from(value: Uint128) -> Self {
        value.0
    }
}

/// Renders as 32 lowercase hex digits
impl fmt::Display for Uint128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for Uint128 {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u128::from_str_radix(s, 16)
            .map(Uint128)
            .map_err(|e| AmountError::InvalidEncoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ints() {
        assert_eq!(Uint128::from_ints(0, 1), Uint128::from(1));
        assert_eq!(Uint128::from_ints(1, 0), Uint128::from(1u128 << 64));
        assert_eq!(Uint128::from_ints(u64::MAX, u64::MAX), Uint128::MAX);
        assert_eq!(Uint128::from_ints(7, 9).to_ints(), (7, 9));
    }

    #[test]
    fn test_ordering_uses_high_word() {
        // Low word alone would order these the other way round
        let small = Uint128::from_ints(0, u64::MAX);
        let large = Uint128::from_ints(1, 0);

        assert!(small < large);
        assert_ne!(small, large);
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Uint128::from_ints(1, 1);
        let b = Uint128::from_ints(0, 2);

        assert_eq!(a.checked_sub(b).unwrap(), Uint128::from_ints(0, u64::MAX));
        assert_eq!(a.checked_sub(b).unwrap().checked_add(b).unwrap(), a);
        assert_eq!(b.checked_sub(a), Err(AmountError::Underflow(b, a)));
        assert!(Uint128::MAX.checked_add(Uint128::from(1)).is_err());
    }

    #[test]
    fn test_hex_display() {
        assert_eq!(Uint128::MAX.to_string(), "ffffffffffffffffffffffffffffffff");
        assert_eq!(Uint128::from(255).to_string(), "000000000000000000000000000000ff");
        assert_eq!("ff".parse::<Uint128>().unwrap(), Uint128::from(255));
    }

    #[test]
    fn test_bytes() {
        let value = Uint128::from_ints(0x0102, 0x0304);
        let bytes = value.to_bytes();

        assert_eq!(bytes[6..8], [0x01, 0x02]);
        assert_eq!(bytes[14..16], [0x03, 0x04]);
        assert_eq!(Uint128::from_bytes(bytes), value);
    }
}
