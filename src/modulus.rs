use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::util;

/// Represent an integer modulus of up to 61 bits.
///
/// The coefficient modulus of the scheme is a single NTT-friendly prime held
/// in a Modulus. Products are reduced through 128-bit intermediates, so no
/// Barrett constants need to be carried around.
///
/// - See [EncryptionParameters](crate::EncryptionParameters) for a description of the encryption parameters.
#[derive(Debug, Eq, Clone, Copy, Default)]
pub struct Modulus {
    value: u64,
    bit_count: usize,
    is_prime: bool,
}

impl Ord for Modulus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl PartialOrd for Modulus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Modulus {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Modulus {

    /// Create a new Modulus instance with the given value.
    /// Values wider than 61 bits are rejected by [EncryptionParameters](crate::EncryptionParameters) validation.
    pub fn new(value: u64) -> Self {
        Modulus {
            value,
            bit_count: util::get_significant_bit_count(value),
            is_prime: util::is_prime(value),
        }
    }

    /// The [u64] value.
    #[inline]
    pub fn value(&self) -> u64 {self.value}
    /// Is the value a prime number?
    pub fn is_prime(&self) -> bool {self.is_prime}
    /// Is the value zero?
    pub fn is_zero(&self) -> bool {self.value == 0}
    /// Number of significant bits.
    pub fn bit_count(&self) -> usize {self.bit_count}

    /// Reduce a [u64] modulo this modulus.
    #[inline]
    pub fn reduce(&self, value: u64) -> u64 {
        value % self.value
    }

    /// Reduce a [u128] modulo this modulus.
    #[inline]
    pub fn reduce_u128(&self, value: u128) -> u64 {
        (value % self.value as u128) as u64
    }

    #[inline]
    pub(crate) fn add(&self, a: u64, b: u64) -> u64 {
        let sum = a + b;
        if sum >= self.value {sum - self.value} else {sum}
    }

    #[inline]
    pub(crate) fn sub(&self, a: u64, b: u64) -> u64 {
        if a >= b {a - b} else {a + self.value - b}
    }

    #[inline]
    pub(crate) fn negate(&self, a: u64) -> u64 {
        if a == 0 {0} else {self.value - a}
    }

    #[inline]
    pub(crate) fn mul(&self, a: u64, b: u64) -> u64 {
        self.reduce_u128(a as u128 * b as u128)
    }

    /// Map a signed integer into [0, q).
    #[inline]
    pub(crate) fn from_i64(&self, x: i64) -> u64 {
        if x >= 0 {
            self.reduce(x as u64)
        } else {
            self.negate(self.reduce(x.unsigned_abs()))
        }
    }

    pub(crate) fn pow(&self, operand: u64, mut exponent: u64) -> u64 {
        let mut power = operand;
        let mut result = 1;
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = self.mul(result, power);
            }
            power = self.mul(power, power);
            exponent >>= 1;
        }
        result
    }

    pub(crate) fn invert(&self, operand: u64) -> Option<u64> {
        util::try_invert_u64_mod_u64(operand, self.value)
    }

}

impl std::fmt::Display for Modulus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Serialize for Modulus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer
    {
        serializer.serialize_u64(self.value)
    }
}

impl<'de> Deserialize<'de> for Modulus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: Deserializer<'de>
    {
        let value = u64::deserialize(deserializer)?;
        Ok(Modulus::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_modulus() {
        let m = Modulus::new(0);
        assert!(m.is_zero());
        assert!(!m.is_prime());

        let m = Modulus::new(0xffffffffffc0001);
        assert_eq!(60, m.bit_count());
        assert!(m.is_prime());

        let m = Modulus::new(1024);
        assert_eq!(11, m.bit_count());
        assert!(!m.is_prime());
    }

    #[test]
    fn test_compare_modulus() {
        assert_eq!(Modulus::new(7), Modulus::new(7));
        assert!(Modulus::new(5) < Modulus::new(7));
    }

    #[test]
    fn test_modular_arithmetic() {
        let m = Modulus::new(17);
        assert_eq!(3, m.add(10, 10));
        assert_eq!(14, m.sub(3, 6));
        assert_eq!(0, m.negate(0));
        assert_eq!(12, m.negate(5));
        assert_eq!(12, m.mul(7, 9));
        assert_eq!(15, m.from_i64(-2));
        assert_eq!(2, m.from_i64(19));
        assert_eq!(1, m.pow(3, 16));
        assert_eq!(Some(6), m.invert(3));
        assert_eq!(None, m.invert(0));
    }

    #[test]
    fn test_serde_modulus() {
        let m = Modulus::new(0xffffffffffc0001);
        let bytes = bincode::serialize(&m).unwrap();
        let back: Modulus = bincode::deserialize(&bytes).unwrap();
        assert_eq!(m, back);
        assert!(back.is_prime());
    }
}
