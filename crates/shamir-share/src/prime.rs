//! prime catalog for the prime-field strategy
//!
//! Each prime is one bit wider than the largest secret it supports, so every
//! secret of up to `max_bits` bits is a canonical residue.

use crate::{Result, ShareError};

/// A catalog prime, big-endian encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prime {
    max_bits: u16,
    data: &'static [u8],
}

impl Prime {
    /// Largest secret, in bits, this prime supports.
    pub const fn max_bits(&self) -> u16 {
        self.max_bits
    }

    /// Big-endian encoding of the prime.
    pub const fn data(&self) -> &'static [u8] {
        self.data
    }

    /// Length of the encoding in bytes. Shares encode x and y at this width.
    pub const fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// 2^129 - 25
const PRIME_128: [u8; 17] = [
    0x01, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xe7,
];

/// 2^193 - 31
const PRIME_192: [u8; 25] = [
    0x01, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xe1,
];

/// 2^257 - 93
const PRIME_256: [u8; 33] = [
    0x01, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xa3,
];

/// Supported primes in ascending capacity order.
pub static PRIMES: [Prime; 3] = [
    Prime { max_bits: 128, data: &PRIME_128 },
    Prime { max_bits: 192, data: &PRIME_192 },
    Prime { max_bits: 256, data: &PRIME_256 },
];

/// Smallest catalog prime supporting a secret of `bits` bits.
pub fn get_prime(bits: u16) -> Result<&'static Prime> {
    PRIMES
        .iter()
        .find(|p| bits <= p.max_bits)
        .ok_or(ShareError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use num_traits::One;

    #[test]
    fn test_smallest_prime_selected() {
        assert_eq!(get_prime(1).unwrap().max_bits(), 128);
        assert_eq!(get_prime(128).unwrap().max_bits(), 128);
        assert_eq!(get_prime(129).unwrap().max_bits(), 192);
        assert_eq!(get_prime(192).unwrap().max_bits(), 192);
        assert_eq!(get_prime(200).unwrap().max_bits(), 256);
        assert_eq!(get_prime(256).unwrap().max_bits(), 256);
    }

    #[test]
    fn test_too_long_secret() {
        assert_eq!(get_prime(257), Err(ShareError::NotFound));
        assert_eq!(get_prime(u16::MAX), Err(ShareError::NotFound));
    }

    #[test]
    fn test_byte_lengths() {
        assert_eq!(get_prime(128).unwrap().byte_len(), 17);
        assert_eq!(get_prime(192).unwrap().byte_len(), 25);
        assert_eq!(get_prime(256).unwrap().byte_len(), 33);
    }

    #[test]
    fn test_prime_wider_than_capacity() {
        for prime in PRIMES.iter() {
            let p = BigUint::from_bytes_be(prime.data());
            assert_eq!(p.bits(), u64::from(prime.max_bits()) + 1);
        }
    }

    #[test]
    fn test_fermat_witnesses() {
        // a^(p-1) = 1 mod p for a handful of bases
        for prime in PRIMES.iter() {
            let p = BigUint::from_bytes_be(prime.data());
            let e = &p - BigUint::one();
            for a in [2u32, 3, 5, 7, 11, 13] {
                assert!(BigUint::from(a).modpow(&e, &p).is_one(), "base {a}");
            }
        }
    }
}
