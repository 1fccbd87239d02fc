//! Safe-prime generation (`spec.md` §4.1, §2 component 2).
//!
//! A safe prime is a prime `p` such that `(p-1)/2` is also prime. Damgard-Jurik
//! keygen needs a pair of distinct safe primes. Primality here is always
//! tested with our own Miller-Rabin (not delegated to an external primality
//! oracle) because the round count and candidate strategy are part of the
//! core's security argument, not incidental plumbing.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};

use crate::rng::default_rng;

/// Controls the Miller-Rabin confidence level used by prime generation.
///
/// `spec.md` §4.1 calls for "enough rounds for cryptographic confidence
/// (>= 40 rounds for 2048-bit)"; `rounds: 40` is the crate-wide default.
/// Tests that use intentionally tiny bit sizes for speed may lower this, but
/// production code paths always use [`MillerRabinConfig::default`].
#[derive(Clone, Copy, Debug)]
pub struct MillerRabinConfig {
    pub rounds: u32,
}

impl Default for MillerRabinConfig {
    fn default() -> Self {
        MillerRabinConfig { rounds: 40 }
    }
}

/// Small primes used to cheaply sieve out obviously-composite candidates
/// before paying for a full Miller-Rabin pass.
const SMALL_PRIMES: &[u32] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Probabilistic Miller-Rabin primality test with `config.rounds` witnesses.
pub fn is_probable_prime<R: RngCore + CryptoRng>(
    n: &BigUint,
    config: MillerRabinConfig,
    rng: &mut R,
) -> bool {
    let two = BigUint::from(2u32);
    let three = BigUint::from(3u32);

    if *n < two {
        return false;
    }
    if *n == two || *n == three {
        return true;
    }
    if n.is_even() {
        return false;
    }

    for &p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if *n == p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    // Write n - 1 = 2^r * d with d odd.
    let n_minus_one = n - BigUint::one();
    let mut d = n_minus_one.clone();
    let mut r = 0u32;
    while d.is_even() {
        d >>= 1;
        r += 1;
    }

    'witness: for _ in 0..config.rounds {
        let a = random_in_range(&two, &(n - &two), rng);
        let mut x = a.modpow(&d, n);

        if x == BigUint::one() || x == n_minus_one {
            continue;
        }

        for _ in 0..r.saturating_sub(1) {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }

        return false;
    }

    true
}

/// Draws a uniform random value in `[low, high]` inclusive.
fn random_in_range<R: RngCore + CryptoRng>(low: &BigUint, high: &BigUint, rng: &mut R) -> BigUint {
    let span = high - low + BigUint::one();
    let bits = span.bits();
    loop {
        let candidate = random_biguint_bits(bits as u64, rng);
        if candidate < span {
            return low + candidate;
        }
    }
}

fn random_biguint_bits<R: RngCore + CryptoRng>(bits: u64, rng: &mut R) -> BigUint {
    let n_bytes = ((bits + 7) / 8) as usize;
    let mut buf = vec![0u8; n_bytes.max(1)];
    rng.fill_bytes(&mut buf);
    // Mask off any excess high bits so the result stays within `bits` bits.
    let excess_bits = (n_bytes as u64 * 8).saturating_sub(bits);
    if excess_bits > 0 && !buf.is_empty() {
        buf[0] &= 0xFFu8 >> excess_bits;
    }
    BigUint::from_bytes_be(&buf)
}

/// Draws a random odd candidate with the top bit set (so it has exactly
/// `bits` bits) and repeatedly redraws until Miller-Rabin accepts it.
pub fn gen_prime_with_rng<R: RngCore + CryptoRng>(
    bits: u32,
    config: MillerRabinConfig,
    rng: &mut R,
) -> BigUint {
    assert!(bits >= 2, "gen_prime: bits must be >= 2");
    loop {
        let mut candidate = random_biguint_bits(bits as u64, rng);
        candidate.set_bit((bits - 1) as u64, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate, config, rng) {
            return candidate;
        }
    }
}

/// Generates a `bits`-bit prime using the system CSPRNG.
pub fn gen_prime(bits: u32, config: MillerRabinConfig) -> BigUint {
    gen_prime_with_rng(bits, config, &mut default_rng())
}

/// Generates a `bits`-bit safe prime `p = 2q + 1` where `q` is also prime.
pub fn gen_safe_prime_with_rng<R: RngCore + CryptoRng>(
    bits: u32,
    config: MillerRabinConfig,
    rng: &mut R,
) -> BigUint {
    assert!(bits >= 3, "gen_safe_prime: bits must be >= 3");
    loop {
        let q = gen_prime_with_rng(bits - 1, config, rng);
        let p = &q * BigUint::from(2u32) + BigUint::one();
        if p.bits() as u32 == bits && is_probable_prime(&p, config, rng) {
            return p;
        }
    }
}

/// Generates a `bits`-bit safe prime using the system CSPRNG.
pub fn gen_safe_prime(bits: u32, config: MillerRabinConfig) -> BigUint {
    gen_safe_prime_with_rng(bits, config, &mut default_rng())
}

/// Generates a pair of two *distinct* `bits`-bit safe primes.
pub fn gen_safe_prime_pair_with_rng<R: RngCore + CryptoRng>(
    bits: u32,
    config: MillerRabinConfig,
    rng: &mut R,
) -> (BigUint, BigUint) {
    let p = gen_safe_prime_with_rng(bits, config, rng);
    let mut q = gen_safe_prime_with_rng(bits, config, rng);
    while p == q {
        q = gen_safe_prime_with_rng(bits, config, rng);
    }
    (p, q)
}

/// Generates a pair of two distinct `bits`-bit safe primes using the system
/// CSPRNG.
pub fn gen_safe_prime_pair(bits: u32, config: MillerRabinConfig) -> (BigUint, BigUint) {
    gen_safe_prime_pair_with_rng(bits, config, &mut default_rng())
}
