//! Shamir secret sharing over `Z_modulus` (`spec.md` §4.2).
//!
//! Used both as a public primitive and internally by [`crate::dj::keygen`] to
//! split the Damgard-Jurik decryption exponent `d` across trustees.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};

use crate::error::{Error, Result};
use crate::math::inv_mod;
use crate::rng::default_rng;

/// A single Shamir share: the point `(i, f(i))` on the sharing polynomial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Share {
    pub i: BigUint,
    pub value: BigUint,
}

/// A polynomial `f(x) = coeffs[0] + coeffs[1]*x + ... (mod modulus)`.
struct Polynomial {
    coeffs: Vec<BigUint>,
    modulus: BigUint,
}

impl Polynomial {
    fn eval(&self, x: &BigUint) -> BigUint {
        let mut result = BigUint::zero();
        let mut x_pow = BigUint::one();
        for coeff in &self.coeffs {
            result = (result + coeff * &x_pow) % &self.modulus;
            x_pow = (&x_pow * x) % &self.modulus;
        }
        result
    }
}

/// Splits `secret` into `n_shares` Shamir shares requiring `threshold` of
/// them to reconstruct, all arithmetic modulo `modulus`.
///
/// Draws `f(x) = secret + sum_{k=1}^{threshold-1} a_k x^k (mod modulus)` with
/// each `a_k` uniform in `[0, modulus)`, then returns `(i, f(i))` for
/// `i = 1..=n_shares`.
pub fn share_secret(
    secret: &BigUint,
    modulus: &BigUint,
    threshold: u32,
    n_shares: u32,
) -> Result<Vec<Share>> {
    share_secret_with_rng(secret, modulus, threshold, n_shares, &mut default_rng())
}

/// As [`share_secret`], but drawing coefficients from a caller-supplied CSPRNG.
pub fn share_secret_with_rng<R: RngCore + CryptoRng>(
    secret: &BigUint,
    modulus: &BigUint,
    threshold: u32,
    n_shares: u32,
    rng: &mut R,
) -> Result<Vec<Share>> {
    if secret >= modulus {
        return Err(Error::SecretOutOfRange);
    }
    if threshold < 1 || n_shares < threshold {
        return Err(Error::InvalidThreshold {
            threshold,
            n_shares,
        });
    }

    let mut coeffs = Vec::with_capacity(threshold as usize);
    coeffs.push(secret.clone());
    for _ in 1..threshold {
        coeffs.push(random_below(modulus, rng));
    }

    let polynomial = Polynomial {
        coeffs,
        modulus: modulus.clone(),
    };

    let shares = (1..=n_shares)
        .map(|i| {
            let x = BigUint::from(i);
            let value = polynomial.eval(&x);
            Share { i: x, value }
        })
        .collect();

    Ok(shares)
}

/// Reconstructs the secret from `shares` via Lagrange interpolation at `x=0`.
///
/// Assumes the shares have pairwise-distinct `i` and that there are at least
/// `threshold` of them; with fewer than `threshold` unique shares the result
/// is an arbitrary value uncorrelated with the true secret (the scheme's
/// information-theoretic guarantee), not an error.
pub fn reconstruct(shares: &[Share], modulus: &BigUint) -> Result<BigUint> {
    if shares.is_empty() {
        return Err(Error::EmptyInput("share"));
    }

    let mut secret = BigUint::zero();
    for (i, share_i) in shares.iter().enumerate() {
        let mut numerator = BigUint::one();
        let mut denominator = BigUint::one();

        for (j, share_j) in shares.iter().enumerate() {
            if i == j {
                continue;
            }
            numerator = (numerator * &share_j.i) % modulus;
            let diff = modulus + &share_j.i - &share_i.i;
            denominator = (denominator * (diff % modulus)) % modulus;
        }

        let denom_inv = inv_mod(&denominator, modulus)?;
        let lagrange_term = (numerator * denom_inv) % modulus;
        secret = (secret + &share_i.value * lagrange_term) % modulus;
    }

    Ok(secret)
}

fn random_below<R: RngCore + CryptoRng>(bound: &BigUint, rng: &mut R) -> BigUint {
    use num_integer::Integer;
    let bits = bound.bits();
    loop {
        let n_bytes = ((bits + 7) / 8) as usize;
        let mut buf = vec![0u8; n_bytes.max(1)];
        rng.fill_bytes(&mut buf);
        let excess_bits = (n_bytes as u64 * 8).saturating_sub(bits);
        if excess_bits > 0 && !buf.is_empty() {
            buf[0] &= 0xFFu8 >> excess_bits;
        }
        let candidate = BigUint::from_bytes_be(&buf);
        if &candidate < bound {
            return candidate;
        }
        let _ = candidate.is_even();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_rng;

    #[test]
    fn reconstructs_exactly_from_threshold_shares() {
        let modulus = BigUint::from(104729u32); // prime
        let secret = BigUint::from(42u32);
        let mut rng = seeded_rng(7);
        let shares =
            share_secret_with_rng(&secret, &modulus, 3, 6, &mut rng).unwrap();

        let chosen = &shares[0..3];
        let recovered = reconstruct(chosen, &modulus).unwrap();
        assert_eq!(recovered, secret);

        let other_chosen = &shares[2..5];
        let recovered_other = reconstruct(other_chosen, &modulus).unwrap();
        assert_eq!(recovered_other, secret);
    }

    #[test]
    fn rejects_invalid_threshold() {
        let modulus = BigUint::from(101u32);
        let secret = BigUint::from(3u32);
        assert!(matches!(
            share_secret(&secret, &modulus, 5, 3),
            Err(Error::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_secret() {
        let modulus = BigUint::from(10u32);
        let secret = BigUint::from(50u32);
        assert!(matches!(
            share_secret(&secret, &modulus, 2, 3),
            Err(Error::SecretOutOfRange)
        ));
    }
}
