//! Threshold decryption: [`PrivateKeyShare`], [`PrivateKeyRing`], and the
//! Damgard-Jurik reduction algorithm (`spec.md` §4.3, §4.4).

use std::collections::BTreeMap;
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};

use crate::error::{Error, Result};
use crate::math::{factorial, inv_mod};

use super::public_key::{EncryptedNumber, PublicKey};

/// One trustee's share of the decryption exponent `d`, plus the
/// precomputed `two_delta_s_i = 2 * delta * s_i` used on every partial
/// decryption.
#[derive(Clone, Debug, PartialEq)]
pub struct PrivateKeyShare {
    pub public_key: Arc<PublicKey>,
    pub i: BigUint,
    pub s_i: BigUint,
    two_delta_s_i: BigUint,
}

impl PrivateKeyShare {
    pub fn new(public_key: Arc<PublicKey>, i: BigUint, s_i: BigUint) -> Self {
        let two_delta_s_i = BigUint::from(2u32) * &public_key.delta * &s_i;
        PrivateKeyShare {
            public_key,
            i,
            s_i,
            two_delta_s_i,
        }
    }

    /// This trustee's partial decryption of `c`: `c.value^(2*delta*s_i) mod n^(s+1)`.
    pub fn partial_decrypt(&self, c: &EncryptedNumber) -> Result<BigUint> {
        if self.public_key != c.public_key {
            return Err(Error::KeyMismatch);
        }
        Ok(c.value().modpow(&self.two_delta_s_i, &self.public_key.n_s_1))
    }
}

/// A set of [`PrivateKeyShare`]s able to jointly decrypt [`EncryptedNumber`]s
/// under their shared [`PublicKey`].
///
/// Both constructors deduplicate shares by their index `i`, chosen
/// deterministically by ascending `i` (the original protocol draws from a
/// `set`, whose iteration order is incidental; ascending `i` reproduces the
/// same result every run). [`PrivateKeyRing::new`] additionally truncates
/// down to exactly `public_key.threshold` shares, for a ring built from an
/// arbitrary set of shares submitted for decryption;
/// [`PrivateKeyRing::from_all_shares`] keeps every share, for `keygen`'s
/// return value.
#[derive(Clone, Debug)]
pub struct PrivateKeyRing {
    pub public_key: Arc<PublicKey>,
    private_key_shares: Vec<PrivateKeyShare>,
    i_list: Vec<BigUint>,
    inv_four_delta_squared: BigUint,
}

impl PrivateKeyRing {
    /// Validates and deduplicates `private_key_shares` by index `i`, without
    /// deciding how many of them the resulting ring should keep.
    fn dedup_shares(
        private_key_shares: Vec<PrivateKeyShare>,
    ) -> Result<(Arc<PublicKey>, BTreeMap<BigUint, PrivateKeyShare>)> {
        if private_key_shares.is_empty() {
            return Err(Error::EmptyInput("private key share"));
        }

        let public_key = Arc::clone(&private_key_shares[0].public_key);
        if private_key_shares
            .iter()
            .any(|pks| pks.public_key != public_key)
        {
            return Err(Error::KeyMismatch);
        }

        let mut by_index: BTreeMap<BigUint, PrivateKeyShare> = BTreeMap::new();
        for share in private_key_shares {
            by_index.entry(share.i.clone()).or_insert(share);
        }

        if (by_index.len() as u32) < public_key.threshold {
            return Err(Error::InsufficientShares {
                required: public_key.threshold,
                available: by_index.len() as u32,
            });
        }

        Ok((public_key, by_index))
    }

    fn finish(public_key: Arc<PublicKey>, chosen: Vec<PrivateKeyShare>) -> Result<Self> {
        let i_list: Vec<BigUint> = chosen.iter().map(|s| s.i.clone()).collect();

        let four_delta_squared =
            BigUint::from(4u32) * &public_key.delta * &public_key.delta;
        let inv_four_delta_squared = inv_mod(&four_delta_squared, &public_key.n_s)?;

        Ok(PrivateKeyRing {
            public_key,
            private_key_shares: chosen,
            i_list,
            inv_four_delta_squared,
        })
    }

    /// Builds a ring from an arbitrary set of shares submitted for
    /// decryption: deduplicates by index `i` and keeps exactly
    /// `public_key.threshold` of them, chosen deterministically by ascending
    /// `i` (the original protocol draws from a `set`, whose iteration order
    /// is incidental; ascending `i` reproduces the same result every run).
    pub fn new(private_key_shares: Vec<PrivateKeyShare>) -> Result<Self> {
        let (public_key, by_index) = Self::dedup_shares(private_key_shares)?;
        let threshold = public_key.threshold as usize;
        let chosen: Vec<PrivateKeyShare> = by_index.into_values().take(threshold).collect();
        Self::finish(public_key, chosen)
    }

    /// Builds a ring holding every one of `private_key_shares`, without
    /// truncating to `public_key.threshold`. `keygen` uses this to hand back
    /// all `n_shares` shares for distribution to trustees; truncation to the
    /// minimum quorum only makes sense once an arbitrary subset is submitted
    /// for decryption later, which is what [`PrivateKeyRing::new`] is for.
    pub fn from_all_shares(private_key_shares: Vec<PrivateKeyShare>) -> Result<Self> {
        let (public_key, by_index) = Self::dedup_shares(private_key_shares)?;
        let chosen: Vec<PrivateKeyShare> = by_index.into_values().collect();
        Self::finish(public_key, chosen)
    }

    /// The Lagrange coefficient `lambda(i) = delta * prod_{i' in S, i' != i} i'/(i'-i) (mod n^s * m)`.
    fn lambda(&self, i: &BigUint) -> Result<BigUint> {
        let n_s_m = &self.public_key.n_s_m;
        let n_s_m_signed = BigInt::from(n_s_m.clone());
        let i_signed = BigInt::from(i.clone());

        let mut l = &self.public_key.delta % n_s_m;
        for i_prime in &self.i_list {
            if i_prime == i {
                continue;
            }
            let i_prime_signed = BigInt::from(i_prime.clone());
            let diff = py_mod(&(&i_prime_signed - &i_signed), &n_s_m_signed)
                .to_biguint()
                .expect("py_mod result is non-negative");
            let diff_inv = inv_mod(&diff, n_s_m)?;
            l = (&l * i_prime * diff_inv) % n_s_m;
        }
        Ok(l)
    }

    /// Decrypts an [`EncryptedNumber`] by combining every trustee's partial
    /// decryption with Lagrange coefficients, then running
    /// [`damgard_jurik_reduce`] to recover the plaintext.
    pub fn decrypt(&self, c: &EncryptedNumber) -> Result<BigUint> {
        if self.public_key != c.public_key {
            return Err(Error::KeyMismatch);
        }

        let mut c_prime = BigUint::one();
        for share in &self.private_key_shares {
            let c_i = share.partial_decrypt(c)?;
            let lam = self.lambda(&share.i)?;
            let exponent = BigUint::from(2u32) * lam;
            c_prime = (c_prime * c_i.modpow(&exponent, &self.public_key.n_s_1))
                % &self.public_key.n_s_1;
        }

        let reduced = damgard_jurik_reduce(&c_prime, self.public_key.s, &self.public_key.n)?;
        let n_s_signed = BigInt::from(self.public_key.n_s.clone());
        let inv_signed = BigInt::from(self.inv_four_delta_squared.clone());
        let m = py_mod(&(&reduced * &inv_signed), &n_s_signed);

        Ok(m
            .to_biguint()
            .expect("py_mod result is non-negative"))
    }

    /// Decrypts every [`EncryptedNumber`] in `cs`.
    pub fn decrypt_many(&self, cs: &[EncryptedNumber]) -> Result<Vec<BigUint>> {
        cs.iter().map(|c| self.decrypt(c)).collect()
    }

    /// The trustee shares this ring holds, for distribution or persistence.
    pub fn shares(&self) -> &[PrivateKeyShare] {
        &self.private_key_shares
    }
}

/// Python-style modulo: always returns a value in `[0, m)` for `m > 0`,
/// unlike Rust's `%` which follows the sign of the dividend.
fn py_mod(a: &BigInt, m: &BigInt) -> BigInt {
    let r = a % m;
    if r.is_negative() {
        r + m
    } else {
        r
    }
}

fn bigint_pow(base: &BigInt, exp: u32) -> BigInt {
    let mut result = BigInt::one();
    for _ in 0..exp {
        result *= base;
    }
    result
}

/// Recovers `i` such that `a = (1+n)^i (mod n^(s+1))`, the core step that
/// turns the combined partial decryptions back into a plaintext
/// (`spec.md` §4.4, grounded on the original's `damgard_jurik_reduce`).
pub fn damgard_jurik_reduce(a: &BigUint, s: u32, n: &BigUint) -> Result<BigInt> {
    let n_signed = BigInt::from(n.clone());
    let a_signed = BigInt::from(a.clone());

    let n_pow: Vec<BigInt> = (0..=s + 1).map(|p| bigint_pow(&n_signed, p)).collect();

    let l = |b: &BigInt| -> Result<BigInt> {
        let numerator = b - BigInt::one();
        if !(&numerator % &n_signed).is_zero() {
            return Err(Error::DivisibilityInvariant);
        }
        Ok(numerator / &n_signed)
    };

    let mut i = BigInt::zero();
    for j in 1..=s {
        let n_pow_j1 = &n_pow[(j + 1) as usize];
        let n_pow_j = &n_pow[j as usize];

        let mut t1 = l(&py_mod(&a_signed, n_pow_j1))?;
        let mut t2 = i.clone();

        for k in 2..=j {
            i -= BigInt::one();
            t2 = py_mod(&(&t2 * &i), n_pow_j);

            let fact_k = BigInt::from(factorial(k));
            let fact_k_mod = py_mod(&fact_k, n_pow_j)
                .to_biguint()
                .expect("py_mod result is non-negative");
            let n_pow_j_biguint = n_pow_j
                .to_biguint()
                .expect("n^j for j >= 1 is positive");
            let inv_fact_k = inv_mod(&fact_k_mod, &n_pow_j_biguint)?;

            let term = py_mod(
                &(&t2 * &n_pow[(k - 1) as usize] * BigInt::from(inv_fact_k)),
                n_pow_j,
            );
            t1 -= term;
        }

        i = t1;
    }

    Ok(i)
}
