//! Modular arithmetic and number-theoretic primitives (`spec.md` §4.1).
//!
//! Arbitrary-precision integers throughout: [`BigUint`] for values that are
//! always non-negative (moduli, plaintexts, ciphertexts) and [`BigInt`] where
//! a sign is meaningful (exponents, extended-Euclid coefficients).

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::error::{Error, Result};

/// Computes `a^b mod m`, supporting negative `b` via [`inv_mod`].
pub fn pow_mod(a: &BigUint, b: &BigInt, m: &BigUint) -> Result<BigUint> {
    if b.is_negative() {
        let a_inv = inv_mod(a, m)?;
        Ok(a_inv.modpow(&(-b).to_biguint().expect("negated negative is non-negative"), m))
    } else {
        Ok(a.modpow(&b.to_biguint().expect("non-negative BigInt converts to BigUint"), m))
    }
}

/// The Extended Euclidean Algorithm: finds `(g, x, y)` such that
/// `a*x + b*y = g = gcd(a, b)`.
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let quotient = &old_r / &r;
        let new_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, new_r);
        let new_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, new_s);
        let new_t = &old_t - &quotient * &t;
        old_t = std::mem::replace(&mut t, new_t);
    }

    (old_r, old_s, old_t)
}

/// The greatest common divisor of two non-negative integers.
pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
    a.gcd(b)
}

/// The least common multiple of an arbitrary number of non-negative
/// integers. `lcm(&[])` is the multiplicative identity `1`, keeping the
/// function total for callers that might (in principle) be asked to fold
/// over an empty elected set, even though `spec.md` §4.5 never actually
/// reaches reweighting with zero elected candidates.
pub fn lcm(values: &[BigUint]) -> BigUint {
    values
        .iter()
        .fold(BigUint::one(), |acc, v| acc.lcm(v))
}

/// Finds `b` such that `a*b = 1 (mod m)`, i.e. the modular inverse of `a`.
///
/// Fails with [`Error::NotInvertible`] if `gcd(a, m) != 1`.
pub fn inv_mod(a: &BigUint, m: &BigUint) -> Result<BigUint> {
    let a_mod = a % m;
    let a_signed = BigInt::from(a_mod.clone());
    let m_signed = BigInt::from(m.clone());

    let (g, x, _) = extended_gcd(&a_signed, &m_signed);
    if g != BigInt::one() && g != -BigInt::one() {
        return Err(Error::NotInvertible {
            a: a_mod,
            m: m.clone(),
        });
    }

    let m_big = m_signed.clone();
    let inv = ((x % &m_big) + &m_big) % &m_big;
    Ok(inv.to_biguint().expect("reduced mod positive modulus is non-negative"))
}

/// Applies the Chinese Remainder Theorem: finds the unique `x` in
/// `[0, prod(moduli))` such that `x = residues[i] (mod moduli[i])` for all
/// `i`. `moduli` must be pairwise coprime.
pub fn crt(residues: &[BigUint], moduli: &[BigUint]) -> Result<BigUint> {
    assert_eq!(residues.len(), moduli.len(), "crt: mismatched input lengths");

    let product = moduli.iter().fold(BigUint::one(), |acc, n| acc * n);

    let mut x = BigUint::zero();
    for (a_i, n_i) in residues.iter().zip(moduli) {
        let y_i = &product / n_i;
        let z_i = inv_mod(&(&y_i % n_i), n_i).map_err(|_| Error::CrtModuliNotCoprime)?;
        x = (x + a_i * &y_i * z_i) % &product;
    }

    Ok(x)
}

/// `n!` as a [`BigUint`]. Used to compute `delta = (n_shares)!` in `keygen`.
pub fn factorial(n: u32) -> BigUint {
    (1..=n).fold(BigUint::one(), |acc, k| acc * BigUint::from(k))
}
