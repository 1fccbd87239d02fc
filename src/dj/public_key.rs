//! The Damgard-Jurik [`PublicKey`], [`EncryptedNumber`], and `keygen` (`spec.md` §4.3).

use std::ops::{Add, Neg, Sub};
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::math::{crt, factorial, inv_mod, pow_mod};
use crate::primes::{gen_safe_prime_pair_with_rng, MillerRabinConfig};
use crate::rng::default_rng;
use crate::shamir::share_secret_with_rng;

use super::private_key::{PrivateKeyRing, PrivateKeyShare};

/// Parameters for [`keygen`].
///
/// `spec.md` §6 requires `1 <= threshold <= n_shares`, `s >= 1`, and
/// `n_bits >= 16`.
#[derive(Clone, Copy, Debug)]
pub struct KeygenConfig {
    /// Bit length of each of the two safe primes `p`, `q` making up `n = p*q`.
    pub n_bits: u32,
    /// The power `s` to which `n` is raised; plaintexts live in `Z_{n^s}`.
    pub s: u32,
    /// Minimum number of private key shares needed to decrypt.
    pub threshold: u32,
    /// Total number of private key shares to generate.
    pub n_shares: u32,
    /// Miller-Rabin confidence used while searching for safe primes.
    pub miller_rabin: MillerRabinConfig,
}

impl Default for KeygenConfig {
    fn default() -> Self {
        KeygenConfig {
            n_bits: 2048,
            s: 1,
            threshold: 9,
            n_shares: 16,
            miller_rabin: MillerRabinConfig::default(),
        }
    }
}

/// A Damgard-Jurik public key. Encrypts plaintexts in `Z_{n^s}`; shared
/// read-only by every party in the protocol, so always handled as
/// `Arc<PublicKey>` rather than cloned (`spec.md` §3, §5, §9's "non-owning
/// reference by identity").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    pub n: BigUint,
    pub s: u32,
    pub m: BigUint,
    pub threshold: u32,
    pub delta: BigUint,
    pub(crate) n_s: BigUint,
    pub(crate) n_s_1: BigUint,
    pub(crate) n_s_m: BigUint,
}

impl PublicKey {
    fn new(n: BigUint, s: u32, m: BigUint, threshold: u32, delta: BigUint) -> Self {
        let n_s = n.pow(s);
        let n_s_1 = &n_s * &n;
        let n_s_m = &n_s * &m;
        PublicKey {
            n,
            s,
            m,
            threshold,
            delta,
            n_s,
            n_s_1,
            n_s_m,
        }
    }

    /// Encrypts `message` (which must satisfy `0 <= message < n^s`) using the
    /// system CSPRNG.
    pub fn encrypt(self: &Arc<Self>, message: &BigUint) -> Result<EncryptedNumber> {
        self.encrypt_with_rng(message, &mut default_rng())
    }

    /// As [`encrypt`](Self::encrypt), drawing the blinding factor `r` from a
    /// caller-supplied CSPRNG (used by tests for determinism).
    pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
        self: &Arc<Self>,
        message: &BigUint,
        rng: &mut R,
    ) -> Result<EncryptedNumber> {
        let r = random_unit(&self.n, rng);
        let one_plus_n = &self.n + BigUint::one();
        let c = pow_mod(&one_plus_n, &BigInt::from(message.clone()), &self.n_s_1)?
            * pow_mod(&r, &BigInt::from(self.n_s.clone()), &self.n_s_1)?
            % &self.n_s_1;

        Ok(EncryptedNumber {
            value: c,
            public_key: Arc::clone(self),
        })
    }
}

/// Draws a uniform value in `[1, n)`, used as Damgard-Jurik's blinding factor
/// `r` in `Z_n^*`.
fn random_unit<R: RngCore + CryptoRng>(n: &BigUint, rng: &mut R) -> BigUint {
    let bound = n - BigUint::one();
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
        if candidate < bound {
            return candidate + BigUint::one();
        }
    }
}

/// An integer encrypted under a [`PublicKey`] (`spec.md` §3, §4.3).
///
/// Supports the ciphertext algebra of `spec.md` §4.3 both as named methods
/// (used by the tally engine, which composes them across slices) and as
/// `std::ops` trait impls (idiomatic for an algebraic numeric type).
#[derive(Clone, Debug)]
pub struct EncryptedNumber {
    pub(crate) value: BigUint,
    pub public_key: Arc<PublicKey>,
}

impl EncryptedNumber {
    /// The raw ciphertext value, `value in Z_{n^(s+1)}*`.
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    fn check_same_key(&self, other: &EncryptedNumber) -> Result<()> {
        if self.public_key != other.public_key {
            return Err(Error::KeyMismatch);
        }
        Ok(())
    }

    /// `c1 (+) c2`, decrypting to `(m1 + m2) mod n^s`.
    pub fn add(&self, other: &EncryptedNumber) -> Result<EncryptedNumber> {
        self.check_same_key(other)?;
        Ok(EncryptedNumber {
            value: (&self.value * &other.value) % &self.public_key.n_s_1,
            public_key: Arc::clone(&self.public_key),
        })
    }

    /// `(-) c`, decrypting to `-m mod n^s`.
    pub fn neg(&self) -> Result<EncryptedNumber> {
        Ok(EncryptedNumber {
            value: inv_mod(&self.value, &self.public_key.n_s_1)?,
            public_key: Arc::clone(&self.public_key),
        })
    }

    /// `c1 (-) c2`, decrypting to `(m1 - m2) mod n^s`.
    pub fn sub(&self, other: &EncryptedNumber) -> Result<EncryptedNumber> {
        self.add(&other.neg()?)
    }

    /// `c (x) k`, decrypting to `(k * m) mod n^s`.
    pub fn mul_scalar(&self, k: &BigInt) -> Result<EncryptedNumber> {
        Ok(EncryptedNumber {
            value: pow_mod(&self.value, k, &self.public_key.n_s_1)?,
            public_key: Arc::clone(&self.public_key),
        })
    }

    /// `c (/) k`, decrypting to the exact quotient `m / k mod n^s`, provided
    /// `gcd(k, n) = 1` *and* the underlying plaintext is actually a multiple
    /// of `k` in `Z_{n^s}` — the caller must guarantee divisibility
    /// (`spec.md` §4.3, the reweighting step in §4.5 is the only caller and
    /// establishes this by construction).
    pub fn div_scalar(&self, k: &BigInt) -> Result<EncryptedNumber> {
        let n_s_1 = BigInt::from(self.public_key.n_s_1.clone());
        let k_mod = ((k % &n_s_1) + &n_s_1) % &n_s_1;
        let k_biguint = k_mod
            .to_biguint()
            .expect("value reduced mod a positive modulus is non-negative");
        if crate::math::gcd(&k_biguint, &self.public_key.n) != BigUint::one() {
            return Err(Error::NotCoprimeDivisor);
        }
        let k_inv = inv_mod(&k_biguint, &self.public_key.n_s_1)?;
        self.mul_scalar(&BigInt::from(k_inv))
    }
}

impl PartialEq for EncryptedNumber {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.public_key == other.public_key
    }
}

impl Add for &EncryptedNumber {
    type Output = Result<EncryptedNumber>;
    fn add(self, rhs: Self) -> Self::Output {
        EncryptedNumber::add(self, rhs)
    }
}

impl Sub for &EncryptedNumber {
    type Output = Result<EncryptedNumber>;
    fn sub(self, rhs: Self) -> Self::Output {
        EncryptedNumber::sub(self, rhs)
    }
}

impl Neg for &EncryptedNumber {
    type Output = Result<EncryptedNumber>;
    fn neg(self) -> Self::Output {
        EncryptedNumber::neg(self)
    }
}

/// Generates a [`PublicKey`] and a [`PrivateKeyRing`] holding `config.n_shares`
/// [`PrivateKeyShare`]s, using the threshold variant of Damgard-Jurik
/// (`spec.md` §4.3, §6).
#[instrument(skip_all, fields(n_bits = config.n_bits, s = config.s, threshold = config.threshold, n_shares = config.n_shares))]
pub fn keygen(config: KeygenConfig) -> Result<(Arc<PublicKey>, PrivateKeyRing)> {
    keygen_with_rng(config, &mut default_rng())
}

/// As [`keygen`], drawing every random value from a caller-supplied CSPRNG.
pub fn keygen_with_rng<R: RngCore + CryptoRng>(
    config: KeygenConfig,
    rng: &mut R,
) -> Result<(Arc<PublicKey>, PrivateKeyRing)> {
    const MIN_BITS: u32 = 16;
    if config.n_bits < MIN_BITS {
        return Err(Error::BitLengthTooSmall {
            bits: config.n_bits,
            min_bits: MIN_BITS,
        });
    }
    if config.s < 1 {
        return Err(Error::InvalidExponent(config.s));
    }
    if config.threshold < 1 || config.n_shares < config.threshold {
        return Err(Error::InvalidThreshold {
            threshold: config.threshold,
            n_shares: config.n_shares,
        });
    }

    debug!("searching for a safe prime pair");
    let (p, q) = gen_safe_prime_pair_with_rng(config.n_bits, config.miller_rabin, rng);
    let p_prime = (&p - BigUint::one()) / BigUint::from(2u32);
    let q_prime = (&q - BigUint::one()) / BigUint::from(2u32);
    let n = &p * &q;
    let m = &p_prime * &q_prime;

    let n_s = n.pow(config.s);
    let n_s_m = &n_s * &m;

    // d = 0 (mod m), d = 1 (mod n^s)
    let d = crt(&[BigUint::zero(), BigUint::one()], &[m.clone(), n_s.clone()])?;

    debug!("sharing decryption exponent across trustees");
    let shares = share_secret_with_rng(&d, &n_s_m, config.threshold, config.n_shares, rng)?;

    let delta = factorial(config.n_shares);
    let public_key = Arc::new(PublicKey::new(n, config.s, m, config.threshold, delta));

    let private_key_shares: Vec<PrivateKeyShare> = shares
        .into_iter()
        .map(|share| PrivateKeyShare::new(Arc::clone(&public_key), share.i, share.value))
        .collect();

    let ring = PrivateKeyRing::from_all_shares(private_key_shares)?;

    Ok((public_key, ring))
}
