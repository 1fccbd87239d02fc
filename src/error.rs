//! Error taxonomy for the ShuffleSum core.
//!
//! Every fallible public operation returns [`Result<T, Error>`](Result). There
//! is no retry strategy: cryptographic computation here is deterministic
//! given its inputs and RNG, so a failure always means either a bug or a
//! malformed input (see `spec.md` §7).

use num_bigint::BigUint;

/// The error type returned by fallible operations across the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `s` must be at least 1 (plaintexts live in `Z_{n^s}`).
    #[error("s must be >= 1, got {0}")]
    InvalidExponent(u32),

    /// Key generation was asked for too few bits to be meaningful.
    #[error("key generation requires at least {min_bits} bits, got {bits}")]
    BitLengthTooSmall { bits: u32, min_bits: u32 },

    /// `threshold` was outside `1..=n_shares`.
    #[error("threshold must satisfy 1 <= threshold <= n_shares (got threshold={threshold}, n_shares={n_shares})")]
    InvalidThreshold { threshold: u32, n_shares: u32 },

    /// A secret handed to Shamir sharing was not in `[0, modulus)`.
    #[error("secret must satisfy 0 <= secret < modulus")]
    SecretOutOfRange,

    /// `inv_mod(a, m)` was asked for the inverse of a value not coprime to `m`.
    #[error("modular inverse does not exist: {a} and {m} are not coprime")]
    NotInvertible { a: BigUint, m: BigUint },

    /// CRT was asked to combine residues over non-pairwise-coprime moduli.
    #[error("CRT moduli must be pairwise coprime")]
    CrtModuliNotCoprime,

    /// Two `EncryptedNumber`s (or key shares) referenced different public keys.
    #[error("attempted to combine values encrypted under different public keys")]
    KeyMismatch,

    /// Fewer than `threshold` unique-index private key shares were supplied.
    #[error("need at least {required} unique private key shares to decrypt, have {available}")]
    InsufficientShares { required: u32, available: u32 },

    /// `div_scalar`/`PrivateKeyRing` construction needs `gcd(k, n) == 1`.
    #[error("scalar division requires gcd(divisor, n) == 1")]
    NotCoprimeDivisor,

    /// An operation over ballots or key shares was given an empty collection.
    #[error("operation requires at least one {0}")]
    EmptyInput(&'static str),

    /// Every ballot supplied to the tally must share the same candidate list.
    #[error("all ballots in a tally round must share the same candidate list")]
    InconsistentCandidates,

    /// Reweighting relies on exact divisibility by each elected tally after
    /// scaling by `lcm`; if this ever fails it is a bug in the engine, not a
    /// malformed input, since the caller already enforces the divisibility
    /// contract documented on [`crate::dj::EncryptedNumber::div_scalar`].
    #[error("reweighting invariant violated: plaintext was not evenly divisible by the elected tally (this indicates a bug)")]
    DivisibilityInvariant,

    /// `stv_tally` needs at least one seat to fill.
    #[error("seats must be >= 1")]
    InvalidSeatCount,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
