//! CSPRNG selection.
//!
//! Every random draw in this crate (safe-prime candidates, Damgard-Jurik's
//! `r`, Shamir polynomial coefficients, Fisher-Yates shuffles) goes through
//! `rand::CryptoRng + rand::RngCore`. Production call sites default to
//! [`rand::rngs::OsRng`]; a seeded `rand_chacha::ChaCha20Rng` is used only in
//! `#[cfg(test)]` code, per `spec.md` §9's "Deterministic tests" note.

pub use rand::{CryptoRng, RngCore};

/// The RNG used by every public entry point unless a `_with_rng` variant is
/// called directly (those are crate-internal, used from tests).
pub fn default_rng() -> rand::rngs::OsRng {
    rand::rngs::OsRng
}

#[cfg(test)]
pub(crate) fn seeded_rng(seed: u64) -> rand_chacha::ChaCha20Rng {
    use rand::SeedableRng;
    rand_chacha::ChaCha20Rng::seed_from_u64(seed)
}
