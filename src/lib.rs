//! Threshold Damgard-Jurik homomorphic encryption and the ShuffleSum STV
//! tally engine for verifiable ranked-choice elections.
//!
//! The crate is organized bottom-up:
//!
//! - [`math`] and [`primes`]: modular arithmetic and safe-prime generation.
//! - [`shamir`]: `(t, n)` secret sharing over an arbitrary modulus.
//! - [`dj`]: the Damgard-Jurik cryptosystem — [`dj::PublicKey`],
//!   [`dj::EncryptedNumber`], threshold decryption via [`dj::PrivateKeyRing`].
//! - [`ballots`]: the four ballot table representations and the
//!   homomorphic transforms between them.
//! - [`stv`]: the ShuffleSum tally engine built on top of all of the above.
//! - [`parallel`]: the per-ballot worker-pool helper the other modules
//!   dispatch through.
//!
//! Every fallible operation returns [`error::Result`]; every random draw
//! goes through [`rng`].

pub mod ballots;
pub mod dj;
pub mod error;
pub mod math;
pub mod parallel;
pub mod primes;
pub mod rng;
pub mod shamir;
pub mod stv;

pub use ballots::{
    CandidateEliminationBallot, CandidateId, CandidateOrderBallot, FirstPreferenceBallot,
};
pub use dj::{keygen, EncryptedNumber, KeygenConfig, PrivateKeyRing, PrivateKeyShare, PublicKey};
pub use error::{Error, Result};
pub use stv::{stv_tally, TallyConfig};
