//! Threshold Damgard-Jurik: additively homomorphic encryption with a
//! `(threshold, n_shares)` decryption quorum (`spec.md` §2 component 1, §4.3,
//! §4.4).

mod private_key;
mod public_key;

pub use private_key::{damgard_jurik_reduce, PrivateKeyRing, PrivateKeyShare};
pub use public_key::{keygen, keygen_with_rng, EncryptedNumber, KeygenConfig, PublicKey};
