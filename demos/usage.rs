//! End-to-end demo: generate a threshold key, encrypt a handful of ranked
//! ballots, and run the ShuffleSum tally.
//!
//! Run with `cargo run --example usage`.
use std::sync::Arc;

use num_bigint::BigUint;
use shufflesum_core::dj::{keygen, KeygenConfig};
use shufflesum_core::primes::MillerRabinConfig;
use shufflesum_core::{stv_tally, CandidateOrderBallot, TallyConfig};

fn encrypted_ballot(
    pk: &Arc<shufflesum_core::PublicKey>,
    candidates: &[u64],
    preferences: &[u64],
    weight: u64,
) -> CandidateOrderBallot {
    CandidateOrderBallot {
        candidates: candidates.to_vec(),
        preferences: preferences
            .iter()
            .map(|p| pk.encrypt(&BigUint::from(*p)).unwrap())
            .collect(),
        weight: pk.encrypt(&BigUint::from(weight)).unwrap(),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // A small key for a quick demo; production elections use the 2048-bit
    // default from `KeygenConfig::default()`.
    let config = KeygenConfig {
        n_bits: 64,
        s: 1,
        threshold: 3,
        n_shares: 5,
        miller_rabin: MillerRabinConfig::default(),
    };

    println!("generating a threshold Damgard-Jurik key...");
    let (public_key, private_key_ring) = keygen(config).expect("key generation");

    let candidates = [0u64, 1, 2, 3, 4, 5];
    let stop_candidate = 99;

    let ballots = vec![
        encrypted_ballot(&public_key, &candidates, &[1, 5, 0, 2, 4, 3], 80),
        encrypted_ballot(&public_key, &candidates, &[0, 3, 4, 2, 1, 5], 80),
        encrypted_ballot(&public_key, &candidates, &[5, 3, 0, 4, 2, 1], 100),
        encrypted_ballot(&public_key, &candidates, &[3, 2, 4, 5, 0, 1], 25),
        encrypted_ballot(&public_key, &candidates, &[2, 4, 3, 0, 1, 5], 25),
    ];

    println!("tallying {} ballots for 1 seat...", ballots.len());
    let tally_config = TallyConfig::default();
    let elected = stv_tally(
        &ballots,
        1,
        stop_candidate,
        &private_key_ring,
        &public_key,
        &tally_config,
    )
    .expect("stv tally");

    println!("elected candidates, in order: {elected:?}");
}
