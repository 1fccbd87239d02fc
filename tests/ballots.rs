//! `spec.md` §8 seed scenarios 1-3: first-preference tallying and candidate
//! elimination against fixed ballots.

use std::collections::HashSet;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use shufflesum_core::dj::{keygen_with_rng, EncryptedNumber, KeygenConfig, PrivateKeyRing, PublicKey};
use shufflesum_core::primes::MillerRabinConfig;
use shufflesum_core::stv::{compute_first_preference_tallies, eliminate_candidate_set};
use shufflesum_core::{CandidateOrderBallot, TallyConfig};

fn small_config() -> KeygenConfig {
    KeygenConfig {
        n_bits: 40,
        s: 1,
        threshold: 2,
        n_shares: 3,
        miller_rabin: MillerRabinConfig { rounds: 20 },
    }
}

fn encrypted_prefs(pk: &Arc<PublicKey>, prefs: &[u64], rng: &mut ChaCha20Rng) -> Vec<EncryptedNumber> {
    prefs
        .iter()
        .map(|p| pk.encrypt_with_rng(&BigUint::from(*p), rng).unwrap())
        .collect()
}

fn ballot(
    pk: &Arc<PublicKey>,
    candidates: &[u64],
    prefs: &[u64],
    weight: u64,
    rng: &mut ChaCha20Rng,
) -> CandidateOrderBallot {
    CandidateOrderBallot {
        candidates: candidates.to_vec(),
        preferences: encrypted_prefs(pk, prefs, rng),
        weight: pk.encrypt_with_rng(&BigUint::from(weight), rng).unwrap(),
    }
}

fn fresh_keys(seed: u64) -> (Arc<PublicKey>, PrivateKeyRing, ChaCha20Rng) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let (pk, ring) = keygen_with_rng(small_config(), &mut rng).unwrap();
    (pk, ring, rng)
}

// Scenario 1: 3 candidates [1,2,3], one ballot prefs [3,1,2], weight 8.
// First-preference tallies = [0, 8, 0].
#[test]
fn scenario_1_single_ballot_first_preference_tally() {
    let (pk, ring, mut rng) = fresh_keys(301);
    let b = ballot(&pk, &[1, 2, 3], &[3, 1, 2], 8, &mut rng);

    let config = TallyConfig::default();
    let (_fpb, tallies) = compute_first_preference_tallies(&[b], &ring, &pk, &config).unwrap();

    assert_eq!(
        tallies,
        vec![BigUint::zero(), BigUint::from(8u32), BigUint::zero()]
    );
}

// Scenario 2: candidates [1,2,3], ballot prefs [3,1,2], weight 1.
// Eliminate {3}: remaining candidates [1,2], decrypted prefs [2,1], weight 1.
#[test]
fn scenario_2_eliminating_one_candidate_shifts_preferences() {
    let (pk, ring, mut rng) = fresh_keys(302);
    let b = ballot(&pk, &[1, 2, 3], &[3, 1, 2], 1, &mut rng);

    let config = TallyConfig::default();
    let mut losers = HashSet::new();
    losers.insert(3u64);
    let remaining = eliminate_candidate_set(&losers, &[b], &ring, &pk, &config).unwrap();

    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].candidates, vec![1, 2]);

    let decoded: Vec<BigUint> = remaining[0]
        .preferences
        .iter()
        .map(|p| ring.decrypt(p).unwrap())
        .collect();
    assert_eq!(decoded, vec![BigUint::from(2u32), BigUint::from(1u32)]);

    let decoded_weight = ring.decrypt(&remaining[0].weight).unwrap();
    assert_eq!(decoded_weight, BigUint::from(1u32));
}

// Scenario 3: 6 candidates [0..5], two ballots: [0,3,4,2,1,5]@8,
// [4,2,3,5,0,1]@4. Eliminate {0,3,4}: both ballots retain [1,2,5] with prefs
// [0,1,2] and [1,2,0] respectively (weights preserved).
#[test]
fn scenario_3_eliminating_three_candidates_across_two_ballots() {
    let (pk, ring, mut rng) = fresh_keys(303);
    let candidates = [0u64, 1, 2, 3, 4, 5];
    let ballots = vec![
        ballot(&pk, &candidates, &[0, 3, 4, 2, 1, 5], 8, &mut rng),
        ballot(&pk, &candidates, &[4, 2, 3, 5, 0, 1], 4, &mut rng),
    ];

    let config = TallyConfig::default();
    let mut losers = HashSet::new();
    losers.insert(0u64);
    losers.insert(3u64);
    losers.insert(4u64);
    let remaining = eliminate_candidate_set(&losers, &ballots, &ring, &pk, &config).unwrap();

    assert_eq!(remaining.len(), 2);

    assert_eq!(remaining[0].candidates, vec![1, 2, 5]);
    let prefs_0: Vec<BigUint> = remaining[0]
        .preferences
        .iter()
        .map(|p| ring.decrypt(p).unwrap())
        .collect();
    assert_eq!(
        prefs_0,
        vec![BigUint::zero(), BigUint::from(1u32), BigUint::from(2u32)]
    );
    assert_eq!(ring.decrypt(&remaining[0].weight).unwrap(), BigUint::from(8u32));

    assert_eq!(remaining[1].candidates, vec![1, 2, 5]);
    let prefs_1: Vec<BigUint> = remaining[1]
        .preferences
        .iter()
        .map(|p| ring.decrypt(p).unwrap())
        .collect();
    assert_eq!(
        prefs_1,
        vec![BigUint::from(1u32), BigUint::from(2u32), BigUint::zero()]
    );
    assert_eq!(ring.decrypt(&remaining[1].weight).unwrap(), BigUint::from(4u32));
}

#[test]
fn shuffled_ballot_tallies_match_a_canonically_ordered_one() {
    use shufflesum_core::ballots::{apply_permutation, shuffle_permutation};

    let (pk, ring, mut rng) = fresh_keys(304);
    let candidates = [1u64, 2, 3];
    let prefs = [3u64, 1, 2];

    let baseline = ballot(&pk, &candidates, &prefs, 5, &mut rng);

    let perm = shuffle_permutation(3, &mut rng);
    let shuffled_candidates = apply_permutation(&candidates, &perm);
    let shuffled_prefs = apply_permutation(&prefs, &perm);
    let shuffled = ballot(&pk, &shuffled_candidates, &shuffled_prefs, 5, &mut rng);

    let config = TallyConfig::default();
    let (_fpb_a, tallies_a) =
        compute_first_preference_tallies(&[baseline], &ring, &pk, &config).unwrap();
    let (_fpb_b, tallies_b) =
        compute_first_preference_tallies(&[shuffled], &ring, &pk, &config).unwrap();

    assert_eq!(tallies_a, tallies_b);
}
