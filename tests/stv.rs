//! `spec.md` §8 seed scenarios 4, 5, and 6: a full STV tally, the surplus
//! reweighting formula, and the lower-indexed-candidate tie-breaking rule.

use std::collections::HashSet;
use std::sync::Arc;

use num_bigint::BigUint;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use shufflesum_core::dj::{keygen_with_rng, EncryptedNumber, KeygenConfig, PrivateKeyRing, PublicKey};
use shufflesum_core::primes::MillerRabinConfig;
use shufflesum_core::stv::reweight_votes;
use shufflesum_core::{stv_tally, CandidateOrderBallot, FirstPreferenceBallot, TallyConfig};

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

// Scenario 4: quota = floor(310/(seats+1))+1; candidate 4 has the highest
// first-preference tally (125) and is elected when seats = 1.
#[test]
fn scenario_4_elects_the_highest_first_preference_candidate() {
    let (pk, ring, mut rng) = fresh_keys(401);
    let candidates = [0u64, 1, 2, 3, 4, 5];
    let ballots = vec![
        ballot(&pk, &candidates, &[1, 5, 0, 2, 4, 3], 80, &mut rng),
        ballot(&pk, &candidates, &[0, 3, 4, 2, 1, 5], 80, &mut rng),
        ballot(&pk, &candidates, &[5, 3, 0, 4, 2, 1], 100, &mut rng),
        ballot(&pk, &candidates, &[3, 2, 4, 5, 0, 1], 25, &mut rng),
        ballot(&pk, &candidates, &[2, 4, 3, 0, 1, 5], 25, &mut rng),
    ];

    let config = TallyConfig::default();
    let stop_candidate = 99;
    let elected = stv_tally(&ballots, 1, stop_candidate, &ring, &pk, &config).unwrap();

    assert_eq!(elected, vec![4]);
}

fn first_preference_ballot(
    pk: &Arc<PublicKey>,
    candidates: &[u64],
    top_preference_index: usize,
    weight: u64,
    rng: &mut ChaCha20Rng,
) -> FirstPreferenceBallot {
    let weights = (0..candidates.len())
        .map(|i| {
            let w = if i == top_preference_index { weight } else { 0 };
            pk.encrypt_with_rng(&BigUint::from(w), rng).unwrap()
        })
        .collect();
    let preferences = encrypted_prefs(pk, &vec![0u64; candidates.len()], rng);
    FirstPreferenceBallot {
        candidates: candidates.to_vec(),
        preferences,
        weights,
    }
}

// Scenario 5: a ballot whose top preference is in the elected set E is
// reweighted by `(t_c - q) / t_c * D`; every other ballot is reweighted by
// `D` alone, where `D = lcm(t_E)`.
//
// Candidates [1,2,3], quota q=2, elected E={1} with tally t_1=4 so D=4.
// Ballot A tops candidate 1 with weight 3: new weight = 3*(4-2)/4*4 = 6.
// Ballot B tops candidate 2 (not elected) with weight 5: new weight = 5*4 = 20.
#[test]
fn scenario_5_reweighting_matches_the_documented_formula() {
    let (pk, ring, mut rng) = fresh_keys(405);
    let candidates = [1u64, 2, 3];

    let ballot_a = first_preference_ballot(&pk, &candidates, 0, 3, &mut rng);
    let ballot_b = first_preference_ballot(&pk, &candidates, 1, 5, &mut rng);

    let mut elected = HashSet::new();
    elected.insert(1u64);
    let quota = BigUint::from(2u32);
    let tallies = vec![BigUint::from(4u32), BigUint::from(3u32), BigUint::from(1u32)];
    let config = TallyConfig::default();

    let (reweighted, d_lcm) = reweight_votes(
        &[ballot_a, ballot_b],
        &elected,
        &quota,
        &tallies,
        &pk,
        &config,
    )
    .unwrap();

    assert_eq!(d_lcm, BigUint::from(4u32));
    assert_eq!(ring.decrypt(&reweighted[0].weight).unwrap(), BigUint::from(6u32));
    assert_eq!(ring.decrypt(&reweighted[1].weight).unwrap(), BigUint::from(20u32));
}

// Scenario 6: when two candidates tie for the lowest first-preference
// tally, the lower-indexed one is eliminated.
//
// 3 candidates [0,1,2], seats=2, two weight-1 ballots both ranking 0 first:
// round 1 tallies are [2,0,0] against quota floor(2/3)+1=1, so 0 is elected
// outright and removed. Round 2 (candidates [1,2], quota now 2) ties at
// [1,1] with nobody reaching quota, so the tie-break must fire: candidate 1
// (the lower id) is eliminated and candidate 2 survives to fill the last
// seat. If the rule instead dropped the higher id, 1 would survive and 2
// would be gone — the final result distinguishes the two outcomes.
#[test]
fn scenario_6_ties_at_the_lowest_tally_eliminate_the_lower_index_first() {
    let (pk, ring, mut rng) = fresh_keys(402);
    let candidates = [0u64, 1, 2];
    let ballots = vec![
        ballot(&pk, &candidates, &[0, 1, 2], 1, &mut rng),
        ballot(&pk, &candidates, &[0, 2, 1], 1, &mut rng),
    ];

    let config = TallyConfig::default();
    let stop_candidate = 99;
    let elected = stv_tally(&ballots, 2, stop_candidate, &ring, &pk, &config).unwrap();

    assert_eq!(elected, vec![0, 2]);
}
