//! Ballot representations and the homomorphic transforms between them
//! (`spec.md` §3, §4.4).
//!
//! Four representations share the same table shape (`m` columns, one per
//! candidate) but differ in which rows are plaintext vs encrypted. Moving
//! between them is how ShuffleSum learns just enough to run an STV round
//! without ever linking a ballot's identity to its preferences.

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use rand::{CryptoRng, RngCore};
use tracing::trace;

use crate::dj::{EncryptedNumber, PrivateKeyRing, PublicKey};
use crate::error::{Error, Result};
use crate::rng::default_rng;

/// Candidate labels are small non-negative integers (including the
/// synthetic stop-candidate id) — plain `u64` is plenty and avoids
/// dragging `BigUint` through code that never needs arbitrary precision.
pub type CandidateId = u64;

/// A ballot in candidate order: candidates are plaintext, preferences and
/// the overall weight are encrypted (`spec.md` §3).
#[derive(Clone, Debug)]
pub struct CandidateOrderBallot {
    pub candidates: Vec<CandidateId>,
    pub preferences: Vec<EncryptedNumber>,
    pub weight: EncryptedNumber,
}

/// A ballot in candidate order with a per-candidate encrypted weight,
/// zero everywhere except the voter's current top-ranked candidate.
#[derive(Clone, Debug)]
pub struct FirstPreferenceBallot {
    pub candidates: Vec<CandidateId>,
    pub preferences: Vec<EncryptedNumber>,
    pub weights: Vec<EncryptedNumber>,
}

/// A ballot in preference order with every row encrypted, including a
/// binary elimination tag per column.
#[derive(Clone, Debug)]
pub struct CandidateEliminationBallot {
    pub candidates: Vec<EncryptedNumber>,
    pub preferences: Vec<EncryptedNumber>,
    pub eliminated: Vec<EncryptedNumber>,
    pub weight: EncryptedNumber,
}

/// Draws a uniformly random permutation of `0..n` via Fisher-Yates.
pub fn shuffle_permutation<R: RngCore + CryptoRng>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..n.saturating_sub(1) {
        let span = (n - i) as u64;
        let j = i + random_below(span, rng) as usize;
        indices.swap(i, j);
    }
    indices
}

/// Applies `perm` (as produced by [`shuffle_permutation`]) to `row`; calling
/// this with the same `perm` on every row of a ballot table is the column
/// shuffle primitive of `spec.md` §4.4.
pub fn apply_permutation<T: Clone>(row: &[T], perm: &[usize]) -> Vec<T> {
    perm.iter().map(|&i| row[i].clone()).collect()
}

fn random_below<R: RngCore>(span: u64, rng: &mut R) -> u64 {
    if span <= 1 {
        return 0;
    }
    let zone = u64::MAX - (u64::MAX % span);
    loop {
        let v = rng.next_u64();
        if v < zone {
            return v % span;
        }
    }
}

fn to_candidate_id(value: &BigUint) -> CandidateId {
    value
        .to_u64()
        .expect("candidate ids fit in u64 by construction")
}

fn stable_sort_by_key<T: Clone>(items: &[T], keys: &[BigUint]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    order
}

/// `candidate_order -> first_preference` (`spec.md` §4.4), drawing column
/// shuffles from the system CSPRNG.
pub fn candidate_order_to_first_preference(
    ballot: &CandidateOrderBallot,
    ring: &PrivateKeyRing,
    pk: &Arc<PublicKey>,
) -> Result<FirstPreferenceBallot> {
    candidate_order_to_first_preference_with_rng(ballot, ring, pk, &mut default_rng())
}

/// As [`candidate_order_to_first_preference`], drawing every shuffle from a
/// caller-supplied CSPRNG (used by tests for determinism).
pub fn candidate_order_to_first_preference_with_rng<R: RngCore + CryptoRng>(
    ballot: &CandidateOrderBallot,
    ring: &PrivateKeyRing,
    pk: &Arc<PublicKey>,
    rng: &mut R,
) -> Result<FirstPreferenceBallot> {
    let n = ballot.candidates.len();
    if n == 0 {
        return Err(Error::EmptyInput("candidate"));
    }
    trace!(candidates = n, "converting ballot to first-preference form");

    // Step 1: encrypt the candidate row.
    let mut candidates: Vec<EncryptedNumber> = ballot
        .candidates
        .iter()
        .map(|c| pk.encrypt_with_rng(&BigUint::from(*c), rng))
        .collect::<Result<_>>()?;
    let mut preferences = ballot.preferences.clone();

    // Step 2: shuffle (candidates, preferences).
    let perm = shuffle_permutation(n, rng);
    candidates = apply_permutation(&candidates, &perm);
    preferences = apply_permutation(&preferences, &perm);

    // Step 3: threshold-decrypt the preference row.
    let decrypted_prefs: Vec<BigUint> =
        preferences.iter().map(|p| ring.decrypt(p)).collect::<Result<_>>()?;

    // Step 4: sort columns by preference ascending.
    let order = stable_sort_by_key(&candidates, &decrypted_prefs);
    let candidates: Vec<EncryptedNumber> = order.iter().map(|&i| candidates[i].clone()).collect();
    let sorted_prefs: Vec<BigUint> = order.iter().map(|&i| decrypted_prefs[i].clone()).collect();

    // Step 5: weights row = [weight, 0, 0, ...].
    let mut weights = Vec::with_capacity(n);
    weights.push(ballot.weight.clone());
    for _ in 1..n {
        weights.push(pk.encrypt_with_rng(&BigUint::zero(), rng)?);
    }

    // Step 6: re-encrypt the preference row.
    let preferences: Vec<EncryptedNumber> = sorted_prefs
        .iter()
        .map(|p| pk.encrypt_with_rng(p, rng))
        .collect::<Result<_>>()?;

    // Step 7: shuffle (candidates, preferences, weights).
    let perm = shuffle_permutation(n, rng);
    let candidates = apply_permutation(&candidates, &perm);
    let preferences = apply_permutation(&preferences, &perm);
    let weights = apply_permutation(&weights, &perm);

    // Step 8: threshold-decrypt the candidate row.
    let decrypted_candidates: Vec<BigUint> =
        candidates.iter().map(|c| ring.decrypt(c)).collect::<Result<_>>()?;

    // Step 9: sort columns by candidate.
    let order = stable_sort_by_key(&preferences, &decrypted_candidates);
    let candidates: Vec<CandidateId> = order
        .iter()
        .map(|&i| to_candidate_id(&decrypted_candidates[i]))
        .collect();
    let preferences: Vec<EncryptedNumber> = order.iter().map(|&i| preferences[i].clone()).collect();
    let weights: Vec<EncryptedNumber> = order.iter().map(|&i| weights[i].clone()).collect();

    Ok(FirstPreferenceBallot {
        candidates,
        preferences,
        weights,
    })
}

/// `candidate_order -> candidate_elimination` (`spec.md` §4.4). `eliminated`
/// is a plaintext 0/1 vector, one entry per column of `ballot`.
pub fn candidate_order_to_candidate_elimination(
    ballot: &CandidateOrderBallot,
    eliminated: &[u8],
    ring: &PrivateKeyRing,
    pk: &Arc<PublicKey>,
) -> Result<CandidateEliminationBallot> {
    candidate_order_to_candidate_elimination_with_rng(
        ballot,
        eliminated,
        ring,
        pk,
        &mut default_rng(),
    )
}

/// As [`candidate_order_to_candidate_elimination`], with an injectable CSPRNG.
pub fn candidate_order_to_candidate_elimination_with_rng<R: RngCore + CryptoRng>(
    ballot: &CandidateOrderBallot,
    eliminated: &[u8],
    ring: &PrivateKeyRing,
    pk: &Arc<PublicKey>,
    rng: &mut R,
) -> Result<CandidateEliminationBallot> {
    let n = ballot.candidates.len();
    if n == 0 {
        return Err(Error::EmptyInput("candidate"));
    }
    if eliminated.len() != n {
        return Err(Error::InconsistentCandidates);
    }
    trace!(candidates = n, "converting ballot to candidate-elimination form");

    // Step 1: encrypt the elimination-tag row.
    let mut eliminated: Vec<EncryptedNumber> = eliminated
        .iter()
        .map(|&e| pk.encrypt_with_rng(&BigUint::from(e), rng))
        .collect::<Result<_>>()?;
    // Step 2: encrypt the candidate row.
    let mut candidates: Vec<EncryptedNumber> = ballot
        .candidates
        .iter()
        .map(|c| pk.encrypt_with_rng(&BigUint::from(*c), rng))
        .collect::<Result<_>>()?;
    let mut preferences = ballot.preferences.clone();

    // Step 3: shuffle (candidates, preferences, eliminated).
    let perm = shuffle_permutation(n, rng);
    candidates = apply_permutation(&candidates, &perm);
    preferences = apply_permutation(&preferences, &perm);
    eliminated = apply_permutation(&eliminated, &perm);

    // Step 4: threshold-decrypt the preference row.
    let decrypted_prefs: Vec<BigUint> =
        preferences.iter().map(|p| ring.decrypt(p)).collect::<Result<_>>()?;

    // Step 5: sort columns by preference.
    let order = stable_sort_by_key(&candidates, &decrypted_prefs);
    let candidates: Vec<EncryptedNumber> = order.iter().map(|&i| candidates[i].clone()).collect();
    let sorted_prefs: Vec<BigUint> = order.iter().map(|&i| decrypted_prefs[i].clone()).collect();
    let eliminated: Vec<EncryptedNumber> = order.iter().map(|&i| eliminated[i].clone()).collect();

    // Step 6: re-encrypt the preference row.
    let preferences: Vec<EncryptedNumber> = sorted_prefs
        .iter()
        .map(|p| pk.encrypt_with_rng(p, rng))
        .collect::<Result<_>>()?;

    Ok(CandidateEliminationBallot {
        candidates,
        preferences,
        eliminated,
        weight: ballot.weight.clone(),
    })
}

/// `candidate_elimination -> candidate_order` (`spec.md` §4.4).
pub fn candidate_elimination_to_candidate_order(
    ballot: &CandidateEliminationBallot,
    ring: &PrivateKeyRing,
) -> Result<CandidateOrderBallot> {
    candidate_elimination_to_candidate_order_with_rng(ballot, ring, &mut default_rng())
}

/// As [`candidate_elimination_to_candidate_order`], with an injectable CSPRNG.
pub fn candidate_elimination_to_candidate_order_with_rng<R: RngCore + CryptoRng>(
    ballot: &CandidateEliminationBallot,
    ring: &PrivateKeyRing,
    rng: &mut R,
) -> Result<CandidateOrderBallot> {
    let n = ballot.candidates.len();
    if n == 0 {
        return Err(Error::EmptyInput("candidate"));
    }
    trace!(candidates = n, "restoring candidate order from candidate-elimination form");

    // Step 1: shuffle (candidates, preferences, eliminated) together; the
    // elimination tags only matter while candidate identity is still
    // encrypted, so they ride along but are discarded below.
    let perm = shuffle_permutation(n, rng);
    let candidates = apply_permutation(&ballot.candidates, &perm);
    let preferences = apply_permutation(&ballot.preferences, &perm);

    // Step 2: threshold-decrypt the candidate row.
    let decrypted_candidates: Vec<BigUint> =
        candidates.iter().map(|c| ring.decrypt(c)).collect::<Result<_>>()?;

    // Step 3: sort columns by candidate.
    let order = stable_sort_by_key(&preferences, &decrypted_candidates);
    let candidates: Vec<CandidateId> = order
        .iter()
        .map(|&i| to_candidate_id(&decrypted_candidates[i]))
        .collect();
    let preferences: Vec<EncryptedNumber> = order.iter().map(|&i| preferences[i].clone()).collect();

    Ok(CandidateOrderBallot {
        candidates,
        preferences,
        weight: ballot.weight.clone(),
    })
}
