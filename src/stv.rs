//! The ShuffleSum STV tally engine (`spec.md` §2 component 6, §4.5).
//!
//! Drives rounds of first-preference tallying, Droop-quota election,
//! surplus reweighting, and lowest-candidate elimination until the
//! requested number of seats is filled. Every per-ballot step is dispatched
//! through [`crate::parallel`]; the round-to-round control flow itself stays
//! single-threaded, matching `spec.md` §5's "single-threaded cooperative
//! per-round control flow; per-ballot transforms are data-parallel".

use std::collections::HashSet;
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};
use tracing::{debug, instrument};

use crate::ballots::{
    candidate_elimination_to_candidate_order, candidate_order_to_candidate_elimination,
    candidate_order_to_first_preference, CandidateEliminationBallot, CandidateId,
    CandidateOrderBallot, FirstPreferenceBallot,
};
use crate::dj::{EncryptedNumber, PrivateKeyRing, PublicKey};
use crate::error::{Error, Result};
use crate::math::lcm;
use crate::parallel::{par_map, try_par_map, with_thread_pool, ProgressConfig};

/// Tuning knobs for a tally run: whether to render progress bars and how
/// many rayon worker threads to use.
///
/// `spec.md` §5 specifies the ballot-level worker pool but leaves its sizing
/// and observability as an implementation choice; this mirrors the
/// `rayon`+`indicatif` pairing the orchestration harness is grounded on.
#[derive(Clone, Debug, Default)]
pub struct TallyConfig {
    pub progress: ProgressConfig,
    /// `None` uses rayon's global pool.
    pub n_threads: Option<usize>,
}

/// Converts every ballot to first-preference form, sums per-candidate
/// weights homomorphically, and threshold-decrypts the column sums.
///
/// Assumes every ballot carries the same candidate list in the same
/// (ascending) order, and that there is at least one ballot.
pub fn compute_first_preference_tallies(
    cob_ballots: &[CandidateOrderBallot],
    ring: &PrivateKeyRing,
    pk: &Arc<PublicKey>,
    config: &TallyConfig,
) -> Result<(Vec<FirstPreferenceBallot>, Vec<BigUint>)> {
    if cob_ballots.is_empty() {
        return Err(Error::EmptyInput("ballot"));
    }
    let num_candidates = cob_ballots[0].candidates.len();

    let fpb_ballots = try_par_map(
        cob_ballots,
        &config.progress,
        "converting ballots to first-preference form",
        |cob| candidate_order_to_first_preference(cob, ring, pk),
    )?;

    let zero = pk.encrypt(&BigUint::zero())?;
    let mut encrypted_tallies = vec![zero; num_candidates];
    for fpb in &fpb_ballots {
        if fpb.candidates.len() != num_candidates {
            return Err(Error::InconsistentCandidates);
        }
        for (tally, weight) in encrypted_tallies.iter_mut().zip(&fpb.weights) {
            *tally = tally.add(weight)?;
        }
    }

    let decrypted_tallies = ring.decrypt_many(&encrypted_tallies)?;

    Ok((fpb_ballots, decrypted_tallies))
}

/// Reweights a single ballot's first-preference weights and converts it
/// back into candidate-order form (`spec.md` §4.5 step 3c).
pub fn reweight_and_convert_ballot(
    fpb: &FirstPreferenceBallot,
    d_lcm: &BigUint,
    elected: &HashSet<CandidateId>,
    tallies: &[BigUint],
    quota: &BigUint,
    zero: &EncryptedNumber,
) -> Result<CandidateOrderBallot> {
    let d_lcm_signed = BigInt::from(d_lcm.clone());
    let mut new_weight = zero.clone();

    for i in 0..fpb.candidates.len() {
        let mut weight = fpb.weights[i].mul_scalar(&d_lcm_signed)?;

        if elected.contains(&fpb.candidates[i]) {
            let surplus = BigInt::from(tallies[i].clone()) - BigInt::from(quota.clone());
            weight = weight.mul_scalar(&surplus)?;
            weight = weight.div_scalar(&BigInt::from(tallies[i].clone()))?;
        }

        new_weight = new_weight.add(&weight)?;
    }

    Ok(CandidateOrderBallot {
        candidates: fpb.candidates.clone(),
        preferences: fpb.preferences.clone(),
        weight: new_weight,
    })
}

/// Reweights every ballot for the just-elected `elected` set at `quota`,
/// returning the new candidate-order ballots and the scaling factor `D`
/// the running quota must be multiplied by (`spec.md` §4.5 step 3c).
#[instrument(skip_all, fields(ballots = fpb_ballots.len(), elected = elected.len()))]
pub fn reweight_votes(
    fpb_ballots: &[FirstPreferenceBallot],
    elected: &HashSet<CandidateId>,
    quota: &BigUint,
    tallies: &[BigUint],
    pk: &Arc<PublicKey>,
    config: &TallyConfig,
) -> Result<(Vec<CandidateOrderBallot>, BigUint)> {
    if fpb_ballots.is_empty() {
        return Err(Error::EmptyInput("ballot"));
    }

    let candidates = &fpb_ballots[0].candidates;
    let elected_tallies: Vec<BigUint> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| elected.contains(c))
        .map(|(i, _)| tallies[i].clone())
        .collect();
    let d_lcm = lcm(&elected_tallies);
    debug!(%d_lcm, "scaling quota by D before eliminating the elected set");

    let zero = pk.encrypt(&BigUint::zero())?;
    let cob_ballots = try_par_map(
        fpb_ballots,
        &config.progress,
        "reweighting votes",
        |fpb| reweight_and_convert_ballot(fpb, &d_lcm, elected, tallies, quota, &zero),
    )?;

    Ok((cob_ballots, d_lcm))
}

/// Shifts each preference down by the running count of eliminated
/// candidates ranked above it (`spec.md` §4.5, "Eliminate candidate set").
pub fn update_preferences(
    ceb: &CandidateEliminationBallot,
    zero: &EncryptedNumber,
) -> Result<CandidateEliminationBallot> {
    let mut prefix_sum = zero.clone();
    let mut preferences = Vec::with_capacity(ceb.preferences.len());

    for i in 0..ceb.candidates.len() {
        prefix_sum = prefix_sum.add(&ceb.eliminated[i])?;
        preferences.push(ceb.preferences[i].sub(&prefix_sum)?);
    }

    Ok(CandidateEliminationBallot {
        candidates: ceb.candidates.clone(),
        preferences,
        eliminated: ceb.eliminated.clone(),
        weight: ceb.weight.clone(),
    })
}

/// Drops the columns at `remaining_indices`, in order, from a ballot.
pub fn remove_candidates(
    cob: &CandidateOrderBallot,
    remaining_indices: &[usize],
) -> CandidateOrderBallot {
    CandidateOrderBallot {
        candidates: remaining_indices.iter().map(|&i| cob.candidates[i]).collect(),
        preferences: remaining_indices
            .iter()
            .map(|&i| cob.preferences[i].clone())
            .collect(),
        weight: cob.weight.clone(),
    }
}

/// Eliminates every candidate in `candidate_set` from every ballot
/// (`spec.md` §4.5, "Eliminate candidate set"): tags columns, shifts
/// preferences past eliminated candidates, then drops the tagged columns.
#[instrument(skip_all, fields(candidates_eliminated = candidate_set.len(), ballots = cob_ballots.len()))]
pub fn eliminate_candidate_set(
    candidate_set: &HashSet<CandidateId>,
    cob_ballots: &[CandidateOrderBallot],
    ring: &PrivateKeyRing,
    pk: &Arc<PublicKey>,
    config: &TallyConfig,
) -> Result<Vec<CandidateOrderBallot>> {
    if cob_ballots.is_empty() {
        return Ok(Vec::new());
    }

    let num_candidates = cob_ballots[0].candidates.len();
    let eliminated: Vec<u8> = cob_ballots[0]
        .candidates
        .iter()
        .map(|c| u8::from(candidate_set.contains(c)))
        .collect();
    let remaining_indices: Vec<usize> =
        (0..num_candidates).filter(|&i| eliminated[i] == 0).collect();

    let zero = pk.encrypt(&BigUint::zero())?;

    let ceb_ballots = try_par_map(
        cob_ballots,
        &config.progress,
        "tagging eliminated candidates",
        |cob| candidate_order_to_candidate_elimination(cob, &eliminated, ring, pk),
    )?;

    let ceb_ballots = try_par_map(
        &ceb_ballots,
        &config.progress,
        "shifting preferences past eliminated candidates",
        |ceb| update_preferences(ceb, &zero),
    )?;

    let cob_ballots = try_par_map(
        &ceb_ballots,
        &config.progress,
        "restoring candidate order",
        |ceb| candidate_elimination_to_candidate_order(ceb, ring),
    )?;

    let cob_ballots = par_map(
        &cob_ballots,
        &config.progress,
        "dropping eliminated columns",
        |cob| remove_candidates(cob, &remaining_indices),
    );

    Ok(cob_ballots)
}

/// Runs the ShuffleSum STV tally (`spec.md` §4.5) and returns the elected
/// candidates in election order.
///
/// Assumes `ballots` is non-empty and every ballot shares the same
/// candidate list, given in ascending sorted order (the canonical column
/// order produced by [`candidate_order_to_first_preference`]).
#[instrument(skip_all, fields(ballots = ballots.len(), seats))]
pub fn stv_tally(
    ballots: &[CandidateOrderBallot],
    seats: u32,
    stop_candidate: CandidateId,
    ring: &PrivateKeyRing,
    pk: &Arc<PublicKey>,
    config: &TallyConfig,
) -> Result<Vec<CandidateId>> {
    if ballots.is_empty() {
        return Err(Error::EmptyInput("ballot"));
    }
    if seats < 1 {
        return Err(Error::InvalidSeatCount);
    }

    with_thread_pool(config.n_threads, || {
        stv_tally_inner(ballots, seats, stop_candidate, ring, pk, config)
    })
}

fn stv_tally_inner(
    ballots: &[CandidateOrderBallot],
    seats: u32,
    stop_candidate: CandidateId,
    ring: &PrivateKeyRing,
    pk: &Arc<PublicKey>,
    config: &TallyConfig,
) -> Result<Vec<CandidateId>> {
    let mut cob_ballots = ballots.to_vec();
    let mut c_rem = cob_ballots[0].candidates.clone();
    let offset = usize::from(c_rem.contains(&stop_candidate));
    let mut quota =
        BigUint::from(ballots.len() as u64) / BigUint::from((seats + 1) as u64) + BigUint::one();
    let mut seats_remaining = seats;
    let mut result: Vec<CandidateId> = Vec::new();

    let mut round = 0u32;
    while c_rem.len().saturating_sub(offset) > seats_remaining as usize {
        round += 1;
        debug!(round, remaining_candidates = c_rem.len(), %quota, "starting STV round");

        let (fpb_ballots, tallies) =
            compute_first_preference_tallies(&cob_ballots, ring, pk, config)?;

        let mut elected: HashSet<CandidateId> = HashSet::new();
        for (i, &c) in c_rem.iter().enumerate() {
            if c == stop_candidate {
                continue;
            }
            if tallies[i] >= quota {
                elected.insert(c);
            }
        }

        if elected.is_empty() {
            let mut lowest: Option<usize> = None;
            for (j, &c) in c_rem.iter().enumerate() {
                if c == stop_candidate {
                    continue;
                }
                let replace = match lowest {
                    None => true,
                    Some(i) => tallies[j] < tallies[i],
                };
                if replace {
                    lowest = Some(j);
                }
            }
            let lowest = lowest.expect("at least one non-stop candidate remains in the loop");
            debug!(round, eliminated = c_rem[lowest], "no candidate met quota; eliminating lowest tally");
            let mut losers = HashSet::new();
            losers.insert(c_rem[lowest]);
            cob_ballots = eliminate_candidate_set(&losers, &cob_ballots, ring, pk, config)?;
        } else {
            debug!(round, elected = elected.len(), "quota met; electing candidates");
            result.extend(c_rem.iter().copied().filter(|c| elected.contains(c)));
            seats_remaining = seats_remaining.saturating_sub(elected.len() as u32);

            let (reweighted, d_lcm) =
                reweight_votes(&fpb_ballots, &elected, &quota, &tallies, pk, config)?;
            quota = &quota * &d_lcm;
            cob_ballots = eliminate_candidate_set(&elected, &reweighted, ring, pk, config)?;
        }

        if cob_ballots.is_empty() {
            return Err(Error::EmptyInput("ballot"));
        }
        c_rem = cob_ballots[0].candidates.clone();
    }

    result.extend(c_rem.into_iter().filter(|&c| c != stop_candidate));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dj::{keygen_with_rng, KeygenConfig};
    use crate::primes::MillerRabinConfig;
    use crate::rng::seeded_rng;

    fn tiny_config() -> KeygenConfig {
        KeygenConfig {
            n_bits: 40,
            s: 1,
            threshold: 2,
            n_shares: 3,
            miller_rabin: MillerRabinConfig { rounds: 20 },
        }
    }

    fn encrypted_prefs(
        pk: &Arc<PublicKey>,
        prefs: &[u64],
        rng: &mut impl rand::RngCore,
    ) -> Vec<EncryptedNumber> {
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
        rng: &mut impl rand::RngCore,
    ) -> CandidateOrderBallot {
        CandidateOrderBallot {
            candidates: candidates.to_vec(),
            preferences: encrypted_prefs(pk, prefs, rng),
            weight: pk.encrypt_with_rng(&BigUint::from(weight), rng).unwrap(),
        }
    }

    #[test]
    fn single_ballot_first_preference_tally() {
        let mut rng = seeded_rng(31);
        let (pk, ring) = keygen_with_rng(tiny_config(), &mut rng).unwrap();

        let b = ballot(&pk, &[1, 2, 3], &[3, 1, 2], 8, &mut rng);
        let config = TallyConfig::default();
        let (_fpb, tallies) =
            compute_first_preference_tallies(&[b], &ring, &pk, &config).unwrap();

        assert_eq!(tallies, vec![BigUint::zero(), BigUint::from(8u32), BigUint::zero()]);
    }

    #[test]
    fn eliminating_a_candidate_shifts_preferences() {
        let mut rng = seeded_rng(32);
        let (pk, ring) = keygen_with_rng(tiny_config(), &mut rng).unwrap();

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
    }

    #[test]
    fn stv_tally_elects_the_candidate_with_the_most_first_preferences() {
        let mut rng = seeded_rng(33);
        let (pk, ring) = keygen_with_rng(tiny_config(), &mut rng).unwrap();

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

    #[test]
    fn rejects_empty_ballots() {
        let mut rng = seeded_rng(34);
        let (pk, ring) = keygen_with_rng(tiny_config(), &mut rng).unwrap();
        let config = TallyConfig::default();
        assert!(matches!(
            stv_tally(&[], 1, 99, &ring, &pk, &config),
            Err(Error::EmptyInput(_))
        ));
    }
}
