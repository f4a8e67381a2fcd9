//! Leader-side subset generation and deterministic shuffling (§4.3, §9).

use crate::common::SubsetState;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use shardbft_crypto::{Challenge, CommitPoint, Response};
use shardbft_types::ParticipantBitmap;
use sha2::{Digest, Sha256};

/// One racing second-round cohort: a fixed-size subset of first-round
/// committers carried through both rounds of the protocol.
#[derive(Debug, Clone)]
pub struct Subset {
    /// The subset's own state machine.
    pub state: SubsetState,
    /// Round-local participation bitmap (first-round commit map, or
    /// round-two re-commit map after the round-one pivot, §4.6).
    pub commit_map: ParticipantBitmap,
    /// Commit points by committee index, `None` where not (yet) committed
    /// in the current round.
    pub commit_point_map: Vec<Option<CommitPoint>>,
    /// Commit points in arrival order, for the current round.
    pub commit_points: Vec<CommitPoint>,
    /// Responses collected for the current round.
    pub response_data: Vec<Response>,
    /// The challenge emitted for the current round, once known.
    pub challenge: Option<Challenge>,
    /// The message this subset's challenge is derived over: the original
    /// proposal in round one, the round-one collective signature in round
    /// two (§4.4, §4.6).
    pub message: Vec<u8>,
}

impl Subset {
    fn empty(n: usize) -> Self {
        Self {
            state: SubsetState::Initial,
            commit_map: ParticipantBitmap::zeroed(n),
            commit_point_map: vec![None; n],
            commit_points: Vec::new(),
            response_data: Vec::new(),
            challenge: None,
            message: Vec::new(),
        }
    }

    /// Resets the per-round commit bookkeeping (commit points, bitmap,
    /// challenge) for reuse in round two, keeping `response_data` cleared as
    /// well. Used at the round-one-to-round-two pivot (§4.6).
    pub fn reset_for_round_two(&mut self, n: usize) {
        self.commit_map = ParticipantBitmap::zeroed(n);
        self.commit_point_map = vec![None; n];
        self.commit_points.clear();
        self.response_data.clear();
        self.challenge = None;
    }
}

/// Derives the deterministic shuffle seed for subset `subset_index`:
/// `SHA-256(block_hash ‖ subset_index)`. Reproducible for audit, but
/// unpredictable to participants before the commit window closes.
#[must_use]
pub fn shuffle_seed(block_hash: &[u8; 32], subset_index: u8) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(block_hash);
    hasher.update([subset_index]);
    let digest = hasher.finalize();
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    seed
}

/// Builds `num_consensus_sets` subsets of exactly `num_for_consensus`
/// participants each, drawn from `committers` (the sorted indices of
/// backups who committed in round one) via a seeded Fisher-Yates shuffle
/// (§4.3).
///
/// # Panics
///
/// Panics if `committers.len() < num_for_consensus`, or if `commit_points`
/// is missing an entry for any committer index — both are invariants the
/// caller (leader's commit-window transition) must already have checked.
#[must_use]
pub fn generate_subsets(
    block_hash: &[u8; 32],
    committers: &[u16],
    num_for_consensus: usize,
    num_consensus_sets: u8,
    n: usize,
    commit_point_map: &[Option<CommitPoint>],
    proposal: &[u8],
) -> Vec<Subset> {
    assert!(
        committers.len() >= num_for_consensus,
        "not enough committers to build a subset"
    );

    (0..num_consensus_sets)
        .map(|k| {
            let seed = shuffle_seed(block_hash, k);
            let mut rng = ChaCha20Rng::from_seed(seed);
            let mut shuffled = committers.to_vec();
            shuffled.shuffle(&mut rng);
            shuffled.truncate(num_for_consensus);
            shuffled.sort_unstable();

            let mut subset = Subset::empty(n);
            for &idx in &shuffled {
                let point = commit_point_map[idx as usize]
                    .expect("committer index must have a recorded commit point");
                subset.commit_map.set(idx as usize);
                subset.commit_point_map[idx as usize] = Some(point);
                subset.commit_points.push(point);
            }
            subset.state = SubsetState::AnnounceDone;
            subset.message = proposal.to_vec();
            subset
        })
        .collect()
}
