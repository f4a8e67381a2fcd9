//! Tunable consensus parameters.

use serde::{Deserialize, Serialize};

/// Consensus parameters, deserializable from the host's configuration file.
///
/// `num_for_consensus` is derived, not configured directly:
/// `N − (⌈N·(1−f)⌉ − 1) − 1`, with `f = tolerance_fraction`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// How long the leader waits for first-round commits, in milliseconds.
    pub commit_window_ms: u64,

    /// Number of racing second-round subsets.
    pub num_consensus_sets: u8,

    /// Minimum fraction of the committee that must commit before the
    /// instance proceeds.
    pub tolerance_fraction: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            commit_window_ms: 30_000,
            num_consensus_sets: 1,
            tolerance_fraction: 0.667,
        }
    }
}

impl ConsensusConfig {
    /// Derives `num_for_consensus` for a committee of size `n`:
    /// `N − (⌈N·(1−f)⌉ − 1) − 1`, clamped to `[1, n]`.
    #[must_use]
    pub fn num_for_consensus(&self, n: usize) -> usize {
        let n_f = n as f64;
        let ceil_term = (n_f * (1.0 - self.tolerance_fraction)).ceil() as i64;
        let raw = n as i64 - (ceil_term - 1) - 1;
        raw.clamp(1, n as i64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_for_consensus_applies_tolerance_formula() {
        let cfg = ConsensusConfig::default();
        // N=7, tolerance=0.667 -> ceil(7*0.333)=3 -> 7-(3-1)-1=4
        assert_eq!(cfg.num_for_consensus(7), 4);
        // N=10 -> ceil(10*0.333)=4 -> 10-(4-1)-1=6
        assert_eq!(cfg.num_for_consensus(10), 6);
    }

    #[test]
    fn num_for_consensus_never_exceeds_committee() {
        let cfg = ConsensusConfig {
            tolerance_fraction: 0.0,
            ..ConsensusConfig::default()
        };
        assert!(cfg.num_for_consensus(3) <= 3);
    }
}
