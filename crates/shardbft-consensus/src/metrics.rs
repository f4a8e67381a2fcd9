//! Lightweight, snapshot-based state exposure for observability: a small
//! `Copy`/`Clone` struct the host can poll or periodically log, rather than
//! a push-based metrics registry baked into the protocol core.

use crate::common::LeaderMainState;

/// A point-in-time snapshot of a leader instance's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderSnapshot {
    /// Overall leader state.
    pub state: LeaderMainState,
    /// Number of accepted first-round commits so far.
    pub commit_counter: u32,
    /// Number of racing subsets configured for this instance.
    pub num_subsets: u8,
    /// The subset that completed round two first, if any.
    pub final_subset_id: Option<u8>,
}

/// A point-in-time snapshot of a backup instance's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupSnapshot {
    /// Current backup state.
    pub state: crate::common::BackupState,
    /// The subset this backup was assigned to, once known.
    pub subset_id: Option<u8>,
}
