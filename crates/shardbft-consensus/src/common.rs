//! Shared instance identity and the state-gating tables both roles consult
//! before mutating any state (§4.8).

use shardbft_crypto::{Keypair, Signature};
use shardbft_types::{Committee, InstanceId, ParticipantBitmap};
use std::sync::Arc;

/// Immutable context shared by the leader and backup state machines for one
/// consensus instance: identity, committee, and own signing key.
pub struct Instance {
    /// The instance identity this state machine is bound to.
    pub id: InstanceId,
    /// Ordered committee, indexed 0..N-1.
    pub committee: Committee,
    /// Own signing keypair.
    pub keypair: Arc<Keypair>,
}

impl Instance {
    /// Creates a new instance context.
    #[must_use]
    pub fn new(id: InstanceId, committee: Committee, keypair: Arc<Keypair>) -> Self {
        Self {
            id,
            committee,
            keypair,
        }
    }

    /// Committee size.
    #[must_use]
    pub fn n(&self) -> usize {
        self.committee.len()
    }

    /// Own committee index.
    #[must_use]
    pub fn my_id(&self) -> u16 {
        self.committee.my_id
    }

    /// Addresses of every committee member other than this node.
    #[must_use]
    pub fn peer_addresses(&self) -> Vec<&str> {
        self.committee
            .iter()
            .filter(|(i, _)| *i != self.my_id())
            .map(|(_, m)| m.address.as_str())
            .collect()
    }
}

/// Signals the completion of one consensus instance, carried to the host via
/// a completion callback (§6), invoked at most once.
#[derive(Debug, Clone)]
pub struct ConsensusCompletion {
    /// The original proposal bytes this instance certified.
    pub proposal_bytes: Vec<u8>,
    /// The bitmap of committee members whose contribution is part of
    /// `collective_signature`.
    pub participation_bitmap: ParticipantBitmap,
    /// The final collective signature.
    pub collective_signature: Signature,
}

/// The leader's overall per-instance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderMainState {
    /// Not yet started.
    Initial,
    /// ANNOUNCE sent, accepting commits.
    AnnounceDone,
    /// First-round challenges emitted to at least one subset.
    ChallengeDone,
    /// At least one subset has completed round one.
    CollectiveSigDone,
    /// At least one subset has emitted FINALCHALLENGE.
    FinalChallengeDone,
    /// A subset has completed round two; `final_subset_id` is set.
    Done,
    /// The instance failed (insufficient participation or crypto failure).
    Error,
}

/// The per-subset state on the leader side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsetState {
    /// Not yet populated.
    Initial,
    /// Round-one participants selected, ANNOUNCE already covers them.
    AnnounceDone,
    /// Round-one CHALLENGE emitted.
    ChallengeDone,
    /// Round-one COLLECTIVESIG emitted; round two pivoted.
    CollectiveSigDone,
    /// Round-two FINALCHALLENGE emitted.
    FinalChallengeDone,
    /// Round-two complete.
    Done,
    /// This subset failed and is abandoned; others may still succeed.
    Error,
}

/// The backup's per-instance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    /// Not yet received ANNOUNCE.
    Initial,
    /// ANNOUNCE accepted, COMMIT sent.
    AnnounceDone,
    /// CHALLENGE accepted, RESPONSE sent.
    ChallengeDone,
    /// COLLECTIVESIG accepted and verified.
    CollectiveSigDone,
    /// FINALCHALLENGE accepted, FINALRESPONSE sent.
    FinalChallengeDone,
    /// FINALCOLLECTIVESIG accepted; terminal success.
    Done,
    /// A verification or validation step failed; terminal failure.
    Error,
}

/// Leader-side actions gated by `CheckStateMain` (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainAction {
    /// Emitting the initial ANNOUNCE.
    SendAnnouncement,
    /// Accepting a first-round COMMIT.
    ProcessCommit,
    /// Accepting a RESPONSE (round one or two).
    ProcessResponse,
    /// Accepting a FINALCOMMIT.
    ProcessFinalCommit,
    /// Accepting a FINALRESPONSE.
    ProcessFinalResponse,
}

/// Returns whether `action` is permitted while the leader's overall state is
/// `state`, per the CheckStateMain table in §4.8.
#[must_use]
pub fn check_state_main(action: MainAction, state: LeaderMainState) -> bool {
    use LeaderMainState::{AnnounceDone, ChallengeDone, CollectiveSigDone, FinalChallengeDone, Initial};
    use MainAction::{
        ProcessCommit, ProcessFinalCommit, ProcessFinalResponse, ProcessResponse, SendAnnouncement,
    };
    matches!(
        (action, state),
        (SendAnnouncement, Initial)
            | (ProcessCommit, AnnounceDone)
            | (ProcessResponse, ChallengeDone)
            | (ProcessResponse, CollectiveSigDone)
            | (ProcessFinalCommit, CollectiveSigDone)
            | (ProcessFinalCommit, FinalChallengeDone)
            | (ProcessFinalResponse, FinalChallengeDone)
    )
}

/// Subset-scoped actions gated by `CheckStateSubset` (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsetAction {
    /// Accepting a RESPONSE for this subset.
    ProcessResponse,
    /// Accepting a FINALCOMMIT for this subset.
    ProcessFinalCommit,
    /// Accepting a FINALRESPONSE for this subset.
    ProcessFinalResponse,
}

/// Returns whether `action` is permitted while subset `k`'s state is
/// `state`, per the CheckStateSubset table in §4.8.
#[must_use]
pub fn check_state_subset(action: SubsetAction, state: SubsetState) -> bool {
    use SubsetAction::{ProcessFinalCommit, ProcessFinalResponse, ProcessResponse};
    use SubsetState::{ChallengeDone, CollectiveSigDone, FinalChallengeDone};
    matches!(
        (action, state),
        (ProcessResponse, ChallengeDone)
            | (ProcessFinalCommit, CollectiveSigDone)
            | (ProcessFinalResponse, FinalChallengeDone)
    )
}
