//! Leader-side state machine: round-one commit collection, subset
//! generation, challenge emission, response collection, and the round-two
//! pivot (§4.2–§4.8).

use crate::common::{
    check_state_main, check_state_subset, ConsensusCompletion, Instance, LeaderMainState,
    MainAction, SubsetAction, SubsetState,
};
use crate::config::ConsensusConfig;
use crate::error::{ConsensusError, RejectReason, Result};
use crate::metrics::LeaderSnapshot;
use crate::subset::{generate_subsets, Subset};
use crate::wire::{
    ChallengeBody, CollectiveSigBody, CommitBody, FinalCommitBody, Frame, ResponseBody,
};
use parking_lot::Mutex;
use shardbft_crypto::{
    aggregate_commits, aggregate_keys, aggregate_responses, derive_challenge, verify_collective,
    verify_partial_response, CommitPoint, PublicKey, Signature,
};
use shardbft_net::{Router, TimerService, Transport};
use shardbft_types::ParticipantBitmap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The commit-window sub-FSM (§5): advanced by the timer callback, but the
/// actual state transition it enables runs inline in `on_message` under the
/// main instance mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitProcessingState {
    AcceptingCommits,
    CommitTimerExpired,
    CommitListsGenerated,
}

struct LeaderInner {
    state: LeaderMainState,
    commit_point_map: Vec<Option<CommitPoint>>,
    commit_counter: u32,
    proposal: Vec<u8>,
    subsets: Vec<Subset>,
    response_map_subsets: Vec<ParticipantBitmap>,
    subset_collective_sigs: Vec<Option<Signature>>,
    final_subset_id: Option<u8>,
}

impl LeaderInner {
    fn new(n: usize) -> Self {
        Self {
            state: LeaderMainState::Initial,
            commit_point_map: vec![None; n],
            commit_counter: 0,
            proposal: Vec::new(),
            subsets: Vec::new(),
            response_map_subsets: Vec::new(),
            subset_collective_sigs: Vec::new(),
            final_subset_id: None,
        }
    }
}

/// Drives one consensus instance from the leader's side.
pub struct ConsensusLeader {
    instance: Instance,
    config: ConsensusConfig,
    transport: Arc<dyn Transport>,
    timer: Arc<dyn TimerService>,
    on_complete: Arc<dyn Fn(ConsensusCompletion) + Send + Sync>,
    inner: Mutex<LeaderInner>,
    commit_processing: Mutex<CommitProcessingState>,
}

impl ConsensusLeader {
    /// Creates a new leader-side instance, in state `INITIAL`.
    pub fn new(
        instance: Instance,
        config: ConsensusConfig,
        transport: Arc<dyn Transport>,
        timer: Arc<dyn TimerService>,
        on_complete: impl Fn(ConsensusCompletion) + Send + Sync + 'static,
    ) -> Self {
        let n = instance.n();
        Self {
            instance,
            config,
            transport,
            timer,
            on_complete: Arc::new(on_complete),
            inner: Mutex::new(LeaderInner::new(n)),
            commit_processing: Mutex::new(CommitProcessingState::AcceptingCommits),
        }
    }

    /// A point-in-time snapshot of this instance's progress, for the host to
    /// poll or log periodically.
    #[must_use]
    pub fn snapshot(&self) -> LeaderSnapshot {
        let inner = self.inner.lock();
        LeaderSnapshot {
            state: inner.state,
            commit_counter: inner.commit_counter,
            num_subsets: inner.subsets.len() as u8,
            final_subset_id: inner.final_subset_id,
        }
    }

    /// Assembles and multicasts ANNOUNCE, then arms the commit-window timer.
    ///
    /// # Errors
    ///
    /// Returns `ConsensusError::AlreadyStarted` if called more than once.
    pub fn start_consensus(self: &Arc<Self>, proposal: Vec<u8>) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if !check_state_main(MainAction::SendAnnouncement, inner.state) {
                return Err(ConsensusError::AlreadyStarted(self.instance.id.to_string()));
            }
            inner.proposal = proposal.clone();
            inner.commit_counter = 0;
            inner.state = LeaderMainState::AnnounceDone;
        }

        let body = crate::wire::AnnounceBody::signed(
            self.instance.id.consensus_id,
            self.instance.id.block_hash,
            self.instance.my_id(),
            proposal,
            &self.instance.keypair,
        );
        let bytes = Frame::Announce(body)
            .encode(self.instance.id.class_byte, self.instance.id.instruction_byte);
        self.transport.multicast(&self.instance.peer_addresses(), bytes);
        info!(instance = %self.instance.id, "announced proposal, awaiting commits");

        let this = Arc::clone(self);
        let delay_ms = self.config.commit_window_ms;
        self.timer.schedule(
            delay_ms,
            Box::new(move || {
                let mut processing = this.commit_processing.lock();
                if *processing == CommitProcessingState::AcceptingCommits {
                    *processing = CommitProcessingState::CommitTimerExpired;
                    debug!(instance = %this.instance.id, "commit window closed");
                }
            }),
        );
        Ok(())
    }

    /// Handles one inbound frame addressed to this instance.
    ///
    /// Returns `true` if the frame matched this instance's identity and
    /// namespace (whether or not it was ultimately accepted), `false` if it
    /// belongs to a different instance entirely and the caller should try
    /// routing it elsewhere.
    #[must_use]
    pub fn on_message(&self, bytes: &[u8], from: &str) -> bool {
        let (class_byte, instruction_byte, frame) = match Frame::decode(bytes) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(from, error = %err, reason = %RejectReason::Malformed, "dropped frame");
                return false;
            }
        };
        if class_byte != self.instance.id.class_byte
            || instruction_byte != self.instance.id.instruction_byte
        {
            return false;
        }
        if !self
            .instance
            .id
            .matches(frame.consensus_id(), &frame.block_hash())
        {
            debug!(from, reason = %RejectReason::WrongInstance, "dropped frame");
            return false;
        }

        match frame {
            Frame::Commit(body) => self.handle_commit(body),
            Frame::Response(body) => self.handle_response(body, false),
            Frame::FinalResponse(body) => self.handle_response(body, true),
            Frame::FinalCommit(body) => self.handle_final_commit(body),
            other => debug!(from, kind = %other.kind(), "leader does not accept this message kind"),
        }
        true
    }

    fn verify_sender(&self, sender_id: u16, payload: &[u8], sig: &Signature) -> Option<PublicKey> {
        let member = self.instance.committee.member(sender_id)?;
        if member.public_key.verify(payload, sig).is_err() {
            return None;
        }
        Some(member.public_key)
    }

    fn handle_commit(&self, body: CommitBody) {
        let payload = body.unsigned_payload();
        if self
            .verify_sender(body.backup_id, &payload, &body.sender_sig)
            .is_none()
        {
            warn!(backup_id = body.backup_id, reason = %RejectReason::AuthFailure, "bad COMMIT signature");
            return;
        }

        let mut inner = self.inner.lock();
        if !check_state_main(MainAction::ProcessCommit, inner.state) {
            debug!(backup_id = body.backup_id, reason = %RejectReason::OutOfPhase, "COMMIT out of phase");
            return;
        }

        let processing = *self.commit_processing.lock();
        match processing {
            CommitProcessingState::AcceptingCommits => {
                self.accept_commit(&mut inner, body);
            }
            CommitProcessingState::CommitTimerExpired => {
                self.transition_after_commit_window(&mut inner);
            }
            CommitProcessingState::CommitListsGenerated => {
                debug!(backup_id = body.backup_id, "late COMMIT after subsets generated, dropped");
            }
        }
    }

    fn accept_commit(&self, inner: &mut LeaderInner, body: CommitBody) {
        let idx = body.backup_id as usize;
        if idx >= inner.commit_point_map.len() || inner.commit_point_map[idx].is_some() {
            debug!(backup_id = body.backup_id, reason = %RejectReason::DuplicateOrUnknownSender, "COMMIT rejected");
            return;
        }
        inner.commit_point_map[idx] = Some(body.commit_point);
        inner.commit_counter += 1;
        debug!(backup_id = body.backup_id, commit_counter = inner.commit_counter, "COMMIT accepted");
    }

    /// Performs the timer-triggered subset generation and first-round
    /// challenge burst (§4.2, §4.3, §4.4). Runs inline under `self.inner`'s
    /// lock, triggered by the next COMMIT to arrive after expiry.
    fn transition_after_commit_window(&self, inner: &mut LeaderInner) {
        let n = self.instance.n();
        let num_for_consensus = self.config.num_for_consensus(n);
        if (inner.commit_counter as usize) < num_for_consensus {
            warn!(
                instance = %self.instance.id,
                commit_counter = inner.commit_counter,
                num_for_consensus,
                "insufficient participation, instance failed"
            );
            inner.state = LeaderMainState::Error;
            *self.commit_processing.lock() = CommitProcessingState::CommitListsGenerated;
            return;
        }

        let mut committers: Vec<u16> = inner
            .commit_point_map
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|_| i as u16))
            .collect();
        committers.sort_unstable();

        let subsets = generate_subsets(
            &self.instance.id.block_hash,
            &committers,
            num_for_consensus,
            self.config.num_consensus_sets,
            n,
            &inner.commit_point_map,
            &inner.proposal,
        );
        inner.response_map_subsets = subsets.iter().map(|_| ParticipantBitmap::zeroed(n)).collect();
        inner.subset_collective_sigs = vec![None; subsets.len()];
        inner.subsets = subsets;
        inner.commit_point_map = vec![None; n];

        self.emit_challenges(inner, false);
        inner.state = LeaderMainState::ChallengeDone;
        *self.commit_processing.lock() = CommitProcessingState::CommitListsGenerated;
    }

    /// Emits CHALLENGE (round one, `round_two = false`) or FINALCHALLENGE
    /// (round two) for every subset still awaiting it (§4.4).
    fn emit_challenges(&self, inner: &mut LeaderInner, round_two: bool) {
        for k in 0..inner.subsets.len() {
            if let Err(reason) = self.emit_challenge_for_subset(inner, k as u8, round_two) {
                warn!(subset_id = k, reason, "challenge emission failed, subset abandoned");
                inner.subsets[k].state = SubsetState::Error;
            }
        }
    }

    fn emit_challenge_for_subset(
        &self,
        inner: &mut LeaderInner,
        subset_id: u8,
        round_two: bool,
    ) -> std::result::Result<(), &'static str> {
        let k = subset_id as usize;
        let subset = &inner.subsets[k];

        let agg_commit =
            aggregate_commits(&subset.commit_points).map_err(|_| "aggregate commit failed")?;
        let member_keys: Vec<PublicKey> = subset
            .commit_map
            .iter_set()
            .filter_map(|i| self.instance.committee.member(i as u16).map(|m| m.public_key))
            .collect();
        let agg_key = aggregate_keys(&member_keys).map_err(|_| "aggregate key failed")?;
        let challenge = derive_challenge(&subset.message, &agg_commit, &agg_key);

        let body = ChallengeBody::signed(
            self.instance.id.consensus_id,
            self.instance.id.block_hash,
            self.instance.my_id(),
            subset_id,
            agg_commit,
            agg_key,
            challenge,
            &self.instance.keypair,
        );
        let frame = if round_two {
            Frame::FinalChallenge(body)
        } else {
            Frame::Challenge(body)
        };
        let bytes = frame.encode(self.instance.id.class_byte, self.instance.id.instruction_byte);
        let targets: Vec<&str> = subset
            .commit_map
            .iter_set()
            .filter_map(|i| self.instance.committee.member(i as u16).map(|m| m.address.as_str()))
            .collect();
        self.transport.multicast(&targets, bytes);

        let subset = &mut inner.subsets[k];
        subset.challenge = Some(challenge);
        subset.state = if round_two {
            SubsetState::FinalChallengeDone
        } else {
            SubsetState::ChallengeDone
        };
        Ok(())
    }

    fn handle_response(&self, body: ResponseBody, round_two: bool) {
        let payload = body.unsigned_payload();
        let Some(sender_key) = self.verify_sender(body.backup_id, &payload, &body.sender_sig)
        else {
            warn!(backup_id = body.backup_id, reason = %RejectReason::AuthFailure, "bad RESPONSE signature");
            return;
        };

        let mut inner = self.inner.lock();
        let main_action = if round_two {
            MainAction::ProcessFinalResponse
        } else {
            MainAction::ProcessResponse
        };
        if !check_state_main(main_action, inner.state) {
            debug!(backup_id = body.backup_id, reason = %RejectReason::OutOfPhase, "RESPONSE out of phase");
            return;
        }

        let k = body.subset_id as usize;
        let Some(subset) = inner.subsets.get(k) else {
            debug!(subset_id = body.subset_id, "RESPONSE for unknown subset");
            return;
        };
        let subset_action = SubsetAction::ProcessResponse;
        if !check_state_subset(subset_action, subset.state) {
            debug!(
                backup_id = body.backup_id,
                subset_id = body.subset_id,
                reason = %RejectReason::OutOfPhase,
                "RESPONSE out of phase for subset"
            );
            return;
        }

        let idx = body.backup_id as usize;
        if !subset.commit_map.get(idx) || inner.response_map_subsets[k].get(idx) {
            debug!(
                backup_id = body.backup_id,
                subset_id = body.subset_id,
                reason = %RejectReason::DuplicateOrUnknownSender,
                "RESPONSE rejected"
            );
            return;
        }
        let Some(challenge) = subset.challenge else {
            debug!(subset_id = body.subset_id, "RESPONSE before challenge recorded");
            return;
        };
        let Some(commit_point) = subset.commit_point_map[idx] else {
            debug!(backup_id = body.backup_id, "RESPONSE with no matching commit point");
            return;
        };
        if verify_partial_response(&body.response, &challenge, &commit_point, &sender_key).is_err() {
            warn!(
                backup_id = body.backup_id,
                subset_id = body.subset_id,
                reason = %RejectReason::AuthFailure,
                "RESPONSE failed partial verification"
            );
            return;
        }

        let subset = &mut inner.subsets[k];
        subset.response_data.push(body.response);
        inner.response_map_subsets[k].set(idx);
        debug!(
            backup_id = body.backup_id,
            subset_id = body.subset_id,
            collected = inner.subsets[k].response_data.len(),
            needed = inner.subsets[k].commit_points.len(),
            "RESPONSE accepted"
        );

        if inner.subsets[k].response_data.len() == inner.subsets[k].commit_points.len() {
            self.complete_subset_round(&mut inner, k as u8, round_two);
        }
    }

    /// Aggregates responses for a completed subset round, verifies the
    /// resulting collective signature, emits COLLECTIVESIG/FINALCOLLECTIVESIG,
    /// and pivots the subset into round two (or signals completion) (§4.6).
    fn complete_subset_round(&self, inner: &mut LeaderInner, subset_id: u8, round_two: bool) {
        let k = subset_id as usize;
        let Some(challenge) = inner.subsets[k].challenge else {
            inner.subsets[k].state = SubsetState::Error;
            return;
        };

        let agg_response = match aggregate_responses(&inner.subsets[k].response_data) {
            Ok(r) => r,
            Err(_) => {
                warn!(subset_id, "response aggregation failed");
                inner.subsets[k].state = SubsetState::Error;
                return;
            }
        };
        let member_keys: Vec<PublicKey> = inner.response_map_subsets[k]
            .iter_set()
            .filter_map(|i| self.instance.committee.member(i as u16).map(|m| m.public_key))
            .collect();
        let agg_key = match aggregate_keys(&member_keys) {
            Ok(k) => k,
            Err(_) => {
                warn!(subset_id, "key aggregation failed");
                inner.subsets[k].state = SubsetState::Error;
                return;
            }
        };
        let collective_sig = Signature::new(challenge, agg_response);
        if verify_collective(&inner.subsets[k].message, &agg_key, &collective_sig).is_err() {
            warn!(subset_id, "collective signature failed self-verification");
            inner.subsets[k].state = SubsetState::Error;
            return;
        }
        inner.subset_collective_sigs[k] = Some(collective_sig);

        let bitmap = inner.response_map_subsets[k].clone();
        let body = CollectiveSigBody::signed(
            self.instance.id.consensus_id,
            self.instance.id.block_hash,
            self.instance.my_id(),
            subset_id,
            bitmap.clone(),
            collective_sig,
            &self.instance.keypair,
        );

        if round_two {
            inner.subsets[k].state = SubsetState::Done;
            let frame = Frame::FinalCollectiveSig(body);
            let bytes =
                frame.encode(self.instance.id.class_byte, self.instance.id.instruction_byte);
            self.transport.multicast(&self.instance.peer_addresses(), bytes);

            if inner.final_subset_id.is_none() {
                inner.final_subset_id = Some(subset_id);
                inner.state = LeaderMainState::Done;
                info!(instance = %self.instance.id, subset_id, "consensus complete");
                (self.on_complete)(ConsensusCompletion {
                    proposal_bytes: inner.proposal.clone(),
                    participation_bitmap: bitmap,
                    collective_signature: collective_sig,
                });
            }
        } else {
            let n = self.instance.n();
            inner.subsets[k].state = SubsetState::CollectiveSigDone;
            inner.subsets[k].reset_for_round_two(n);
            inner.subsets[k].message = collective_sig.as_bytes().to_vec();

            let frame = Frame::CollectiveSig(body);
            let bytes =
                frame.encode(self.instance.id.class_byte, self.instance.id.instruction_byte);
            let targets: Vec<&str> = bitmap
                .iter_set()
                .filter_map(|i| self.instance.committee.member(i as u16).map(|m| m.address.as_str()))
                .collect();
            self.transport.multicast(&targets, bytes);

            if inner.state == LeaderMainState::ChallengeDone {
                inner.state = LeaderMainState::CollectiveSigDone;
            }
        }
    }

    fn handle_final_commit(&self, body: FinalCommitBody) {
        let payload = body.unsigned_payload();
        if self
            .verify_sender(body.backup_id, &payload, &body.sender_sig)
            .is_none()
        {
            warn!(backup_id = body.backup_id, reason = %RejectReason::AuthFailure, "bad FINALCOMMIT signature");
            return;
        }

        let mut inner = self.inner.lock();
        if !check_state_main(MainAction::ProcessFinalCommit, inner.state) {
            debug!(backup_id = body.backup_id, reason = %RejectReason::OutOfPhase, "FINALCOMMIT out of phase");
            return;
        }
        let k = body.subset_id as usize;
        let Some(subset) = inner.subsets.get(k) else {
            debug!(subset_id = body.subset_id, "FINALCOMMIT for unknown subset");
            return;
        };
        if !check_state_subset(SubsetAction::ProcessFinalCommit, subset.state) {
            debug!(
                subset_id = body.subset_id,
                reason = %RejectReason::OutOfPhase,
                "FINALCOMMIT out of phase for subset"
            );
            return;
        }

        let idx = body.backup_id as usize;
        if !inner.response_map_subsets[k].get(idx) {
            debug!(
                backup_id = body.backup_id,
                reason = %RejectReason::DuplicateOrUnknownSender,
                "FINALCOMMIT from non round-one participant"
            );
            return;
        }
        if inner.subsets[k].commit_map.get(idx) {
            debug!(backup_id = body.backup_id, reason = %RejectReason::DuplicateOrUnknownSender, "duplicate FINALCOMMIT");
            return;
        }

        let subset = &mut inner.subsets[k];
        subset.commit_map.set(idx);
        subset.commit_point_map[idx] = Some(body.commit_point);
        subset.commit_points.push(body.commit_point);
        debug!(
            backup_id = body.backup_id,
            subset_id = body.subset_id,
            collected = subset.commit_points.len(),
            "FINALCOMMIT accepted"
        );

        let expected = inner.response_map_subsets[k].popcount();
        if inner.subsets[k].commit_points.len() == expected {
            if let Err(reason) = self.emit_challenge_for_subset(&mut inner, k as u8, true) {
                warn!(subset_id = k, reason, "round-two challenge emission failed");
                inner.subsets[k].state = SubsetState::Error;
                return;
            }
            if inner.state == LeaderMainState::CollectiveSigDone {
                inner.state = LeaderMainState::FinalChallengeDone;
            }
        }
    }
}

impl Router for ConsensusLeader {
    fn on_message(&self, bytes: &[u8], from: &str) {
        let _ = ConsensusLeader::on_message(self, bytes, from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Frame, ResponseBody};
    use shardbft_crypto::{CommitPoint, Response};
    use shardbft_net::NetError;
    use shardbft_types::{Committee, InstanceId, Member};

    struct DiscardTransport;
    impl Transport for DiscardTransport {
        fn unicast(&self, _peer: &str, _bytes: Vec<u8>) -> shardbft_net::Result<()> {
            Ok(())
        }
    }

    struct NoopTimer;
    impl TimerService for NoopTimer {
        fn schedule(&self, _delay_ms: u64, _callback: Box<dyn FnOnce() + Send>) -> Arc<dyn shardbft_net::TimerHandle> {
            struct NoopHandle;
            impl shardbft_net::TimerHandle for NoopHandle {
                fn cancel(&self) {}
            }
            Arc::new(NoopHandle)
        }
    }

    fn make_leader(n: usize, config: ConsensusConfig) -> (Arc<ConsensusLeader>, Vec<Arc<shardbft_crypto::Keypair>>) {
        let keypairs: Vec<Arc<shardbft_crypto::Keypair>> =
            (0..n).map(|_| Arc::new(shardbft_crypto::Keypair::generate())).collect();
        let members: Vec<Member> = keypairs
            .iter()
            .enumerate()
            .map(|(i, kp)| Member::new(kp.public_key(), format!("node-{i}")))
            .collect();
        let id = InstanceId::new(1, [9u8; 32], 0x01, 0x01);
        let instance = Instance::new(id, Committee::new(members, 0), Arc::clone(&keypairs[0]));
        let leader = Arc::new(ConsensusLeader::new(
            instance,
            config,
            Arc::new(DiscardTransport),
            Arc::new(NoopTimer),
            |_| {},
        ));
        (leader, keypairs)
    }

    /// S6: a RESPONSE with a genuine outer signature but a scalar that does
    /// not satisfy the Schnorr partial-verification equation is rejected,
    /// and neither the response set nor `commit_counter` is mutated by it.
    #[test]
    fn tampered_response_fails_partial_verification_and_is_dropped() {
        // tolerance_fraction 0.5 on n=3 gives num_for_consensus = 3 - (ceil(3*0.5)-1) - 1 = 1,
        // reachable once either backup (ids 1, 2) commits; both commit here.
        let config = ConsensusConfig {
            commit_window_ms: 1,
            num_consensus_sets: 1,
            tolerance_fraction: 0.5,
        };
        let (leader, keypairs) = make_leader(3, config);

        leader.start_consensus(b"proposal".to_vec()).unwrap();
        for backup_id in [1u16, 2u16] {
            let (_, commit_point) = CommitPoint::generate(&mut rand::rngs::OsRng);
            let body = crate::wire::CommitBody::signed(
                leader.instance.id.consensus_id,
                leader.instance.id.block_hash,
                backup_id,
                commit_point,
                &keypairs[backup_id as usize],
            );
            leader.handle_commit(body);
        }
        {
            let mut inner = leader.inner.lock();
            leader.transition_after_commit_window(&mut inner);
        }
        assert_eq!(leader.snapshot().num_subsets, 1);

        let mut bogus_bytes = [0u8; 32];
        bogus_bytes[31] = 7;
        let bogus_response = Response::from_bytes(&bogus_bytes).unwrap();
        let tampered = ResponseBody::signed(
            leader.instance.id.consensus_id,
            leader.instance.id.block_hash,
            1,
            0,
            bogus_response,
            &keypairs[1],
        );
        leader.handle_response(tampered, false);

        let inner = leader.inner.lock();
        assert!(inner.response_map_subsets[0].popcount() == 0);
        assert_eq!(inner.subsets[0].response_data.len(), 0);
    }

    #[test]
    fn unknown_peer_error_has_display() {
        let err = NetError::UnknownPeer("node-9".to_string());
        assert!(err.to_string().contains("node-9"));
    }
}
