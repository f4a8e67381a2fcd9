//! Backup-side state machine: ANNOUNCE validation, challenge-response for
//! both rounds, and collective-signature verification (§4.9).

use crate::common::{BackupState, ConsensusCompletion, Instance};
use crate::error::RejectReason;
use crate::metrics::BackupSnapshot;
use crate::wire::{
    AnnounceBody, ChallengeBody, CollectiveSigBody, CommitBody, FinalCommitBody, Frame, ResponseBody,
};
use parking_lot::Mutex;
use shardbft_crypto::{aggregate_keys, derive_challenge, verify_collective, Nonce, PublicKey};
use shardbft_net::{Router, Transport};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct BackupInner {
    state: BackupState,
    /// The original proposal bytes, fixed for the life of the instance.
    proposal: Vec<u8>,
    /// The current round's hash input: `proposal` in round one, the
    /// round-one collective signature bytes in round two.
    message: Vec<u8>,
    nonce: Option<Nonce>,
    subset_id: Option<u8>,
}

impl BackupInner {
    fn new() -> Self {
        Self {
            state: BackupState::Initial,
            proposal: Vec::new(),
            message: Vec::new(),
            nonce: None,
            subset_id: None,
        }
    }
}

/// Drives one consensus instance from a backup's side.
pub struct ConsensusBackup {
    instance: Instance,
    leader_id: u16,
    validator: Arc<dyn Fn(&[u8]) -> bool + Send + Sync>,
    transport: Arc<dyn Transport>,
    on_complete: Arc<dyn Fn(ConsensusCompletion) + Send + Sync>,
    inner: Mutex<BackupInner>,
}

impl ConsensusBackup {
    /// Creates a new backup-side instance, in state `INITIAL`.
    pub fn new(
        instance: Instance,
        leader_id: u16,
        validator: impl Fn(&[u8]) -> bool + Send + Sync + 'static,
        transport: Arc<dyn Transport>,
        on_complete: impl Fn(ConsensusCompletion) + Send + Sync + 'static,
    ) -> Self {
        Self {
            instance,
            leader_id,
            validator: Arc::new(validator),
            transport,
            on_complete: Arc::new(on_complete),
            inner: Mutex::new(BackupInner::new()),
        }
    }

    /// A point-in-time snapshot of this instance's progress, for the host to
    /// poll or log periodically.
    #[must_use]
    pub fn snapshot(&self) -> BackupSnapshot {
        let inner = self.inner.lock();
        BackupSnapshot {
            state: inner.state,
            subset_id: inner.subset_id,
        }
    }

    /// Handles one inbound frame addressed to this instance.
    ///
    /// Returns `true` if the frame matched this instance's identity and
    /// namespace, `false` if it belongs to a different instance entirely.
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
            Frame::Announce(body) => self.handle_announce(body),
            Frame::Challenge(body) => self.handle_challenge(body, false),
            Frame::FinalChallenge(body) => self.handle_challenge(body, true),
            Frame::CollectiveSig(body) => self.handle_collective_sig(body),
            Frame::FinalCollectiveSig(body) => self.handle_final_collective_sig(body),
            other => debug!(from, kind = %other.kind(), "backup does not accept this message kind"),
        }
        true
    }

    /// Re-sends COMMIT using the already-generated round-one nonce.
    ///
    /// `on_message` only drives the ANNOUNCE/CHALLENGE/COLLECTIVESIG/
    /// FINALCOLLECTIVESIG path; nothing re-sends COMMIT on its own once the
    /// instance has moved to `ANNOUNCE_DONE`. A host that wants to nudge a
    /// leader sitting on a still-open commit window (for example after its
    /// own estimate of `commit_window_ms` has elapsed) can call this to emit
    /// another COMMIT carrying the same commit point. No-op outside
    /// `ANNOUNCE_DONE`.
    pub fn retry_commit(&self) {
        let inner = self.inner.lock();
        if inner.state != BackupState::AnnounceDone {
            return;
        }
        let Some(commit_point) = inner.nonce.as_ref().map(Nonce::commit_point) else {
            return;
        };
        drop(inner);

        let commit_body = CommitBody::signed(
            self.instance.id.consensus_id,
            self.instance.id.block_hash,
            self.instance.my_id(),
            commit_point,
            &self.instance.keypair,
        );
        let bytes = Frame::Commit(commit_body)
            .encode(self.instance.id.class_byte, self.instance.id.instruction_byte);
        let Some(leader_addr) = self.leader_address() else {
            return;
        };
        if let Err(err) = self.transport.unicast(&leader_addr, bytes) {
            warn!(error = %err, "failed to resend COMMIT");
        }
    }

    fn leader_key(&self) -> Option<PublicKey> {
        self.instance
            .committee
            .member(self.leader_id)
            .map(|m| m.public_key)
    }

    fn leader_address(&self) -> Option<String> {
        self.instance
            .committee
            .member(self.leader_id)
            .map(|m| m.address.clone())
    }

    fn handle_announce(&self, body: AnnounceBody) {
        let Some(leader_key) = self.leader_key() else {
            warn!(reason = %RejectReason::DuplicateOrUnknownSender, "no such leader in committee");
            return;
        };
        let payload = body.unsigned_payload();
        if leader_key.verify(&payload, &body.leader_sig).is_err() {
            warn!(reason = %RejectReason::AuthFailure, "bad ANNOUNCE signature");
            return;
        }

        let mut inner = self.inner.lock();
        if inner.state != BackupState::Initial {
            debug!(reason = %RejectReason::OutOfPhase, "ANNOUNCE out of phase");
            return;
        }
        if !(self.validator)(&body.proposal) {
            warn!("proposal rejected by validator");
            inner.state = BackupState::Error;
            return;
        }

        let nonce = Nonce::generate();
        let commit_point = nonce.commit_point();
        inner.proposal = body.proposal.clone();
        inner.message = body.proposal;
        inner.nonce = Some(nonce);
        inner.state = BackupState::AnnounceDone;
        drop(inner);

        let commit_body = CommitBody::signed(
            self.instance.id.consensus_id,
            self.instance.id.block_hash,
            self.instance.my_id(),
            commit_point,
            &self.instance.keypair,
        );
        let bytes = Frame::Commit(commit_body)
            .encode(self.instance.id.class_byte, self.instance.id.instruction_byte);
        let Some(leader_addr) = self.leader_address() else {
            return;
        };
        if let Err(err) = self.transport.unicast(&leader_addr, bytes) {
            warn!(error = %err, "failed to send COMMIT");
        }
        info!(instance = %self.instance.id, "proposal accepted, COMMIT sent");
    }

    /// Handles CHALLENGE (`round_two = false`) and FINALCHALLENGE (§4.9).
    /// Re-derives the challenge hash from the leader's advertised
    /// `agg_commit`/`agg_key` and rejects any mismatch; the stronger
    /// bitmap-keyed check happens at COLLECTIVESIG time, where the wire
    /// format actually carries one.
    fn handle_challenge(&self, body: ChallengeBody, round_two: bool) {
        let Some(leader_key) = self.leader_key() else {
            return;
        };
        let payload = body.unsigned_payload();
        if leader_key.verify(&payload, &body.leader_sig).is_err() {
            warn!(reason = %RejectReason::AuthFailure, "bad CHALLENGE signature");
            return;
        }

        let mut inner = self.inner.lock();
        let expected_state = if round_two {
            BackupState::CollectiveSigDone
        } else {
            BackupState::AnnounceDone
        };
        if inner.state != expected_state {
            debug!(reason = %RejectReason::OutOfPhase, "CHALLENGE out of phase");
            return;
        }

        let expected = derive_challenge(&inner.message, &body.agg_commit, &body.agg_key);
        if expected != body.challenge {
            warn!(reason = %RejectReason::AuthFailure, "CHALLENGE hash does not match advertised aggregate");
            inner.state = BackupState::Error;
            return;
        }

        let Some(nonce) = inner.nonce.take() else {
            debug!("CHALLENGE with no outstanding nonce");
            return;
        };
        let response = nonce.respond(&body.challenge, &self.instance.keypair);
        inner.subset_id = Some(body.subset_id);
        inner.state = if round_two {
            BackupState::FinalChallengeDone
        } else {
            BackupState::ChallengeDone
        };
        drop(inner);

        let response_body = ResponseBody::signed(
            self.instance.id.consensus_id,
            self.instance.id.block_hash,
            self.instance.my_id(),
            body.subset_id,
            response,
            &self.instance.keypair,
        );
        let frame = if round_two {
            Frame::FinalResponse(response_body)
        } else {
            Frame::Response(response_body)
        };
        let bytes = frame.encode(self.instance.id.class_byte, self.instance.id.instruction_byte);
        let Some(leader_addr) = self.leader_address() else {
            return;
        };
        let kind = if round_two { "FINALRESPONSE" } else { "RESPONSE" };
        if let Err(err) = self.transport.unicast(&leader_addr, bytes) {
            warn!(error = %err, kind, "failed to send response");
        }
    }

    fn handle_collective_sig(&self, body: CollectiveSigBody) {
        let Some(leader_key) = self.leader_key() else {
            return;
        };
        let payload = body.unsigned_payload();
        if leader_key.verify(&payload, &body.leader_sig).is_err() {
            warn!(reason = %RejectReason::AuthFailure, "bad COLLECTIVESIG signature");
            return;
        }

        let mut inner = self.inner.lock();
        if inner.state != BackupState::ChallengeDone {
            debug!(reason = %RejectReason::OutOfPhase, "COLLECTIVESIG out of phase");
            return;
        }
        if inner.subset_id != Some(body.subset_id) {
            debug!(reason = %RejectReason::WrongInstance, "COLLECTIVESIG for a different subset");
            return;
        }

        let member_keys: Vec<PublicKey> = body
            .bitmap
            .iter_set()
            .filter_map(|i| self.instance.committee.member(i as u16).map(|m| m.public_key))
            .collect();
        let Ok(agg_key) = aggregate_keys(&member_keys) else {
            warn!("key aggregation failed while verifying COLLECTIVESIG");
            inner.state = BackupState::Error;
            return;
        };
        if verify_collective(&inner.message, &agg_key, &body.collective_sig).is_err() {
            warn!(reason = %RejectReason::AuthFailure, "collective signature failed verification");
            inner.state = BackupState::Error;
            return;
        }

        inner.message = body.collective_sig.as_bytes().to_vec();
        inner.state = BackupState::CollectiveSigDone;

        let participating = body.bitmap.get(self.instance.my_id() as usize);
        if !participating {
            debug!(instance = %self.instance.id, "not in round-one bitmap, idle until FINALCOLLECTIVESIG");
            return;
        }

        let nonce = Nonce::generate();
        let commit_point = nonce.commit_point();
        inner.nonce = Some(nonce);
        drop(inner);

        let commit_body = FinalCommitBody::signed(
            self.instance.id.consensus_id,
            self.instance.id.block_hash,
            self.instance.my_id(),
            body.subset_id,
            commit_point,
            &self.instance.keypair,
        );
        let bytes = Frame::FinalCommit(commit_body)
            .encode(self.instance.id.class_byte, self.instance.id.instruction_byte);
        let Some(leader_addr) = self.leader_address() else {
            return;
        };
        if let Err(err) = self.transport.unicast(&leader_addr, bytes) {
            warn!(error = %err, "failed to send FINALCOMMIT");
        }
    }

    fn handle_final_collective_sig(&self, body: CollectiveSigBody) {
        let Some(leader_key) = self.leader_key() else {
            return;
        };
        let payload = body.unsigned_payload();
        if leader_key.verify(&payload, &body.leader_sig).is_err() {
            warn!(reason = %RejectReason::AuthFailure, "bad FINALCOLLECTIVESIG signature");
            return;
        }

        let mut inner = self.inner.lock();
        if inner.state != BackupState::FinalChallengeDone && inner.state != BackupState::CollectiveSigDone
        {
            debug!(reason = %RejectReason::OutOfPhase, "FINALCOLLECTIVESIG out of phase");
            return;
        }

        let member_keys: Vec<PublicKey> = body
            .bitmap
            .iter_set()
            .filter_map(|i| self.instance.committee.member(i as u16).map(|m| m.public_key))
            .collect();
        let Ok(agg_key) = aggregate_keys(&member_keys) else {
            warn!("key aggregation failed while verifying FINALCOLLECTIVESIG");
            inner.state = BackupState::Error;
            return;
        };
        if verify_collective(&inner.message, &agg_key, &body.collective_sig).is_err() {
            warn!(reason = %RejectReason::AuthFailure, "final collective signature failed verification");
            inner.state = BackupState::Error;
            return;
        }

        inner.state = BackupState::Done;
        info!(instance = %self.instance.id, "consensus complete");
        (self.on_complete)(ConsensusCompletion {
            proposal_bytes: inner.proposal.clone(),
            participation_bitmap: body.bitmap,
            collective_signature: body.collective_sig,
        });
    }
}

impl Router for ConsensusBackup {
    fn on_message(&self, bytes: &[u8], from: &str) {
        let _ = ConsensusBackup::on_message(self, bytes, from);
    }
}
