//! Fixed-offset wire framing for the nine consensus message types.
//!
//! Every frame on the wire is `[class_byte][instruction_byte][type_byte][body]`.
//! This module only parses/serializes that shape; it does not check
//! `consensus_id`/`block_hash` against an instance, nor verify embedded
//! signatures — both require instance context and are done by the caller
//! (`common::dispatch`) immediately after a successful decode. Keeping this
//! module free of that context makes the frame layout independently
//! testable (property 6, §8) and fuzzable.

use shardbft_crypto::{Challenge, CommitPoint, CryptoError, Keypair, PublicKey, Response, Signature};
use shardbft_types::{MessageKind, ParticipantBitmap};
use thiserror::Error;

/// Errors produced while parsing a frame's binary layout.
#[derive(Debug, Error)]
pub enum WireError {
    /// The frame is shorter than the fixed-offset prefix for its type.
    #[error("frame too short: need at least {need} bytes, got {got}")]
    TooShort {
        /// Minimum required length.
        need: usize,
        /// Actual length.
        got: usize,
    },

    /// The type byte does not name one of the nine known message kinds.
    #[error("unknown message type byte: {0:#04x}")]
    UnknownType(u8),

    /// A fixed-width cryptographic field failed to parse.
    #[error("malformed field: {0}")]
    Field(#[from] CryptoError),

    /// The bitmap's declared length did not match its encoded byte count.
    #[error("malformed bitmap: {0}")]
    Bitmap(#[from] shardbft_types::BitmapError),
}

type WireResult<T> = std::result::Result<T, WireError>;

fn take<'a>(buf: &'a [u8], n: usize, what: &'static str) -> WireResult<(&'a [u8], &'a [u8])> {
    if buf.len() < n {
        return Err(WireError::TooShort {
            need: n,
            got: buf.len(),
        });
    }
    let _ = what;
    Ok((&buf[..n], &buf[n..]))
}

fn read_u32(buf: &[u8]) -> WireResult<(u32, &[u8])> {
    let (head, rest) = take(buf, 4, "u32")?;
    Ok((u32::from_be_bytes(head.try_into().unwrap()), rest))
}

fn read_u16(buf: &[u8]) -> WireResult<(u16, &[u8])> {
    let (head, rest) = take(buf, 2, "u16")?;
    Ok((u16::from_be_bytes(head.try_into().unwrap()), rest))
}

fn read_u8(buf: &[u8]) -> WireResult<(u8, &[u8])> {
    let (head, rest) = take(buf, 1, "u8")?;
    Ok((head[0], rest))
}

fn read_hash(buf: &[u8]) -> WireResult<([u8; 32], &[u8])> {
    let (head, rest) = take(buf, 32, "block_hash")?;
    Ok((head.try_into().unwrap(), rest))
}

fn read_commit_point(buf: &[u8]) -> WireResult<(CommitPoint, &[u8])> {
    let (head, rest) = take(buf, CommitPoint::LEN, "commit_point")?;
    Ok((CommitPoint::from_bytes(head)?, rest))
}

fn read_public_key(buf: &[u8]) -> WireResult<(PublicKey, &[u8])> {
    let (head, rest) = take(buf, PublicKey::LEN, "public_key")?;
    Ok((PublicKey::from_bytes(head)?, rest))
}

fn read_challenge(buf: &[u8]) -> WireResult<(Challenge, &[u8])> {
    let (head, rest) = take(buf, Challenge::LEN, "challenge")?;
    Ok((Challenge::from_bytes(head)?, rest))
}

fn read_response(buf: &[u8]) -> WireResult<(Response, &[u8])> {
    let (head, rest) = take(buf, Response::LEN, "response")?;
    Ok((Response::from_bytes(head)?, rest))
}

fn read_signature(buf: &[u8]) -> WireResult<(Signature, &[u8])> {
    let (head, rest) = take(buf, Signature::LEN, "signature")?;
    Ok((Signature::from_bytes(head)?, rest))
}

/// `ANNOUNCE` body: leader proposing a message to the committee.
#[derive(Debug, Clone)]
pub struct AnnounceBody {
    /// Instance identifier.
    pub consensus_id: u32,
    /// Instance block hash.
    pub block_hash: [u8; 32],
    /// Leader's committee index.
    pub leader_id: u16,
    /// Opaque proposal bytes.
    pub proposal: Vec<u8>,
    /// Leader's signature over every preceding field.
    pub leader_sig: Signature,
}

impl AnnounceBody {
    /// Builds and self-signs an `ANNOUNCE` body.
    pub(crate) fn signed(
        consensus_id: u32,
        block_hash: [u8; 32],
        leader_id: u16,
        proposal: Vec<u8>,
        keypair: &Keypair,
    ) -> Self {
        let mut body = Self {
            consensus_id,
            block_hash,
            leader_id,
            proposal,
            leader_sig: keypair.sign(&[]),
        };
        let payload = body.unsigned_payload();
        body.leader_sig = keypair.sign(&payload);
        body
    }

    pub(crate) fn unsigned_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 32 + 2 + self.proposal.len());
        out.extend_from_slice(&self.consensus_id.to_be_bytes());
        out.extend_from_slice(&self.block_hash);
        out.extend_from_slice(&self.leader_id.to_be_bytes());
        out.extend_from_slice(&self.proposal);
        out
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = self.unsigned_payload();
        out.extend_from_slice(self.leader_sig.as_bytes());
        out
    }

    pub(crate) fn decode(buf: &[u8]) -> WireResult<Self> {
        let (consensus_id, rest) = read_u32(buf)?;
        let (block_hash, rest) = read_hash(rest)?;
        let (leader_id, rest) = read_u16(rest)?;
        if rest.len() < Signature::LEN {
            return Err(WireError::TooShort {
                need: Signature::LEN,
                got: rest.len(),
            });
        }
        let split = rest.len() - Signature::LEN;
        let (proposal, sig_bytes) = (&rest[..split], &rest[split..]);
        let leader_sig = Signature::from_bytes(sig_bytes)?;
        Ok(Self {
            consensus_id,
            block_hash,
            leader_id,
            proposal: proposal.to_vec(),
            leader_sig,
        })
    }
}

/// `COMMIT` body: a backup's first-round commitment.
#[derive(Debug, Clone)]
pub struct CommitBody {
    /// Instance identifier.
    pub consensus_id: u32,
    /// Instance block hash.
    pub block_hash: [u8; 32],
    /// Sender's committee index.
    pub backup_id: u16,
    /// The backup's commit point for this round.
    pub commit_point: CommitPoint,
    /// Sender's signature over every preceding field.
    pub sender_sig: Signature,
}

impl CommitBody {
    /// Builds and self-signs a `COMMIT` body.
    pub(crate) fn signed(
        consensus_id: u32,
        block_hash: [u8; 32],
        backup_id: u16,
        commit_point: CommitPoint,
        keypair: &Keypair,
    ) -> Self {
        let mut body = Self {
            consensus_id,
            block_hash,
            backup_id,
            commit_point,
            sender_sig: keypair.sign(&[]),
        };
        let payload = body.unsigned_payload();
        body.sender_sig = keypair.sign(&payload);
        body
    }

    pub(crate) fn unsigned_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 32 + 2 + CommitPoint::LEN);
        out.extend_from_slice(&self.consensus_id.to_be_bytes());
        out.extend_from_slice(&self.block_hash);
        out.extend_from_slice(&self.backup_id.to_be_bytes());
        out.extend_from_slice(self.commit_point.as_bytes());
        out
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = self.unsigned_payload();
        out.extend_from_slice(self.sender_sig.as_bytes());
        out
    }

    pub(crate) fn decode(buf: &[u8]) -> WireResult<Self> {
        let (consensus_id, rest) = read_u32(buf)?;
        let (block_hash, rest) = read_hash(rest)?;
        let (backup_id, rest) = read_u16(rest)?;
        let (commit_point, rest) = read_commit_point(rest)?;
        let (sender_sig, _) = read_signature(rest)?;
        Ok(Self {
            consensus_id,
            block_hash,
            backup_id,
            commit_point,
            sender_sig,
        })
    }
}

/// `CHALLENGE` / `FINALCHALLENGE` body: leader's aggregated challenge.
#[derive(Debug, Clone)]
pub struct ChallengeBody {
    /// Instance identifier.
    pub consensus_id: u32,
    /// Instance block hash.
    pub block_hash: [u8; 32],
    /// Leader's committee index.
    pub leader_id: u16,
    /// Which racing subset this challenge is for.
    pub subset_id: u8,
    /// Aggregated commit point over the subset.
    pub agg_commit: CommitPoint,
    /// Aggregated public key over the subset.
    pub agg_key: PublicKey,
    /// The derived challenge scalar.
    pub challenge: Challenge,
    /// Leader's signature over every preceding field.
    pub leader_sig: Signature,
}

impl ChallengeBody {
    /// Builds and self-signs a `CHALLENGE` / `FINALCHALLENGE` body.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn signed(
        consensus_id: u32,
        block_hash: [u8; 32],
        leader_id: u16,
        subset_id: u8,
        agg_commit: CommitPoint,
        agg_key: PublicKey,
        challenge: Challenge,
        keypair: &Keypair,
    ) -> Self {
        let mut body = Self {
            consensus_id,
            block_hash,
            leader_id,
            subset_id,
            agg_commit,
            agg_key,
            challenge,
            leader_sig: keypair.sign(&[]),
        };
        let payload = body.unsigned_payload();
        body.leader_sig = keypair.sign(&payload);
        body
    }

    pub(crate) fn unsigned_payload(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(4 + 32 + 2 + 1 + CommitPoint::LEN + PublicKey::LEN + Challenge::LEN);
        out.extend_from_slice(&self.consensus_id.to_be_bytes());
        out.extend_from_slice(&self.block_hash);
        out.extend_from_slice(&self.leader_id.to_be_bytes());
        out.push(self.subset_id);
        out.extend_from_slice(self.agg_commit.as_bytes());
        out.extend_from_slice(self.agg_key.as_bytes());
        out.extend_from_slice(self.challenge.as_bytes());
        out
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = self.unsigned_payload();
        out.extend_from_slice(self.leader_sig.as_bytes());
        out
    }

    pub(crate) fn decode(buf: &[u8]) -> WireResult<Self> {
        let (consensus_id, rest) = read_u32(buf)?;
        let (block_hash, rest) = read_hash(rest)?;
        let (leader_id, rest) = read_u16(rest)?;
        let (subset_id, rest) = read_u8(rest)?;
        let (agg_commit, rest) = read_commit_point(rest)?;
        let (agg_key, rest) = read_public_key(rest)?;
        let (challenge, rest) = read_challenge(rest)?;
        let (leader_sig, _) = read_signature(rest)?;
        Ok(Self {
            consensus_id,
            block_hash,
            leader_id,
            subset_id,
            agg_commit,
            agg_key,
            challenge,
            leader_sig,
        })
    }
}

/// `RESPONSE` / `FINALRESPONSE` body: a backup's Schnorr response.
#[derive(Debug, Clone)]
pub struct ResponseBody {
    /// Instance identifier.
    pub consensus_id: u32,
    /// Instance block hash.
    pub block_hash: [u8; 32],
    /// Sender's committee index.
    pub backup_id: u16,
    /// Which racing subset this response belongs to.
    pub subset_id: u8,
    /// The response scalar.
    pub response: Response,
    /// Sender's signature over every preceding field.
    pub sender_sig: Signature,
}

impl ResponseBody {
    /// Builds and self-signs a `RESPONSE` / `FINALRESPONSE` body.
    pub(crate) fn signed(
        consensus_id: u32,
        block_hash: [u8; 32],
        backup_id: u16,
        subset_id: u8,
        response: Response,
        keypair: &Keypair,
    ) -> Self {
        let mut body = Self {
            consensus_id,
            block_hash,
            backup_id,
            subset_id,
            response,
            sender_sig: keypair.sign(&[]),
        };
        let payload = body.unsigned_payload();
        body.sender_sig = keypair.sign(&payload);
        body
    }

    pub(crate) fn unsigned_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 32 + 2 + 1 + Response::LEN);
        out.extend_from_slice(&self.consensus_id.to_be_bytes());
        out.extend_from_slice(&self.block_hash);
        out.extend_from_slice(&self.backup_id.to_be_bytes());
        out.push(self.subset_id);
        out.extend_from_slice(self.response.as_bytes());
        out
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = self.unsigned_payload();
        out.extend_from_slice(self.sender_sig.as_bytes());
        out
    }

    pub(crate) fn decode(buf: &[u8]) -> WireResult<Self> {
        let (consensus_id, rest) = read_u32(buf)?;
        let (block_hash, rest) = read_hash(rest)?;
        let (backup_id, rest) = read_u16(rest)?;
        let (subset_id, rest) = read_u8(rest)?;
        let (response, rest) = read_response(rest)?;
        let (sender_sig, _) = read_signature(rest)?;
        Ok(Self {
            consensus_id,
            block_hash,
            backup_id,
            subset_id,
            response,
            sender_sig,
        })
    }
}

/// `COLLECTIVESIG` / `FINALCOLLECTIVESIG` body: the aggregated signature
/// for one subset, plus the leader's outer signature over the whole frame.
#[derive(Debug, Clone)]
pub struct CollectiveSigBody {
    /// Instance identifier.
    pub consensus_id: u32,
    /// Instance block hash.
    pub block_hash: [u8; 32],
    /// Leader's committee index.
    pub leader_id: u16,
    /// Which racing subset this signature is for.
    pub subset_id: u8,
    /// Participation bitmap the collective signature was aggregated over.
    pub bitmap: ParticipantBitmap,
    /// The collective Schnorr signature itself.
    pub collective_sig: Signature,
    /// Leader's outer signature over every preceding field (including
    /// `collective_sig`).
    pub leader_sig: Signature,
}

impl CollectiveSigBody {
    /// Builds and self-signs a `COLLECTIVESIG` / `FINALCOLLECTIVESIG` body.
    pub(crate) fn signed(
        consensus_id: u32,
        block_hash: [u8; 32],
        leader_id: u16,
        subset_id: u8,
        bitmap: ParticipantBitmap,
        collective_sig: Signature,
        keypair: &Keypair,
    ) -> Self {
        let mut body = Self {
            consensus_id,
            block_hash,
            leader_id,
            subset_id,
            bitmap,
            collective_sig,
            leader_sig: keypair.sign(&[]),
        };
        let payload = body.unsigned_payload();
        body.leader_sig = keypair.sign(&payload);
        body
    }

    pub(crate) fn unsigned_payload(&self) -> Vec<u8> {
        let bitmap_bytes = self.bitmap.encode();
        let mut out = Vec::with_capacity(
            4 + 32 + 2 + 1 + bitmap_bytes.len() + Signature::LEN,
        );
        out.extend_from_slice(&self.consensus_id.to_be_bytes());
        out.extend_from_slice(&self.block_hash);
        out.extend_from_slice(&self.leader_id.to_be_bytes());
        out.push(self.subset_id);
        out.extend_from_slice(&bitmap_bytes);
        out.extend_from_slice(self.collective_sig.as_bytes());
        out
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = self.unsigned_payload();
        out.extend_from_slice(self.leader_sig.as_bytes());
        out
    }

    pub(crate) fn decode(buf: &[u8]) -> WireResult<Self> {
        let (consensus_id, rest) = read_u32(buf)?;
        let (block_hash, rest) = read_hash(rest)?;
        let (leader_id, rest) = read_u16(rest)?;
        let (subset_id, rest) = read_u8(rest)?;
        let (bitmap, consumed) = ParticipantBitmap::decode(rest)?;
        let rest = &rest[consumed..];
        let (collective_sig, rest) = read_signature(rest)?;
        let (leader_sig, _) = read_signature(rest)?;
        Ok(Self {
            consensus_id,
            block_hash,
            leader_id,
            subset_id,
            bitmap,
            collective_sig,
            leader_sig,
        })
    }
}

/// `FINALCOMMIT` body: the round-two analogue of `COMMIT`, scoped to a
/// subset.
#[derive(Debug, Clone)]
pub struct FinalCommitBody {
    /// Instance identifier.
    pub consensus_id: u32,
    /// Instance block hash.
    pub block_hash: [u8; 32],
    /// Sender's committee index.
    pub backup_id: u16,
    /// Which racing subset this commit belongs to.
    pub subset_id: u8,
    /// The backup's commit point for round two.
    pub commit_point: CommitPoint,
    /// Sender's signature over every preceding field.
    pub sender_sig: Signature,
}

impl FinalCommitBody {
    /// Builds and self-signs a `FINALCOMMIT` body.
    pub(crate) fn signed(
        consensus_id: u32,
        block_hash: [u8; 32],
        backup_id: u16,
        subset_id: u8,
        commit_point: CommitPoint,
        keypair: &Keypair,
    ) -> Self {
        let mut body = Self {
            consensus_id,
            block_hash,
            backup_id,
            subset_id,
            commit_point,
            sender_sig: keypair.sign(&[]),
        };
        let payload = body.unsigned_payload();
        body.sender_sig = keypair.sign(&payload);
        body
    }

    pub(crate) fn unsigned_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 32 + 2 + 1 + CommitPoint::LEN);
        out.extend_from_slice(&self.consensus_id.to_be_bytes());
        out.extend_from_slice(&self.block_hash);
        out.extend_from_slice(&self.backup_id.to_be_bytes());
        out.push(self.subset_id);
        out.extend_from_slice(self.commit_point.as_bytes());
        out
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = self.unsigned_payload();
        out.extend_from_slice(self.sender_sig.as_bytes());
        out
    }

    pub(crate) fn decode(buf: &[u8]) -> WireResult<Self> {
        let (consensus_id, rest) = read_u32(buf)?;
        let (block_hash, rest) = read_hash(rest)?;
        let (backup_id, rest) = read_u16(rest)?;
        let (subset_id, rest) = read_u8(rest)?;
        let (commit_point, rest) = read_commit_point(rest)?;
        let (sender_sig, _) = read_signature(rest)?;
        Ok(Self {
            consensus_id,
            block_hash,
            backup_id,
            subset_id,
            commit_point,
            sender_sig,
        })
    }
}

/// A decoded consensus frame, tagged by message kind.
#[derive(Debug, Clone)]
pub enum Frame {
    /// `ANNOUNCE`.
    Announce(AnnounceBody),
    /// `COMMIT`.
    Commit(CommitBody),
    /// `CHALLENGE`.
    Challenge(ChallengeBody),
    /// `RESPONSE`.
    Response(ResponseBody),
    /// `COLLECTIVESIG`.
    CollectiveSig(CollectiveSigBody),
    /// `FINALCOMMIT`.
    FinalCommit(FinalCommitBody),
    /// `FINALCHALLENGE`.
    FinalChallenge(ChallengeBody),
    /// `FINALRESPONSE`.
    FinalResponse(ResponseBody),
    /// `FINALCOLLECTIVESIG`.
    FinalCollectiveSig(CollectiveSigBody),
}

impl Frame {
    /// The message kind this frame carries.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Frame::Announce(_) => MessageKind::Announce,
            Frame::Commit(_) => MessageKind::Commit,
            Frame::Challenge(_) => MessageKind::Challenge,
            Frame::Response(_) => MessageKind::Response,
            Frame::CollectiveSig(_) => MessageKind::CollectiveSig,
            Frame::FinalCommit(_) => MessageKind::FinalCommit,
            Frame::FinalChallenge(_) => MessageKind::FinalChallenge,
            Frame::FinalResponse(_) => MessageKind::FinalResponse,
            Frame::FinalCollectiveSig(_) => MessageKind::FinalCollectiveSig,
        }
    }

    /// The instance identity fields every frame carries.
    #[must_use]
    pub fn consensus_id(&self) -> u32 {
        match self {
            Frame::Announce(b) => b.consensus_id,
            Frame::Commit(b) => b.consensus_id,
            Frame::Challenge(b) | Frame::FinalChallenge(b) => b.consensus_id,
            Frame::Response(b) | Frame::FinalResponse(b) => b.consensus_id,
            Frame::CollectiveSig(b) | Frame::FinalCollectiveSig(b) => b.consensus_id,
            Frame::FinalCommit(b) => b.consensus_id,
        }
    }

    /// The instance block hash every frame carries.
    #[must_use]
    pub fn block_hash(&self) -> [u8; 32] {
        match self {
            Frame::Announce(b) => b.block_hash,
            Frame::Commit(b) => b.block_hash,
            Frame::Challenge(b) | Frame::FinalChallenge(b) => b.block_hash,
            Frame::Response(b) | Frame::FinalResponse(b) => b.block_hash,
            Frame::CollectiveSig(b) | Frame::FinalCollectiveSig(b) => b.block_hash,
            Frame::FinalCommit(b) => b.block_hash,
        }
    }

    /// The payload bytes the embedded signature covers, and the signature
    /// itself, for signature verification by the caller.
    #[must_use]
    pub fn signed_payload(&self) -> (Vec<u8>, &Signature) {
        match self {
            Frame::Announce(b) => (b.unsigned_payload(), &b.leader_sig),
            Frame::Commit(b) => (b.unsigned_payload(), &b.sender_sig),
            Frame::Challenge(b) | Frame::FinalChallenge(b) => {
                (b.unsigned_payload(), &b.leader_sig)
            }
            Frame::Response(b) | Frame::FinalResponse(b) => (b.unsigned_payload(), &b.sender_sig),
            Frame::CollectiveSig(b) | Frame::FinalCollectiveSig(b) => {
                (b.unsigned_payload(), &b.leader_sig)
            }
            Frame::FinalCommit(b) => (b.unsigned_payload(), &b.sender_sig),
        }
    }

    /// Encodes the frame with its `[class][instruction][type]` prefix.
    #[must_use]
    pub fn encode(&self, class_byte: u8, instruction_byte: u8) -> Vec<u8> {
        let body = match self {
            Frame::Announce(b) => b.encode(),
            Frame::Commit(b) => b.encode(),
            Frame::Challenge(b) | Frame::FinalChallenge(b) => b.encode(),
            Frame::Response(b) | Frame::FinalResponse(b) => b.encode(),
            Frame::CollectiveSig(b) | Frame::FinalCollectiveSig(b) => b.encode(),
            Frame::FinalCommit(b) => b.encode(),
        };
        let mut out = Vec::with_capacity(3 + body.len());
        out.push(class_byte);
        out.push(instruction_byte);
        out.push(self.kind().to_u8());
        out.extend_from_slice(&body);
        out
    }

    /// Decodes `[class][instruction][type][body]` into its class,
    /// instruction, and typed frame.
    pub fn decode(data: &[u8]) -> WireResult<(u8, u8, Self)> {
        if data.len() < 3 {
            return Err(WireError::TooShort {
                need: 3,
                got: data.len(),
            });
        }
        let class_byte = data[0];
        let instruction_byte = data[1];
        let type_byte = data[2];
        let body = &data[3..];
        let kind = MessageKind::from_u8(type_byte).ok_or(WireError::UnknownType(type_byte))?;
        let frame = match kind {
            MessageKind::Announce => Frame::Announce(AnnounceBody::decode(body)?),
            MessageKind::Commit => Frame::Commit(CommitBody::decode(body)?),
            MessageKind::Challenge => Frame::Challenge(ChallengeBody::decode(body)?),
            MessageKind::Response => Frame::Response(ResponseBody::decode(body)?),
            MessageKind::CollectiveSig => Frame::CollectiveSig(CollectiveSigBody::decode(body)?),
            MessageKind::FinalCommit => Frame::FinalCommit(FinalCommitBody::decode(body)?),
            MessageKind::FinalChallenge => Frame::FinalChallenge(ChallengeBody::decode(body)?),
            MessageKind::FinalResponse => Frame::FinalResponse(ResponseBody::decode(body)?),
            MessageKind::FinalCollectiveSig => {
                Frame::FinalCollectiveSig(CollectiveSigBody::decode(body)?)
            }
        };
        Ok((class_byte, instruction_byte, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shardbft_crypto::Keypair;

    fn sig_fixture() -> Signature {
        let kp = Keypair::generate();
        kp.sign(b"whatever")
    }

    fn commit_point_fixture() -> CommitPoint {
        let (_, c) = CommitPoint::generate(&mut rand::thread_rng());
        c
    }

    fn public_key_fixture() -> PublicKey {
        Keypair::generate().public_key()
    }

    #[test]
    fn announce_roundtrips() {
        let body = AnnounceBody {
            consensus_id: 7,
            block_hash: [9u8; 32],
            leader_id: 0,
            proposal: b"block header bytes".to_vec(),
            leader_sig: sig_fixture(),
        };
        let frame = Frame::Announce(body.clone());
        let bytes = frame.encode(0x01, 0x02);
        let (class, instr, decoded) = Frame::decode(&bytes).unwrap();
        assert_eq!(class, 0x01);
        assert_eq!(instr, 0x02);
        match decoded {
            Frame::Announce(got) => {
                assert_eq!(got.consensus_id, body.consensus_id);
                assert_eq!(got.block_hash, body.block_hash);
                assert_eq!(got.leader_id, body.leader_id);
                assert_eq!(got.proposal, body.proposal);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn commit_roundtrips() {
        let body = CommitBody {
            consensus_id: 1,
            block_hash: [1u8; 32],
            backup_id: 3,
            commit_point: commit_point_fixture(),
            sender_sig: sig_fixture(),
        };
        let bytes = Frame::Commit(body.clone()).encode(5, 6);
        let (_, _, decoded) = Frame::decode(&bytes).unwrap();
        match decoded {
            Frame::Commit(got) => assert_eq!(got.backup_id, body.backup_id),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn collective_sig_roundtrips_with_bitmap() {
        let mut bitmap = ParticipantBitmap::zeroed(10);
        bitmap.set(0);
        bitmap.set(4);
        bitmap.set(9);
        let body = CollectiveSigBody {
            consensus_id: 42,
            block_hash: [2u8; 32],
            leader_id: 0,
            subset_id: 1,
            bitmap: bitmap.clone(),
            collective_sig: sig_fixture(),
            leader_sig: sig_fixture(),
        };
        let bytes = Frame::CollectiveSig(body).encode(0, 0);
        let (_, _, decoded) = Frame::decode(&bytes).unwrap();
        match decoded {
            Frame::CollectiveSig(got) => {
                assert_eq!(got.bitmap.popcount(), 3);
                assert!(got.bitmap.get(4));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn final_challenge_uses_challenge_layout() {
        let body = ChallengeBody {
            consensus_id: 1,
            block_hash: [0u8; 32],
            leader_id: 0,
            subset_id: 0,
            agg_commit: commit_point_fixture(),
            agg_key: public_key_fixture(),
            challenge: Challenge::derive(b"m", &commit_point_fixture(), &public_key_fixture()),
            leader_sig: sig_fixture(),
        };
        let bytes = Frame::FinalChallenge(body).encode(1, 1);
        let (_, _, decoded) = Frame::decode(&bytes).unwrap();
        assert!(matches!(decoded, Frame::FinalChallenge(_)));
        assert_eq!(decoded.kind(), MessageKind::FinalChallenge);
    }

    #[test]
    fn decode_rejects_unknown_type_byte() {
        let mut bytes = vec![0u8, 0u8, 0xffu8];
        bytes.extend_from_slice(&[0u8; 20]);
        assert!(matches!(Frame::decode(&bytes), Err(WireError::UnknownType(0xff))));
    }

    #[test]
    fn decode_rejects_too_short() {
        assert!(matches!(Frame::decode(&[1, 2]), Err(WireError::TooShort { .. })));
    }

    proptest::proptest! {
        #[test]
        fn commit_roundtrips_with_random_ids(consensus_id: u32, backup_id: u16) {
            let body = CommitBody {
                consensus_id,
                block_hash: [3u8; 32],
                backup_id,
                commit_point: commit_point_fixture(),
                sender_sig: sig_fixture(),
            };
            let bytes = Frame::Commit(body.clone()).encode(9, 9);
            let (_, _, decoded) = Frame::decode(&bytes).unwrap();
            match decoded {
                Frame::Commit(got) => {
                    proptest::prop_assert_eq!(got.consensus_id, consensus_id);
                    proptest::prop_assert_eq!(got.backup_id, backup_id);
                }
                other => panic!("wrong variant: {other:?}"),
            }
        }

        #[test]
        fn announce_roundtrips_with_random_proposal(proposal in proptest::collection::vec(0u8..=255, 0..512)) {
            let body = AnnounceBody {
                consensus_id: 1,
                block_hash: [4u8; 32],
                leader_id: 2,
                proposal,
                leader_sig: sig_fixture(),
            };
            let bytes = Frame::Announce(body.clone()).encode(0, 0);
            let (_, _, decoded) = Frame::decode(&bytes).unwrap();
            match decoded {
                Frame::Announce(got) => proptest::prop_assert_eq!(got.proposal, body.proposal),
                other => panic!("wrong variant: {other:?}"),
            }
        }
    }
}
