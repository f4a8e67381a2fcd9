//! Committee membership and consensus instance identity.

use serde::{Deserialize, Serialize};
use shardbft_crypto::PublicKey;
use std::fmt;

/// A single committee member: public key and network address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The member's Schnorr public key.
    pub public_key: PublicKey,
    /// The member's transport-level peer address.
    pub address: String,
}

impl Member {
    /// Creates a new committee member.
    #[must_use]
    pub fn new(public_key: PublicKey, address: impl Into<String>) -> Self {
        Self {
            public_key,
            address: address.into(),
        }
    }
}

/// An ordered committee of fixed size `N`, identical on the leader and every
/// backup for the lifetime of one consensus instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    members: Vec<Member>,
    /// This node's own index into `members`.
    pub my_id: u16,
}

impl Committee {
    /// Creates a committee from an ordered member list and this node's own
    /// index.
    ///
    /// # Panics
    ///
    /// Panics if `my_id` is out of range or `members` is empty.
    #[must_use]
    pub fn new(members: Vec<Member>, my_id: u16) -> Self {
        assert!(!members.is_empty(), "committee must not be empty");
        assert!(
            (my_id as usize) < members.len(),
            "my_id out of committee range"
        );
        Self { members, my_id }
    }

    /// The committee size `N`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the committee is empty (never constructed this way
    /// in practice; `new` forbids it).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the member at `index`, if in range.
    #[must_use]
    pub fn member(&self, index: u16) -> Option<&Member> {
        self.members.get(index as usize)
    }

    /// Returns this node's own member entry.
    #[must_use]
    pub fn my_member(&self) -> &Member {
        &self.members[self.my_id as usize]
    }

    /// Returns all member public keys, in committee order.
    #[must_use]
    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.members.iter().map(|m| m.public_key).collect()
    }

    /// Returns all member addresses, in committee order.
    #[must_use]
    pub fn addresses(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.address.as_str()).collect()
    }

    /// Iterates over `(index, member)` pairs in committee order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Member)> {
        self.members
            .iter()
            .enumerate()
            .map(|(i, m)| (i as u16, m))
    }
}

/// Identifies one consensus instance, carried on every wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId {
    /// Monotonically-assigned consensus round identifier.
    pub consensus_id: u32,
    /// Hash of the proposed block/message this instance is certifying.
    pub block_hash: [u8; 32],
    /// Message-type namespace byte, caller-assigned.
    pub class_byte: u8,
    /// Message-type namespace byte, caller-assigned.
    pub instruction_byte: u8,
}

impl InstanceId {
    /// Creates a new instance identity.
    #[must_use]
    pub fn new(consensus_id: u32, block_hash: [u8; 32], class_byte: u8, instruction_byte: u8) -> Self {
        Self {
            consensus_id,
            block_hash,
            class_byte,
            instruction_byte,
        }
    }

    /// Returns `true` if `consensus_id` and `block_hash` both match this
    /// instance's; the namespace bytes are matched separately by the wire
    /// dispatcher before a frame ever reaches an instance.
    #[must_use]
    pub fn matches(&self, consensus_id: u32, block_hash: &[u8; 32]) -> bool {
        self.consensus_id == consensus_id && &self.block_hash == block_hash
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "instance({}, {}, class={}, instr={})",
            self.consensus_id,
            hex::encode(&self.block_hash[..8]),
            self.class_byte,
            self.instruction_byte
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardbft_crypto::Keypair;

    fn member() -> Member {
        Member::new(Keypair::generate().public_key(), "127.0.0.1:9000")
    }

    #[test]
    fn committee_basics() {
        let members: Vec<Member> = (0..5).map(|_| member()).collect();
        let committee = Committee::new(members.clone(), 2);
        assert_eq!(committee.len(), 5);
        assert_eq!(committee.my_member(), &members[2]);
        assert_eq!(committee.public_keys().len(), 5);
    }

    #[test]
    fn instance_id_matches() {
        let id = InstanceId::new(7, [9u8; 32], 1, 2);
        assert!(id.matches(7, &[9u8; 32]));
        assert!(!id.matches(8, &[9u8; 32]));
        assert!(!id.matches(7, &[0u8; 32]));
    }

    #[test]
    #[should_panic(expected = "my_id out of committee range")]
    fn committee_rejects_out_of_range_my_id() {
        let members: Vec<Member> = (0..3).map(|_| member()).collect();
        Committee::new(members, 5);
    }
}
