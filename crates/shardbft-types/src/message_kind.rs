//! Wire type-byte discriminants for consensus messages.

use std::fmt;

/// The nine consensus message types, keyed by their wire type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Leader proposal, round one.
    Announce = 0x01,
    /// Backup commit point, round one.
    Commit = 0x02,
    /// Leader challenge, round one.
    Challenge = 0x03,
    /// Backup response, round one.
    Response = 0x04,
    /// Leader collective signature, round one.
    CollectiveSig = 0x05,
    /// Backup re-commit, round two.
    FinalCommit = 0x06,
    /// Leader challenge, round two.
    FinalChallenge = 0x07,
    /// Backup response, round two.
    FinalResponse = 0x08,
    /// Leader collective signature, round two, fanned out to the committee.
    FinalCollectiveSig = 0x09,
}

impl MessageKind {
    /// Parses a message kind from its wire type byte.
    #[must_use]
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Announce),
            0x02 => Some(Self::Commit),
            0x03 => Some(Self::Challenge),
            0x04 => Some(Self::Response),
            0x05 => Some(Self::CollectiveSig),
            0x06 => Some(Self::FinalCommit),
            0x07 => Some(Self::FinalChallenge),
            0x08 => Some(Self::FinalResponse),
            0x09 => Some(Self::FinalCollectiveSig),
            _ => None,
        }
    }

    /// Returns the wire type byte for this kind.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` if this message type belongs to round two of the
    /// protocol (the `FINAL*` messages).
    #[must_use]
    pub fn is_round_two(self) -> bool {
        matches!(
            self,
            Self::FinalCommit | Self::FinalChallenge | Self::FinalResponse | Self::FinalCollectiveSig
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Announce => "ANNOUNCE",
            Self::Commit => "COMMIT",
            Self::Challenge => "CHALLENGE",
            Self::Response => "RESPONSE",
            Self::CollectiveSig => "COLLECTIVESIG",
            Self::FinalCommit => "FINALCOMMIT",
            Self::FinalChallenge => "FINALCHALLENGE",
            Self::FinalResponse => "FINALRESPONSE",
            Self::FinalCollectiveSig => "FINALCOLLECTIVESIG",
        };
        write!(f, "{name}")
    }
}
