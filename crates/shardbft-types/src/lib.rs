//! # shardbft-types
//!
//! Shared data types used by both the leader and backup sides of
//! `shardbft-consensus`: committee membership, consensus instance identity,
//! participation bitmaps, and the wire message-kind enum.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bitset;
mod committee;
mod message_kind;

pub use bitset::{BitmapError, ParticipantBitmap};
pub use committee::{Committee, InstanceId, Member};
pub use message_kind::MessageKind;
