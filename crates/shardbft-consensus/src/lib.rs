//! Two-round Schnorr multi-signature BFT consensus core.
//!
//! This crate implements the leader and backup state machines described by
//! the protocol's wire format, subset racing, and state-gating tables. It is
//! transport-agnostic: callers supply a [`shardbft_net::Transport`] and a
//! [`shardbft_net::TimerService`] (the in-memory implementations in
//! `shardbft-net` are sufficient for tests and single-process simulation).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod common;
mod config;
mod error;
mod leader;
mod metrics;
mod subset;
mod wire;

pub use backup::ConsensusBackup;
pub use common::{BackupState, ConsensusCompletion, Instance, LeaderMainState};
pub use config::ConsensusConfig;
pub use error::{ConsensusError, RejectReason, Result};
pub use leader::ConsensusLeader;
pub use metrics::{BackupSnapshot, LeaderSnapshot};
pub use wire::{Frame, WireError};
