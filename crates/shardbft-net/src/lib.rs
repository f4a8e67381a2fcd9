//! Transport and timer abstractions for shardbft consensus.
//!
//! The consensus core (`shardbft-consensus`) is transport-agnostic: it
//! depends only on the [`Transport`], [`Router`], and [`TimerService`]
//! traits defined here. This crate also ships [`InProcessNetwork`] and
//! [`WheelTimerService`], in-memory implementations suitable for tests and
//! the single-process simulation binary; a production host wires the same
//! traits to real sockets and a real clock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod timer;
mod transport;

pub use error::{NetError, Result};
pub use memory::{InProcessNetwork, InProcessTransport, WheelTimerService};
pub use timer::{TimerHandle, TimerService};
pub use transport::{Router, Transport};
