//! Error types for transport and timer operations.

use thiserror::Error;

/// Errors that can occur during network operations.
#[derive(Debug, Error)]
pub enum NetError {
    /// The named peer is not registered with this transport.
    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    /// The transport's delivery channel for a peer has been dropped.
    #[error("delivery channel closed for peer: {0}")]
    ChannelClosed(String),
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
