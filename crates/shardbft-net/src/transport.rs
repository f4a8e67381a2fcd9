//! Best-effort message delivery between committee members.

use crate::error::Result;

/// Best-effort delivery of consensus frames to committee peers.
///
/// Modeled on the replication handler pattern used elsewhere in this
/// codebase: `unicast`/`multicast` hand bytes to the transport and return
/// without blocking the caller on delivery. If the underlying transport
/// blocks (e.g. socket backpressure), it does so on its own task, never
/// inside a consensus instance's mutex.
pub trait Transport: Send + Sync + 'static {
    /// Sends `bytes` to a single peer, addressed by its committee address.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer is unknown to this transport.
    fn unicast(&self, peer: &str, bytes: Vec<u8>) -> Result<()>;

    /// Sends `bytes` to every peer in `peers`, addressed by committee
    /// address. Unlike `unicast`, a single unknown peer does not abort the
    /// whole multicast; it is logged and the remaining peers still receive
    /// the frame.
    fn multicast(&self, peers: &[&str], bytes: Vec<u8>) {
        for peer in peers {
            if let Err(err) = self.unicast(peer, bytes.clone()) {
                tracing::debug!(peer = %peer, error = %err, "multicast to peer failed");
            }
        }
    }
}

/// Delivers inbound frames from the transport to a consensus instance's
/// `on_message` entry point.
pub trait Router: Send + Sync + 'static {
    /// Called once per inbound frame, with the sending peer's address.
    fn on_message(&self, bytes: &[u8], from: &str);
}
