//! In-memory `Transport`/`TimerService` implementations for tests, the
//! simulation binary, and as a reference for a production adapter.

use crate::error::{NetError, Result};
use crate::timer::{TimerHandle, TimerService};
use crate::transport::{Router, Transport};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A shared, in-process network of committee members, keyed by address.
///
/// Mirrors the `DashMap`-keyed peer registry used for P2P peer bookkeeping
/// elsewhere in this codebase, adapted here to route whole frames between
/// in-process tasks over `mpsc` channels rather than sockets.
#[derive(Clone, Default)]
pub struct InProcessNetwork {
    peers: Arc<DashMap<String, mpsc::UnboundedSender<(String, Vec<u8>)>>>,
}

impl InProcessNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a committee member's inbound router under `address` and
    /// returns a `Transport` handle for that member to send through.
    ///
    /// Spawns a task that drains inbound frames and calls
    /// `router.on_message` for each one, decoupling delivery from the
    /// sender's call stack.
    pub fn register(&self, address: impl Into<String>, router: Arc<dyn Router>) -> InProcessTransport {
        let address = address.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, Vec<u8>)>();
        self.peers.insert(address.clone(), tx);

        tokio::spawn(async move {
            while let Some((from, bytes)) = rx.recv().await {
                router.on_message(&bytes, &from);
            }
        });

        InProcessTransport {
            self_address: address,
            peers: self.peers.clone(),
        }
    }
}

/// A `Transport` bound to one committee member's address, backed by an
/// `InProcessNetwork`.
pub struct InProcessTransport {
    self_address: String,
    peers: Arc<DashMap<String, mpsc::UnboundedSender<(String, Vec<u8>)>>>,
}

impl Transport for InProcessTransport {
    fn unicast(&self, peer: &str, bytes: Vec<u8>) -> Result<()> {
        let sender = self
            .peers
            .get(peer)
            .ok_or_else(|| NetError::UnknownPeer(peer.to_string()))?;
        sender
            .send((self.self_address.clone(), bytes))
            .map_err(|_| NetError::ChannelClosed(peer.to_string()))
    }
}

/// A `TimerService` that schedules callbacks on the `tokio` runtime.
#[derive(Clone, Default)]
pub struct WheelTimerService;

impl WheelTimerService {
    /// Creates a new timer service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TimerService for WheelTimerService {
    fn schedule(&self, delay_ms: u64, callback: Box<dyn FnOnce() + Send>) -> Arc<dyn TimerHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = Arc::new(WheelHandle {
            cancelled: cancelled.clone(),
        });

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if !cancelled.load(Ordering::SeqCst) {
                callback();
            }
        });

        handle
    }
}

struct WheelHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle for WheelHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    struct RecordingRouter {
        received: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    impl Router for RecordingRouter {
        fn on_message(&self, bytes: &[u8], from: &str) {
            self.received.lock().push((from.to_string(), bytes.to_vec()));
        }
    }

    #[tokio::test]
    async fn unicast_delivers_to_registered_peer() {
        let network = InProcessNetwork::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let router = Arc::new(RecordingRouter {
            received: received.clone(),
        });

        let backup_transport = network.register("backup", router);
        let leader_transport = network.register("leader", Arc::new(RecordingRouter {
            received: Arc::new(Mutex::new(Vec::new())),
        }));

        leader_transport.unicast("backup", b"hello".to_vec()).unwrap();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let got = received.lock();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0], ("leader".to_string(), b"hello".to_vec()));
        let _ = backup_transport;
    }

    #[tokio::test]
    async fn unicast_to_unknown_peer_errors() {
        let network = InProcessNetwork::new();
        let transport = network.register(
            "leader",
            Arc::new(RecordingRouter {
                received: Arc::new(Mutex::new(Vec::new())),
            }),
        );
        assert!(transport.unicast("nobody", vec![1, 2, 3]).is_err());
    }

    #[tokio::test]
    async fn timer_fires_unless_cancelled() {
        let service = WheelTimerService::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let handle = service.schedule(
            5,
            Box::new(move || {
                fired_clone.store(true, Ordering::SeqCst);
            }),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(fired.load(Ordering::SeqCst));
        handle.cancel(); // no-op once fired
    }

    #[tokio::test]
    async fn cancelled_timer_does_not_fire() {
        let service = WheelTimerService::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let handle = service.schedule(
            20,
            Box::new(move || {
                fired_clone.store(true, Ordering::SeqCst);
            }),
        );
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
