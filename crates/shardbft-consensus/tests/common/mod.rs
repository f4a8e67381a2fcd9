//! A synchronous, single-threaded stand-in for `shardbft_net`'s in-memory
//! transport and timer, built for deterministic end-to-end tests.
//!
//! `shardbft_net::InProcessNetwork` delivers frames from a separate `tokio`
//! task, so a handler is always long done (and has dropped its locks) before
//! the frame it sent reaches its destination. A transport that instead calls
//! the destination's `on_message` inline, from inside `unicast`, would
//! reenter a leader/backup instance's own state mutex while the outer
//! handler still held it (the leader, for instance, multicasts CHALLENGE
//! while still holding its state lock from the COMMIT that triggered it) and
//! deadlock. This mock preserves the "handler returns before its effects are
//! observed" property without any runtime: `unicast` enqueues, and the test
//! driver explicitly drains the queue between steps via `MockNetwork::drain`.

use parking_lot::Mutex;
use shardbft_net::{NetError, Result as NetResult, Router, TimerHandle, TimerService, Transport};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Envelope {
    to: String,
    from: String,
    bytes: Vec<u8>,
}

/// A shared directory of routers, addressed by committee address, plus a
/// pending-delivery queue drained explicitly by the test.
pub struct MockNetwork {
    routers: Mutex<HashMap<String, Arc<dyn Router>>>,
    queue: Mutex<VecDeque<Envelope>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routers: Mutex::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
        })
    }

    /// Registers `router` under `address` (overwriting any prior
    /// registration for that address) and returns a transport handle for the
    /// node at that address to send from.
    pub fn register(self: &Arc<Self>, address: impl Into<String>, router: Arc<dyn Router>) -> MockTransport {
        let address = address.into();
        self.routers.lock().insert(address.clone(), router);
        MockTransport {
            address,
            network: Arc::clone(self),
        }
    }

    /// Delivers every currently- and newly-queued envelope until the queue
    /// runs dry. Call this after any externally-triggered step (starting
    /// consensus, firing the timer, a manual `retry_commit`) to let its
    /// effects fully settle before asserting on state.
    pub fn drain(&self) {
        loop {
            let next = self.queue.lock().pop_front();
            let Some(envelope) = next else { break };
            let router = self.routers.lock().get(&envelope.to).cloned();
            if let Some(router) = router {
                router.on_message(&envelope.bytes, &envelope.from);
            }
        }
    }
}

/// One node's view of a [`MockNetwork`].
pub struct MockTransport {
    address: String,
    network: Arc<MockNetwork>,
}

impl Transport for MockTransport {
    fn unicast(&self, peer: &str, bytes: Vec<u8>) -> NetResult<()> {
        if !self.network.routers.lock().contains_key(peer) {
            return Err(NetError::UnknownPeer(peer.to_string()));
        }
        self.network.queue.lock().push_back(Envelope {
            to: peer.to_string(),
            from: self.address.clone(),
            bytes,
        });
        Ok(())
    }
}

/// A timer that only fires when a test calls [`MockTimerService::fire_all`].
pub struct MockTimerService {
    pending: Mutex<Vec<(Box<dyn FnOnce() + Send>, Arc<AtomicBool>)>>,
}

impl MockTimerService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Runs every not-yet-cancelled scheduled callback, in scheduling order,
    /// and clears the queue. Stands in for "the commit window has closed".
    pub fn fire_all(&self) {
        let pending = std::mem::take(&mut *self.pending.lock());
        for (callback, cancelled) in pending {
            if !cancelled.load(Ordering::SeqCst) {
                callback();
            }
        }
    }
}

impl TimerService for MockTimerService {
    fn schedule(&self, _delay_ms: u64, callback: Box<dyn FnOnce() + Send>) -> Arc<dyn TimerHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.pending.lock().push((callback, Arc::clone(&cancelled)));
        Arc::new(MockTimerHandle { cancelled })
    }
}

struct MockTimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle for MockTimerHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
