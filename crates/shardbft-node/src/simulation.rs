//! In-process N-node simulation harness.
//!
//! Builds a committee of `n` keypairs, wires one leader and `n - 1` backups
//! over an [`InProcessNetwork`], starts the leader on a proposal, and waits
//! for the resulting [`ConsensusCompletion`]. Useful for smoke-testing a
//! build and for the `simulate` CLI subcommand; a real deployment wires
//! `ConsensusLeader`/`ConsensusBackup` over a networked `Transport` instead.

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use shardbft_consensus::{ConsensusBackup, ConsensusCompletion, ConsensusConfig, ConsensusLeader, Instance};
use shardbft_crypto::Keypair;
use shardbft_net::{InProcessNetwork, Router, Transport, WheelTimerService};
use shardbft_types::{Committee, InstanceId, Member};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::info;

const CLASS_BYTE: u8 = 0x01;
const INSTRUCTION_BYTE: u8 = 0x01;

/// Forwards inbound bytes to whichever router is installed later.
///
/// `InProcessNetwork::register` needs a router to spawn its draining task,
/// but a [`ConsensusLeader`]/[`ConsensusBackup`] needs the transport that
/// `register` returns before it can be constructed. This breaks that cycle:
/// every participant registers a `DeferredRouter` first, builds its real
/// instance against the transport it got back, then calls `set` once. No
/// frame is sent by any instance until after every participant is wired
/// (`start_consensus` runs only once all of them are), so nothing is ever
/// dropped waiting on an empty `target`.
struct DeferredRouter {
    target: Mutex<Option<Arc<dyn Router>>>,
}

impl DeferredRouter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            target: Mutex::new(None),
        })
    }

    fn set(&self, router: Arc<dyn Router>) {
        *self.target.lock() = Some(router);
    }
}

impl Router for DeferredRouter {
    fn on_message(&self, bytes: &[u8], from: &str) {
        if let Some(router) = self.target.lock().as_ref() {
            router.on_message(bytes, from);
        }
    }
}

/// Outcome of one simulated run.
#[derive(Debug)]
pub struct SimulationReport {
    /// The completion the leader and committee converged on.
    pub completion: ConsensusCompletion,
    /// Size of the simulated committee.
    pub committee_size: usize,
}

/// Runs one in-process consensus instance over `n` simulated nodes and
/// returns once the leader reports completion or `timeout` elapses.
///
/// # Errors
///
/// Returns an error if `n` is smaller than 2, if the leader fails to start,
/// or if no completion arrives within `timeout`.
pub async fn run_simulation(
    n: usize,
    proposal: Vec<u8>,
    config: ConsensusConfig,
    timeout: Duration,
) -> Result<SimulationReport> {
    if n < 2 {
        bail!("simulation needs at least 2 committee members, got {n}");
    }

    let keypairs: Vec<Arc<Keypair>> = (0..n).map(|_| Arc::new(Keypair::generate())).collect();
    let addresses: Vec<String> = (0..n).map(|i| format!("sim-node-{i}")).collect();
    let members: Vec<Member> = keypairs
        .iter()
        .zip(&addresses)
        .map(|(kp, addr)| Member::new(kp.public_key(), addr.clone()))
        .collect();

    let block_hash = shardbft_crypto_block_hash(&proposal);
    let network = InProcessNetwork::new();
    let timer = Arc::new(WheelTimerService);

    let (completion_tx, completion_rx) = oneshot::channel::<ConsensusCompletion>();
    let completion_tx = Arc::new(Mutex::new(Some(completion_tx)));

    let mut deferred = Vec::with_capacity(n);
    let mut transports = Vec::with_capacity(n);
    for addr in &addresses {
        let router = DeferredRouter::new();
        let transport = network.register(addr.clone(), router.clone());
        deferred.push(router);
        transports.push(Arc::new(transport));
    }

    let leader_committee = Committee::new(members.clone(), 0);
    let leader_instance = Instance::new(
        InstanceId::new(1, block_hash, CLASS_BYTE, INSTRUCTION_BYTE),
        leader_committee,
        Arc::clone(&keypairs[0]),
    );
    let leader = Arc::new(ConsensusLeader::new(
        leader_instance,
        config,
        Arc::clone(&transports[0]) as Arc<dyn Transport>,
        Arc::clone(&timer) as Arc<dyn shardbft_net::TimerService>,
        {
            let completion_tx = Arc::clone(&completion_tx);
            move |completion| {
                if let Some(tx) = completion_tx.lock().take() {
                    let _ = tx.send(completion);
                }
            }
        },
    ));
    deferred[0].set(Arc::clone(&leader) as Arc<dyn Router>);

    let mut backups = Vec::with_capacity(n - 1);
    for i in 1..n {
        let committee = Committee::new(members.clone(), i as u16);
        let instance = Instance::new(
            InstanceId::new(1, block_hash, CLASS_BYTE, INSTRUCTION_BYTE),
            committee,
            Arc::clone(&keypairs[i]),
        );
        let backup = Arc::new(ConsensusBackup::new(
            instance,
            0,
            |_proposal: &[u8]| true,
            Arc::clone(&transports[i]) as Arc<dyn Transport>,
            |_completion| {},
        ));
        deferred[i].set(Arc::clone(&backup) as Arc<dyn Router>);
        backups.push(backup);
    }

    info!(n, "simulation wired, starting consensus");
    leader
        .start_consensus(proposal)
        .context("leader failed to start consensus")?;

    // The commit window closes on a wall-clock timer the leader only acts on
    // when the next COMMIT arrives (see the consensus core's timer control
    // flow). In this simulation every backup commits almost instantly, well
    // before `commit_window_ms` elapses, so nothing would ever nudge the
    // leader past ANNOUNCE_DONE. Sleep past the window, then have one backup
    // resend its round-one COMMIT to trigger the transition.
    tokio::time::sleep(Duration::from_millis(config.commit_window_ms + 50)).await;
    if let Some(first_backup) = backups.first() {
        first_backup.retry_commit();
    }

    let completion = tokio::time::timeout(timeout, completion_rx)
        .await
        .context("simulation timed out waiting for consensus completion")?
        .context("leader dropped its completion channel")?;

    Ok(SimulationReport {
        completion,
        committee_size: n,
    })
}

fn shardbft_crypto_block_hash(proposal: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"shardbft-node simulation");
    hasher.update(proposal);
    hasher.finalize().into()
}
