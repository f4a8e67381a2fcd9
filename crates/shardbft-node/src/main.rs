//! `shardbft-node`: runs a leader or backup consensus instance, or an
//! in-process N-node simulation, over the in-memory transport.

use anyhow::Result;
use clap::{Parser, Subcommand};
use shardbft_consensus::ConsensusConfig;
use std::path::PathBuf;
use std::time::Duration;

mod config;
mod logging;
mod simulation;

use config::NodeConfig;

/// shardbft-node - two-round Schnorr multi-signature BFT consensus host
#[derive(Parser, Debug)]
#[command(name = "shardbft-node")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Missing file falls back to
    /// defaults merged with environment variables.
    #[arg(short, long, default_value = "shardbft.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs this node as the committee leader of an in-process simulation.
    RunLeader {
        /// Total committee size, including this leader.
        #[arg(long, default_value_t = 4)]
        committee_size: usize,
        /// Proposal bytes to drive to consensus, as a UTF-8 string.
        #[arg(long, default_value = "genesis block")]
        proposal: String,
    },

    /// Runs this node as a committee backup of an in-process simulation.
    ///
    /// `shardbft-net` does not ship a networked transport, so a standalone
    /// backup process cannot reach a leader running in a different process;
    /// this subcommand still spins up the full committee in-process and
    /// reports from the backup's vantage point, mirroring `run-leader`.
    RunBackup {
        /// Total committee size, including the leader.
        #[arg(long, default_value_t = 4)]
        committee_size: usize,
        /// Proposal bytes to drive to consensus, as a UTF-8 string.
        #[arg(long, default_value = "genesis block")]
        proposal: String,
    },

    /// Runs a full in-process committee and reports the final collective
    /// signature once consensus completes.
    Simulate {
        /// Total committee size.
        #[arg(long, default_value_t = 4)]
        committee_size: usize,
        /// Proposal bytes to drive to consensus, as a UTF-8 string.
        #[arg(long, default_value = "genesis block")]
        proposal: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut node_config = if cli.config.exists() {
        NodeConfig::from_file(&cli.config)?
    } else {
        NodeConfig::default()
    };
    node_config.merge_env()?;
    node_config.validate_config()?;

    logging::init_logging(&node_config.logging);

    match cli.command {
        Commands::RunLeader {
            committee_size,
            proposal,
        } => {
            tracing::info!(committee_size, "running as committee leader");
            run_and_report(committee_size, proposal, node_config.consensus).await?;
        }
        Commands::RunBackup {
            committee_size,
            proposal,
        } => {
            tracing::info!(committee_size, "running as committee backup");
            run_and_report(committee_size, proposal, node_config.consensus).await?;
        }
        Commands::Simulate {
            committee_size,
            proposal,
        } => {
            run_and_report(committee_size, proposal, node_config.consensus).await?;
        }
    }

    Ok(())
}

async fn run_and_report(committee_size: usize, proposal: String, config: ConsensusConfig) -> Result<()> {
    let timeout = Duration::from_millis(config.commit_window_ms * 2 + 5_000);
    let report =
        simulation::run_simulation(committee_size, proposal.into_bytes(), config, timeout).await?;

    tracing::info!(
        committee_size = report.committee_size,
        signature = %hex::encode(report.completion.collective_signature.as_bytes()),
        participants = report.completion.participation_bitmap.popcount(),
        "consensus complete"
    );
    Ok(())
}
