//! Governance proxy voter daemon.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;

use govproxy_governance::PolicyTable;
use govproxy_node::{init_logging, HttpVoteNode, LogFormat, NodeConfig};
use govproxy_rpc::handlers::RecordView;
use govproxy_store::{ReferendumRecord, ReferendumStore};
use govproxy_store_lmdb::LmdbEnvironment;
use govproxy_types::{Network, RecordKey, ReferendumId, Timestamp};

#[derive(Parser)]
#[command(name = "govproxy-daemon", about = "Governance proxy voter daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// flags and environment variables override them.
    #[arg(long, env = "GOVPROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Network to vote on: "polkadot" or "kusama".
    #[arg(long, env = "GOVPROXY_NETWORK")]
    network: Option<Network>,

    /// Data directory for the record store.
    #[arg(long, env = "GOVPROXY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Vote period policy table.
    #[arg(long, env = "GOVPROXY_POLICY")]
    policy: Option<PathBuf>,

    /// Seconds between scheduler ticks.
    #[arg(long, env = "GOVPROXY_TICK_INTERVAL_SECS")]
    tick_interval_secs: Option<u64>,

    /// Base URL of the sentiment service.
    #[arg(long, env = "GOVPROXY_SENTIMENT_URL")]
    sentiment_url: Option<String>,

    /// Base URL of the vote submitter.
    #[arg(long, env = "GOVPROXY_SUBMITTER_URL")]
    submitter_url: Option<String>,

    /// Base URL of the referendum feed.
    #[arg(long, env = "GOVPROXY_FEED_URL")]
    feed_url: Option<String>,

    /// Disable the operator RPC server.
    #[arg(long, env = "GOVPROXY_DISABLE_RPC")]
    disable_rpc: bool,

    /// RPC server port.
    #[arg(long, env = "GOVPROXY_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Log format: "human" or "json".
    #[arg(long, env = "GOVPROXY_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "GOVPROXY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the voter until SIGINT/SIGTERM.
    Run,

    /// Validate a vote period policy table and print it.
    CheckPolicy {
        /// Policy file to check.
        file: PathBuf,
    },

    /// Inspect the record store offline.
    Records {
        #[command(subcommand)]
        action: RecordsAction,
    },
}

#[derive(clap::Subcommand)]
enum RecordsAction {
    /// One line per record.
    List {
        /// Only records that are not closed.
        #[arg(long)]
        open: bool,
    },
    /// Full record as JSON.
    Show { network: Network, id: u32 },
}

impl Cli {
    /// File config (or defaults) with flags and env vars applied on top.
    fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(network) = self.network {
            config.network = network;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(policy) = &self.policy {
            config.policy_path = policy.clone();
        }
        if let Some(secs) = self.tick_interval_secs {
            config.tick_interval_secs = secs;
        }
        if let Some(url) = &self.sentiment_url {
            config.sentiment_url = url.clone();
        }
        if let Some(url) = &self.submitter_url {
            config.submitter_url = url.clone();
        }
        if let Some(url) = &self.feed_url {
            config.feed_url = url.clone();
        }
        if self.disable_rpc {
            config.enable_rpc = false;
        }
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.node_config()?;
    init_logging(config.log_format.parse::<LogFormat>()?, &config.log_level)?;

    match cli.command {
        Command::Run => run(config).await,
        Command::CheckPolicy { file } => check_policy(&file),
        Command::Records { action } => match action {
            RecordsAction::List { open } => list_records(&config, open),
            RecordsAction::Show { network, id } => {
                show_record(&config, RecordKey::new(network, ReferendumId::new(id)))
            }
        },
    }
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    tracing::info!(
        "Starting voter on {} (policy: {}, tick: {}s, RPC: {})",
        config.network,
        config.policy_path.display(),
        config.tick_interval_secs,
        if config.enable_rpc {
            config.rpc_port.to_string()
        } else {
            "off".into()
        },
    );

    let mut node = HttpVoteNode::new(config)?;
    node.start().await?;

    let shutdown = node.shutdown_controller().clone();
    shutdown.wait_for_signal().await;

    tracing::info!("Shutdown signal received, stopping voter");
    node.stop().await?;
    tracing::info!("voter exited cleanly");
    Ok(())
}

fn check_policy(file: &Path) -> anyhow::Result<()> {
    let table = PolicyTable::from_toml_file(file)
        .with_context(|| format!("policy table {} is invalid", file.display()))?;
    for (network, origin, entry) in table.iter() {
        println!(
            "{:<9} {:<20} internal={:>3}d revote={:>3}d decision={:>3}d",
            network.to_string(),
            origin.to_string(),
            entry.internal_vote_period_days,
            entry.revote_period_days,
            entry.decision_period_days
        );
    }
    println!("{}: {} entries OK", file.display(), table.len());
    Ok(())
}

/// Open the configured store without creating one.
fn open_store(config: &NodeConfig) -> anyhow::Result<LmdbEnvironment> {
    if !config.data_dir.join("data.mdb").exists() {
        bail!("no record store at {}", config.data_dir.display());
    }
    Ok(LmdbEnvironment::open_default(&config.data_dir)?)
}

fn summary_line(record: &ReferendumRecord, now: Timestamp) -> String {
    let vote = |decision: Option<govproxy_types::VoteDecision>| {
        decision.map_or_else(|| "-".to_string(), |d| d.to_string())
    };
    let mut line = format!(
        "{:<16} {:<20} {:<22} age={:>3}d first={:<7} second={:<7}",
        record.key.to_string(),
        record.origin.to_string(),
        record.phase.as_str(),
        record.age_days(now),
        vote(record.first_vote_decision),
        vote(record.second_vote_decision),
    );
    if let Some(reason) = &record.close_reason {
        line.push_str(&format!(" ({reason})"));
    }
    line
}

fn list_records(config: &NodeConfig, open_only: bool) -> anyhow::Result<()> {
    let store = open_store(config)?.referendum_store();
    let records = if open_only {
        store.list_open()?
    } else {
        store.list_all()?
    };
    let now = Timestamp::now();
    for record in &records {
        println!("{}", summary_line(record, now));
    }
    println!("{} record(s)", records.len());
    Ok(())
}

fn show_record(config: &NodeConfig, key: RecordKey) -> anyhow::Result<()> {
    let store = open_store(config)?.referendum_store();
    let Some(record) = store.get(&key)? else {
        bail!("no record for {key}");
    };
    let view = RecordView::new(&record, Timestamp::now());
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
