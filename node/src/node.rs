//! The voter node: owns the record store and drives the engine on a timer.
//!
//! Each tick polls the referendum feed, hands every announced referendum to
//! [`DecisionEngine::observe`], evaluates all open records once, updates the
//! metrics, and stamps the tick time into the meta store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use govproxy_governance::{
    Clock, DecisionEngine, GovernanceError, PolicyError, PolicyTable, ReferendumFeed,
    SentimentProvider, SystemClock, TickReport, VoteSubmitter,
};
use govproxy_rpc::{RpcServer, RpcState};
use govproxy_store::meta::LAST_TICK_KEY;
use govproxy_store::{MetaStore, ReferendumStore};
use govproxy_store_lmdb::integrity::{check_data_dir, check_integrity};
use govproxy_store_lmdb::{LmdbEnvironment, LmdbMetaStore, LmdbReferendumStore, Migrator};
use govproxy_types::{Network, Timestamp};

use crate::clients::{HttpReferendumFeed, HttpSentimentProvider, HttpVoteSubmitter};
use crate::shutdown::stopped;
use crate::tracing_spans::{feed_poll_span, startup_span, tick_span};
use crate::{NodeConfig, NodeError, NodeMetrics, ShutdownController};

/// Minimum time [`VoteNode::stop`] waits for background tasks.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The engine as the node runs it: LMDB-backed, collaborators generic.
pub type NodeEngine<P, V> = DecisionEngine<LmdbReferendumStore, P, V>;

/// A node talking to real HTTP collaborators.
pub type HttpVoteNode = VoteNode<HttpSentimentProvider, HttpVoteSubmitter, HttpReferendumFeed>;

/// Everything one tick needs; shared with the background loop.
struct Scheduler<P, V, F> {
    engine: Arc<NodeEngine<P, V>>,
    feed: Arc<F>,
    clock: Arc<dyn Clock>,
    meta: LmdbMetaStore,
    metrics: Arc<NodeMetrics>,
    network: Network,
    feed_timeout: Duration,
}

impl<P, V, F> Scheduler<P, V, F>
where
    P: SentimentProvider + 'static,
    V: VoteSubmitter + 'static,
    F: ReferendumFeed + 'static,
{
    async fn run_tick(&self, stop: watch::Receiver<bool>) -> Result<TickReport, NodeError> {
        self.poll_feed()
            .instrument(feed_poll_span(self.network.as_str()))
            .await;

        let started = Instant::now();
        let now = self.clock.now();
        let report = self.engine.tick_until(now, stop).await?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.metrics.record_tick(&report, elapsed_ms);
        let open = self.engine.store().list_open()?.len();
        self.metrics.open_records.set(open as i64);
        self.meta.put_meta(LAST_TICK_KEY, &now.as_secs().to_be_bytes())?;

        tracing::info!(
            evaluated = report.evaluated,
            votes = report.votes(),
            deferrals = report.sentiment_deferrals,
            closed = report.closed,
            errors = report.errors,
            not_started = report.not_started,
            open,
            elapsed_ms,
            "tick complete"
        );
        Ok(report)
    }

    /// Start tracking every referendum the feed announces. Failures here
    /// never stop the tick; already tracked records still get evaluated.
    async fn poll_feed(&self) {
        let ongoing = match tokio::time::timeout(self.feed_timeout, self.feed.ongoing()).await {
            Ok(Ok(ongoing)) => ongoing,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "referendum feed poll failed");
                self.metrics.feed_failures.inc();
                return;
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.feed_timeout, "referendum feed poll timed out");
                self.metrics.feed_failures.inc();
                return;
            }
        };

        for info in &ongoing {
            if info.key.network != self.network {
                tracing::debug!(key = %info.key, "ignoring referendum from another network");
                continue;
            }
            match self.engine.observe(info) {
                Ok(_) => {}
                Err(GovernanceError::Policy(PolicyError::UnknownOrigin { origin, .. })) => {
                    tracing::warn!(key = %info.key, %origin, "referendum on an origin without policy, not tracked");
                }
                Err(e) => {
                    tracing::error!(key = %info.key, error = %e, "failed to start tracking referendum");
                }
            }
        }
        tracing::debug!(announced = ongoing.len(), "feed polled");
    }
}

/// The long-running voter.
pub struct VoteNode<P, V, F> {
    config: NodeConfig,
    env: LmdbEnvironment,
    scheduler: Arc<Scheduler<P, V, F>>,
    shutdown: ShutdownController,
    task_handles: Vec<JoinHandle<()>>,
}

impl HttpVoteNode {
    /// Build a node from its configuration: policy table from
    /// `policy_path`, HTTP collaborators, and the wall clock.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let policy = PolicyTable::from_toml_file(&config.policy_path)?;
        let timeout = config.call_timeout();
        let sentiment = Arc::new(HttpSentimentProvider::new(
            &config.sentiment_url,
            config.decision_rule,
            timeout,
        ));
        let submitter = Arc::new(HttpVoteSubmitter::new(&config.submitter_url, timeout));
        let feed = Arc::new(HttpReferendumFeed::new(
            &config.feed_url,
            config.network,
            timeout,
        ));
        Self::with_collaborators(config, policy, sentiment, submitter, feed, Arc::new(SystemClock))
    }
}

impl<P, V, F> VoteNode<P, V, F>
where
    P: SentimentProvider + 'static,
    V: VoteSubmitter + 'static,
    F: ReferendumFeed + 'static,
{
    /// Open, migrate, and check the record store, then wire the engine.
    pub fn with_collaborators(
        config: NodeConfig,
        policy: PolicyTable,
        sentiment: Arc<P>,
        submitter: Arc<V>,
        feed: Arc<F>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let _span = startup_span(&config.data_dir.display().to_string()).entered();

        if !policy.covers(config.network) {
            return Err(NodeError::Config(format!(
                "policy table has no entries for {}",
                config.network
            )));
        }

        check_data_dir(&config.data_dir).map_err(NodeError::Integrity)?;
        let env = LmdbEnvironment::open_default(&config.data_dir)?;
        Migrator::run(&env.meta_store())?;

        let integrity = check_integrity(&env)?;
        if !integrity.is_healthy() {
            for problem in &integrity.errors {
                tracing::error!(%problem, "record store integrity problem");
            }
            return Err(NodeError::Integrity(format!(
                "{} problem(s) found in {}",
                integrity.errors.len(),
                config.data_dir.display()
            )));
        }
        tracing::info!(
            records = integrity.records_checked,
            open = integrity.open_records,
            "record store ready"
        );

        let metrics = Arc::new(NodeMetrics::new());
        metrics.open_records.set(integrity.open_records as i64);

        let engine = Arc::new(DecisionEngine::new(
            Arc::new(env.referendum_store()),
            Arc::new(policy),
            sentiment,
            submitter,
            config.engine_config(),
        ));
        let scheduler = Arc::new(Scheduler {
            engine,
            feed,
            clock,
            meta: env.meta_store(),
            metrics,
            network: config.network,
            feed_timeout: config.call_timeout(),
        });

        Ok(Self {
            config,
            env,
            scheduler,
            shutdown: ShutdownController::new(),
            task_handles: Vec::new(),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<NodeEngine<P, V>> {
        &self.scheduler.engine
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.scheduler.metrics
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Time of the last completed tick, if any.
    pub fn last_tick(&self) -> Result<Option<Timestamp>, NodeError> {
        let Some(bytes) = self.scheduler.meta.get_meta(LAST_TICK_KEY)? else {
            return Ok(None);
        };
        let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
            NodeError::Integrity(format!("{LAST_TICK_KEY} has unexpected byte length"))
        })?;
        Ok(Some(Timestamp::new(u64::from_be_bytes(arr))))
    }

    /// Run one tick now, outside the background loop.
    pub async fn tick_once(&self) -> Result<TickReport, NodeError> {
        self.scheduler
            .run_tick(self.shutdown.subscribe())
            .instrument(tick_span(self.config.network.as_str()))
            .await
    }

    /// Spawn the scheduler loop and, if enabled, the RPC server.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if !self.task_handles.is_empty() {
            return Err(NodeError::AlreadyStarted);
        }
        tracing::info!(
            network = %self.config.network,
            data_dir = %self.config.data_dir.display(),
            tick_interval_secs = self.config.tick_interval_secs,
            "voter node starting"
        );

        // ── Scheduler loop ────────────────────────────────────────────────
        let scheduler = Arc::clone(&self.scheduler);
        let mut shutdown_rx = self.shutdown.subscribe();
        let tick_stop = shutdown_rx.clone();
        let period = self.config.tick_interval();
        let scheduler_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stopped(&mut shutdown_rx) => {
                        tracing::info!("scheduler shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let span = tick_span(scheduler.network.as_str());
                        if let Err(e) = scheduler.run_tick(tick_stop.clone()).instrument(span).await {
                            tracing::error!(error = %e, "tick failed");
                        }
                    }
                }
            }
        });
        self.task_handles.push(scheduler_handle);

        // ── RPC server (optional) ─────────────────────────────────────────
        if self.config.enable_rpc {
            let rpc_state = Arc::new(RpcState {
                control: Arc::clone(&self.scheduler.engine),
                clock: Arc::clone(&self.scheduler.clock),
                registry: self.scheduler.metrics.registry.clone(),
            });
            let rpc_server = RpcServer::bind(self.config.rpc_port, rpc_state)
                .await
                .map_err(|e| NodeError::Rpc(e.to_string()))?;
            let mut shutdown_rx_rpc = self.shutdown.subscribe();
            tracing::info!(port = self.config.rpc_port, "RPC server listening");

            let rpc_handle = tokio::spawn(async move {
                let stop = async move { stopped(&mut shutdown_rx_rpc).await };
                match rpc_server.serve(stop).await {
                    Ok(()) => tracing::info!("RPC server stopped"),
                    Err(e) => tracing::error!(error = %e, "RPC server error"),
                }
            });
            self.task_handles.push(rpc_handle);
        }

        Ok(())
    }

    /// Request a stop, wait for the background tasks, then flush LMDB.
    ///
    /// A tick in progress starts no further evaluations once the stop is
    /// requested; the ones already running finish within their collaborator
    /// timeouts. The wait is bounded by that worst case plus a feed poll.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("voter node stopping");
        self.shutdown.shutdown();

        let worst_tick = self.scheduler.engine.config().evaluation_deadline()
            + self.config.call_timeout();
        let grace = SHUTDOWN_TIMEOUT.max(worst_tick);
        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(grace, wait_all).await.is_err() {
            tracing::warn!(?grace, "background tasks did not finish in time");
        }

        self.env.force_sync()?;
        tracing::info!("LMDB flushed to disk");
        tracing::info!("voter node stopped");
        Ok(())
    }
}
