//! Prometheus metrics for the voter.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] that the RPC `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};

use govproxy_governance::TickReport;

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Completed scheduler ticks.
    pub ticks: IntCounter,
    /// First votes acknowledged by the chain.
    pub first_votes: IntCounter,
    /// Corrective second votes acknowledged by the chain.
    pub revotes: IntCounter,
    /// Pending votes found on chain after a lost acknowledgement.
    pub reconciled_votes: IntCounter,
    /// Evaluations deferred because sentiment could not be read.
    pub sentiment_deferrals: IntCounter,
    /// Submission attempts that failed transiently.
    pub transient_failures: IntCounter,
    /// Votes refused by the chain.
    pub rejections: IntCounter,
    /// Records moved to `Closed`.
    pub records_closed: IntCounter,
    /// Record evaluations that aborted (store failures, task panics).
    pub evaluation_errors: IntCounter,
    /// Feed polls that failed.
    pub feed_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Records not yet closed, as of the last tick.
    pub open_records: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of one scheduler tick, in milliseconds.
    pub tick_duration_ms: Histogram,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let ticks = register_int_counter_with_registry!(
            Opts::new("govproxy_ticks_total", "Scheduler ticks completed"),
            registry
        )
        .expect("failed to register ticks counter");

        let first_votes = register_int_counter_with_registry!(
            Opts::new("govproxy_first_votes_total", "First votes acknowledged"),
            registry
        )
        .expect("failed to register first_votes counter");

        let revotes = register_int_counter_with_registry!(
            Opts::new("govproxy_revotes_total", "Corrective votes acknowledged"),
            registry
        )
        .expect("failed to register revotes counter");

        let reconciled_votes = register_int_counter_with_registry!(
            Opts::new(
                "govproxy_reconciled_votes_total",
                "Pending votes recovered from on-chain history"
            ),
            registry
        )
        .expect("failed to register reconciled_votes counter");

        let sentiment_deferrals = register_int_counter_with_registry!(
            Opts::new(
                "govproxy_sentiment_deferrals_total",
                "Evaluations deferred for lack of sentiment"
            ),
            registry
        )
        .expect("failed to register sentiment_deferrals counter");

        let transient_failures = register_int_counter_with_registry!(
            Opts::new(
                "govproxy_transient_submission_failures_total",
                "Vote submissions that failed transiently"
            ),
            registry
        )
        .expect("failed to register transient_failures counter");

        let rejections = register_int_counter_with_registry!(
            Opts::new("govproxy_vote_rejections_total", "Votes rejected by the chain"),
            registry
        )
        .expect("failed to register rejections counter");

        let records_closed = register_int_counter_with_registry!(
            Opts::new("govproxy_records_closed_total", "Referendum records closed"),
            registry
        )
        .expect("failed to register records_closed counter");

        let evaluation_errors = register_int_counter_with_registry!(
            Opts::new(
                "govproxy_evaluation_errors_total",
                "Record evaluations aborted by an error"
            ),
            registry
        )
        .expect("failed to register evaluation_errors counter");

        let feed_failures = register_int_counter_with_registry!(
            Opts::new("govproxy_feed_failures_total", "Failed referendum feed polls"),
            registry
        )
        .expect("failed to register feed_failures counter");

        let open_records = register_int_gauge_with_registry!(
            Opts::new("govproxy_open_records", "Referendum records not yet closed"),
            registry
        )
        .expect("failed to register open_records gauge");

        // 1 ms → ~32 s
        let tick_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new("govproxy_tick_duration_ms", "Scheduler tick duration in milliseconds")
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 16).expect("valid bucket layout")),
            registry
        )
        .expect("failed to register tick_duration_ms histogram");

        Self {
            registry,
            ticks,
            first_votes,
            revotes,
            reconciled_votes,
            sentiment_deferrals,
            transient_failures,
            rejections,
            records_closed,
            evaluation_errors,
            feed_failures,
            open_records,
            tick_duration_ms,
        }
    }

    /// Fold one tick's report into the counters.
    pub fn record_tick(&self, report: &TickReport, duration_ms: f64) {
        self.ticks.inc();
        self.first_votes.inc_by(u64::from(report.first_votes));
        self.revotes.inc_by(u64::from(report.revotes));
        self.reconciled_votes.inc_by(u64::from(report.reconciled));
        self.sentiment_deferrals
            .inc_by(u64::from(report.sentiment_deferrals));
        self.transient_failures
            .inc_by(u64::from(report.transient_failures));
        self.rejections.inc_by(u64::from(report.rejections));
        self.records_closed.inc_by(u64::from(report.closed));
        self.evaluation_errors.inc_by(u64::from(report.errors));
        self.tick_duration_ms.observe(duration_ms);
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
