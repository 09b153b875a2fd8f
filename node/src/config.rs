//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use govproxy_governance::EngineConfig;
use govproxy_types::{Conviction, DecisionRule, Network};

use crate::NodeError;

/// Configuration for one voter deployment.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so
/// an empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Which network this deployment votes on.
    #[serde(default = "default_network")]
    pub network: Network,

    /// Data directory for the record store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Vote period policy table (TOML).
    #[serde(default = "default_policy_path")]
    pub policy_path: PathBuf,

    /// Seconds between scheduler ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Upper bound on any single sentiment, submission, or feed call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Records evaluated concurrently within one tick.
    #[serde(default = "default_max_concurrent_evaluations")]
    pub max_concurrent_evaluations: usize,

    /// Base URL of the internal sentiment service.
    #[serde(default = "default_sentiment_url")]
    pub sentiment_url: String,

    /// Base URL of the signing vote submitter.
    #[serde(default = "default_submitter_url")]
    pub submitter_url: String,

    /// Base URL of the ongoing-referenda feed.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Conviction attached to every vote.
    #[serde(default)]
    pub conviction: Conviction,

    /// Tally-to-decision mapping parameters.
    #[serde(default)]
    pub decision_rule: DecisionRule,

    /// Whether to serve the operator RPC surface.
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    /// RPC port (if enabled).
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> Network {
    Network::Polkadot
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./govproxy_data")
}

fn default_policy_path() -> PathBuf {
    PathBuf::from("config/vote_periods.toml")
}

fn default_tick_interval_secs() -> u64 {
    300
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_evaluations() -> usize {
    8
}

fn default_sentiment_url() -> String {
    "http://127.0.0.1:7181".to_string()
}

fn default_submitter_url() -> String {
    "http://127.0.0.1:7182".to_string()
}

fn default_feed_url() -> String {
    "http://127.0.0.1:7183".to_string()
}

fn default_true() -> bool {
    true
}

fn default_rpc_port() -> u16 {
    7180
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.tick_interval_secs == 0 {
            return Err(NodeError::Config("tick_interval_secs must be positive".into()));
        }
        if self.call_timeout_secs == 0 {
            return Err(NodeError::Config("call_timeout_secs must be positive".into()));
        }
        if self.max_concurrent_evaluations == 0 {
            return Err(NodeError::Config(
                "max_concurrent_evaluations must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Engine tunables derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            call_timeout: self.call_timeout(),
            max_concurrent_evaluations: self.max_concurrent_evaluations,
            conviction: self.conviction,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            data_dir: default_data_dir(),
            policy_path: default_policy_path(),
            tick_interval_secs: default_tick_interval_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            max_concurrent_evaluations: default_max_concurrent_evaluations(),
            sentiment_url: default_sentiment_url(),
            submitter_url: default_submitter_url(),
            feed_url: default_feed_url(),
            conviction: Conviction::default(),
            decision_rule: DecisionRule::default(),
            enable_rpc: default_true(),
            rpc_port: default_rpc_port(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.rpc_port, config.rpc_port);
        assert_eq!(parsed.network, config.network);
        assert_eq!(parsed.decision_rule, config.decision_rule);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.tick_interval_secs, 300);
        assert_eq!(config.call_timeout_secs, 30);
        assert_eq!(config.max_concurrent_evaluations, 8);
        assert_eq!(config.rpc_port, 7180);
        assert_eq!(config.conviction, Conviction::None);
        assert_eq!(config.decision_rule.min_participation, 1);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            network = "kusama"
            conviction = "locked2x"
            call_timeout_secs = 5

            [decision_rule]
            min_participation = 10
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.network, Network::Kusama);
        assert_eq!(config.conviction, Conviction::Locked2x);
        assert_eq!(config.decision_rule.min_participation, 10);

        let engine = config.engine_config();
        assert_eq!(engine.call_timeout, Duration::from_secs(5));
        assert_eq!(engine.conviction, Conviction::Locked2x);
        assert_eq!(config.log_format, "human"); // default
    }

    #[test]
    fn shipped_example_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/govproxy.toml");
        let config = NodeConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.network, Network::Kusama);
        assert_eq!(config.rpc_port, 7180);
        assert_eq!(config.policy_path, PathBuf::from("config/vote_periods.toml"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = NodeConfig::from_toml_str("tick_interval_secs = 0");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file(Path::new("/nonexistent/govproxy.toml"));
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
