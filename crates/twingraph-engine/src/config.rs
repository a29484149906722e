//! Configuration for the engine.
//!
//! All configuration is loaded from environment variables. The run mode is
//! the first command-line argument.

use std::time::Duration;

use twingraph_sync::ProcessorConfig;

use crate::error::EngineError;

/// What the engine does once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Consume twin change notifications until interrupted.
    Notifications,
    /// Sync a twin listing once and exit.
    Sync,
}

impl Mode {
    /// Parse the mode from the command-line arguments (program name
    /// excluded). Defaults to [`Mode::Notifications`].
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, EngineError> {
        match args.next().as_deref() {
            None | Some("notifications") => Ok(Self::Notifications),
            Some("sync") => Ok(Self::Sync),
            Some(other) => Err(EngineError::Config(format!(
                "unknown mode {other}, expected notifications or sync"
            ))),
        }
    }
}

/// Which graph store to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphBackend {
    /// Gremlin Server HTTP endpoint.
    Gremlin {
        /// Endpoint URL (e.g. `http://localhost:8182/gremlin`).
        url: String,
    },
    /// Process-local graph, discarded on exit.
    Memory,
}

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Run mode.
    pub mode: Mode,
    /// Graph store selection.
    pub graph_backend: GraphBackend,
    /// Per-query graph timeout.
    pub query_timeout: Duration,
    /// Whether to create the building topology at startup.
    pub seed_topology: bool,
    /// NATS server URL; required in notifications mode.
    pub nats_url: Option<String>,
    /// JetStream stream carrying twin change events.
    pub stream: String,
    /// Durable consumer name prefix; one consumer per partition.
    pub consumer_name: String,
    /// Partition ids to serve.
    pub partitions: Vec<String>,
    /// Maximum events per fetched batch.
    pub batch_size: usize,
    /// How long a fetch waits for events.
    pub batch_expires: Duration,
    /// Batch retry and stall alert tuning.
    pub processor: ProcessorConfig,
    /// Twin listing to sync; required in sync mode.
    pub twins_file: Option<String>,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// - `GRAPH_BACKEND` -- `gremlin` (default) or `memory`
    /// - `GREMLIN_URL` -- required for the `gremlin` backend
    /// - `GRAPH_QUERY_TIMEOUT_MS` -- per-query timeout (default 10000)
    /// - `SEED_TOPOLOGY` -- create the topology at startup (default `true`)
    /// - `NATS_URL` -- required in notifications mode
    /// - `TWIN_STREAM` -- stream name (default `TWIN_CHANGES`)
    /// - `CONSUMER_NAME` -- consumer prefix (default `twin-graph-sync`)
    /// - `PARTITIONS` -- comma-separated partition ids (default `0`)
    /// - `BATCH_SIZE` -- events per batch (default 100)
    /// - `BATCH_EXPIRES_MS` -- fetch wait (default 5000)
    /// - `RETRY_DELAY_MS` -- delay between failed passes (default 1000)
    /// - `STALL_ALERT_PASSES` -- stalled passes before error logs (default 10)
    /// - `TWINS_FILE` -- JSON twin listing, required in sync mode
    pub fn from_env(mode: Mode) -> Result<Self, EngineError> {
        Self::from_lookup(mode, |name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(
        mode: Mode,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, EngineError> {
        let graph_backend = match lookup("GRAPH_BACKEND")
            .unwrap_or_else(|| "gremlin".to_owned())
            .to_lowercase()
            .as_str()
        {
            "gremlin" => GraphBackend::Gremlin {
                url: required(&lookup, "GREMLIN_URL")?,
            },
            "memory" => GraphBackend::Memory,
            other => {
                return Err(EngineError::Config(format!(
                    "unknown GRAPH_BACKEND: {other}"
                )));
            }
        };

        let query_timeout_ms: u64 = parsed(&lookup, "GRAPH_QUERY_TIMEOUT_MS", "10000")?;
        let seed_topology: bool = parsed(&lookup, "SEED_TOPOLOGY", "true")?;
        let batch_size: usize = parsed(&lookup, "BATCH_SIZE", "100")?;
        let batch_expires_ms: u64 = parsed(&lookup, "BATCH_EXPIRES_MS", "5000")?;
        let retry_delay_ms: u64 = parsed(&lookup, "RETRY_DELAY_MS", "1000")?;
        let stall_alert_passes: u32 = parsed(&lookup, "STALL_ALERT_PASSES", "10")?;

        let partitions: Vec<String> = lookup("PARTITIONS")
            .unwrap_or_else(|| "0".to_owned())
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .collect();
        if partitions.is_empty() {
            return Err(EngineError::Config("PARTITIONS lists no partition".to_owned()));
        }
        if batch_size == 0 {
            return Err(EngineError::Config("BATCH_SIZE must be at least 1".to_owned()));
        }

        let nats_url = lookup("NATS_URL");
        let twins_file = lookup("TWINS_FILE");
        match mode {
            Mode::Notifications if nats_url.is_none() => {
                return Err(EngineError::Config(
                    "missing required env var NATS_URL".to_owned(),
                ));
            }
            Mode::Sync if twins_file.is_none() => {
                return Err(EngineError::Config(
                    "missing required env var TWINS_FILE".to_owned(),
                ));
            }
            _ => {}
        }

        Ok(Self {
            mode,
            graph_backend,
            query_timeout: Duration::from_millis(query_timeout_ms),
            seed_topology,
            nats_url,
            stream: lookup("TWIN_STREAM").unwrap_or_else(|| "TWIN_CHANGES".to_owned()),
            consumer_name: lookup("CONSUMER_NAME")
                .unwrap_or_else(|| "twin-graph-sync".to_owned()),
            partitions,
            batch_size,
            batch_expires: Duration::from_millis(batch_expires_ms),
            processor: ProcessorConfig {
                retry_delay: Duration::from_millis(retry_delay_ms),
                stall_alert_passes,
            },
            twins_file,
        })
    }
}

/// Read a required variable.
fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, EngineError> {
    lookup(name).ok_or_else(|| EngineError::Config(format!("missing required env var {name}")))
}

/// Read and parse a variable, falling back to `default`.
fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<T, EngineError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .unwrap_or_else(|| default.to_owned())
        .trim()
        .parse()
        .map_err(|e| EngineError::Config(format!("invalid {name}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn notification_defaults() {
        let config = EngineConfig::from_lookup(
            Mode::Notifications,
            lookup(&[
                ("GREMLIN_URL", "http://localhost:8182/gremlin"),
                ("NATS_URL", "nats://localhost:4222"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.graph_backend,
            GraphBackend::Gremlin {
                url: "http://localhost:8182/gremlin".to_owned()
            }
        );
        assert_eq!(config.query_timeout, Duration::from_secs(10));
        assert!(config.seed_topology);
        assert_eq!(config.stream, "TWIN_CHANGES");
        assert_eq!(config.consumer_name, "twin-graph-sync");
        assert_eq!(config.partitions, ["0"]);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.batch_expires, Duration::from_secs(5));
        assert_eq!(config.processor, ProcessorConfig::default());
    }

    #[test]
    fn partitions_and_memory_backend() {
        let config = EngineConfig::from_lookup(
            Mode::Notifications,
            lookup(&[
                ("GRAPH_BACKEND", "memory"),
                ("NATS_URL", "nats://localhost:4222"),
                ("PARTITIONS", "0, 1,,3"),
                ("RETRY_DELAY_MS", "250"),
            ]),
        )
        .unwrap();
        assert_eq!(config.graph_backend, GraphBackend::Memory);
        assert_eq!(config.partitions, ["0", "1", "3"]);
        assert_eq!(config.processor.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn mode_requirements() {
        let memory = [("GRAPH_BACKEND", "memory")];
        assert!(EngineConfig::from_lookup(Mode::Notifications, lookup(&memory)).is_err());
        assert!(EngineConfig::from_lookup(Mode::Sync, lookup(&memory)).is_err());

        let sync = EngineConfig::from_lookup(
            Mode::Sync,
            lookup(&[("GRAPH_BACKEND", "memory"), ("TWINS_FILE", "twins.json")]),
        )
        .unwrap();
        assert_eq!(sync.twins_file.as_deref(), Some("twins.json"));
        assert!(sync.nats_url.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = [("GRAPH_BACKEND", "memory"), ("TWINS_FILE", "t.json")];
        for (name, value) in [
            ("GRAPH_QUERY_TIMEOUT_MS", "soon"),
            ("SEED_TOPOLOGY", "yes please"),
            ("BATCH_SIZE", "0"),
            ("PARTITIONS", " , "),
            ("GRAPH_BACKEND", "neo4j"),
        ] {
            let mut vars = base.to_vec();
            vars.retain(|(k, _)| *k != name);
            vars.push((name, value));
            assert!(
                EngineConfig::from_lookup(Mode::Sync, lookup(&vars)).is_err(),
                "{name}={value}"
            );
        }
    }

    #[test]
    fn mode_parsing() {
        let args = |a: &[&str]| a.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>().into_iter();
        assert_eq!(Mode::from_args(args(&[])).unwrap(), Mode::Notifications);
        assert_eq!(Mode::from_args(args(&["sync"])).unwrap(), Mode::Sync);
        assert!(Mode::from_args(args(&["replay"])).is_err());
    }
}
