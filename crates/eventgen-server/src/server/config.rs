use anyhow::{Context, bail};
use clap::{ArgAction, Parser, ValueEnum};
use core::time::Duration;
use eventgen_core::{BatchSettings, Schema, SinkSettings, StartRequest};
use std::path::{Path, PathBuf};

/// Runtime configuration for the `eventgen-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first). The generator defaults apply both to the autostarted
/// run and to `/api/msg/random` requests that omit a parameter.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "eventgen-server",
    version,
    about = "Publishes synthetic events from a dynamically sized worker pool"
)]
pub struct CliArgs {
    /// Address the HTTP control API listens on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8001"))]
    pub server_addr: String,

    /// Topic the events are published to. Also prefixes worker names.
    ///
    /// Environment variable: `EVENT_TOPIC`
    #[arg(long, env = "EVENT_TOPIC", default_value_t = String::from("EventTopic"))]
    pub event_topic: String,

    /// Path to an Avro-style record schema (`.avsc`, JSON). When set, events
    /// missing any schema field are rejected by the sink.
    ///
    /// Environment variable: `EVENT_AVSC`
    #[arg(long, env = "EVENT_AVSC")]
    pub event_avsc: Option<PathBuf>,

    /// Value of the `location` field of every event.
    ///
    /// Environment variable: `GOOGLE_CLOUD_LOCATION`
    #[arg(long, env = "GOOGLE_CLOUD_LOCATION", default_value_t = String::from("west"))]
    pub location: String,

    /// Messages buffered by the sink before a batch is sent.
    ///
    /// Environment variable: `PUBLISHER_BATCH_SIZE`
    #[arg(long, env = "PUBLISHER_BATCH_SIZE", default_value_t = 100)]
    pub publisher_batch_size: usize,

    /// Background tasks the bus client may use to send batches (0 = client
    /// default).
    ///
    /// Environment variable: `PUBLISHER_THREADS`
    #[arg(long, env = "PUBLISHER_THREADS", default_value_t = 0)]
    pub publisher_threads: usize,

    /// Messages in flight before publishing blocks (0 = client default).
    ///
    /// Environment variable: `PUBLISHER_FLOW_CONTROL_MAX_OUTSTANDING_MESSAGES`
    #[arg(
        long,
        env = "PUBLISHER_FLOW_CONTROL_MAX_OUTSTANDING_MESSAGES",
        default_value_t = 100
    )]
    pub publisher_max_outstanding: usize,

    /// Default number of publishing workers.
    ///
    /// Environment variable: `EVENT_GENERATOR_THREADS`
    #[arg(long, env = "EVENT_GENERATOR_THREADS", default_value_t = 200)]
    pub threads: usize,

    /// Default per-worker runtime in minutes. `0` publishes until stopped.
    ///
    /// Environment variable: `EVENT_GENERATOR_RUNTIME`
    #[arg(long, env = "EVENT_GENERATOR_RUNTIME", default_value_t = 5.0)]
    pub runtime_minutes: f64,

    /// Default number of messages per worker. `0` is unlimited.
    ///
    /// Environment variable: `EVENT_GENERATOR_TIMES`
    #[arg(long, env = "EVENT_GENERATOR_TIMES", default_value_t = 0)]
    pub times: u64,

    /// Default pause between two messages of one worker, in seconds.
    ///
    /// Environment variable: `EVENT_GENERATOR_SLEEP`
    #[arg(long, env = "EVENT_GENERATOR_SLEEP", default_value_t = 0.0)]
    pub sleep_seconds: f64,

    /// Start generating with the defaults above as soon as the server boots.
    ///
    /// Environment variable: `EVENT_GENERATOR_AUTOSTART`
    #[arg(long, env = "EVENT_GENERATOR_AUTOSTART", default_value_t = true, action = ArgAction::Set)]
    pub autostart: bool,

    /// Seconds to wait for the generator to drain on SIGINT/SIGTERM.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 10)]
    pub shutdown_timeout: u64,

    /// Log output format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub location: String,
    pub sink_settings: SinkSettings,
    pub defaults: StartRequest,
    pub autostart: bool,
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.publisher_batch_size == 0 {
            bail!("PUBLISHER_BATCH_SIZE must be greater than 0");
        }

        let Some(timeout) = minutes(args.runtime_minutes) else {
            bail!(
                "EVENT_GENERATOR_RUNTIME ({}) must be a non-negative number of minutes",
                args.runtime_minutes
            );
        };
        let Some(delay) = seconds(args.sleep_seconds) else {
            bail!(
                "EVENT_GENERATOR_SLEEP ({}) must be a non-negative number of seconds",
                args.sleep_seconds
            );
        };

        let mut sink_settings =
            SinkSettings::new(args.event_topic).with_batching(BatchSettings {
                batch_size: args.publisher_batch_size,
                num_tasks: args.publisher_threads,
                max_outstanding: args.publisher_max_outstanding,
            });
        if let Some(path) = &args.event_avsc {
            sink_settings = sink_settings.with_schema(load_schema(path)?);
        }

        Ok(Self {
            server_addr: args.server_addr,
            location: args.location,
            sink_settings,
            defaults: StartRequest::new(args.threads)
                .with_timeout(timeout)
                .with_max_count(args.times)
                .with_delay(delay),
            autostart: args.autostart,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            log_format: args.log_format,
        })
    }
}

fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid schema {}", path.display()))
}

/// Converts fractional minutes into a [`Duration`]. `None` for negative or
/// non-finite input.
pub fn minutes(value: f64) -> Option<Duration> {
    seconds(value * 60.0)
}

/// Converts fractional seconds into a [`Duration`]. `None` for negative or
/// non-finite input.
pub fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let args = CliArgs::try_parse_from(
            std::iter::once("eventgen-server").chain(args.iter().copied()),
        )?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn converts_generator_defaults() {
        let config = parse(&[
            "--threads",
            "3",
            "--runtime-minutes",
            "0.5",
            "--times",
            "10",
            "--sleep-seconds",
            "0.25",
            "--autostart",
            "false",
        ])
        .unwrap();

        assert_eq!(config.defaults.workers, 3);
        assert_eq!(config.defaults.timeout, Duration::from_secs(30));
        assert_eq!(config.defaults.max_count, 10);
        assert_eq!(config.defaults.delay, Duration::from_millis(250));
        assert!(!config.autostart);
    }

    #[test]
    fn rejects_negative_runtime() {
        let err = parse(&["--runtime-minutes=-1"]).unwrap_err();
        assert!(err.to_string().contains("EVENT_GENERATOR_RUNTIME"), "{err}");
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = parse(&["--publisher-batch-size", "0"]).unwrap_err();
        assert!(err.to_string().contains("PUBLISHER_BATCH_SIZE"), "{err}");
    }

    #[test]
    fn rejects_missing_schema_file() {
        let err = parse(&["--event-avsc", "/definitely/not/here.avsc"]).unwrap_err();
        assert!(err.to_string().contains("failed to read schema"), "{err}");
    }

    #[test]
    fn loads_bundled_schema() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/Event.avsc");
        let config = parse(&["--event-avsc", path]).unwrap();
        let schema = config.sink_settings.schema.expect("schema loaded");
        assert_eq!(schema.name, "Event");
        assert_eq!(schema.fields.len(), 8);
    }

    #[test]
    fn duration_helpers_reject_invalid_input() {
        assert_eq!(minutes(2.0), Some(Duration::from_secs(120)));
        assert_eq!(seconds(0.0), Some(Duration::ZERO));
        assert_eq!(seconds(-0.5), None);
        assert_eq!(minutes(f64::NAN), None);
        assert_eq!(seconds(f64::INFINITY), None);
    }
}
