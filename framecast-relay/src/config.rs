//! Configuration for the framecast relay.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::{ExportError, PipelineConfig, Strategy};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Export cadence and strategy.
    pub pipeline: PipelineSection,
    /// Synthetic render source.
    pub source: SourceConfig,
    /// Where frames go.
    pub sink: SinkConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Export one tick in every `frame_skip` (0 is treated as 1).
    pub frame_skip: u32,
    /// "raw" or "text-safe".
    pub strategy: Strategy,
}

/// Render source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Render ticks per second.
    pub tick_hz: u32,
    /// Test pattern width in pixels.
    pub width: u32,
    /// Test pattern height in pixels.
    pub height: u32,
}

/// Transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Chunked UDP datagrams to `remote`.
    Udp,
    /// Newline-delimited JSON on stdout (text-safe only).
    Stdout,
    /// Discard frames.
    Null,
}

/// Sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Local address the UDP sender binds.
    pub bind: String,
    /// Destination for UDP frames.
    pub remote: String,
    /// Address `--receive` listens on.
    pub listen: String,
    /// Datagram size limit.
    pub mtu: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Seconds between throughput summaries (0 disables them).
    pub stats_interval_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for PipelineSection {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            frame_skip: defaults.frame_skip.get(),
            strategy: defaults.strategy,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            width: 640,
            height: 360,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Udp,
            bind: "0.0.0.0:0".into(),
            remote: "127.0.0.1:7340".into(),
            listen: "0.0.0.0:7340".into(),
            mtu: 1400,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            stats_interval_secs: 5,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl RelayConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Pipeline settings with out-of-range values clamped.
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            frame_skip: NonZeroU32::new(self.pipeline.frame_skip).unwrap_or(NonZeroU32::MIN),
            strategy: self.pipeline.strategy,
        }
    }

    /// Interval between render ticks, tick rate clamped to 1..=240 Hz.
    pub fn tick_interval(&self) -> Duration {
        let hz = self.source.tick_hz.clamp(1, 240);
        Duration::from_secs_f64(1.0 / hz as f64)
    }

    pub fn remote_addr(&self) -> Result<SocketAddr, ExportError> {
        parse_addr("sink.remote", &self.sink.remote)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ExportError> {
        parse_addr("sink.listen", &self.sink.listen)
    }

    /// Reject combinations the pipeline cannot serve.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.sink.kind == SinkKind::Stdout && self.pipeline.strategy == Strategy::Raw {
            return Err(ExportError::InvalidConfig(
                "stdout sink requires strategy = \"text-safe\"".into(),
            ));
        }
        if self.sink.kind == SinkKind::Udp {
            self.remote_addr()?;
        }
        Ok(())
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, ExportError> {
    value
        .parse()
        .map_err(|e| ExportError::InvalidConfig(format!("{field} = {value:?}: {e}")))
}

// ── Tests ────────────────────────────────────────────────────────
