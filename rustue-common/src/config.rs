//! Configuration structures for the UE stack
//!
//! All knobs the stack executor and its layers read at init time. The
//! structures deserialize from YAML; defaults mirror the reference sizing
//! (1024-entry queues, 2 background workers, 1000-TTI stat window).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::logging::LogLevel;

/// Per-layer log levels and hex dump limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// MAC layer log level
    #[serde(default)]
    pub mac_level: LogLevel,
    /// RLC layer log level
    #[serde(default)]
    pub rlc_level: LogLevel,
    /// PDCP layer log level
    #[serde(default)]
    pub pdcp_level: LogLevel,
    /// RRC layer log level
    #[serde(default)]
    pub rrc_level: LogLevel,
    /// NAS layer log level
    #[serde(default)]
    pub nas_level: LogLevel,
    /// Maximum payload bytes included in hex dumps
    #[serde(default = "default_hex_limit")]
    pub hex_limit: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            mac_level: LogLevel::Info,
            rlc_level: LogLevel::Info,
            pdcp_level: LogLevel::Info,
            rrc_level: LogLevel::Info,
            nas_level: LogLevel::Info,
            hex_limit: default_hex_limit(),
        }
    }
}

impl LogConfig {
    /// Builds a `tracing` env-filter expression from the per-layer levels.
    pub fn filter_string(&self) -> String {
        format!(
            "info,rustue_stack::layers::mac={},rustue_stack::layers::rlc={},\
             rustue_stack::layers::pdcp={},rustue_stack::layers::rrc={},\
             rustue_stack::layers::nas={}",
            self.mac_level, self.rlc_level, self.pdcp_level, self.rrc_level, self.nas_level
        )
    }
}

fn default_hex_limit() -> usize {
    64
}

/// Packet capture configuration. The capture sinks themselves are opaque
/// collaborators; this only controls whether and where they are attached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PcapConfig {
    /// Enable MAC-level capture
    #[serde(default)]
    pub enable: bool,
    /// MAC capture file path
    #[serde(default)]
    pub filename: String,
    /// Enable NAS-level capture
    #[serde(default)]
    pub nas_enable: bool,
    /// NAS capture file path
    #[serde(default)]
    pub nas_filename: String,
}

/// Airplane-mode simulation: periodically toggles the data service to
/// exercise attach/detach and the deferred-callback machinery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Milliseconds after switch-on before data is disabled (0 = never)
    #[serde(default)]
    pub airplane_t_on_ms: u32,
    /// Milliseconds after data-disable before data is re-enabled (0 = never)
    #[serde(default)]
    pub airplane_t_off_ms: u32,
}

/// USIM identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsimConfig {
    /// IMSI, 15 decimal digits
    pub imsi: String,
    /// IMEI, 15 decimal digits
    #[serde(default = "default_imei")]
    pub imei: String,
}

impl Default for UsimConfig {
    fn default() -> Self {
        Self {
            imsi: "001010123456789".to_string(),
            imei: default_imei(),
        }
    }
}

fn default_imei() -> String {
    "356938035643803".to_string()
}

/// Scheduler sizing and diagnostic thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Per-queue task capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of background worker threads
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Collect per-TTI processing time statistics
    #[serde(default = "default_true")]
    pub tti_stats: bool,
    /// Warn when a single TTI takes longer than this (microseconds)
    #[serde(default = "default_tti_warn_threshold_us")]
    pub tti_warn_threshold_us: u64,
    /// Warn when the sync queue backlog exceeds this depth after a TTI
    #[serde(default = "default_sync_queue_warn_threshold")]
    pub sync_queue_warn_threshold: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            worker_threads: default_worker_threads(),
            tti_stats: true,
            tti_warn_threshold_us: default_tti_warn_threshold_us(),
            sync_queue_warn_threshold: default_sync_queue_warn_threshold(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_worker_threads() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_tti_warn_threshold_us() -> u64 {
    // one TTI budget at the reference 1 ms cadence
    1000
}

fn default_sync_queue_warn_threshold() -> usize {
    5
}

/// Top-level stack configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackConfig {
    /// Per-layer logging
    #[serde(default)]
    pub log: LogConfig,
    /// Packet capture sinks
    #[serde(default)]
    pub pcap: PcapConfig,
    /// Airplane-mode simulation
    #[serde(default)]
    pub sim: SimConfig,
    /// USIM identity
    #[serde(default)]
    pub usim: UsimConfig,
    /// Scheduler sizing and thresholds
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl StackConfig {
    /// Parses a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let config: StackConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<(), Error> {
        if self.scheduler.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be non-zero".into()));
        }
        if self.scheduler.worker_threads == 0 {
            return Err(Error::Config("worker_threads must be non-zero".into()));
        }
        if self.pcap.enable && self.pcap.filename.is_empty() {
            return Err(Error::Config("pcap.filename required when pcap.enable".into()));
        }
        if self.pcap.nas_enable && self.pcap.nas_filename.is_empty() {
            return Err(Error::Config(
                "pcap.nas_filename required when pcap.nas_enable".into(),
            ));
        }
        Ok(())
    }
}
