//! Ambient system configuration, following the teacher's
//! `GatewayConfig`/`AuditConfig` pattern in `daemon/llm_gateway/config.rs`:
//! `serde` structs with `#[serde(default = "...")]` fallbacks, loaded from a
//! path or falling back to `Default`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::probe::ProbeFrequency;

fn default_timezone() -> String {
    "UTC".into()
}

fn default_probe_frequency() -> String {
    "1m".into()
}

fn default_probe_query_range_minutes() -> i64 {
    60
}

fn default_retries_enabled() -> bool {
    true
}

fn default_max_channel_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    250
}

fn default_version_repo() -> VersionRepoConfig {
    VersionRepoConfig { owner: "example-org".into(), repo: "llmgate".into() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRepoConfig {
    pub owner: String,
    pub repo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_probe_frequency")]
    pub frequency: String,
    #[serde(default = "default_probe_query_range_minutes")]
    pub query_range_minutes: i64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { enabled: false, frequency: default_probe_frequency(), query_range_minutes: default_probe_query_range_minutes() }
    }
}

impl ProbeConfig {
    pub fn frequency(&self) -> ProbeFrequency {
        ProbeFrequency::from_wire(&self.frequency)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_retries_enabled")]
    pub retries_enabled: bool,
    #[serde(default = "default_max_channel_retries")]
    pub max_channel_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { retries_enabled: true, max_channel_retries: default_max_channel_retries(), retry_delay_ms: default_retry_delay_ms() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// IANA time zone name quota calendar windows are evaluated in
    /// (spec §3, §9: "a configurable location from SystemService").
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default = "default_version_repo")]
    pub version_repo: VersionRepoConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            probe: ProbeConfig::default(),
            dispatch: DispatchConfig::default(),
            version_repo: default_version_repo(),
        }
    }
}

impl SystemConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn timezone(&self) -> anyhow::Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!(e))
    }
}
