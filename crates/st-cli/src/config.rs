//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use st_core::{Classification, ConfigError, GapPolicy, LimitTable, MetricsEngine, SiteKey};

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Milliseconds between ticks.
    pub tick_interval_ms: u64,

    /// Whether idle gaps count toward the next active site.
    pub gap_policy: GapPolicy,

    /// Sites that count as focus time.
    pub productive: Vec<SiteKey>,

    /// Sites that count as distraction time.
    pub distracting: Vec<SiteKey>,

    /// Maximum allowed time per site, in milliseconds.
    pub limits: LimitTable,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("st.db"),
            tick_interval_ms: 1000,
            gap_policy: GapPolicy::default(),
            productive: default_sites(&["github.com", "stackoverflow.com"]),
            distracting: default_sites(&["youtube.com", "instagram.com"]),
            limits: default_sites(&["youtube.com", "instagram.com", "github.com"])
                .into_iter()
                .zip([30 * MINUTE_MS, 20 * MINUTE_MS, 4 * HOUR_MS])
                .collect(),
        }
    }
}

fn default_sites(hosts: &[&str]) -> Vec<SiteKey> {
    hosts
        .iter()
        .filter_map(|host| SiteKey::new(host).ok())
        .collect()
}

impl Config {
    /// Loads configuration from the default locations, plus `config_path`
    /// when given.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (ST_*)
        figment = figment.merge(Env::prefixed("ST_"));

        figment.extract()
    }

    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Builds the classification lists, rejecting sites listed in both.
    pub fn classification(&self) -> Result<Classification, ConfigError> {
        Classification::new(self.productive.iter().cloned(), self.distracting.iter().cloned())
    }

    /// Builds the metrics engine for this configuration.
    pub fn metrics_engine(&self) -> Result<MetricsEngine, ConfigError> {
        Ok(MetricsEngine::new(self.classification()?, self.limits.clone()))
    }
}

/// Returns the platform-specific config directory for st.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("st"))
}

/// Returns the platform-specific data directory for st.
///
/// On Linux: `~/.local/share/st`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("st"))
}
