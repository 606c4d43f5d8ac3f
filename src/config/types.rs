use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub clickhouse: ClickHouseConfig,
    #[serde(default)]
    pub sites: SitesConfig,
    #[serde(default)]
    pub finalize: FinalizeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Identity of the pipeline; names the lock and the default staging file
    pub name: String,
    pub log_path: PathBuf,
    #[serde(default = "default_rotation_suffix")]
    pub rotation_suffix: String,
    /// Directory for checkpoints, locks and staging files
    pub state_dir: PathBuf,
    pub staging_path: Option<PathBuf>,
    #[serde(default = "default_beacon_path")]
    pub beacon_path: String,
    /// Destination table, optionally qualified with a database
    pub table: String,
}

fn default_rotation_suffix() -> String {
    ".1".to_string()
}

fn default_beacon_path() -> String {
    "/piwik".to_string()
}

impl PipelineConfig {
    pub fn staging_path(&self) -> PathBuf {
        self.staging_path
            .clone()
            .unwrap_or_else(|| self.state_dir.join(format!("{}.tsv", self.name)))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join(format!("{}.lock", self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    pub url: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    /// Engine settings sent as query parameters with bulk imports
    #[serde(default = "default_import_settings")]
    pub settings: BTreeMap<String, String>,
}

fn default_user() -> String {
    "default".to_string()
}

fn default_database() -> String {
    "default".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_import_settings() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "input_format_allow_errors_ratio".to_string(),
        "0.005".to_string(),
    )])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitesConfig {
    #[serde(default = "default_site")]
    pub default: String,
    /// Host (or parent domain) to short site name
    #[serde(default)]
    pub hosts: HashMap<String, String>,
}

fn default_site() -> String {
    "unknown".to_string()
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            default: default_site(),
            hosts: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalizeConfig {
    /// Tables compacted by `beacontail finalize` when none are given
    #[serde(default)]
    pub tables: Vec<String>,
}
