//! Run configuration loaded from a JSON file
//!
//! Only identifiers, local paths and timings live here. Credentials are supplied on the
//! command line or through the environment so the file can be committed alongside a model.

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.slopesoftware.com/api/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Remote API connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 100,
        }
    }
}

/// Poll intervals and deadlines
#[derive(Debug, Clone, Deserialize)]
pub struct PollSettings {
    /// Seconds between projection running-status checks (default: 15)
    #[serde(default = "default_projection_interval")]
    pub projection_interval_secs: u64,

    /// Overall wait for a projection run, `null` to wait indefinitely (default: 12 hours)
    #[serde(default = "default_projection_timeout")]
    pub projection_timeout_minutes: Option<u64>,

    /// Seconds between report generation status checks (default: 5)
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    /// Overall wait for report generation (default: 15 minutes)
    #[serde(default = "default_report_timeout")]
    pub report_timeout_minutes: u64,
}

fn default_projection_interval() -> u64 { 15 }
fn default_projection_timeout() -> Option<u64> { Some(12 * 60) }
fn default_report_interval() -> u64 { 5 }
fn default_report_timeout() -> u64 { 15 }
fn default_yield_curve_rate_type() -> String { "BondEquivalent".to_string() }
fn default_delimiter() -> String { ",".to_string() }

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            projection_interval_secs: default_projection_interval(),
            projection_timeout_minutes: default_projection_timeout(),
            report_interval_secs: default_report_interval(),
            report_timeout_minutes: default_report_timeout(),
        }
    }
}

impl PollSettings {
    pub fn projection_interval(&self) -> Duration {
        Duration::from_secs(self.projection_interval_secs)
    }

    pub fn projection_timeout(&self) -> Option<Duration> {
        self.projection_timeout_minutes.map(minutes)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn report_timeout(&self) -> Duration {
        minutes(self.report_timeout_minutes)
    }

    /// Zero intervals would poll without pausing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.projection_interval_secs == 0 {
            return Err(ConfigError::Invalid("polling.projection_interval_secs must be at least 1".to_string()));
        }
        if self.report_interval_secs == 0 {
            return Err(ConfigError::Invalid("polling.report_interval_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn minutes(m: u64) -> Duration {
    m.checked_mul(60).map_or(Duration::MAX, Duration::from_secs)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioTableInput {
    pub local_path: PathBuf,
    #[serde(default = "default_yield_curve_rate_type")]
    pub yield_curve_rate_type: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataTableInput {
    pub local_path: PathBuf,
    pub table_structure_id: i64,
    /// Table structure name the projection maps the new table under
    pub table_structure_name: String,
    #[serde(default)]
    pub excel_sheet_name: Option<String>,
    #[serde(default)]
    pub delimiter: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelPointInput {
    pub local_path: PathBuf,
    pub portfolio_name: String,
    pub product_name: String,
}

/// How finished reports are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportDelivery {
    /// Single request returning the report bytes
    #[default]
    Direct,
    /// Start a generation job, poll its status, then download from the returned URL
    Generated,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportOutputs {
    pub workbook_id: String,
    pub element_id: String,
    pub excel_path: PathBuf,
    pub csv_path: PathBuf,
    #[serde(default)]
    pub delivery: ReportDelivery,
}

/// Everything one end-to-end valuation run needs
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub api: ApiSettings,
    pub model_id: i64,
    pub template_id: i64,
    pub valuation_date: NaiveDate,
    pub scenario_table: ScenarioTableInput,
    pub data_table: DataTableInput,
    pub model_points: ModelPointInput,
    pub reports: ReportOutputs,
    #[serde(default)]
    pub polling: PollSettings,
}

impl RunConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.polling.validate()?;
        Ok(config)
    }

    /// `YYYY-MM` label used in remote names and paths
    pub fn valuation_label(&self) -> String {
        self.valuation_date.format("%Y-%m").to_string()
    }

    pub fn scenario_table_name(&self) -> String {
        format!("Scenarios {}", self.valuation_label())
    }

    pub fn scenario_table_remote_path(&self) -> String {
        format!("Scenario Files/Scenarios {}.csv", self.valuation_label())
    }

    pub fn data_table_name(&self) -> String {
        format!("Assumptions {}", self.valuation_label())
    }

    /// Keeps the extension of the local file so the service can tell Excel from delimited text
    pub fn data_table_remote_path(&self) -> String {
        let extension = self
            .data_table
            .local_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("xlsx");
        format!("Assumptions/Assumption Update {}.{}", self.valuation_label(), extension)
    }

    pub fn model_point_remote_path(&self) -> String {
        format!("Inforce/Inforce File - {}.csv", self.valuation_label())
    }

    pub fn projection_name(&self) -> String {
        format!("Valuation {}", self.valuation_label())
    }
}
