use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::{RowPredicate, SyncError};
use crate::types::Schema;

/// Upper bound for any deadline or poll interval, in seconds.
pub const MAX_WAIT_SECS: f64 = 3600.0;

pub const DEFAULT_HEADER: &str =
    "Timestamp,Temperature(C),Humidity(%),MQ4_Voltage(V),MQ7_Voltage(V),MQ7_CO_PPM,ExtraField";

/// Everything a sync run needs to know. Every field has a default, so a
/// config file only has to mention what it changes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Shell command on the device that implements `ls`/`cat`/`rm`.
    pub tool: String,
    pub root: String,
    pub extension: String,
    pub list_timeout_secs: f64,
    pub read_timeout_secs: f64,
    pub remove_timeout_secs: f64,
    pub poll_interval_secs: f64,
    pub begin_marker: String,
    pub end_marker: String,
    pub header: String,
    /// Data rows must start with this; `None` accepts any line.
    pub row_prefix: Option<String>,
    pub delimiter: char,
    pub output_dir: PathBuf,
    pub unified_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            tool: "esp_spiffs".to_string(),
            root: "/spiffs".to_string(),
            extension: ".csv".to_string(),
            list_timeout_secs: 5.0,
            read_timeout_secs: 3.0,
            remove_timeout_secs: 2.0,
            poll_interval_secs: 0.1,
            begin_marker: "<<<BEGIN>>>".to_string(),
            end_marker: "<<<END>>>".to_string(),
            header: DEFAULT_HEADER.to_string(),
            row_prefix: Some("2025".to_string()),
            delimiter: ',',
            output_dir: PathBuf::from("."),
            unified_name: "unified_data.csv".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let text = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        let config: SyncConfig = serde_json::from_str(&text)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.begin_marker.is_empty() || self.end_marker.is_empty() {
            return Err(SyncError::Config("framing markers must not be empty".into()));
        }
        if self.begin_marker == self.end_marker {
            return Err(SyncError::Config("begin and end markers must differ".into()));
        }
        if !self.extension.starts_with('.') {
            return Err(SyncError::Config(format!(
                "extension `{}` must start with a dot",
                self.extension
            )));
        }
        if self.header.trim().is_empty() {
            return Err(SyncError::Config("schema header must not be empty".into()));
        }
        if self.tool.trim().is_empty() {
            return Err(SyncError::Config("device tool name must not be empty".into()));
        }
        if self.unified_name.is_empty() {
            return Err(SyncError::Config("unified output name must not be empty".into()));
        }
        for (name, secs) in [
            ("list_timeout_secs", self.list_timeout_secs),
            ("read_timeout_secs", self.read_timeout_secs),
            ("remove_timeout_secs", self.remove_timeout_secs),
            ("poll_interval_secs", self.poll_interval_secs),
        ] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(SyncError::Config(format!("{name} must be positive, got {secs}")));
            }
            if secs > MAX_WAIT_SECS {
                return Err(SyncError::Config(format!(
                    "{name} must be at most {MAX_WAIT_SECS} s, got {secs}"
                )));
            }
        }
        Ok(())
    }

    /// Path prefix a listing token must carry, e.g. `/spiffs/`.
    pub fn remote_prefix(&self) -> String {
        format!("{}/", self.root.trim_end_matches('/'))
    }

    pub fn schema(&self) -> Schema {
        Schema::from_header(&self.header, self.delimiter)
    }

    pub fn row_predicate(&self) -> RowPredicate {
        RowPredicate::from_prefix(self.row_prefix.as_deref())
    }

    pub fn list_timeout(&self) -> Duration {
        seconds(self.list_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        seconds(self.read_timeout_secs)
    }

    pub fn remove_timeout(&self) -> Duration {
        seconds(self.remove_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval_secs)
    }

    pub fn unified_path(&self) -> PathBuf {
        self.output_dir.join(&self.unified_name)
    }
}

/// Out-of-range values saturate instead of panicking; `validate` rejects
/// them before a run starts anyway.
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}
