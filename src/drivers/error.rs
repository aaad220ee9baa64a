use std::path::PathBuf;
use thiserror::Error;
/// Errors that abort a synchronization run (or a local-only operation).
///
/// Timeouts, missing frames and mismatched rows are not errors; they are
/// reported as values so the engine can keep going with the next file.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to open serial port {port} at {baud} baud: {source}")]
    Open {
        port: String,
        baud: u32,
        #[source]
        source: serialport::Error,
    },
    #[error("transport failure during {op}: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}
impl SyncError {
    pub fn transport(op: &'static str, source: std::io::Error) -> Self {
        SyncError::Transport { op, source }
    }
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
    /// Channel-level failures end the run; everything else is local.
    pub fn is_transport_fatal(&self) -> bool {
        matches!(self, SyncError::Open { .. } | SyncError::Transport { .. })
    }
}
impl From<serialport::Error> for SyncError {
    fn from(value: serialport::Error) -> Self {
        SyncError::Transport {
            op: "serial",
            source: value.into(),
        }
    }
}
