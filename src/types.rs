// src/types.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

// 命令结束条件
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Terminator {
    /// Stop as soon as the literal marker shows up in the reply.
    Marker(String),
    /// Stop at the first newline.
    Line,
}

impl Terminator {
    pub fn is_satisfied_by(&self, buffer: &[u8]) -> bool {
        match self {
            Terminator::Marker(marker) => contains(buffer, marker.as_bytes()),
            Terminator::Line => buffer.contains(&b'\n'),
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

// 发给设备的单条命令
#[derive(Clone, Debug)]
pub struct Command {
    pub text: String,
    pub deadline: Duration,
    pub terminator: Terminator,
}

impl Command {
    pub fn list(tool: &str, root: &str, deadline: Duration, end_marker: &str) -> Self {
        Self {
            text: format!("{tool} ls {root}"),
            deadline,
            terminator: Terminator::Marker(end_marker.to_string()),
        }
    }

    pub fn cat(tool: &str, path: &RemoteFileRef, deadline: Duration, end_marker: &str) -> Self {
        Self {
            text: format!("{tool} cat {}", path.as_str()),
            deadline,
            terminator: Terminator::Marker(end_marker.to_string()),
        }
    }

    pub fn remove(tool: &str, path: &RemoteFileRef, deadline: Duration) -> Self {
        Self {
            text: format!("{tool} rm {}", path.as_str()),
            deadline,
            terminator: Terminator::Line,
        }
    }

    /// Bytes actually put on the wire.
    pub fn wire_bytes(&self) -> Vec<u8> {
        format!("{}\n", self.text).into_bytes()
    }
}

// 单条命令的应答累积
#[derive(Clone, Debug, Default)]
pub struct ResponseBuffer {
    pub bytes: Vec<u8>,
    pub timed_out: bool,
}

impl ResponseBuffer {
    /// Lossy decode; the console occasionally emits garbage bytes.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// 设备上的文件路径
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RemoteFileRef(String);

impl RemoteFileRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for RemoteFileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// 固定列定义
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    delimiter: char,
}

impl Schema {
    pub fn from_header(header: &str, delimiter: char) -> Self {
        Self {
            columns: header.trim().split(delimiter).map(str::to_string).collect(),
            delimiter,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn header_line(&self) -> String {
        self.columns.join(&self.delimiter.to_string())
    }
}

// 通过校验的数据行
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedRow(pub Vec<String>);

impl NormalizedRow {
    pub fn join(&self, delimiter: char) -> String {
        self.0.join(&delimiter.to_string())
    }
}

// 会话状态机
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncState {
    Closed,
    Open,
    Listing,
    Downloading(RemoteFileRef),
    Extracting(RemoteFileRef),
    Validating(RemoteFileRef),
}

// 单个文件的处理结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileStatus {
    Extracted { rows: usize, filtered: usize, mismatched: usize },
    /// Frame was found but no row survived; a header-only file was written.
    Empty { filtered: usize, mismatched: usize },
    FrameAbsent { timed_out: bool },
    WriteFailed(String),
}

impl FileStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, FileStatus::Extracted { .. } | FileStatus::Empty { .. })
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Extracted { rows, filtered, mismatched } => write!(
                f,
                "✅ {rows} rows ({filtered} filtered, {mismatched} wrong width)"
            ),
            FileStatus::Empty { filtered, mismatched } => write!(
                f,
                "⚠️ header only ({filtered} filtered, {mismatched} wrong width)"
            ),
            FileStatus::FrameAbsent { timed_out: true } => f.write_str("❌ no frame (timed out)"),
            FileStatus::FrameAbsent { timed_out: false } => f.write_str("❌ no frame"),
            FileStatus::WriteFailed(reason) => write!(f, "❌ not saved: {reason}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FileOutcome {
    pub remote: RemoteFileRef,
    pub local: PathBuf,
    pub status: FileStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub output: PathBuf,
    pub files: usize,
    pub rows: usize,
    pub skipped_rows: usize,
}

// 整次同步的汇总
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    pub listed: Vec<RemoteFileRef>,
    pub outcomes: Vec<FileOutcome>,
    pub unified: Option<ConsolidationReport>,
}

impl SyncReport {
    pub fn no_files(&self) -> bool {
        self.listed.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn summary(&self) -> String {
        let mut line = format!("{} synchronized, {} failed", self.succeeded(), self.failed());
        if let Some(unified) = &self.unified {
            let name = unified
                .output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| unified.output.display().to_string());
            line.push_str(&format!(
                ", {} files unified into {} ({} rows)",
                unified.files, name, unified.rows
            ));
        }
        line
    }
}

pub fn local_path_for(dir: &Path, remote: &RemoteFileRef) -> PathBuf {
    dir.join(remote.base_name())
}
