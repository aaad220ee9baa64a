// src/engine.rs
use crate::config::SyncConfig;
use crate::drivers::{
    consolidate, discover_local_files, extract_frame, normalize, resolve_listing, SerialTransport,
    Session, SyncError, Transport,
};
use crate::recorder::write_local_file;
use crate::types::*;
use std::path::PathBuf;

/// Opens the configured serial port. Failure here leaves the run `Closed`.
pub fn open_serial(config: &SyncConfig) -> Result<SerialTransport, SyncError> {
    SerialTransport::open(&config.port, config.baud_rate)
}

/// One synchronization run over an open transport.
///
/// The session is closed on every way out: explicitly at the end of `run`,
/// or by `Session`'s drop when an error propagates.
pub struct SyncEngine<'a, T: Transport> {
    session: Session<T>,
    config: &'a SyncConfig,
    state: SyncState,
}

impl<'a, T: Transport> SyncEngine<'a, T> {
    pub fn new(transport: T, config: &'a SyncConfig) -> Self {
        let session = Session::new(transport, config.poll_interval());
        log::debug!("state: Closed -> Open");
        Self {
            session,
            config,
            state: SyncState::Open,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    fn enter(&mut self, next: SyncState) {
        log::debug!("state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Asks the device for its file list and keeps the matching paths.
    pub fn list(&mut self) -> Result<Vec<RemoteFileRef>, SyncError> {
        self.enter(SyncState::Listing);
        let command = Command::list(
            &self.config.tool,
            &self.config.root,
            self.config.list_timeout(),
            &self.config.end_marker,
        );
        let response = self.session.send(&command)?;
        log::debug!("listing response:\n{}", response.text());
        let files = resolve_listing(
            &response.text(),
            &self.config.remote_prefix(),
            &self.config.extension,
        );
        self.enter(SyncState::Open);
        if files.is_empty() {
            log::warn!(
                "⚠️ No {} files found under {}",
                self.config.extension,
                self.config.root
            );
        } else {
            log::info!("🔍 Found {} files: {:?}", files.len(), files);
        }
        Ok(files)
    }

    /// Download, extract, validate and persist a single remote file.
    ///
    /// Only transport errors come back as `Err`; everything else is recorded
    /// in the returned outcome.
    pub fn sync_file(&mut self, remote: &RemoteFileRef) -> Result<FileOutcome, SyncError> {
        let schema = self.config.schema();
        let local = local_path_for(&self.config.output_dir, remote);
        if local == self.config.unified_path() {
            let reason = format!(
                "local name {} is reserved for the unified output",
                self.config.unified_name
            );
            log::error!("❌ Skipping {remote}: {reason}");
            return Ok(FileOutcome {
                remote: remote.clone(),
                local,
                status: FileStatus::WriteFailed(reason),
            });
        }

        self.enter(SyncState::Downloading(remote.clone()));
        log::info!("📄 Downloading {remote}...");
        let command = Command::cat(
            &self.config.tool,
            remote,
            self.config.read_timeout(),
            &self.config.end_marker,
        );
        let response = self.session.send(&command)?;

        self.enter(SyncState::Extracting(remote.clone()));
        let frame = extract_frame(
            &response.text(),
            &self.config.begin_marker,
            &self.config.end_marker,
        );

        self.enter(SyncState::Validating(remote.clone()));
        let status = match frame {
            None => {
                log::warn!(
                    "⚠️ No framed content in reply to `{}` ({} bytes, timed out: {})",
                    command.text,
                    response.len(),
                    response.timed_out
                );
                match write_local_file(&local, &schema, &[]) {
                    Ok(_) => FileStatus::FrameAbsent {
                        timed_out: response.timed_out,
                    },
                    Err(e) => FileStatus::WriteFailed(e.to_string()),
                }
            }
            Some(frame) => {
                let normalized = normalize(&frame, &schema, &self.config.row_predicate());
                if normalized.mismatched > 0 {
                    log::warn!(
                        "⚠️ {remote}: dropped {} rows with the wrong field count",
                        normalized.mismatched
                    );
                }
                match write_local_file(&local, &schema, &normalized.rows) {
                    Ok(0) => {
                        log::warn!("⚠️ {remote}: no data rows, wrote header only");
                        FileStatus::Empty {
                            filtered: normalized.filtered,
                            mismatched: normalized.mismatched,
                        }
                    }
                    Ok(rows) => {
                        log::info!("📊 Extracted {rows} rows from {remote}");
                        FileStatus::Extracted {
                            rows,
                            filtered: normalized.filtered,
                            mismatched: normalized.mismatched,
                        }
                    }
                    Err(e) => FileStatus::WriteFailed(e.to_string()),
                }
            }
        };
        if let FileStatus::WriteFailed(reason) = &status {
            log::error!("❌ Could not save {remote}: {reason}");
        }
        self.enter(SyncState::Open);
        Ok(FileOutcome {
            remote: remote.clone(),
            local,
            status,
        })
    }

    /// Sends `rm` for one remote path and returns the device's reply line.
    pub fn remove(&mut self, remote: &RemoteFileRef) -> Result<String, SyncError> {
        if !remote.as_str().starts_with(&self.config.remote_prefix()) {
            return Err(SyncError::Config(format!(
                "refusing to remove {remote}: outside {}",
                self.config.root
            )));
        }
        let command = Command::remove(&self.config.tool, remote, self.config.remove_timeout());
        let response = self.session.send(&command)?;
        let reply = response.text().trim().to_string();
        if response.timed_out {
            log::warn!("⚠️ No reply to `{}`", command.text);
        } else {
            log::info!("🗑️ {reply}");
        }
        Ok(reply)
    }

    /// Lists, then syncs every file in turn. Consolidation is left to the
    /// caller since it does not need the device.
    pub fn run(mut self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport {
            listed: self.list()?,
            ..Default::default()
        };
        for remote in &report.listed {
            match self.sync_file(remote) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) if e.is_transport_fatal() => {
                    log::error!("❌ Serial communication error: {e}");
                    return Err(e);
                }
                Err(e) => {
                    log::error!("❌ {remote}: {e}");
                    report.outcomes.push(FileOutcome {
                        remote: remote.clone(),
                        local: local_path_for(&self.config.output_dir, remote),
                        status: FileStatus::WriteFailed(e.to_string()),
                    });
                }
            }
        }
        self.close();
        Ok(report)
    }

    pub fn close(mut self) {
        self.enter(SyncState::Closed);
        self.session.close();
    }
}

/// Merges every local file in the output directory into the unified file,
/// in file-name order.
pub fn unify(config: &SyncConfig) -> Result<ConsolidationReport, SyncError> {
    unify_in_order(config, &[])
}

/// Like `unify`, but `processed` goes first in the given order; the other
/// local files follow sorted by name.
pub fn unify_in_order(
    config: &SyncConfig,
    processed: &[PathBuf],
) -> Result<ConsolidationReport, SyncError> {
    let discovered =
        discover_local_files(&config.output_dir, &config.unified_name, &config.extension)?;
    let mut inputs: Vec<PathBuf> = processed
        .iter()
        .filter(|p| discovered.contains(p))
        .cloned()
        .collect();
    for path in discovered {
        if !inputs.contains(&path) {
            inputs.push(path);
        }
    }
    log::info!("🔗 Unifying files: {inputs:?}");
    consolidate(&inputs, &config.unified_path(), config.delimiter)
}

/// Full run: sync all remote files, close the port, then consolidate.
pub fn run_sync<T: Transport>(transport: T, config: &SyncConfig) -> Result<SyncReport, SyncError> {
    let mut report = SyncEngine::new(transport, config).run()?;
    if report.no_files() {
        return Ok(report);
    }
    let processed: Vec<PathBuf> = report
        .outcomes
        .iter()
        .filter(|o| o.status.is_success() || matches!(o.status, FileStatus::FrameAbsent { .. }))
        .map(|o| o.local.clone())
        .collect();
    report.unified = Some(unify_in_order(config, &processed)?);
    log::info!("✅ {}", report.summary());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_HEADER;
    use crate::drivers::ManualTransport;
    use std::fs;
    use std::path::Path;

    const LISTING: &str = "esp_spiffs ls /spiffs\r\n\
                           file1.csv  /spiffs/data_a.csv  notes.txt\r\n\
                           2048 /spiffs/data_b.csv\r\n<<<END>>>\r\n";

    fn config(dir: &Path) -> SyncConfig {
        SyncConfig {
            output_dir: dir.to_path_buf(),
            list_timeout_secs: 0.2,
            read_timeout_secs: 0.05,
            poll_interval_secs: 0.001,
            ..Default::default()
        }
    }

    fn framed(body: &str) -> String {
        format!("esp_spiffs cat x\r\n<<<BEGIN>>>\n{body}\n<<<END>>>\r\nesp32> ")
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn full_run_writes_local_files_and_unifies() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let transport = ManualTransport::new()
            .reply(LISTING)
            .reply(&framed(
                "Timestamp,Temperature(C)\n\
                 2025-06-10 10:00,22.1,51,1.1,0.4,3.2,a\n\
                 2025-06-10 10:01,22.2,51,1.1,0.4,3.2,b\n\
                 2025-06-10 10:02,22.3,51,1.1,0.4,3.2,c\n\
                 2025-06-10 10:03,22.3,51,1.1,0.4,3.2,,too-many",
            ))
            .reply(&framed("Timestamp\nE (9) nothing logged yet"));
        let log = transport.log();

        let report = run_sync(transport, &cfg).unwrap();

        assert_eq!(
            log.borrow().written,
            vec![
                "esp_spiffs ls /spiffs\n",
                "esp_spiffs cat /spiffs/data_a.csv\n",
                "esp_spiffs cat /spiffs/data_b.csv\n",
            ]
        );
        assert!(log.borrow().closed);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(
            report.outcomes[0].status,
            FileStatus::Extracted { rows: 3, filtered: 1, mismatched: 1 }
        );
        assert_eq!(
            report.outcomes[1].status,
            FileStatus::Empty { filtered: 2, mismatched: 0 }
        );
        assert_eq!(lines(&dir.path().join("data_b.csv")), vec![DEFAULT_HEADER]);

        let unified = report.unified.as_ref().unwrap();
        assert_eq!(unified.files, 2);
        assert_eq!(unified.rows, 3);
        let merged = lines(&cfg.unified_path());
        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0], DEFAULT_HEADER);
        assert!(merged[3].ends_with(",c"));
    }

    #[test]
    fn timed_out_download_is_isolated_to_that_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let transport = ManualTransport::new()
            .reply(LISTING)
            .reply("<<<BEGIN>>>partial")
            .reply(&framed("2025-06-10,1,2,3,4,5,6"));
        let log = transport.log();

        let report = run_sync(transport, &cfg).unwrap();

        assert_eq!(
            report.outcomes[0].status,
            FileStatus::FrameAbsent { timed_out: true }
        );
        assert_eq!(lines(&dir.path().join("data_a.csv")), vec![DEFAULT_HEADER]);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.unified.unwrap().rows, 1);
        assert!(log.borrow().closed);
    }

    #[test]
    fn empty_listing_ends_cleanly_without_unifying() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let transport = ManualTransport::new().reply("esp32> <<<END>>>");
        let log = transport.log();

        let report = run_sync(transport, &cfg).unwrap();

        assert!(report.no_files());
        assert!(report.unified.is_none());
        assert!(!cfg.unified_path().exists());
        assert!(log.borrow().closed);
    }

    #[test]
    fn transport_failure_aborts_but_closes() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let transport = ManualTransport::new().reply(LISTING).fail_on_write(2);
        let log = transport.log();

        let err = run_sync(transport, &cfg).unwrap_err();

        assert!(err.is_transport_fatal());
        assert!(log.borrow().closed);
        assert_eq!(log.borrow().written.len(), 2);
        assert!(!cfg.unified_path().exists());
    }

    #[test]
    fn local_write_failure_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("data_a.csv")).unwrap();
        let cfg = config(dir.path());
        let transport = ManualTransport::new()
            .reply(LISTING)
            .reply(&framed("2025-06-10,1,2,3,4,5,6"))
            .reply(&framed("2025-06-11,1,2,3,4,5,6"));

        let report = run_sync(transport, &cfg).unwrap();

        assert!(matches!(report.outcomes[0].status, FileStatus::WriteFailed(_)));
        assert!(report.outcomes[1].status.is_success());
        assert_eq!(report.unified.unwrap().files, 1);
    }

    #[test]
    fn unified_rows_follow_processing_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mm_local.csv"), format!("{DEFAULT_HEADER}\n2025-M,1,2,3,4,5,6\n"))
            .unwrap();
        let cfg = config(dir.path());
        let transport = ManualTransport::new()
            .reply("/spiffs/zz.csv /spiffs/aa.csv <<<END>>>")
            .reply(&framed("2025-Z,1,2,3,4,5,6"))
            .reply(&framed("2025-A,1,2,3,4,5,6"));

        let report = run_sync(transport, &cfg).unwrap();

        assert_eq!(report.unified.as_ref().unwrap().files, 3);
        let merged = lines(&cfg.unified_path());
        assert_eq!(merged[0], DEFAULT_HEADER);
        assert!(merged[1].starts_with("2025-Z"));
        assert!(merged[2].starts_with("2025-A"));
        assert!(merged[3].starts_with("2025-M"));
    }

    #[test]
    fn remote_named_like_unified_output_is_not_clobbered() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let transport = ManualTransport::new()
            .reply("/spiffs/unified_data.csv /spiffs/data_a.csv <<<END>>>")
            .reply(&framed("2025-06-11,1,2,3,4,5,6"));
        let log = transport.log();

        let report = run_sync(transport, &cfg).unwrap();

        assert!(matches!(report.outcomes[0].status, FileStatus::WriteFailed(_)));
        assert!(report.outcomes[1].status.is_success());
        assert_eq!(report.failed(), 1);
        // the reserved name is skipped before any download is attempted
        assert_eq!(
            log.borrow().written,
            vec!["esp_spiffs ls /spiffs\n", "esp_spiffs cat /spiffs/data_a.csv\n"]
        );
        let unified = report.unified.unwrap();
        assert_eq!(unified.files, 1);
        assert_eq!(unified.rows, 1);
    }

    #[test]
    fn state_returns_to_open_after_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let transport = ManualTransport::new().reply(LISTING).reply("");
        let mut engine = SyncEngine::new(transport, &cfg);
        assert_eq!(engine.state(), &SyncState::Open);
        let files = engine.list().unwrap();
        assert_eq!(engine.state(), &SyncState::Open);
        let outcome = engine.sync_file(&files[0]).unwrap();
        assert_eq!(outcome.status, FileStatus::FrameAbsent { timed_out: true });
        assert_eq!(engine.state(), &SyncState::Open);
        engine.close();
    }

    #[test]
    fn remove_sends_rm_and_rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let transport = ManualTransport::new().reply("File removed\r\n");
        let log = transport.log();
        let mut engine = SyncEngine::new(transport, &cfg);

        let reply = engine.remove(&RemoteFileRef::new("/spiffs/data_a.csv")).unwrap();
        assert_eq!(reply, "File removed");
        let err = engine.remove(&RemoteFileRef::new("/other/x.csv")).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        engine.close();

        assert_eq!(log.borrow().written, vec!["esp_spiffs rm /spiffs/data_a.csv\n"]);
        assert!(log.borrow().closed);
    }
}
