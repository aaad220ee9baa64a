use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use crate::drivers::SyncError;
use crate::types::ConsolidationReport;
/// Local files in `dir` with `extension`, minus the consolidation output,
/// sorted by name so repeated runs see the same order.
pub fn discover_local_files(
    dir: &Path,
    output_name: &str,
    extension: &str,
) -> Result<Vec<PathBuf>, SyncError> {
    let entries = fs::read_dir(dir).map_err(|e| SyncError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::io(dir, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == output_name || !name.ends_with(extension) || !path.is_file() {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}
/// Merges `inputs` into `output`, writing the first file's header once.
///
/// Only the field count of later headers is trusted: rows from every file
/// are kept when they have as many fields as the first header. Column names
/// of later files are not compared.
pub fn consolidate(
    inputs: &[PathBuf],
    output: &Path,
    delimiter: char,
) -> Result<ConsolidationReport, SyncError> {
    let out = File::create(output).map_err(|e| SyncError::io(output, e))?;
    let mut writer = BufWriter::new(out);
    let mut report = ConsolidationReport {
        output: output.to_path_buf(),
        ..Default::default()
    };
    let mut header: Option<(String, usize)> = None;
    for input in inputs {
        let file = File::open(input).map_err(|e| SyncError::io(input, e))?;
        let mut lines = BufReader::new(file).lines();
        let own_header = match lines.next() {
            Some(line) => line.map_err(|e| SyncError::io(input, e))?,
            None => {
                log::warn!("⚠️ {} has no header line, skipping", input.display());
                continue;
            }
        };
        let own_header = own_header.trim_end_matches('\r').to_string();
        let known = header
            .as_ref()
            .map(|(text, width)| (*text == own_header, *width));
        let width = match known {
            Some((same, width)) => {
                if !same {
                    log::debug!(
                        "{} header differs from the first file's; merging by field count",
                        input.display()
                    );
                }
                width
            }
            None => {
                writeln!(writer, "{own_header}").map_err(|e| SyncError::io(output, e))?;
                let width = own_header.split(delimiter).count();
                header = Some((own_header, width));
                width
            }
        };
        let mut kept = 0;
        for line in lines {
            let line = line.map_err(|e| SyncError::io(input, e))?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            if line.split(delimiter).count() != width {
                report.skipped_rows += 1;
                continue;
            }
            writeln!(writer, "{line}").map_err(|e| SyncError::io(output, e))?;
            kept += 1;
        }
        log::debug!("merged {kept} rows from {}", input.display());
        report.files += 1;
        report.rows += kept;
    }
    writer.flush().map_err(|e| SyncError::io(output, e))?;
    if report.files == 0 {
        log::warn!("⚠️ No CSV files found to unify.");
    } else {
        log::info!(
            "✅ {} files unified into {} ({} rows)",
            report.files,
            output.display(),
            report.rows
        );
    }
    Ok(report)
}
