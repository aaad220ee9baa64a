use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::drivers::SyncError;
use crate::types::{NormalizedRow, Schema};

/// Writes one LocalFile: the schema header, then every normalized row.
pub struct LocalFileWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    delimiter: char,
    rows: usize,
}

impl LocalFileWriter {
    /// Creates (or truncates) `path` and writes the header straight away,
    /// so even a file with no rows is a valid header-only file.
    pub fn create(path: &Path, schema: &Schema) -> Result<Self, SyncError> {
        let file = File::create(path).map_err(|e| SyncError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", schema.header_line()).map_err(|e| SyncError::io(path, e))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            delimiter: schema.delimiter(),
            rows: 0,
        })
    }

    pub fn write_row(&mut self, row: &NormalizedRow) -> Result<(), SyncError> {
        writeln!(self.writer, "{}", row.join(self.delimiter))
            .map_err(|e| SyncError::io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes and returns how many rows were written.
    pub fn finish(mut self) -> Result<usize, SyncError> {
        self.writer.flush().map_err(|e| SyncError::io(&self.path, e))?;
        log::info!("💾 File saved: {} ({} rows)", self.path.display(), self.rows);
        Ok(self.rows)
    }
}

/// Convenience: header plus all rows in one go.
pub fn write_local_file(
    path: &Path,
    schema: &Schema,
    rows: &[NormalizedRow],
) -> Result<usize, SyncError> {
    let mut writer = LocalFileWriter::create(path, schema)?;
    for row in rows {
        writer.write_row(row)?;
    }
    writer.finish()
}
