//! Progress output sinks.
//!
//! Engine output is written line by line to every sink in a
//! [`ProgressStreams`]. The usual pair is the console plus a log file created
//! fresh for each operation and kept after the run.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

/// A set of writers that each receive every byte of engine output.
#[derive(Default)]
pub struct ProgressStreams {
    sinks: Vec<Box<dyn Write + Send>>,
    log_path: Option<PathBuf>,
}

impl ProgressStreams {
    /// Streams with no sinks; output is discarded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams writing to the process stdout.
    pub fn stdout() -> Self {
        Self::new().with_sink(io::stdout())
    }

    pub fn with_sink(mut self, sink: impl Write + Send + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Add a new log file named `<prefix>*.log` under `dir` (or the system
    /// temp directory). The file is kept after the streams are dropped.
    pub fn with_log_file(mut self, dir: Option<&Path>, prefix: &str) -> io::Result<Self> {
        let dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&dir)?;

        let (file, path) = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".log")
            .tempfile_in(&dir)?
            .keep()
            .map_err(|e| e.error)?;

        debug!("Writing progress log to {:?}", path);
        self.sinks.push(Box::new(file));
        self.log_path = Some(path);
        Ok(self)
    }

    /// Path of the log file, if one was added.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Write for ProgressStreams {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in &mut self.sinks {
            sink.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProgressStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStreams")
            .field("sinks", &self.sinks.len())
            .field("log_path", &self.log_path)
            .finish()
    }
}

/// An in-memory sink whose clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).to_string()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
