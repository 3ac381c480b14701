//! Mismatch Reporter
//!
//! Both actors write multi-line diagnostics (a message plus hex dumps) to
//! one stream. The reporter holds a single lock for the whole report so
//! lines from the two actors never interleave. It never ends the process.

use indicatif::ProgressBar;
use parking_lot::Mutex;
use spiduplex_report::{hex_dump, DEFAULT_LINE_SIZE};
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A labelled buffer to dump after a report message.
#[derive(Debug, Clone, Copy)]
pub struct Dump<'a> {
    pub label: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> Dump<'a> {
    pub fn new(label: &'a str, bytes: &'a [u8]) -> Self {
        Self { label, bytes }
    }
}

pub struct MismatchReporter {
    sink: Mutex<Box<dyn Write + Send>>,
    progress: Option<ProgressBar>,
    mismatches: AtomicU64,
}

impl MismatchReporter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
            progress: None,
            mismatches: AtomicU64::new(0),
        }
    }

    /// Hide the bar while a report is written.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Report a mismatch.
    pub fn report(&self, message: &str, dumps: &[Dump<'_>]) {
        self.mismatches.fetch_add(1, Ordering::Relaxed);
        self.write_block(Some(message), dumps);
    }

    /// Write an informational block that is not a mismatch (soft notices,
    /// verbose transfer dumps).
    pub fn notice(&self, message: Option<&str>, dumps: &[Dump<'_>]) {
        self.write_block(message, dumps);
    }

    /// Mismatches reported so far.
    pub fn mismatches(&self) -> u64 {
        self.mismatches.load(Ordering::Relaxed)
    }

    fn write_block(&self, message: Option<&str>, dumps: &[Dump<'_>]) {
        let mut block = String::new();
        if let Some(message) = message {
            block.push_str(message);
            block.push('\n');
        }
        for dump in dumps {
            block.push_str(&hex_dump(dump.bytes, DEFAULT_LINE_SIZE, dump.label));
        }

        let mut sink = self.sink.lock();
        let mut write = || {
            let result = sink.write_all(block.as_bytes()).and_then(|_| sink.flush());
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to write diagnostic report");
            }
        };
        match &self.progress {
            Some(pb) => pb.suspend(write),
            None => write(),
        }
    }
}

/// In-memory sink shared between a reporter and whoever inspects it.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

impl Write for MemorySink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
