//! Append-only session transcripts.
//!
//! One file per session, line-oriented so the readback endpoint can return
//! it verbatim. Every record line carries a timestamp and a direction tag;
//! start and end markers bracket the body as comments.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{SecondsFormat, Utc};
use tracing::warn;

use netops_core::SessionId;

/// Which side of the relay a transcript line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Err,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
            Direction::Err => "ERR",
        }
    }
}

pub struct TranscriptRecorder {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    closed: AtomicBool,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl TranscriptRecorder {
    /// Open a fresh transcript under `dir` and write the start marker.
    pub fn open(dir: &Path, session_id: SessionId) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let stamp = timestamp().replace([':', '.'], "-");
        let path = dir.join(format!("session-{session_id}-{stamp}.log"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# Session {session_id} started at {}", timestamp())?;
        writer.flush()?;
        Ok(Self {
            path,
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record line. A failing disk must not kill a live session,
    /// so errors are logged and swallowed.
    pub fn record(&self, direction: Direction, text: &str) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let line = text.trim_end_matches(['\r', '\n']);
        let result = self.writer.lock().map(|mut writer| {
            writeln!(writer, "[{}] [{}] {line}", timestamp(), direction.as_str())
                .and_then(|()| writer.flush())
        });
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "transcript write failed"),
            Err(_) => warn!("transcript writer lock poisoned"),
        }
    }

    /// Write the end marker. Safe to call more than once; only the first
    /// call lands in the file.
    pub fn close(&self, status: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let result = self.writer.lock().map(|mut writer| {
            writeln!(writer, "# Session ended at {} with status={status}", timestamp())
                .and_then(|()| writer.flush())
        });
        if !matches!(result, Ok(Ok(()))) {
            warn!("transcript close marker write failed");
        }
    }
}

impl Drop for TranscriptRecorder {
    fn drop(&mut self) {
        // A dropped recorder without an explicit close still gets a marker.
        self.close("closed");
    }
}
