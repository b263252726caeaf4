//! Decoupled logging pipeline for installation runs.
//!
//! # Architecture
//!
//! ```text
//! log::info!/warn!/error!
//!     |
//! [LogCollector] (redacts, never blocks)
//!     | (crossbeam channel)
//! [background thread]
//!     |                       |
//! logs/full/<ts>_full.log   console channel (tokio mpsc, best effort)
//! logs/parsed/<ts>_parsed.log
//! ```
//!
//! Every line passes through the [`Redactor`] before it is queued, so no
//! registered secret can reach disk or the console.

use crate::models::Secret;
use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Replacement text for masked secrets.
pub const REDACTED: &str = "[hidden]";

/// Secrets shorter than this are likely to match unrelated text.
const SHORT_SECRET_LEN: usize = 4;

/// Internal log line or special marker
enum LogMessage {
    Line(LogLine),
    /// Flush marker with channel sender to signal completion
    Flush(std::sync::mpsc::Sender<()>),
}

/// Masks registered secret values in arbitrary text.
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Arc<RwLock<Vec<String>>>,
}

impl Redactor {
    pub fn new() -> Self {
        Redactor::default()
    }

    /// Register a secret; empty values are ignored.
    pub fn register(&self, secret: &Secret) {
        if secret.is_empty() {
            return;
        }
        if let Ok(mut secrets) = self.secrets.write() {
            let value = secret.expose().to_string();
            if value.chars().count() < SHORT_SECRET_LEN {
                log::warn!(
                    "[Redactor] a registered secret is shorter than {} characters; log text may be over-masked",
                    SHORT_SECRET_LEN
                );
            }
            if !secrets.contains(&value) {
                secrets.push(value);
                // Longest first so a secret containing another is masked whole
                secrets.sort_by(|a, b| b.len().cmp(&a.len()));
            }
        }
    }

    pub fn redact(&self, text: &str) -> String {
        let secrets = match self.secrets.read() {
            Ok(secrets) => secrets,
            Err(_) => return text.to_string(),
        };
        let mut out = text.to_string();
        for secret in secrets.iter() {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), REDACTED);
            }
        }
        out
    }
}

/// A log line with metadata
#[derive(Clone, Debug)]
pub struct LogLine {
    pub message: String,
    /// Log type: "full" or "parsed"
    pub log_type: String,
    pub timestamp: String,
}

impl LogLine {
    pub fn new(message: String) -> Self {
        LogLine {
            message,
            log_type: "full".to_string(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    pub fn parsed(message: String) -> Self {
        LogLine {
            message,
            log_type: "parsed".to_string(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.log_type == "parsed"
    }
}

/// Unified logger that handles disk and console dispatch
pub struct LogCollector {
    /// crossbeam unbounded sender; works from any thread or runtime
    tx: Sender<LogMessage>,
    log_dir: PathBuf,
    /// Session files for this run
    full_log_path: PathBuf,
    parsed_log_path: PathBuf,
    redactor: Redactor,
}

impl LogCollector {
    /// Create a collector writing a fresh pair of session files under `log_dir`.
    pub fn new(
        log_dir: PathBuf,
        console_tx: tokio::sync::mpsc::Sender<LogLine>,
        redactor: Redactor,
    ) -> Result<Self, String> {
        let full_log_dir = log_dir.join("full");
        let parsed_log_dir = log_dir.join("parsed");
        std::fs::create_dir_all(&full_log_dir)
            .map_err(|e| format!("Failed to create full log dir: {}", e))?;
        std::fs::create_dir_all(&parsed_log_dir)
            .map_err(|e| format!("Failed to create parsed log dir: {}", e))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let full_log_path = full_log_dir.join(format!("{}_full.log", stamp));
        let parsed_log_path = parsed_log_dir.join(format!("{}_parsed.log", stamp));

        let mut full_file = open_append(&full_log_path)?;
        let mut parsed_file = open_append(&parsed_log_path)?;

        let (tx, rx) = unbounded::<LogMessage>();

        // OS thread, not a tokio task: persists lines regardless of runtime state
        std::thread::spawn(move || {
            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        let formatted = format!("[{}] {}\n", line.timestamp, line.message);
                        let _ = full_file.write_all(formatted.as_bytes());
                        if line.is_parsed() {
                            let _ = parsed_file.write_all(formatted.as_bytes());
                        }
                        // Console is best effort; disk always wins
                        let _ = console_tx.try_send(line);
                    }
                    LogMessage::Flush(done) => {
                        let _ = full_file.flush();
                        let _ = parsed_file.flush();
                        let _ = full_file.sync_data();
                        let _ = parsed_file.sync_data();
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(LogCollector {
            tx,
            log_dir,
            full_log_path,
            parsed_log_path,
            redactor,
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn full_log_path(&self) -> &Path {
        &self.full_log_path
    }

    pub fn parsed_log_path(&self) -> &Path {
        &self.parsed_log_path
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Send a log line (non-blocking). The message is redacted first.
    pub fn log(&self, mut line: LogLine) {
        line.message = self.redactor.redact(&line.message);
        let _ = self.tx.send(LogMessage::Line(line));
    }

    pub fn log_str(&self, message: impl Into<String>) {
        self.log(LogLine::new(message.into()));
    }

    /// Send a parsed (high-level) log
    pub fn log_parsed(&self, message: impl Into<String>) {
        self.log(LogLine::parsed(message.into()));
    }

    /// Wait until every line sent before this call is on disk.
    pub fn wait_for_empty(&self) -> Result<(), String> {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        self.tx
            .send(LogMessage::Flush(tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        rx.recv()
            .map_err(|e| format!("Flush signal interrupted: {}", e))
    }
}

impl Clone for LogCollector {
    fn clone(&self) -> Self {
        LogCollector {
            tx: self.tx.clone(),
            log_dir: self.log_dir.clone(),
            full_log_path: self.full_log_path.clone(),
            parsed_log_path: self.parsed_log_path.clone(),
            redactor: self.redactor.clone(),
        }
    }
}

/// Wires all log::info!(), log::warn!(), log::error!() calls into LogCollector
impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("[{}] {}", record.level(), record.args());

            // Target-aware routing: "parsed" marks high-level events
            if record.target() == "parsed" {
                self.log_parsed(message);
            } else {
                self.log_str(message);
            }
        }
    }

    fn flush(&self) {
        let _ = self.wait_for_empty();
    }
}

fn open_append(path: &Path) -> Result<File, String> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))
}
