//! Decoupled on-disk logging for firmware builds.
//!
//! # Architecture
//!
//! ```text
//! log::info!/warn!/error!    log_section!
//!          |                      |
//!          +------[LogCollector]--+   (log::Log impl, stderr echo)
//!                       |
//!          (crossbeam unbounded channel)
//!                       |
//!                [disk writer thread]
//!                 |              |
//!   logs/full/<ts>_full.log   logs/parsed/<ts>_parsed.log
//!   (every line)              (stage headers only)
//! ```
//!
//! Sending never blocks the build. [`LogCollector::flush_and_wait`] pushes a
//! flush marker through the channel and returns once every earlier line is
//! synced to disk.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Log target of stage headers, routed to the parsed log as well
pub const SECTION_TARGET: &str = "section";

/// Which files a line lands in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogKind {
    /// Full log only
    Full,
    /// Full and parsed logs
    Parsed,
}

/// A log line with metadata
#[derive(Clone, Debug)]
pub struct LogLine {
    pub message: String,
    pub kind: LogKind,
    /// Wall-clock time the line was created
    pub timestamp: String,
}

impl LogLine {
    pub fn new(message: String) -> Self {
        LogLine {
            message,
            kind: LogKind::Full,
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    pub fn parsed(message: String) -> Self {
        LogLine {
            kind: LogKind::Parsed,
            ..LogLine::new(message)
        }
    }

    fn render(&self) -> String {
        format!("[{}] {}\n", self.timestamp, self.message)
    }
}

/// Internal log line or flush marker
enum LogMessage {
    Line(LogLine),
    Flush(std::sync::mpsc::Sender<()>),
}

/// Logger writing every record to disk from a background thread
#[derive(Clone)]
pub struct LogCollector {
    tx: Sender<LogMessage>,
    full_log_path: PathBuf,
    parsed_log_path: PathBuf,
    /// Mirror records on stderr
    echo: bool,
}

impl LogCollector {
    /// Create the `full/` and `parsed/` directories under `log_dir`, open this
    /// session's files and start the writer thread
    pub fn new(log_dir: &Path) -> Result<Self, String> {
        let full_log_dir = log_dir.join("full");
        let parsed_log_dir = log_dir.join("parsed");
        std::fs::create_dir_all(&full_log_dir)
            .map_err(|e| format!("Failed to create full log dir: {}", e))?;
        std::fs::create_dir_all(&parsed_log_dir)
            .map_err(|e| format!("Failed to create parsed log dir: {}", e))?;

        let session = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let full_log_path = full_log_dir.join(format!("{}_full.log", session));
        let parsed_log_path = parsed_log_dir.join(format!("{}_parsed.log", session));

        let mut full = open_append(&full_log_path)?;
        let mut parsed = open_append(&parsed_log_path)?;

        let (tx, rx) = unbounded::<LogMessage>();

        // Plain OS thread: the pipeline is synchronous and records may arrive
        // from any thread
        std::thread::spawn(move || {
            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        let rendered = line.render();
                        let _ = full.write_all(rendered.as_bytes());
                        if line.kind == LogKind::Parsed {
                            let _ = parsed.write_all(rendered.as_bytes());
                        }
                    }
                    LogMessage::Flush(done) => {
                        for file in [&mut full, &mut parsed] {
                            let _ = file.flush();
                            let _ = file.sync_all();
                        }
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(LogCollector {
            tx,
            full_log_path,
            parsed_log_path,
            echo: true,
        })
    }

    /// Enable or disable the stderr mirror
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn full_log_path(&self) -> &Path {
        &self.full_log_path
    }

    pub fn parsed_log_path(&self) -> &Path {
        &self.parsed_log_path
    }

    /// Send a log line (non-blocking)
    pub fn log(&self, line: LogLine) {
        let _ = self.tx.send(LogMessage::Line(line));
    }

    pub fn log_str(&self, message: impl Into<String>) {
        self.log(LogLine::new(message.into()));
    }

    /// Send a stage header, written to both logs
    pub fn log_parsed(&self, message: impl Into<String>) {
        self.log(LogLine::parsed(message.into()));
    }

    /// Block until every line sent before this call is on disk
    pub fn flush_and_wait(&self) -> Result<(), String> {
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        self.tx
            .send(LogMessage::Flush(done_tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        done_rx
            .recv()
            .map_err(|e| format!("Flush signal interrupted: {}", e))
    }

    /// Register a clone of this collector as the global `log` logger
    pub fn install(&self, max_level: LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(self.clone())).map(|()| log::set_max_level(max_level))
    }
}

fn open_append(path: &Path) -> Result<File, String> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))
}

/// Wires all log::info!(), log::warn!(), log::error!() calls into LogCollector
impl Log for LogCollector {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = format!("[{}] {}", record.level(), record.args());
        if self.echo {
            eprintln!("{}", message);
        }

        if record.target() == SECTION_TARGET {
            self.log_parsed(message);
        } else {
            self.log_str(message);
        }
    }

    fn flush(&self) {
        let _ = self.flush_and_wait();
    }
}
