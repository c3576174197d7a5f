//! Diagnostic tracing setup and the optional conversation transcript.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::message::ConversationTurn;

const DEFAULT_FILTER: &str = "warn";

/// Install the global tracing subscriber. `RUST_LOG` picks the filter; the
/// default only shows warnings. Output goes to `log_file` when given and to
/// stderr otherwise, so it never mixes with answer text on stdout.
pub fn init_tracing(log_file: Option<&Path>) -> io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(
                    fmt::Layer::new()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
        }
        None => tracing_subscriber::registry()
            .with(fmt::Layer::new().with_writer(io::stderr).with_target(true))
            .with(filter)
            .try_init(),
    };

    // A subscriber may already be installed (tests, embedding callers).
    if let Err(err) = result {
        tracing::debug!("Tracing already initialized: {err}");
    }
    tracing::debug!(
        target: "flowtalk::utils::logging",
        file = ?log_file,
        "Tracing initialized"
    );
    Ok(())
}

/// Appends finished conversation turns to a plain-text file.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
}

impl TranscriptLog {
    pub fn new(file_path: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(path) = &file_path {
            // Fail early if the file cannot be created or appended to.
            OpenOptions::new().create(true).append(true).open(path)?;
        }
        Ok(Self { file_path })
    }

    pub fn disabled() -> Self {
        Self { file_path: None }
    }

    pub fn is_active(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn status_string(&self) -> String {
        match &self.file_path {
            None => "disabled".to_string(),
            Some(path) => format!(
                "active ({})",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
        }
    }

    pub fn log_turn(&self, turn: &ConversationTurn) -> Result<(), Box<dyn std::error::Error>> {
        if turn.content.trim().is_empty() {
            return Ok(());
        }
        self.write_entry(&format!("{}: {}", turn.role, turn.content))
    }

    pub fn log_note(&self, note: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.write_entry(&format!("## {note}"))
    }

    fn write_entry(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between entries
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }
}
