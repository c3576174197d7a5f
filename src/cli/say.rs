//! One-shot "say" command

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::cli::session::prepare_flow_session;
use crate::cli::RunOptions;
use crate::core::error::TurnError;
use crate::core::lifecycle::TurnOutcome;
use crate::core::message::ConversationTurn;
use crate::core::request::build_run_request;
use crate::core::turn::{run_turn, TurnHandle, TurnObserver, TurnParams};
use crate::utils::logging::TranscriptLog;

/// Prints a turn to the terminal as it happens.
pub struct PrintObserver<W: Write> {
    out: W,
    printed_any: bool,
    defer_fatal: bool,
    errors: Vec<TurnError>,
}

impl<W: Write> PrintObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed_any: false,
            defer_fatal: false,
            errors: Vec::new(),
        }
    }

    /// Keep fatal errors for the caller to report instead of printing them.
    pub fn deferring_fatal_errors(mut self) -> Self {
        self.defer_fatal = true;
        self
    }

    /// The error that ended the turn, if any.
    pub fn first_fatal(&self) -> Option<&TurnError> {
        self.errors.iter().find(|err| err.is_fatal())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TurnObserver for PrintObserver<W> {
    fn on_update(&mut self, _full_text: &str, delta: &str) {
        self.printed_any = true;
        let _ = write!(self.out, "{delta}");
        let _ = self.out.flush();
    }

    fn on_finish(&mut self, final_text: &str) {
        // Replies that never streamed arrive whole here.
        if !self.printed_any && !final_text.is_empty() {
            let _ = write!(self.out, "{final_text}");
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    fn on_error(&mut self, error: &TurnError) {
        if error.is_fatal() {
            if !self.defer_fatal {
                eprintln!("❌ {error}");
            }
        } else {
            eprintln!("⚠️  {error}");
        }
        self.errors.push(error.clone());
    }
}

/// Cancel `handle` on Ctrl+C until the returned task is aborted.
pub fn cancel_on_ctrl_c(handle: TurnHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    })
}

pub async fn run_say(
    prompt: Vec<String>,
    options: RunOptions,
    transcript: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("Usage: flowtalk say <prompt>".into());
    }

    let session = prepare_flow_session(&options).await?;
    let transcript = TranscriptLog::new(transcript)?;

    let history = vec![ConversationTurn::user(prompt)];
    let request = build_run_request(&history, session.stream, &session.components);
    let params = TurnParams::new(session.client, &session.settings, &session.flow_id, request);

    let watcher = cancel_on_ctrl_c(TurnHandle::new(params.cancel_token.clone()));
    let mut printer = PrintObserver::new(io::stdout()).deferring_fatal_errors();
    let summary = run_turn(params, &mut printer).await;
    watcher.abort();

    transcript.log_turn(&history[0])?;
    transcript.log_turn(&ConversationTurn::assistant(summary.text.clone()))?;

    match summary.outcome {
        TurnOutcome::Failed => Err(printer
            .first_fatal()
            .map(|err| err.to_string())
            .unwrap_or_else(|| "Turn failed".to_string())
            .into()),
        TurnOutcome::Cancelled => {
            transcript.log_note("Reply cancelled")?;
            Ok(())
        }
        TurnOutcome::Completed => Ok(()),
    }
}
