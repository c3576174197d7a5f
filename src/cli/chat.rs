//! Line-oriented interactive chat.
//!
//! Each reply is one turn over the whole history. Ctrl+C cancels the reply
//! in progress and keeps what was shown; at the prompt it quits.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::say::PrintObserver;
use crate::cli::session::prepare_flow_session;
use crate::cli::RunOptions;
use crate::core::message::ConversationTurn;
use crate::core::request::build_run_request;
use crate::core::turn::{TurnEvent, TurnHandle, TurnObserver, TurnParams, TurnService};
use crate::utils::logging::TranscriptLog;

#[derive(Debug, PartialEq, Eq)]
enum ChatInput {
    Message(String),
    Reset,
    Quit,
    Empty,
}

fn classify_input(line: &str) -> ChatInput {
    let trimmed = line.trim();
    match trimmed {
        "" => ChatInput::Empty,
        "/quit" | "/exit" => ChatInput::Quit,
        "/reset" => ChatInput::Reset,
        _ => ChatInput::Message(trimmed.to_string()),
    }
}

/// How a reply ended, as seen from the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TurnReply {
    text: String,
    failed: bool,
    cancelled: bool,
}

/// Replays one turn's channel events onto an observer. Events from other
/// turns are ignored.
struct ReplyCollector {
    turn_id: u64,
    shown: String,
    failed: bool,
}

impl ReplyCollector {
    fn new(turn_id: u64) -> Self {
        Self {
            turn_id,
            shown: String::new(),
            failed: false,
        }
    }

    fn handle<O: TurnObserver>(
        &mut self,
        event: TurnEvent,
        turn_id: u64,
        observer: &mut O,
        cancelled: bool,
    ) -> Option<TurnReply> {
        if turn_id != self.turn_id {
            debug!(turn_id, current = self.turn_id, "Dropping event from a stale turn");
            return None;
        }
        match event {
            TurnEvent::Update(delta) => {
                self.shown.push_str(&delta);
                observer.on_update(&self.shown, &delta);
                None
            }
            TurnEvent::Error(err) => {
                self.failed |= err.is_fatal();
                observer.on_error(&err);
                None
            }
            TurnEvent::Finished(text) => {
                observer.on_finish(&text);
                Some(TurnReply {
                    text,
                    failed: self.failed,
                    cancelled,
                })
            }
        }
    }
}

/// Wait for the current turn to finish. Ctrl+C cancels it.
async fn await_reply<O: TurnObserver>(
    rx: &mut mpsc::UnboundedReceiver<(TurnEvent, u64)>,
    handle: &TurnHandle,
    turn_id: u64,
    observer: &mut O,
) -> Option<TurnReply> {
    let mut collector = ReplyCollector::new(turn_id);
    loop {
        let received = tokio::select! {
            received = rx.recv() => received,
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                continue;
            }
        };
        let (event, id) = received?;
        if let Some(reply) = collector.handle(event, id, observer, handle.is_cancelled()) {
            return Some(reply);
        }
    }
}

/// Record a finished reply in the history. Cancelled replies keep the text
/// that was shown; failed turns without text drop the unanswered prompt.
fn record_reply(history: &mut Vec<ConversationTurn>, reply: &TurnReply) {
    if reply.text.is_empty() {
        if reply.failed {
            history.pop();
        }
        return;
    }
    history.push(ConversationTurn::assistant(reply.text.clone()));
}

pub async fn run_chat(
    options: RunOptions,
    transcript: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let session = prepare_flow_session(&options).await?;
    let transcript = TranscriptLog::new(transcript)?;

    println!(
        "Chatting with flow '{}' on {} (transcript: {})",
        session.flow_id,
        session.settings.base_url,
        transcript.status_string()
    );
    println!("Type /reset to start over, /quit or Ctrl+C to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<ConversationTurn> = Vec::new();
    let (service, mut rx) = TurnService::new();
    let mut turn_id: u64 = 0;

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let prompt = match classify_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Reset => {
                history.clear();
                transcript.log_note("Conversation reset")?;
                println!("Conversation reset.");
                continue;
            }
            ChatInput::Message(prompt) => prompt,
        };

        let user_turn = ConversationTurn::user(prompt);
        transcript.log_turn(&user_turn)?;
        history.push(user_turn);

        let request = build_run_request(&history, session.stream, &session.components);
        let params = TurnParams::new(
            session.client.clone(),
            &session.settings,
            &session.flow_id,
            request,
        );
        turn_id += 1;
        let handle = service.spawn_turn(params, turn_id);
        let mut printer = PrintObserver::new(io::stdout());
        let Some(reply) = await_reply(&mut rx, &handle, turn_id, &mut printer).await else {
            return Err("Turn task stopped without finishing".into());
        };
        debug!(turn_id, failed = reply.failed, cancelled = reply.cancelled, "Chat turn done");

        record_reply(&mut history, &reply);
        transcript.log_turn(&ConversationTurn::assistant(reply.text.clone()))?;
        if reply.cancelled {
            transcript.log_note("Reply cancelled")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TurnError;

    #[test]
    fn classifies_commands_and_messages() {
        assert_eq!(classify_input("  "), ChatInput::Empty);
        assert_eq!(classify_input("/quit"), ChatInput::Quit);
        assert_eq!(classify_input("/exit\n"), ChatInput::Quit);
        assert_eq!(classify_input("/reset"), ChatInput::Reset);
        assert_eq!(
            classify_input("  hello there "),
            ChatInput::Message("hello there".into())
        );
    }

    fn reply(text: &str, failed: bool, cancelled: bool) -> TurnReply {
        TurnReply {
            text: text.to_string(),
            failed,
            cancelled,
        }
    }

    #[test]
    fn cancelled_reply_keeps_partial_text() {
        let mut history = vec![ConversationTurn::user("q")];
        record_reply(&mut history, &reply("half an ans", false, true));
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], ConversationTurn::assistant("half an ans"));
    }

    #[test]
    fn failed_turn_without_text_drops_prompt() {
        let mut history = vec![
            ConversationTurn::user("q1"),
            ConversationTurn::assistant("a1"),
            ConversationTurn::user("q2"),
        ];
        record_reply(&mut history, &reply("", true, false));
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], ConversationTurn::assistant("a1"));

        record_reply(&mut history, &reply("", false, false));
        assert_eq!(history.len(), 2, "empty reply keeps the prompt");
    }

    #[test]
    fn collector_replays_current_turn_only() {
        let mut printer = PrintObserver::new(Vec::new());
        let mut collector = ReplyCollector::new(2);

        assert!(collector
            .handle(TurnEvent::Update("stale".into()), 1, &mut printer, false)
            .is_none());
        assert!(collector
            .handle(TurnEvent::Update("Hi".into()), 2, &mut printer, false)
            .is_none());
        assert!(collector
            .handle(TurnEvent::Update(" there".into()), 2, &mut printer, false)
            .is_none());
        let done = collector
            .handle(TurnEvent::Finished("Hi there".into()), 2, &mut printer, false)
            .expect("finished");

        assert_eq!(done, reply("Hi there", false, false));
        let out = String::from_utf8(printer.into_inner()).expect("utf8");
        assert_eq!(out, "Hi there\n");
    }

    #[test]
    fn collector_marks_fatal_errors_as_failed() {
        let mut printer = PrintObserver::new(Vec::new()).deferring_fatal_errors();
        let mut collector = ReplyCollector::new(1);
        collector.handle(
            TurnEvent::Error(TurnError::StreamOpen("refused".into())),
            1,
            &mut printer,
            false,
        );
        let done = collector
            .handle(TurnEvent::Finished(String::new()), 1, &mut printer, false)
            .expect("finished");
        assert!(done.failed);
    }
}
