//! One conversational turn, from run request to final text.
//!
//! A turn runs as a single task. It suspends at well-defined points (the
//! initiation call, the stream connect, each stream read, each animation
//! tick) and every suspension point also listens to the turn's cancellation
//! token. The wall-clock timeout cancels the same token, so a timed-out turn
//! ends exactly like one the user cancelled: pending text is flushed and
//! handed to `on_finish`.

use std::time::Duration;

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::api::RunFlowRequest;
use crate::core::animator::OutputAnimator;
use crate::core::chat_stream::{open_stream, EventStream, StreamMessage, StreamOpening};
use crate::core::config::FlowSettings;
use crate::core::error::TurnError;
use crate::core::initiator::{initiate, run_flow_url, RunHandle};
use crate::core::lifecycle::{TurnLifecycle, TurnOutcome, TurnPhase};
use crate::utils::url::resolve_against_base;

/// Caller-facing callbacks for one turn.
pub trait TurnObserver {
    /// Receives the handle that cancels this turn. Called before any I/O.
    fn on_controller(&mut self, _handle: TurnHandle) {}

    /// Newly displayed text: the full text shown so far and the slice that
    /// was just added to it.
    fn on_update(&mut self, full_text: &str, delta: &str);

    /// Called exactly once per turn.
    fn on_finish(&mut self, final_text: &str);

    /// Called at most once for a fatal error, before `on_finish`, or for an
    /// empty response.
    fn on_error(&mut self, error: &TurnError);
}

/// Cancels a running turn.
#[derive(Debug, Clone)]
pub struct TurnHandle {
    cancel_token: CancellationToken,
}

impl TurnHandle {
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self { cancel_token }
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

pub struct TurnParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub flow_id: String,
    pub request: RunFlowRequest,
    pub cancel_token: CancellationToken,
    pub timeout: Duration,
    pub frame_interval: Duration,
}

impl TurnParams {
    pub fn new(
        client: reqwest::Client,
        settings: &FlowSettings,
        flow_id: impl Into<String>,
        request: RunFlowRequest,
    ) -> Self {
        Self {
            client,
            base_url: settings.base_url.clone(),
            flow_id: flow_id.into(),
            request,
            cancel_token: CancellationToken::new(),
            timeout: settings.request_timeout,
            frame_interval: settings.frame_interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSummary {
    pub outcome: TurnOutcome,
    pub phase: TurnPhase,
    pub text: String,
}

/// Owns the per-turn state and routes every ending through the lifecycle's
/// finish latch.
pub struct TurnDriver<'a, O: TurnObserver> {
    lifecycle: TurnLifecycle,
    animator: OutputAnimator,
    observer: &'a mut O,
    error_reported: bool,
    stream_closed: bool,
}

impl<'a, O: TurnObserver> TurnDriver<'a, O> {
    pub fn new(observer: &'a mut O) -> Self {
        Self {
            lifecycle: TurnLifecycle::new(),
            animator: OutputAnimator::new(),
            observer,
            error_reported: false,
            stream_closed: false,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.lifecycle.phase()
    }

    pub fn is_finished(&self) -> bool {
        self.lifecycle.is_finished()
    }

    pub fn advance(&mut self, phase: TurnPhase) -> bool {
        self.lifecycle.advance(phase)
    }

    pub fn report(&mut self, error: TurnError) {
        if self.error_reported || self.lifecycle.is_finished() {
            debug!(%error, "Dropping error reported after the first one");
            return;
        }
        self.error_reported = true;
        self.observer.on_error(&error);
    }

    /// Feed one message from the event stream. Returns a summary if the
    /// message ended the turn.
    pub fn on_stream_message(&mut self, message: StreamMessage) -> Option<TurnSummary> {
        if self.lifecycle.is_finished() {
            return None;
        }
        match message {
            StreamMessage::Chunk(chunk) => {
                self.animator.push(&chunk);
                None
            }
            StreamMessage::Closed => {
                if !self.stream_closed {
                    self.stream_closed = true;
                    self.lifecycle.advance(TurnPhase::Animating);
                }
                None
            }
            StreamMessage::Failed(message) => {
                self.report(TurnError::StreamInterrupted(message));
                Some(self.flush_and_finish(TurnOutcome::Failed))
            }
            StreamMessage::Cancelled => Some(self.cancel()),
        }
    }

    /// One animation step. Returns a summary once the stream has closed and
    /// everything buffered has been shown.
    pub fn on_tick(&mut self) -> Option<TurnSummary> {
        if self.lifecycle.is_finished() {
            return None;
        }
        if let Some(frame) = self.animator.step() {
            self.observer
                .on_update(self.animator.finalized(), &frame.delta);
        }
        if self.stream_closed && !self.animator.has_pending() {
            let text = self.animator.finalized().to_string();
            return Some(self.finish(TurnOutcome::Completed, text));
        }
        None
    }

    /// End the turn because its token was cancelled. Buffered text is kept.
    pub fn cancel(&mut self) -> TurnSummary {
        self.flush_and_finish(TurnOutcome::Cancelled)
    }

    fn flush_and_finish(&mut self, outcome: TurnOutcome) -> TurnSummary {
        if !self.lifecycle.is_finished() {
            if let Some(frame) = self.animator.flush() {
                self.observer
                    .on_update(self.animator.finalized(), &frame.delta);
            }
        }
        let text = self.animator.finalized().to_string();
        self.finish(outcome, text)
    }

    /// The single exit of a turn. Later calls leave the first result intact.
    pub fn finish(&mut self, outcome: TurnOutcome, text: String) -> TurnSummary {
        let phase_before = self.lifecycle.phase();
        if self.lifecycle.is_finished() {
            debug!(
                phase = %self.lifecycle.phase(),
                requested = ?outcome,
                "Turn already finished; ignoring"
            );
            return self.summary_after_finish(text);
        }

        // Completion is only valid once output exists; anything earlier
        // still ends the turn, as a failure.
        let mut outcome = outcome;
        if !self.lifecycle.finish(outcome) {
            warn!(phase = %phase_before, requested = ?outcome, "Turn cannot complete from this phase");
            outcome = TurnOutcome::Failed;
            self.lifecycle.finish(outcome);
        }

        if outcome == TurnOutcome::Completed && text.is_empty() && !self.error_reported {
            self.error_reported = true;
            self.observer.on_error(&TurnError::EmptyResponse);
        }
        debug!(from = %phase_before, ?outcome, chars = text.chars().count(), "Turn complete");
        self.observer.on_finish(&text);

        TurnSummary {
            outcome,
            phase: self.lifecycle.phase(),
            text,
        }
    }

    fn summary_after_finish(&self, text: String) -> TurnSummary {
        let outcome = match self.lifecycle.phase() {
            TurnPhase::Aborted => TurnOutcome::Cancelled,
            TurnPhase::Errored => TurnOutcome::Failed,
            _ => TurnOutcome::Completed,
        };
        TurnSummary {
            outcome,
            phase: self.lifecycle.phase(),
            text,
        }
    }
}

/// Cancel `cancel_token` once `timeout` elapses. Dropping the guard disarms
/// the timer.
fn arm_timeout(cancel_token: CancellationToken, timeout: Duration) -> DropGuard {
    let disarm = CancellationToken::new();
    let guard = disarm.clone().drop_guard();
    tokio::spawn(async move {
        tokio::select! {
            _ = disarm.cancelled() => {}
            _ = cancel_token.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                warn!(timeout_secs = timeout.as_secs_f64(), "Turn timed out; cancelling");
                cancel_token.cancel();
            }
        }
    });
    guard
}

/// Drive one turn to completion, reporting through `observer`.
pub async fn run_turn<O: TurnObserver>(params: TurnParams, observer: &mut O) -> TurnSummary {
    let TurnParams {
        client,
        base_url,
        flow_id,
        request,
        cancel_token,
        timeout,
        frame_interval,
    } = params;

    observer.on_controller(TurnHandle::new(cancel_token.clone()));
    let _timeout_guard = arm_timeout(cancel_token.clone(), timeout);
    let mut driver = TurnDriver::new(observer);

    driver.advance(TurnPhase::Initiating);
    let run_url = run_flow_url(&base_url, &flow_id);
    debug!(flow_id = %flow_id, url = %run_url, "Submitting turn");

    let initiated = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => None,
        result = initiate(&client, &run_url, &request) => Some(result),
    };

    let handle = match initiated {
        None => return driver.cancel(),
        Some(Err(err)) => {
            driver.report(TurnError::Initiation(err));
            return driver.finish(TurnOutcome::Failed, String::new());
        }
        Some(Ok(handle)) => handle,
    };

    let locator = match handle {
        RunHandle::Inline(text) => {
            driver.advance(TurnPhase::DirectResult);
            return driver.finish(TurnOutcome::Completed, text);
        }
        RunHandle::Streamed(locator) => locator,
    };

    driver.advance(TurnPhase::StreamOpen);
    let stream_url = resolve_against_base(&base_url, &locator);
    match open_stream(&client, &stream_url, cancel_token.clone()).await {
        Err(err) => {
            driver.report(err);
            driver.finish(TurnOutcome::Failed, String::new())
        }
        Ok(StreamOpening::Cancelled) => driver.cancel(),
        Ok(StreamOpening::Complete(text)) => driver.finish(TurnOutcome::Completed, text),
        Ok(StreamOpening::Events(events)) => {
            drive_stream(&mut driver, events, &cancel_token, frame_interval).await
        }
    }
}

/// Read events and animate until the turn ends.
pub async fn drive_stream<O, S, E>(
    driver: &mut TurnDriver<'_, O>,
    mut events: EventStream<S>,
    cancel_token: &CancellationToken,
    frame_interval: Duration,
) -> TurnSummary
where
    O: TurnObserver,
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stream_done = false;

    loop {
        let summary = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => Some(driver.cancel()),
            _ = ticker.tick() => driver.on_tick(),
            message = events.next_message(), if !stream_done => {
                stream_done = !matches!(message, StreamMessage::Chunk(_));
                driver.on_stream_message(message)
            }
        };
        if let Some(summary) = summary {
            return summary;
        }
    }
}

/// Events emitted by [`TurnService`]; deltas concatenate to the final text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnEvent {
    Update(String),
    Error(TurnError),
    Finished(String),
}

struct ChannelObserver {
    tx: mpsc::UnboundedSender<(TurnEvent, u64)>,
    turn_id: u64,
}

impl TurnObserver for ChannelObserver {
    fn on_update(&mut self, _full_text: &str, delta: &str) {
        let _ = self
            .tx
            .send((TurnEvent::Update(delta.to_string()), self.turn_id));
    }

    fn on_finish(&mut self, final_text: &str) {
        let _ = self
            .tx
            .send((TurnEvent::Finished(final_text.to_string()), self.turn_id));
    }

    fn on_error(&mut self, error: &TurnError) {
        let _ = self.tx.send((TurnEvent::Error(error.clone()), self.turn_id));
    }
}

/// Runs turns on background tasks and reports their events over a channel.
#[derive(Clone)]
pub struct TurnService {
    tx: mpsc::UnboundedSender<(TurnEvent, u64)>,
}

impl TurnService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(TurnEvent, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_turn(&self, params: TurnParams, turn_id: u64) -> TurnHandle {
        let handle = TurnHandle::new(params.cancel_token.clone());
        let mut observer = ChannelObserver {
            tx: self.tx.clone(),
            turn_id,
        };
        tokio::spawn(async move {
            let summary = run_turn(params, &mut observer).await;
            debug!(turn_id, outcome = ?summary.outcome, "Turn task done");
        });
        handle
    }
}
