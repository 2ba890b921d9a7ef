//! Per-stream state machine for one logical turn.
//!
//! A [`RunController`] owns exactly one event stream. It starts in
//! [`ControllerState::Streaming`] and ends in `Done`, `Failed`, or, when the
//! model asks for tools, hands the turn over to a fresh controller for the
//! resubmission stream and ends `Delegated`.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{FailureKind, TurnFailure, TurnSink};
use crate::message::{StreamEvent, ToolInvocationRequest};
use crate::transport::{EventStream, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Streaming,
    AwaitingToolResults,
    Resubmitting,
    Done,
    Failed,
    Delegated,
}

impl ControllerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ControllerState::Done | ControllerState::Failed | ControllerState::Delegated
        )
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ControllerState::Streaming => "streaming",
            ControllerState::AwaitingToolResults => "awaiting tool results",
            ControllerState::Resubmitting => "resubmitting",
            ControllerState::Done => "done",
            ControllerState::Failed => "failed",
            ControllerState::Delegated => "delegated",
        };
        f.write_str(name)
    }
}

/// How one stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed(String),
    Failed(TurnFailure),
    ActionRequired {
        run_id: String,
        calls: Vec<ToolInvocationRequest>,
    },
}

pub struct RunController {
    round: usize,
    state: ControllerState,
    text: String,
    run_id: Option<String>,
    pending: Option<(String, Vec<ToolInvocationRequest>)>,
}

impl RunController {
    /// A controller for tool round `round` (0 for the stream opened by the
    /// user's message).
    pub fn new(round: usize) -> Self {
        Self {
            round,
            state: ControllerState::Streaming,
            text: String::new(),
            run_id: None,
            pending: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Run id, once the stream has announced it.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    fn fail(&mut self, kind: FailureKind, reason: impl Into<String>) -> TurnFailure {
        let state = self.state;
        self.state = ControllerState::Failed;
        let reason = reason.into();
        warn!(round = self.round, %state, ?kind, %reason, "run stream failed");
        TurnFailure {
            kind,
            reason,
            state,
            round: self.round,
        }
    }

    /// Reacts to one event. Returns the outcome once the stream's result is
    /// decided; `None` means keep reading.
    pub fn on_event(&mut self, event: StreamEvent, sink: &mut dyn TurnSink) -> Option<StreamOutcome> {
        trace!(round = self.round, state = %self.state, event = event.kind(), "run event");
        match (self.state, event) {
            (_, StreamEvent::RunCreated { run_id }) => {
                debug!(round = self.round, %run_id, "run started");
                self.run_id = Some(run_id);
                None
            }
            (ControllerState::Streaming, StreamEvent::TextCreated) => {
                sink.segment_started();
                None
            }
            (ControllerState::Streaming, StreamEvent::TextDelta(fragment)) => {
                self.text.push_str(&fragment);
                sink.text_delta(&fragment);
                None
            }
            (ControllerState::Streaming, StreamEvent::ActionRequired { run_id, calls }) => {
                debug!(round = self.round, %run_id, calls = calls.len(), "run requires action");
                self.run_id = Some(run_id.clone());
                self.pending = Some((run_id, calls));
                self.state = ControllerState::AwaitingToolResults;
                None
            }
            (ControllerState::Streaming, StreamEvent::RunCompleted) => {
                self.state = ControllerState::Done;
                Some(StreamOutcome::Completed(std::mem::take(&mut self.text)))
            }
            (_, StreamEvent::RunFailed(reason)) => {
                Some(StreamOutcome::Failed(self.fail(FailureKind::Remote, reason)))
            }
            (ControllerState::AwaitingToolResults, StreamEvent::ActionRequired { .. }) => {
                Some(StreamOutcome::Failed(self.fail(
                    FailureKind::Transport,
                    "second action request while tool results are outstanding",
                )))
            }
            (ControllerState::AwaitingToolResults, StreamEvent::RunCompleted) => {
                Some(StreamOutcome::Failed(self.fail(
                    FailureKind::Transport,
                    "run completed while tool results are outstanding",
                )))
            }
            (_, StreamEvent::Other(_)) => None,
            (state, event) => {
                trace!(%state, event = event.kind(), "event ignored");
                None
            }
        }
    }

    /// Signals the end of the underlying stream.
    pub fn on_end(&mut self) -> StreamOutcome {
        match self.state {
            ControllerState::AwaitingToolResults => match self.pending.take() {
                Some((run_id, calls)) => StreamOutcome::ActionRequired { run_id, calls },
                None => StreamOutcome::Failed(
                    self.fail(FailureKind::Transport, "no captured tool calls"),
                ),
            },
            _ => StreamOutcome::Failed(
                self.fail(FailureKind::Transport, TransportError::UnexpectedEnd.to_string()),
            ),
        }
    }

    /// Consumes `stream` until the outcome is decided.
    ///
    /// After an action request the stream is read to its end, so a stream
    /// that breaks while awaiting tool results fails the turn before any
    /// tool runs.
    pub async fn consume(
        &mut self,
        stream: &mut EventStream,
        sink: &mut dyn TurnSink,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return StreamOutcome::Failed(self.fail(FailureKind::Cancelled, "turn cancelled"));
                }
                next = stream.next() => next,
            };
            match next {
                None => return self.on_end(),
                Some(Err(e)) => {
                    return StreamOutcome::Failed(self.fail(FailureKind::Transport, e.to_string()))
                }
                Some(Ok(event)) => {
                    if let Some(outcome) = self.on_event(event, sink) {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Tool outputs are ready; the next stream is being opened.
    pub fn begin_resubmit(&mut self) {
        debug_assert_eq!(self.state, ControllerState::AwaitingToolResults);
        self.state = ControllerState::Resubmitting;
    }

    /// The resubmission stream is open and owned by a new controller.
    pub fn delegate(&mut self) {
        debug_assert_eq!(self.state, ControllerState::Resubmitting);
        self.state = ControllerState::Delegated;
    }

    /// Marks a failure decided outside the stream (tool dispatch, resubmit).
    pub fn fail_with(&mut self, kind: FailureKind, reason: impl Into<String>) -> TurnFailure {
        self.fail(kind, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    fn call(id: &str) -> ToolInvocationRequest {
        ToolInvocationRequest::new(id, "lookup_by_kind", r#"{"kind":"API"}"#)
    }

    #[test]
    fn test_text_events_reach_sink_in_order() {
        let mut sink = RecordingSink::default();
        let mut c = RunController::new(0);
        assert!(c.on_event(StreamEvent::TextCreated, &mut sink).is_none());
        assert!(c.on_event(StreamEvent::TextDelta("Hel".into()), &mut sink).is_none());
        assert!(c.on_event(StreamEvent::TextDelta("lo".into()), &mut sink).is_none());
        assert_eq!(c.state(), ControllerState::Streaming);

        let outcome = c.on_event(StreamEvent::RunCompleted, &mut sink);
        assert_eq!(outcome, Some(StreamOutcome::Completed("Hello".into())));
        assert_eq!(c.state(), ControllerState::Done);
        assert_eq!(sink.segments, 1);
        assert_eq!(sink.text, "Hello");
    }

    #[test]
    fn test_action_required_waits_for_stream_end() {
        let mut sink = RecordingSink::default();
        let mut c = RunController::new(0);
        let event = StreamEvent::ActionRequired {
            run_id: "run_1".into(),
            calls: vec![call("a"), call("b")],
        };
        assert!(c.on_event(event, &mut sink).is_none());
        assert_eq!(c.state(), ControllerState::AwaitingToolResults);
        assert_eq!(c.run_id(), Some("run_1"));

        match c.on_end() {
            StreamOutcome::ActionRequired { run_id, calls } => {
                assert_eq!(run_id, "run_1");
                assert_eq!(calls.len(), 2);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        c.begin_resubmit();
        assert_eq!(c.state(), ControllerState::Resubmitting);
        c.delegate();
        assert_eq!(c.state(), ControllerState::Delegated);
        assert!(c.state().is_terminal());
    }

    #[test]
    fn test_run_failed_is_terminal_with_reason() {
        let mut sink = RecordingSink::default();
        let mut c = RunController::new(2);
        let outcome = c.on_event(StreamEvent::RunFailed("server_error: oops".into()), &mut sink);
        assert_eq!(
            outcome,
            Some(StreamOutcome::Failed(TurnFailure {
                kind: FailureKind::Remote,
                reason: "server_error: oops".into(),
                state: ControllerState::Streaming,
                round: 2,
            }))
        );
        assert_eq!(c.state(), ControllerState::Failed);
    }

    // Assumes one outstanding action per run; a second batch on the same
    // stream is treated as a protocol violation.
    #[test]
    fn test_overlapping_action_batches_fail() {
        let mut sink = RecordingSink::default();
        let mut c = RunController::new(0);
        let first = StreamEvent::ActionRequired {
            run_id: "r".into(),
            calls: vec![call("a")],
        };
        let second = StreamEvent::ActionRequired {
            run_id: "r".into(),
            calls: vec![call("b")],
        };
        assert!(c.on_event(first, &mut sink).is_none());
        match c.on_event(second, &mut sink) {
            Some(StreamOutcome::Failed(failure)) => {
                assert_eq!(failure.kind, FailureKind::Transport);
                assert_eq!(failure.state, ControllerState::AwaitingToolResults);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_end_while_streaming_is_unexpected() {
        let mut c = RunController::new(0);
        match c.on_end() {
            StreamOutcome::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::Transport);
                assert!(failure.reason.contains("terminal state"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_other_events_are_ignored() {
        let mut sink = RecordingSink::default();
        let mut c = RunController::new(0);
        assert!(c
            .on_event(StreamEvent::Other("thread.run.step.created".into()), &mut sink)
            .is_none());
        assert!(c
            .on_event(StreamEvent::RunCreated { run_id: "run_5".into() }, &mut sink)
            .is_none());
        assert_eq!(c.state(), ControllerState::Streaming);
        assert_eq!(c.run_id(), Some("run_5"));
        assert_eq!(sink.segments, 0);
    }
}
