//! Turn orchestration: one user message through every tool round.
//!
//! [`run_turn`] opens a run stream and hands it to a [`RunController`].
//! When the model requests tools, the batch is answered through the
//! [`resubmit`] driver, the outputs are submitted on the same run, and a
//! fresh controller takes over the new stream. The chain is an explicit
//! loop bounded by [`TurnOptions::max_tool_rounds`].

pub mod controller;
pub mod resubmit;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::message::ToolInvocationRequest;
use crate::tools::dispatch::ToolDispatcher;
use crate::tools::ToolError;
use crate::transport::SessionTransport;
pub use controller::{ControllerState, RunController, StreamOutcome};

/// Receives a turn's output as it streams.
pub trait TurnSink {
    /// A new assistant message segment begins.
    fn segment_started(&mut self);

    /// A fragment of assistant text, in arrival order.
    fn text_delta(&mut self, fragment: &str);

    /// The model invoked a tool.
    fn tool_called(&mut self, _request: &ToolInvocationRequest) {}

    /// Outputs for a batch are being submitted.
    fn submitting_outputs(&mut self, _count: usize) {}
}

/// Why a turn failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The service reported the run as failed, cancelled or expired.
    Remote,
    /// The stream broke or violated the protocol.
    Transport,
    /// The caller cancelled the turn.
    Cancelled,
    /// The model kept requesting tools past the configured limit.
    RoundLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnFailure {
    pub kind: FailureKind,
    pub reason: String,
    /// Last known controller state before the failure.
    pub state: ControllerState,
    /// Tool round in which the failure happened.
    pub round: usize,
}

impl std::fmt::Display for TurnFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (while {}, round {})",
            self.reason, self.state, self.round
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnResult {
    /// Text of the final stream, and how many tool rounds preceded it.
    Completed { text: String, rounds: usize },
    Failed(TurnFailure),
}

/// Fatal errors that abort a turn without a result.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Tool(#[from] ToolError),
}

#[derive(Debug, Clone, Copy)]
pub struct TurnOptions {
    pub max_tool_rounds: usize,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            max_tool_rounds: crate::constants::DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

/// Best-effort cancel of a run left waiting on the service.
async fn release_run(transport: &dyn SessionTransport, thread_id: &str, run_id: Option<&str>) {
    if let Some(run_id) = run_id {
        if let Err(e) = transport.cancel_run(thread_id, run_id).await {
            warn!(thread_id, run_id, err = %e, "failed to cancel run");
        }
    }
}

/// Runs one turn on `thread_id` to completion or failure.
///
/// The user's message must already be on the thread. Text fragments from
/// every stream reach `sink`; the returned text is the final stream's only.
///
/// # Errors
///
/// Returns [`TurnError::Tool`] when the model calls a tool that is not
/// registered. The paused run is cancelled first.
pub async fn run_turn(
    transport: &dyn SessionTransport,
    dispatcher: &ToolDispatcher,
    options: TurnOptions,
    thread_id: &str,
    assistant_id: &str,
    sink: &mut dyn TurnSink,
    cancel: &CancellationToken,
) -> Result<TurnResult, TurnError> {
    let mut controller = RunController::new(0);
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Ok(TurnResult::Failed(
                controller.fail_with(FailureKind::Cancelled, "turn cancelled"),
            ));
        }
        opened = transport.open_stream(thread_id, assistant_id) => opened,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            return Ok(TurnResult::Failed(
                controller.fail_with(FailureKind::Transport, e.to_string()),
            ));
        }
    };

    // Chain state carried from one delegated controller to the next.
    let mut run_id: Option<String> = None;
    let mut round = 0usize;

    loop {
        let outcome = controller.consume(&mut stream, sink, cancel).await;
        if let Some(id) = controller.run_id() {
            run_id = Some(id.to_string());
        }

        let (action_run_id, calls) = match outcome {
            StreamOutcome::Completed(text) => {
                debug_assert!(controller.state().is_terminal());
                info!(thread_id, rounds = round, "turn completed");
                return Ok(TurnResult::Completed {
                    text,
                    rounds: round,
                });
            }
            StreamOutcome::Failed(failure) => {
                if failure.kind == FailureKind::Cancelled {
                    release_run(transport, thread_id, run_id.as_deref()).await;
                }
                return Ok(TurnResult::Failed(failure));
            }
            StreamOutcome::ActionRequired { run_id, calls } => (run_id, calls),
        };

        if round >= options.max_tool_rounds {
            release_run(transport, thread_id, Some(&action_run_id)).await;
            return Ok(TurnResult::Failed(controller.fail_with(
                FailureKind::RoundLimit,
                format!(
                    "model requested more than {} tool rounds",
                    options.max_tool_rounds
                ),
            )));
        }

        for call in &calls {
            sink.tool_called(call);
        }
        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            resolved = resubmit::resolve_outputs(dispatcher, &calls) => Some(resolved),
        };
        let outputs = match resolved {
            None => {
                release_run(transport, thread_id, Some(&action_run_id)).await;
                return Ok(TurnResult::Failed(
                    controller.fail_with(FailureKind::Cancelled, "turn cancelled"),
                ));
            }
            Some(Err(e)) => {
                release_run(transport, thread_id, Some(&action_run_id)).await;
                return Err(e.into());
            }
            Some(Ok(outputs)) => outputs,
        };

        controller.begin_resubmit();
        sink.submitting_outputs(outputs.len());
        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                release_run(transport, thread_id, Some(&action_run_id)).await;
                return Ok(TurnResult::Failed(
                    controller.fail_with(FailureKind::Cancelled, "turn cancelled"),
                ));
            }
            submitted = transport.submit_tool_outputs(thread_id, &action_run_id, &outputs) => submitted,
        };
        stream = match submitted {
            Ok(stream) => stream,
            Err(e) => {
                return Ok(TurnResult::Failed(
                    controller.fail_with(FailureKind::Transport, e.to_string()),
                ));
            }
        };
        controller.delegate();
        round += 1;
        info!(thread_id, run_id = %action_run_id, round, "tool outputs submitted");

        controller = RunController::new(round);
    }
}
