//! Answers an action-required batch.
//!
//! Every call_id in the batch gets exactly one [`ToolOutput`]. Unknown tool
//! names abort the batch before any handler runs; argument and handler
//! failures become error-valued outputs for their own call_id only.

use futures::future::join_all;
use tracing::{info, warn};

use crate::message::{ToolInvocationRequest, ToolOutput};
use crate::tools::dispatch::ToolDispatcher;
use crate::tools::ToolError;

/// Output text sent back for a call whose dispatch failed.
pub fn error_output(err: &ToolError) -> String {
    format!("Error: {err}")
}

/// Dispatches every call concurrently and collects outputs in request order.
///
/// # Errors
///
/// Returns [`ToolError::UnknownTool`] for the first unregistered name.
pub async fn resolve_outputs(
    dispatcher: &ToolDispatcher,
    calls: &[ToolInvocationRequest],
) -> Result<Vec<ToolOutput>, ToolError> {
    if let Some(unknown) = calls
        .iter()
        .find(|c| !dispatcher.registry().contains(&c.tool_name))
    {
        return Err(ToolError::UnknownTool(unknown.tool_name.clone()));
    }

    let results = join_all(calls.iter().map(|call| dispatcher.dispatch(call))).await;

    let mut outputs = Vec::with_capacity(calls.len());
    for (call, result) in calls.iter().zip(results) {
        match result {
            Ok(output) => {
                info!(call_id = %call.call_id, tool = %call.tool_name, bytes = output.output.len(), "tool call answered");
                outputs.push(output);
            }
            Err(e) if e.is_per_call() => {
                warn!(call_id = %call.call_id, tool = %call.tool_name, err = %e, "tool call answered with error");
                outputs.push(ToolOutput::new(call.call_id.clone(), error_output(&e)));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_registry, CountingTool};
    use crate::tools::ToolRegistry;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(test_registry()))
    }

    #[tokio::test]
    async fn test_outputs_are_a_permutation_of_call_ids() {
        let d = dispatcher();
        for n in [0usize, 1, 2, 7] {
            let calls: Vec<_> = (0..n)
                .map(|i| {
                    let (tool, args) = match i % 3 {
                        0 => ("lookup_by_kind", r#"{"kind":"API"}"#),
                        1 => ("always_fails", "{}"),
                        _ => ("lookup_by_kind", "garbage"),
                    };
                    ToolInvocationRequest::new(format!("call_{i}"), tool, args)
                })
                .collect();
            let outputs = resolve_outputs(&d, &calls).await.unwrap();
            assert_eq!(outputs.len(), n);
            let expected: HashSet<_> = calls.iter().map(|c| c.call_id.clone()).collect();
            let got: HashSet<_> = outputs.iter().map(|o| o.call_id.clone()).collect();
            assert_eq!(got, expected);
        }
    }

    #[tokio::test]
    async fn test_failures_become_error_outputs() {
        let calls = vec![
            ToolInvocationRequest::new("ok", "lookup_by_kind", r#"{"kind":"API"}"#),
            ToolInvocationRequest::new("bad_args", "lookup_by_kind", "{"),
            ToolInvocationRequest::new("boom", "always_fails", "{}"),
        ];
        let outputs = resolve_outputs(&dispatcher(), &calls).await.unwrap();
        assert_eq!(outputs[0].call_id, "ok");
        assert!(outputs[0].output.starts_with('['));
        assert_eq!(outputs[1].call_id, "bad_args");
        assert!(outputs[1].output.starts_with("Error: invalid arguments"));
        assert_eq!(outputs[2].call_id, "boom");
        assert!(outputs[2].output.contains("data source missing"));
    }

    #[tokio::test]
    async fn test_unknown_tool_aborts_before_any_handler_runs() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(Box::new(CountingTool::new(Arc::clone(&hits))))
            .unwrap();
        let d = ToolDispatcher::new(Arc::new(registry));

        let calls = vec![
            ToolInvocationRequest::new("a", "counting", "{}"),
            ToolInvocationRequest::new("b", "missing_tool", "{}"),
        ];
        let err = resolve_outputs(&d, &calls).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(ref name) if name == "missing_tool"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
