//! Tool dispatch: turns one assistant reply's tool calls into tool messages.

use std::collections::HashSet;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use relay_core::deps::DependencyRegistry;
use relay_core::error::{DependencyError, ToolError};
use relay_core::message::{Message, ToolCall};
use relay_core::tool::{Tool, ToolSet};
use tracing::{debug, warn};

/// Sent instead of tool results when the loop has no tools at all.
pub const NO_TOOLS_MESSAGE: &str = "There are no tools available. Do not use any tool call.";

/// Execute `calls` against `tools`, producing one tool message per call.
///
/// Unknown tools are answered with a "not found" message. A call whose id is
/// empty or repeats an earlier call's id cannot be answered and is skipped.
/// Dependency requirements of every known tool are checked before anything
/// runs; a misconfigured registry is returned as an error. Tool failures
/// become the message content. Known calls run concurrently and their
/// messages are returned in completion order.
pub async fn dispatch_tool_calls(
    calls: &[ToolCall],
    tools: &ToolSet,
    deps: &DependencyRegistry,
) -> Result<Vec<Message>, DependencyError> {
    if calls.is_empty() {
        return Ok(Vec::new());
    }
    if tools.is_empty() {
        warn!(calls = calls.len(), "Model called tools but none are available");
        return Ok(vec![Message::user(NO_TOOLS_MESSAGE)]);
    }

    let mut messages = Vec::with_capacity(calls.len());
    let mut eligible = Vec::with_capacity(calls.len());
    let mut seen = HashSet::with_capacity(calls.len());
    for call in calls {
        if call.id.is_empty() || !seen.insert(call.id.as_str()) {
            warn!(
                tool = %call.function.name,
                call_id = %call.id,
                "Skipping call with unusable id"
            );
            continue;
        }
        match tools.get(&call.function.name) {
            Some(tool) => eligible.push((call, tool)),
            None => {
                let err = ToolError::NotFound(call.function.name.clone());
                warn!(call_id = %call.id, error = %err, "Unknown tool requested");
                messages.push(Message::tool_result(
                    &call.id,
                    format!("{err}."),
                    Some(call.function.name.clone()),
                ));
            }
        }
    }

    for (_, tool) in &eligible {
        tool.verify_dependencies(deps)?;
    }

    let mut running: FuturesUnordered<_> = eligible
        .into_iter()
        .map(|(call, tool)| async move {
            let content = run_one(tool.as_ref(), call, deps).await;
            Message::tool_result(&call.id, content, Some(call.function.name.clone()))
        })
        .collect();

    while let Some(message) = running.next().await {
        messages.push(message);
    }
    Ok(messages)
}

async fn run_one(tool: &dyn Tool, call: &ToolCall, deps: &DependencyRegistry) -> String {
    debug!(tool = %tool.name(), call_id = %call.id, "Executing tool");

    let result = match tool.parameters().parse_arguments(&call.function.arguments) {
        Ok(args) => tool.execute(deps, args).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => output.render(),
        Err(e) => {
            warn!(tool = %tool.name(), call_id = %call.id, error = %e, "Tool failed");
            format!("Tool {} failed: {}", tool.name(), failure_reason(&e))
        }
    }
}

fn failure_reason(error: &ToolError) -> String {
    match error {
        ToolError::ExecutionFailed { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}
