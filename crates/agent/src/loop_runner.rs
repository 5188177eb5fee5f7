//! The agent reasoning loop implementation.

use std::sync::Arc;

use relay_core::deps::DependencyRegistry;
use relay_core::error::{Error, Result};
use relay_core::message::{AssistantContent, Context, Message};
use relay_core::output::{OutputFormat, StructuredOutput};
use relay_core::provider::ToolChoice;
use relay_core::tool::{Tool, ToolSet};
use relay_providers::CompletionRequest;
use relay_providers::Router;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::context::token::{estimate_messages_tokens, estimate_tool_tokens};
use crate::dispatch::dispatch_tool_calls;
use crate::refiner::ContextRefiner;

/// Appended before the final-output call.
pub const FINAL_OUTPUT_INSTRUCTION: &str =
    "Provide the final output based on the conversation history.";

/// The core agent loop: routes a model, runs tool rounds until the model
/// stops calling tools, then asks a routed output model for the final reply.
pub struct AgentLoop {
    /// Model pool and coordinator
    router: Arc<Router>,

    /// Tools offered on every round
    tools: ToolSet,

    /// Run in order after every tool round
    refiners: Vec<Arc<dyn ContextRefiner>>,

    /// Shared read-only with every tool call
    deps: Arc<DependencyRegistry>,

    /// Per-call generation cap
    token_limit: Option<u32>,

    /// Checked between rounds
    cancel: Option<watch::Receiver<bool>>,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            tools: ToolSet::new(),
            refiners: Vec::new(),
            deps: Arc::new(DependencyRegistry::new()),
            token_limit: None,
            cancel: None,
        }
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    /// Add a refiner. Refiners run in the order they were added.
    pub fn with_refiner(mut self, refiner: Arc<dyn ContextRefiner>) -> Self {
        self.refiners.push(refiner);
        self
    }

    pub fn with_dependencies(mut self, deps: impl Into<Arc<DependencyRegistry>>) -> Self {
        self.deps = deps.into();
        self
    }

    /// Cap the tokens generated by each model call.
    pub fn with_token_limit(mut self, limit: Option<u32>) -> Self {
        self.token_limit = limit;
        self
    }

    /// Stop with [`Error::Cancelled`] once `signal` holds `true`.
    pub fn with_cancellation(mut self, signal: watch::Receiver<bool>) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(signal) if *signal.borrow() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    /// Tools offered to the model: the loop's own plus refiner contributions.
    fn offered_tools(&self) -> ToolSet {
        let mut tools = self.tools.clone();
        for refiner in &self.refiners {
            tools.extend(refiner.injected_tools());
        }
        tools
    }

    /// Run the loop on `context` and return the final reply's content.
    ///
    /// Every reply, tool result and the final reply are appended to the
    /// context, so the caller can inspect the whole run afterwards.
    pub async fn run(
        &self,
        context: &mut Context,
        output: &OutputFormat,
    ) -> Result<AssistantContent> {
        info!(
            context_id = %context.id(),
            messages = context.messages().len(),
            "Processing context"
        );
        self.check_cancelled()?;

        // ── Routing ──
        let task = format!(
            "This agent is tasked with {}.",
            serde_json::to_string(context.messages())?
        );
        let model = self.router.route_task(&task).await?;

        let tools = self.offered_tools();
        let definitions = tools.definitions();
        let tool_tokens: usize = definitions.iter().map(estimate_tool_tokens).sum();
        let mut round = 0u32;

        // ── Tool rounds ──
        loop {
            self.check_cancelled()?;
            round += 1;
            debug!(
                context_id = %context.id(),
                round,
                model = %model.id(),
                estimated_tokens = estimate_messages_tokens(context.messages()) + tool_tokens,
                "Agent loop round"
            );

            let mut request = CompletionRequest::new()
                .with_tools(definitions.clone())
                .with_token_limit(self.token_limit);
            if !definitions.is_empty() {
                request = request.with_tool_choice(ToolChoice::Auto);
            }
            let completion = model.complete(context.messages().to_vec(), request).await?;

            let calls = completion.message.tool_calls.clone();
            context.push(Message::Assistant(completion.message))?;
            if calls.is_empty() {
                break;
            }

            debug!(context_id = %context.id(), round, tool_count = calls.len(), "Dispatching tool calls");
            let results = dispatch_tool_calls(&calls, &tools, &self.deps).await?;
            context.extend(results)?;

            for refiner in &self.refiners {
                let refined = refiner
                    .refine(context.raw_messages(), context.messages())
                    .await?;
                debug!(
                    context_id = %context.id(),
                    refiner = refiner.name(),
                    before = context.messages().len(),
                    after = refined.len(),
                    "Context refined"
                );
                context.override_refined(refined);
            }
        }

        // ── Final output ──
        self.check_cancelled()?;
        let final_task = format!(
            "The task is to provide the final output for the following agent: {task}\n\n\
             The model will need to extract the final output from the conversation history, \
             and provide it as a structured output."
        );
        let output_model = self.router.route_task(&final_task).await?;
        context.push(Message::user(FINAL_OUTPUT_INSTRUCTION))?;

        let mut request = CompletionRequest::new().with_token_limit(self.token_limit);
        if let Some(format) = output.response_format() {
            request = request.with_response_format(format.clone());
        }
        let completion = output_model
            .complete(context.messages().to_vec(), request)
            .await?;

        let content = completion.message.content.clone();
        context.push(Message::Assistant(completion.message))?;

        info!(
            context_id = %context.id(),
            rounds = round,
            model = %model.id(),
            output_model = %output_model.id(),
            "Agent run complete"
        );
        Ok(content)
    }

    /// Run with a free-text final reply.
    pub async fn run_text(&self, context: &mut Context) -> Result<String> {
        let content = self.run(context, &OutputFormat::Text).await?;
        Ok(content.as_text().into_owned())
    }

    /// Run with `T` as the final reply's schema.
    pub async fn run_structured<T: StructuredOutput>(&self, context: &mut Context) -> Result<T> {
        let content = self.run(context, &T::output_format()).await?;
        Ok(T::from_content(&content)?)
    }
}
