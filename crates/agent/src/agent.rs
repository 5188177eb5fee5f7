//! Reusable agent definitions.
//!
//! An [`Agent`] bundles everything about a task type that does not change
//! between runs: how to build the initial context from an input, which tools
//! and refiners to use, and the shape of the final reply. Each run gets its
//! own router and dependency registry.

use std::marker::PhantomData;
use std::sync::Arc;

use relay_core::deps::DependencyRegistry;
use relay_core::error::Result;
use relay_core::message::{AssistantContent, Context};
use relay_core::output::{OutputFormat, StructuredOutput};
use relay_core::tool::{Tool, ToolSet};
use relay_providers::Router;
use tracing::debug;

use crate::loop_runner::AgentLoop;
use crate::refiner::ContextRefiner;

/// Builds the initial context for one run.
pub trait ContextFactory<I>: Send + Sync {
    fn build(&self, input: I, deps: &DependencyRegistry) -> Result<Context>;
}

impl<I, F> ContextFactory<I> for F
where
    F: Fn(I, &DependencyRegistry) -> Result<Context> + Send + Sync,
{
    fn build(&self, input: I, deps: &DependencyRegistry) -> Result<Context> {
        self(input, deps)
    }
}

/// An optional system prompt followed by the input as the user prompt.
#[derive(Debug, Clone, Default)]
pub struct SimpleContextFactory {
    system_prompt: Option<String>,
}

impl SimpleContextFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

impl<S: Into<String>> ContextFactory<S> for SimpleContextFactory {
    fn build(&self, input: S, _deps: &DependencyRegistry) -> Result<Context> {
        Ok(Context::simple(input, self.system_prompt.as_deref()))
    }
}

/// The outcome of one [`Agent::run`].
#[derive(Debug)]
pub struct AgentRun {
    /// The context after the run, final reply included.
    pub context: Context,
    pub output: AssistantContent,
}

/// A reusable agent over inputs of type `I`.
pub struct Agent<I> {
    factory: Box<dyn ContextFactory<I>>,
    tools: ToolSet,
    refiners: Vec<Arc<dyn ContextRefiner>>,
    output: OutputFormat,
    token_limit: Option<u32>,
    _input: PhantomData<fn(I)>,
}

impl<I> Agent<I> {
    pub fn new(factory: impl ContextFactory<I> + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            tools: ToolSet::new(),
            refiners: Vec::new(),
            output: OutputFormat::Text,
            token_limit: None,
            _input: PhantomData,
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

    pub fn with_refiner(mut self, refiner: Arc<dyn ContextRefiner>) -> Self {
        self.refiners.push(refiner);
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// Use `T`'s schema for the final reply.
    pub fn with_structured_output<T: StructuredOutput>(self) -> Self {
        self.with_output(T::output_format())
    }

    pub fn with_token_limit(mut self, limit: Option<u32>) -> Self {
        self.token_limit = limit;
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Verify dependencies, build the context and run the loop.
    ///
    /// Dependency requirements of every tool, refiner contributions included,
    /// are checked before any model is called.
    pub async fn run(
        &self,
        input: I,
        router: Arc<Router>,
        deps: DependencyRegistry,
    ) -> Result<AgentRun> {
        let mut tools = self.tools.clone();
        for refiner in &self.refiners {
            tools.extend(refiner.injected_tools());
        }
        tools.verify_dependencies(&deps)?;

        let mut context = self.factory.build(input, &deps)?;
        debug!(context_id = %context.id(), tools = tools.len(), "Agent context built");

        let agent_loop = self
            .refiners
            .iter()
            .cloned()
            .fold(AgentLoop::new(router), AgentLoop::with_refiner)
            .with_tools(self.tools.clone())
            .with_dependencies(deps)
            .with_token_limit(self.token_limit);

        let output = agent_loop.run(&mut context, &self.output).await?;
        Ok(AgentRun { context, output })
    }

    /// Run and decode the final reply as `T`.
    pub async fn run_structured<T: StructuredOutput>(
        &self,
        input: I,
        router: Arc<Router>,
        deps: DependencyRegistry,
    ) -> Result<T> {
        let run = self.run(input, router, deps).await?;
        Ok(T::from_content(&run.output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use relay_core::error::{DependencyError, Error};
    use relay_core::message::Message;
    use serde_json::json;

    #[tokio::test]
    async fn simple_factory_builds_and_runs() {
        let transport = StubTransport::new("main", vec![text_reply("4"), text_reply("4")]);
        let agent = Agent::new(SimpleContextFactory::new().with_system_prompt("Do math."));

        let run = agent
            .run("2 + 2?", stub_router(transport.clone()), DependencyRegistry::new())
            .await
            .unwrap();

        assert_eq!(run.output.as_text(), "4");
        assert_eq!(run.context.raw_messages()[0], Message::system("Do math."));
        assert_eq!(run.context.raw_messages()[1], Message::user("2 + 2?"));
    }

    #[tokio::test]
    async fn dependencies_are_verified_before_any_model_call() {
        let transport = StubTransport::new("main", vec![]);
        let agent: Agent<String> =
            Agent::new(SimpleContextFactory::new()).with_tool(Arc::new(GreeterTool));

        let err = agent
            .run("hi".into(), stub_router(transport.clone()), DependencyRegistry::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Dependency(DependencyError::NotFound { .. })));
        assert!(transport.routing_requests().is_empty());
        assert!(transport.work_requests().is_empty());
    }

    #[tokio::test]
    async fn closure_factory_sees_dependencies() {
        let transport = StubTransport::new(
            "main",
            vec![
                tool_calls_reply(vec![call("c1", "greeter", json!({}))]),
                text_reply("greeted"),
                text_reply("greeted"),
            ],
        );
        let factory = |name: &'static str, deps: &DependencyRegistry| -> Result<Context> {
            let greeting = deps.get(&GREETING)?;
            Ok(Context::simple(format!("{greeting}, {name}"), None))
        };
        let agent = Agent::new(factory).with_tool(Arc::new(GreeterTool));
        let deps = DependencyRegistry::new().with(&GREETING, "hello".to_string());

        let run = agent
            .run("Dana", stub_router(transport), deps)
            .await
            .unwrap();

        assert_eq!(run.context.raw_messages()[0], Message::user("hello, Dana"));
        assert_eq!(run.output.as_text(), "greeted");
    }
}
