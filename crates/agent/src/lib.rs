//! The agent loop: routing, tool rounds and final output.
//!
//! A run follows a fixed sequence:
//!
//! 1. **Route** a description of the task to a main model
//! 2. **Call** the main model with the refined context and the tool definitions
//! 3. **If tool calls**: dispatch them concurrently, append the results, run the
//!    refiners and loop back to step 2
//! 4. **Route** a final-output model and ask it for the reply in the requested
//!    format
//!
//! The loop continues until the model replies without tool calls or the run
//! is cancelled.

pub mod agent;
pub mod context;
pub mod dispatch;
pub mod loop_runner;
pub mod refiner;

pub use agent::{Agent, AgentRun, ContextFactory, SimpleContextFactory};
pub use dispatch::{NO_TOOLS_MESSAGE, dispatch_tool_calls};
pub use loop_runner::{AgentLoop, FINAL_OUTPUT_INSTRUCTION};
pub use refiner::{ContextRefiner, IdentityRefiner, SummarizedContext, SummarizingRefiner};

#[cfg(test)]
pub(crate) mod test_helpers;
