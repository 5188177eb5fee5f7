//! Chat endpoints, model adapters and model routing for Relay.
//!
//! A [`Model`] wraps a `relay_core::ChatTransport` (normally the
//! [`OpenAiCompatTransport`]) with the adapter chain its configuration asks
//! for. The [`Router`] owns the model pool and picks a model per task.

pub mod adapters;
pub mod model;
pub mod openai_compat;
pub mod router;

pub use adapters::{FINAL_OUTPUT_TOOL, ModelAdapter};
pub use model::{Completion, CompletionRequest, Model};
pub use openai_compat::OpenAiCompatTransport;
pub use router::{ModelChoice, PoolEntry, Router};

#[cfg(test)]
pub(crate) mod test_helpers;
