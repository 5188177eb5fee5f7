//! Context budgeting helpers.

pub mod token;

pub use token::{estimate_messages_tokens, estimate_tokens};
