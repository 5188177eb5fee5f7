//! Summarizing refiner.
//!
//! Splits the refined timeline at the last assistant message. Everything
//! before it (system messages aside) is condensed by a summarization model
//! into a [`SummarizedContext`], which is replayed as a handful of synthetic
//! messages. The tail from the last assistant message on is kept verbatim,
//! so pending tool results stay attached to the call that produced them.

use std::sync::Arc;

use async_trait::async_trait;
use relay_config::SummarizerConfig;
use relay_core::error::{RefinerError, RouterError};
use relay_core::message::{Message, Role};
use relay_core::output::StructuredOutput;
use relay_providers::{Model, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::ContextRefiner;
use crate::context::token::estimate_messages_tokens;

/// Task description used to route the summarization model.
pub const SUMMARIZE_TASK: &str = "Summarize context.";

const SUMMARIZER_PROMPT: &str = "You condense an agent's conversation so it can continue with less context.

Record:
- every request the user made, with the final reply or, if unfinished, the partial reply and progress so far;
- facts that were verified during the conversation;
- technical artifacts (files, functions, APIs, commands) with their key signatures and where to find them;
- ideas that are still open;
- what the assistant planned to do next.

Guidelines:
- Use short sentences that keep every piece of information. Keep exact names, paths and numbers.
- Do not answer any question asked by the user or the assistant. Open questions stay open.
- Do not change any information and do not invent new information.
- Only record plans the assistant actually made. Do not invent plans.
- If the history already contains a summary, merge it into the new one without losing anything.
- Record data returned by tools as technical artifacts, not as facts. Summarize very large tool data and say how to fetch the exact data again.
- Do not summarize system messages. They are kept separately.";

// ── Summary schema ─────────────────────────────────────────

/// How far a user request got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RequestReply {
    Final { reply: String },
    InProgress { partial_reply: String, progress: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRequest {
    pub request: String,
    pub reply: RequestReply,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalArtifact {
    pub name: String,
    /// file, function, class, endpoint, command...
    pub kind: String,
    pub summary: String,
    pub key_signatures: Vec<String>,
    pub location_pointer: String,
}

/// The summarization model's answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarizedContext {
    pub user_requests: Vec<UserRequest>,
    pub facts: Vec<String>,
    pub technical_artifacts: Vec<TechnicalArtifact>,
    pub ideas: Vec<String>,
    pub assistant_plans: Vec<String>,
}

fn string_list(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

impl StructuredOutput for SummarizedContext {
    const NAME: &'static str = "SummarizedContext";

    fn json_schema() -> Value {
        let final_reply = json!({
            "type": "object",
            "properties": {
                "status": { "type": "string", "enum": ["final"] },
                "reply": { "type": "string" }
            },
            "required": ["status", "reply"],
            "additionalProperties": false
        });
        let in_progress = json!({
            "type": "object",
            "properties": {
                "status": { "type": "string", "enum": ["in_progress"] },
                "partial_reply": { "type": "string" },
                "progress": { "type": "string" }
            },
            "required": ["status", "partial_reply", "progress"],
            "additionalProperties": false
        });

        json!({
            "type": "object",
            "properties": {
                "user_requests": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "request": { "type": "string" },
                            "reply": { "anyOf": [final_reply, in_progress] }
                        },
                        "required": ["request", "reply"],
                        "additionalProperties": false
                    }
                },
                "facts": string_list("Facts verified during the conversation"),
                "technical_artifacts": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "kind": { "type": "string" },
                            "summary": { "type": "string" },
                            "key_signatures": { "type": "array", "items": { "type": "string" } },
                            "location_pointer": { "type": "string" }
                        },
                        "required": ["name", "kind", "summary", "key_signatures", "location_pointer"],
                        "additionalProperties": false
                    }
                },
                "ideas": string_list("Open ideas worth keeping"),
                "assistant_plans": string_list("Next steps the assistant planned")
            },
            "required": ["user_requests", "facts", "technical_artifacts", "ideas", "assistant_plans"],
            "additionalProperties": false
        })
    }
}

impl SummarizedContext {
    /// Replay the summary as conversation messages.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();

        if !self.user_requests.is_empty() {
            let requests: Vec<&str> = self
                .user_requests
                .iter()
                .map(|r| r.request.as_str())
                .collect();
            messages.push(Message::user(format!(
                "I need you to: {}",
                json!(requests)
            )));
            messages.push(Message::assistant(format!(
                "Current Objective from the user & History of my progress: {}",
                json!(self.user_requests)
            )));
        }

        messages.push(Message::assistant(format!(
            "My knowledge base is: {}",
            json!({ "verified_facts": self.facts, "current_ideas": self.ideas })
        )));

        if !self.technical_artifacts.is_empty() {
            let blocks: Vec<String> = self
                .technical_artifacts
                .iter()
                .map(|a| {
                    format!(
                        "Artifact: {} ({})\nSummary: {}\nLocation: {}\nSignatures: {}",
                        a.name,
                        a.kind,
                        a.summary,
                        a.location_pointer,
                        a.key_signatures.join(", ")
                    )
                })
                .collect();
            messages.push(Message::user_named(
                format!("Technical Reference:\n{}", blocks.join("\n\n")),
                "tech_library",
            ));
        }

        if !self.assistant_plans.is_empty() {
            messages.push(Message::assistant(format!(
                "I need to: {}",
                json!(self.assistant_plans)
            )));
        }

        messages
    }
}

// ── Refiner ────────────────────────────────────────────────

enum SummarizerSource {
    Fixed(Arc<Model>),
    Routed {
        router: Arc<Router>,
        chosen: OnceCell<Arc<Model>>,
    },
}

/// Summarizes older context once it grows past a threshold.
pub struct SummarizingRefiner {
    source: SummarizerSource,
    token_threshold: Option<usize>,
}

impl SummarizingRefiner {
    /// Summarize with a fixed model.
    pub fn with_model(model: Arc<Model>) -> Self {
        Self {
            source: SummarizerSource::Fixed(model),
            token_threshold: None,
        }
    }

    /// Route a summarization model on first use and keep it.
    pub fn routed(router: Arc<Router>) -> Self {
        Self {
            source: SummarizerSource::Routed {
                router,
                chosen: OnceCell::new(),
            },
            token_threshold: None,
        }
    }

    /// Skip summarization while the refined timeline is estimated below
    /// `threshold` tokens.
    pub fn with_token_threshold(mut self, threshold: Option<usize>) -> Self {
        self.token_threshold = threshold;
        self
    }

    /// Build from the `[summarizer]` section. `None` when disabled.
    pub fn from_config(
        config: &SummarizerConfig,
        router: Arc<Router>,
    ) -> Result<Option<Self>, RouterError> {
        if !config.enabled {
            return Ok(None);
        }
        let refiner = match &config.model {
            Some(id) => {
                let model = router
                    .get(id)
                    .ok_or_else(|| RouterError::UnknownModel(id.clone()))?;
                Self::with_model(model)
            }
            None => Self::routed(router),
        };
        Ok(Some(refiner.with_token_threshold(config.token_threshold)))
    }

    async fn model(&self) -> Result<Arc<Model>, RefinerError> {
        match &self.source {
            SummarizerSource::Fixed(model) => Ok(Arc::clone(model)),
            SummarizerSource::Routed { router, chosen } => {
                let model = chosen
                    .get_or_try_init(|| async { router.route_task(SUMMARIZE_TASK).await })
                    .await?;
                Ok(Arc::clone(model))
            }
        }
    }
}

#[async_trait]
impl ContextRefiner for SummarizingRefiner {
    fn name(&self) -> &str {
        "summarize"
    }

    async fn refine(
        &self,
        _raw: &[Message],
        refined: &[Message],
    ) -> Result<Vec<Message>, RefinerError> {
        let split = refined
            .iter()
            .rposition(|m| m.role() == Role::Assistant)
            .ok_or(RefinerError::NoAssistantMessage)?;

        if let Some(threshold) = self.token_threshold {
            let estimate = estimate_messages_tokens(refined);
            if estimate < threshold {
                debug!(estimate, threshold, "Context below summarization threshold");
                return Ok(refined.to_vec());
            }
        }

        let (prefix, tail) = refined.split_at(split);
        let (system, history): (Vec<&Message>, Vec<&Message>) =
            prefix.iter().partition(|m| m.role() == Role::System);
        if history.is_empty() {
            return Ok(refined.to_vec());
        }

        let model = self.model().await?;
        let request = vec![
            Message::system(SUMMARIZER_PROMPT),
            Message::user(format!(
                "Summarize the following messages: {}",
                json!(history)
            )),
        ];
        let summary: SummarizedContext = model.complete_structured(request, None).await?;

        let synthetic = summary.to_messages();
        info!(
            model = %model.id(),
            summarized = history.len(),
            kept = tail.len(),
            synthetic = synthetic.len(),
            "Context summarized"
        );

        let mut out = Vec::with_capacity(system.len() + synthetic.len() + tail.len());
        out.extend(system.into_iter().cloned());
        out.extend(synthetic);
        out.extend_from_slice(tail);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use relay_core::message::AssistantMessage;

    fn summary_json() -> String {
        json!({
            "user_requests": [{
                "request": "Fix the failing parser test",
                "reply": {
                    "status": "in_progress",
                    "partial_reply": "Found the test",
                    "progress": "Located parse_header in src/parser.rs"
                }
            }],
            "facts": ["parse_header rejects empty input"],
            "technical_artifacts": [{
                "name": "parse_header",
                "kind": "function",
                "summary": "Parses the request header",
                "key_signatures": ["fn parse_header(input: &str) -> Result<Header>"],
                "location_pointer": "src/parser.rs:42"
            }],
            "ideas": ["Maybe allow empty headers"],
            "assistant_plans": ["Patch parse_header", "Rerun the tests"]
        })
        .to_string()
    }

    fn conversation() -> Vec<Message> {
        let first = AssistantMessage::default()
            .with_tool_calls(vec![call("c1", "find", json!({"q": "parse_header"}))]);
        let second = AssistantMessage::default()
            .with_tool_calls(vec![call("c2", "read_file", json!({"file_path": "src/parser.rs"}))]);
        vec![
            Message::system("You are a coding agent."),
            Message::user("Fix the failing parser test"),
            Message::Assistant(first),
            Message::tool_result("c1", "src/parser.rs:42", Some("find".into())),
            Message::Assistant(second),
            Message::tool_result("c2", "fn parse_header(...)", Some("read_file".into())),
        ]
    }

    #[tokio::test]
    async fn no_assistant_message_is_an_error_before_any_model_call() {
        let transport = StubTransport::new("main", vec![]);
        let refiner = SummarizingRefiner::routed(stub_router(transport.clone()));
        let refined = vec![Message::system("s"), Message::user("hello")];

        let err = refiner.refine(&refined, &refined).await.unwrap_err();

        assert!(matches!(err, RefinerError::NoAssistantMessage));
        assert!(transport.routing_requests().is_empty());
        assert!(transport.work_requests().is_empty());
    }

    #[tokio::test]
    async fn below_threshold_is_a_no_op() {
        let transport = StubTransport::new("main", vec![]);
        let refiner = SummarizingRefiner::routed(stub_router(transport.clone()))
            .with_token_threshold(Some(10_000));
        let refined = conversation();

        let out = refiner.refine(&refined, &refined).await.unwrap();

        assert_eq!(out, refined);
        assert!(transport.work_requests().is_empty());
    }

    #[tokio::test]
    async fn prefix_is_replaced_by_summary_and_tail_kept() {
        let transport = StubTransport::new("main", vec![text_reply(&summary_json())]);
        let refiner = SummarizingRefiner::routed(stub_router(transport.clone()));
        let refined = conversation();

        let out = refiner.refine(&refined, &refined).await.unwrap();

        assert_eq!(out.len(), 8);
        assert_eq!(out[0], Message::system("You are a coding agent."));
        assert!(out[1].text().starts_with("I need you to: [\"Fix the failing parser test\"]"));
        assert!(out[2]
            .text()
            .starts_with("Current Objective from the user & History of my progress: "));
        assert!(out[2].text().contains("in_progress"));
        assert!(out[3].text().starts_with("My knowledge base is: "));
        assert!(out[3].text().contains("verified_facts"));
        match &out[4] {
            Message::User { content, name } => {
                assert_eq!(name.as_deref(), Some("tech_library"));
                assert!(content.starts_with("Technical Reference:\nArtifact: parse_header (function)"));
                assert!(content.contains("Location: src/parser.rs:42"));
            }
            other => panic!("expected tech library message, got {other:?}"),
        }
        assert_eq!(
            out[5].text(),
            "I need to: [\"Patch parse_header\",\"Rerun the tests\"]"
        );
        assert_eq!(&out[6..], &refined[4..]);

        let request = &transport.work_requests()[0];
        assert_eq!(request.response_format.as_ref().unwrap().name, "SummarizedContext");
        let prompt = request.messages[1].text();
        assert!(prompt.starts_with("Summarize the following messages: "));
        assert!(prompt.contains("Fix the failing parser test"));
        assert!(!prompt.contains("fn parse_header(...)"));
    }

    #[tokio::test]
    async fn summarizer_is_told_not_to_answer_or_invent() {
        let transport = StubTransport::new("main", vec![text_reply(&summary_json())]);
        let refiner = SummarizingRefiner::routed(stub_router(transport.clone()));
        let refined = conversation();

        refiner.refine(&refined, &refined).await.unwrap();

        let request = &transport.work_requests()[0];
        let instructions: String = request
            .messages
            .iter()
            .filter(|m| m.role() == Role::System)
            .map(|m| m.text().into_owned())
            .collect();
        for rule in [
            "Do not answer any question",
            "do not invent new information",
            "Do not invent plans",
            "merge it into the new one without losing anything",
            "as technical artifacts, not as facts",
            "Do not summarize system messages",
        ] {
            assert!(instructions.contains(rule), "missing guideline: {rule}");
        }
    }

    #[tokio::test]
    async fn routed_model_is_chosen_once() {
        let transport = StubTransport::new(
            "main",
            vec![text_reply(&summary_json()), text_reply(&summary_json())],
        );
        let refiner = SummarizingRefiner::routed(stub_router(transport.clone()));
        let refined = conversation();

        refiner.refine(&refined, &refined).await.unwrap();
        refiner.refine(&refined, &refined).await.unwrap();

        assert_eq!(transport.routing_requests().len(), 1);
        let routing = &transport.routing_requests()[0];
        assert!(routing.messages[1].text().ends_with(SUMMARIZE_TASK));
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn empty_summary_still_carries_knowledge_base() {
        let messages = SummarizedContext::default().to_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), Role::Assistant);
        let text = messages[0].text();
        let body: Value =
            serde_json::from_str(text.trim_start_matches("My knowledge base is: ")).unwrap();
        assert_eq!(body, json!({ "verified_facts": [], "current_ideas": [] }));
    }

    #[test]
    fn from_config_respects_enabled_and_model() {
        let router = stub_router(StubTransport::new("main", vec![]));

        let disabled = SummarizerConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(SummarizingRefiner::from_config(&disabled, router.clone())
            .unwrap()
            .is_none());

        let unknown = SummarizerConfig {
            enabled: true,
            model: Some("ghost".into()),
            token_threshold: None,
        };
        assert!(matches!(
            SummarizingRefiner::from_config(&unknown, router.clone()),
            Err(RouterError::UnknownModel(_))
        ));

        let fixed = SummarizerConfig {
            enabled: true,
            model: Some("main".into()),
            token_threshold: Some(5),
        };
        let refiner = SummarizingRefiner::from_config(&fixed, router).unwrap().unwrap();
        assert_eq!(refiner.token_threshold, Some(5));
    }
}
