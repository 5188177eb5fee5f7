//! Model router: asks a coordinating model which pool model fits a task.
//!
//! Holds the model pool and an ordered list of coordinator candidates. For
//! each task it probes every pool model concurrently, picks the first
//! available coordinator, and has it choose a model under fixed guidelines.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use relay_config::AppConfig;
use relay_core::error::{Error, ModelError, RouterError};
use relay_core::message::Message;
use relay_core::output::StructuredOutput;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::model::Model;

const ROUTING_GUIDELINES: &str = "You route tasks to the most suitable model in a pool.

Guidelines:
- Prefer available models. Choose an unavailable model only if it is the only one that can truly handle the task.
- For complex or critical tasks, choose a stronger model.
- For simple tasks, choose a faster model.
- For coding tasks, choose only models specialized in coding.
- When the task is ambiguous, balance capability, speed and availability.

Reply with the model_id of the chosen model.";

/// The coordinator's structured answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelChoice {
    pub model_id: String,
}

impl StructuredOutput for ModelChoice {
    const NAME: &'static str = "ModelChoice";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "model_id": {
                    "type": "string",
                    "description": "Id of the chosen model, exactly as listed in the pool"
                }
            },
            "required": ["model_id"],
            "additionalProperties": false
        })
    }
}

/// One line of the pool registry shown to the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct PoolEntry {
    pub model_id: String,
    pub description: String,
    pub thinking: bool,
    pub available: bool,
}

/// Routes tasks to models.
#[derive(Debug)]
pub struct Router {
    pool: BTreeMap<String, Arc<Model>>,
    router_pool: Vec<String>,
}

impl Router {
    /// Create a router. The pool needs at least one model with a non-empty
    /// id, and at least one `router_pool` id must be in it.
    pub fn new(
        models: impl IntoIterator<Item = Model>,
        router_pool: Vec<String>,
    ) -> Result<Self, RouterError> {
        let mut pool = BTreeMap::new();
        for model in models {
            if model.id().trim().is_empty() {
                return Err(RouterError::InvalidPool("model ids must not be empty".into()));
            }
            let id = model.id().to_string();
            if pool.insert(id.clone(), Arc::new(model)).is_some() {
                return Err(RouterError::InvalidPool(format!("duplicate model id '{id}'")));
            }
        }
        if pool.is_empty() {
            return Err(RouterError::InvalidPool("model pool is empty".into()));
        }
        if router_pool.is_empty() {
            return Err(RouterError::InvalidPool("router pool is empty".into()));
        }
        if !router_pool.iter().any(|id| pool.contains_key(id)) {
            return Err(RouterError::InvalidPool(
                "no router pool id is present in the model pool".into(),
            ));
        }

        Ok(Self { pool, router_pool })
    }

    /// Build every configured model with an HTTP transport.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let models = config
            .models
            .iter()
            .map(|(id, model)| Model::from_config(id.clone(), model.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(models, config.router_pool.clone())?)
    }

    /// Get a pool model by id.
    pub fn get(&self, id: &str) -> Option<Arc<Model>> {
        self.pool.get(id).cloned()
    }

    /// Pool models, ordered by id.
    pub fn models(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.pool.values()
    }

    pub fn router_pool(&self) -> &[String] {
        &self.router_pool
    }

    /// Probe every pool model concurrently.
    pub async fn registry(&self) -> Result<Vec<PoolEntry>, ModelError> {
        let probes = self.pool.values().map(|model| async move {
            let available = model.is_available().await?;
            Ok::<_, ModelError>(PoolEntry {
                model_id: model.id().to_string(),
                description: model.description().to_string(),
                thinking: model.is_thinking(),
                available,
            })
        });
        join_all(probes).await.into_iter().collect()
    }

    /// Pick the model that should handle `description`.
    pub async fn route_task(&self, description: &str) -> Result<Arc<Model>, RouterError> {
        let registry = self.registry().await?;
        if registry.iter().all(|entry| !entry.available) {
            return Err(RouterError::AllModelsUnavailable);
        }

        let coordinator = self
            .router_pool
            .iter()
            .filter(|id| {
                registry
                    .iter()
                    .any(|entry| &entry.model_id == *id && entry.available)
            })
            .find_map(|id| self.pool.get(id))
            .ok_or(RouterError::NoAvailableRouter)?;

        debug!(
            coordinator = %coordinator.id(),
            available = registry.iter().filter(|e| e.available).count(),
            total = registry.len(),
            "Routing task"
        );

        let pool_listing = serde_json::to_string_pretty(&registry)
            .map_err(|e| RouterError::InvalidPool(format!("registry serialization: {e}")))?;
        let messages = vec![
            Message::system(ROUTING_GUIDELINES),
            Message::user(format!(
                "Model Pool:\n{pool_listing}\n\n Task Description:\n{description}"
            )),
        ];

        let choice: ModelChoice = coordinator.complete_structured(messages, None).await?;
        let model = self
            .get(&choice.model_id)
            .ok_or_else(|| RouterError::UnknownModel(choice.model_id.clone()))?;

        info!(
            coordinator = %coordinator.id(),
            model = %model.id(),
            "Task routed"
        );
        Ok(model)
    }
}
