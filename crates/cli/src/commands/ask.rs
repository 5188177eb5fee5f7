//! `relay ask`: run the agent loop on one prompt.

use std::path::PathBuf;
use std::sync::Arc;

use relay_agent::{AgentLoop, SummarizingRefiner};
use relay_config::AppConfig;
use relay_core::deps::DependencyRegistry;
use relay_core::message::Context;
use relay_providers::Router;
use relay_tools::{PROJECT_FILES, ProjectFiles, default_tools};
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run(
    config: &AppConfig,
    prompt: String,
    system: Option<String>,
    project_root: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let router = Arc::new(Router::from_config(config)?);

    let project_root = match project_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    info!(project_root = %project_root.display(), "Starting agent");
    let deps = DependencyRegistry::new().with(&PROJECT_FILES, ProjectFiles::new(project_root));

    // Ctrl-C stops the run at the next round boundary.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current round");
            let _ = cancel_tx.send(true);
        }
    });

    let mut agent_loop = AgentLoop::new(Arc::clone(&router))
        .with_tools(default_tools())
        .with_dependencies(deps)
        .with_token_limit(config.agent.token_limit)
        .with_cancellation(cancel_rx);
    if let Some(summarizer) = SummarizingRefiner::from_config(&config.summarizer, router)? {
        agent_loop = agent_loop.with_refiner(Arc::new(summarizer));
    }

    let mut context = Context::simple(prompt, system.as_deref());
    let answer = agent_loop.run_text(&mut context).await?;
    println!("{answer}");
    Ok(())
}
