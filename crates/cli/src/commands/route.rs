//! `relay route`: show the routing decision for a task.

use relay_config::AppConfig;
use relay_providers::Router;

pub async fn run(config: &AppConfig, task: &str) -> Result<(), Box<dyn std::error::Error>> {
    let router = Router::from_config(config)?;
    let model = router.route_task(task).await?;
    println!("{}", model.id());
    Ok(())
}
