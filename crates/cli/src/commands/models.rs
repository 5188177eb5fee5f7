//! `relay models`: probe the model pool.

use relay_config::AppConfig;
use relay_providers::Router;

pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let router = Router::from_config(config)?;
    let registry = router.registry().await?;

    for entry in &registry {
        let status = if entry.available { "available" } else { "unavailable" };
        let router_mark = if router.router_pool().contains(&entry.model_id) {
            " [router]"
        } else {
            ""
        };
        println!(
            "{:<24} {:<12} {}{}",
            entry.model_id, status, entry.description, router_mark
        );
    }

    let up = registry.iter().filter(|e| e.available).count();
    println!();
    println!("{up}/{} models available", registry.len());
    Ok(())
}
