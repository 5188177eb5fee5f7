pub mod ask;
pub mod init;
pub mod models;
pub mod route;

use std::path::Path;

use relay_config::AppConfig;

/// Load the explicit config file, or the default one.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}
