//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::Store;
use std::path::PathBuf;
use tracing::info;

const CONFIG_HEADER: &str = "\
# sitesearch configuration
#
# Add one [[sites]] table per site to crawl:
#
# [[sites]]
# url = \"https://example.com\"
# name = \"Example\"

";

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
}

/// Write a default configuration and create the search database
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let InitOptions {
        base_dir,
        config_path,
        force,
    } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path.clone();
    config.validate()?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rendered = format!("{}{}", CONFIG_HEADER, toml::to_string_pretty(&config)?);
    std::fs::write(&config_path, rendered)?;
    info!("Created config at {:?}", config_path);

    Store::connect(&config.paths.db_file).await?;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(config)
}
