use anyhow::{Context, Result};
use ruian_sync::config::Config;
use std::path::PathBuf;

pub fn init_config(path: PathBuf, force: bool) -> Result<()> {
    let config_path = path.join("config.toml");
    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {} (use --force to overwrite)",
            config_path.display()
        );
    }

    let mut config = Config::default();
    config.store.data_dir = path.join(".ruian-sync");

    let toml_content = format!(
        "# ruian-sync configuration\n# Archives are fetched from {{base_url}}/{{YYYYMMDD}}{{archive_suffix}}\n\n{}",
        config.to_toml()?
    );
    std::fs::create_dir_all(&path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    std::fs::create_dir_all(&config.store.data_dir)?;
    println!("Created data directory: {}", config.store.data_dir.display());

    Ok(())
}
