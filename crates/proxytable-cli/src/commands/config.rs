use std::path::Path;

use anyhow::{bail, Result};

use proxytable_core::AppConfig;

pub fn path(config_path: &Path) -> Result<()> {
    let state = if config_path.exists() { "" } else { " (not created yet)" };
    println!("{}{}", config_path.display(), state);
    Ok(())
}

pub fn show(config: &AppConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

pub fn init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite",
            config_path.display()
        );
    }

    AppConfig::default().save(config_path)?;
    println!("Wrote default configuration to {}", config_path.display());
    Ok(())
}
