//! Initialize the configuration directory: create ~/.medchat, a default config and a primer seed.
//!
//! The seeded `primer.md` is a copy of the built-in primer so deployments can edit it and point `chat.primerPath` at it.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;
use crate::primer::BUILTIN_PRIMER;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{"chat":{"primerPath":"primer.md"}}` if missing.
/// - Writes `primer.md` from the built-in primer if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config::config_dir(config_path);
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let default_config = br#"{"chat":{"primerPath":"primer.md"}}"#;
        std::fs::write(config_path, default_config)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let primer = config_dir.join("primer.md");
    if !primer.exists() {
        std::fs::write(&primer, BUILTIN_PRIMER)
            .with_context(|| format!("writing default primer to {}", primer.display()))?;
        log::info!("wrote default primer to {}", primer.display());
    } else {
        log::debug!("primer already exists at {}, skipping", primer.display());
    }

    Ok(config_dir.to_path_buf())
}
