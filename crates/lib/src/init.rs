//! Initialize the configuration directory: create ~/.botrelay and a default config.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Create the config directory and a default `config.json` if they do not exist.
/// The default config is empty: every field has a serde default, and tokens
/// usually come from the environment anyway.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_dir_and_default_config() {
        let dir = std::env::temp_dir().join(format!("botrelay-init-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let config_path = dir.join("config.json");

        let created = init_config_dir(&config_path).expect("init");
        assert_eq!(created, dir);
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "{}");

        // Second run leaves the existing file alone.
        std::fs::write(&config_path, r#"{"server":{"port":8080}}"#).unwrap();
        init_config_dir(&config_path).expect("re-init");
        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            r#"{"server":{"port":8080}}"#
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
