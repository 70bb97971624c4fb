//! CLI command implementations for `monie-plugin`.
//!
//! - [`serve`] -- Run the plugin over stdio.
//! - [`declare`] -- Print the handshake frames.

pub mod declare;
pub mod serve;

use std::path::PathBuf;

use monie_plugin::{PluginRegistry, load_assets};
use monie_runtime::RuntimeConfig;

use crate::demo;

/// Load the runtime configuration from the environment, then apply the
/// `--base-dir` override.
pub fn load_config(base_dir: Option<&str>) -> anyhow::Result<RuntimeConfig> {
    let mut config = RuntimeConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid environment: {e}"))?;
    if let Some(dir) = base_dir {
        config.base_dir = PathBuf::from(dir);
    }
    Ok(config)
}

/// Build the demo registry and attach the assets found under the
/// configured assets directory.
pub fn load_registry(config: &RuntimeConfig) -> anyhow::Result<PluginRegistry> {
    let assets = load_assets(&config.assets_path())?;
    let registry = demo::registry()?.with_assets(assets);
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_dir_override_wins() {
        let config = load_config(Some("/srv/plugin")).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/srv/plugin"));
        assert_eq!(config.assets_path(), PathBuf::from("/srv/plugin/_assets"));
    }

    #[test]
    fn registry_picks_up_assets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("_assets")).unwrap();
        std::fs::write(dir.path().join("_assets/icon.svg"), b"<svg/>").unwrap();

        let config = RuntimeConfig {
            base_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let registry = load_registry(&config).unwrap();
        assert_eq!(registry.assets().len(), 1);
        assert_eq!(registry.assets()[0].filename, "icon.svg");
    }
}
