use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use octolife_runtime::RenderConfig;
use octolife_world::WorldConfig;
use serde::Deserialize;

/// Contents of `octolife.toml`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub render: RenderConfig,
    /// Block registry file; relative paths resolve against the config file.
    #[serde(default = "default_blocks_path")]
    pub blocks: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            render: RenderConfig::default(),
            blocks: default_blocks_path(),
        }
    }
}

fn default_blocks_path() -> PathBuf {
    PathBuf::from("assets/blocks.toml")
}

impl AppConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: AppConfig =
            toml::from_str(toml_str).map_err(|e| format!("parse error: {e}"))?;
        cfg.world.validate()?;
        cfg.render.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)
            .map_err(|e| format!("read error: {}: {e}", path.display()))?;
        let mut cfg = Self::from_toml_str(&s)?;
        if cfg.blocks.is_relative() {
            if let Some(dir) = path.parent() {
                cfg.blocks = dir.join(&cfg.blocks);
            }
        }
        Ok(cfg)
    }
}
