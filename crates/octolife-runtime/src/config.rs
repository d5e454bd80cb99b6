use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

use octolife_world::{LEAF_LEVEL, MAX_LEVEL};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RenderConfig {
    /// Level of the nodes meshed at full detail.
    #[serde(default = "default_chunk_level")]
    pub chunk_level: u8,
    /// Distance at which detail first halves.
    #[serde(default = "default_lod_distance")]
    pub lod_distance: f32,
    #[serde(default = "default_max_lod")]
    pub max_lod: u8,
    #[serde(default = "default_gpu_retain_frames")]
    pub gpu_retain_frames: u64,
    /// 0 picks available parallelism minus one.
    #[serde(default)]
    pub worker_threads: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            chunk_level: default_chunk_level(),
            lod_distance: default_lod_distance(),
            max_lod: default_max_lod(),
            gpu_retain_frames: default_gpu_retain_frames(),
            worker_threads: 0,
        }
    }
}

fn default_chunk_level() -> u8 {
    4
}

fn default_lod_distance() -> f32 {
    64.0
}

fn default_max_lod() -> u8 {
    4
}

fn default_gpu_retain_frames() -> u64 {
    120
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if !(LEAF_LEVEL..=MAX_LEVEL).contains(&self.chunk_level) {
            return Err(format!(
                "chunk_level must be in {LEAF_LEVEL}..={MAX_LEVEL}, got {}",
                self.chunk_level
            )
            .into());
        }
        if !self.lod_distance.is_finite() || self.lod_distance <= 0.0 {
            return Err(format!(
                "lod_distance must be positive, got {}",
                self.lod_distance
            )
            .into());
        }
        if self.chunk_level as u32 + self.max_lod as u32 > MAX_LEVEL as u32 {
            return Err(format!(
                "chunk_level + max_lod must not exceed {MAX_LEVEL}, got {} + {}",
                self.chunk_level, self.max_lod
            )
            .into());
        }
        Ok(())
    }

    /// Worker count with the `0 = auto` rule applied; always at least one.
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: RenderConfig = toml::from_str(toml_str)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = RenderConfig::from_toml_str("max_lod = 2").unwrap();
        assert_eq!(cfg.max_lod, 2);
        assert_eq!(cfg.chunk_level, 4);
        assert_eq!(cfg.lod_distance, 64.0);
        assert_eq!(cfg.gpu_retain_frames, 120);
        assert!(cfg.resolved_worker_threads() >= 1);
    }

    #[test]
    fn explicit_worker_count_wins() {
        let cfg = RenderConfig {
            worker_threads: 3,
            ..Default::default()
        };
        assert_eq!(cfg.resolved_worker_threads(), 3);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(RenderConfig::from_toml_str("chunk_level = 1").is_err());
        assert!(RenderConfig::from_toml_str("lod_distance = 0.0").is_err());
        assert!(RenderConfig::from_toml_str("chunk_level = 28\nmax_lod = 4").is_err());
    }
}
