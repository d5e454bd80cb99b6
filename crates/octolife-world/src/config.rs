use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

use crate::step::MAX_GENERATIONS_PER_STEP;

pub const MIN_WORLD_LEVEL: u8 = 4;
// Stepping pads the root by one level, which must stay within node limits.
pub const MAX_WORLD_LEVEL: u8 = crate::node::MAX_LEVEL - 1;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct WorldConfig {
    /// Root node level; the world spans `2^world_level` cells per axis,
    /// centered on the origin.
    #[serde(default = "default_world_level")]
    pub world_level: u8,
    #[serde(default = "default_generations_per_step")]
    pub generations_per_step: u32,
    #[serde(default)]
    pub gc: GcConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_level: default_world_level(),
            generations_per_step: default_generations_per_step(),
            gc: GcConfig::default(),
        }
    }
}

fn default_world_level() -> u8 {
    24
}

fn default_generations_per_step() -> u32 {
    1
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct GcConfig {
    #[serde(default = "default_min_nodes")]
    pub min_nodes: usize,
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            min_nodes: default_min_nodes(),
            growth_factor: default_growth_factor(),
        }
    }
}

fn default_min_nodes() -> usize {
    65_536
}

fn default_growth_factor() -> f64 {
    2.0
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if !(MIN_WORLD_LEVEL..=MAX_WORLD_LEVEL).contains(&self.world_level) {
            return Err(format!(
                "world_level must be in {MIN_WORLD_LEVEL}..={MAX_WORLD_LEVEL}, got {}",
                self.world_level
            )
            .into());
        }
        if !(1..=MAX_GENERATIONS_PER_STEP).contains(&self.generations_per_step) {
            return Err(format!(
                "generations_per_step must be in 1..={MAX_GENERATIONS_PER_STEP}, got {}",
                self.generations_per_step
            )
            .into());
        }
        if self.gc.growth_factor.is_nan() || self.gc.growth_factor < 1.0 {
            return Err(format!(
                "gc.growth_factor must be at least 1.0, got {}",
                self.gc.growth_factor
            )
            .into());
        }
        Ok(())
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: WorldConfig = toml::from_str(toml_str)?;
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
    fn empty_table_uses_defaults() {
        let cfg = WorldConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, WorldConfig::default());
        assert_eq!(cfg.world_level, 24);
        assert_eq!(cfg.gc.min_nodes, 65_536);
    }

    #[test]
    fn partial_gc_section_keeps_other_defaults() {
        let cfg = WorldConfig::from_toml_str(
            r#"
            generations_per_step = 4
            [gc]
            growth_factor = 3.5
        "#,
        )
        .unwrap();
        assert_eq!(cfg.generations_per_step, 4);
        assert_eq!(cfg.gc.growth_factor, 3.5);
        assert_eq!(cfg.gc.min_nodes, 65_536);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(WorldConfig::from_toml_str("world_level = 3").is_err());
        assert!(WorldConfig::from_toml_str("world_level = 30").is_err());
        assert!(WorldConfig::from_toml_str("generations_per_step = 0").is_err());
        assert!(WorldConfig::from_toml_str("generations_per_step = 17").is_err());
        assert!(WorldConfig::from_toml_str("[gc]\ngrowth_factor = 0.5").is_err());
    }
}
