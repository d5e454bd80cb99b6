use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use super::config::{BehaviorConfig, BlockDef, BlocksConfig};
use super::types::{Block, BlockId, LightLevel, MAX_LIGHT};

/// How a block kind evolves from one generation to the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockBehavior {
    Inert,
    /// Moves down one cell per generation while the cell below is air.
    Falling,
    /// Converts face-adjacent cells of kind `into` to this kind.
    Spreading { into: BlockId },
}

#[derive(Clone, Debug)]
pub struct BlockType {
    pub id: BlockId,
    pub name: String,
    pub solid: bool,
    pub opaque: bool,
    pub emission: LightLevel,
    pub color: [u8; 4],
    pub behavior: BlockBehavior,
    pub report_changes: bool,
}

impl BlockType {
    fn placeholder(id: BlockId) -> Self {
        BlockType {
            id,
            name: String::new(),
            solid: false,
            opaque: false,
            emission: 0,
            color: [0, 0, 0, 0],
            behavior: BlockBehavior::Inert,
            report_changes: false,
        }
    }

    fn air() -> Self {
        BlockType {
            name: "air".into(),
            ..BlockType::placeholder(Block::AIR.id)
        }
    }
}

#[derive(Clone, Debug)]
pub struct BlockRegistry {
    pub blocks: Vec<BlockType>,
    pub by_name: HashMap<String, BlockId>,
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRegistry {
    /// Registry holding only `air` at id 0.
    pub fn new() -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("air".to_string(), Block::AIR.id);
        Self {
            blocks: vec![BlockType::air()],
            by_name,
        }
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id as usize).filter(|t| !t.name.is_empty())
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn block_by_name(&self, name: &str) -> Option<Block> {
        self.id_by_name(name).map(Block::new)
    }

    #[inline]
    pub fn is_opaque(&self, b: Block) -> bool {
        self.get(b.id).map(|t| t.opaque).unwrap_or(false)
    }

    #[inline]
    pub fn is_solid(&self, b: Block) -> bool {
        self.get(b.id).map(|t| t.solid).unwrap_or(false)
    }

    #[inline]
    pub fn behavior(&self, id: BlockId) -> BlockBehavior {
        self.get(id)
            .map(|t| t.behavior)
            .unwrap_or(BlockBehavior::Inert)
    }

    /// Blocks that render nothing and let neighbors show their faces.
    #[inline]
    pub fn is_invisible(&self, b: Block) -> bool {
        b.is_air() || self.get(b.id).is_none_or(|t| t.color[3] == 0)
    }

    pub fn load_from_path(blocks_path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let blocks_toml = fs::read_to_string(blocks_path)?;
        Self::from_toml_str(&blocks_toml)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: BlocksConfig = toml::from_str(toml_str)?;
        Self::from_configs(cfg)
    }

    pub fn from_configs(cfg: BlocksConfig) -> Result<Self, Box<dyn Error>> {
        let mut reg = BlockRegistry::new();
        // Ids are assigned before behaviors are resolved so `into` may name a later block.
        let mut next_id: u16 = 1;
        let mut assigned: Vec<(BlockId, BlockDef)> = Vec::with_capacity(cfg.blocks.len());
        for def in cfg.blocks.into_iter() {
            let id = match def.id {
                Some(id) => id,
                None if def.name == "air" => Block::AIR.id,
                None => {
                    while assigned.iter().any(|(used, _)| *used == next_id) {
                        next_id += 1;
                    }
                    next_id
                }
            };
            if let Some((_, prev)) = assigned.iter().find(|(used, _)| *used == id) {
                return Err(format!(
                    "block id {} assigned to both '{}' and '{}'",
                    id, prev.name, def.name
                )
                .into());
            }
            if id == Block::AIR.id && def.name != "air" {
                return Err(format!("block id 0 is reserved for air, got '{}'", def.name).into());
            }
            if id == Block::OUTSIDE.id {
                return Err(format!("block id {} is reserved, got '{}'", id, def.name).into());
            }
            if reg.by_name.contains_key(&def.name) && def.name != "air" {
                return Err(format!("duplicate block name '{}'", def.name).into());
            }
            reg.by_name.insert(def.name.clone(), id);
            assigned.push((id, def));
        }

        for (id, def) in assigned {
            let behavior = match &def.behavior {
                None | Some(BehaviorConfig::Inert) => BlockBehavior::Inert,
                Some(BehaviorConfig::Falling) => BlockBehavior::Falling,
                Some(BehaviorConfig::Spreading { into }) => {
                    let target = reg.id_by_name(into).ok_or_else(|| {
                        format!("block '{}' spreads into unknown block '{}'", def.name, into)
                    })?;
                    BlockBehavior::Spreading { into: target }
                }
            };
            let solid = def.solid.unwrap_or(id != Block::AIR.id);
            let ty = BlockType {
                id,
                name: def.name,
                solid,
                opaque: def.opaque.unwrap_or(solid),
                emission: def.emission.unwrap_or(0).min(MAX_LIGHT),
                color: def.color.unwrap_or(if id == Block::AIR.id {
                    [0, 0, 0, 0]
                } else {
                    [200, 200, 200, 255]
                }),
                behavior,
                report_changes: def.report_changes.unwrap_or(false),
            };
            while reg.blocks.len() <= id as usize {
                let gap = reg.blocks.len() as BlockId;
                reg.blocks.push(BlockType::placeholder(gap));
            }
            reg.blocks[id as usize] = ty;
        }
        Ok(reg)
    }
}
