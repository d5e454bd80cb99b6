use serde::Deserialize;

// Top-level blocks config file
#[derive(Deserialize, Debug, Default)]
pub struct BlocksConfig {
    #[serde(default)]
    pub blocks: Vec<BlockDef>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct BlockDef {
    pub name: String,
    #[serde(default)]
    pub id: Option<u16>,
    #[serde(default)]
    pub solid: Option<bool>,
    // Opaque blocks stop light and hide neighbor faces when meshing.
    #[serde(default)]
    pub opaque: Option<bool>,
    #[serde(default)]
    pub emission: Option<u8>,
    // RGBA vertex color used by the CPU mesher.
    #[serde(default)]
    pub color: Option<[u8; 4]>,
    #[serde(default)]
    pub behavior: Option<BehaviorConfig>,
    // Emit a `Changed` action whenever a cell enters or leaves this kind.
    #[serde(default)]
    pub report_changes: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorConfig {
    Inert,
    Falling,
    Spreading { into: String },
}
