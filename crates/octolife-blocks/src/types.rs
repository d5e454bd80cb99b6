use serde::{Deserialize, Serialize};

// Compact cell representation used by the world, the stepper, and meshing.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Debug, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub state: BlockState,
    #[serde(default)]
    pub light: LightLevel,
}

pub type BlockId = u16;
pub type BlockState = u16;
pub type LightLevel = u8;

pub const MAX_LIGHT: LightLevel = 15;

impl Block {
    pub const AIR: Block = Block {
        id: 0,
        state: 0,
        light: 0,
    };

    /// Stands in for cells beyond the world edge while stepping. Never
    /// stored in a world; registries refuse its id.
    pub const OUTSIDE: Block = Block {
        id: BlockId::MAX,
        state: 0,
        light: 0,
    };

    #[inline]
    pub const fn new(id: BlockId) -> Self {
        Block {
            id,
            state: 0,
            light: 0,
        }
    }

    #[inline]
    pub const fn with_state(self, state: BlockState) -> Self {
        Block { state, ..self }
    }

    #[inline]
    pub const fn with_light(self, light: LightLevel) -> Self {
        Block { light, ..self }
    }

    #[inline]
    pub fn is_air(self) -> bool {
        self.id == Block::AIR.id
    }

    /// Same kind and state, ignoring light.
    #[inline]
    pub fn same_kind(self, other: Block) -> bool {
        self.id == other.id && self.state == other.state
    }
}
