//! Per-cell transition contract consumed by the stepper, plus the
//! registry-driven implementation.

use std::sync::Arc;

use octolife_geom::IVec3;

use crate::registry::{BlockBehavior, BlockRegistry};
use crate::types::{Block, LightLevel};

/// 3×3×3 block neighborhood centered on the cell being stepped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighborhood {
    pub blocks: [Block; 27],
}

impl Neighborhood {
    #[inline]
    pub const fn index(dx: i32, dy: i32, dz: i32) -> usize {
        ((dz + 1) * 9 + (dy + 1) * 3 + (dx + 1)) as usize
    }

    #[inline]
    pub fn uniform(b: Block) -> Self {
        Self { blocks: [b; 27] }
    }

    /// Offsets are in `-1..=1` on each axis.
    #[inline]
    pub fn get(&self, dx: i32, dy: i32, dz: i32) -> Block {
        self.blocks[Self::index(dx, dy, dz)]
    }

    #[inline]
    pub fn center(&self) -> Block {
        self.blocks[13]
    }

    /// The six face-adjacent neighbors.
    #[inline]
    pub fn faces(&self) -> [Block; 6] {
        [
            self.get(1, 0, 0),
            self.get(-1, 0, 0),
            self.get(0, 1, 0),
            self.get(0, -1, 0),
            self.get(0, 0, 1),
            self.get(0, 0, -1),
        ]
    }
}

/// Orders competing proposals for the same cell; higher wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockStepPriority(pub i16);

impl BlockStepPriority {
    pub const LOWEST: BlockStepPriority = BlockStepPriority(i16::MIN);
    pub const DEFAULT: BlockStepPriority = BlockStepPriority(0);
    pub const SPREAD: BlockStepPriority = BlockStepPriority(10);
    pub const FALL: BlockStepPriority = BlockStepPriority(20);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Changed { from: Block, to: Block },
}

/// Side effect produced while stepping. The transition function reports
/// positions relative to the stepped cell; the world hands them out in
/// absolute coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockAction {
    pub position: IVec3,
    /// Generation within the step (0-based) that produced the action.
    pub generation: u32,
    pub kind: ActionKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockStepResult {
    pub block: Block,
    pub priority: BlockStepPriority,
    pub actions: Vec<BlockAction>,
}

impl BlockStepResult {
    #[inline]
    pub fn new(block: Block, priority: BlockStepPriority) -> Self {
        Self {
            block,
            priority,
            actions: Vec::new(),
        }
    }
}

/// Read-only context shared by every cell of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlobalStepState {
    /// Block assumed for every cell outside the simulated world.
    pub boundary: Block,
    /// Minimum light level of non-opaque cells.
    pub ambient_light: LightLevel,
}

impl Default for GlobalStepState {
    fn default() -> Self {
        Self {
            boundary: Block::AIR,
            ambient_light: 0,
        }
    }
}

/// Pure, deterministic per-cell rule.
///
/// `step` pushes zero or more candidate results for the center cell of
/// `neighborhood` into `out`; pushing nothing leaves the cell unchanged. The
/// caller keeps the highest-priority candidate and folds equal priorities with
/// `combine`.
pub trait TransitionFunction: Send + Sync {
    fn step(
        &self,
        neighborhood: &Neighborhood,
        global: &GlobalStepState,
        out: &mut Vec<BlockStepResult>,
    );

    /// Equal-priority policy: default keeps the first candidate.
    fn combine(&self, current: BlockStepResult, _other: BlockStepResult) -> BlockStepResult {
        current
    }
}

/// Leaves every cell unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityTransition;

impl TransitionFunction for IdentityTransition {
    fn step(&self, _: &Neighborhood, _: &GlobalStepState, _: &mut Vec<BlockStepResult>) {}
}

/// Transition driven by each block type's configured behavior.
///
/// Light: non-opaque cells take `max(emission, brightest face neighbor - 1,
/// ambient)`; opaque cells carry only their own emission. Equal-priority
/// candidates keep the lower block id.
#[derive(Clone, Debug)]
pub struct RegistryTransition {
    reg: Arc<BlockRegistry>,
}

impl RegistryTransition {
    pub fn new(reg: Arc<BlockRegistry>) -> Self {
        Self { reg }
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.reg
    }

    fn light_for(&self, kind: Block, n: &Neighborhood, global: &GlobalStepState) -> LightLevel {
        let (opaque, emission) = self
            .reg
            .get(kind.id)
            .map(|t| (t.opaque, t.emission))
            .unwrap_or((false, 0));
        if opaque {
            return emission;
        }
        let brightest = n.faces().iter().map(|b| b.light).max().unwrap_or(0);
        emission
            .max(brightest.saturating_sub(1))
            .max(global.ambient_light)
    }

    fn candidate(
        &self,
        from: Block,
        to_kind: Block,
        priority: BlockStepPriority,
        n: &Neighborhood,
        global: &GlobalStepState,
    ) -> BlockStepResult {
        let to = to_kind.with_light(self.light_for(to_kind, n, global));
        let mut res = BlockStepResult::new(to, priority);
        if !from.same_kind(to) && (self.reports(from) || self.reports(to)) {
            res.actions.push(BlockAction {
                position: IVec3::ZERO,
                generation: 0,
                kind: ActionKind::Changed { from, to },
            });
        }
        res
    }

    #[inline]
    fn reports(&self, b: Block) -> bool {
        self.reg.get(b.id).map(|t| t.report_changes).unwrap_or(false)
    }
}

impl TransitionFunction for RegistryTransition {
    fn step(
        &self,
        n: &Neighborhood,
        global: &GlobalStepState,
        out: &mut Vec<BlockStepResult>,
    ) {
        let center = n.center();
        let below = n.get(0, -1, 0);
        let above = n.get(0, 1, 0);

        if self.reg.behavior(center.id) == BlockBehavior::Falling && below.is_air() {
            out.push(self.candidate(center, Block::AIR, BlockStepPriority::FALL, n, global));
        }
        if center.is_air() && self.reg.behavior(above.id) == BlockBehavior::Falling {
            let fallen = Block::new(above.id).with_state(above.state);
            out.push(self.candidate(center, fallen, BlockStepPriority::FALL, n, global));
        }
        for face in n.faces() {
            if let BlockBehavior::Spreading { into } = self.reg.behavior(face.id) {
                if into == center.id && !center.same_kind(face) {
                    let spread = Block::new(face.id).with_state(face.state);
                    out.push(self.candidate(center, spread, BlockStepPriority::SPREAD, n, global));
                }
            }
        }

        // Lowest-priority candidate keeps the kind and refreshes light.
        let light = self.light_for(center, n, global);
        if light != center.light {
            out.push(BlockStepResult::new(
                center.with_light(light),
                BlockStepPriority::LOWEST,
            ));
        }
    }

    fn combine(&self, current: BlockStepResult, other: BlockStepResult) -> BlockStepResult {
        if other.block.id < current.block.id {
            other
        } else {
            current
        }
    }
}
