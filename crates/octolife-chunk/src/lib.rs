//! Dense block buffer used to move cells in and out of a world.
#![forbid(unsafe_code)]

use octolife_blocks::types::Block;
use octolife_geom::IVec3;

/// Box of blocks stored x-fastest, then z, then y.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockArray {
    size: IVec3,
    pub blocks: Vec<Block>,
}

impl BlockArray {
    pub fn new(size: IVec3) -> Self {
        Self::filled(size, Block::AIR)
    }

    pub fn filled(size: IVec3, block: Block) -> Self {
        assert!(
            size.all_ge(IVec3::ZERO),
            "block array size must be non-negative, got {size:?}"
        );
        BlockArray {
            size,
            blocks: vec![block; size.volume()],
        }
    }

    /// Wraps `blocks`, which must hold exactly one block per cell of `size`.
    pub fn from_blocks(size: IVec3, blocks: Vec<Block>) -> Self {
        assert!(
            size.all_ge(IVec3::ZERO),
            "block array size must be non-negative, got {size:?}"
        );
        assert_eq!(
            blocks.len(),
            size.volume(),
            "block array of size {size:?} needs {} blocks",
            size.volume()
        );
        BlockArray { size, blocks }
    }

    #[inline]
    pub fn size(&self) -> IVec3 {
        self.size
    }

    #[inline]
    pub fn contains(&self, p: IVec3) -> bool {
        p.all_ge(IVec3::ZERO) && p.all_lt(self.size)
    }

    /// True when the box `[offset, offset + size)` lies inside the array.
    #[inline]
    pub fn contains_region(&self, offset: IVec3, size: IVec3) -> bool {
        offset.all_ge(IVec3::ZERO) && size.all_ge(IVec3::ZERO) && self.size.all_ge(offset + size)
    }

    #[inline]
    pub fn idx(&self, p: IVec3) -> usize {
        debug_assert!(self.contains(p), "{p:?} outside {:?}", self.size);
        ((p.y as usize * self.size.z as usize + p.z as usize) * self.size.x as usize)
            + p.x as usize
    }

    #[inline]
    pub fn get(&self, p: IVec3) -> Block {
        self.blocks[self.idx(p)]
    }

    #[inline]
    pub fn get_checked(&self, p: IVec3) -> Option<Block> {
        if self.contains(p) {
            Some(self.get(p))
        } else {
            None
        }
    }

    #[inline]
    pub fn set(&mut self, p: IVec3, block: Block) {
        let i = self.idx(p);
        self.blocks[i] = block;
    }

    /// Fills the box `[min, min + size)` with `block`.
    pub fn fill_region(&mut self, min: IVec3, size: IVec3, block: Block) {
        assert!(
            self.contains_region(min, size),
            "region {min:?}+{size:?} outside array of size {:?}",
            self.size
        );
        for y in min.y..min.y + size.y {
            for z in min.z..min.z + size.z {
                for x in min.x..min.x + size.x {
                    self.set(IVec3::new(x, y, z), block);
                }
            }
        }
    }

    #[inline]
    pub fn has_non_air(&self) -> bool {
        self.blocks.iter().any(|b| !b.is_air())
    }

    #[inline]
    pub fn is_all_air(&self) -> bool {
        !self.has_non_air()
    }
}
