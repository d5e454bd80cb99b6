//! Shared constants for octolife-mesh-cpu.

/// Color used for visible blocks missing from the registry.
pub(crate) const UNKNOWN_RGBA: [u8; 4] = [255, 0, 255, 255];

/// Quads reserved up front for a node mesh; grows as needed.
pub(crate) const INITIAL_QUADS: usize = 256;
