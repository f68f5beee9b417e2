// Partition tree: validation of model-produced split trees and their layout
// against a boundary rectangle. Everything here is synchronous and per-request.

pub mod engine;
pub mod geometry;
pub mod tree;

pub use engine::{layout, LayoutError};
pub use geometry::{Rectangle, RoomRecord};
pub use tree::{normalize_tree, StructureError};

/// Area assigned to a child node whose `area` field is missing.
pub const DEFAULT_CHILD_AREA: f64 = 100.0;

/// Deepest node (root = 0) the validator and layout engine will accept.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Angles within this many radians of π/2 select a vertical split.
pub const VERTICAL_ANGLE_TOLERANCE: f64 = 0.1;

/// Knobs for tree validation and layout, loaded from `Config`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanSettings {
    pub default_area: f64,
    pub max_depth: usize,
    /// When set, a `final: false` node without children is a `StructureError`
    /// instead of a leaf.
    pub strict_leaves: bool,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            default_area: DEFAULT_CHILD_AREA,
            max_depth: DEFAULT_MAX_DEPTH,
            strict_leaves: false,
        }
    }
}
