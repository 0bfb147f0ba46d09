use std::collections::HashMap;

use crate::model::Item;

/// The six axis-aligned rotations as index permutations of `(width, length, height)`.
/// Rotation 0 is the identity.
pub const ROTATION_PATTERNS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [1, 0, 2],
    [2, 1, 0],
    [1, 2, 0],
    [0, 2, 1],
    [2, 0, 1],
];

const SIDE_UP_ROTATIONS: [u8; 2] = [0, 1];
const ALL_ROTATIONS: [u8; 6] = [0, 1, 2, 3, 4, 5];

/// Applies rotation `rot` to `(width, length, height)` and returns the
/// `(x, y, z)` extents of the rotated box. Out-of-range rotations fall back
/// to the identity.
pub fn rotated_dims(width: f64, length: f64, height: f64, rot: u8) -> (f64, f64, f64) {
    let dims = [width, length, height];
    let pattern = ROTATION_PATTERNS
        .get(rot as usize)
        .copied()
        .unwrap_or([0, 1, 2]);
    (dims[pattern[0]], dims[pattern[1]], dims[pattern[2]])
}

/// Rotations permitted for an item: side-up cargo may only spin about the
/// vertical axis.
pub fn allowed_rotations(side_up: bool) -> &'static [u8] {
    if side_up {
        &SIDE_UP_ROTATIONS
    } else {
        &ALL_ROTATIONS
    }
}

/// Precomputed permitted rotations, rotated dimensions and footprint areas
/// for one item. Read-only after construction.
#[derive(Debug, Clone)]
pub struct OrientationCache {
    pub rotations: Vec<u8>,
    dims: [(f64, f64, f64); 6],
    areas: [f64; 6],
}

impl OrientationCache {
    pub fn build(item: &Item) -> Self {
        let rotations = allowed_rotations(item.side_up).to_vec();
        let mut dims = [(0.0, 0.0, 0.0); 6];
        let mut areas = [0.0; 6];
        for &rot in &rotations {
            let d = rotated_dims(item.width, item.length, item.height, rot);
            dims[rot as usize] = d;
            areas[rot as usize] = d.0 * d.1;
        }
        Self {
            rotations,
            dims,
            areas,
        }
    }

    pub fn dims(&self, rot: u8) -> (f64, f64, f64) {
        self.dims[rot as usize]
    }

    pub fn area(&self, rot: u8) -> f64 {
        self.areas[rot as usize]
    }

    /// First permitted rotation (the item's natural footprint).
    pub fn base_rotation(&self) -> u8 {
        self.rotations[0]
    }
}

/// Per-item orientation caches for one solve, keyed by item id.
pub type OrientationMap = HashMap<u64, OrientationCache>;

/// Builds the orientation cache for every item up front.
pub fn build_orientation_map(items: &[Item]) -> OrientationMap {
    items
        .iter()
        .map(|it| (it.id, OrientationCache::build(it)))
        .collect()
}
