//! Bottom-Left-Fill placement search: per-item best-position scan across
//! allowed rotations and door-aware candidate points.

use std::collections::HashMap;

use crate::config::SolverConfig;
use crate::geometry::{
    candidate_positions, check_priority_adjacency, check_support_and_stacking, collides_any,
    cross_floor_positions, order_hash, placed_rows, Bounds, TypeInterner,
};
use crate::model::{Container, DoorKind, Item};
use crate::orientation::allowed_rotations;

/// A winning candidate pose for one item.
#[derive(Debug, Clone, Copy)]
pub struct BlfPlacement {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rotation: u8,
    pub layer: u32,
}

pub struct BottomLeftFill<'a> {
    container: &'a Container,
    config: &'a SolverConfig,
    must_be_on_top: &'a HashMap<u64, bool>,
}

fn round5(v: f64) -> f64 {
    (v * 1e5).round() / 1e5
}

impl<'a> BottomLeftFill<'a> {
    pub fn new(
        container: &'a Container,
        config: &'a SolverConfig,
        must_be_on_top: &'a HashMap<u64, bool>,
    ) -> Self {
        Self {
            container,
            config,
            must_be_on_top,
        }
    }

    /// Scans every allowed rotation (or just `forced_rotation`) and every
    /// candidate point, validating grounded/collision/priority/support, and
    /// returns the pose minimizing the frontier score: how far the placement
    /// pushes the occupied extent along the door axis (door containers) or
    /// up the z axis (pallets), with the door-aware fill order as tie-break.
    pub fn find_best_position(
        &self,
        item: &Item,
        forced_rotation: Option<u8>,
    ) -> Option<BlfPlacement> {
        let eps = self.config.epsilon;
        let grid = self.config.dedup_grid();
        let door = self.container.door;
        let enforce_order_stacking = door.is_door();

        let rotations: Vec<u8> = match forced_rotation {
            Some(r) => vec![r],
            None => allowed_rotations(item.side_up).to_vec(),
        };

        // Occupied extent along the door axis so far; placements that stay
        // behind it are preferred over opening a new lane.
        let mut current_frontier: f64 = 0.0;
        if door.is_door() {
            for placed in &self.container.items {
                if let Some((_, py, _)) = placed.position {
                    let dims = placed.dims(None);
                    current_frontier = current_frontier.max(py + dims.1);
                }
            }
        }

        let mut interner = TypeInterner::new();
        let candidate_type = interner.intern(&item.sku_id);
        let rows = placed_rows(self.container, &mut interner, self.must_be_on_top);
        let bounds = Bounds::of(self.container);

        let item_order = order_hash(&item.order_id);
        let score_of = |pos: (f64, f64, f64), dims: (f64, f64, f64)| -> (f64, f64, f64, f64) {
            let frontier_after = match door {
                DoorKind::Front => current_frontier.max(pos.1 + dims.1),
                DoorKind::None => pos.2,
            };
            let tie = match door {
                DoorKind::Front => (pos.1, pos.2, pos.0),
                DoorKind::None => (pos.2, pos.1, pos.0),
            };
            (round5(frontier_after), tie.0, tie.1, tie.2)
        };

        let mut best: Option<BlfPlacement> = None;
        let mut best_score: Option<(f64, f64, f64, f64)> = None;

        for rot in rotations {
            let dims = item.dims(Some(rot));
            let mut positions = candidate_positions(&rows, dims, &bounds, eps, grid, door);
            positions.extend(cross_floor_positions(&rows, dims, &bounds, eps, grid));

            for pos in positions {
                if item.grounded && pos.2 - bounds.zmin > eps {
                    continue;
                }
                if collides_any(pos, dims, &rows, eps) {
                    continue;
                }
                if !check_priority_adjacency(
                    pos,
                    dims,
                    item.pickup_priority,
                    item_order,
                    item.send_date_ts,
                    &rows,
                    eps,
                    door,
                ) {
                    continue;
                }
                let Some(new_layer) = check_support_and_stacking(
                    pos,
                    dims,
                    candidate_type,
                    item.weight,
                    item.max_stack,
                    item_order,
                    item.send_date_ts,
                    &rows,
                    enforce_order_stacking,
                    eps,
                    self.config.support_ratio,
                    bounds.zmin,
                ) else {
                    continue;
                };

                let score = score_of(pos, dims);
                if best_score.is_none_or(|s| score < s) {
                    best_score = Some(score);
                    best = Some(BlfPlacement {
                        x: pos.0,
                        y: pos.1,
                        z: pos.2,
                        rotation: rot,
                        layer: new_layer,
                    });
                }
            }
        }

        best
    }
}
