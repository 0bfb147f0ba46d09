use std::collections::HashMap;

use loadplan_core::config::SolverConfig;
use loadplan_core::model::{Container, DoorKind, Item};
use loadplan_core::orientation::build_orientation_map;
use loadplan_core::packer::first_layer::FirstLayerPlanner;

const EPS: f64 = 1e-5;

fn items(count: u64, dims: (f64, f64, f64), weight: f64) -> Vec<Item> {
    (0..count)
        .map(|id| {
            let mut it = Item::new(id, "BOX", "ord-1", dims.0, dims.1, dims.2, weight);
            it.side_up = true;
            it
        })
        .collect()
}

fn disjoint(slots: &[(f64, f64, f64, f64)]) -> bool {
    for i in 0..slots.len() {
        for j in (i + 1)..slots.len() {
            let (ax, ay, aw, ah) = slots[i];
            let (bx, by, bw, bh) = slots[j];
            if ax < bx + bw - EPS && bx < ax + aw - EPS && ay < by + bh - EPS && by < ay + ah - EPS
            {
                return false;
            }
        }
    }
    true
}

#[test]
fn uniform_batch_tiles_full_floor() {
    let container = Container::new(0, "P", 1200.0, 800.0, 1000.0, 1000.0);
    let batch = items(16, (300.0, 200.0, 250.0), 5.0);
    let cache = build_orientation_map(&batch);
    let cfg = SolverConfig::default();
    let groups = HashMap::new();
    let registry = HashMap::new();
    let planner = FirstLayerPlanner::new(&container, &cache, &groups, &registry, &cfg);

    let (slots, ids) = planner.plan(&batch);
    assert_eq!(slots.len(), 16, "an exact 4x4 grid must fully tile the floor");
    assert_eq!(ids.len(), 16);

    let rects: Vec<(f64, f64, f64, f64)> = slots
        .iter()
        .map(|s| (s.x, s.y, s.dims.0, s.dims.1))
        .collect();
    assert!(disjoint(&rects));
    let area: f64 = rects.iter().map(|(_, _, w, h)| w * h).sum();
    assert!((area - 1200.0 * 800.0).abs() < 1e-6);

    for slot in &slots {
        assert!(slot.x >= -EPS && slot.x + slot.dims.0 <= 1200.0 + EPS);
        assert!(slot.y >= -EPS && slot.y + slot.dims.1 <= 800.0 + EPS);
    }
}

#[test]
fn area_budget_caps_candidates() {
    // 40 items of quarter-floor footprint: the 1.25x area budget admits
    // only five of them as floor candidates.
    let container = Container::new(0, "P", 100.0, 100.0, 100.0, 10_000.0);
    let batch = items(40, (50.0, 50.0, 10.0), 1.0);
    let cache = build_orientation_map(&batch);
    let cfg = SolverConfig::default();
    let groups = HashMap::new();
    let registry = HashMap::new();
    let planner = FirstLayerPlanner::new(&container, &cache, &groups, &registry, &cfg);

    let (slots, _) = planner.plan(&batch);
    // Only four fit the floor geometrically regardless of the budget.
    assert_eq!(slots.len(), 4);
}

#[test]
fn grounded_items_take_precedence() {
    let container = Container::new(0, "P", 100.0, 100.0, 100.0, 10_000.0);
    let mut batch = items(4, (60.0, 60.0, 10.0), 1.0);
    batch[3].grounded = true;
    batch[3].sku_id = "GROUND".to_string();
    let cache = build_orientation_map(&batch);
    let cfg = SolverConfig::default();
    let groups = HashMap::new();
    let registry = HashMap::new();
    let planner = FirstLayerPlanner::new(&container, &cache, &groups, &registry, &cfg);

    let (slots, ids) = planner.plan(&batch);
    // Only one 60x60 footprint fits per floor; the grounded item is queued
    // first and must claim it.
    assert_eq!(slots.len(), 1);
    assert!(ids.contains(&3));
}

#[test]
fn front_door_prefers_deep_footprints() {
    let mut container = Container::new(0, "C", 1000.0, 1200.0, 1000.0, 10_000.0);
    container.door = DoorKind::Front;
    let batch = items(1, (600.0, 400.0, 100.0), 1.0);
    let cache = build_orientation_map(&batch);
    let cfg = SolverConfig::default();
    let groups = HashMap::new();
    let registry = HashMap::new();
    let planner = FirstLayerPlanner::new(&container, &cache, &groups, &registry, &cfg);

    let (slots, _) = planner.plan(&batch);
    assert_eq!(slots.len(), 1);
    // The rotation with the longer y-edge is preferred toward the door axis.
    assert!(slots[0].dims.1 >= slots[0].dims.0);
}
