use std::collections::HashMap;

use loadplan_core::model::{Container, DoorKind, Item, Solution};
use loadplan_core::solver::PackingSolver;

const EPS: f64 = 1e-5;

fn front_container(id: u64, dims: (f64, f64, f64), max_weight: f64) -> Container {
    let mut c = Container::new(id, "CNT", dims.0, dims.1, dims.2, max_weight);
    c.door = DoorKind::Front;
    c
}

fn cube(id: u64, order: &str, priority: i64, send_date_ts: i64) -> Item {
    let mut it = Item::new(id, "CUBE", order, 500.0, 500.0, 500.0, 10.0);
    it.side_up = true;
    it.max_stack = 1;
    it.pickup_priority = priority;
    it.send_date_ts = send_date_ts;
    it
}

fn solve(containers: Vec<Container>, items: Vec<Item>) -> Solution {
    let mut solver = PackingSolver::new(containers, items, HashMap::new(), (0.0, 0.0, 0.0));
    solver.solve()
}

fn assert_disjoint(solution: &Solution) {
    for container in &solution.containers {
        for i in 0..container.items.len() {
            for j in (i + 1)..container.items.len() {
                let a = &container.items[i];
                let b = &container.items[j];
                let (ax, ay, az) = a.position.unwrap();
                let (bx, by, bz) = b.position.unwrap();
                let (adx, ady, adz) = a.dims(None);
                let (bdx, bdy, bdz) = b.dims(None);
                let overlap = ax < bx + bdx - EPS
                    && bx < ax + adx - EPS
                    && ay < by + bdy - EPS
                    && by < ay + ady - EPS
                    && az < bz + bdz - EPS
                    && bz < az + adz - EPS;
                assert!(!overlap, "items {} and {} overlap", a.id, b.id);
            }
        }
    }
}

/// Mixed priorities in one order: urgent (priority 1) cargo sits toward the
/// door, i.e. at strictly higher y than every priority-2 item.
#[test]
fn priorities_band_along_the_door_axis() {
    let container = front_container(0, (2400.0, 2400.0, 2400.0), 10_000.0);
    let mut items = Vec::new();
    for id in 0..4 {
        items.push(cube(id, "ord-1", 1, 0));
    }
    for id in 4..8 {
        items.push(cube(id, "ord-1", 2, 0));
    }

    let solution = solve(vec![container], items);
    assert_disjoint(&solution);
    assert!(solution.unused.is_empty());
    assert_eq!(solution.containers.len(), 1);

    let placed = &solution.containers[0].items;
    let urgent_min_y = placed
        .iter()
        .filter(|it| it.pickup_priority == 1)
        .map(|it| it.position.unwrap().1)
        .fold(f64::INFINITY, f64::min);
    let deferred_max_y = placed
        .iter()
        .filter(|it| it.pickup_priority == 2)
        .map(|it| it.position.unwrap().1)
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(
        urgent_min_y > deferred_max_y + EPS,
        "priority-1 cargo must sit door-side of priority-2 cargo \
         (min urgent y {urgent_min_y}, max deferred y {deferred_max_y})"
    );

    // Face-adjacent items within the order differ by at most one level.
    for a in placed {
        for b in placed {
            if a.id == b.id {
                continue;
            }
            let (ax, ay, az) = a.position.unwrap();
            let (bx, by, bz) = b.position.unwrap();
            let (adx, ady, adz) = a.dims(None);
            let touch_x = ((ax + adx) - bx).abs() < EPS || ((bx + b.dims(None).0) - ax).abs() < EPS;
            let touch_y = ((ay + ady) - by).abs() < EPS || ((by + b.dims(None).1) - ay).abs() < EPS;
            let touch_z = ((az + adz) - bz).abs() < EPS || ((bz + b.dims(None).2) - az).abs() < EPS;
            if touch_x || touch_y || touch_z {
                assert!((a.pickup_priority - b.pickup_priority).abs() <= 1);
            }
        }
    }
}

/// Two orders never interleave along the door axis; the earlier send date
/// ends up on the door side.
#[test]
fn orders_occupy_disjoint_door_slices() {
    let container = front_container(0, (2000.0, 2000.0, 2000.0), 10_000.0);
    let mut early = cube(0, "ord-early", 1, 1_000);
    early.sku_id = "EARLY".to_string();
    let mut late = cube(1, "ord-late", 1, 2_000);
    late.sku_id = "LATE".to_string();

    let solution = solve(vec![container], vec![early, late]);
    assert_disjoint(&solution);
    assert!(solution.unused.is_empty());

    let placed = &solution.containers[0].items;
    let early_item = placed.iter().find(|it| it.sku_id == "EARLY").unwrap();
    let late_item = placed.iter().find(|it| it.sku_id == "LATE").unwrap();

    let (_, ey, _) = early_item.position.unwrap();
    let (_, ly, _) = late_item.position.unwrap();
    let (_, edy, _) = early_item.dims(None);
    let (_, ldy, _) = late_item.dims(None);

    // Disjoint y-intervals, earlier order on the door (high-y) side.
    assert!(ey >= ly + ldy - EPS || ly >= ey + edy - EPS);
    assert!(ey > ly, "earlier order must be closer to the door");
}

/// Identical items take the grid fast path and fill whole lanes bottom-up.
#[test]
fn identical_items_grid_fill() {
    let container = front_container(0, (2000.0, 2000.0, 2000.0), 10_000.0);
    let items: Vec<Item> = (0..8)
        .map(|id| {
            let mut it = Item::new(id, "CUBE", "ord-1", 500.0, 500.0, 500.0, 10.0);
            it.side_up = true;
            it
        })
        .collect();

    let solution = solve(vec![container], items);
    assert_disjoint(&solution);
    assert!(solution.unused.is_empty());

    let placed = &solution.containers[0].items;
    assert_eq!(placed.len(), 8);
    for item in placed {
        let (x, y, z) = item.position.unwrap();
        assert!(x.rem_euclid(500.0) < EPS || (500.0 - x.rem_euclid(500.0)) < EPS);
        assert!(y.rem_euclid(500.0) < EPS || (500.0 - y.rem_euclid(500.0)) < EPS);
        assert!(z.rem_euclid(500.0) < EPS || (500.0 - z.rem_euclid(500.0)) < EPS);
    }
    // The deepest lane (y = 0) absorbs everything before a new lane opens:
    // four floor slots plus stacking cover all eight cubes.
    let lane0: Vec<&Item> = placed
        .iter()
        .filter(|it| it.position.unwrap().1 < EPS)
        .collect();
    assert_eq!(lane0.len(), 8, "all cubes stay in the deepest lane");
}

/// Door-container items are reported door-axis first for rendering.
#[test]
fn door_output_order_is_depth_first() {
    let container = front_container(0, (2000.0, 2000.0, 2000.0), 10_000.0);
    let items: Vec<Item> = (0..6)
        .map(|id| {
            let mut it = Item::new(id, "CUBE", "ord-1", 500.0, 500.0, 500.0, 10.0);
            it.side_up = true;
            it.max_stack = 1;
            it
        })
        .collect();

    let solution = solve(vec![container], items);
    let placed = &solution.containers[0].items;
    let depth: Vec<f64> = placed
        .iter()
        .map(|it| it.position.unwrap().1 + it.dims(None).1 / 2.0)
        .collect();
    let mut sorted = depth.clone();
    sorted.sort_by(f64::total_cmp);
    assert_eq!(depth, sorted);
}

/// An item heavier than the remaining weight budget is skipped, lighter
/// items after it still load.
#[test]
fn weight_budget_skips_heavy_items() {
    let container = front_container(0, (2000.0, 2000.0, 2000.0), 25.0);
    let mut items: Vec<Item> = (0..3)
        .map(|id| cube(id, "ord-1", 1, 0))
        .collect();
    items[0].weight = 20.0;
    items[1].weight = 20.0;
    items[2].weight = 5.0;

    let solution = solve(vec![container], items);
    let placed: usize = solution.containers.iter().map(|c| c.items.len()).sum();
    let placed_weight: f64 = solution.containers.iter().map(|c| c.total_weight).sum();
    assert_eq!(placed, 2);
    assert!(placed_weight <= 25.0 + EPS);
    assert_eq!(solution.unused.len(), 1);
}
