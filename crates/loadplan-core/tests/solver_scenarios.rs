use std::collections::HashMap;

use loadplan_core::model::{Container, Item, Solution};
use loadplan_core::solver::PackingSolver;

const EPS: f64 = 1e-5;

fn pallet(id: u64, dims: (f64, f64, f64), max_weight: f64) -> Container {
    Container::new(id, "EUR", dims.0, dims.1, dims.2, max_weight)
}

fn boxed_item(id: u64, dims: (f64, f64, f64), weight: f64) -> Item {
    let mut it = Item::new(id, "BOX", "ord-1", dims.0, dims.1, dims.2, weight);
    it.side_up = true;
    it
}

fn solve(containers: Vec<Container>, items: Vec<Item>) -> Solution {
    let mut solver = PackingSolver::new(containers, items, HashMap::new(), (0.0, 0.0, 0.0));
    solver.solve()
}

#[test]
fn no_containers_returns_all_items_unused() {
    let items = vec![boxed_item(0, (10.0, 10.0, 10.0), 1.0)];
    let solution = solve(Vec::new(), items);
    assert!(solution.containers.is_empty());
    assert_eq!(solution.unused.len(), 1);
}

#[test]
fn no_items_returns_empty_plan() {
    let solution = solve(vec![pallet(0, (100.0, 100.0, 100.0), 100.0)], Vec::new());
    assert!(solution.containers.is_empty());
    assert!(solution.unused.is_empty());
}

/// An item that exceeds every container in every rotation is returned
/// unused; no container is consumed.
#[test]
fn infeasible_item_lands_in_unused() {
    let containers = vec![pallet(0, (1000.0, 1000.0, 1000.0), 1000.0)];
    let item = Item::new(0, "LONG", "ord-1", 2000.0, 500.0, 500.0, 10.0);

    let solution = solve(containers, vec![item]);
    assert!(solution.containers.is_empty());
    assert_eq!(solution.unused.len(), 1);
    assert_eq!(solution.unused[0].sku_id, "LONG");
}

/// Six boxes that fit one pallet never consume the second identical pallet.
#[test]
fn consolidation_keeps_one_pallet() {
    let containers = vec![
        pallet(0, (1200.0, 800.0, 1500.0), 500.0),
        pallet(1, (1200.0, 800.0, 1500.0), 500.0),
    ];
    let items: Vec<Item> = (0..6)
        .map(|id| {
            let mut it = boxed_item(id, (400.0, 300.0, 200.0), 5.0);
            it.max_stack = 5;
            it
        })
        .collect();

    let solution = solve(containers, items);
    assert!(solution.unused.is_empty());
    assert_eq!(
        solution.containers.len(),
        1,
        "consolidation must leave a single pallet in use"
    );
    assert_eq!(solution.containers[0].items.len(), 6);
}

/// A load spilling over one pallet consumes the second; the merge attempt
/// fails and both stay.
#[test]
fn overflow_uses_second_pallet() {
    let containers = vec![
        pallet(0, (1200.0, 800.0, 400.0), 500.0),
        pallet(1, (1200.0, 800.0, 400.0), 500.0),
    ];
    // One layer of 8 fits per pallet (height excludes a second layer).
    let items: Vec<Item> = (0..10)
        .map(|id| {
            let mut it = boxed_item(id, (400.0, 300.0, 250.0), 5.0);
            it.max_stack = 1;
            it
        })
        .collect();

    let solution = solve(containers, items);
    assert!(solution.unused.is_empty());
    assert_eq!(solution.containers.len(), 2);
    let counts: Vec<usize> = solution.containers.iter().map(|c| c.items.len()).collect();
    assert_eq!(counts.iter().sum::<usize>(), 10);
}

/// Exact weight fit: a cap equal to the item-weight sum is accepted.
#[test]
fn exact_weight_fit_is_accepted() {
    let containers = vec![pallet(0, (1200.0, 800.0, 1500.0), 20.0)];
    let items: Vec<Item> = (0..4)
        .map(|id| {
            let mut it = boxed_item(id, (400.0, 300.0, 200.0), 5.0);
            it.max_stack = 4;
            it
        })
        .collect();

    let solution = solve(containers, items);
    assert!(solution.unused.is_empty());
    let total: f64 = solution.containers.iter().map(|c| c.total_weight).sum();
    assert!((total - 20.0).abs() < EPS);
}

/// The combination selector prefers a single tight bin over a larger one or
/// over spreading across several.
#[test]
fn combo_selection_prefers_fewer_tighter_bins() {
    let mut big = Container::new(0, "BIG", 1200.0, 800.0, 1500.0, 1000.0);
    big.ex_weight = 30.0;
    let mut small = Container::new(1, "SMALL", 800.0, 600.0, 1000.0, 500.0);
    small.ex_weight = 15.0;

    let items: Vec<Item> = (0..4)
        .map(|id| {
            let mut it = boxed_item(id, (400.0, 300.0, 200.0), 5.0);
            it.max_stack = 4;
            it
        })
        .collect();

    let solution = solve(vec![big, small], items);
    assert!(solution.unused.is_empty());
    assert_eq!(solution.containers.len(), 1);
    assert_eq!(
        solution.containers[0].type_id, "SMALL",
        "the tighter sufficient container wins the ranking"
    );
}

/// Several copies of one pallet template skip the combinator and consume
/// only as many as the load needs.
#[test]
fn single_template_pool_packs_sequentially() {
    let containers = vec![
        pallet(0, (1200.0, 800.0, 1500.0), 1000.0),
        pallet(1, (1200.0, 800.0, 1500.0), 1000.0),
        pallet(2, (1200.0, 800.0, 1500.0), 1000.0),
    ];
    let items: Vec<Item> = (0..4)
        .map(|id| {
            let mut it = boxed_item(id, (400.0, 300.0, 200.0), 5.0);
            it.max_stack = 4;
            it
        })
        .collect();

    let solution = solve(containers, items);
    assert!(solution.unused.is_empty());
    assert_eq!(solution.containers.len(), 1);
}

/// Re-solving deep-cloned inputs reproduces the same placements.
#[test]
fn solve_is_deterministic() {
    let build = || {
        let containers = vec![
            pallet(0, (1200.0, 800.0, 1500.0), 500.0),
            pallet(1, (1000.0, 700.0, 1200.0), 400.0),
        ];
        let mut items: Vec<Item> = Vec::new();
        for id in 0..5 {
            items.push(boxed_item(id, (400.0, 300.0, 200.0), 5.0));
        }
        for id in 5..9 {
            let mut it = boxed_item(id, (250.0, 250.0, 300.0), 3.0);
            it.sku_id = "SMALL".to_string();
            items.push(it);
        }
        (containers, items)
    };

    let (c1, i1) = build();
    let (c2, i2) = build();
    let first = solve(c1, i1);
    let second = solve(c2, i2);

    assert_eq!(first.containers.len(), second.containers.len());
    assert_eq!(first.unused.len(), second.unused.len());
    for (a, b) in first.containers.iter().zip(second.containers.iter()) {
        assert_eq!(a.items.len(), b.items.len());
        for (x, y) in a.items.iter().zip(b.items.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.position, y.position);
            assert_eq!(x.rotation, y.rotation);
            assert_eq!(x.layer, y.layer);
        }
    }
}

/// Containers that end up empty are dropped and survivors are re-indexed.
#[test]
fn empty_containers_are_dropped_from_the_plan() {
    let containers = vec![
        pallet(7, (1200.0, 800.0, 1500.0), 1000.0),
        pallet(9, (1200.0, 800.0, 1500.0), 1000.0),
    ];
    let items = vec![{
        let mut it = boxed_item(0, (400.0, 300.0, 200.0), 5.0);
        it.max_stack = 1;
        it
    }];

    let solution = solve(containers, items);
    assert!(solution.unused.is_empty());
    assert_eq!(solution.containers.len(), 1);
    assert_eq!(solution.containers[0].id, 0, "survivors are re-indexed");
}
