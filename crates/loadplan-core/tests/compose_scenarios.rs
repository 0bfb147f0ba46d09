use loadplan_core::compose::{pallet_batch_items, solve_pallets_then_containers};
use loadplan_core::config::SolverConfig;
use loadplan_core::error::LoadPlanError;
use loadplan_core::model::{Container, DoorKind, Item, ItemKind};

const EPS: f64 = 1e-5;

fn product(id: u64, dims: (f64, f64, f64), weight: f64) -> Item {
    let mut it = Item::new(id, "PROD", "ord-1", dims.0, dims.1, dims.2, weight);
    it.side_up = true;
    it.max_stack = 1;
    it
}

fn pallet(id: u64) -> Container {
    let mut c = Container::new(id, "EUR", 1200.0, 800.0, 300.0, 500.0);
    c.ex_width = 1200.0;
    c.ex_length = 800.0;
    c.ex_height = 150.0;
    c.ex_weight = 20.0;
    c
}

fn front_container(id: u64) -> Container {
    let mut c = Container::new(id, "40FT", 2400.0, 2400.0, 2400.0, 10_000.0);
    c.door = DoorKind::Front;
    c
}

/// Ten products spread over two pallets; both pallets ride in one front-door
/// container as grounded single-layer batch items.
#[test]
fn pallets_ride_inside_the_container() {
    let products: Vec<Item> = (0..10).map(|id| product(id, (400.0, 300.0, 200.0), 5.0)).collect();
    let pallets = vec![pallet(0), pallet(1)];
    let containers = vec![front_container(0)];
    let config = SolverConfig::default();

    let nested =
        solve_pallets_then_containers(products, pallets, containers, &config).expect("both phases succeed");

    // Phase 1: 8 + 2 split across the two pallets, nothing left over.
    assert!(nested.pallets.unused.is_empty());
    assert_eq!(nested.pallets.containers.len(), 2);
    let pallet_counts: Vec<usize> = nested
        .pallets
        .containers
        .iter()
        .map(|c| c.items.len())
        .collect();
    assert_eq!(pallet_counts.iter().sum::<usize>(), 10);

    // Phase 2: both batches sit on the container floor.
    assert!(nested.containers.unused.is_empty());
    assert_eq!(nested.containers.containers.len(), 1);
    let batches = &nested.containers.containers[0].items;
    assert_eq!(batches.len(), 2);
    for batch in batches {
        assert_eq!(batch.kind, ItemKind::PalletBatch);
        assert!(batch.pallet_id.is_some());
        let (_, _, z) = batch.position.unwrap();
        assert!(z < EPS, "pallet batches are grounded");
        // External footprint plus frame height plus one product layer.
        assert!((batch.width - 1200.0).abs() < EPS);
        assert!((batch.length - 800.0).abs() < EPS);
        assert!((batch.height - 350.0).abs() < EPS);
    }

    // Batch ids resolve back to phase-1 pallets.
    for batch in batches {
        let src = batch.pallet_id.unwrap() as usize;
        assert!(src < nested.pallets.containers.len());
    }
}

/// Batch weight combines the pallet frame and its cargo; priority is the
/// sum of distinct cargo priorities.
#[test]
fn batch_items_summarize_their_pallet() {
    let mut loaded = pallet(0);
    for id in 0..3 {
        let mut it = product(id, (400.0, 300.0, 200.0), 5.0);
        it.pickup_priority = (id as i64 % 2) + 1;
        it.position = Some((0.0, 0.0, 0.0));
        loaded.total_weight += it.weight;
        loaded.items.push(it);
    }
    let empty = pallet(1);

    let batches = pallet_batch_items(&[loaded, empty]);
    assert_eq!(batches.len(), 1, "empty pallets produce no batch");

    let batch = &batches[0];
    assert!((batch.weight - (20.0 + 15.0)).abs() < EPS);
    assert_eq!(batch.pickup_priority, 1 + 2);
    assert!(batch.grounded);
    assert!(batch.side_up);
    assert_eq!(batch.max_stack, 1);
    assert!((batch.height - (150.0 + 200.0)).abs() < EPS);
}

/// The nested solve refuses a plan whose pallet phase leaves products over.
#[test]
fn unplaced_products_reject_the_whole_plan() {
    let products: Vec<Item> = (0..30).map(|id| product(id, (400.0, 300.0, 200.0), 5.0)).collect();
    let pallets = vec![pallet(0)];
    let containers = vec![front_container(0)];
    let config = SolverConfig::default();

    let err = solve_pallets_then_containers(products, pallets, containers, &config).unwrap_err();
    match err {
        LoadPlanError::UnplacedProducts { count } => assert_eq!(count, 22),
        other => panic!("expected UnplacedProducts, got {other}"),
    }
}
