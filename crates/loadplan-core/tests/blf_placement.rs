use std::collections::HashMap;

use loadplan_core::config::SolverConfig;
use loadplan_core::model::{Container, DoorKind, Item};
use loadplan_core::packer::blf::BottomLeftFill;

fn commit(container: &mut Container, mut item: Item, p: (f64, f64, f64, u8, u32)) {
    item.position = Some((p.0, p.1, p.2));
    item.rotation = p.3;
    item.layer = p.4;
    container.total_weight += item.weight;
    container.items.push(item);
}

fn item(id: u64, dims: (f64, f64, f64)) -> Item {
    let mut it = Item::new(id, "BOX", "ord-1", dims.0, dims.1, dims.2, 1.0);
    it.side_up = true;
    it
}

#[test]
fn first_item_lands_at_origin() {
    let container = Container::new(0, "P", 10.0, 10.0, 10.0, 100.0);
    let cfg = SolverConfig::default();
    let no_tops: HashMap<u64, bool> = HashMap::new();
    let blf = BottomLeftFill::new(&container, &cfg, &no_tops);

    let p = blf.find_best_position(&item(1, (2.0, 2.0, 2.0)), None).unwrap();
    assert_eq!((p.x, p.y, p.z), (0.0, 0.0, 0.0));
    assert_eq!(p.layer, 1);
}

#[test]
fn pallet_fills_floor_before_stacking() {
    let mut container = Container::new(0, "P", 4.0, 4.0, 10.0, 100.0);
    let cfg = SolverConfig::default();
    let no_tops: HashMap<u64, bool> = HashMap::new();

    for id in 1..=4 {
        let it = item(id, (2.0, 2.0, 2.0));
        let p = BottomLeftFill::new(&container, &cfg, &no_tops)
            .find_best_position(&it, None)
            .unwrap();
        assert_eq!(p.z, 0.0, "item {id} should stay on the floor");
        commit(&mut container, it, (p.x, p.y, p.z, p.rotation, p.layer));
    }

    // Floor full: the fifth goes up and starts layer 2.
    let fifth = item(5, (2.0, 2.0, 2.0));
    let p = BottomLeftFill::new(&container, &cfg, &no_tops)
        .find_best_position(&fifth, None)
        .unwrap();
    assert_eq!(p.z, 2.0);
    assert_eq!(p.layer, 2);
}

#[test]
fn grounded_item_rejects_elevated_positions() {
    let mut container = Container::new(0, "P", 2.0, 2.0, 10.0, 100.0);
    let cfg = SolverConfig::default();
    let no_tops: HashMap<u64, bool> = HashMap::new();
    let base = item(1, (2.0, 2.0, 2.0));
    let p = BottomLeftFill::new(&container, &cfg, &no_tops)
        .find_best_position(&base, None)
        .unwrap();
    commit(&mut container, base, (p.x, p.y, p.z, p.rotation, p.layer));

    // Only stacked space remains, so a grounded item cannot be placed.
    let mut grounded = item(2, (2.0, 2.0, 2.0));
    grounded.grounded = true;
    assert!(BottomLeftFill::new(&container, &cfg, &no_tops)
        .find_best_position(&grounded, None)
        .is_none());

    let free = item(3, (2.0, 2.0, 2.0));
    assert!(BottomLeftFill::new(&container, &cfg, &no_tops)
        .find_best_position(&free, None)
        .is_some());
}

#[test]
fn forced_rotation_is_respected() {
    let container = Container::new(0, "P", 10.0, 10.0, 10.0, 100.0);
    let cfg = SolverConfig::default();
    let no_tops: HashMap<u64, bool> = HashMap::new();
    let it = item(1, (3.0, 2.0, 1.0));

    let p = BottomLeftFill::new(&container, &cfg, &no_tops)
        .find_best_position(&it, Some(1))
        .unwrap();
    assert_eq!(p.rotation, 1);
}

#[test]
fn front_door_prefers_deep_lane_over_new_lane() {
    let mut container = Container::new(0, "C", 6.0, 6.0, 6.0, 100.0);
    container.door = DoorKind::Front;
    let cfg = SolverConfig::default();
    let no_tops: HashMap<u64, bool> = HashMap::new();

    let first = item(1, (2.0, 2.0, 2.0));
    let p = BottomLeftFill::new(&container, &cfg, &no_tops)
        .find_best_position(&first, None)
        .unwrap();
    assert_eq!((p.x, p.y, p.z), (0.0, 0.0, 0.0));
    commit(&mut container, first, (p.x, p.y, p.z, p.rotation, p.layer));

    // Second item extends along x at the same depth instead of opening a
    // deeper lane; the frontier along the door axis stays put.
    let second = item(2, (2.0, 2.0, 2.0));
    let p = BottomLeftFill::new(&container, &cfg, &no_tops)
        .find_best_position(&second, None)
        .unwrap();
    assert_eq!((p.x, p.y, p.z), (2.0, 0.0, 0.0));
}

#[test]
fn max_stack_caps_layer_chain() {
    let mut container = Container::new(0, "P", 2.0, 2.0, 10.0, 100.0);
    let cfg = SolverConfig::default();
    let no_tops: HashMap<u64, bool> = HashMap::new();

    for id in 1..=2 {
        let mut it = item(id, (2.0, 2.0, 2.0));
        it.max_stack = 2;
        let p = BottomLeftFill::new(&container, &cfg, &no_tops)
            .find_best_position(&it, None)
            .unwrap();
        assert_eq!(p.layer, id as u32);
        commit(&mut container, it, (p.x, p.y, p.z, p.rotation, p.layer));
    }

    // Layer 3 would exceed maxStack = 2; the column is the only space left.
    let mut third = item(3, (2.0, 2.0, 2.0));
    third.max_stack = 2;
    assert!(BottomLeftFill::new(&container, &cfg, &no_tops)
        .find_best_position(&third, None)
        .is_none());
}
