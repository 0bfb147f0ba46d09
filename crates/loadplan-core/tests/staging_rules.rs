use loadplan_core::model::{DoorKind, Item};
use loadplan_core::staging::{
    compute_final_ranks, expand_containers, expand_pallets, expand_products,
    normalize_priorities, validate_containers, validate_items, ContainerSpec, PalletSpec,
    ProductSpec,
};

fn product_spec(qty: u32) -> ProductSpec {
    ProductSpec {
        product_id: "SKU-1".to_string(),
        order_id: "ord-1".to_string(),
        qty,
        width: 400.0,
        length: 300.0,
        height: 200.0,
        weight: 5.0,
        side_up: true,
        max_stack: 3,
        max_stack_weight: None,
        no_stack: false,
        must_be_on_top: false,
        grounded: false,
        pickup_priority: 1,
        send_date_ts: 0,
    }
}

fn item_with(id: u64, order: &str, priority: i64, send_date_ts: i64, weight: f64) -> Item {
    let mut it = Item::new(id, "SKU", order, 100.0, 100.0, 100.0, weight);
    it.pickup_priority = priority;
    it.send_date_ts = send_date_ts;
    it
}

#[test]
fn products_expand_per_quantity_with_sequential_ids() {
    let items = expand_products(&[product_spec(3), {
        let mut second = product_spec(2);
        second.product_id = "SKU-2".to_string();
        second
    }]);
    assert_eq!(items.len(), 5);
    let ids: Vec<u64> = items.iter().map(|it| it.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(items[0].sku_id, "SKU-1");
    assert_eq!(items[3].sku_id, "SKU-2");
    assert!(validate_items(&items).is_ok());
}

#[test]
fn no_stack_flag_caps_the_stack_at_one() {
    let mut spec = product_spec(1);
    spec.no_stack = true;
    let items = expand_products(&[spec]);
    assert_eq!(items[0].max_stack, 1);
}

#[test]
fn pallets_expand_with_external_dims() {
    let pallets = expand_pallets(&[PalletSpec {
        pallet_id: "EUR".to_string(),
        qty: 2,
        load_width: 1200.0,
        load_length: 800.0,
        load_height: 1500.0,
        load_weight: 500.0,
        pallet_width: 1200.0,
        pallet_length: 800.0,
        pallet_height: 150.0,
        pallet_weight: 20.0,
        pickup_priority: 1,
    }]);
    assert_eq!(pallets.len(), 2);
    assert_eq!(pallets[0].door, DoorKind::None);
    assert_eq!(pallets[0].ex_height, 150.0);
    assert!(validate_containers(&pallets).is_ok());
}

#[test]
fn side_door_rotates_into_front_door_frame() {
    let spec = ContainerSpec {
        container_id: "C20".to_string(),
        qty: 1,
        load_width: 2300.0,
        load_length: 5900.0,
        load_height: 2300.0,
        load_weight: 20_000.0,
        container_width: 2400.0,
        container_length: 6000.0,
        container_height: 2400.0,
        container_weight: 2000.0,
        pickup_priority: 1,
        door_position: Some("side".to_string()),
    };
    let containers = expand_containers(&[spec]);
    assert_eq!(containers.len(), 1);
    let c = &containers[0];
    // Width and length swap so the door faces +y.
    assert_eq!(c.width, 5900.0);
    assert_eq!(c.length, 2300.0);
    assert_eq!(c.ex_width, 6000.0);
    assert_eq!(c.ex_length, 2400.0);
    assert_eq!(c.door, DoorKind::Front);
}

#[test]
fn front_door_keeps_its_frame() {
    let spec = ContainerSpec {
        container_id: "C20".to_string(),
        qty: 1,
        load_width: 2300.0,
        load_length: 5900.0,
        load_height: 2300.0,
        load_weight: 20_000.0,
        container_width: 2400.0,
        container_length: 6000.0,
        container_height: 2400.0,
        container_weight: 2000.0,
        pickup_priority: 1,
        door_position: Some("front".to_string()),
    };
    let containers = expand_containers(&[spec]);
    let c = &containers[0];
    assert_eq!(c.width, 2300.0);
    assert_eq!(c.length, 5900.0);
    assert_eq!(c.door, DoorKind::Front);
}

#[test]
fn positive_priorities_pass_through() {
    let mut items = vec![
        item_with(0, "a", 3, 0, 1.0),
        item_with(1, "a", 1, 0, 1.0),
    ];
    normalize_priorities(&mut items);
    assert_eq!(items[0].pickup_priority, 3);
    assert_eq!(items[1].pickup_priority, 1);
}

#[test]
fn negative_priorities_reindex_ascending() {
    let mut items = vec![
        item_with(0, "a", -1, 0, 1.0),
        item_with(1, "a", -3, 0, 1.0),
        item_with(2, "a", -2, 0, 1.0),
    ];
    normalize_priorities(&mut items);
    // Most negative becomes the most urgent rank 1.
    assert_eq!(items[1].pickup_priority, 1);
    assert_eq!(items[2].pickup_priority, 2);
    assert_eq!(items[0].pickup_priority, 3);
}

#[test]
fn mixed_sign_priorities_become_absolute() {
    let mut items = vec![
        item_with(0, "a", -2, 0, 1.0),
        item_with(1, "a", 3, 0, 1.0),
    ];
    normalize_priorities(&mut items);
    assert_eq!(items[0].pickup_priority, 2);
    assert_eq!(items[1].pickup_priority, 3);
    assert!(items.iter().all(|it| it.pickup_priority > 0));
}

#[test]
fn final_ranks_group_identical_tuples() {
    let mut items = vec![
        item_with(0, "a", 1, 100, 5.0),
        item_with(1, "a", 1, 100, 5.0),
        item_with(2, "a", 1, 200, 5.0),
        item_with(3, "b", 1, 100, 5.0),
    ];
    compute_final_ranks(&mut items);

    // Twins share one rank; later send dates rank higher (packed first,
    // placed deeper).
    assert_eq!(items[0].final_rank, items[1].final_rank);
    assert!(items[2].final_rank > items[0].final_rank);
    assert!(items[3].final_rank > items[0].final_rank);
    assert_eq!(items[0].final_rank, 1);
}

#[test]
fn rank_is_input_order_independent_for_twins() {
    let mut forward = vec![
        item_with(0, "a", 1, 100, 5.0),
        item_with(1, "a", 1, 100, 5.0),
    ];
    let mut reversed = vec![
        item_with(1, "a", 1, 100, 5.0),
        item_with(0, "a", 1, 100, 5.0),
    ];
    compute_final_ranks(&mut forward);
    compute_final_ranks(&mut reversed);
    assert_eq!(forward[0].final_rank, 1);
    assert_eq!(forward[1].final_rank, 1);
    assert_eq!(reversed[0].final_rank, 1);
    assert_eq!(reversed[1].final_rank, 1);
}

#[test]
fn invalid_dimensions_are_rejected() {
    let bad = vec![Item::new(0, "SKU", "ord", 0.0, 100.0, 100.0, 1.0)];
    assert!(validate_items(&bad).is_err());
}
