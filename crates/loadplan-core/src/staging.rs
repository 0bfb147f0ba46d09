//! Input staging: per-quantity expansion of product/pallet/container specs
//! into core entities, priority normalization, final-rank computation, and
//! structural validation.

use serde::{Deserialize, Serialize};

use crate::error::{LoadPlanError, Result};
use crate::model::{Container, DoorKind, Item, ItemKind};
use crate::orientation::rotated_dims;

fn default_qty() -> u32 {
    1
}
fn default_priority() -> i64 {
    1
}
fn default_max_stack() -> i32 {
    -1
}

/// One product line of a packing problem; expanded per `qty`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSpec {
    pub product_id: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default = "default_qty")]
    pub qty: u32,
    pub width: f64,
    pub length: f64,
    pub height: f64,
    pub weight: f64,
    #[serde(default)]
    pub side_up: bool,
    #[serde(default = "default_max_stack")]
    pub max_stack: i32,
    #[serde(default)]
    pub max_stack_weight: Option<f64>,
    /// Fragile/no-stack cargo maps to a hard single-layer cap.
    #[serde(default)]
    pub no_stack: bool,
    #[serde(default)]
    pub must_be_on_top: bool,
    #[serde(default)]
    pub grounded: bool,
    #[serde(default = "default_priority")]
    pub pickup_priority: i64,
    /// UTC send date, seconds since epoch; 0 if unspecified.
    #[serde(default)]
    pub send_date_ts: i64,
}

/// One pallet line; expanded per `qty`. Load dims bound the cargo, the
/// `pallet_*` dims describe the physical pallet for nested loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PalletSpec {
    pub pallet_id: String,
    #[serde(default = "default_qty")]
    pub qty: u32,
    pub load_width: f64,
    pub load_length: f64,
    pub load_height: f64,
    pub load_weight: f64,
    pub pallet_width: f64,
    pub pallet_length: f64,
    pub pallet_height: f64,
    pub pallet_weight: f64,
    #[serde(default = "default_priority")]
    pub pickup_priority: i64,
}

/// One shipping-container line; expanded per `qty`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub container_id: String,
    #[serde(default = "default_qty")]
    pub qty: u32,
    pub load_width: f64,
    pub load_length: f64,
    pub load_height: f64,
    pub load_weight: f64,
    pub container_width: f64,
    pub container_length: f64,
    pub container_height: f64,
    pub container_weight: f64,
    #[serde(default = "default_priority")]
    pub pickup_priority: i64,
    #[serde(default)]
    pub door_position: Option<String>,
}

/// Expands product lines into individual items with sequential ids.
pub fn expand_products(products: &[ProductSpec]) -> Vec<Item> {
    let mut items = Vec::new();
    let mut id = 0u64;
    for spec in products {
        for _ in 0..spec.qty {
            let mut item = Item::new(
                id,
                spec.product_id.clone(),
                spec.order_id.clone(),
                spec.width,
                spec.length,
                spec.height,
                spec.weight,
            );
            item.kind = ItemKind::Product;
            item.side_up = spec.side_up;
            item.max_stack = if spec.no_stack { 1 } else { spec.max_stack };
            item.max_stack_weight = spec.max_stack_weight;
            item.must_be_on_top = spec.must_be_on_top;
            item.grounded = spec.grounded;
            item.pickup_priority = spec.pickup_priority;
            item.send_date_ts = spec.send_date_ts;
            items.push(item);
            id += 1;
        }
    }
    items
}

/// Expands pallet lines into door-less containers with sequential ids.
pub fn expand_pallets(pallets: &[PalletSpec]) -> Vec<Container> {
    let mut containers = Vec::new();
    let mut id = 0u64;
    for spec in pallets {
        for _ in 0..spec.qty {
            let mut c = Container::new(
                id,
                spec.pallet_id.clone(),
                spec.load_width,
                spec.load_length,
                spec.load_height,
                spec.load_weight,
            );
            c.ex_width = spec.pallet_width;
            c.ex_length = spec.pallet_length;
            c.ex_height = spec.pallet_height;
            c.ex_weight = spec.pallet_weight;
            c.pickup_priority = spec.pickup_priority;
            c.door = DoorKind::None;
            containers.push(c);
            id += 1;
        }
    }
    containers
}

/// Expands container lines into door containers with sequential ids.
///
/// Side/left/right doors rotate the interior and external dimensions a
/// quarter turn so the door always faces the +y axis, after which all doors
/// use front-door semantics.
pub fn expand_containers(specs: &[ContainerSpec]) -> Vec<Container> {
    let mut containers = Vec::new();
    let mut id = 0u64;
    for spec in specs {
        let door_raw = spec.door_position.as_deref().map(str::trim);
        let sideways = matches!(door_raw, Some("side") | Some("left") | Some("right"));
        let rot = if sideways { 1 } else { 0 };
        let (w, l, h) = rotated_dims(spec.load_width, spec.load_length, spec.load_height, rot);
        let (exw, exl, exh) = rotated_dims(
            spec.container_width,
            spec.container_length,
            spec.container_height,
            rot,
        );
        for _ in 0..spec.qty {
            let mut c = Container::new(id, spec.container_id.clone(), w, l, h, spec.load_weight);
            c.ex_width = exw;
            c.ex_length = exl;
            c.ex_height = exh;
            c.ex_weight = spec.container_weight;
            c.pickup_priority = spec.pickup_priority;
            c.door = DoorKind::from_position(door_raw);
            containers.push(c);
            id += 1;
        }
    }
    containers
}

/// Rejects non-positive dimensions or negative weights before a solve.
pub fn validate_items(items: &[Item]) -> Result<()> {
    for item in items {
        if item.width <= 0.0 || item.length <= 0.0 || item.height <= 0.0 {
            return Err(LoadPlanError::InvalidDimensions {
                kind: "item",
                id: item.id.to_string(),
                width: item.width,
                length: item.length,
                height: item.height,
            });
        }
        if item.weight < 0.0 {
            return Err(LoadPlanError::InvalidInput(format!(
                "item {} has negative weight {}",
                item.id, item.weight
            )));
        }
    }
    Ok(())
}

pub fn validate_containers(containers: &[Container]) -> Result<()> {
    for c in containers {
        if c.width <= 0.0 || c.length <= 0.0 || c.height <= 0.0 {
            return Err(LoadPlanError::InvalidDimensions {
                kind: "container",
                id: c.id.to_string(),
                width: c.width,
                length: c.length,
                height: c.height,
            });
        }
        if c.max_weight < 0.0 {
            return Err(LoadPlanError::InvalidInput(format!(
                "container {} has negative weight cap {}",
                c.id, c.max_weight
            )));
        }
    }
    Ok(())
}

/// Normalizes pickup priorities so that after the pass all priorities are
/// positive and 1 is the most urgent:
/// - all positive: kept as-is,
/// - all negative: re-indexed by ascending order (most negative becomes 1),
/// - mixed signs: mapped to absolute values.
pub fn normalize_priorities(items: &mut [Item]) {
    if items.is_empty() {
        return;
    }
    let all_positive = items.iter().all(|it| it.pickup_priority > 0);
    let all_negative = items.iter().all(|it| it.pickup_priority < 0);

    if all_positive {
        return;
    }
    if all_negative {
        let mut unique: Vec<i64> = items.iter().map(|it| it.pickup_priority).collect();
        unique.sort_unstable();
        unique.dedup();
        for item in items.iter_mut() {
            let rank = unique
                .iter()
                .position(|&p| p == item.pickup_priority)
                .expect("priority present in unique set");
            item.pickup_priority = rank as i64 + 1;
        }
    } else {
        for item in items.iter_mut() {
            item.pickup_priority = item.pickup_priority.abs();
        }
    }
}

type RankKey = (i64, String, i64, i64, i64, String);

fn rank_key(item: &Item) -> RankKey {
    (
        item.send_date_ts,
        item.order_id.clone(),
        item.pickup_priority,
        (item.weight * 1000.0).round() as i64,
        (item.volume() * 10.0).round() as i64,
        item.sku_id.clone(),
    )
}

/// Groups items by `(send date, order, priority, weight, volume, SKU)` in
/// ascending lexicographic order and assigns each group `final_rank =
/// group index + 1`. Larger rank packs first. Runs on raw priorities,
/// before [`normalize_priorities`].
pub fn compute_final_ranks(items: &mut [Item]) {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| rank_key(&items[a]).cmp(&rank_key(&items[b])));

    let mut rank = 0u32;
    let mut last: Option<RankKey> = None;
    for idx in order {
        let key = rank_key(&items[idx]);
        if last.as_ref() != Some(&key) {
            rank += 1;
            last = Some(key);
        }
        items[idx].final_rank = rank;
    }
}
