use serde::{Deserialize, Serialize};

use crate::orientation::rotated_dims;

/// What a placed unit physically is: a loose product, or an already-packed
/// pallet travelling as a single composite item inside a bigger container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Product,
    PalletBatch,
}

/// Door model of a container after normalization. Any declared door string
/// folds into front-door semantics; pallets have no door.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DoorKind {
    None,
    Front,
}

impl DoorKind {
    /// Normalizes a raw `door_position` string. Empty/absent means pallet.
    pub fn from_position(position: Option<&str>) -> Self {
        match position {
            Some(s) if !s.trim().is_empty() => DoorKind::Front,
            _ => DoorKind::None,
        }
    }

    pub fn is_door(&self) -> bool {
        matches!(self, DoorKind::Front)
    }
}

/// One physical unit of cargo. `position`, `rotation`, `layer` and
/// `final_rank` are placement state written by the core during packing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub order_id: String,
    /// Human-facing SKU code.
    pub sku_id: String,
    pub kind: ItemKind,
    pub width: f64,
    pub length: f64,
    pub height: f64,
    pub weight: f64,
    /// If true, only rotations 0 and 1 (height axis preserved) are allowed.
    pub side_up: bool,
    /// Layer cap for a same-SKU vertical column; -1 = unlimited.
    pub max_stack: i32,
    /// Max cumulative weight carried when different-SKU items sit directly on
    /// this one. `None` derives the default; negative means unlimited.
    pub max_stack_weight: Option<f64>,
    pub grounded: bool,
    pub must_be_on_top: bool,
    pub pickup_priority: i64,
    /// UTC send date, seconds since epoch; 0 if unspecified.
    pub send_date_ts: i64,
    /// Source pallet id for pallet-batch items.
    pub pallet_id: Option<u64>,

    pub position: Option<(f64, f64, f64)>,
    pub rotation: u8,
    /// 1-indexed position in a same-SKU stack; the floor copy is layer 1.
    pub layer: u32,
    pub final_rank: u32,
}

impl Item {
    pub fn new(
        id: u64,
        sku_id: impl Into<String>,
        order_id: impl Into<String>,
        width: f64,
        length: f64,
        height: f64,
        weight: f64,
    ) -> Self {
        Self {
            id,
            order_id: order_id.into(),
            sku_id: sku_id.into(),
            kind: ItemKind::Product,
            width,
            length,
            height,
            weight,
            side_up: false,
            max_stack: -1,
            max_stack_weight: None,
            grounded: false,
            must_be_on_top: false,
            pickup_priority: 1,
            send_date_ts: 0,
            pallet_id: None,
            position: None,
            rotation: 0,
            layer: 1,
            final_rank: 0,
        }
    }

    pub fn volume(&self) -> f64 {
        self.width * self.length * self.height
    }

    /// `max_stack` with -1 resolved to an effectively unlimited layer count.
    pub fn stack_limit(&self) -> i64 {
        if self.max_stack < 0 {
            10_000
        } else {
            self.max_stack as i64
        }
    }

    /// Resolved cross-SKU stack weight limit. Defaults to
    /// `(stack_limit - 1) * weight`; negative values mean unlimited.
    pub fn stack_weight_limit(&self) -> f64 {
        match self.max_stack_weight {
            Some(v) if v < 0.0 => f64::INFINITY,
            Some(v) => v,
            None => (self.stack_limit() - 1) as f64 * self.weight,
        }
    }

    /// `(x, y, z)` extents under the given rotation, or the item's current
    /// rotation when `rot` is `None`.
    pub fn dims(&self, rot: Option<u8>) -> (f64, f64, f64) {
        let r = rot.unwrap_or(self.rotation);
        rotated_dims(self.width, self.length, self.height, r)
    }

    /// Clone with all placement state cleared, as handed to a fresh pack.
    pub fn unplaced_clone(&self) -> Item {
        Item {
            position: None,
            rotation: 0,
            layer: 1,
            ..self.clone()
        }
    }
}

/// A pallet or shipping container. Interior dimensions bound the load;
/// external `ex_*` dimensions describe the packed unit when it becomes an
/// item inside a larger container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: u64,
    pub type_id: String,
    pub width: f64,
    pub length: f64,
    pub height: f64,
    pub max_weight: f64,
    pub ex_width: f64,
    pub ex_length: f64,
    pub ex_height: f64,
    pub ex_weight: f64,
    pub pickup_priority: i64,
    pub door: DoorKind,
    /// World-space origin; item positions are min-corner offsets from here.
    pub origin: (f64, f64, f64),
    pub items: Vec<Item>,
    pub total_weight: f64,
}

impl Container {
    pub fn new(
        id: u64,
        type_id: impl Into<String>,
        width: f64,
        length: f64,
        height: f64,
        max_weight: f64,
    ) -> Self {
        Self {
            id,
            type_id: type_id.into(),
            width,
            length,
            height,
            max_weight,
            ex_width: width,
            ex_length: length,
            ex_height: height,
            ex_weight: 0.0,
            pickup_priority: 1,
            door: DoorKind::None,
            origin: (0.0, 0.0, 0.0),
            items: Vec::new(),
            total_weight: 0.0,
        }
    }

    pub fn volume(&self) -> f64 {
        self.width * self.length * self.height
    }

    pub fn floor_area(&self) -> f64 {
        self.width * self.length
    }

    /// Clone with no items and zero accumulated weight.
    pub fn empty_clone(&self) -> Container {
        Container {
            items: Vec::new(),
            total_weight: 0.0,
            ..self.clone()
        }
    }

    /// Highest occupied z offset, measured from the container floor.
    pub fn stacked_height(&self) -> f64 {
        self.items
            .iter()
            .filter_map(|it| {
                it.position
                    .map(|(_, _, z)| z - self.origin.2 + it.dims(None).2)
            })
            .fold(0.0, f64::max)
    }
}

/// An item bound to a concrete pose inside a container. Supporters are held
/// by id, never by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub item_id: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rotation: u8,
    pub dims: (f64, f64, f64),
    pub supporters: Vec<u64>,
    pub layer: u32,
}

/// Anonymized, replayable slot of a cached container layout.
#[derive(Debug, Clone)]
pub struct PlacementTemplate {
    pub position: (f64, f64, f64),
    pub dims: (f64, f64, f64),
    pub rotation: u8,
    pub layer: u32,
    pub sku_key: SkuKey,
}

/// Full SKU signature. Dimensions and weight are stored as fixed-point
/// (4 decimals) so the key is hashable and ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkuKey {
    pub order_id: String,
    pub sku_id: String,
    pub length_q: i64,
    pub width_q: i64,
    pub height_q: i64,
    pub weight_q: i64,
    pub side_up: bool,
    pub max_stack: i32,
    pub pickup_priority: i64,
    pub grounded: bool,
    pub kind: ItemKind,
    pub send_date_ts: i64,
}

fn q4(v: f64) -> i64 {
    (v * 10_000.0).round() as i64
}

impl SkuKey {
    pub fn of(item: &Item) -> Self {
        Self {
            order_id: item.order_id.clone(),
            sku_id: item.sku_id.clone(),
            length_q: q4(item.length),
            width_q: q4(item.width),
            height_q: q4(item.height),
            weight_q: q4(item.weight),
            side_up: item.side_up,
            max_stack: item.max_stack,
            pickup_priority: item.pickup_priority,
            grounded: item.grounded,
            kind: item.kind,
            send_date_ts: item.send_date_ts,
        }
    }
}

/// Result of a solve: containers that received items, and everything that
/// could not be placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub containers: Vec<Container>,
    pub unused: Vec<Item>,
}

/// Aggregate numbers for reporting a solution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanStats {
    pub containers_used: usize,
    pub items_placed: usize,
    pub items_unused: usize,
    pub total_weight: f64,
}

impl PlanStats {
    pub fn of(solution: &Solution) -> Self {
        let items_placed = solution.containers.iter().map(|c| c.items.len()).sum();
        let total_weight = solution.containers.iter().map(|c| c.total_weight).sum();
        Self {
            containers_used: solution.containers.len(),
            items_placed,
            items_unused: solution.unused.len(),
            total_weight,
        }
    }
}
