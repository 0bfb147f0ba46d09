//! Axis-aligned geometry kernel: bounds, collision, candidate generation,
//! priority adjacency and support/stacking checks.
//!
//! Hot loops run over [`PlacedRow`]s, a plain numeric snapshot of a
//! container's placed items built once per placement search. SKU ids are
//! interned to small integers scoped to the snapshot; order ids are compared
//! through a stable hash. No object graph is walked inside a check.

use std::collections::{HashMap, HashSet};

use crate::model::{Container, DoorKind, Item};

/// Inclusive container bounds in world space.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub xmin: f64,
    pub ymin: f64,
    pub zmin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub zmax: f64,
}

impl Bounds {
    pub fn of(container: &Container) -> Self {
        let (ox, oy, oz) = container.origin;
        Self {
            xmin: ox,
            ymin: oy,
            zmin: oz,
            xmax: ox + container.width,
            ymax: oy + container.length,
            zmax: oz + container.height,
        }
    }
}

/// One placed item flattened to the numeric columns the kernel checks need.
#[derive(Debug, Clone, Copy)]
pub struct PlacedRow {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub type_id: i32,
    pub layer: i32,
    pub max_stack: i32,
    pub stack_weight_limit: f64,
    pub must_be_on_top: bool,
    pub weight: f64,
    pub priority: i64,
    pub order_hash: u32,
    pub send_date_ts: i64,
}

/// Maps SKU strings to small integers, consistent within one snapshot.
#[derive(Debug, Default)]
pub struct TypeInterner {
    map: HashMap<String, i32>,
    next: i32,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            next: 1,
        }
    }

    pub fn intern(&mut self, sku_id: &str) -> i32 {
        if let Some(&id) = self.map.get(sku_id) {
            return id;
        }
        let id = self.next;
        self.next += 1;
        self.map.insert(sku_id.to_string(), id);
        id
    }
}

/// Stable 32-bit FNV-1a hash for order-id comparisons inside rows.
pub fn order_hash(order_id: &str) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for b in order_id.as_bytes() {
        h ^= *b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

/// Snapshots a container's placed items into kernel rows. Items without a
/// position (never the case after a commit) are skipped. `top_overrides`
/// can force the must-be-on-top flag for specific item ids.
pub fn placed_rows(
    container: &Container,
    interner: &mut TypeInterner,
    top_overrides: &HashMap<u64, bool>,
) -> Vec<PlacedRow> {
    let mut rows = Vec::with_capacity(container.items.len());
    for item in &container.items {
        let Some((x, y, z)) = item.position else {
            continue;
        };
        let (dx, dy, dz) = item.dims(None);
        rows.push(PlacedRow {
            x,
            y,
            z,
            dx,
            dy,
            dz,
            type_id: interner.intern(&item.sku_id),
            layer: item.layer as i32,
            max_stack: item.max_stack,
            stack_weight_limit: item.stack_weight_limit(),
            must_be_on_top: top_overrides
                .get(&item.id)
                .copied()
                .unwrap_or(item.must_be_on_top),
            weight: item.weight,
            priority: item.pickup_priority,
            order_hash: order_hash(&item.order_id),
            send_date_ts: item.send_date_ts,
        });
    }
    rows
}

/// Box at `(x, y, z)` with extents `(dx, dy, dz)` fits within `bounds`,
/// modulo `eps`.
pub fn fits_in_bounds(
    x: f64,
    y: f64,
    z: f64,
    dx: f64,
    dy: f64,
    dz: f64,
    bounds: &Bounds,
    eps: f64,
) -> bool {
    if x < bounds.xmin - eps || y < bounds.ymin - eps || z < bounds.zmin - eps {
        return false;
    }
    x + dx <= bounds.xmax + eps && y + dy <= bounds.ymax + eps && z + dz <= bounds.zmax + eps
}

/// Two boxes collide iff every axis overlaps by strictly more than `eps`;
/// touching faces do not collide.
pub fn boxes_overlap(
    a_pos: (f64, f64, f64),
    a_dims: (f64, f64, f64),
    b_pos: (f64, f64, f64),
    b_dims: (f64, f64, f64),
    eps: f64,
) -> bool {
    a_pos.0 < b_pos.0 + b_dims.0 - eps
        && a_pos.0 + a_dims.0 > b_pos.0 + eps
        && a_pos.1 < b_pos.1 + b_dims.1 - eps
        && a_pos.1 + a_dims.1 > b_pos.1 + eps
        && a_pos.2 < b_pos.2 + b_dims.2 - eps
        && a_pos.2 + a_dims.2 > b_pos.2 + eps
}

/// Candidate box against every placed row.
pub fn collides_any(
    pos: (f64, f64, f64),
    dims: (f64, f64, f64),
    rows: &[PlacedRow],
    eps: f64,
) -> bool {
    rows.iter().any(|r| {
        boxes_overlap(pos, dims, (r.x, r.y, r.z), (r.dx, r.dy, r.dz), eps)
    })
}

fn grid_key(pos: (f64, f64, f64), grid: f64) -> (i64, i64, i64) {
    (
        (pos.0 / grid).round() as i64,
        (pos.1 / grid).round() as i64,
        (pos.2 / grid).round() as i64,
    )
}

/// Generates candidate placement positions for a box of extents `dims`:
/// the container origin, the three extreme points of every placed row, and
/// three floor projections for elevated rows. Candidates that do not fit the
/// bounds are dropped; the rest are grid-deduplicated and sorted door-aware:
/// front door fills `y` asc, then `z`, then `x`; pallets fill `z` asc, then
/// `y`, then `x`.
pub fn candidate_positions(
    rows: &[PlacedRow],
    dims: (f64, f64, f64),
    bounds: &Bounds,
    eps: f64,
    grid: f64,
    door: DoorKind,
) -> Vec<(f64, f64, f64)> {
    let (dx, dy, dz) = dims;
    let mut positions: Vec<(f64, f64, f64)> = Vec::with_capacity(1 + rows.len() * 6);
    let mut push = |positions: &mut Vec<(f64, f64, f64)>, x: f64, y: f64, z: f64| {
        if fits_in_bounds(x, y, z, dx, dy, dz, bounds, eps) {
            positions.push((x, y, z));
        }
    };

    push(&mut positions, bounds.xmin, bounds.ymin, bounds.zmin);
    for r in rows {
        push(&mut positions, r.x + r.dx, r.y, r.z);
        push(&mut positions, r.x, r.y + r.dy, r.z);
        push(&mut positions, r.x, r.y, r.z + r.dz);
        if r.z > bounds.zmin + eps {
            push(&mut positions, r.x + r.dx, r.y, bounds.zmin);
            push(&mut positions, r.x, r.y + r.dy, bounds.zmin);
        }
        push(&mut positions, r.x + r.dx, r.y + r.dy, bounds.zmin);
    }

    dedup_on_grid(&mut positions, grid);
    sort_by_door_order(&mut positions, door);
    positions
}

/// Extra floor candidates from the cross product of extreme x-edges and
/// y-edges of placed rows. Fills narrow floor gaps the single-axis extreme
/// points miss.
pub fn cross_floor_positions(
    rows: &[PlacedRow],
    dims: (f64, f64, f64),
    bounds: &Bounds,
    eps: f64,
    grid: f64,
) -> Vec<(f64, f64, f64)> {
    if rows.is_empty() {
        return Vec::new();
    }
    let (dx, dy, dz) = dims;
    let mut xs: Vec<f64> = vec![bounds.xmin];
    let mut ys: Vec<f64> = vec![bounds.ymin];
    for r in rows {
        xs.push(r.x + r.dx);
        ys.push(r.y + r.dy);
    }

    let mut results = Vec::new();
    for &x in &xs {
        if x + dx > bounds.xmax + eps {
            continue;
        }
        for &y in &ys {
            if y + dy > bounds.ymax + eps {
                continue;
            }
            if bounds.zmin + dz > bounds.zmax + eps {
                continue;
            }
            results.push((x, y, bounds.zmin));
        }
    }
    dedup_on_grid(&mut results, grid);
    results
}

fn dedup_on_grid(positions: &mut Vec<(f64, f64, f64)>, grid: f64) {
    let mut seen: HashSet<(i64, i64, i64)> = HashSet::with_capacity(positions.len());
    positions.retain(|p| seen.insert(grid_key(*p, grid)));
}

fn sort_by_door_order(positions: &mut [(f64, f64, f64)], door: DoorKind) {
    match door {
        DoorKind::Front => positions.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then(a.2.total_cmp(&b.2))
                .then(a.0.total_cmp(&b.0))
        }),
        DoorKind::None => positions.sort_by(|a, b| {
            a.2.total_cmp(&b.2)
                .then(a.1.total_cmp(&b.1))
                .then(a.0.total_cmp(&b.0))
        }),
    }
}

/// Checks pickup-priority compatibility of a candidate pose.
///
/// Rules 1-3 apply only between items of the same order and send date:
/// 1. Global monotonicity along the door axis: a candidate with priority P
///    may not sit behind any placed item with priority Q > P.
/// 2. Face-adjacent items must differ in priority by at most 1.
/// 3. Touching a Q = P+1 neighbor is only allowed from above or from the
///    door side.
///
/// In door containers, items from different orders must additionally occupy
/// disjoint intervals along the door axis, with the more urgent order
/// (earlier send date, then lower priority) on the door side of a touching
/// boundary.
#[allow(clippy::too_many_arguments)]
pub fn check_priority_adjacency(
    pos: (f64, f64, f64),
    dims: (f64, f64, f64),
    priority: i64,
    order: u32,
    send_date_ts: i64,
    rows: &[PlacedRow],
    eps: f64,
    door: DoorKind,
) -> bool {
    let (x, y, z) = pos;
    let (dx, dy, dz) = dims;
    let has_door = door.is_door();
    // Door axis is y under front-door semantics.
    let c_start = y;
    let c_end = y + dy;

    if has_door {
        for r in rows {
            if r.order_hash == order {
                continue;
            }
            let p_start = r.y;
            let p_end = r.y + r.dy;

            // Different orders may not overlap along the door axis.
            if c_start < p_end - eps && c_end > p_start + eps {
                return false;
            }

            let candidate_in_front = c_start >= p_end - eps;
            let candidate_behind = c_end <= p_start + eps;
            if candidate_in_front || candidate_behind {
                let more_urgent;
                let less_urgent;
                if send_date_ts < r.send_date_ts {
                    more_urgent = true;
                    less_urgent = false;
                } else if send_date_ts > r.send_date_ts {
                    more_urgent = false;
                    less_urgent = true;
                } else {
                    more_urgent = priority < r.priority;
                    less_urgent = priority > r.priority;
                }
                if more_urgent && candidate_behind {
                    return false;
                }
                if less_urgent && candidate_in_front {
                    return false;
                }
            }
        }
    }

    // Global monotonicity toward the door, same order and send date only.
    if has_door {
        for r in rows {
            if r.order_hash != order || r.send_date_ts != send_date_ts {
                continue;
            }
            if r.priority > priority && y < r.y - eps {
                return false;
            }
        }
    }

    // Adjacency class and direction checks, same order and send date only.
    for r in rows {
        if r.order_hash != order || r.send_date_ts != send_date_ts {
            continue;
        }

        let x_overlap = x < r.x + r.dx + eps && x + dx > r.x - eps;
        let y_overlap = y < r.y + r.dy + eps && y + dy > r.y - eps;
        let z_overlap = z < r.z + r.dz + eps && z + dz > r.z - eps;

        let x_touch_right = (x - (r.x + r.dx)).abs() < eps;
        let x_touch_left = ((x + dx) - r.x).abs() < eps;
        let x_touch = x_touch_right || x_touch_left;

        let y_touch_front = (y - (r.y + r.dy)).abs() < eps;
        let y_touch_back = ((y + dy) - r.y).abs() < eps;
        let y_touch = y_touch_front || y_touch_back;

        let z_touch_top = (z - (r.z + r.dz)).abs() < eps;
        let z_touch_bottom = ((z + dz) - r.z).abs() < eps;
        let z_touch = z_touch_top || z_touch_bottom;

        let is_adjacent = (x_touch && y_overlap && z_overlap)
            || (y_touch && x_overlap && z_overlap)
            || (z_touch && x_overlap && y_overlap);

        if !is_adjacent {
            continue;
        }

        if r.priority != priority && r.priority != priority + 1 {
            return false;
        }

        if r.priority == priority + 1 {
            let above = z_touch_top && x_overlap && y_overlap;
            let valid = if has_door {
                above || (y_touch_front && x_overlap && z_overlap)
            } else {
                above
                    || (x_touch && y_overlap && z_overlap)
                    || (y_touch && x_overlap && z_overlap)
            };
            if !valid {
                return false;
            }
        }
    }

    true
}

/// Validates support and stacking for a candidate pose and computes the
/// same-SKU layer it would occupy.
///
/// Scans supporters whose top touches the candidate's bottom plane and whose
/// footprint overlaps it:
/// - a `must_be_on_top` supporter or a `max_stack == 1` supporter rejects,
/// - in door containers an earlier-dispatched order may not stack on a
///   later-dispatched one,
/// - a different-SKU supporter rejects when the candidate's weight exceeds
///   its stack weight limit.
///
/// Floor poses are implicitly fully supported; elevated poses require
/// `support_ratio` of the footprint covered. Returns `Some(new_layer)` on
/// success.
#[allow(clippy::too_many_arguments)]
pub fn check_support_and_stacking(
    pos: (f64, f64, f64),
    dims: (f64, f64, f64),
    type_id: i32,
    weight: f64,
    max_stack: i32,
    order: u32,
    send_date_ts: i64,
    rows: &[PlacedRow],
    enforce_order_stacking: bool,
    eps: f64,
    support_ratio: f64,
    floor_z: f64,
) -> Option<u32> {
    let (x, y, z) = pos;
    let (dx, dy, _) = dims;

    let mut support_area = 0.0;
    let mut same_type_max_layer_below: i32 = 0;

    if z - floor_z < eps {
        support_area = dx * dy;
    } else {
        for r in rows {
            if ((r.z + r.dz) - z).abs() >= eps {
                continue;
            }
            let overlap_x = (x + dx).min(r.x + r.dx) - x.max(r.x);
            if overlap_x <= 0.0 {
                continue;
            }
            let overlap_y = (y + dy).min(r.y + r.dy) - y.max(r.y);
            if overlap_y <= 0.0 {
                continue;
            }

            if r.must_be_on_top {
                return None;
            }
            if r.max_stack == 1 {
                return None;
            }
            if enforce_order_stacking && r.order_hash != order && send_date_ts < r.send_date_ts {
                return None;
            }
            if r.type_id != type_id && weight > r.stack_weight_limit + eps {
                return None;
            }

            support_area += overlap_x * overlap_y;
            if r.type_id == type_id && r.layer > same_type_max_layer_below {
                same_type_max_layer_below = r.layer;
            }
        }
    }

    if support_area < dx * dy * support_ratio {
        return None;
    }

    let new_layer = same_type_max_layer_below + 1;
    if max_stack != -1 && new_layer > max_stack {
        return None;
    }

    Some(new_layer as u32)
}

/// Ids of placed items whose top surface carries the given pose.
pub fn supporters_of(
    container: &Container,
    x: f64,
    y: f64,
    z: f64,
    dims: (f64, f64, f64),
    eps: f64,
) -> Vec<u64> {
    let mut out = Vec::new();
    if z - container.origin.2 < eps {
        return out;
    }
    let (dx, dy, _) = dims;
    for placed in &container.items {
        let Some((px, py, pz)) = placed.position else {
            continue;
        };
        let pd = placed.dims(None);
        if ((pz + pd.2) - z).abs() > eps {
            continue;
        }
        if x < px + pd.0 + eps && x + dx > px - eps && y < py + pd.1 + eps && y + dy > py - eps {
            out.push(placed.id);
        }
    }
    out
}

/// Any pair of placed items with positive-volume overlap.
pub fn has_overlaps(items: &[Item], eps: f64) -> bool {
    for i in 0..items.len() {
        let a = &items[i];
        let ap = a.position.unwrap_or((0.0, 0.0, 0.0));
        let ad = a.dims(None);
        for b in items.iter().skip(i + 1) {
            let bp = b.position.unwrap_or((0.0, 0.0, 0.0));
            let bd = b.dims(None);
            if boxes_overlap(ap, ad, bp, bd, eps) {
                return true;
            }
        }
    }
    false
}
