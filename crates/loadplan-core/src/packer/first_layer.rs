//! First-layer tiler: lays down a container floor with the highest 2D
//! coverage it can reach, combining a uniform MaxRects attempt with a
//! structured row/column attempt for same-dimension batches.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::SolverConfig;
use crate::model::{Container, DoorKind, Item, SkuKey};
use crate::orientation::{OrientationCache, OrientationMap};
use crate::packer::maxrects::MaxRects2D;

/// One planned floor position. The tiler never mutates the container; the
/// caller validates and commits slots itself.
#[derive(Debug, Clone)]
pub struct FloorSlot {
    pub item_id: u64,
    pub x: f64,
    pub y: f64,
    pub rotation: u8,
    pub dims: (f64, f64, f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum QueueKey {
    /// Pallets queue every unit individually.
    PerItem(u64),
    /// Door containers queue per SKU and base rotation.
    Sku(u8, SkuKey),
}

pub struct FirstLayerPlanner<'a> {
    container: &'a Container,
    cache: &'a OrientationMap,
    item_to_group: &'a HashMap<u64, String>,
    group_sizes: HashMap<u64, usize>,
    config: &'a SolverConfig,
    area: f64,
    eps: f64,
}

impl<'a> FirstLayerPlanner<'a> {
    pub fn new(
        container: &'a Container,
        cache: &'a OrientationMap,
        item_to_group: &'a HashMap<u64, String>,
        group_registry: &HashMap<String, HashSet<u64>>,
        config: &'a SolverConfig,
    ) -> Self {
        let mut group_sizes = HashMap::new();
        for members in group_registry.values() {
            for &id in members {
                group_sizes.insert(id, members.len());
            }
        }
        Self {
            container,
            cache,
            item_to_group,
            group_sizes,
            config,
            area: container.floor_area(),
            eps: config.epsilon,
        }
    }

    /// Plans the floor layer and returns the chosen slots plus the ids they
    /// consume. Picks the denser of the two attempts, breaking ties toward
    /// the layout keeping mass away from the door.
    pub fn plan(&self, items: &[Item]) -> (Vec<FloorSlot>, HashSet<u64>) {
        let candidates = self.select_candidates(items);
        if candidates.is_empty() {
            return (Vec::new(), HashSet::new());
        }

        let attempts = [
            self.attempt_uniform(&candidates),
            self.attempt_mixed(&candidates),
        ];

        let mut best: Vec<FloorSlot> = Vec::new();
        let mut best_metric = (f64::NEG_INFINITY, f64::INFINITY);
        for (slots, utilization, door_metric) in attempts {
            if slots.is_empty() {
                continue;
            }
            let metric = (utilization, -door_metric);
            if metric > best_metric {
                best_metric = metric;
                best = slots;
            }
        }
        let ids = best.iter().map(|s| s.item_id).collect();
        (best, ids)
    }

    fn orientation(&self, item: &Item) -> OrientationCache {
        self.cache
            .get(&item.id)
            .cloned()
            .unwrap_or_else(|| OrientationCache::build(item))
    }

    fn select_candidates<'b>(&self, items: &'b [Item]) -> Vec<&'b Item> {
        let grounded: Vec<&Item> = items.iter().filter(|it| it.grounded).collect();
        let mut non_grounded: Vec<&Item> = items.iter().filter(|it| !it.grounded).collect();
        non_grounded.sort_by(|a, b| {
            b.send_date_ts
                .cmp(&a.send_date_ts)
                .then(b.pickup_priority.cmp(&a.pickup_priority))
                .then(b.weight.total_cmp(&a.weight))
                .then(b.volume().total_cmp(&a.volume()))
                .then(a.id.cmp(&b.id))
        });

        // Door containers with a single priority level seed the floor with
        // the heaviest SKU only.
        if !non_grounded.is_empty() && self.container.door.is_door() {
            let unique: HashSet<i64> = non_grounded.iter().map(|it| it.pickup_priority).collect();
            if unique.len() == 1 {
                let max_w = non_grounded
                    .iter()
                    .map(|it| it.weight)
                    .fold(f64::NEG_INFINITY, f64::max);
                non_grounded.retain(|it| it.weight >= max_w - 1e-6);
            }
        }

        let limit_area = self.area * self.config.floor_area_factor;
        let mut selected: Vec<&Item> = Vec::new();
        let mut area_sum = 0.0;

        for &item in &grounded {
            let cache = self.orientation(item);
            let dims = cache.dims(cache.base_rotation());
            let footprint = dims.0 * dims.1;
            if area_sum + footprint > limit_area {
                continue;
            }
            selected.push(item);
            area_sum += footprint;
        }

        let is_pallet = !self.container.door.is_door();
        let mut queues: HashMap<QueueKey, VecDeque<&Item>> = HashMap::new();
        let mut footprints: HashMap<QueueKey, f64> = HashMap::new();
        let mut key_order: Vec<QueueKey> = Vec::new();
        for item in &non_grounded {
            let in_group = self.item_to_group.contains_key(&item.id)
                && self.group_sizes.get(&item.id).copied().unwrap_or(1) > 1;
            if in_group {
                continue;
            }
            let cache = self.orientation(item);
            let key = if is_pallet {
                QueueKey::PerItem(item.id)
            } else {
                QueueKey::Sku(cache.base_rotation(), SkuKey::of(item))
            };
            if !queues.contains_key(&key) {
                let dims = cache.dims(cache.base_rotation());
                footprints.insert(key.clone(), dims.0 * dims.1);
                key_order.push(key.clone());
            }
            queues.entry(key).or_default().push_back(*item);
        }

        // Largest-footprint SKUs first; ties keep first-seen order.
        key_order.sort_by(|a, b| footprints[b].total_cmp(&footprints[a]));
        let max_candidates = if is_pallet {
            self.config.pallet_floor_candidate_cap
        } else {
            self.config.door_floor_candidate_cap
        };

        // Round-robin draw across SKUs until the area budget or cap is hit.
        let mut added = true;
        while added && selected.len() < max_candidates {
            added = false;
            for key in &key_order {
                let queue = queues.get_mut(key).expect("queue exists for ordered key");
                loop {
                    let Some(&item) = queue.front() else {
                        break;
                    };
                    let cache = self.orientation(item);
                    let dims = cache.dims(cache.base_rotation());
                    let footprint = dims.0 * dims.1;
                    queue.pop_front();
                    if area_sum + footprint > limit_area {
                        continue;
                    }
                    selected.push(item);
                    area_sum += footprint;
                    added = true;
                    break;
                }
                if selected.len() >= max_candidates {
                    break;
                }
            }
        }

        // Backfill with the smallest leftovers that still fit the budget.
        if selected.len() < max_candidates {
            let mut leftovers: Vec<&Item> = Vec::new();
            let mut keys: Vec<&QueueKey> = queues.keys().collect();
            keys.sort();
            for key in keys {
                leftovers.extend(queues[key].iter().copied());
            }
            leftovers.sort_by(|a, b| {
                let fa = {
                    let c = self.orientation(a);
                    let d = c.dims(c.base_rotation());
                    d.0 * d.1
                };
                let fb = {
                    let c = self.orientation(b);
                    let d = c.dims(c.base_rotation());
                    d.0 * d.1
                };
                fa.total_cmp(&fb)
            });
            for item in leftovers {
                let cache = self.orientation(item);
                let dims = cache.dims(cache.base_rotation());
                let fp = dims.0 * dims.1;
                if area_sum + fp > limit_area {
                    continue;
                }
                selected.push(item);
                area_sum += fp;
                if selected.len() >= max_candidates {
                    break;
                }
            }
        }

        selected
    }

    /// Rotations ordered by how well they suit the container: front doors
    /// prefer the deeper (longer-y) footprint, pallets the larger footprint.
    fn ordered_rotations(&self, cache: &OrientationCache) -> Vec<u8> {
        let mut rotations = cache.rotations.clone();
        match self.container.door {
            DoorKind::Front => rotations.sort_by(|&a, &b| {
                let da = cache.dims(a);
                let db = cache.dims(b);
                (da.1 < da.0)
                    .cmp(&(db.1 < db.0))
                    .then(da.0.total_cmp(&db.0))
                    .then(da.1.total_cmp(&db.1))
            }),
            DoorKind::None => rotations.sort_by(|&a, &b| {
                let da = cache.dims(a);
                let db = cache.dims(b);
                (db.0 * db.1)
                    .total_cmp(&(da.0 * da.1))
                    .then(da.2.total_cmp(&db.2))
                    .then(da.0.total_cmp(&db.0))
                    .then(da.1.total_cmp(&db.1))
            }),
        }
        rotations
    }

    fn preferred_rotations(&self, cache: &OrientationCache) -> Vec<u8> {
        let rotations = self.ordered_rotations(cache);
        let primary: Vec<u8> = match self.container.door {
            DoorKind::Front => rotations
                .iter()
                .copied()
                .filter(|&r| {
                    let d = cache.dims(r);
                    d.1 >= d.0 - self.eps
                })
                .collect(),
            DoorKind::None => rotations.clone(),
        };
        let tail: Vec<u8> = rotations
            .iter()
            .copied()
            .filter(|r| !primary.contains(r))
            .collect();
        primary.into_iter().chain(tail).collect()
    }

    fn attempt_uniform(&self, items: &[&Item]) -> (Vec<FloorSlot>, f64, f64) {
        let mut packer = MaxRects2D::new(self.container.width, self.container.length, self.eps);
        let mut slots: Vec<FloorSlot> = Vec::new();
        let mut area_used = 0.0;
        let mut door_metric = 0.0;

        for item in items {
            let cache = self.orientation(item);
            let rotations = self.preferred_rotations(&cache);

            let mut best: Option<(crate::packer::maxrects::Rect2D, u8, (f64, f64, f64))> = None;
            let mut best_score = (f64::INFINITY, f64::INFINITY, f64::INFINITY);
            for rot in rotations {
                let dims = cache.dims(rot);
                let Some(rect) = packer.find_position(dims.0, dims.1, false) else {
                    continue;
                };
                let leftover_h = (rect.w - dims.0).abs();
                let leftover_v = (rect.h - dims.1).abs();
                let wasted = leftover_h * dims.1 + leftover_v * dims.0 - leftover_h * leftover_v;
                let score = (
                    wasted,
                    leftover_h.min(leftover_v),
                    leftover_h.max(leftover_v),
                );
                if score < best_score {
                    best_score = score;
                    best = Some((rect, rot, dims));
                }
            }

            let Some((rect, rot, dims)) = best else {
                continue;
            };
            packer.commit(&rect);
            let slot = FloorSlot {
                item_id: item.id,
                x: rect.x,
                y: rect.y,
                rotation: rot,
                dims,
            };
            area_used += dims.0 * dims.1;
            door_metric += self.door_metric(&slot);
            slots.push(slot);
        }

        let utilization = if self.area > self.eps {
            area_used / self.area
        } else {
            0.0
        };
        (slots, utilization, door_metric)
    }

    fn attempt_mixed(&self, items: &[&Item]) -> (Vec<FloorSlot>, f64, f64) {
        if let Some(first) = items.first() {
            let uniform = items.iter().all(|it| {
                (it.length - first.length).abs() <= self.eps
                    && (it.width - first.width).abs() <= self.eps
                    && (it.height - first.height).abs() <= self.eps
                    && it.side_up == first.side_up
            });
            if uniform {
                if let Some(layout) = self.mixed_row_layout(items) {
                    return layout;
                }
            }
        }

        let mut packer = MaxRects2D::new(self.container.width, self.container.length, self.eps);
        let mut slots: Vec<FloorSlot> = Vec::new();
        let mut area_used = 0.0;
        let mut door_metric = 0.0;

        for item in items {
            let cache = self.orientation(item);
            let rotations = self.preferred_rotations(&cache);

            let mut best: Option<(crate::packer::maxrects::Rect2D, u8, (f64, f64, f64))> = None;
            let mut best_score = (f64::INFINITY, f64::INFINITY, f64::INFINITY);
            for rot in rotations {
                let dims = cache.dims(rot);
                let Some(rect) = packer.find_position(dims.0, dims.1, false) else {
                    continue;
                };

                // Relaxed door-axis preference: a shallow footprint is still
                // admitted when it fits the free rect tightly.
                if self.container.door.is_door() && dims.1 + self.eps < dims.0 {
                    let leftover = (rect.w - dims.0).abs() + (rect.h - dims.1).abs();
                    if leftover > dims.0.min(dims.1) * 0.3 {
                        continue;
                    }
                }

                let leftover_h = (rect.w - dims.0).abs();
                let leftover_v = (rect.h - dims.1).abs();
                let wasted = leftover_h * dims.1 + leftover_v * dims.0 - leftover_h * leftover_v;
                let score = (
                    wasted,
                    leftover_h.min(leftover_v),
                    leftover_h.max(leftover_v),
                );
                if score < best_score {
                    best_score = score;
                    best = Some((rect, rot, dims));
                }
            }

            let Some((rect, rot, dims)) = best else {
                continue;
            };
            packer.commit(&rect);
            let slot = FloorSlot {
                item_id: item.id,
                x: rect.x,
                y: rect.y,
                rotation: rot,
                dims,
            };
            area_used += dims.0 * dims.1;
            door_metric += self.door_metric(&slot);
            slots.push(slot);
        }

        let utilization = if self.area > self.eps {
            area_used / self.area
        } else {
            0.0
        };
        (slots, utilization, door_metric)
    }

    /// Mass-weighted depth toward the door; pallets score 0.
    fn door_metric(&self, slot: &FloorSlot) -> f64 {
        match self.container.door {
            DoorKind::Front => {
                let depth_center = slot.y + slot.dims.1 / 2.0;
                depth_center * slot.dims.0 * slot.dims.1
            }
            DoorKind::None => 0.0,
        }
    }

    /// Deterministic row/column tiling across up to two preferred footprints
    /// of a same-dimension batch. Picks the layout maximizing item count,
    /// then minimum slack.
    fn mixed_row_layout(&self, items: &[&Item]) -> Option<(Vec<FloorSlot>, f64, f64)> {
        let first = items.first()?;
        let cache = self.orientation(first);

        let mut options: Vec<(u8, (f64, f64, f64))> = Vec::new();
        let mut seen: HashSet<(i64, i64)> = HashSet::new();
        for rot in self.preferred_rotations(&cache) {
            let dims = cache.dims(rot);
            let key = (
                (dims.0 * 10_000.0).round() as i64,
                (dims.1 * 10_000.0).round() as i64,
            );
            if seen.insert(key) {
                options.push((rot, dims));
            }
            if options.len() >= 2 {
                break;
            }
        }
        if options.len() < 2 {
            return None;
        }

        let row = self.enumerate_rows(&options);
        let column = self.enumerate_columns(&options);
        let best = match (row, column) {
            (Some(r), Some(c)) => {
                if c.0 > r.0 || (c.0 == r.0 && c.1 < r.1) {
                    (false, c)
                } else {
                    (true, r)
                }
            }
            (Some(r), None) => (true, r),
            (None, Some(c)) => (false, c),
            (None, None) => return None,
        };

        let (is_row, (_total, _slack, configs)) = best;
        let mut items_iter = items.iter();
        let mut slots: Vec<FloorSlot> = Vec::new();
        let mut area_used = 0.0;
        let mut door_metric = 0.0;

        if is_row {
            let mut current_x = 0.0;
            for (rot, dims, count) in configs {
                for c in 0..count {
                    let Some(item) = items_iter.next() else {
                        break;
                    };
                    let y = c as f64 * dims.1;
                    if y + dims.1 > self.container.length + self.eps {
                        continue;
                    }
                    let slot = FloorSlot {
                        item_id: item.id,
                        x: current_x,
                        y,
                        rotation: rot,
                        dims,
                    };
                    area_used += dims.0 * dims.1;
                    door_metric += self.door_metric(&slot);
                    slots.push(slot);
                }
                current_x += dims.0;
            }
        } else {
            let mut current_y = 0.0;
            for (rot, dims, count) in configs {
                for r in 0..count {
                    let Some(item) = items_iter.next() else {
                        break;
                    };
                    let x = r as f64 * dims.0;
                    if x + dims.0 > self.container.width + self.eps {
                        continue;
                    }
                    let slot = FloorSlot {
                        item_id: item.id,
                        x,
                        y: current_y,
                        rotation: rot,
                        dims,
                    };
                    area_used += dims.0 * dims.1;
                    door_metric += self.door_metric(&slot);
                    slots.push(slot);
                }
                current_y += dims.1;
            }
        }

        let utilization = if self.area > self.eps {
            area_used / self.area
        } else {
            0.0
        };
        Some((slots, utilization, door_metric))
    }

    #[allow(clippy::type_complexity)]
    fn enumerate_rows(
        &self,
        options: &[(u8, (f64, f64, f64))],
    ) -> Option<(usize, f64, Vec<(u8, (f64, f64, f64), usize)>)> {
        let width = self.container.width;
        let length = self.container.length;
        let mut best: Option<(usize, f64, Vec<(u8, (f64, f64, f64), usize)>)> = None;

        for order in [[0usize, 1], [1, 0]] {
            let a = options[order[0]];
            let b = options[order[1]];
            let bound_a = (width / a.1 .0) as usize;
            let bound_b = (width / b.1 .0) as usize;
            for rows_a in 0..=bound_a {
                for rows_b in 0..=bound_b {
                    if rows_a == 0 && rows_b == 0 {
                        continue;
                    }
                    let width_used = rows_a as f64 * a.1 .0 + rows_b as f64 * b.1 .0;
                    if width_used > width + self.eps {
                        continue;
                    }
                    let cols_a = if rows_a > 0 {
                        (length / a.1 .1) as usize
                    } else {
                        0
                    };
                    let cols_b = if rows_b > 0 {
                        (length / b.1 .1) as usize
                    } else {
                        0
                    };
                    let total = rows_a * cols_a + rows_b * cols_b;
                    if total == 0 {
                        continue;
                    }
                    let mut slack = (width - width_used) * length;
                    slack += rows_a as f64 * (length - cols_a as f64 * a.1 .1) * a.1 .0;
                    slack += rows_b as f64 * (length - cols_b as f64 * b.1 .1) * b.1 .0;

                    let mut layout = Vec::with_capacity(rows_a + rows_b);
                    layout.extend(std::iter::repeat_n((a.0, a.1, cols_a), rows_a));
                    layout.extend(std::iter::repeat_n((b.0, b.1, cols_b), rows_b));

                    let better = match &best {
                        None => true,
                        Some((bt, bs, _)) => total > *bt || (total == *bt && slack < *bs),
                    };
                    if better {
                        best = Some((total, slack, layout));
                    }
                }
            }
        }
        best
    }

    #[allow(clippy::type_complexity)]
    fn enumerate_columns(
        &self,
        options: &[(u8, (f64, f64, f64))],
    ) -> Option<(usize, f64, Vec<(u8, (f64, f64, f64), usize)>)> {
        let width = self.container.width;
        let length = self.container.length;
        let mut best: Option<(usize, f64, Vec<(u8, (f64, f64, f64), usize)>)> = None;

        for order in [[0usize, 1], [1, 0]] {
            let a = options[order[0]];
            let b = options[order[1]];
            let bound_a = (length / a.1 .1) as usize;
            let bound_b = (length / b.1 .1) as usize;
            for cols_a in 0..=bound_a {
                for cols_b in 0..=bound_b {
                    if cols_a == 0 && cols_b == 0 {
                        continue;
                    }
                    let length_used = cols_a as f64 * a.1 .1 + cols_b as f64 * b.1 .1;
                    if length_used > length + self.eps {
                        continue;
                    }
                    let rows_a = if cols_a > 0 {
                        (width / a.1 .0) as usize
                    } else {
                        0
                    };
                    let rows_b = if cols_b > 0 {
                        (width / b.1 .0) as usize
                    } else {
                        0
                    };
                    let total = cols_a * rows_a + cols_b * rows_b;
                    if total == 0 {
                        continue;
                    }
                    let mut slack = (length - length_used) * width;
                    slack += cols_a as f64 * (width - rows_a as f64 * a.1 .0) * a.1 .1;
                    slack += cols_b as f64 * (width - rows_b as f64 * b.1 .0) * b.1 .1;

                    let mut layout = Vec::with_capacity(cols_a + cols_b);
                    layout.extend(std::iter::repeat_n((a.0, a.1, rows_a), cols_a));
                    layout.extend(std::iter::repeat_n((b.0, b.1, rows_b), cols_b));

                    let better = match &best {
                        None => true,
                        Some((bt, bs, _)) => total > *bt || (total == *bt && slack < *bs),
                    };
                    if better {
                        best = Some((total, slack, layout));
                    }
                }
            }
        }
        best
    }
}
