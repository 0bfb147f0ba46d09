//! Packer for door-less pallets. Single-SKU batches go through a centered
//! column or the first-layer tiler with layer replay; mixed-SKU batches
//! build a dense plateau and sweep the rest through the BLF placer.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::config::SolverConfig;
use crate::geometry::{
    check_support_and_stacking, collides_any, fits_in_bounds, order_hash, placed_rows,
    supporters_of, Bounds, TypeInterner,
};
use crate::model::{Container, Item, Placement};
use crate::orientation::{OrientationCache, OrientationMap};
use crate::packer::blf::BottomLeftFill;
use crate::packer::first_layer::{FirstLayerPlanner, FloorSlot};
use crate::packer::maxrects::{MaxRects2D, Rect2D};
use crate::packer::{map_item_groups, Packer};

pub struct PalletPacker<'a> {
    container: &'a mut Container,
    cache: &'a OrientationMap,
    must_be_on_top: &'a HashMap<u64, bool>,
    co_loc_groups: &'a HashMap<String, HashSet<u64>>,
    item_to_group: HashMap<u64, String>,
    placements: Vec<Placement>,
    priority_set: BTreeSet<i64>,
    config: &'a SolverConfig,
    eps: f64,
}

impl<'a> PalletPacker<'a> {
    pub fn new(
        container: &'a mut Container,
        cache: &'a OrientationMap,
        must_be_on_top: &'a HashMap<u64, bool>,
        co_loc_groups: &'a HashMap<String, HashSet<u64>>,
        config: &'a SolverConfig,
    ) -> Self {
        let item_to_group = map_item_groups(co_loc_groups);
        let priority_set = container
            .items
            .iter()
            .map(|it| it.pickup_priority)
            .collect();
        let eps = config.epsilon;
        Self {
            container,
            cache,
            must_be_on_top,
            co_loc_groups,
            item_to_group,
            placements: Vec::new(),
            priority_set,
            config,
            eps,
        }
    }

    fn orientation(&self, item: &Item) -> OrientationCache {
        self.cache
            .get(&item.id)
            .cloned()
            .unwrap_or_else(|| OrientationCache::build(item))
    }

    /// A pallet only carries priorities spanning one adjacent pair {p, p+1}.
    fn priority_allowed_on_pallet(&self, priority: i64) -> bool {
        if self.priority_set.is_empty() {
            return true;
        }
        self.priority_set
            .iter()
            .all(|&p| p == priority || p == priority + 1)
    }

    fn check_priority_rules(
        &self,
        item: &Item,
        x: f64,
        y: f64,
        z: f64,
        dims: (f64, f64, f64),
    ) -> bool {
        let priority = item.pickup_priority;
        if !self.priority_allowed_on_pallet(priority) {
            return false;
        }

        if z - self.container.origin.2 > self.eps {
            let supporter_ids = supporters_of(self.container, x, y, z, dims, self.eps);
            for placed in &self.container.items {
                if supporter_ids.contains(&placed.id)
                    && placed.pickup_priority != priority
                    && placed.pickup_priority != priority + 1
                {
                    return false;
                }
            }
        }
        true
    }

    fn validate_placement(
        &self,
        item: &Item,
        x: f64,
        y: f64,
        z: f64,
        dims: (f64, f64, f64),
    ) -> bool {
        let bounds = Bounds::of(self.container);
        if !fits_in_bounds(x, y, z, dims.0, dims.1, dims.2, &bounds, self.eps) {
            return false;
        }

        let mut interner = TypeInterner::new();
        let candidate_type = interner.intern(&item.sku_id);
        let rows = placed_rows(self.container, &mut interner, self.must_be_on_top);

        if collides_any((x, y, z), dims, &rows, self.eps) {
            return false;
        }
        if item.grounded && z - bounds.zmin > self.eps {
            return false;
        }
        if check_support_and_stacking(
            (x, y, z),
            dims,
            candidate_type,
            item.weight,
            item.max_stack,
            order_hash(&item.order_id),
            item.send_date_ts,
            &rows,
            false,
            self.eps,
            self.config.support_ratio,
            bounds.zmin,
        )
        .is_none()
        {
            return false;
        }
        if self.container.total_weight + item.weight > self.container.max_weight + self.eps {
            return false;
        }
        self.check_priority_rules(item, x, y, z, dims)
    }

    fn commit_placement(&mut self, mut item: Item, x: f64, y: f64, z: f64, rotation: u8, layer: u32) {
        item.position = Some((x, y, z));
        item.rotation = rotation;
        item.layer = layer;

        self.priority_set.insert(item.pickup_priority);
        self.container.total_weight += item.weight;
        let dims = item.dims(None);
        let id = item.id;
        self.container.items.push(item);
        let supporters = supporters_of(self.container, x, y, z, dims, self.eps);
        self.placements.push(Placement {
            item_id: id,
            x,
            y,
            z,
            rotation,
            dims,
            supporters,
            layer,
        });
    }

    fn sort_for_pack(items: &mut [Item]) {
        items.sort_by(|a, b| {
            b.send_date_ts
                .cmp(&a.send_date_ts)
                .then(b.pickup_priority.cmp(&a.pickup_priority))
                .then(b.weight.total_cmp(&a.weight))
                .then(b.volume().total_cmp(&a.volume()))
                .then(a.id.cmp(&b.id))
        });
    }

    // ---- single SKU -----------------------------------------------------

    /// Best rotation for a lone centered column: the largest footprint that
    /// fits the pallet, together with the column's layer capacity.
    fn direct_column_plan(&self, item: &Item) -> Option<(u8, (f64, f64, f64), u64)> {
        let cache = self.orientation(item);
        let mut best: Option<(u8, (f64, f64, f64))> = None;
        let mut best_footprint = 0.0;
        for &rot in &cache.rotations {
            let dims = cache.dims(rot);
            if dims.0 <= self.container.width + self.eps
                && dims.1 <= self.container.length + self.eps
                && dims.2 <= self.container.height + self.eps
            {
                let footprint = dims.0 * dims.1;
                if footprint > best_footprint {
                    best_footprint = footprint;
                    best = Some((rot, dims));
                }
            }
        }
        let (rot, dims) = best?;

        let by_stack = item.stack_limit();
        let by_height = if dims.2 > 0.0 {
            (self.container.height / dims.2) as i64
        } else {
            1
        };
        let by_weight = if self.container.max_weight > 0.0 && item.weight > 0.0 {
            (self.container.max_weight / item.weight) as i64
        } else {
            10_000
        };
        let msw = item.stack_weight_limit();
        let by_item_weight = if msw.is_finite() && msw > 0.0 && item.weight > 0.0 {
            (msw / item.weight) as i64 + 1
        } else {
            10_000
        };
        let by_flags = if item.grounded { 1 } else { 10_000 };

        let capacity = by_stack
            .min(by_height)
            .min(by_weight)
            .min(by_item_weight)
            .min(by_flags)
            .max(0);
        Some((rot, dims, capacity as u64))
    }

    fn pack_single_sku(&mut self, items: Vec<Item>) -> Vec<Item> {
        let Some(first) = items.first() else {
            return items;
        };
        if !self.priority_allowed_on_pallet(first.pickup_priority) {
            return items;
        }

        // Small batches that fit one column go straight to the centered
        // column; everything else is tiled layer by layer.
        let column = self.direct_column_plan(first);
        let column_capacity = column.map(|(_, _, cap)| cap).unwrap_or(0);
        if items.len() <= 1 || items.len() as u64 <= column_capacity {
            return self.pack_centered_direct(items);
        }

        let (slots, _ids) = {
            let planner = FirstLayerPlanner::new(
                self.container,
                self.cache,
                &self.item_to_group,
                self.co_loc_groups,
                self.config,
            );
            planner.plan(&items)
        };
        if slots.is_empty() {
            debug!("first-layer tiler produced no slots, using direct centered placement");
            return self.pack_centered_direct(items);
        }

        let boxes_per_layer = slots.len();
        let layer_height = slots[0].dims.2;

        let by_stack = first.stack_limit();
        let by_height = if layer_height > 0.0 {
            (self.container.height / layer_height) as i64
        } else {
            1
        };
        let layer_weight = boxes_per_layer as f64 * first.weight;
        let by_weight = if self.container.max_weight > 0.0 && layer_weight > 0.0 {
            (self.container.max_weight / layer_weight) as i64
        } else {
            10_000
        };
        let msw = first.stack_weight_limit();
        let by_item_weight = if msw.is_finite() && msw > 0.0 && first.weight > 0.0 {
            (msw / first.weight) as i64 + 1
        } else {
            10_000
        };
        let by_flags = if first.grounded { 1 } else { 10_000 };
        let max_layers = by_stack
            .min(by_height)
            .min(by_weight)
            .min(by_item_weight)
            .min(by_flags)
            .max(0) as usize;

        let coverage = slots.iter().map(|s| s.dims.0 * s.dims.1).sum::<f64>()
            / self.container.floor_area().max(self.eps);

        if boxes_per_layer == 1 || coverage < self.config.centered_coverage_threshold {
            debug!(coverage, "sparse floor layer, re-centering the tiled block");
            let centered = self.centered_slots(&slots);
            self.replay_layers(items, &centered, layer_height, max_layers)
        } else {
            self.replay_layers(items, &slots, layer_height, max_layers)
        }
    }

    /// Offsets the tiled block so its centroid coincides with the pallet
    /// centroid, clamped into bounds.
    fn centered_slots(&self, slots: &[FloorSlot]) -> Vec<FloorSlot> {
        let min_x = slots.iter().map(|s| s.x).fold(f64::INFINITY, f64::min);
        let max_x = slots
            .iter()
            .map(|s| s.x + s.dims.0)
            .fold(f64::NEG_INFINITY, f64::max);
        let min_y = slots.iter().map(|s| s.y).fold(f64::INFINITY, f64::min);
        let max_y = slots
            .iter()
            .map(|s| s.y + s.dims.1)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut offset_x = self.container.width / 2.0 - (min_x + max_x) / 2.0;
        let mut offset_y = self.container.length / 2.0 - (min_y + max_y) / 2.0;

        if min_x + offset_x < 0.0 {
            offset_x -= min_x + offset_x;
        } else if max_x + offset_x > self.container.width {
            offset_x -= max_x + offset_x - self.container.width;
        }
        if min_y + offset_y < 0.0 {
            offset_y -= min_y + offset_y;
        } else if max_y + offset_y > self.container.length {
            offset_y -= max_y + offset_y - self.container.length;
        }

        slots
            .iter()
            .map(|s| FloorSlot {
                item_id: s.item_id,
                x: s.x + offset_x,
                y: s.y + offset_y,
                rotation: s.rotation,
                dims: s.dims,
            })
            .collect()
    }

    /// Replays the tiled layer upward, one layer at a time, until items,
    /// layers or headroom run out.
    fn replay_layers(
        &mut self,
        items: Vec<Item>,
        slots: &[FloorSlot],
        layer_height: f64,
        max_layers: usize,
    ) -> Vec<Item> {
        let (ox, oy, oz) = self.container.origin;
        let mut placed_ids: HashSet<u64> = HashSet::new();
        let mut item_index = 0usize;
        let mut current_z = 0.0;

        for layer_index in 0..max_layers {
            if item_index >= items.len() {
                break;
            }
            if current_z + layer_height > self.container.height + self.eps {
                break;
            }

            let mut layer_placed = 0;
            for slot in slots {
                if item_index >= items.len() {
                    break;
                }
                let item = &items[item_index];
                if !self.validate_placement(
                    item,
                    ox + slot.x,
                    oy + slot.y,
                    oz + current_z,
                    slot.dims,
                ) {
                    item_index += 1;
                    continue;
                }
                self.commit_placement(
                    item.clone(),
                    ox + slot.x,
                    oy + slot.y,
                    oz + current_z,
                    slot.rotation,
                    layer_index as u32 + 1,
                );
                placed_ids.insert(item.id);
                item_index += 1;
                layer_placed += 1;
            }

            if layer_placed == 0 {
                break;
            }
            current_z += layer_height;
        }

        items
            .into_iter()
            .filter(|it| !placed_ids.contains(&it.id))
            .collect()
    }

    /// Stacks a small batch as one column centered on the pallet.
    fn pack_centered_direct(&mut self, items: Vec<Item>) -> Vec<Item> {
        let Some(first) = items.first() else {
            return items;
        };
        let Some((rot, dims, capacity)) = self.direct_column_plan(first) else {
            return items;
        };

        let (ox, oy, oz) = self.container.origin;
        let center_x = ox + ((self.container.width - dims.0) / 2.0).max(0.0);
        let center_y = oy + ((self.container.length - dims.1) / 2.0).max(0.0);
        let max_layers = (capacity as usize).min(items.len());

        let mut placed_ids: HashSet<u64> = HashSet::new();
        let mut current_z = 0.0;
        let mut item_index = 0usize;

        for layer_index in 0..max_layers {
            if item_index >= items.len() {
                break;
            }
            if current_z + dims.2 > self.container.height + self.eps {
                break;
            }
            if self.container.total_weight + first.weight > self.container.max_weight + self.eps {
                break;
            }

            let item = &items[item_index];
            // The floor of an empty pallet only needs a bounds check; any
            // other pose goes through full validation.
            let can_place = if current_z > self.eps || !self.container.items.is_empty() {
                self.validate_placement(item, center_x, center_y, oz + current_z, dims)
            } else {
                let bounds = Bounds::of(self.container);
                fits_in_bounds(
                    center_x,
                    center_y,
                    oz + current_z,
                    dims.0,
                    dims.1,
                    dims.2,
                    &bounds,
                    self.eps,
                )
            };
            if !can_place {
                item_index += 1;
                continue;
            }

            self.commit_placement(
                item.clone(),
                center_x,
                center_y,
                oz + current_z,
                rot,
                layer_index as u32 + 1,
            );
            placed_ids.insert(item.id);
            item_index += 1;
            current_z += dims.2;
        }

        items
            .into_iter()
            .filter(|it| !placed_ids.contains(&it.id))
            .collect()
    }

    // ---- mixed SKU ------------------------------------------------------

    fn pack_mixed_sku(&mut self, items: Vec<Item>) -> Vec<Item> {
        if items.is_empty() {
            return items;
        }

        let mut sorted_items = items;
        sorted_items.sort_by(|a, b| b.final_rank.cmp(&a.final_rank));

        // Dense plateau build first on a fresh pallet, then a per-item BLF
        // sweep over whatever it left behind.
        let remaining = if self.container.items.is_empty() {
            self.pack_plateau_first(sorted_items)
        } else {
            sorted_items
        };

        let mut unused: Vec<Item> = Vec::new();
        let mut placed_ids: HashSet<u64> = self.container.items.iter().map(|it| it.id).collect();

        for item in remaining {
            if placed_ids.contains(&item.id) {
                continue;
            }
            if !self.priority_allowed_on_pallet(item.pickup_priority) {
                unused.push(item);
                continue;
            }
            if self.container.total_weight + item.weight > self.container.max_weight + self.eps {
                unused.push(item);
                continue;
            }

            let best = BottomLeftFill::new(self.container, self.config, self.must_be_on_top)
                .find_best_position(&item, None);
            let Some(placement) = best else {
                unused.push(item);
                continue;
            };

            let dims = item.dims(Some(placement.rotation));
            if !self.validate_placement(&item, placement.x, placement.y, placement.z, dims) {
                unused.push(item);
                continue;
            }

            placed_ids.insert(item.id);
            self.commit_placement(
                item,
                placement.x,
                placement.y,
                placement.z,
                placement.rotation,
                placement.layer,
            );
        }

        let removed = self.cleanup_overlaps_and_duplicates();
        if !removed.is_empty() {
            let removed_ids: HashSet<u64> = removed.iter().map(|it| it.id).collect();
            self.placements.retain(|p| !removed_ids.contains(&p.item_id));
            let mut known: HashSet<u64> = unused.iter().map(|it| it.id).collect();
            for item in removed {
                if known.insert(item.id) {
                    unused.push(item.unplaced_clone());
                }
            }
        }
        unused
    }

    /// Distance from a floor-relative position's center to the pallet center.
    fn center_distance(&self, x: f64, y: f64, dims: (f64, f64, f64)) -> f64 {
        let cx = x + dims.0 / 2.0 - self.container.width / 2.0;
        let cy = y + dims.1 / 2.0 - self.container.length / 2.0;
        (cx * cx + cy * cy).sqrt()
    }

    /// Dense floor via several MaxRects sorting strategies, then up to five
    /// BLF upper-layer passes. Returns the items it could not place.
    fn pack_plateau_first(&mut self, items: Vec<Item>) -> Vec<Item> {
        if items.is_empty() {
            return items;
        }

        let unique_sku_count = items
            .iter()
            .map(|it| it.sku_id.as_str())
            .collect::<HashSet<&str>>()
            .len();
        let mut sorted_items = items;
        if unique_sku_count > 1 {
            sorted_items.sort_by(|a, b| {
                (b.width * b.length)
                    .total_cmp(&(a.width * a.length))
                    .then(b.weight.total_cmp(&a.weight))
                    .then(b.volume().total_cmp(&a.volume()))
                    .then(b.final_rank.cmp(&a.final_rank))
                    .then(a.id.cmp(&b.id))
            });
        } else {
            sorted_items.sort_by(|a, b| {
                b.weight
                    .total_cmp(&a.weight)
                    .then(b.volume().total_cmp(&a.volume()))
                    .then(b.final_rank.cmp(&a.final_rank))
                    .then(a.id.cmp(&b.id))
            });
        }

        let mut placed_ids: HashSet<u64> = HashSet::new();
        let mut remaining = sorted_items;

        // Floor layer: try the base ordering, plus two alternatives for
        // multi-SKU batches, keeping the densest result.
        let floor_candidates: Vec<Item> = {
            let grounded: Vec<Item> = remaining.iter().filter(|it| it.grounded).cloned().collect();
            let non_grounded: Vec<Item> =
                remaining.iter().filter(|it| !it.grounded).cloned().collect();
            grounded.into_iter().chain(non_grounded).collect()
        };

        if !floor_candidates.is_empty() {
            let mut orderings: Vec<Vec<Item>> = vec![floor_candidates.clone()];
            if unique_sku_count > 1 {
                let mut by_footprint_desc = floor_candidates.clone();
                by_footprint_desc.sort_by(|a, b| {
                    (b.width * b.length)
                        .total_cmp(&(a.width * a.length))
                        .then(b.final_rank.cmp(&a.final_rank))
                        .then(a.id.cmp(&b.id))
                });
                let mut by_footprint_asc = floor_candidates.clone();
                by_footprint_asc.sort_by(|a, b| {
                    (a.width * a.length)
                        .total_cmp(&(b.width * b.length))
                        .then(b.final_rank.cmp(&a.final_rank))
                        .then(a.id.cmp(&b.id))
                });
                orderings.push(by_footprint_desc);
                orderings.push(by_footprint_asc);
            }

            // Score every ordering on the live pallet and roll each back;
            // the builder is deterministic, so the winner can be rebuilt.
            let mut best_idx = 0usize;
            let mut best_coverage = f64::NEG_INFINITY;
            for (idx, ordering) in orderings.iter().enumerate() {
                let (ids, coverage) = self.build_dense_layer(ordering, 0.0);
                if coverage > best_coverage {
                    best_coverage = coverage;
                    best_idx = idx;
                }
                self.rollback_items(&ids);
            }
            let (floor_ids, _) = self.build_dense_layer(&orderings[best_idx], 0.0);
            placed_ids.extend(floor_ids.iter().copied());
            remaining.retain(|it| !placed_ids.contains(&it.id));
        }

        for _pass in 0..5 {
            let upper_candidates: Vec<Item> = remaining
                .iter()
                .filter(|it| !it.grounded && !placed_ids.contains(&it.id))
                .cloned()
                .collect();
            if upper_candidates.is_empty() {
                break;
            }
            let (layer_ids, _) = self.build_dense_layer(&upper_candidates, 1.0);
            if layer_ids.is_empty() {
                break;
            }
            placed_ids.extend(layer_ids.iter().copied());
            remaining.retain(|it| !placed_ids.contains(&it.id));
        }

        remaining
    }

    /// Removes previously committed items (weight rolled back) so an
    /// alternative floor ordering can be tried.
    fn rollback_items(&mut self, ids: &HashSet<u64>) {
        if ids.is_empty() {
            return;
        }
        let mut removed_weight = 0.0;
        self.container.items.retain(|it| {
            if ids.contains(&it.id) {
                removed_weight += it.weight;
                false
            } else {
                true
            }
        });
        self.container.total_weight -= removed_weight;
        self.placements.retain(|p| !ids.contains(&p.item_id));
    }

    /// Builds one layer. On the floor a MaxRects free-list drives positions
    /// (heavy items pulled toward the pallet center); above the floor each
    /// candidate goes through the BLF placer. Returns the placed ids and the
    /// covered area.
    fn build_dense_layer(&mut self, candidates: &[Item], layer_z: f64) -> (HashSet<u64>, f64) {
        let mut placed_ids: HashSet<u64> = HashSet::new();
        let mut covered = 0.0;
        let is_floor = layer_z < self.eps;
        let unique_skus: HashSet<&str> = candidates.iter().map(|it| it.sku_id.as_str()).collect();

        let weight_threshold = if unique_skus.len() > 1 && !candidates.is_empty() {
            let mut weights: Vec<f64> = candidates.iter().map(|it| it.weight).collect();
            weights.sort_by(|a, b| b.total_cmp(a));
            weights[(weights.len() - 1).min((weights.len() as f64 * 0.3) as usize)]
        } else {
            0.0
        };

        let mut floor_packer = if is_floor {
            Some(MaxRects2D::new(
                self.container.width,
                self.container.length,
                self.eps,
            ))
        } else {
            None
        };

        for item in candidates {
            if placed_ids.contains(&item.id) || self.container.items.iter().any(|p| p.id == item.id)
            {
                continue;
            }
            if self.container.total_weight + item.weight > self.container.max_weight + self.eps {
                continue;
            }
            if !self.priority_allowed_on_pallet(item.pickup_priority) {
                continue;
            }

            let cache = self.orientation(item);
            let (ox, oy, oz) = self.container.origin;
            let mut best: Option<(f64, f64, f64, u8, (f64, f64, f64))> = None;
            let mut best_score: Option<(f64, f64, f64, f64)> = None;

            if let Some(packer) = floor_packer.as_mut() {
                for &rot in &cache.rotations {
                    let dims = cache.dims(rot);
                    if dims.2 > self.container.height + self.eps {
                        continue;
                    }

                    let heavy = unique_skus.len() > 1 && item.weight >= weight_threshold;
                    let rect = if heavy {
                        self.find_center_position(packer, dims.0, dims.1)
                            .or_else(|| packer.find_position(dims.0, dims.1, false))
                    } else {
                        packer.find_position(dims.0, dims.1, false)
                    };
                    let Some(rect) = rect else {
                        continue;
                    };

                    if !self.validate_placement(item, ox + rect.x, oy + rect.y, oz, dims) {
                        continue;
                    }

                    let score = if heavy {
                        (0.0, self.center_distance(rect.x, rect.y, dims), rect.y, rect.x)
                    } else {
                        (0.0, rect.y, rect.x, 0.0)
                    };
                    if best_score.is_none_or(|s| score < s) {
                        best_score = Some(score);
                        best = Some((ox + rect.x, oy + rect.y, oz, rot, dims));
                    }
                }
            } else {
                let found = BottomLeftFill::new(self.container, self.config, self.must_be_on_top)
                    .find_best_position(item, None);
                if let Some(p) = found {
                    let dims = item.dims(Some(p.rotation));
                    if self.validate_placement(item, p.x, p.y, p.z, dims) {
                        best = Some((p.x, p.y, p.z, p.rotation, dims));
                    }
                }
            }

            let Some((x, y, z, rot, dims)) = best else {
                continue;
            };
            if let Some(packer) = floor_packer.as_mut() {
                packer.commit(&Rect2D::new(x - ox, y - oy, dims.0, dims.1));
            }
            let layer = self.z_level_index(z);
            self.commit_placement(item.clone(), x, y, z, rot, layer);
            placed_ids.insert(item.id);
            covered += dims.0 * dims.1;
        }

        (placed_ids, covered)
    }

    /// Clamps the ideal centered position into each free rect and keeps the
    /// candidate closest to the pallet center.
    fn find_center_position(&self, packer: &MaxRects2D, w: f64, h: f64) -> Option<Rect2D> {
        let center_x = self.container.width / 2.0;
        let center_y = self.container.length / 2.0;
        let mut best: Option<Rect2D> = None;
        let mut best_dist = f64::INFINITY;

        for free in packer.free_rects() {
            if w <= free.w + self.eps && h <= free.h + self.eps {
                let x = free.x.max((center_x - w / 2.0).min(free.x + free.w - w));
                let y = free.y.max((center_y - h / 2.0).min(free.y + free.h - h));
                let dist = self.center_distance(x, y, (w, h, 0.0));
                if dist < best_dist {
                    best_dist = dist;
                    best = Some(Rect2D::new(x, y, w, h));
                }
            }
            if h <= free.w + self.eps && w <= free.h + self.eps {
                let x = free.x.max((center_x - h / 2.0).min(free.x + free.w - h));
                let y = free.y.max((center_y - w / 2.0).min(free.y + free.h - w));
                let dist = self.center_distance(x, y, (h, w, 0.0)) + 0.01;
                if dist < best_dist {
                    best_dist = dist;
                    best = Some(Rect2D {
                        x,
                        y,
                        w: h,
                        h: w,
                        rotated: true,
                    });
                }
            }
        }
        best
    }

    /// 1-indexed position of `z` among the distinct occupied z levels.
    fn z_level_index(&self, z: f64) -> u32 {
        if z - self.container.origin.2 < self.eps {
            return 1;
        }
        let mut levels: BTreeSet<i64> = self
            .container
            .items
            .iter()
            .filter_map(|it| it.position.map(|(_, _, pz)| (pz * 1000.0).round() as i64))
            .collect();
        levels.insert((z * 1000.0).round() as i64);
        let key = (z * 1000.0).round() as i64;
        levels
            .iter()
            .position(|&l| l == key)
            .map(|i| i as u32 + 1)
            .unwrap_or(levels.len() as u32 + 1)
    }

    /// Defensive post-pass: drops duplicate ids and items whose final state
    /// overlaps an earlier item, rolling back their weight. Returns the
    /// removed items.
    fn cleanup_overlaps_and_duplicates(&mut self) -> Vec<Item> {
        let mut cleaned: Vec<Item> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();
        let mut removed: Vec<Item> = Vec::new();

        for item in self.container.items.clone() {
            if seen.contains(&item.id) {
                self.container.total_weight -= item.weight;
                removed.push(item);
                continue;
            }

            let pos = item.position.unwrap_or((0.0, 0.0, 0.0));
            let dims = item.dims(None);
            let overlaps = cleaned.iter().any(|placed| {
                let pp = placed.position.unwrap_or((0.0, 0.0, 0.0));
                crate::geometry::boxes_overlap(pos, dims, pp, placed.dims(None), self.eps)
            });
            if overlaps {
                self.container.total_weight -= item.weight;
                removed.push(item);
                continue;
            }

            seen.insert(item.id);
            cleaned.push(item);
        }

        if !removed.is_empty() {
            debug!(count = removed.len(), "removed overlapping or duplicate pallet items");
            self.container.items = cleaned;
        }
        removed
    }
}

impl Packer for PalletPacker<'_> {
    fn pack(&mut self, items: Vec<Item>) -> Vec<Item> {
        if items.is_empty() {
            return items;
        }

        let mut sorted = items;
        Self::sort_for_pack(&mut sorted);

        let unique_types: HashSet<&str> = sorted.iter().map(|it| it.sku_id.as_str()).collect();
        if unique_types.len() == 1 {
            self.pack_single_sku(sorted)
        } else {
            self.pack_mixed_sku(sorted)
        }
    }

    fn placements(&self) -> &[Placement] {
        &self.placements
    }
}
