//! Packer for containers with doors. Fills monotonically toward the door in
//! descending final-rank bands; single-SKU batches take a grid-capacity fast
//! path, and pallet batches pre-fill the floor through the tiler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::config::SolverConfig;
use crate::model::{Container, Item, ItemKind, Placement};
use crate::orientation::{allowed_rotations, OrientationMap};
use crate::packer::blf::BottomLeftFill;
use crate::packer::first_layer::FirstLayerPlanner;
use crate::packer::{map_item_groups, Packer};

pub struct DoorContainerPacker<'a> {
    container: &'a mut Container,
    cache: &'a OrientationMap,
    must_be_on_top: &'a HashMap<u64, bool>,
    co_loc_groups: &'a HashMap<String, HashSet<u64>>,
    item_to_group: HashMap<u64, String>,
    placements: Vec<Placement>,
    config: &'a SolverConfig,
    eps: f64,
}

impl<'a> DoorContainerPacker<'a> {
    pub fn new(
        container: &'a mut Container,
        cache: &'a OrientationMap,
        must_be_on_top: &'a HashMap<u64, bool>,
        co_loc_groups: &'a HashMap<String, HashSet<u64>>,
        config: &'a SolverConfig,
    ) -> Self {
        let item_to_group = map_item_groups(co_loc_groups);
        let eps = config.epsilon;
        Self {
            container,
            cache,
            must_be_on_top,
            co_loc_groups,
            item_to_group,
            placements: Vec::new(),
            config,
            eps,
        }
    }

    fn sort_items(items: &mut [Item]) {
        items.sort_by(|a, b| {
            b.final_rank
                .cmp(&a.final_rank)
                .then(b.pickup_priority.cmp(&a.pickup_priority))
                .then(b.weight.total_cmp(&a.weight))
                .then(b.volume().total_cmp(&a.volume()))
                .then(a.id.cmp(&b.id))
        });
    }

    fn items_identical(items: &[Item]) -> bool {
        let Some(first) = items.first() else {
            return true;
        };
        let eps = 1e-4;
        items.iter().all(|it| {
            (it.length - first.length).abs() <= eps
                && (it.width - first.width).abs() <= eps
                && (it.height - first.height).abs() <= eps
                && (it.weight - first.weight).abs() <= eps
        })
    }

    /// Theoretical capacity of a regular grid of this item at one rotation:
    /// whole items per axis, layers capped by maxStack, the total capped by
    /// the container weight limit.
    fn grid_capacity(&self, item: &Item, rotation: u8) -> (u64, f64, (f64, f64, f64)) {
        let dims = item.dims(Some(rotation));
        if dims.0 > self.container.width + self.eps
            || dims.1 > self.container.length + self.eps
            || dims.2 > self.container.height + self.eps
        {
            return (0, 0.0, dims);
        }

        let items_x = if dims.0 > self.eps {
            (self.container.width / dims.0) as u64
        } else {
            0
        };
        let items_y = if dims.1 > self.eps {
            (self.container.length / dims.1) as u64
        } else {
            0
        };
        let mut items_z = if dims.2 > self.eps {
            (self.container.height / dims.2) as u64
        } else {
            0
        };
        if item.max_stack > 0 {
            items_z = items_z.min(item.max_stack as u64);
        }

        let mut capacity = items_x * items_y * items_z;
        if self.container.max_weight > self.eps && item.weight > self.eps {
            capacity = capacity.min((self.container.max_weight / item.weight) as u64);
        }

        let utilization = if capacity > 0 && self.container.volume() > self.eps {
            capacity as f64 * item.volume() / self.container.volume()
        } else {
            0.0
        };
        (capacity, utilization, dims)
    }

    /// Rotation maximizing grid capacity, tie-broken by volume utilization.
    fn optimal_grid_rotation(&self, item: &Item) -> Option<u8> {
        let mut best: Option<u8> = None;
        let mut best_capacity = 0u64;
        let mut best_utilization = 0.0f64;
        for &rot in allowed_rotations(item.side_up) {
            let (capacity, utilization, _) = self.grid_capacity(item, rot);
            if capacity > best_capacity
                || (capacity == best_capacity && capacity > 0 && utilization > best_utilization)
            {
                best_capacity = capacity;
                best_utilization = utilization;
                best = Some(rot);
            }
        }
        best
    }

    fn commit(&mut self, mut item: Item, x: f64, y: f64, z: f64, rotation: u8, layer: u32) {
        item.position = Some((x, y, z));
        item.rotation = rotation;
        item.layer = layer;
        let dims = item.dims(None);
        self.placements.push(Placement {
            item_id: item.id,
            x,
            y,
            z,
            rotation,
            dims,
            supporters: Vec::new(),
            layer,
        });
        self.container.total_weight += item.weight;
        self.container.items.push(item);
    }

    fn pack_blf(&mut self, items: Vec<Item>, forced_rotation: Option<u8>) -> Vec<Item> {
        let mut unused: Vec<Item> = Vec::new();
        let mut placed_ids: HashSet<u64> = HashSet::new();

        let mut sorted = items;
        sorted.sort_by(|a, b| b.final_rank.cmp(&a.final_rank).then(a.id.cmp(&b.id)));

        for item in sorted {
            if placed_ids.contains(&item.id) {
                continue;
            }
            if self.container.total_weight + item.weight > self.container.max_weight + self.eps {
                unused.push(item);
                continue;
            }
            let found = BottomLeftFill::new(self.container, self.config, self.must_be_on_top)
                .find_best_position(&item, forced_rotation);
            let Some(p) = found else {
                unused.push(item);
                continue;
            };
            placed_ids.insert(item.id);
            self.commit(item, p.x, p.y, p.z, p.rotation, p.layer);
        }

        unused
    }

    /// Tiler pre-fill for pallet batches on an empty container floor;
    /// positions are committed verbatim.
    fn prefill_batch_floor(&mut self, batches: &[Item]) -> HashSet<u64> {
        let slots = {
            let planner = FirstLayerPlanner::new(
                self.container,
                self.cache,
                &self.item_to_group,
                self.co_loc_groups,
                self.config,
            );
            let (slots, _) = planner.plan(batches);
            slots
        };

        let (ox, oy, oz) = self.container.origin;
        let mut placed: HashSet<u64> = HashSet::new();
        for slot in slots {
            let Some(item) = batches.iter().find(|it| it.id == slot.item_id) else {
                continue;
            };
            self.commit(item.clone(), ox + slot.x, oy + slot.y, oz, slot.rotation, 1);
            placed.insert(slot.item_id);
        }
        placed
    }

    /// Compresses the priorities present on this container to contiguous
    /// ranks 1..k; returns the restore map by item id.
    fn remap_priorities(&mut self, items: &mut [Item]) -> HashMap<u64, i64> {
        let mut unique: Vec<i64> = items
            .iter()
            .map(|it| it.pickup_priority)
            .chain(self.container.items.iter().map(|it| it.pickup_priority))
            .collect();
        unique.sort_unstable();
        unique.dedup();
        let rank_of: HashMap<i64, i64> = unique
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, i as i64 + 1))
            .collect();

        let mut originals = HashMap::new();
        for item in items.iter_mut() {
            originals.insert(item.id, item.pickup_priority);
            item.pickup_priority = rank_of[&item.pickup_priority];
        }
        for item in self.container.items.iter_mut() {
            originals.insert(item.id, item.pickup_priority);
            item.pickup_priority = rank_of[&item.pickup_priority];
        }
        originals
    }

    fn restore_priorities(&mut self, unused: &mut [Item], originals: &HashMap<u64, i64>) {
        for item in self.container.items.iter_mut() {
            if let Some(&p) = originals.get(&item.id) {
                item.pickup_priority = p;
            }
        }
        for item in unused.iter_mut() {
            if let Some(&p) = originals.get(&item.id) {
                item.pickup_priority = p;
            }
        }
    }

    /// Final safety pass: drop duplicate item ids, deducting their weight.
    fn dedup_container_items(&mut self) {
        let mut seen: HashSet<u64> = HashSet::new();
        let mut unique: Vec<Item> = Vec::with_capacity(self.container.items.len());
        let mut removed = 0usize;
        for item in self.container.items.clone() {
            if seen.insert(item.id) {
                unique.push(item);
            } else {
                self.container.total_weight -= item.weight;
                warn!(item_id = item.id, container_id = self.container.id, "duplicate item removed from container");
                removed += 1;
            }
        }
        if removed > 0 {
            warn!(
                container_id = self.container.id,
                removed, "container held duplicate items after packing"
            );
            self.container.items = unique;
        }
    }

    fn pack_inner(&mut self, items: Vec<Item>, skip_floor_prefill: bool) -> Vec<Item> {
        if items.is_empty() {
            return items;
        }

        let mut items = items;
        Self::sort_items(&mut items);

        // Single-SKU fast path: pick the rotation with the best theoretical
        // grid capacity and force it through the BLF placer.
        if Self::items_identical(&items) && self.container.items.is_empty() {
            if let Some(rotation) = self.optimal_grid_rotation(&items[0]) {
                debug!(rotation, "identical items, packing with grid-optimal rotation");
                return self.pack_blf(items, Some(rotation));
            }
        }

        let originals = self.remap_priorities(&mut items);

        let (mut batches, regular): (Vec<Item>, Vec<Item>) = items
            .into_iter()
            .partition(|it| it.kind == ItemKind::PalletBatch);

        if !batches.is_empty() && self.container.items.is_empty() && !skip_floor_prefill {
            let placed = self.prefill_batch_floor(&batches);
            batches.retain(|it| !placed.contains(&it.id));
        }

        let remaining: Vec<Item> = batches.into_iter().chain(regular).collect();
        let already_placed: HashSet<u64> = self.container.items.iter().map(|it| it.id).collect();

        let mut rank_groups: HashMap<u32, Vec<Item>> = HashMap::new();
        for item in remaining {
            rank_groups.entry(item.final_rank).or_default().push(item);
        }
        let mut ranks: Vec<u32> = rank_groups.keys().copied().collect();
        ranks.sort_unstable_by(|a, b| b.cmp(a));

        let mut unused: Vec<Item> = Vec::new();
        for rank in ranks {
            for item in rank_groups.remove(&rank).unwrap_or_default() {
                if already_placed.contains(&item.id) {
                    continue;
                }
                if self.container.total_weight + item.weight > self.container.max_weight + self.eps
                {
                    unused.push(item);
                    continue;
                }
                let found = BottomLeftFill::new(self.container, self.config, self.must_be_on_top)
                    .find_best_position(&item, None);
                let Some(p) = found else {
                    unused.push(item);
                    continue;
                };
                self.commit(item, p.x, p.y, p.z, p.rotation, p.layer);
            }
        }

        self.restore_priorities(&mut unused, &originals);
        self.dedup_container_items();
        unused
    }
}

impl Packer for DoorContainerPacker<'_> {
    fn pack(&mut self, items: Vec<Item>) -> Vec<Item> {
        self.pack_inner(items, false)
    }

    fn pack_more(&mut self, items: Vec<Item>) -> Vec<Item> {
        self.pack_inner(items, true)
    }

    fn placements(&self) -> &[Placement] {
        &self.placements
    }
}
