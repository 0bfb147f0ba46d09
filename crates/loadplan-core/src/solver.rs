//! Top-level solver: container-combination enumeration and ranking, combo
//! evaluation through the packers, layout-template reuse, pallet
//! consolidation and output ordering.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::config::SolverConfig;
use crate::model::{Container, DoorKind, Item, PlacementTemplate, SkuKey, Solution};
use crate::orientation::{build_orientation_map, OrientationMap};
use crate::packer::create_packer;
use crate::staging::{compute_final_ranks, normalize_priorities};

/// Cost tuple for ranking a container combination: container count, slack
/// ratio, `1 - worst bin utilization`, largest volume, average volume.
/// Lower is better, compared lexicographically.
#[derive(Debug, Clone, Copy)]
struct ComboKey(usize, f64, f64, f64, f64);

impl ComboKey {
    fn cmp(&self, other: &ComboKey) -> Ordering {
        self.0
            .cmp(&other.0)
            .then(self.1.total_cmp(&other.1))
            .then(self.2.total_cmp(&other.2))
            .then(self.3.total_cmp(&other.3))
            .then(self.4.total_cmp(&other.4))
    }
}

type SkuMap = HashMap<SkuKey, Vec<Item>>;

/// Coordinates container selection and packing for one problem instance.
/// Holds the solve-local layout template cache; nothing is shared across
/// solver instances.
pub struct PackingSolver {
    containers: Vec<Container>,
    items: Vec<Item>,
    must_be_on_top: HashMap<u64, bool>,
    co_loc_groups: HashMap<String, HashSet<u64>>,
    layout_cache: HashMap<(String, DoorKind), Vec<PlacementTemplate>>,
    config: SolverConfig,
}

impl PackingSolver {
    pub fn new(
        containers: Vec<Container>,
        items: Vec<Item>,
        co_loc_groups: HashMap<String, HashSet<u64>>,
        origin: (f64, f64, f64),
    ) -> Self {
        Self::with_config(containers, items, co_loc_groups, origin, SolverConfig::default())
    }

    pub fn with_config(
        mut containers: Vec<Container>,
        items: Vec<Item>,
        co_loc_groups: HashMap<String, HashSet<u64>>,
        origin: (f64, f64, f64),
        config: SolverConfig,
    ) -> Self {
        for container in &mut containers {
            container.origin = origin;
        }
        let must_be_on_top = items
            .iter()
            .filter(|it| it.must_be_on_top)
            .map(|it| (it.id, true))
            .collect();
        Self {
            containers,
            items,
            must_be_on_top,
            co_loc_groups,
            layout_cache: HashMap::new(),
            config,
        }
    }

    /// Runs the full solve: pool capping, combination enumeration and
    /// ranking, per-combo packing, consolidation, and the full-pool safety
    /// retry. Never fails for "cannot fit" — such items land in `unused`.
    #[instrument(skip_all)]
    pub fn solve(&mut self) -> Solution {
        if self.containers.is_empty() {
            return Solution {
                containers: Vec::new(),
                unused: self.items.clone(),
            };
        }

        let trimmed = self.cap_container_pool();
        let pool_trimmed = trimmed.len() < self.containers.len();

        let containers: Vec<Container> = trimmed.iter().map(|c| c.empty_clone()).collect();
        let mut items_copy: Vec<Item> = self.items.iter().map(|it| it.unplaced_clone()).collect();
        // Ranks reflect raw inputs; normalization follows.
        compute_final_ranks(&mut items_copy);
        normalize_priorities(&mut items_copy);
        let cache = build_orientation_map(&items_copy);

        // Multiple copies of one container template skip the combinator and
        // pack sequentially so as many copies as needed get consumed.
        if Self::is_single_template(&containers) && containers.len() > 1 {
            let result = self.pack_containers(containers, items_copy, &cache);
            return self.maybe_use_full_pool(result, pool_trimmed);
        }

        let combos = self.enumerate_container_combinations(&containers, &items_copy);
        if combos.is_empty() {
            return self.pack_containers(containers, items_copy, &cache);
        }

        let total = items_copy.len();
        if total >= self.config.large_instance_threshold {
            // Large instance: evaluate only the top combos analytically, then
            // compare against the "use everything" plan.
            let mut best: Option<Solution> = None;
            let mut best_placed: isize = -1;

            for combo in combos.iter().take(self.config.large_instance_combos) {
                let working: Vec<Container> = combo.iter().map(|c| c.empty_clone()).collect();
                let working_items: Vec<Item> =
                    items_copy.iter().map(|it| it.unplaced_clone()).collect();
                let result = self.pack_containers(working, working_items, &cache);
                let placed = (total - result.unused.len()) as isize;
                let perfect = result.unused.is_empty();
                if placed > best_placed {
                    best_placed = placed;
                    best = Some(result);
                }
                if perfect {
                    return best.expect("perfect pack just recorded");
                }
            }

            let full_items: Vec<Item> = items_copy.iter().map(|it| it.unplaced_clone()).collect();
            let full_result = self.pack_containers(containers, full_items, &cache);
            let full_placed = (total - full_result.unused.len()) as isize;
            if full_placed > best_placed {
                return self.maybe_use_full_pool(full_result, pool_trimmed);
            }
            let chosen = best.unwrap_or(full_result);
            return self.maybe_use_full_pool(chosen, pool_trimmed);
        }

        // Small instance: evaluate every capped combo, early-exit on a
        // perfect pack.
        let mut best: Option<Solution> = None;
        let mut best_placed: isize = -1;
        let mut best_combo_size = 0usize;
        for combo in &combos {
            let working: Vec<Container> = combo.iter().map(|c| c.empty_clone()).collect();
            let working_items: Vec<Item> =
                items_copy.iter().map(|it| it.unplaced_clone()).collect();
            let result = self.pack_containers(working, working_items, &cache);
            let placed = (total - result.unused.len()) as isize;
            let perfect = result.unused.is_empty();
            if placed > best_placed {
                best_placed = placed;
                best_combo_size = combo.len();
                best = Some(result);
            }
            if perfect {
                let chosen = best.expect("perfect pack just recorded");
                return self.maybe_use_full_pool(chosen, pool_trimmed);
            }
        }

        match best {
            Some(result) => {
                if !result.unused.is_empty() && containers.len() > best_combo_size {
                    let full_items: Vec<Item> =
                        items_copy.iter().map(|it| it.unplaced_clone()).collect();
                    let full_result = self.pack_containers(containers, full_items, &cache);
                    let full_placed = (total - full_result.unused.len()) as isize;
                    if full_placed > best_placed {
                        return self.maybe_use_full_pool(full_result, pool_trimmed);
                    }
                }
                self.maybe_use_full_pool(result, pool_trimmed)
            }
            None => {
                let result = self.pack_containers(containers, items_copy, &cache);
                self.maybe_use_full_pool(result, pool_trimmed)
            }
        }
    }

    /// When the pool was trimmed and items remain unused, retry once with
    /// the untrimmed pool and adopt that plan only if it places strictly
    /// more items.
    fn maybe_use_full_pool(&mut self, result: Solution, pool_trimmed: bool) -> Solution {
        if !pool_trimmed || result.unused.is_empty() {
            return result;
        }
        debug!("retrying with the untrimmed container pool");
        let mut full_items: Vec<Item> = self.items.iter().map(|it| it.unplaced_clone()).collect();
        compute_final_ranks(&mut full_items);
        normalize_priorities(&mut full_items);
        let cache = build_orientation_map(&full_items);
        let full_containers: Vec<Container> =
            self.containers.iter().map(|c| c.empty_clone()).collect();
        let full_result = self.pack_containers(full_containers, full_items, &cache);

        let base_placed = self.items.len() - result.unused.len();
        let full_placed = self.items.len() - full_result.unused.len();
        if full_placed > base_placed {
            full_result
        } else {
            result
        }
    }

    fn sort_items(items: &mut [Item]) {
        items.sort_by(|a, b| b.final_rank.cmp(&a.final_rank));
    }

    /// Groups items by full SKU signature; each group is ordered by
    /// descending final rank so template replay and flattening preserve the
    /// global pack order.
    fn group_items(items: &[Item]) -> SkuMap {
        let mut map: SkuMap = HashMap::new();
        for item in items {
            map.entry(SkuKey::of(item)).or_default().push(item.clone());
        }
        for group in map.values_mut() {
            group.sort_by(|a, b| b.final_rank.cmp(&a.final_rank));
        }
        map
    }

    fn flatten_sku_map(map: &SkuMap) -> Vec<Item> {
        let mut keys: Vec<&SkuKey> = map.keys().collect();
        keys.sort();
        let mut items: Vec<Item> = keys.into_iter().flat_map(|k| map[k].clone()).collect();
        Self::sort_items(&mut items);
        items
    }

    /// Caps oversized container pools per template to what the load could
    /// realistically use, plus slack. Keeps the combinator tractable without
    /// losing feasibility.
    fn cap_container_pool(&self) -> Vec<Container> {
        if self.containers.len() <= self.config.pool_cap {
            return self.containers.clone();
        }
        let eps = self.config.epsilon;
        let total_vol: f64 = self.items.iter().map(|it| it.volume()).sum();
        let total_wt: f64 = self.items.iter().map(|it| it.weight).sum();

        let key_of = |c: &Container| {
            (
                c.type_id.clone(),
                (c.length * 10_000.0).round() as i64,
                (c.width * 10_000.0).round() as i64,
                (c.height * 10_000.0).round() as i64,
                (c.max_weight * 10_000.0).round() as i64,
                c.door,
            )
        };

        let mut counts: HashMap<_, (Container, usize)> = HashMap::new();
        for c in &self.containers {
            let entry = counts.entry(key_of(c)).or_insert_with(|| (c.clone(), 0));
            entry.1 += 1;
        }

        let mut keep: HashMap<_, usize> = HashMap::new();
        for (key, (template, available)) in &counts {
            let target = if template.volume() <= eps || template.max_weight <= eps {
                (*available).min(10)
            } else {
                let need_by_vol = if total_vol > eps {
                    ((total_vol + eps) / template.volume()).ceil() as usize
                } else {
                    1
                };
                let need_by_wt = if total_wt > eps {
                    ((total_wt + eps) / template.max_weight).ceil() as usize
                } else {
                    1
                };
                // Assume ~70% utilization so large boxes are not trimmed
                // too aggressively.
                let need_at_util = if total_vol > eps {
                    ((total_vol + eps) / (template.volume() * 0.70).max(eps)).ceil() as usize
                } else {
                    1
                };
                let base = need_by_vol.max(need_by_wt).max(need_at_util);
                let slack = 3usize.max(base * 15 / 100 + 1);
                (base + slack).min(*available)
            };
            keep.insert(key.clone(), target.max(1));
        }

        let mut trimmed = Vec::new();
        for c in &self.containers {
            let key = key_of(c);
            let quota = keep.get_mut(&key).expect("every container keyed");
            if *quota == 0 {
                continue;
            }
            *quota -= 1;
            trimmed.push(c.clone());
        }
        trimmed
    }

    fn is_single_template(containers: &[Container]) -> bool {
        let mut templates: HashSet<_> = HashSet::new();
        for c in containers {
            templates.insert((
                c.type_id.clone(),
                (c.length * 1e6).round() as i64,
                (c.width * 1e6).round() as i64,
                (c.height * 1e6).round() as i64,
                (c.max_weight * 1e6).round() as i64,
                (c.ex_length * 1e6).round() as i64,
                (c.ex_width * 1e6).round() as i64,
                (c.ex_height * 1e6).round() as i64,
                (c.ex_weight * 1e6).round() as i64,
                c.door,
            ));
        }
        templates.len() == 1
    }

    /// Minimum per-bin fill fraction when the combo is filled greedily in
    /// descending volume order.
    fn worst_bin_utilization(total_items_volume: f64, combo: &[Container], eps: f64) -> f64 {
        if total_items_volume <= eps || combo.is_empty() {
            return 1.0;
        }
        let mut volumes: Vec<f64> = combo.iter().map(|c| c.volume()).collect();
        volumes.sort_by(|a, b| b.total_cmp(a));

        let mut remaining = total_items_volume;
        let mut worst = 1.0f64;
        for volume in volumes {
            if volume <= eps {
                continue;
            }
            let filled = remaining.min(volume);
            worst = worst.min(filled / volume);
            remaining = (remaining - filled).max(0.0);
        }
        worst
    }

    fn combo_rank_key(&self, combo: &[Container], total_items_volume: f64) -> ComboKey {
        let v_items = total_items_volume.max(1e-9);
        let total_volume: f64 = combo.iter().map(|c| c.volume()).sum();
        let slack_ratio = (total_volume - v_items).max(0.0) / v_items;
        let worst = Self::worst_bin_utilization(v_items, combo, self.config.epsilon);
        let max_volume = combo.iter().map(|c| c.volume()).fold(0.0, f64::max);
        let avg_volume = if combo.is_empty() {
            0.0
        } else {
            total_volume / combo.len() as f64
        };
        ComboKey(combo.len(), slack_ratio, 1.0 - worst, max_volume, avg_volume)
    }

    /// Enumerates and ranks compact container selections covering the item
    /// volume and weight. Small pools get exact subset enumeration; large
    /// pools are grouped by template with a count-based backtrack. The full
    /// set is always kept as a fallback candidate.
    fn enumerate_container_combinations(
        &self,
        containers: &[Container],
        items: &[Item],
    ) -> Vec<Vec<Container>> {
        let eps = self.config.epsilon;
        let limit = self.config.combo_limit;
        let total_volume: f64 = items.iter().map(|it| it.volume()).sum();
        let total_weight: f64 = items.iter().map(|it| it.weight).sum();

        if containers.len() <= self.config.max_exact_enumeration {
            let n = containers.len();
            let mut combos: Vec<(ComboKey, Vec<Container>)> = Vec::new();
            for r in 1..=n {
                for idxs in index_combinations(n, r) {
                    let combo: Vec<Container> =
                        idxs.iter().map(|&i| containers[i].clone()).collect();
                    let combo_volume: f64 = combo.iter().map(|c| c.volume()).sum();
                    if combo_volume + eps < total_volume {
                        continue;
                    }
                    let combo_weight_cap: f64 = combo.iter().map(|c| c.max_weight).sum();
                    if total_weight - eps > combo_weight_cap {
                        continue;
                    }
                    combos.push((self.combo_rank_key(&combo, total_volume), combo));
                }
            }
            // The full set always survives as the last-resort candidate.
            if !combos.iter().any(|(_, combo)| combo.len() == n) {
                combos.push((
                    self.combo_rank_key(containers, total_volume),
                    containers.to_vec(),
                ));
            }
            combos.sort_by(|a, b| a.0.cmp(&b.0));
            let mut trimmed: Vec<Vec<Container>> =
                combos.into_iter().take(limit).map(|(_, c)| c).collect();
            if !trimmed.iter().any(|c| c.len() == n) {
                if let Some(last) = trimmed.last_mut() {
                    *last = containers.to_vec();
                } else {
                    trimmed.push(containers.to_vec());
                }
            }
            return trimmed;
        }

        // Large pool: group by template and backtrack over per-template
        // counts up to each template's useful maximum.
        let mut grouped: HashMap<_, (Container, usize)> = HashMap::new();
        let mut group_order = Vec::new();
        for c in containers {
            let key = (
                c.type_id.clone(),
                (c.volume() * 10_000.0).round() as i64,
                (c.max_weight * 10_000.0).round() as i64,
                c.door,
            );
            if !grouped.contains_key(&key) {
                group_order.push(key.clone());
            }
            let entry = grouped.entry(key).or_insert_with(|| (c.clone(), 0));
            entry.1 += 1;
        }

        let mut entries: Vec<(Container, usize)> = Vec::new();
        for key in &group_order {
            let (template, available) = &grouped[key];
            let vol = template.volume();
            let weight_cap = template.max_weight;
            if vol <= eps || weight_cap <= eps || *available == 0 {
                continue;
            }
            let need_vol = ((total_volume + eps) / vol).ceil() as usize;
            let need_at_util = ((total_volume + eps) / (vol * 0.70).max(eps)).ceil() as usize;
            let need_weight = ((total_weight + eps) / weight_cap).ceil() as usize;
            let target = need_vol.max(need_at_util).max(need_weight);
            let slack_bound = (target + 8).max(target * 3 / 2);
            let max_use = slack_bound.min(*available).max(1);
            entries.push((template.clone(), max_use));
        }

        let mut combos: Vec<(ComboKey, Vec<Container>)> = Vec::new();
        self.backtrack_counts(
            &entries,
            0,
            &mut Vec::new(),
            0.0,
            0.0,
            total_volume,
            total_weight,
            &mut combos,
        );
        combos.sort_by(|a, b| a.0.cmp(&b.0));
        let mut trimmed: Vec<Vec<Container>> =
            combos.into_iter().take(limit).map(|(_, c)| c).collect();

        let all_combo: Vec<Container> = containers.to_vec();
        let has_all = trimmed.iter().any(|c| c.len() == all_combo.len());
        if !all_combo.is_empty() && !has_all {
            if let Some(last) = trimmed.last_mut() {
                *last = all_combo;
            } else {
                trimmed.push(all_combo);
            }
        }
        trimmed
    }

    #[allow(clippy::too_many_arguments)]
    fn backtrack_counts(
        &self,
        entries: &[(Container, usize)],
        idx: usize,
        chosen: &mut Vec<Container>,
        combo_volume: f64,
        combo_weight: f64,
        total_volume: f64,
        total_weight: f64,
        combos: &mut Vec<(ComboKey, Vec<Container>)>,
    ) {
        let eps = self.config.epsilon;
        if combos.len() >= self.config.combo_limit * 2 {
            return;
        }
        if idx == entries.len() {
            if !chosen.is_empty()
                && combo_volume + eps >= total_volume
                && combo_weight + eps >= total_weight
            {
                combos.push((self.combo_rank_key(chosen, total_volume), chosen.clone()));
            }
            return;
        }

        let (template, max_use) = &entries[idx];
        for count in 0..=*max_use {
            for _ in 0..count {
                chosen.push(template.empty_clone());
            }
            self.backtrack_counts(
                entries,
                idx + 1,
                chosen,
                combo_volume + count as f64 * template.volume(),
                combo_weight + count as f64 * template.max_weight,
                total_volume,
                total_weight,
                combos,
            );
            for _ in 0..count {
                chosen.pop();
            }
        }
    }

    fn template_fits(template: &[PlacementTemplate], sku_map: &SkuMap) -> bool {
        let mut required: HashMap<&SkuKey, usize> = HashMap::new();
        for entry in template {
            *required.entry(&entry.sku_key).or_default() += 1;
        }
        required
            .into_iter()
            .all(|(key, needed)| sku_map.get(key).map(|v| v.len()).unwrap_or(0) >= needed)
    }

    /// Fills every template slot with an arbitrary SKU-matched item from the
    /// pool. Returns the ids of the consumed items.
    fn apply_template(
        container: &mut Container,
        template: &[PlacementTemplate],
        sku_map: &mut SkuMap,
    ) -> Vec<u64> {
        let mut used = Vec::new();
        for entry in template {
            let pool = sku_map
                .get_mut(&entry.sku_key)
                .expect("template fit verified before apply");
            let mut item = pool.pop().expect("template fit verified before apply");
            if pool.is_empty() {
                sku_map.remove(&entry.sku_key);
            }
            item.position = Some(entry.position);
            item.rotation = entry.rotation;
            item.layer = entry.layer;
            container.total_weight += item.weight;
            used.push(item.id);
            container.items.push(item);
        }
        used
    }

    /// Render/report order within a container: door containers by depth
    /// center toward the door, then height, then lateral center; pallets by
    /// ascending z, then y, then x.
    fn sort_container_items(container: &mut Container) {
        match container.door {
            DoorKind::Front => container.items.sort_by(|a, b| {
                let ad = a.dims(None);
                let bd = b.dims(None);
                let ap = a.position.unwrap_or((0.0, 0.0, 0.0));
                let bp = b.position.unwrap_or((0.0, 0.0, 0.0));
                (ap.1 + ad.1 / 2.0)
                    .total_cmp(&(bp.1 + bd.1 / 2.0))
                    .then((ap.2 + ad.2 / 2.0).total_cmp(&(bp.2 + bd.2 / 2.0)))
                    .then((ap.0 + ad.0 / 2.0).total_cmp(&(bp.0 + bd.0 / 2.0)))
            }),
            DoorKind::None => container.items.sort_by(|a, b| {
                let ap = a.position.unwrap_or((0.0, 0.0, 0.0));
                let bp = b.position.unwrap_or((0.0, 0.0, 0.0));
                ap.2.total_cmp(&bp.2)
                    .then(ap.1.total_cmp(&bp.1))
                    .then(ap.0.total_cmp(&bp.0))
            }),
        }
    }

    /// Packs one container list: containers in priority order, a swap-in of
    /// a smaller still-unused container when the remainder would fit it,
    /// template replay where possible, the packer progress loop, and the
    /// pallet consolidation pass.
    fn pack_containers(
        &mut self,
        mut containers: Vec<Container>,
        items: Vec<Item>,
        cache: &OrientationMap,
    ) -> Solution {
        let eps = self.config.epsilon;
        containers.sort_by(|a, b| {
            a.pickup_priority
                .cmp(&b.pickup_priority)
                .then(b.volume().total_cmp(&a.volume()))
        });

        let mut remaining = items;
        Self::sort_items(&mut remaining);
        let mut sku_map = Self::group_items(&remaining);

        for idx in 0..containers.len() {
            if remaining.is_empty() {
                break;
            }

            // Swap in the smallest still-unused container that would hold
            // everything left, so the run does not end on a half-empty box.
            let rem_vol: f64 = remaining.iter().map(|it| it.volume()).sum();
            let rem_wt: f64 = remaining.iter().map(|it| it.weight).sum();
            let mut best_fit: Option<(usize, f64)> = None;
            for (j, c) in containers.iter().enumerate().skip(idx) {
                if c.volume() + eps >= rem_vol && c.max_weight + eps >= rem_wt {
                    let better = match best_fit {
                        None => true,
                        Some((_, vol)) => c.volume() < vol - eps,
                    };
                    if better {
                        best_fit = Some((j, c.volume()));
                    }
                }
            }
            if let Some((j, _)) = best_fit {
                if j != idx {
                    containers.swap(idx, j);
                }
            }

            let layout_key = (containers[idx].type_id.clone(), containers[idx].door);
            if let Some(template) = self.layout_cache.get(&layout_key).cloned() {
                if containers[idx].door.is_door() && Self::template_fits(&template, &sku_map) {
                    let used = Self::apply_template(&mut containers[idx], &template, &mut sku_map);
                    if crate::geometry::has_overlaps(&containers[idx].items, eps) {
                        debug!("template replay collided, rolling back");
                        let used_set: HashSet<u64> = used.iter().copied().collect();
                        let mut rolled_back_weight = 0.0;
                        let mut restored: Vec<Item> = Vec::new();
                        containers[idx].items.retain(|it| {
                            if used_set.contains(&it.id) {
                                rolled_back_weight += it.weight;
                                restored.push(it.unplaced_clone());
                                false
                            } else {
                                true
                            }
                        });
                        containers[idx].total_weight -= rolled_back_weight;
                        for item in restored {
                            sku_map.entry(SkuKey::of(&item)).or_default().push(item);
                        }
                        remaining = Self::flatten_sku_map(&sku_map);
                    } else {
                        remaining = Self::flatten_sku_map(&sku_map);
                        if remaining.is_empty() {
                            break;
                        }
                        continue;
                    }
                }
            }

            let placements = {
                let container = &mut containers[idx];
                let mut packer = create_packer(
                    container,
                    cache,
                    &self.must_be_on_top,
                    &self.co_loc_groups,
                    &self.config,
                );

                // Keep feeding this container until it stops absorbing
                // items, deferring must-be-on-top cargo to a second pass.
                let mut progress = true;
                while progress && !remaining.is_empty() {
                    progress = false;
                    let (top_items, base_items): (Vec<Item>, Vec<Item>) =
                        remaining.drain(..).partition(|it| {
                            self.must_be_on_top.get(&it.id).copied().unwrap_or(false)
                        });

                    let base_len = base_items.len();
                    let mut leftover = packer.pack(base_items);
                    if leftover.len() < base_len {
                        progress = true;
                    }
                    if !top_items.is_empty() {
                        let top_len = top_items.len();
                        let leftover_top = packer.pack_more(top_items);
                        if leftover_top.len() < top_len {
                            progress = true;
                        }
                        leftover.extend(leftover_top);
                    }
                    remaining = leftover;
                }

                packer.placements().to_vec()
            };

            sku_map = Self::group_items(&remaining);
            if !self.layout_cache.contains_key(&layout_key) && !placements.is_empty() {
                let container = &containers[idx];
                let entries: Vec<PlacementTemplate> = placements
                    .iter()
                    .filter_map(|pl| {
                        container
                            .items
                            .iter()
                            .find(|it| it.id == pl.item_id)
                            .map(|item| PlacementTemplate {
                                position: (pl.x, pl.y, pl.z),
                                dims: pl.dims,
                                rotation: pl.rotation,
                                layer: pl.layer,
                                sku_key: SkuKey::of(item),
                            })
                    })
                    .collect();
                if !entries.is_empty() {
                    self.layout_cache.insert(layout_key, entries);
                }
            }
        }

        // Consolidation: repeatedly try to fold the last-used pallet into an
        // earlier one by repacking the union.
        while self.consolidate_pallets(&mut containers, cache) {}

        for container in &mut containers {
            Self::sort_container_items(container);
        }
        let mut used: Vec<Container> = containers
            .into_iter()
            .filter(|c| !c.items.is_empty())
            .collect();
        for (idx, container) in used.iter_mut().enumerate() {
            container.id = idx as u64;
        }

        Solution {
            containers: used,
            unused: remaining,
        }
    }

    /// One consolidation step: move the last used pallet's items into an
    /// earlier pallet (most filled first) if the union repacks completely.
    fn consolidate_pallets(
        &mut self,
        containers: &mut [Container],
        cache: &OrientationMap,
    ) -> bool {
        let used: Vec<usize> = containers
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.items.is_empty())
            .map(|(i, _)| i)
            .collect();
        if used.len() <= 1 {
            return false;
        }
        let last_idx = *used.last().expect("non-empty used list");

        let mut targets: Vec<usize> = used[..used.len() - 1].to_vec();
        targets.sort_by(|&a, &b| containers[b].total_weight.total_cmp(&containers[a].total_weight));

        for ti in targets {
            if containers[ti].door.is_door() || containers[last_idx].door.is_door() {
                continue;
            }

            let mut combined: Vec<Item> = containers[ti]
                .items
                .iter()
                .chain(containers[last_idx].items.iter())
                .map(|it| it.unplaced_clone())
                .collect();
            combined.sort_by(|a, b| b.final_rank.cmp(&a.final_rank));

            let mut merged = containers[ti].empty_clone();
            {
                let mut packer = create_packer(
                    &mut merged,
                    cache,
                    &self.must_be_on_top,
                    &self.co_loc_groups,
                    &self.config,
                );
                let mut work = combined;
                let mut progress = true;
                while progress && !work.is_empty() {
                    progress = false;
                    let before = work.len();
                    work = packer.pack(work);
                    if work.len() < before {
                        progress = true;
                    }
                }
                if !work.is_empty() {
                    continue;
                }
            }

            debug!(
                merged_into = ti,
                source = last_idx,
                "merged trailing pallet into earlier pallet"
            );
            containers[ti] = merged;
            containers[last_idx].items.clear();
            containers[last_idx].total_weight = 0.0;
            return true;
        }
        false
    }
}

/// Lexicographic r-combinations of `0..n`.
fn index_combinations(n: usize, r: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if r > n || r == 0 {
        return out;
    }
    let mut idxs: Vec<usize> = (0..r).collect();
    loop {
        out.push(idxs.clone());
        // Advance the rightmost index that can still move.
        let mut i = r;
        while i > 0 && idxs[i - 1] == (i - 1) + n - r {
            i -= 1;
        }
        if i == 0 {
            return out;
        }
        idxs[i - 1] += 1;
        for j in i..r {
            idxs[j] = idxs[j - 1] + 1;
        }
    }
}
