//! Two-phase "pallets inside a container" solve: products are packed onto
//! pallets, each loaded pallet is re-labelled as a single composite item,
//! and those batch items are loaded into door containers.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::SolverConfig;
use crate::error::{LoadPlanError, Result};
use crate::model::{Container, Item, ItemKind, Solution};
use crate::solver::PackingSolver;

/// Result of a nested solve: the pallet-level plan and the container-level
/// plan. Container items of kind `PalletBatch` reference pallets of the
/// first phase through `pallet_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedSolution {
    pub pallets: Solution,
    pub containers: Solution,
}

/// Re-labels every non-empty packed pallet as one composite item: external
/// footprint, external height plus the stacked cargo height, combined
/// weight, and a priority equal to the sum of the distinct priorities it
/// carries. Batches are side-up, single-layer, grounded.
pub fn pallet_batch_items(pallets: &[Container]) -> Vec<Item> {
    pallets
        .iter()
        .filter(|p| !p.items.is_empty())
        .enumerate()
        .map(|(idx, pallet)| {
            let priorities: BTreeSet<i64> =
                pallet.items.iter().map(|it| it.pickup_priority).collect();
            let mut item = Item::new(
                idx as u64,
                pallet.type_id.clone(),
                "",
                pallet.ex_width,
                pallet.ex_length,
                pallet.ex_height + pallet.stacked_height(),
                pallet.ex_weight + pallet.total_weight,
            );
            item.kind = ItemKind::PalletBatch;
            item.side_up = true;
            item.max_stack = 1;
            item.max_stack_weight = Some(-1.0);
            item.grounded = true;
            item.pickup_priority = priorities.iter().sum();
            item.pallet_id = Some(idx as u64);
            item
        })
        .collect()
}

/// Packs `products` onto `pallets`, then loads the resulting batches into
/// `containers`. Fails with [`LoadPlanError::UnplacedProducts`] when the
/// pallet phase cannot place every product; the container phase reports
/// unplaced batches through `unused` as usual.
#[instrument(skip_all)]
pub fn solve_pallets_then_containers(
    products: Vec<Item>,
    pallets: Vec<Container>,
    containers: Vec<Container>,
    config: &SolverConfig,
) -> Result<NestedSolution> {
    let mut pallet_solver = PackingSolver::with_config(
        pallets,
        products,
        HashMap::new(),
        (0.0, 0.0, 0.0),
        config.clone(),
    );
    let pallet_plan = pallet_solver.solve();
    if !pallet_plan.unused.is_empty() {
        return Err(LoadPlanError::UnplacedProducts {
            count: pallet_plan.unused.len(),
        });
    }

    let batches = pallet_batch_items(&pallet_plan.containers);
    let mut container_solver = PackingSolver::with_config(
        containers,
        batches,
        HashMap::new(),
        (0.0, 0.0, 0.0),
        config.clone(),
    );
    let container_plan = container_solver.solve();

    Ok(NestedSolution {
        pallets: pallet_plan,
        containers: container_plan,
    })
}
