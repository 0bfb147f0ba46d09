//! Core library for 3D load planning: packing heterogeneous cargo onto
//! pallets and into door containers.
//!
//! - Geometry: extreme-point candidate generation, collision, 70%-support
//!   stacking, priority adjacency and door-axis ordering
//! - Placement: Bottom-Left-Fill search plus a MaxRects first-layer tiler
//! - Orchestration: container-combination ranking, per-container packing,
//!   layout-template reuse, pallet consolidation and a nested
//!   pallets-inside-container composition pass
//!
//! Quick example:
//! ```ignore
//! use loadplan_core::model::{Container, Item};
//! use loadplan_core::solver::PackingSolver;
//! # fn main() {
//! let pallet = Container::new(0, "EUR", 1200.0, 800.0, 1500.0, 1000.0);
//! let items: Vec<Item> = (0..4)
//!     .map(|id| Item::new(id, "BOX-A", "order-1", 400.0, 300.0, 200.0, 10.0))
//!     .collect();
//! let mut solver = PackingSolver::new(vec![pallet], items, Default::default(), (0.0, 0.0, 0.0));
//! let plan = solver.solve();
//! println!("placed: {}", plan.containers.iter().map(|c| c.items.len()).sum::<usize>());
//! # }
//! ```

pub mod compose;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod model;
pub mod orientation;
pub mod packer;
pub mod solver;
pub mod staging;

pub use config::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use packer::*;
pub use solver::*;

/// Convenience prelude for common types and functions.
/// Importing `loadplan_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::compose::{pallet_batch_items, solve_pallets_then_containers, NestedSolution};
    pub use crate::config::{SolverConfig, SolverConfigBuilder};
    pub use crate::error::{LoadPlanError, Result};
    pub use crate::model::{
        Container, DoorKind, Item, ItemKind, PlanStats, Placement, SkuKey, Solution,
    };
    pub use crate::orientation::{allowed_rotations, rotated_dims, OrientationCache};
    pub use crate::solver::PackingSolver;
    pub use crate::staging::{
        compute_final_ranks, expand_containers, expand_pallets, expand_products,
        normalize_priorities, ContainerSpec, PalletSpec, ProductSpec,
    };
}
