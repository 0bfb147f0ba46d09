use std::collections::{HashMap, HashSet};

use crate::config::SolverConfig;
use crate::model::{Container, Item, Placement};
use crate::orientation::OrientationMap;

pub mod blf;
pub mod door;
pub mod first_layer;
pub mod maxrects;
pub mod pallet;

/// A packer places items into one container.
///
/// `pack` returns the items it could not place; committed placements update
/// the container's item list and running weight. `pack_more` is the
/// follow-up pass used for deferred items (e.g. must-be-on-top cargo) and
/// never re-runs one-time floor pre-fill work.
pub trait Packer {
    fn pack(&mut self, items: Vec<Item>) -> Vec<Item>;

    fn pack_more(&mut self, items: Vec<Item>) -> Vec<Item> {
        self.pack(items)
    }

    /// Placements committed so far, in commit order.
    fn placements(&self) -> &[Placement];
}

/// Picks the packer for a container by its door model: pallets take the
/// pallet packer, anything with a declared door the door-container packer.
pub fn create_packer<'a>(
    container: &'a mut Container,
    cache: &'a OrientationMap,
    must_be_on_top: &'a HashMap<u64, bool>,
    co_loc_groups: &'a HashMap<String, HashSet<u64>>,
    config: &'a SolverConfig,
) -> Box<dyn Packer + 'a> {
    if container.door.is_door() {
        Box::new(door::DoorContainerPacker::new(
            container,
            cache,
            must_be_on_top,
            co_loc_groups,
            config,
        ))
    } else {
        Box::new(pallet::PalletPacker::new(
            container,
            cache,
            must_be_on_top,
            co_loc_groups,
            config,
        ))
    }
}

pub(crate) fn map_item_groups(
    co_loc_groups: &HashMap<String, HashSet<u64>>,
) -> HashMap<u64, String> {
    let mut mapping = HashMap::new();
    for (gid, members) in co_loc_groups {
        for &id in members {
            mapping.insert(id, gid.clone());
        }
    }
    mapping
}
