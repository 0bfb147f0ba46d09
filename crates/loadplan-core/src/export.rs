//! JSON export helpers for plans; consumers (reporting, persistence) read
//! this structure directly.

use serde_json::json;

use crate::model::{PlanStats, Solution};

/// Serializes a solution to compact JSON.
pub fn solution_to_json(solution: &Solution) -> serde_json::Result<String> {
    serde_json::to_string(solution)
}

/// Serializes a solution to pretty-printed JSON.
pub fn solution_to_json_pretty(solution: &Solution) -> serde_json::Result<String> {
    serde_json::to_string_pretty(solution)
}

/// Per-container load summary plus plan totals, for quick reporting.
pub fn summary_json(solution: &Solution) -> serde_json::Value {
    let stats = PlanStats::of(solution);
    json!({
        "containers": solution
            .containers
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "type_id": c.type_id,
                    "items": c.items.len(),
                    "total_weight": c.total_weight,
                    "max_weight": c.max_weight,
                })
            })
            .collect::<Vec<_>>(),
        "containers_used": stats.containers_used,
        "items_placed": stats.items_placed,
        "items_unused": stats.items_unused,
        "total_weight": stats.total_weight,
    })
}
