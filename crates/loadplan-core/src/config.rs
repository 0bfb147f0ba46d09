use serde::{Deserialize, Serialize};

/// Solver tunables.
/// Key notes:
///   - `epsilon` is the geometric tolerance used by every kernel check
///   - `support_ratio` is the minimum supported fraction of an elevated item's footprint
///   - combo caps bound the container-combination search so solves stay fast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Geometric tolerance for bounds/collision/support comparisons.
    pub epsilon: f64,
    /// Minimum fraction of an elevated item's XY footprint that must rest on supporters.
    pub support_ratio: f64,

    /// Maximum ranked combinations kept by the combination selector.
    pub combo_limit: usize,
    /// Container count up to which exact subset enumeration is used.
    pub max_exact_enumeration: usize,
    /// Container pool size above which the pool is capped per template.
    pub pool_cap: usize,
    /// Item count at which only the top few combos are evaluated.
    pub large_instance_threshold: usize,
    /// Number of combos evaluated for large instances.
    pub large_instance_combos: usize,

    /// Floor candidates are admitted up to this multiple of the container floor area.
    pub floor_area_factor: f64,
    /// Absolute floor-candidate cap for pallets.
    pub pallet_floor_candidate_cap: usize,
    /// Absolute floor-candidate cap for door containers.
    pub door_floor_candidate_cap: usize,
    /// Floor coverage below which a single-SKU pallet layout is re-centered.
    pub centered_coverage_threshold: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            support_ratio: 0.7,
            combo_limit: 50,
            max_exact_enumeration: 15,
            pool_cap: 500,
            large_instance_threshold: 500,
            large_instance_combos: 10,
            floor_area_factor: 1.25,
            pallet_floor_candidate_cap: 5000,
            door_floor_candidate_cap: 1000,
            centered_coverage_threshold: 0.75,
        }
    }
}

impl SolverConfig {
    /// Grid cell used to deduplicate candidate positions.
    pub fn dedup_grid(&self) -> f64 {
        (self.epsilon * 10.0).max(0.1)
    }

    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - `epsilon` is not strictly positive
    /// - `support_ratio` is outside (0, 1]
    /// - any search cap is zero
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::LoadPlanError;

        if !(self.epsilon > 0.0) {
            return Err(LoadPlanError::InvalidConfig(format!(
                "epsilon must be > 0 (got {})",
                self.epsilon
            )));
        }
        if !(self.support_ratio > 0.0 && self.support_ratio <= 1.0) {
            return Err(LoadPlanError::InvalidConfig(format!(
                "support_ratio must be in (0, 1] (got {})",
                self.support_ratio
            )));
        }
        if self.combo_limit == 0
            || self.max_exact_enumeration == 0
            || self.pool_cap == 0
            || self.large_instance_combos == 0
        {
            return Err(LoadPlanError::InvalidConfig(
                "combination search caps must be non-zero".to_string(),
            ));
        }
        if !(self.floor_area_factor >= 1.0) {
            return Err(LoadPlanError::InvalidConfig(format!(
                "floor_area_factor must be >= 1.0 (got {})",
                self.floor_area_factor
            )));
        }
        if self.pallet_floor_candidate_cap == 0 || self.door_floor_candidate_cap == 0 {
            return Err(LoadPlanError::InvalidConfig(
                "floor candidate caps must be non-zero".to_string(),
            ));
        }
        if !(self.centered_coverage_threshold > 0.0 && self.centered_coverage_threshold <= 1.0) {
            return Err(LoadPlanError::InvalidConfig(format!(
                "centered_coverage_threshold must be in (0, 1] (got {})",
                self.centered_coverage_threshold
            )));
        }
        Ok(())
    }
}

/// Builder for `SolverConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct SolverConfigBuilder {
    cfg: SolverConfig,
}

impl SolverConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: SolverConfig::default(),
        }
    }
    pub fn epsilon(mut self, v: f64) -> Self {
        self.cfg.epsilon = v;
        self
    }
    pub fn support_ratio(mut self, v: f64) -> Self {
        self.cfg.support_ratio = v;
        self
    }
    pub fn combo_limit(mut self, v: usize) -> Self {
        self.cfg.combo_limit = v;
        self
    }
    pub fn max_exact_enumeration(mut self, v: usize) -> Self {
        self.cfg.max_exact_enumeration = v;
        self
    }
    pub fn pool_cap(mut self, v: usize) -> Self {
        self.cfg.pool_cap = v;
        self
    }
    pub fn large_instance_threshold(mut self, v: usize) -> Self {
        self.cfg.large_instance_threshold = v;
        self
    }
    pub fn large_instance_combos(mut self, v: usize) -> Self {
        self.cfg.large_instance_combos = v;
        self
    }
    pub fn floor_area_factor(mut self, v: f64) -> Self {
        self.cfg.floor_area_factor = v;
        self
    }
    pub fn pallet_floor_candidate_cap(mut self, v: usize) -> Self {
        self.cfg.pallet_floor_candidate_cap = v;
        self
    }
    pub fn door_floor_candidate_cap(mut self, v: usize) -> Self {
        self.cfg.door_floor_candidate_cap = v;
        self
    }
    pub fn centered_coverage_threshold(mut self, v: f64) -> Self {
        self.cfg.centered_coverage_threshold = v;
        self
    }
    pub fn build(self) -> SolverConfig {
        self.cfg
    }
}

impl SolverConfig {
    /// Create a fluent builder for `SolverConfig`.
    pub fn builder() -> SolverConfigBuilder {
        SolverConfigBuilder::new()
    }
}
