use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadPlanError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid dimensions for {kind} '{id}': all of width/length/height must be greater than 0 (got {width}x{length}x{height})")]
    InvalidDimensions {
        kind: &'static str,
        id: String,
        width: f64,
        length: f64,
        height: f64,
    },

    #[error("Pallet phase incomplete: {count} product(s) could not be placed on any pallet")]
    UnplacedProducts { count: usize },
}

pub type Result<T> = std::result::Result<T, LoadPlanError>;
