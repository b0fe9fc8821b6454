pub mod checkpoint;
pub mod controller;
pub mod params;
pub mod status;

pub use checkpoint::{Checkpoint, IterationRecord};
pub use controller::OptimizerController;
pub use params::{decode_solution, StrategyParams, SOLUTION_DIM};
pub use status::{
    check_checkpoint_freshness, read_status, write_status, FreshnessReport, FreshnessStatus,
    StatusDocument, STATUS_FILE,
};
