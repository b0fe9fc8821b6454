pub mod cooldown;
pub mod gate;
pub mod overrides;

pub use cooldown::{ActionState, CooldownDispatcher};
pub use gate::{AdmissionGate, DeployOutcome, StrategyArtifact};
pub use overrides::{effective_thresholds, read_overrides, write_overrides, OVERRIDES_FILE};
