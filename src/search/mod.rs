pub mod archive;
pub mod emitter;
pub mod scheduler;

pub use archive::{AddStatus, ArchiveStats, GridArchive};
pub use emitter::{CandidateFeedback, GaussianEmitter};
pub use scheduler::{Scheduler, SearchBackend};
