mod engine;
mod error;
mod types;

pub use engine::{Engine, Session, detect_variant};
pub use error::{CoreError, CoreErrorCode, SaveFailure, SaveTarget};
pub use types::{
    Capabilities, CapabilityIssue, OptionEntry, ResolutionEntry, SaveSummary, Snapshot,
};
