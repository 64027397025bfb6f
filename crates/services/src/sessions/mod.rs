mod purge;
mod service;

// Public API of the session subsystem.
pub use crate::error::SessionServiceError;
pub use purge::PurgeOutcome;
pub use service::SessionLifecycleService;
