mod availability;
mod lease;
mod orchestrator;

pub use availability::{AvailabilityState, UnavailableReason};
pub use lease::{LeaseDenied, LeaseGuard, LeaseRecord, SessionLease, LAST_COMPLETED_KEY, LEASE_KEY};
pub use orchestrator::{Collaborators, SessionOrchestrator, SessionPhase};
