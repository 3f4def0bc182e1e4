//! Business logic layer

pub mod lock;
pub mod membership;
pub mod propagation;
pub mod workspace;

pub use lock::WorkspaceLocks;
pub use membership::MembershipService;
pub use propagation::{PropagationReport, ResourcePropagator};
pub use workspace::WorkspaceService;
