//! Data access layer (Repository pattern)
//!
//! The persistence engine is external; the in-memory implementations back
//! the CLI and the integration tests.

pub mod resource;
pub mod user;
pub mod workspace;

pub use resource::{InMemoryResourceRepository, ResourceRepository};
pub use user::{InMemoryUserRepository, UserRepository};
pub use workspace::{InMemoryWorkspaceRepository, WorkspaceRepository};
