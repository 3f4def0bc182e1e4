//! Domain models for workspace access control

pub mod common;
pub mod member;
pub mod permission;
pub mod policy;
pub mod propagation;
pub mod resource;
pub mod user;
pub mod workspace;

pub use common::*;
pub use member::*;
pub use permission::*;
pub use policy::*;
pub use propagation::*;
pub use resource::*;
pub use user::*;
pub use workspace::*;
