//! Workspace ACL - role hierarchy, policy sets and policy propagation
//!
//! This crate assigns hierarchical roles to workspace members, flattens them
//! into per-resource policy sets and keeps the policies of every application
//! and datasource of a workspace in line with its membership.

pub mod config;
pub mod domain;
pub mod error;
pub mod policy;
pub mod repository;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
