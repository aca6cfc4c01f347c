//! # palisade-common
//!
//! Shared utilities and types for the Palisade admission engine.
//!
//! This crate provides common functionality used across all Palisade crates:
//! - Common error types
//! - Field paths and structured validation violations
//! - Storage quantity parsing
//! - Standard filesystem paths

#![warn(missing_docs)]

pub mod error;
pub mod field;
pub mod paths;
pub mod resource;

pub use error::{PalisadeError, PalisadeResult};
pub use field::{FieldPath, Violation, ViolationKind};
pub use paths::PalisadePaths;
pub use resource::ResourceQuantity;
