//! # palisade-api
//!
//! Kubernetes-shaped API types consumed by the Palisade engine.
//!
//! This crate provides Rust types for:
//! - SecurityContextConstraints and their strategy options
//! - The subset of Pod, Container and Volume needed for admission
//!
//! Field names serialize in Kubernetes camelCase so documents can be read
//! straight from YAML or JSON manifests.

#![warn(missing_docs)]

pub mod constraints;
pub mod meta;
pub mod pod;

pub use constraints::{
    FsGroupStrategyOptions, IdRange, RunAsUserStrategyOptions, SELinuxContextStrategyOptions,
    SecurityContextConstraints, SupplementalGroupsStrategyOptions,
};
pub use meta::ObjectMeta;
pub use pod::{
    Capabilities, Container, ContainerPort, EmptyDirVolumeSource, HostPathVolumeSource, Pod,
    PodSecurityContext, PodSpec, SELinuxOptions, SecurityContext, StorageMedium, Volume,
    VolumeSource,
};
