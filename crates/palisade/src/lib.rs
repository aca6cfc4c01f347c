//! # Palisade
//!
//! Palisade admits Kubernetes pods against SecurityContextConstraints and
//! enforces per-FSGroup storage quota on XFS-backed emptyDir volumes.
//!
//! ## Features
//!
//! - **Strategies**: RunAsUser, SELinux, FSGroup, supplemental groups and capabilities
//! - **Provider**: defaulting and validation of pod and container security contexts
//! - **Admission**: priority-ordered selection of the first SCC that admits a pod
//! - **Quota**: `xfs_quota` group limits for emptyDir volumes
//!
//! ## Usage
//!
//! ```no_run
//! use palisade::ConstraintProvider;
//! use palisade_api::{Container, Pod, RunAsUserStrategyOptions, SecurityContextConstraints};
//! use palisade_common::FieldPath;
//!
//! # fn example() -> palisade_common::PalisadeResult<()> {
//! let mut scc = SecurityContextConstraints::run_as_any("restricted");
//! scc.run_as_user = RunAsUserStrategyOptions::must_run_as_range(1000, 2000);
//! let provider = ConstraintProvider::new(scc)?;
//!
//! let container = Container::named("app");
//! let mut pod = Pod::default();
//! pod.spec.containers.push(container.clone());
//!
//! // Default the container's security context
//! let sc = provider.create_security_context(&pod, &container)?;
//! assert_eq!(sc.run_as_user, Some(1000));
//!
//! // Validate it
//! let violations = provider.validate_security_context(&pod, &container, &FieldPath::new("spec"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod admission;
pub mod cli;
pub mod config;
pub mod provider;
pub mod strategy;
pub mod volume;

pub use admission::{AdmittedPod, Admitter, Rejection};
pub use config::PalisadeConfig;
pub use provider::ConstraintProvider;
