//! Defaulting and validation strategies.
//!
//! Each security attribute has a closed set of strategy kinds selected by the
//! constraints' `type` string. A strategy is built once from its options and
//! then:
//! - generates a default value when the pod leaves the attribute unset
//! - validates a value the pod did set
//!
//! Strategies hold no per-pod state and are shared freely across threads.

pub mod capabilities;
pub mod group;
pub mod selinux;
pub mod user;

pub use capabilities::CapabilitiesStrategy;
pub use group::{GroupStrategy, GroupStrategyKind};
pub use selinux::{SELinuxStrategy, SELinuxStrategyKind};
pub use user::{RunAsUserStrategy, RunAsUserStrategyKind};
