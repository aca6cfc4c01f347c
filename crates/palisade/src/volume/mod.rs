//! Local storage quota for emptyDir volumes.
//!
//! Quotas are group quotas on XFS, keyed by the pod's FSGroup. The
//! filesystem type, backing device and the quota itself all come from
//! external commands, run through a [`CommandRunner`].

mod emptydir;
mod quota;
mod runner;

pub use emptydir::EmptyDirQuotaMounter;
pub use quota::{QuotaApplicator, XfsQuotaApplicator, parse_fs_device};
pub use runner::{
    CommandOutput, CommandRunner, ShellCommandRunner, find_in_path, quota_limit_expression,
};
