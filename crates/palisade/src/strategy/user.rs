//! RunAsUser strategies.

use std::fmt;
use std::str::FromStr;

use palisade_api::constraints::{
    RUN_AS_USER_MUST_RUN_AS, RUN_AS_USER_MUST_RUN_AS_NON_ROOT, RUN_AS_USER_MUST_RUN_AS_RANGE,
    RUN_AS_USER_RUN_AS_ANY,
};
use palisade_api::{Container, Pod, RunAsUserStrategyOptions};
use palisade_common::{FieldPath, PalisadeError, PalisadeResult, Violation};

/// Defaulting and validation of a container's UID.
pub trait RunAsUserStrategy: fmt::Debug + Send + Sync {
    /// The UID to use when the container does not set one. `None` leaves it unset.
    fn generate(&self, pod: &Pod, container: &Container) -> PalisadeResult<Option<i64>>;

    /// Check the container's explicit UID. `path` points at the security context.
    fn validate(&self, pod: &Pod, container: &Container, path: &FieldPath) -> Vec<Violation>;
}

fn explicit_uid(container: &Container) -> Option<i64> {
    container
        .security_context
        .as_ref()
        .and_then(|sc| sc.run_as_user)
}

/// The recognised RunAsUser strategy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunAsUserStrategyType {
    /// A fixed UID.
    MustRunAs,
    /// A UID within a range.
    MustRunAsRange,
    /// Any non-zero UID.
    MustRunAsNonRoot,
    /// No restriction.
    RunAsAny,
}

impl FromStr for RunAsUserStrategyType {
    type Err = PalisadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            RUN_AS_USER_MUST_RUN_AS => Ok(Self::MustRunAs),
            RUN_AS_USER_MUST_RUN_AS_RANGE => Ok(Self::MustRunAsRange),
            RUN_AS_USER_MUST_RUN_AS_NON_ROOT => Ok(Self::MustRunAsNonRoot),
            RUN_AS_USER_RUN_AS_ANY => Ok(Self::RunAsAny),
            other => Err(PalisadeError::UnrecognizedStrategy {
                strategy: other.to_string(),
            }),
        }
    }
}

/// Requires one specific UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MustRunAs {
    uid: i64,
}

impl MustRunAs {
    /// Build from options; `uid` is mandatory.
    pub fn new(options: &RunAsUserStrategyOptions) -> PalisadeResult<Self> {
        let uid = options
            .uid
            .ok_or_else(|| PalisadeError::InvalidStrategyOptions {
                strategy: RUN_AS_USER_MUST_RUN_AS.to_string(),
                message: "MustRunAs requires a UID".to_string(),
            })?;
        Ok(Self { uid })
    }
}

impl RunAsUserStrategy for MustRunAs {
    fn generate(&self, _pod: &Pod, _container: &Container) -> PalisadeResult<Option<i64>> {
        Ok(Some(self.uid))
    }

    fn validate(&self, _pod: &Pod, container: &Container, path: &FieldPath) -> Vec<Violation> {
        match explicit_uid(container) {
            Some(uid) if uid != self.uid => vec![Violation::invalid(
                path.child("runAsUser"),
                uid,
                format!(
                    "UID on container {} does not match required UID. Found {}, wanted {}",
                    container.name, uid, self.uid
                ),
            )],
            _ => Vec::new(),
        }
    }
}

/// Requires a UID within an inclusive range; defaults to the range minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MustRunAsRange {
    min: i64,
    max: i64,
}

impl MustRunAsRange {
    /// Build from options; both bounds are mandatory and must be ordered.
    pub fn new(options: &RunAsUserStrategyOptions) -> PalisadeResult<Self> {
        let invalid = |message: String| PalisadeError::InvalidStrategyOptions {
            strategy: RUN_AS_USER_MUST_RUN_AS_RANGE.to_string(),
            message,
        };

        let (Some(min), Some(max)) = (options.uid_range_min, options.uid_range_max) else {
            return Err(invalid("MustRunAsRange requires a UID range".to_string()));
        };
        if min > max {
            return Err(invalid(format!("min of UID range {min} is greater than max {max}")));
        }
        Ok(Self { min, max })
    }
}

impl RunAsUserStrategy for MustRunAsRange {
    fn generate(&self, _pod: &Pod, _container: &Container) -> PalisadeResult<Option<i64>> {
        Ok(Some(self.min))
    }

    fn validate(&self, _pod: &Pod, container: &Container, path: &FieldPath) -> Vec<Violation> {
        match explicit_uid(container) {
            Some(uid) if uid < self.min || uid > self.max => vec![Violation::invalid(
                path.child("runAsUser"),
                uid,
                format!(
                    "UID on container {} does not match required range. Found {}, required min: {} max: {}",
                    container.name, uid, self.min, self.max
                ),
            )],
            _ => Vec::new(),
        }
    }
}

/// Forbids UID 0. The image user is checked downstream via `runAsNonRoot`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MustRunAsNonRoot;

impl RunAsUserStrategy for MustRunAsNonRoot {
    fn generate(&self, _pod: &Pod, _container: &Container) -> PalisadeResult<Option<i64>> {
        Ok(None)
    }

    fn validate(&self, _pod: &Pod, container: &Container, path: &FieldPath) -> Vec<Violation> {
        match explicit_uid(container) {
            Some(0) => vec![Violation::invalid(
                path.child("runAsUser"),
                0,
                format!(
                    "running with the root UID is forbidden on container {}",
                    container.name
                ),
            )],
            _ => Vec::new(),
        }
    }
}

/// No restriction and no default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunAsAny;

impl RunAsUserStrategy for RunAsAny {
    fn generate(&self, _pod: &Pod, _container: &Container) -> PalisadeResult<Option<i64>> {
        Ok(None)
    }

    fn validate(&self, _pod: &Pod, _container: &Container, _path: &FieldPath) -> Vec<Violation> {
        Vec::new()
    }
}

/// The RunAsUser strategy selected by a constraints object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAsUserStrategyKind {
    /// See [`MustRunAs`].
    MustRunAs(MustRunAs),
    /// See [`MustRunAsRange`].
    MustRunAsRange(MustRunAsRange),
    /// See [`MustRunAsNonRoot`].
    MustRunAsNonRoot(MustRunAsNonRoot),
    /// See [`RunAsAny`].
    RunAsAny(RunAsAny),
}

impl RunAsUserStrategyKind {
    /// Build the strategy named by `options.type_`.
    pub fn from_options(options: &RunAsUserStrategyOptions) -> PalisadeResult<Self> {
        Ok(match options.type_.parse::<RunAsUserStrategyType>()? {
            RunAsUserStrategyType::MustRunAs => Self::MustRunAs(MustRunAs::new(options)?),
            RunAsUserStrategyType::MustRunAsRange => {
                Self::MustRunAsRange(MustRunAsRange::new(options)?)
            }
            RunAsUserStrategyType::MustRunAsNonRoot => Self::MustRunAsNonRoot(MustRunAsNonRoot),
            RunAsUserStrategyType::RunAsAny => Self::RunAsAny(RunAsAny),
        })
    }

    /// The strategy type.
    #[must_use]
    pub fn strategy_type(&self) -> RunAsUserStrategyType {
        match self {
            Self::MustRunAs(_) => RunAsUserStrategyType::MustRunAs,
            Self::MustRunAsRange(_) => RunAsUserStrategyType::MustRunAsRange,
            Self::MustRunAsNonRoot(_) => RunAsUserStrategyType::MustRunAsNonRoot,
            Self::RunAsAny(_) => RunAsUserStrategyType::RunAsAny,
        }
    }

    fn inner(&self) -> &dyn RunAsUserStrategy {
        match self {
            Self::MustRunAs(s) => s,
            Self::MustRunAsRange(s) => s,
            Self::MustRunAsNonRoot(s) => s,
            Self::RunAsAny(s) => s,
        }
    }
}

impl RunAsUserStrategy for RunAsUserStrategyKind {
    fn generate(&self, pod: &Pod, container: &Container) -> PalisadeResult<Option<i64>> {
        self.inner().generate(pod, container)
    }

    fn validate(&self, pod: &Pod, container: &Container, path: &FieldPath) -> Vec<Violation> {
        self.inner().validate(pod, container, path)
    }
}
