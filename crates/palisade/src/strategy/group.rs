//! FSGroup and supplemental group strategies.
//!
//! Both attributes share the same two strategies; they differ only in the
//! field name reported in violations.

use std::str::FromStr;

use palisade_api::constraints::{GROUP_MUST_RUN_AS, GROUP_RUN_AS_ANY};
use palisade_api::IdRange;
use palisade_common::{FieldPath, PalisadeError, PalisadeResult, Violation};

/// The recognised group strategy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupStrategyType {
    /// Groups must fall within ranges.
    MustRunAs,
    /// No restriction.
    RunAsAny,
}

impl FromStr for GroupStrategyType {
    type Err = PalisadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            GROUP_MUST_RUN_AS => Ok(Self::MustRunAs),
            GROUP_RUN_AS_ANY => Ok(Self::RunAsAny),
            other => Err(PalisadeError::UnrecognizedStrategy {
                strategy: other.to_string(),
            }),
        }
    }
}

/// Defaulting and validation of a pod's group IDs.
pub trait GroupStrategy: std::fmt::Debug + Send + Sync {
    /// Groups to use when the pod sets none.
    fn generate(&self) -> PalisadeResult<Vec<i64>>;

    /// A single group to use when the pod sets none.
    fn generate_single(&self) -> PalisadeResult<Option<i64>>;

    /// Check the pod's groups. `path` points at the pod security context.
    fn validate(&self, groups: &[i64], path: &FieldPath) -> Vec<Violation>;
}

/// Requires every group to lie within one of the configured ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MustRunAs {
    field: &'static str,
    ranges: Vec<IdRange>,
}

impl MustRunAs {
    /// Build a strategy for `field` over `ranges`.
    pub fn new(field: &'static str, ranges: &[IdRange]) -> PalisadeResult<Self> {
        let invalid = |message: String| PalisadeError::InvalidStrategyOptions {
            strategy: GROUP_MUST_RUN_AS.to_string(),
            message,
        };

        if ranges.is_empty() {
            return Err(invalid(format!("ranges must be supplied for MustRunAs {field}")));
        }
        if let Some(bad) = ranges.iter().find(|r| r.min > r.max) {
            return Err(invalid(format!(
                "{field} range min {} is greater than max {}",
                bad.min, bad.max
            )));
        }

        Ok(Self {
            field,
            ranges: ranges.to_vec(),
        })
    }

    fn is_group_valid(&self, group: i64) -> bool {
        self.ranges.iter().any(|r| r.contains(group))
    }
}

impl GroupStrategy for MustRunAs {
    fn generate(&self) -> PalisadeResult<Vec<i64>> {
        Ok(self.ranges.first().map(|r| r.min).into_iter().collect())
    }

    fn generate_single(&self) -> PalisadeResult<Option<i64>> {
        Ok(self.ranges.first().map(|r| r.min))
    }

    fn validate(&self, groups: &[i64], path: &FieldPath) -> Vec<Violation> {
        let path = path.child(self.field);
        let mut violations = Vec::new();

        if groups.is_empty() {
            violations.push(Violation::invalid(
                path.clone(),
                "[]",
                "unable to validate empty groups against required ranges",
            ));
        }

        for group in groups.iter().copied().filter(|g| !self.is_group_valid(*g)) {
            violations.push(Violation::invalid(
                path.clone(),
                format!("{groups:?}"),
                format!("{group} is not an allowed group"),
            ));
        }

        violations
    }
}

/// No restriction and no default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunAsAny;

impl GroupStrategy for RunAsAny {
    fn generate(&self) -> PalisadeResult<Vec<i64>> {
        Ok(Vec::new())
    }

    fn generate_single(&self) -> PalisadeResult<Option<i64>> {
        Ok(None)
    }

    fn validate(&self, _groups: &[i64], _path: &FieldPath) -> Vec<Violation> {
        Vec::new()
    }
}

/// A group strategy selected by a constraints object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupStrategyKind {
    /// See [`MustRunAs`].
    MustRunAs(MustRunAs),
    /// See [`RunAsAny`].
    RunAsAny(RunAsAny),
}

impl GroupStrategyKind {
    /// Build the strategy named by `type_` for the pod field `field`.
    pub fn from_options(field: &'static str, type_: &str, ranges: &[IdRange]) -> PalisadeResult<Self> {
        Ok(match type_.parse::<GroupStrategyType>()? {
            GroupStrategyType::MustRunAs => Self::MustRunAs(MustRunAs::new(field, ranges)?),
            GroupStrategyType::RunAsAny => Self::RunAsAny(RunAsAny),
        })
    }

    fn inner(&self) -> &dyn GroupStrategy {
        match self {
            Self::MustRunAs(s) => s,
            Self::RunAsAny(s) => s,
        }
    }
}

impl GroupStrategy for GroupStrategyKind {
    fn generate(&self) -> PalisadeResult<Vec<i64>> {
        self.inner().generate()
    }

    fn generate_single(&self) -> PalisadeResult<Option<i64>> {
        self.inner().generate_single()
    }

    fn validate(&self, groups: &[i64], path: &FieldPath) -> Vec<Violation> {
        self.inner().validate(groups, path)
    }
}
