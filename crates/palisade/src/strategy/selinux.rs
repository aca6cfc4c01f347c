//! SELinux context strategies.

use std::fmt;
use std::str::FromStr;

use palisade_api::constraints::{SELINUX_MUST_RUN_AS, SELINUX_RUN_AS_ANY};
use palisade_api::{Container, Pod, SELinuxContextStrategyOptions, SELinuxOptions};
use palisade_common::{FieldPath, PalisadeError, PalisadeResult, Violation};

/// Defaulting and validation of SELinux options.
pub trait SELinuxStrategy: fmt::Debug + Send + Sync {
    /// The options to use when none are set. `None` leaves them unset.
    fn generate(&self, pod: &Pod, container: &Container) -> PalisadeResult<Option<SELinuxOptions>>;

    /// Check explicit options belonging to `subject`. `path` points at the
    /// object holding `seLinuxOptions`.
    fn validate_options(
        &self,
        options: Option<&SELinuxOptions>,
        subject: &str,
        path: &FieldPath,
    ) -> Vec<Violation>;

    /// Check the container's explicit options.
    fn validate(&self, _pod: &Pod, container: &Container, path: &FieldPath) -> Vec<Violation> {
        let options = container
            .security_context
            .as_ref()
            .and_then(|sc| sc.se_linux_options.as_ref());
        self.validate_options(options, &container.name, path)
    }
}

/// The recognised SELinux strategy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SELinuxStrategyType {
    /// A fixed context.
    MustRunAs,
    /// No restriction.
    RunAsAny,
}

impl FromStr for SELinuxStrategyType {
    type Err = PalisadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            SELINUX_MUST_RUN_AS => Ok(Self::MustRunAs),
            SELINUX_RUN_AS_ANY => Ok(Self::RunAsAny),
            other => Err(PalisadeError::UnrecognizedStrategy {
                strategy: other.to_string(),
            }),
        }
    }
}

/// Requires a specific SELinux context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MustRunAs {
    options: SELinuxOptions,
}

impl MustRunAs {
    /// Build from options; `seLinuxOptions` is mandatory.
    pub fn new(options: &SELinuxContextStrategyOptions) -> PalisadeResult<Self> {
        let options = options.se_linux_options.clone().ok_or_else(|| {
            PalisadeError::InvalidStrategyOptions {
                strategy: SELINUX_MUST_RUN_AS.to_string(),
                message: "MustRunAs requires SELinuxContextStrategyOptions".to_string(),
            }
        })?;
        Ok(Self { options })
    }
}

impl SELinuxStrategy for MustRunAs {
    fn generate(&self, _pod: &Pod, _container: &Container) -> PalisadeResult<Option<SELinuxOptions>> {
        Ok(Some(self.options.clone()))
    }

    fn validate_options(
        &self,
        options: Option<&SELinuxOptions>,
        subject: &str,
        path: &FieldPath,
    ) -> Vec<Violation> {
        let Some(found) = options else {
            return Vec::new();
        };

        let path = path.child("seLinuxOptions");
        let wanted = &self.options;
        [
            ("level", &found.level, &wanted.level),
            ("user", &found.user, &wanted.user),
            ("role", &found.role, &wanted.role),
            ("type", &found.type_, &wanted.type_),
        ]
        .into_iter()
        .filter(|(_, found, wanted)| found != wanted)
        .map(|(name, found, wanted)| {
            Violation::invalid(
                path.child(name),
                found,
                format!(
                    "seLinuxOptions.{name} on {subject} does not match required {name}. Found {found}, wanted {wanted}"
                ),
            )
        })
        .collect()
    }
}

/// No restriction and no default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunAsAny;

impl SELinuxStrategy for RunAsAny {
    fn generate(&self, _pod: &Pod, _container: &Container) -> PalisadeResult<Option<SELinuxOptions>> {
        Ok(None)
    }

    fn validate_options(
        &self,
        _options: Option<&SELinuxOptions>,
        _subject: &str,
        _path: &FieldPath,
    ) -> Vec<Violation> {
        Vec::new()
    }
}

/// The SELinux strategy selected by a constraints object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SELinuxStrategyKind {
    /// See [`MustRunAs`].
    MustRunAs(MustRunAs),
    /// See [`RunAsAny`].
    RunAsAny(RunAsAny),
}

impl SELinuxStrategyKind {
    /// Build the strategy named by `options.type_`.
    pub fn from_options(options: &SELinuxContextStrategyOptions) -> PalisadeResult<Self> {
        Ok(match options.type_.parse::<SELinuxStrategyType>()? {
            SELinuxStrategyType::MustRunAs => Self::MustRunAs(MustRunAs::new(options)?),
            SELinuxStrategyType::RunAsAny => Self::RunAsAny(RunAsAny),
        })
    }

    fn inner(&self) -> &dyn SELinuxStrategy {
        match self {
            Self::MustRunAs(s) => s,
            Self::RunAsAny(s) => s,
        }
    }
}

impl SELinuxStrategy for SELinuxStrategyKind {
    fn generate(&self, pod: &Pod, container: &Container) -> PalisadeResult<Option<SELinuxOptions>> {
        self.inner().generate(pod, container)
    }

    fn validate_options(
        &self,
        options: Option<&SELinuxOptions>,
        subject: &str,
        path: &FieldPath,
    ) -> Vec<Violation> {
        self.inner().validate_options(options, subject, path)
    }
}
