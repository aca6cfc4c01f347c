//! SecurityContextConstraints types.
//!
//! Strategy `type` fields are plain strings, exactly as they appear in a
//! manifest. An unknown type therefore survives deserialization and is
//! reported when a provider is built from the constraints.

use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;
use crate::pod::SELinuxOptions;

/// RunAsUser: a single fixed UID.
pub const RUN_AS_USER_MUST_RUN_AS: &str = "MustRunAs";
/// RunAsUser: any UID within an inclusive range.
pub const RUN_AS_USER_MUST_RUN_AS_RANGE: &str = "MustRunAsRange";
/// RunAsUser: any UID but root.
pub const RUN_AS_USER_MUST_RUN_AS_NON_ROOT: &str = "MustRunAsNonRoot";
/// RunAsUser: anything goes.
pub const RUN_AS_USER_RUN_AS_ANY: &str = "RunAsAny";

/// SELinux: a fixed context.
pub const SELINUX_MUST_RUN_AS: &str = "MustRunAs";
/// SELinux: anything goes.
pub const SELINUX_RUN_AS_ANY: &str = "RunAsAny";

/// FSGroup / SupplementalGroups: groups must fall within ranges.
pub const GROUP_MUST_RUN_AS: &str = "MustRunAs";
/// FSGroup / SupplementalGroups: anything goes.
pub const GROUP_RUN_AS_ANY: &str = "RunAsAny";

/// Wildcard entry for `allowedCapabilities`.
pub const ALLOW_ALL_CAPABILITIES: &str = "*";

/// A named policy constraining what security-sensitive settings a pod may request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContextConstraints {
    /// Object metadata; the name identifies the SCC in diagnostics and ordering.
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Admission ordering; higher is tried first, unset counts as zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    /// Allow containers to run privileged.
    #[serde(default)]
    pub allow_privileged_container: bool,

    /// Capabilities added to every container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_add_capabilities: Vec<String>,

    /// Capabilities every container must drop.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_drop_capabilities: Vec<String>,

    /// Capabilities a container may add on request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_capabilities: Vec<String>,

    /// Allow hostPath volumes.
    #[serde(default)]
    pub allow_host_dir_volume_plugin: bool,

    /// Allow the host network namespace.
    #[serde(default)]
    pub allow_host_network: bool,

    /// Allow host ports.
    #[serde(default)]
    pub allow_host_ports: bool,

    /// Allow the host PID namespace.
    #[serde(default, rename = "allowHostPID")]
    pub allow_host_pid: bool,

    /// Allow the host IPC namespace.
    #[serde(default, rename = "allowHostIPC")]
    pub allow_host_ipc: bool,

    /// Require a read-only root filesystem.
    #[serde(default)]
    pub read_only_root_filesystem: bool,

    /// SELinux context strategy.
    pub se_linux_context: SELinuxContextStrategyOptions,

    /// RunAsUser strategy.
    pub run_as_user: RunAsUserStrategyOptions,

    /// FSGroup strategy.
    #[serde(default)]
    pub fs_group: FsGroupStrategyOptions,

    /// Supplemental groups strategy.
    #[serde(default)]
    pub supplemental_groups: SupplementalGroupsStrategyOptions,
}

impl SecurityContextConstraints {
    /// A constraints object with every strategy set to `RunAsAny` and every
    /// host feature disallowed.
    #[must_use]
    pub fn run_as_any(name: &str) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            ..Self::default()
        }
    }

    /// The SCC name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// RunAsUser strategy options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAsUserStrategyOptions {
    /// Strategy type.
    #[serde(rename = "type")]
    pub type_: String,

    /// UID for `MustRunAs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,

    /// Lower bound for `MustRunAsRange`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid_range_min: Option<i64>,

    /// Upper bound for `MustRunAsRange`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid_range_max: Option<i64>,
}

impl RunAsUserStrategyOptions {
    /// `MustRunAs` with a fixed UID.
    #[must_use]
    pub fn must_run_as(uid: i64) -> Self {
        Self {
            uid: Some(uid),
            ..Self::of_type(RUN_AS_USER_MUST_RUN_AS)
        }
    }

    /// `MustRunAsRange` over `[min, max]`.
    #[must_use]
    pub fn must_run_as_range(min: i64, max: i64) -> Self {
        Self {
            uid_range_min: Some(min),
            uid_range_max: Some(max),
            ..Self::of_type(RUN_AS_USER_MUST_RUN_AS_RANGE)
        }
    }

    /// Options of the given type with no parameters.
    #[must_use]
    pub fn of_type(type_: &str) -> Self {
        Self {
            type_: type_.to_string(),
            uid: None,
            uid_range_min: None,
            uid_range_max: None,
        }
    }
}

impl Default for RunAsUserStrategyOptions {
    fn default() -> Self {
        Self::of_type(RUN_AS_USER_RUN_AS_ANY)
    }
}

/// SELinux context strategy options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SELinuxContextStrategyOptions {
    /// Strategy type.
    #[serde(rename = "type")]
    pub type_: String,

    /// Required context for `MustRunAs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub se_linux_options: Option<SELinuxOptions>,
}

impl SELinuxContextStrategyOptions {
    /// `MustRunAs` with the given options.
    #[must_use]
    pub fn must_run_as(options: SELinuxOptions) -> Self {
        Self {
            type_: SELINUX_MUST_RUN_AS.to_string(),
            se_linux_options: Some(options),
        }
    }
}

impl Default for SELinuxContextStrategyOptions {
    fn default() -> Self {
        Self {
            type_: SELINUX_RUN_AS_ANY.to_string(),
            se_linux_options: None,
        }
    }
}

/// An inclusive range of IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRange {
    /// Lowest allowed ID.
    pub min: i64,
    /// Highest allowed ID.
    pub max: i64,
}

impl IdRange {
    /// Create a range.
    #[must_use]
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Whether `id` lies within the range.
    #[must_use]
    pub const fn contains(&self, id: i64) -> bool {
        id >= self.min && id <= self.max
    }
}

/// FSGroup strategy options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsGroupStrategyOptions {
    /// Strategy type.
    #[serde(rename = "type")]
    pub type_: String,

    /// Allowed ranges for `MustRunAs`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<IdRange>,
}

impl FsGroupStrategyOptions {
    /// `MustRunAs` over the given ranges.
    #[must_use]
    pub fn must_run_as(ranges: Vec<IdRange>) -> Self {
        Self {
            type_: GROUP_MUST_RUN_AS.to_string(),
            ranges,
        }
    }
}

impl Default for FsGroupStrategyOptions {
    fn default() -> Self {
        Self {
            type_: GROUP_RUN_AS_ANY.to_string(),
            ranges: Vec::new(),
        }
    }
}

/// Supplemental groups strategy options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplementalGroupsStrategyOptions {
    /// Strategy type.
    #[serde(rename = "type")]
    pub type_: String,

    /// Allowed ranges for `MustRunAs`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<IdRange>,
}

impl SupplementalGroupsStrategyOptions {
    /// `MustRunAs` over the given ranges.
    #[must_use]
    pub fn must_run_as(ranges: Vec<IdRange>) -> Self {
        Self {
            type_: GROUP_MUST_RUN_AS.to_string(),
            ranges,
        }
    }
}

impl Default for SupplementalGroupsStrategyOptions {
    fn default() -> Self {
        Self {
            type_: GROUP_RUN_AS_ANY.to_string(),
            ranges: Vec::new(),
        }
    }
}
