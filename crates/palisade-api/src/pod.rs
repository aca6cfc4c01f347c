//! Pod, container and volume types.
//!
//! Only the fields the admission engine reads or defaults are modelled.

use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

/// A pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Pod specification.
    #[serde(default)]
    pub spec: PodSpec,
}

/// Pod specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Application containers.
    #[serde(default)]
    pub containers: Vec<Container>,

    /// Volumes that can be mounted by containers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Use the host's network namespace.
    #[serde(default)]
    pub host_network: bool,

    /// Use the host's PID namespace.
    #[serde(default, rename = "hostPID")]
    pub host_pid: bool,

    /// Use the host's IPC namespace.
    #[serde(default, rename = "hostIPC")]
    pub host_ipc: bool,

    /// Pod-level security attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,
}

/// Pod-level security attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityContext {
    /// SELinux context applied to all containers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub se_linux_options: Option<SELinuxOptions>,

    /// Group that owns the pod's volumes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_group: Option<i64>,

    /// Additional groups for the first process of each container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplemental_groups: Vec<i64>,
}

/// A container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name.
    #[serde(default)]
    pub name: String,

    /// Image reference.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Exposed ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,

    /// Container security attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,
}

impl Container {
    /// A container with only a name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// A network port in a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    /// Optional port name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Port exposed on the pod IP.
    #[serde(default)]
    pub container_port: i32,

    /// Port exposed on the host; zero means none.
    #[serde(default)]
    pub host_port: i32,
}

/// Container security attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    /// Capabilities to add and drop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,

    /// Run in privileged mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,

    /// SELinux context for the container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub se_linux_options: Option<SELinuxOptions>,

    /// UID of the container entrypoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,

    /// Marker asking the node to refuse a root image user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_as_non_root: Option<bool>,

    /// Mount the root filesystem read-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_root_filesystem: Option<bool>,
}

/// Capability names to add and drop, e.g. `NET_ADMIN`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Added capabilities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<String>,

    /// Dropped capabilities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop: Vec<String>,
}

/// SELinux label fields. Empty strings mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SELinuxOptions {
    /// User component.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    /// Role component.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,

    /// Type component.
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,

    /// Level component.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub level: String,
}

impl SELinuxOptions {
    /// Create options from all four components.
    #[must_use]
    pub fn new(user: &str, role: &str, type_: &str, level: &str) -> Self {
        Self {
            user: user.to_string(),
            role: role.to_string(),
            type_: type_.to_string(),
            level: level.to_string(),
        }
    }
}

/// A named volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume name.
    pub name: String,

    /// Where the volume's data comes from.
    #[serde(flatten)]
    pub source: VolumeSource,
}

/// Volume source. At most one member is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSource {
    /// A directory on the host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathVolumeSource>,

    /// A scratch directory that lives as long as the pod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirVolumeSource>,
}

/// Host path volume source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPathVolumeSource {
    /// Path on the host.
    #[serde(default)]
    pub path: String,
}

/// emptyDir volume source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyDirVolumeSource {
    /// Backing medium.
    #[serde(default)]
    pub medium: StorageMedium,
}

/// Backing medium for an emptyDir volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageMedium {
    /// The node's default disk.
    #[default]
    #[serde(rename = "")]
    Default,
    /// tmpfs.
    Memory,
}

impl std::str::FromStr for StorageMedium {
    type Err = palisade_common::PalisadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "Default" => Ok(Self::Default),
            "Memory" => Ok(Self::Memory),
            other => Err(palisade_common::PalisadeError::Config {
                message: format!("unknown storage medium {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_from_yaml() {
        let pod: Pod = serde_yaml::from_str(
            r#"
metadata:
  name: web
spec:
  hostPID: true
  securityContext:
    fsGroup: 2000
  containers:
    - name: nginx
      ports:
        - containerPort: 80
          hostPort: 8080
      securityContext:
        runAsUser: 1000
        seLinuxOptions:
          level: "s0:c1,c2"
        capabilities:
          add: ["NET_ADMIN"]
  volumes:
    - name: scratch
      emptyDir:
        medium: Memory
    - name: logs
      hostPath:
        path: /var/log
"#,
        )
        .unwrap();

        assert_eq!(pod.metadata.name, "web");
        assert!(pod.spec.host_pid);
        assert!(!pod.spec.host_network);
        assert_eq!(pod.spec.security_context.as_ref().unwrap().fs_group, Some(2000));

        let c = &pod.spec.containers[0];
        assert_eq!(c.ports[0].host_port, 8080);
        let sc = c.security_context.as_ref().unwrap();
        assert_eq!(sc.run_as_user, Some(1000));
        assert_eq!(sc.se_linux_options.as_ref().unwrap().level, "s0:c1,c2");
        assert_eq!(sc.capabilities.as_ref().unwrap().add, vec!["NET_ADMIN"]);
        assert_eq!(sc.privileged, None);

        let scratch = pod.spec.volumes[0].source.empty_dir.as_ref().unwrap();
        assert_eq!(scratch.medium, StorageMedium::Memory);
        assert_eq!(pod.spec.volumes[1].source.host_path.as_ref().unwrap().path, "/var/log");
    }

    #[test]
    fn empty_medium_is_default() {
        let src: EmptyDirVolumeSource = serde_json::from_str(r#"{"medium": ""}"#).unwrap();
        assert_eq!(src.medium, StorageMedium::Default);
        let src: EmptyDirVolumeSource = serde_json::from_str("{}").unwrap();
        assert_eq!(src.medium, StorageMedium::Default);
    }

    #[test]
    fn storage_medium_from_str() {
        assert_eq!("Memory".parse::<StorageMedium>().unwrap(), StorageMedium::Memory);
        assert_eq!("".parse::<StorageMedium>().unwrap(), StorageMedium::Default);
        assert!("Disk".parse::<StorageMedium>().is_err());
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let sc = SecurityContext {
            run_as_user: Some(7),
            ..SecurityContext::default()
        };
        insta::assert_snapshot!(serde_json::to_string(&sc).unwrap(), @r#"{"runAsUser":7}"#);
    }
}
