//! The constraint provider.
//!
//! A [`ConstraintProvider`] is built once from a [`SecurityContextConstraints`]
//! object. It selects one strategy per security attribute and then defaults
//! and validates pod and container security contexts against them.
//!
//! Defaulting never touches the caller's pod: every `create_*` operation works
//! on a clone and returns it.

use palisade_api::{
    Container, Pod, PodSecurityContext, SecurityContext, SecurityContextConstraints,
};
use palisade_common::{FieldPath, PalisadeResult, Violation};
use tracing::debug;

use crate::strategy::group::GroupStrategy;
use crate::strategy::selinux::SELinuxStrategy;
use crate::strategy::user::{RunAsUserStrategy, RunAsUserStrategyType};
use crate::strategy::{
    CapabilitiesStrategy, GroupStrategyKind, RunAsUserStrategyKind, SELinuxStrategyKind,
};

/// Defaults and validates security contexts for one constraints object.
#[derive(Debug, Clone)]
pub struct ConstraintProvider {
    constraints: SecurityContextConstraints,
    run_as_user: RunAsUserStrategyKind,
    se_linux: SELinuxStrategyKind,
    fs_group: GroupStrategyKind,
    supplemental_groups: GroupStrategyKind,
    capabilities: CapabilitiesStrategy,
}

impl ConstraintProvider {
    /// Build a provider, selecting every strategy from its type tag.
    ///
    /// Fails on an unrecognised strategy type or structurally invalid options.
    pub fn new(constraints: SecurityContextConstraints) -> PalisadeResult<Self> {
        let run_as_user = RunAsUserStrategyKind::from_options(&constraints.run_as_user)?;
        let se_linux = SELinuxStrategyKind::from_options(&constraints.se_linux_context)?;
        let fs_group = GroupStrategyKind::from_options(
            "fsGroup",
            &constraints.fs_group.type_,
            &constraints.fs_group.ranges,
        )?;
        let supplemental_groups = GroupStrategyKind::from_options(
            "supplementalGroups",
            &constraints.supplemental_groups.type_,
            &constraints.supplemental_groups.ranges,
        )?;
        let capabilities = CapabilitiesStrategy::new(&constraints);

        debug!(
            scc = %constraints.name(),
            run_as_user = %constraints.run_as_user.type_,
            se_linux = %constraints.se_linux_context.type_,
            fs_group = %constraints.fs_group.type_,
            supplemental_groups = %constraints.supplemental_groups.type_,
            "built constraint provider"
        );

        Ok(Self {
            constraints,
            run_as_user,
            se_linux,
            fs_group,
            supplemental_groups,
            capabilities,
        })
    }

    /// The SCC name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.constraints.name()
    }

    /// The constraints this provider enforces.
    #[must_use]
    pub const fn constraints(&self) -> &SecurityContextConstraints {
        &self.constraints
    }

    /// A defaulted copy of the container's security context.
    pub fn create_security_context(
        &self,
        pod: &Pod,
        container: &Container,
    ) -> PalisadeResult<SecurityContext> {
        let mut sc = container.security_context.clone().unwrap_or_default();

        if sc.run_as_user.is_none() {
            sc.run_as_user = self.run_as_user.generate(pod, container)?;
        }

        if sc.se_linux_options.is_none() {
            sc.se_linux_options = self.se_linux.generate(pod, container)?;
        }

        if sc.privileged.is_none() {
            sc.privileged = Some(false);
        }

        // Non-root without a concrete UID is enforced by the kubelet.
        if self.run_as_user.strategy_type() == RunAsUserStrategyType::MustRunAsNonRoot {
            sc.run_as_non_root = Some(true);
        }

        sc.capabilities = self.capabilities.generate(pod, container)?;

        if self.constraints.read_only_root_filesystem && sc.read_only_root_filesystem.is_none() {
            sc.read_only_root_filesystem = Some(true);
        }

        Ok(sc)
    }

    /// Check a container and the pod-wide host settings.
    ///
    /// `path` is the field path of the pod spec. A container without a
    /// security context yields a single violation.
    pub fn validate_security_context(
        &self,
        pod: &Pod,
        container: &Container,
        path: &FieldPath,
    ) -> Vec<Violation> {
        let mut violations = self.validate_container_security_context(pod, container, path);
        if container.security_context.is_none() {
            return violations;
        }
        violations.extend(self.validate_host_access(pod, path));
        violations
    }

    /// Check the settings scoped to one container. `path` points at the
    /// container; its security context is reported under `securityContext`.
    pub fn validate_container_security_context(
        &self,
        pod: &Pod,
        container: &Container,
        path: &FieldPath,
    ) -> Vec<Violation> {
        let sc_path = path.child("securityContext");
        let Some(sc) = container.security_context.as_ref() else {
            return vec![Violation::invalid(sc_path, "nil", "No security context is set")];
        };

        let mut violations = self.run_as_user.validate(pod, container, &sc_path);
        violations.extend(self.se_linux.validate(pod, container, &sc_path));

        if !self.constraints.allow_privileged_container && sc.privileged == Some(true) {
            violations.push(Violation::invalid(
                sc_path.child("privileged"),
                true,
                "Privileged containers are not allowed",
            ));
        }

        violations.extend(self.capabilities.validate(pod, container, &sc_path));

        if self.constraints.read_only_root_filesystem {
            let field = sc_path.child("readOnlyRootFilesystem");
            match sc.read_only_root_filesystem {
                None => violations.push(Violation::invalid(
                    field,
                    "nil",
                    "ReadOnlyRootFilesystem may not be nil and must be set to true",
                )),
                Some(false) => violations.push(Violation::invalid(
                    field,
                    false,
                    "ReadOnlyRootFilesystem must be set to true",
                )),
                Some(true) => {}
            }
        }

        violations
    }

    /// Check host volumes, namespaces and ports across the whole pod.
    /// `path` points at the pod spec.
    pub fn validate_host_access(&self, pod: &Pod, path: &FieldPath) -> Vec<Violation> {
        let mut violations = Vec::new();

        if !self.constraints.allow_host_dir_volume_plugin {
            for (idx, volume) in pod.spec.volumes.iter().enumerate() {
                if volume.source.host_path.is_some() {
                    violations.push(Violation::invalid(
                        path.child("volumes").index(idx),
                        &volume.name,
                        "hostPath volumes are not allowed to be used",
                    ));
                }
            }
        }

        let host_namespaces = [
            (
                "hostNetwork",
                pod.spec.host_network,
                self.constraints.allow_host_network,
                "Host network is not allowed to be used",
            ),
            (
                "hostPID",
                pod.spec.host_pid,
                self.constraints.allow_host_pid,
                "Host PID is not allowed to be used",
            ),
            (
                "hostIPC",
                pod.spec.host_ipc,
                self.constraints.allow_host_ipc,
                "Host IPC is not allowed to be used",
            ),
        ];
        for (field, requested, allowed, detail) in host_namespaces {
            if requested && !allowed {
                violations.push(Violation::invalid(path.child(field), requested, detail));
            }
        }

        if !self.constraints.allow_host_ports {
            for (idx, c) in pod.spec.containers.iter().enumerate() {
                for port in c.ports.iter().filter(|p| p.host_port > 0) {
                    violations.push(Violation::invalid(
                        path.child("containers").index(idx).child("hostPort"),
                        port.host_port,
                        "Host ports are not allowed to be used",
                    ));
                }
            }
        }

        violations
    }

    /// A defaulted copy of the pod's security context.
    pub fn create_pod_security_context(&self, pod: &Pod) -> PalisadeResult<PodSecurityContext> {
        let mut psc = pod.spec.security_context.clone().unwrap_or_default();

        if psc.fs_group.is_none() {
            psc.fs_group = self.fs_group.generate_single()?;
        }

        if psc.supplemental_groups.is_empty() {
            psc.supplemental_groups = self.supplemental_groups.generate()?;
        }

        if psc.se_linux_options.is_none() {
            psc.se_linux_options = self.se_linux.generate(pod, &Container::default())?;
        }

        Ok(psc)
    }

    /// Check the pod-level security context. `path` points at it.
    pub fn validate_pod_security_context(&self, pod: &Pod, path: &FieldPath) -> Vec<Violation> {
        let default_psc = PodSecurityContext::default();
        let psc = pod.spec.security_context.as_ref().unwrap_or(&default_psc);

        let fs_group: Vec<i64> = psc.fs_group.into_iter().collect();
        let mut violations = self.fs_group.validate(&fs_group, path);
        violations.extend(
            self.supplemental_groups
                .validate(&psc.supplemental_groups, path),
        );
        // A fixed SELinux context must be present on the pod once defaulted.
        if matches!(self.se_linux, SELinuxStrategyKind::MustRunAs(_))
            && psc.se_linux_options.is_none()
        {
            violations.push(Violation::required(path.child("seLinuxOptions"), ""));
        }
        violations.extend(self.se_linux.validate_options(
            psc.se_linux_options.as_ref(),
            &pod.metadata.name,
            path,
        ));

        violations
    }
}

#[cfg(test)]
mod tests {
    use palisade_api::{
        Capabilities, ContainerPort, FsGroupStrategyOptions, HostPathVolumeSource, IdRange,
        RunAsUserStrategyOptions, SELinuxContextStrategyOptions, SELinuxOptions,
        SupplementalGroupsStrategyOptions, Volume, VolumeSource,
    };
    use palisade_common::PalisadeError;

    use super::*;

    fn pod_with(container: Container) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = "web".to_string();
        pod.spec.containers.push(container);
        pod
    }

    fn with_sc(sc: SecurityContext) -> Container {
        Container {
            name: "app".to_string(),
            security_context: Some(sc),
            ..Container::default()
        }
    }

    fn spec_path() -> FieldPath {
        FieldPath::new("spec")
    }

    #[test]
    fn rejects_unknown_strategy_type() {
        let mut scc = SecurityContextConstraints::run_as_any("bad");
        scc.run_as_user = RunAsUserStrategyOptions::of_type("Sometimes");
        let err = ConstraintProvider::new(scc).unwrap_err();
        assert!(matches!(err, PalisadeError::UnrecognizedStrategy { .. }));
    }

    #[test]
    fn create_fills_unset_fields_only() {
        let mut scc = SecurityContextConstraints::run_as_any("restricted");
        scc.run_as_user = RunAsUserStrategyOptions::must_run_as(1);
        scc.se_linux_context =
            SELinuxContextStrategyOptions::must_run_as(SELinuxOptions::new("you", "", "", ""));
        let provider = ConstraintProvider::new(scc).unwrap();

        let container = with_sc(SecurityContext {
            run_as_user: Some(7),
            privileged: Some(true),
            ..SecurityContext::default()
        });
        let pod = pod_with(container.clone());
        let sc = provider.create_security_context(&pod, &container).unwrap();

        assert_eq!(sc.run_as_user, Some(7));
        assert_eq!(sc.privileged, Some(true));
        assert_eq!(sc.se_linux_options.unwrap().user, "you");
    }

    #[test]
    fn create_marks_non_root() {
        let mut scc = SecurityContextConstraints::run_as_any("nonroot");
        scc.run_as_user = RunAsUserStrategyOptions::of_type("MustRunAsNonRoot");
        let provider = ConstraintProvider::new(scc).unwrap();

        let container = Container::named("app");
        let sc = provider
            .create_security_context(&pod_with(container.clone()), &container)
            .unwrap();
        assert_eq!(sc.run_as_non_root, Some(true));
        assert_eq!(sc.run_as_user, None);
    }

    #[test]
    fn create_read_only_root_filesystem() {
        let mut scc = SecurityContextConstraints::run_as_any("ro");
        scc.read_only_root_filesystem = true;
        let provider = ConstraintProvider::new(scc).unwrap();
        let permissive =
            ConstraintProvider::new(SecurityContextConstraints::run_as_any("rw")).unwrap();

        let unset = Container::named("app");
        let explicit_false = with_sc(SecurityContext {
            read_only_root_filesystem: Some(false),
            ..SecurityContext::default()
        });

        let sc = provider.create_security_context(&pod_with(unset.clone()), &unset).unwrap();
        assert_eq!(sc.read_only_root_filesystem, Some(true));

        let sc = provider
            .create_security_context(&pod_with(explicit_false.clone()), &explicit_false)
            .unwrap();
        assert_eq!(sc.read_only_root_filesystem, Some(false));

        let sc = permissive.create_security_context(&pod_with(unset.clone()), &unset).unwrap();
        assert_eq!(sc.read_only_root_filesystem, None);
    }

    #[test]
    fn validate_read_only_root_filesystem() {
        let mut scc = SecurityContextConstraints::run_as_any("ro");
        scc.read_only_root_filesystem = true;
        let provider = ConstraintProvider::new(scc).unwrap();

        let check = |value: Option<bool>| {
            let c = with_sc(SecurityContext {
                read_only_root_filesystem: value,
                ..SecurityContext::default()
            });
            provider.validate_security_context(&pod_with(c.clone()), &c, &spec_path())
        };

        assert_eq!(
            check(None)[0].detail,
            "ReadOnlyRootFilesystem may not be nil and must be set to true"
        );
        assert_eq!(check(Some(false))[0].detail, "ReadOnlyRootFilesystem must be set to true");
        assert!(check(Some(true)).is_empty());
    }

    #[test]
    fn validate_reports_host_features() {
        let provider =
            ConstraintProvider::new(SecurityContextConstraints::run_as_any("restricted")).unwrap();

        let mut container = with_sc(SecurityContext {
            privileged: Some(true),
            capabilities: Some(Capabilities {
                add: vec!["NET_ADMIN".to_string()],
                drop: Vec::new(),
            }),
            ..SecurityContext::default()
        });
        container.ports.push(ContainerPort {
            host_port: 8080,
            container_port: 80,
            ..ContainerPort::default()
        });
        let mut pod = pod_with(container.clone());
        pod.spec.host_network = true;
        pod.spec.host_pid = true;
        pod.spec.host_ipc = true;
        pod.spec.volumes.push(Volume {
            name: "root".to_string(),
            source: VolumeSource {
                host_path: Some(HostPathVolumeSource {
                    path: "/".to_string(),
                }),
                ..VolumeSource::default()
            },
        });

        let details: Vec<String> = provider
            .validate_security_context(&pod, &container, &spec_path())
            .into_iter()
            .map(|v| format!("{}: {}", v.field, v.detail))
            .collect();

        assert_eq!(
            details,
            vec![
                "spec.securityContext.privileged: Privileged containers are not allowed",
                "spec.securityContext.capabilities.add: capability may not be added",
                "spec.volumes[0]: hostPath volumes are not allowed to be used",
                "spec.hostNetwork: Host network is not allowed to be used",
                "spec.hostPID: Host PID is not allowed to be used",
                "spec.hostIPC: Host IPC is not allowed to be used",
                "spec.containers[0].hostPort: Host ports are not allowed to be used",
            ]
        );
    }

    #[test]
    fn pod_level_defaults_and_validation() {
        let mut scc = SecurityContextConstraints::run_as_any("groups");
        scc.fs_group = FsGroupStrategyOptions::must_run_as(vec![IdRange::new(1000, 2000)]);
        scc.supplemental_groups =
            SupplementalGroupsStrategyOptions::must_run_as(vec![IdRange::new(5000, 5005)]);
        let provider = ConstraintProvider::new(scc).unwrap();

        let pod = pod_with(Container::named("app"));
        let psc = provider.create_pod_security_context(&pod).unwrap();
        assert_eq!(psc.fs_group, Some(1000));
        assert_eq!(psc.supplemental_groups, vec![5000]);
        assert!(pod.spec.security_context.is_none());

        let path = FieldPath::new("spec").child("securityContext");
        let errs = provider.validate_pod_security_context(&pod, &path);
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].field.as_str(), "spec.securityContext.fsGroup");

        let mut defaulted = pod.clone();
        defaulted.spec.security_context = Some(psc);
        assert!(provider.validate_pod_security_context(&defaulted, &path).is_empty());
    }

    #[test]
    fn pod_level_selinux_must_be_set() {
        let mut scc = SecurityContextConstraints::run_as_any("selinux");
        scc.se_linux_context =
            SELinuxContextStrategyOptions::must_run_as(SELinuxOptions::new("", "", "", "foo"));
        let provider = ConstraintProvider::new(scc).unwrap();
        let path = FieldPath::new("spec").child("securityContext");

        let pod = pod_with(Container::named("app"));
        let errs = provider.validate_pod_security_context(&pod, &path);
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs[0].to_string(),
            "spec.securityContext.seLinuxOptions: Required value"
        );

        let mut defaulted = pod.clone();
        defaulted.spec.security_context = Some(provider.create_pod_security_context(&pod).unwrap());
        assert!(provider.validate_pod_security_context(&defaulted, &path).is_empty());

        let open = ConstraintProvider::new(SecurityContextConstraints::run_as_any("open")).unwrap();
        assert!(open.validate_pod_security_context(&pod, &path).is_empty());
    }
}
