//! Capability defaulting and validation.

use std::collections::BTreeSet;

use palisade_api::constraints::ALLOW_ALL_CAPABILITIES;
use palisade_api::{Capabilities, Container, Pod, SecurityContextConstraints};
use palisade_common::{FieldPath, PalisadeResult, Violation};

/// Adds default capabilities, enforces required drops and checks requested adds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitiesStrategy {
    default_add: BTreeSet<String>,
    required_drop: BTreeSet<String>,
    allowed: BTreeSet<String>,
}

impl CapabilitiesStrategy {
    /// Build from the capability lists of a constraints object.
    #[must_use]
    pub fn new(constraints: &SecurityContextConstraints) -> Self {
        Self {
            default_add: constraints.default_add_capabilities.iter().cloned().collect(),
            required_drop: constraints.required_drop_capabilities.iter().cloned().collect(),
            allowed: constraints.allowed_capabilities.iter().cloned().collect(),
        }
    }

    fn requires_any(&self) -> bool {
        !self.default_add.is_empty() || !self.required_drop.is_empty()
    }

    /// The capabilities the container should run with.
    ///
    /// Default adds that the container explicitly drops are skipped. Returns
    /// `None` when both the container and the constraints are empty.
    pub fn generate(&self, _pod: &Pod, container: &Container) -> PalisadeResult<Option<Capabilities>> {
        let requested = container
            .security_context
            .as_ref()
            .and_then(|sc| sc.capabilities.as_ref());

        let container_add: BTreeSet<&String> =
            requested.map(|c| c.add.iter().collect()).unwrap_or_default();
        let container_drop: BTreeSet<&String> =
            requested.map(|c| c.drop.iter().collect()).unwrap_or_default();

        let add: BTreeSet<&String> = self
            .default_add
            .iter()
            .filter(|cap| !container_drop.contains(cap))
            .chain(container_add)
            .collect();
        let drop: BTreeSet<&String> = self.required_drop.iter().chain(container_drop).collect();

        if add.is_empty() && drop.is_empty() {
            return Ok(None);
        }

        Ok(Some(Capabilities {
            add: add.into_iter().cloned().collect(),
            drop: drop.into_iter().cloned().collect(),
        }))
    }

    /// Check the container's capabilities. `path` points at the security context.
    pub fn validate(&self, _pod: &Pod, container: &Container, path: &FieldPath) -> Vec<Violation> {
        let path = path.child("capabilities");
        let requested = container
            .security_context
            .as_ref()
            .and_then(|sc| sc.capabilities.as_ref());
        let Some(caps) = requested else {
            if !self.requires_any() {
                return Vec::new();
            }
            return vec![Violation::invalid(
                path,
                "nil",
                "required capabilities are not set on the securityContext",
            )];
        };

        let allow_all = self.allowed.contains(ALLOW_ALL_CAPABILITIES);
        let mut violations: Vec<Violation> = caps
            .add
            .iter()
            .filter(|cap| !allow_all && !self.default_add.contains(*cap) && !self.allowed.contains(*cap))
            .map(|cap| Violation::invalid(path.child("add"), cap, "capability may not be added"))
            .collect();

        let dropped: BTreeSet<&String> = caps.drop.iter().collect();
        violations.extend(
            self.required_drop
                .iter()
                .filter(|cap| !dropped.contains(cap))
                .map(|cap| {
                    Violation::invalid(
                        path.child("drop"),
                        format!("{:?}", caps.drop),
                        format!("{cap} is required to be dropped but was not found"),
                    )
                }),
        );

        violations
    }
}

#[cfg(test)]
mod tests {
    use palisade_api::SecurityContext;

    use super::*;

    fn strategy(default_add: &[&str], required_drop: &[&str], allowed: &[&str]) -> CapabilitiesStrategy {
        let to_vec = |caps: &[&str]| caps.iter().map(ToString::to_string).collect();
        let mut scc = SecurityContextConstraints::run_as_any("caps");
        scc.default_add_capabilities = to_vec(default_add);
        scc.required_drop_capabilities = to_vec(required_drop);
        scc.allowed_capabilities = to_vec(allowed);
        CapabilitiesStrategy::new(&scc)
    }

    fn container(caps: Option<(&[&str], &[&str])>) -> Container {
        Container {
            name: "app".to_string(),
            security_context: Some(SecurityContext {
                capabilities: caps.map(|(add, drop)| Capabilities {
                    add: add.iter().map(ToString::to_string).collect(),
                    drop: drop.iter().map(ToString::to_string).collect(),
                }),
                ..SecurityContext::default()
            }),
            ..Container::default()
        }
    }

    #[test]
    fn generate_nothing_when_nothing_required() {
        let s = strategy(&[], &[], &["NET_ADMIN"]);
        assert_eq!(s.generate(&Pod::default(), &container(None)).unwrap(), None);
    }

    #[test]
    fn generate_merges_defaults_and_drops() {
        let s = strategy(&["NET_BIND_SERVICE", "CHOWN"], &["KILL"], &[]);
        let caps = s
            .generate(&Pod::default(), &container(Some((&["SYS_TIME"], &["CHOWN"]))))
            .unwrap()
            .unwrap();
        assert_eq!(caps.add, vec!["NET_BIND_SERVICE", "SYS_TIME"]);
        assert_eq!(caps.drop, vec!["CHOWN", "KILL"]);
    }

    #[test]
    fn validate_rejects_unlisted_adds() {
        let s = strategy(&[], &[], &[]);
        let errs = s.validate(
            &Pod::default(),
            &container(Some((&["foo"], &[]))),
            &FieldPath::new("securityContext"),
        );
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field.as_str(), "securityContext.capabilities.add");
        assert_eq!(errs[0].detail, "capability may not be added");
    }

    #[test]
    fn validate_accepts_allowed_default_and_wildcard() {
        let pod = Pod::default();
        let path = FieldPath::root();
        let c = container(Some((&["foo"], &[])));

        assert!(strategy(&[], &[], &["foo"]).validate(&pod, &c, &path).is_empty());
        assert!(strategy(&["foo"], &[], &[]).validate(&pod, &c, &path).is_empty());
        assert!(strategy(&[], &[], &["*"]).validate(&pod, &c, &path).is_empty());
    }

    #[test]
    fn validate_required_drops() {
        let s = strategy(&[], &["KILL", "MKNOD"], &[]);
        let pod = Pod::default();
        let path = FieldPath::root();

        let errs = s.validate(&pod, &container(None), &path);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].detail, "required capabilities are not set on the securityContext");

        let errs = s.validate(&pod, &container(Some((&[], &["KILL"]))), &path);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].detail, "MKNOD is required to be dropped but was not found");

        assert!(s
            .validate(&pod, &container(Some((&[], &["MKNOD", "KILL"]))), &path)
            .is_empty());
    }
}
