//! Admission of pods against a set of constraints.
//!
//! Constraints are tried in order: highest priority first, then the most
//! restrictive, then by name. The first one under which the defaulted pod
//! validates cleanly admits it.

use std::fmt;

use miette::Diagnostic;
use palisade_api::constraints::{
    RUN_AS_USER_MUST_RUN_AS, RUN_AS_USER_MUST_RUN_AS_NON_ROOT, RUN_AS_USER_MUST_RUN_AS_RANGE,
    SELINUX_MUST_RUN_AS,
};
use palisade_api::{Pod, SecurityContextConstraints};
use palisade_common::{FieldPath, PalisadeResult, Violation, field};
use thiserror::Error;
use tracing::{debug, info};

use crate::provider::ConstraintProvider;

/// Annotation recording which SCC admitted a pod.
pub const SCC_ANNOTATION: &str = "openshift.io/scc";

/// A pod that passed admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedPod {
    /// Name of the admitting SCC.
    pub scc: String,
    /// The defaulted and annotated pod.
    pub pod: Pod,
}

/// The violations one SCC reported for a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SccViolations {
    /// SCC name.
    pub scc: String,
    /// What the SCC rejected.
    pub violations: Vec<Violation>,
}

impl fmt::Display for SccViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider {}: {}", self.scc, field::aggregate(&self.violations))
    }
}

/// No SCC admitted the pod.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("unable to validate pod {pod} against any security context constraint: [{}]", render(.rejections))]
#[diagnostic(
    code(palisade::admission::rejected),
    help("Grant the pod access to an SCC that allows the requested settings")
)]
pub struct Rejection {
    /// The rejected pod's name.
    pub pod: String,
    /// Violations per SCC, in the order the SCCs were tried.
    pub rejections: Vec<SccViolations>,
}

fn render(rejections: &[SccViolations]) -> String {
    rejections
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

const PRIVILEGED_POINTS: u32 = 20;
const HOST_DIR_POINTS: u32 = 10;
const HOST_ACCESS_POINTS: u32 = 5;
const RUN_AS_ANY_POINTS: u32 = 4;
const RUN_AS_NON_ROOT_POINTS: u32 = 3;
const RUN_AS_RANGE_POINTS: u32 = 2;
const RUN_AS_USER_POINTS: u32 = 1;

/// How much an SCC permits. Lower is more restrictive and is tried first
/// among SCCs of equal priority.
#[must_use]
pub fn restriction_score(scc: &SecurityContextConstraints) -> u32 {
    let mut points = 0;

    if scc.allow_privileged_container {
        points += PRIVILEGED_POINTS;
    }
    if scc.allow_host_dir_volume_plugin {
        points += HOST_DIR_POINTS;
    }
    let host_access = [
        scc.allow_host_network,
        scc.allow_host_ports,
        scc.allow_host_pid,
        scc.allow_host_ipc,
    ];
    points += HOST_ACCESS_POINTS * host_access.into_iter().map(u32::from).sum::<u32>();

    points += match scc.run_as_user.type_.as_str() {
        RUN_AS_USER_MUST_RUN_AS => RUN_AS_USER_POINTS,
        RUN_AS_USER_MUST_RUN_AS_RANGE => RUN_AS_RANGE_POINTS,
        RUN_AS_USER_MUST_RUN_AS_NON_ROOT => RUN_AS_NON_ROOT_POINTS,
        _ => RUN_AS_ANY_POINTS,
    };
    points += if scc.se_linux_context.type_ == SELINUX_MUST_RUN_AS {
        RUN_AS_USER_POINTS
    } else {
        RUN_AS_ANY_POINTS
    };

    points
}

/// Admits pods under the first matching SCC.
#[derive(Debug, Clone)]
pub struct Admitter {
    providers: Vec<ConstraintProvider>,
}

impl Admitter {
    /// Build one provider per SCC. Any construction error aborts.
    pub fn new(constraints: Vec<SecurityContextConstraints>) -> PalisadeResult<Self> {
        let mut providers = constraints
            .into_iter()
            .map(ConstraintProvider::new)
            .collect::<PalisadeResult<Vec<_>>>()?;

        providers.sort_by(|a, b| {
            let priority = |p: &ConstraintProvider| p.constraints().priority.unwrap_or(0);
            let score = |p: &ConstraintProvider| restriction_score(p.constraints());
            priority(b)
                .cmp(&priority(a))
                .then_with(|| score(a).cmp(&score(b)))
                .then_with(|| a.name().cmp(b.name()))
        });

        debug!(
            order = ?providers.iter().map(ConstraintProvider::name).collect::<Vec<_>>(),
            "admission order"
        );

        Ok(Self { providers })
    }

    /// SCC names in the order they are tried.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(ConstraintProvider::name)
    }

    /// Default and validate `pod` under each SCC in turn.
    pub fn admit(&self, pod: &Pod) -> Result<AdmittedPod, Rejection> {
        let mut rejections = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match Self::try_provider(provider, pod) {
                Ok(mut admitted) => {
                    admitted
                        .metadata
                        .annotations
                        .insert(SCC_ANNOTATION.to_string(), provider.name().to_string());
                    info!(pod = %pod.metadata.name, scc = %provider.name(), "pod admitted");
                    return Ok(AdmittedPod {
                        scc: provider.name().to_string(),
                        pod: admitted,
                    });
                }
                Err(violations) => {
                    debug!(
                        pod = %pod.metadata.name,
                        scc = %provider.name(),
                        violations = violations.len(),
                        "pod rejected by scc"
                    );
                    rejections.push(SccViolations {
                        scc: provider.name().to_string(),
                        violations,
                    });
                }
            }
        }

        info!(pod = %pod.metadata.name, tried = rejections.len(), "pod rejected");
        Err(Rejection {
            pod: pod.metadata.name.clone(),
            rejections,
        })
    }

    fn try_provider(provider: &ConstraintProvider, pod: &Pod) -> Result<Pod, Vec<Violation>> {
        let spec = FieldPath::new("spec");
        let mut defaulted = pod.clone();

        let psc_path = spec.child("securityContext");
        let psc = provider
            .create_pod_security_context(&defaulted)
            .map_err(|e| vec![Violation::invalid(psc_path.clone(), "", e.to_string())])?;
        defaulted.spec.security_context = Some(psc);

        for idx in 0..defaulted.spec.containers.len() {
            let container = &defaulted.spec.containers[idx];
            let sc = provider
                .create_security_context(&defaulted, container)
                .map_err(|e| {
                    vec![Violation::invalid(
                        spec.child("containers").index(idx).child("securityContext"),
                        "",
                        e.to_string(),
                    )]
                })?;
            defaulted.spec.containers[idx].security_context = Some(sc);
        }

        let mut violations = provider.validate_pod_security_context(&defaulted, &psc_path);
        violations.extend(provider.validate_host_access(&defaulted, &spec));
        for (idx, container) in defaulted.spec.containers.iter().enumerate() {
            violations.extend(provider.validate_container_security_context(
                &defaulted,
                container,
                &spec.child("containers").index(idx),
            ));
        }

        if violations.is_empty() {
            Ok(defaulted)
        } else {
            Err(violations)
        }
    }
}

#[cfg(test)]
mod tests {
    use palisade_api::{
        Container, ContainerPort, RunAsUserStrategyOptions, SecurityContext,
    };

    use super::*;

    fn scc(name: &str, priority: Option<i32>) -> SecurityContextConstraints {
        SecurityContextConstraints {
            priority,
            ..SecurityContextConstraints::run_as_any(name)
        }
    }

    fn pod() -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = "web".to_string();
        pod.spec.containers.push(Container::named("app"));
        pod
    }

    #[test]
    fn orders_by_priority_then_name() {
        let admitter = Admitter::new(vec![
            scc("b", None),
            scc("a", None),
            scc("low", Some(-1)),
            scc("high", Some(10)),
        ])
        .unwrap();
        assert_eq!(admitter.order().collect::<Vec<_>>(), vec!["high", "a", "b", "low"]);
    }

    #[test]
    fn equal_priority_tries_most_restrictive_first() {
        let mut restricted = scc("restricted", Some(1));
        restricted.run_as_user = RunAsUserStrategyOptions::must_run_as_range(1000, 2000);
        let anyuid = scc("anyuid", Some(1));

        let admitter = Admitter::new(vec![restricted, anyuid]).unwrap();
        assert_eq!(admitter.order().collect::<Vec<_>>(), vec!["restricted", "anyuid"]);

        let admitted = admitter.admit(&pod()).unwrap();
        assert_eq!(admitted.scc, "restricted");
        let sc = admitted.pod.spec.containers[0].security_context.as_ref().unwrap();
        assert_eq!(sc.run_as_user, Some(1000));
    }

    #[test]
    fn score_ranks_permissions() {
        let open = scc("open", None);
        let mut exact = scc("exact", None);
        exact.run_as_user = RunAsUserStrategyOptions::must_run_as(5);
        let mut range = scc("range", None);
        range.run_as_user = RunAsUserStrategyOptions::must_run_as_range(5, 10);
        let mut host = scc("host", None);
        host.allow_host_network = true;
        let mut privileged = scc("privileged", None);
        privileged.allow_privileged_container = true;

        assert!(restriction_score(&exact) < restriction_score(&range));
        assert!(restriction_score(&range) < restriction_score(&open));
        assert!(restriction_score(&open) < restriction_score(&host));
        assert!(restriction_score(&host) < restriction_score(&privileged));

        let admitter = Admitter::new(vec![open, privileged, range, exact, host]).unwrap();
        assert_eq!(
            admitter.order().collect::<Vec<_>>(),
            vec!["exact", "range", "open", "host", "privileged"]
        );
    }

    #[test]
    fn construction_error_aborts() {
        let mut bad = scc("bad", None);
        bad.run_as_user = RunAsUserStrategyOptions::of_type("Whenever");
        assert!(Admitter::new(vec![scc("ok", None), bad]).is_err());
    }

    #[test]
    fn first_clean_scc_admits_and_annotates() {
        let mut restricted = scc("restricted", Some(5));
        restricted.run_as_user = RunAsUserStrategyOptions::must_run_as_range(1000, 2000);
        let mut hostports = scc("hostports", None);
        hostports.allow_host_ports = true;

        let admitter = Admitter::new(vec![hostports, restricted]).unwrap();

        let admitted = admitter.admit(&pod()).unwrap();
        assert_eq!(admitted.scc, "restricted");
        assert_eq!(
            admitted.pod.metadata.annotations.get(SCC_ANNOTATION).map(String::as_str),
            Some("restricted")
        );
        let sc = admitted.pod.spec.containers[0].security_context.as_ref().unwrap();
        assert_eq!(sc.run_as_user, Some(1000));

        let mut with_port = pod();
        with_port.spec.containers[0].ports.push(ContainerPort {
            host_port: 80,
            ..ContainerPort::default()
        });
        assert_eq!(admitter.admit(&with_port).unwrap().scc, "hostports");
    }

    #[test]
    fn rejection_lists_every_scc() {
        let admitter = Admitter::new(vec![scc("one", None), scc("two", None)]).unwrap();
        let mut privileged = pod();
        privileged.spec.containers[0].security_context = Some(SecurityContext {
            privileged: Some(true),
            ..SecurityContext::default()
        });

        let rejection = admitter.admit(&privileged).unwrap_err();
        assert_eq!(rejection.pod, "web");
        assert_eq!(rejection.rejections.len(), 2);
        assert_eq!(rejection.rejections[0].scc, "one");
        assert_eq!(
            rejection.rejections[1].violations[0].field.as_str(),
            "spec.containers[0].securityContext.privileged"
        );
        assert!(rejection.to_string().contains("Privileged containers are not allowed"));
    }

    #[test]
    fn rejection_message() {
        let admitter = Admitter::new(vec![scc("only", None)]).unwrap();
        let mut host_pid = pod();
        host_pid.spec.host_pid = true;

        let rejection = admitter.admit(&host_pid).unwrap_err();
        insta::assert_snapshot!(
            rejection.to_string(),
            @r#"unable to validate pod web against any security context constraint: [provider only: spec.hostPID: Invalid value: "true": Host PID is not allowed to be used]"#
        );
    }

    #[test]
    fn admission_does_not_mutate_input() {
        let admitter = Admitter::new(vec![scc("open", None)]).unwrap();
        let original = pod();
        let admitted = admitter.admit(&original).unwrap();
        assert!(original.metadata.annotations.is_empty());
        assert!(original.spec.containers[0].security_context.is_none());
        assert_eq!(admitted.pod.spec.containers[0].security_context.as_ref().unwrap().privileged, Some(false));
    }
}
