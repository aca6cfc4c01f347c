//! emptyDir set-up with a per-FSGroup quota.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use palisade_api::{Pod, StorageMedium, Volume};
use palisade_common::{PalisadeResult, ResourceQuantity};
use tracing::debug;

use super::quota::QuotaApplicator;

/// Creates emptyDir directories and limits them with a quota.
#[derive(Debug, Clone)]
pub struct EmptyDirQuotaMounter {
    applicator: Arc<dyn QuotaApplicator>,
    quota: ResourceQuantity,
}

impl EmptyDirQuotaMounter {
    /// A mounter applying `quota` through `applicator`.
    #[must_use]
    pub fn new(applicator: Arc<dyn QuotaApplicator>, quota: ResourceQuantity) -> Self {
        Self { applicator, quota }
    }

    /// The quota applied per FSGroup.
    #[must_use]
    pub const fn quota(&self) -> ResourceQuantity {
        self.quota
    }

    /// Create `dir` for `volume` and apply the quota for the pod's FSGroup.
    pub fn set_up(&self, dir: &Path, pod: &Pod, volume: &Volume) -> PalisadeResult<()> {
        fs::create_dir_all(dir)?;

        let medium = volume
            .source
            .empty_dir
            .as_ref()
            .map_or(StorageMedium::Default, |e| e.medium);
        let fs_group = pod
            .spec
            .security_context
            .as_ref()
            .and_then(|psc| psc.fs_group);

        debug!(
            pod = %pod.metadata.name,
            volume = %volume.name,
            dir = %dir.display(),
            ?medium,
            ?fs_group,
            "setting up emptyDir"
        );

        self.applicator
            .apply(dir, medium, pod, fs_group, self.quota)
    }
}
