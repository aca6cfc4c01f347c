//! Group block quotas for emptyDir volumes on XFS.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use palisade_api::{Pod, StorageMedium};
use palisade_common::{PalisadeError, PalisadeResult, ResourceQuantity};
use tracing::{debug, info};

use super::runner::{CommandRunner, ShellCommandRunner, find_in_path};

const XFS: &str = "xfs";
const XFS_QUOTA: &str = "xfs_quota";

/// Applies a storage quota to a volume directory.
pub trait QuotaApplicator: fmt::Debug + Send + Sync {
    /// Limit the space `fs_group` may use under `dir` to `quota`.
    ///
    /// Memory-backed volumes and a missing FSGroup are not errors; nothing is
    /// applied.
    fn apply(
        &self,
        dir: &Path,
        medium: StorageMedium,
        pod: &Pod,
        fs_group: Option<i64>,
        quota: ResourceQuantity,
    ) -> PalisadeResult<()>;
}

/// Applies quotas with `xfs_quota`.
#[derive(Debug, Clone)]
pub struct XfsQuotaApplicator {
    runner: Arc<dyn CommandRunner>,
}

impl XfsQuotaApplicator {
    /// Probe `volume_dir` with the real binaries.
    pub fn new(volume_dir: &Path) -> PalisadeResult<Self> {
        let runner = Arc::new(ShellCommandRunner::new());
        Self::probe(volume_dir, runner)?;
        let xfs_quota = find_in_path(XFS_QUOTA).ok_or_else(|| PalisadeError::CommandNotFound {
            command: XFS_QUOTA.to_string(),
        })?;
        debug!(path = %xfs_quota.display(), "found xfs_quota");
        Ok(Self::with_runner(Arc::new(ShellCommandRunner::with_xfs_quota(
            xfs_quota,
        ))))
    }

    /// Check that `volume_dir` is on XFS using `runner`.
    pub fn probe(volume_dir: &Path, runner: Arc<dyn CommandRunner>) -> PalisadeResult<Self> {
        let xfs = is_xfs(volume_dir, runner.as_ref()).map_err(|e| PalisadeError::FilesystemProbe {
            path: volume_dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !xfs {
            return Err(PalisadeError::UnsupportedFilesystem {
                path: volume_dir.to_path_buf(),
            });
        }
        Ok(Self::with_runner(runner))
    }

    /// An applicator that runs commands through `runner` without probing.
    #[must_use]
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn fs_device(&self, dir: &Path) -> PalisadeResult<String> {
        let out = self
            .runner
            .run_fs_device_command(dir)
            .map_err(|e| PalisadeError::DeviceLookup {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?;
        parse_fs_device(&out)
    }
}

impl QuotaApplicator for XfsQuotaApplicator {
    fn apply(
        &self,
        dir: &Path,
        medium: StorageMedium,
        pod: &Pod,
        fs_group: Option<i64>,
        quota: ResourceQuantity,
    ) -> PalisadeResult<()> {
        let pod_name = pod.metadata.name.as_str();

        if medium == StorageMedium::Memory {
            debug!(pod = pod_name, dir = %dir.display(), "skipping quota for memory-backed emptyDir");
            return Ok(());
        }

        let xfs = is_xfs(dir, self.runner.as_ref()).map_err(|e| PalisadeError::FilesystemProbe {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !xfs {
            return Err(PalisadeError::NotXfs {
                path: dir.to_path_buf(),
            });
        }

        let Some(fs_group) = fs_group else {
            debug!(pod = pod_name, dir = %dir.display(), "no fsGroup, skipping quota");
            return Ok(());
        };

        let device = self.fs_device(dir)?;
        debug!(pod = pod_name, device = %device, fs_group, quota = %quota, "applying quota");

        let out = self
            .runner
            .run_apply_quota_command(&device, quota, fs_group)
            .map_err(|e| PalisadeError::QuotaApply {
                message: e.to_string(),
                stderr: String::new(),
            })?;

        // xfs_quota can exit zero on failure; stderr is authoritative.
        if !out.success() || !out.stderr.is_empty() {
            let message = out
                .code
                .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit status {c}"));
            return Err(PalisadeError::QuotaApply {
                message,
                stderr: out.stderr,
            });
        }

        info!(
            pod = pod_name,
            dir = %dir.display(),
            device = %device,
            fs_group,
            quota = %quota,
            stdout = %out.stdout.trim(),
            "quota applied"
        );
        Ok(())
    }
}

fn is_xfs(dir: &Path, runner: &dyn CommandRunner) -> PalisadeResult<bool> {
    let fs_type = runner.run_fs_type_command(dir)?;
    Ok(fs_type.trim() == XFS)
}

/// Extract the device from `df --output=source` output.
///
/// The first line is a header; the device is the first token of the second.
pub fn parse_fs_device(output: &str) -> PalisadeResult<String> {
    let lines: Vec<&str> = output.split('\n').collect();
    if lines.len() < 2 {
        return Err(PalisadeError::UnexpectedLineCount {
            output: output.to_string(),
        });
    }

    let device = lines[1].split(' ').next().unwrap_or_default();
    if !device.starts_with('/') {
        return Err(PalisadeError::InvalidFilesystemDevice {
            device: device.to_string(),
        });
    }
    Ok(device.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_from_second_line() {
        assert_eq!(parse_fs_device("Filesystem\n/dev/sdb2").unwrap(), "/dev/sdb2");
        assert_eq!(
            parse_fs_device("Filesystem\n/dev/mapper/vg-lv extra\n").unwrap(),
            "/dev/mapper/vg-lv"
        );
    }

    #[test]
    fn rejects_non_device_source() {
        let err = parse_fs_device("Filesystem\ntmpfs").unwrap_err();
        assert!(matches!(err, PalisadeError::InvalidFilesystemDevice { ref device } if device == "tmpfs"));
        assert!(err.to_string().contains("invalid filesystem device"));
    }

    #[test]
    fn rejects_short_output() {
        let err = parse_fs_device("").unwrap_err();
        assert!(matches!(err, PalisadeError::UnexpectedLineCount { .. }));
        assert!(err.to_string().contains("unexpected line count"));
    }
}
