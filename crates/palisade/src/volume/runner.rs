//! External commands used by the quota applicator.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use palisade_common::{PalisadeError, PalisadeResult, ResourceQuantity};

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code, `None` if killed by a signal.
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The three commands the quota applicator needs.
pub trait CommandRunner: fmt::Debug + Send + Sync {
    /// `stat -f -c %T <dir>`: the filesystem type name.
    fn run_fs_type_command(&self, dir: &Path) -> PalisadeResult<String>;

    /// `df --output=source <dir>`: the backing device, below a header line.
    fn run_fs_device_command(&self, dir: &Path) -> PalisadeResult<String>;

    /// `xfs_quota -x -c "limit -g bsoft=N bhard=N <gid>" <device>`.
    ///
    /// A non-zero exit is reported in the output, not as an error.
    fn run_apply_quota_command(
        &self,
        device: &str,
        quota: ResourceQuantity,
        fs_group: i64,
    ) -> PalisadeResult<CommandOutput>;
}

/// The `xfs_quota -c` expression limiting `fs_group` to `quota` bytes.
#[must_use]
pub fn quota_limit_expression(quota: ResourceQuantity, fs_group: i64) -> String {
    let bytes = quota.as_bytes();
    format!("limit -g bsoft={bytes} bhard={bytes} {fs_group}")
}

/// Runs the real binaries.
#[derive(Debug, Clone, Default)]
pub struct ShellCommandRunner {
    xfs_quota: Option<PathBuf>,
}

impl ShellCommandRunner {
    /// A runner resolving every binary through `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner invoking `xfs_quota` at an already resolved path.
    #[must_use]
    pub fn with_xfs_quota(path: impl Into<PathBuf>) -> Self {
        Self {
            xfs_quota: Some(path.into()),
        }
    }

    fn output(mut cmd: Command) -> PalisadeResult<CommandOutput> {
        let display = format!("{cmd:?}");
        let output = cmd.output().map_err(|e| PalisadeError::Command {
            command: display,
            message: e.to_string(),
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }

    fn checked_stdout(cmd: Command) -> PalisadeResult<String> {
        let display = format!("{cmd:?}");
        let out = Self::output(cmd)?;
        if !out.success() {
            let status = out
                .code
                .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit status {c}"));
            return Err(PalisadeError::Command {
                command: display,
                message: format!("{status}: {}", out.stderr.trim()),
            });
        }
        Ok(out.stdout)
    }
}

impl CommandRunner for ShellCommandRunner {
    fn run_fs_type_command(&self, dir: &Path) -> PalisadeResult<String> {
        let mut cmd = Command::new("stat");
        cmd.args(["-f", "-c", "%T"]).arg(dir);
        Self::checked_stdout(cmd)
    }

    fn run_fs_device_command(&self, dir: &Path) -> PalisadeResult<String> {
        let mut cmd = Command::new("df");
        cmd.arg("--output=source").arg(dir);
        Self::checked_stdout(cmd)
    }

    fn run_apply_quota_command(
        &self,
        device: &str,
        quota: ResourceQuantity,
        fs_group: i64,
    ) -> PalisadeResult<CommandOutput> {
        let program = self
            .xfs_quota
            .clone()
            .unwrap_or_else(|| PathBuf::from("xfs_quota"));
        let mut cmd = Command::new(program);
        cmd.args(["-x", "-c"])
            .arg(quota_limit_expression(quota, fs_group))
            .arg(device);
        Self::output(cmd)
    }
}

/// Locate `binary` in the directories listed in `PATH`.
#[must_use]
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|segment| segment.join(binary))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_expression_uses_bytes() {
        assert_eq!(
            quota_limit_expression(ResourceQuantity::from_mebibytes(1), 1000),
            "limit -g bsoft=1048576 bhard=1048576 1000"
        );
    }

    #[test]
    fn output_success() {
        let ok = CommandOutput {
            code: Some(0),
            ..CommandOutput::default()
        };
        assert!(ok.success());
        assert!(!CommandOutput::default().success());
    }

    #[test]
    fn missing_binary_is_not_found() {
        assert!(find_in_path("palisade-no-such-binary").is_none());
    }
}
