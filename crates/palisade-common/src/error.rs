//! Common error types for Palisade.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`PalisadeError`].
pub type PalisadeResult<T> = Result<T, PalisadeError>;

/// Common errors across Palisade.
#[derive(Error, Diagnostic, Debug)]
pub enum PalisadeError {
    /// A constraints object names a strategy type that does not exist.
    #[error("unrecognized strategy type {strategy}")]
    #[diagnostic(
        code(palisade::strategy::unrecognized),
        help("RunAsUser accepts MustRunAs, MustRunAsRange, MustRunAsNonRoot and RunAsAny")
    )]
    UnrecognizedStrategy {
        /// The strategy type as written in the constraints.
        strategy: String,
    },

    /// Strategy options are structurally invalid for the selected type.
    #[error("{strategy} strategy: {message}")]
    #[diagnostic(code(palisade::strategy::invalid_options))]
    InvalidStrategyOptions {
        /// The strategy type being constructed.
        strategy: String,
        /// What is wrong with the options.
        message: String,
    },

    /// The volume directory is not on a filesystem supporting local quota.
    #[error("{} is not on a supported filesystem for local volume quota", path.display())]
    #[diagnostic(
        code(palisade::quota::unsupported_filesystem),
        help("Local volume quota is only supported on XFS mounted with grpquota")
    )]
    UnsupportedFilesystem {
        /// The probed directory.
        path: PathBuf,
    },

    /// A quota was requested for a directory that is not on XFS.
    #[error("unable to apply quota: {} is not on an XFS filesystem", path.display())]
    #[diagnostic(code(palisade::quota::not_xfs))]
    NotXfs {
        /// The volume directory.
        path: PathBuf,
    },

    /// The filesystem type probe failed to run.
    #[error("unable to check filesystem type for emptydir volume {}: {message}", path.display())]
    #[diagnostic(code(palisade::quota::fs_type))]
    FilesystemProbe {
        /// The probed directory.
        path: PathBuf,
        /// The error message.
        message: String,
    },

    /// The block device lookup failed to run.
    #[error("unable to find filesystem device for dir {}: {message}", path.display())]
    #[diagnostic(code(palisade::quota::device_lookup))]
    DeviceLookup {
        /// The probed directory.
        path: PathBuf,
        /// The error message.
        message: String,
    },

    /// `df` produced fewer lines than expected.
    #[error("unexpected line count in df output: {output:?}")]
    #[diagnostic(code(palisade::quota::unexpected_line_count))]
    UnexpectedLineCount {
        /// The raw command output.
        output: String,
    },

    /// `df` reported a source that is not a device path.
    #[error("invalid filesystem device: {device}")]
    #[diagnostic(code(palisade::quota::invalid_device))]
    InvalidFilesystemDevice {
        /// The token parsed from the `df` output.
        device: String,
    },

    /// `xfs_quota` failed or wrote to stderr.
    #[error("error applying quota: {message}{}", with_stderr(.stderr))]
    #[diagnostic(code(palisade::quota::apply))]
    QuotaApply {
        /// The process error, if any.
        message: String,
        /// Whatever the tool wrote to stderr.
        stderr: String,
    },

    /// An external command could not be run or exited unsuccessfully.
    #[error("{command} failed: {message}")]
    #[diagnostic(code(palisade::command))]
    Command {
        /// The command line.
        command: String,
        /// Exit status or spawn error, followed by any stderr.
        message: String,
    },

    /// A required external binary is not on `PATH`.
    #[error("executable file not found in $PATH: {command}")]
    #[diagnostic(
        code(palisade::command_not_found),
        help("Install xfsprogs to get xfs_quota")
    )]
    CommandNotFound {
        /// The binary name.
        command: String,
    },

    /// Invalid resource quantity format.
    #[error("Invalid resource quantity: {value}")]
    #[diagnostic(
        code(palisade::resource::invalid_quantity),
        help("Use formats like '512Mi', '1Gi', '500M', '1G' or a plain byte count")
    )]
    InvalidResourceQuantity {
        /// The invalid value.
        value: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(palisade::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(palisade::serialization))]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(palisade::config))]
    Config {
        /// The error message.
        message: String,
    },
}

fn with_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(", {stderr}")
    }
}

impl From<serde_json::Error> for PalisadeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PalisadeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for PalisadeError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}
