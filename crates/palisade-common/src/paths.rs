//! Standard filesystem paths for Palisade.

use std::path::PathBuf;

use once_cell::sync::Lazy;

/// Default root directory for Palisade configuration.
pub static PALISADE_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("PALISADE_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/palisade"))
});

/// Standard paths used by Palisade.
#[derive(Debug, Clone)]
pub struct PalisadePaths {
    /// Root configuration directory (default: /etc/palisade).
    pub root: PathBuf,
}

impl PalisadePaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Main configuration file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Directory holding SecurityContextConstraints documents.
    #[must_use]
    pub fn constraints(&self) -> PathBuf {
        self.root.join("constraints")
    }
}

impl Default for PalisadePaths {
    fn default() -> Self {
        Self {
            root: PALISADE_ROOT.clone(),
        }
    }
}
