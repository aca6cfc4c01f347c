//! Configuration and on-disk documents.

use std::fs;
use std::path::{Path, PathBuf};

use palisade_api::{Pod, SecurityContextConstraints};
use palisade_common::{PalisadeError, PalisadePaths, PalisadeResult, ResourceQuantity};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

const DOCUMENT_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Palisade configuration.
#[derive(Debug, Clone, Default)]
pub struct PalisadeConfig {
    /// Standard paths.
    pub paths: PalisadePaths,
    /// Overrides the constraints directory under the root.
    pub constraints_dir: Option<PathBuf>,
    /// Local volume quota settings.
    pub local_quota: LocalQuotaConfig,
}

/// Local emptyDir quota settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LocalQuotaConfig {
    /// Quota per FSGroup; unset disables quota.
    #[serde(default)]
    pub per_fs_group: Option<ResourceQuantity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    constraints_dir: Option<PathBuf>,
    #[serde(default)]
    local_quota: LocalQuotaConfig,
}

impl PalisadeConfig {
    /// Load `config.toml` under `paths`. A missing file yields defaults.
    pub fn load(paths: PalisadePaths) -> PalisadeResult<Self> {
        let file = paths.config_file();
        let parsed = if file.exists() {
            debug!(path = %file.display(), "loading config");
            toml::from_str::<ConfigFile>(&fs::read_to_string(&file)?)?
        } else {
            debug!(path = %file.display(), "no config file, using defaults");
            ConfigFile::default()
        };

        Ok(Self {
            paths,
            constraints_dir: parsed.constraints_dir,
            local_quota: parsed.local_quota,
        })
    }

    /// Set the root directory.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths = PalisadePaths::with_root(root);
        self
    }

    /// Set the constraints directory.
    #[must_use]
    pub fn with_constraints_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.constraints_dir = Some(dir.into());
        self
    }

    /// Set the per-FSGroup quota.
    #[must_use]
    pub const fn with_quota(mut self, quota: ResourceQuantity) -> Self {
        self.local_quota.per_fs_group = Some(quota);
        self
    }

    /// The directory constraints are loaded from.
    #[must_use]
    pub fn constraints_dir(&self) -> PathBuf {
        self.constraints_dir
            .clone()
            .unwrap_or_else(|| self.paths.constraints())
    }

    /// Load every constraints document in [`Self::constraints_dir`].
    pub fn load_constraints(&self) -> PalisadeResult<Vec<SecurityContextConstraints>> {
        load_constraints_dir(&self.constraints_dir())
    }
}

/// Load all constraints from a file or from every document file in a directory.
///
/// Directory entries are read in name order. A YAML file may hold several
/// `---` separated documents.
pub fn load_constraints_dir(path: &Path) -> PalisadeResult<Vec<SecurityContextConstraints>> {
    if path.is_file() {
        return load_documents(path);
    }

    if !path.is_dir() {
        return Err(PalisadeError::Config {
            message: format!("constraints directory {} does not exist", path.display()),
        });
    }

    let mut files: Vec<PathBuf> = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    files.retain(|p| is_document(p));
    files.sort();

    let mut constraints = Vec::new();
    for file in files {
        constraints.extend(load_documents::<SecurityContextConstraints>(&file)?);
    }

    if constraints.is_empty() {
        warn!(dir = %path.display(), "no constraints found");
    }
    Ok(constraints)
}

/// Load a single pod document.
pub fn load_pod(path: &Path) -> PalisadeResult<Pod> {
    let mut docs = load_documents::<Pod>(path)?;
    match docs.len() {
        1 => Ok(docs.remove(0)),
        n => Err(PalisadeError::Config {
            message: format!("{} holds {n} documents, expected one pod", path.display()),
        }),
    }
}

fn is_document(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext))
}

fn load_documents<T: DeserializeOwned>(path: &Path) -> PalisadeResult<Vec<T>> {
    let content = fs::read_to_string(path)?;
    let docs = serde_yaml::Deserializer::from_str(&content)
        .map(T::deserialize)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| PalisadeError::Serialization(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), documents = docs.len(), "loaded documents");
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const RESTRICTED: &str = r#"
metadata:
  name: restricted
runAsUser:
  type: MustRunAsRange
  uidRangeMin: 1000
  uidRangeMax: 2000
seLinuxContext:
  type: RunAsAny
"#;

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = PalisadeConfig::load(PalisadePaths::with_root(dir.path())).unwrap();
        assert_eq!(config.constraints_dir(), dir.path().join("constraints"));
        assert_eq!(config.local_quota.per_fs_group, None);
    }

    #[test]
    fn config_file_sets_quota_and_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "constraints_dir = \"/srv/scc\"\n\n[local_quota]\nper_fs_group = \"512Mi\"\n",
        )
        .unwrap();

        let config = PalisadeConfig::load(PalisadePaths::with_root(dir.path())).unwrap();
        assert_eq!(config.constraints_dir(), PathBuf::from("/srv/scc"));
        assert_eq!(
            config.local_quota.per_fs_group,
            Some(ResourceQuantity::from_mebibytes(512))
        );
    }

    #[test]
    fn unknown_config_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "colour = true\n").unwrap();
        let err = PalisadeConfig::load(PalisadePaths::with_root(dir.path())).unwrap_err();
        assert!(matches!(err, PalisadeError::Config { .. }));
    }

    #[test]
    fn builder_overrides() {
        let config = PalisadeConfig::default()
            .with_root("/custom")
            .with_quota(ResourceQuantity::from_gibibytes(1));
        assert_eq!(config.constraints_dir(), PathBuf::from("/custom/constraints"));
        assert_eq!(
            config.with_constraints_dir("/elsewhere").constraints_dir(),
            PathBuf::from("/elsewhere")
        );
    }

    #[test]
    fn loads_documents_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.yaml"), RESTRICTED).unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"metadata":{"name":"anyuid"},"runAsUser":{"type":"RunAsAny"},"seLinuxContext":{"type":"RunAsAny"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("c.yml"),
            format!("{RESTRICTED}---\nmetadata:\n  name: second\nrunAsUser:\n  type: RunAsAny\nseLinuxContext:\n  type: RunAsAny\n"),
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let names: Vec<String> = load_constraints_dir(dir.path())
            .unwrap()
            .into_iter()
            .map(|scc| scc.metadata.name)
            .collect();
        assert_eq!(names, vec!["anyuid", "restricted", "restricted", "second"]);
    }

    #[test]
    fn missing_constraints_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_constraints_dir(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn pod_file_must_hold_one_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pod.yaml");
        fs::write(&path, "metadata:\n  name: web\nspec:\n  containers: []\n").unwrap();
        assert_eq!(load_pod(&path).unwrap().metadata.name, "web");

        fs::write(&path, "metadata:\n  name: a\n---\nmetadata:\n  name: b\n").unwrap();
        assert!(load_pod(&path).is_err());
    }
}
