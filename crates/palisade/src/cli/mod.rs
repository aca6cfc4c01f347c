//! CLI command definitions and handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use palisade_api::{Pod, StorageMedium};
use palisade_common::{PalisadePaths, PalisadeResult, ResourceQuantity, Violation};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::debug;

use crate::admission::Admitter;
use crate::config::{PalisadeConfig, load_constraints_dir, load_pod};
use crate::provider::ConstraintProvider;
use crate::volume::{QuotaApplicator, XfsQuotaApplicator};

/// Palisade - SecurityContextConstraints admission and emptyDir quota
#[derive(Parser)]
#[command(name = "palisade")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root directory for palisade configuration
    #[arg(long, global = true, env = "PALISADE_ROOT", default_value = "/etc/palisade")]
    pub root: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Admit pods against the configured constraints
    Validate {
        /// Pod files (YAML or JSON)
        #[arg(required = true)]
        pods: Vec<PathBuf>,

        /// Constraints file or directory (default: <root>/constraints)
        #[arg(short, long)]
        constraints: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print a pod with its security contexts defaulted
    Default {
        /// Pod file (YAML or JSON)
        pod: PathBuf,

        /// Default under this SCC only, without validating
        #[arg(long)]
        scc: Option<String>,

        /// Constraints file or directory (default: <root>/constraints)
        #[arg(short, long)]
        constraints: Option<PathBuf>,
    },

    /// Local emptyDir quota
    Quota {
        /// The quota command to execute.
        #[command(subcommand)]
        command: QuotaCommands,
    },
}

/// Quota commands.
#[derive(Subcommand)]
pub enum QuotaCommands {
    /// Check that a directory supports local volume quota
    Probe {
        /// Volume directory
        dir: PathBuf,
    },

    /// Apply the per-FSGroup quota to a directory
    Apply {
        /// Volume directory
        dir: PathBuf,

        /// FSGroup owning the volume
        #[arg(long)]
        fs_group: Option<i64>,

        /// Volume medium (Default, Memory)
        #[arg(long, default_value = "Default")]
        medium: StorageMedium,

        /// Quota size, e.g. 512Mi (default: local_quota.per_fs_group from config)
        #[arg(long)]
        quota: Option<ResourceQuantity>,
    },
}

/// Output format for `validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per pod, violations indented.
    Text,
    /// A JSON array of reports.
    Json,
}

/// Admission outcome for one pod file.
#[derive(Debug, Clone, Serialize)]
pub struct PodReport {
    /// The pod file.
    pub file: PathBuf,
    /// The pod name.
    pub pod: String,
    /// The admitting SCC, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admitted_by: Option<String>,
    /// Violations per SCC when rejected.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<SccReport>,
}

/// Violations reported by one SCC.
#[derive(Debug, Clone, Serialize)]
pub struct SccReport {
    /// SCC name.
    pub scc: String,
    /// Violations.
    pub violations: Vec<Violation>,
}

impl PodReport {
    fn evaluate(admitter: &Admitter, file: PathBuf) -> PalisadeResult<Self> {
        let pod = load_pod(&file)?;
        let name = pod.metadata.name.clone();
        Ok(match admitter.admit(&pod) {
            Ok(admitted) => Self {
                file,
                pod: name,
                admitted_by: Some(admitted.scc),
                rejections: Vec::new(),
            },
            Err(rejection) => Self {
                file,
                pod: name,
                admitted_by: None,
                rejections: rejection
                    .rejections
                    .into_iter()
                    .map(|r| SccReport {
                        scc: r.scc,
                        violations: r.violations,
                    })
                    .collect(),
            },
        })
    }

    fn print_text(&self) {
        match &self.admitted_by {
            Some(scc) => println!("{} ({}): admitted by {scc}", self.pod, self.file.display()),
            None => {
                println!("{} ({}): rejected", self.pod, self.file.display());
                for rejection in &self.rejections {
                    println!("  {}:", rejection.scc);
                    for violation in &rejection.violations {
                        println!("    {violation}");
                    }
                }
            }
        }
    }
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let config = PalisadeConfig::load(PalisadePaths::with_root(&self.root))?;

        match self.command {
            Commands::Validate {
                pods,
                constraints,
                format,
            } => {
                let admitter = Arc::new(load_admitter(&config, constraints.as_deref())?);
                let total = pods.len();

                let mut tasks = JoinSet::new();
                for (idx, file) in pods.into_iter().enumerate() {
                    let admitter = Arc::clone(&admitter);
                    tasks.spawn_blocking(move || (idx, PodReport::evaluate(&admitter, file)));
                }

                let mut reports = Vec::with_capacity(total);
                while let Some(joined) = tasks.join_next().await {
                    let (idx, report) = joined?;
                    reports.push((idx, report?));
                }
                reports.sort_by_key(|(idx, _)| *idx);
                let reports: Vec<PodReport> = reports.into_iter().map(|(_, r)| r).collect();

                match format {
                    OutputFormat::Text => reports.iter().for_each(PodReport::print_text),
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
                }

                let rejected = reports.iter().filter(|r| r.admitted_by.is_none()).count();
                if rejected > 0 {
                    return Err(eyre!("{rejected} of {total} pods rejected"));
                }
                Ok(())
            }

            Commands::Default {
                pod,
                scc,
                constraints,
            } => {
                let pod = load_pod(&pod)?;
                let defaulted = match scc {
                    Some(name) => default_under(&config, constraints.as_deref(), &name, &pod)?,
                    None => load_admitter(&config, constraints.as_deref())?
                        .admit(&pod)
                        .map_err(|rejection| eyre!("{rejection}"))?
                        .pod,
                };
                print!("{}", serde_yaml::to_string(&defaulted)?);
                Ok(())
            }

            Commands::Quota { command } => match command {
                QuotaCommands::Probe { dir } => {
                    XfsQuotaApplicator::new(&dir)?;
                    println!("{} supports local volume quota", dir.display());
                    Ok(())
                }

                QuotaCommands::Apply {
                    dir,
                    fs_group,
                    medium,
                    quota,
                } => {
                    let quota = quota.or(config.local_quota.per_fs_group).ok_or_else(|| {
                        eyre!("no quota given and local_quota.per_fs_group is not configured")
                    })?;
                    let applicator = XfsQuotaApplicator::new(&dir)?;
                    applicator.apply(&dir, medium, &Pod::default(), fs_group, quota)?;
                    println!("Quota {quota} applied to {}", dir.display());
                    Ok(())
                }
            },
        }
    }
}

fn load_admitter(config: &PalisadeConfig, constraints: Option<&Path>) -> Result<Admitter> {
    let dir = constraints.map_or_else(|| config.constraints_dir(), Path::to_path_buf);
    let constraints = load_constraints_dir(&dir)?;
    if constraints.is_empty() {
        return Err(eyre!("no constraints found in {}", dir.display()));
    }
    debug!(dir = %dir.display(), count = constraints.len(), "loaded constraints");
    Ok(Admitter::new(constraints)?)
}

fn default_under(
    config: &PalisadeConfig,
    constraints: Option<&Path>,
    name: &str,
    pod: &Pod,
) -> Result<Pod> {
    let dir = constraints.map_or_else(|| config.constraints_dir(), Path::to_path_buf);
    let scc = load_constraints_dir(&dir)?
        .into_iter()
        .find(|scc| scc.name() == name)
        .ok_or_else(|| eyre!("constraints {name} not found in {}", dir.display()))?;
    let provider = ConstraintProvider::new(scc)?;

    let mut defaulted = pod.clone();
    defaulted.spec.security_context = Some(provider.create_pod_security_context(&defaulted)?);
    for idx in 0..defaulted.spec.containers.len() {
        let sc = provider.create_security_context(&defaulted, &defaulted.spec.containers[idx])?;
        defaulted.spec.containers[idx].security_context = Some(sc);
    }
    Ok(defaulted)
}
