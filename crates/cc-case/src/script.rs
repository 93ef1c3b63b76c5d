//! Batch control script generation.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CaseError, CaseResult};

/// How the run environment's modules are set up before launching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModulesOpt {
    #[default]
    Switch,
    Purge,
    None,
}

impl ModulesOpt {
    pub fn directives(&self) -> &'static [&'static str] {
        match self {
            ModulesOpt::Switch => &[
                "module switch PrgEnv-cray PrgEnv-pgi",
                "module load cray-netcdf",
                "module list",
            ],
            ModulesOpt::Purge => &[
                "module purge",
                "module load PrgEnv-pgi",
                "module load cray-netcdf",
                "module list",
            ],
            ModulesOpt::None => &[],
        }
    }
}

impl fmt::Display for ModulesOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModulesOpt::Switch => "switch",
            ModulesOpt::Purge => "purge",
            ModulesOpt::None => "none",
        })
    }
}

impl FromStr for ModulesOpt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "switch" => Ok(ModulesOpt::Switch),
            "purge" => Ok(ModulesOpt::Purge),
            "none" => Ok(ModulesOpt::None),
            other => Err(format!(
                "unknown modules option '{}' (expected switch, purge or none)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlScript {
    pub shebang: String,
    pub job_name: String,
    pub node_count: u32,
    pub log_file: String,
    pub account: Option<String>,
    pub wall_time: String,
    pub modules: ModulesOpt,
    pub gpu_mode: bool,
    /// Descriptor path passed to the control command on the last line.
    pub descriptor: String,
}

impl ControlScript {
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = vec![
            self.shebang.clone(),
            "#SBATCH --constraint=gpu".to_string(),
            format!("#SBATCH --job-name={}", self.job_name),
            format!("#SBATCH --nodes={}", self.node_count),
            format!("#SBATCH --output={}", self.log_file),
            format!("#SBATCH --error={}", self.log_file),
        ];
        if let Some(account) = &self.account {
            lines.push(format!("#SBATCH --account={}", account));
        }
        lines.push(format!("#SBATCH --time={}", self.wall_time));
        lines.push(String::new());

        let modules = self.modules.directives();
        if !modules.is_empty() {
            lines.extend(modules.iter().map(|s| s.to_string()));
            lines.push(String::new());
        }

        lines.extend(
            [
                "export MALLOC_MMAP_MAX_=0",
                "export MALLOC_TRIM_THRESHOLD_=536870912",
                "",
                "# Set this to avoid segmentation faults",
                "ulimit -s unlimited",
                "ulimit -a",
                "",
                "export OMP_NUM_THREADS=1",
            ]
            .iter()
            .map(|s| s.to_string()),
        );

        if self.gpu_mode {
            lines.extend(
                [
                    "",
                    "# Use for gpu mode",
                    "export MV2_ENABLE_AFFINITY=0",
                    "export MV2_USE_CUDA=1",
                    "export MPICH_RDMA_ENABLED_CUDA=1",
                    "export MPICH_G2G_PIPELINE=256",
                ]
                .iter()
                .map(|s| s.to_string()),
            );
        }

        lines.push(String::new());
        lines.push(format!("cc2 control {}", self.descriptor));

        let mut script = lines.join("\n");
        script.push('\n');
        script
    }

    pub fn write(&self, path: &Path) -> CaseResult<()> {
        fs::write(path, self.render()).map_err(CaseError::io(path))?;
        debug!(path = %path.display(), log_file = %self.log_file, "wrote control script");
        Ok(())
    }
}

/// `#SBATCH` followed by one or more spaces and `flag`.
fn is_directive(line: &str, flag: &str) -> bool {
    line.strip_prefix("#SBATCH")
        .filter(|rest| rest.starts_with(' '))
        .is_some_and(|rest| rest.trim_start().starts_with(flag))
}

/// Point the output and error directives at `log_file`, leaving every
/// other line untouched.
pub fn replace_log_lines(script: &str, log_file: &str) -> String {
    let mut out = String::with_capacity(script.len());
    for line in script.split_inclusive('\n') {
        let (body, ending) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        if is_directive(body, "--output=") {
            out.push_str(&format!("#SBATCH --output={}", log_file));
        } else if is_directive(body, "--error=") {
            out.push_str(&format!("#SBATCH --error={}", log_file));
        } else {
            out.push_str(body);
        }
        out.push_str(ending);
    }
    out
}

/// Rewrite the log directives of the script at `path` in place.
pub fn update_log_file(path: &Path, log_file: &str) -> CaseResult<()> {
    let content = fs::read_to_string(path).map_err(CaseError::io(path))?;
    fs::write(path, replace_log_lines(&content, log_file)).map_err(CaseError::io(path))?;
    debug!(path = %path.display(), log_file, "updated control script log file");
    Ok(())
}
