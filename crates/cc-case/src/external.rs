//! Process boundary: the batch scheduler, the parallel launcher and file
//! synchronisation. Each is a trait so a case can be driven without a
//! cluster; the default implementations shell out and wait.

use std::path::Path;
use std::process::Command;

use tracing::{error, info};

use crate::error::{CaseError, CaseResult};

pub trait BatchScheduler {
    /// Queue `script` (relative to `case_dir`) with `descriptor` as its
    /// only argument.
    fn submit(&self, case_dir: &Path, script: &Path, descriptor: &Path) -> CaseResult<()>;
}

pub trait ParallelLauncher {
    /// Start every rank listed in `rank_map` and wait for all of them.
    fn launch(&self, case_dir: &Path, rank_map: &Path) -> CaseResult<()>;
}

pub trait FileSync {
    fn sync(&self, src: &Path, dst: &Path, file_list: Option<&Path>) -> CaseResult<()>;
}

fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Run `cmd` to completion; spawn errors and non-zero exits both fail.
fn run_checked(mut cmd: Command) -> CaseResult<()> {
    let command = describe(&cmd);
    info!(%command, "running external command");
    let status = cmd.status().map_err(|e| {
        error!(%command, error = %e, "failed to start external command");
        CaseError::ExternalCommandFailure {
            command: command.clone(),
            status: e.to_string(),
        }
    })?;
    if !status.success() {
        error!(%command, %status, "external command failed");
        return Err(CaseError::ExternalCommandFailure {
            command,
            status: status.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SlurmScheduler {
    pub program: String,
}

impl Default for SlurmScheduler {
    fn default() -> Self {
        Self {
            program: "sbatch".to_string(),
        }
    }
}

impl BatchScheduler for SlurmScheduler {
    fn submit(&self, case_dir: &Path, script: &Path, descriptor: &Path) -> CaseResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(script).arg(descriptor).current_dir(case_dir);
        run_checked(cmd)
    }
}

#[derive(Debug, Clone)]
pub struct SrunLauncher {
    pub program: String,
}

impl Default for SrunLauncher {
    fn default() -> Self {
        Self {
            program: "srun".to_string(),
        }
    }
}

impl ParallelLauncher for SrunLauncher {
    fn launch(&self, case_dir: &Path, rank_map: &Path) -> CaseResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-u", "--multi-prog"]).arg(rank_map).current_dir(case_dir);
        run_checked(cmd)
    }
}

#[derive(Debug, Clone)]
pub struct Rsync {
    pub program: String,
}

impl Default for Rsync {
    fn default() -> Self {
        Self {
            program: "rsync".to_string(),
        }
    }
}

impl FileSync for Rsync {
    fn sync(&self, src: &Path, dst: &Path, file_list: Option<&Path>) -> CaseResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-avr");
        if let Some(list) = file_list {
            cmd.arg(format!("--files-from={}", list.display()));
        }
        cmd.arg(src).arg(dst);
        run_checked(cmd)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn zero_exit_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = SrunLauncher {
            program: "true".to_string(),
        };
        launcher.launch(dir.path(), Path::new("proc_config")).unwrap();
    }

    #[test]
    fn non_zero_exit_is_reported_with_command() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = SlurmScheduler {
            program: "false".to_string(),
        };
        let err = scheduler
            .submit(dir.path(), Path::new("controller"), Path::new("config.yaml"))
            .unwrap_err();
        match err {
            CaseError::ExternalCommandFailure { command, .. } => {
                assert_eq!(command, "false controller config.yaml");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_a_failure() {
        let sync = Rsync {
            program: "/nonexistent/rsync".to_string(),
        };
        let err = sync.sync(Path::new("a"), Path::new("b"), None).unwrap_err();
        assert!(matches!(err, CaseError::ExternalCommandFailure { .. }));
    }
}
