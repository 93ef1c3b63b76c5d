//! Process layout: task counts, node count and the rank-to-executable map
//! handed to the parallel launcher.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use cc_namelist::NamelistStore;
use tracing::{debug, warn};

use crate::error::{CaseError, CaseResult};
use crate::names::*;

/// Per-component decomposition counts as stored in the namelists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposition {
    pub nprocx: u32,
    pub nprocy: u32,
    pub coupler_tasks: u32,
}

/// Requested changes to the decomposition, written into the namelists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecompositionOverrides {
    pub nprocx: Option<u32>,
    pub nprocy: Option<u32>,
    pub coupler_tasks: Option<u32>,
}

fn task_count(file: &str, block: &str, param: &str, value: i64) -> CaseResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| CaseError::InvalidLayout {
            reason: format!("{}/{}/{} must be a positive task count, got {}", file, block, param, value),
        })
}

fn too_many_tasks(what: String) -> CaseError {
    CaseError::InvalidLayout {
        reason: format!("{} overflow the task count", what),
    }
}

impl Decomposition {
    /// Read `nprocx`/`nprocy` from the atmosphere and `lnd_ntasks` (all
    /// coupled components run with the same count) from the coupler.
    pub fn from_store(store: &mut NamelistStore) -> CaseResult<Self> {
        let org = store.get(INPUT_ORG)?;
        let nprocx = task_count(INPUT_ORG, RUNCTL, "nprocx", org.int(RUNCTL, "nprocx")?)?;
        let nprocy = task_count(INPUT_ORG, RUNCTL, "nprocy", org.int(RUNCTL, "nprocy")?)?;
        let drv = store.get(DRV_IN)?;
        let coupler_tasks = task_count(DRV_IN, CCSM_PES, "lnd_ntasks", drv.int(CCSM_PES, "lnd_ntasks")?)?;
        Ok(Self {
            nprocx,
            nprocy,
            coupler_tasks,
        })
    }

    pub fn atmosphere_tasks(&self) -> CaseResult<u32> {
        self.nprocx
            .checked_mul(self.nprocy)
            .ok_or_else(|| too_many_tasks(format!("{} x {} atmosphere tasks", self.nprocx, self.nprocy)))
    }

    pub fn total_tasks(&self) -> CaseResult<u32> {
        let n_atm = self.atmosphere_tasks()?;
        n_atm
            .checked_add(self.coupler_tasks)
            .ok_or_else(|| too_many_tasks(format!("{} + {} tasks", n_atm, self.coupler_tasks)))
    }
}

impl DecompositionOverrides {
    pub fn is_empty(&self) -> bool {
        self.nprocx.is_none() && self.nprocy.is_none() && self.coupler_tasks.is_none()
    }

    pub fn apply(&self, store: &mut NamelistStore) -> CaseResult<()> {
        if self.nprocx.is_some() || self.nprocy.is_some() {
            let org = store.get(INPUT_ORG)?;
            if let Some(n) = self.nprocx {
                org.set(RUNCTL, "nprocx", n)?;
            }
            if let Some(n) = self.nprocy {
                org.set(RUNCTL, "nprocy", n)?;
            }
        }
        if let Some(n) = self.coupler_tasks {
            let drv = store.get(DRV_IN)?;
            for component in COUPLED_COMPONENTS {
                drv.set(CCSM_PES, &format!("{}_ntasks", component), n)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankRange {
    pub first: u32,
    pub last: u32,
    pub executable: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLayout {
    pub ranges: Vec<RankRange>,
    pub total_tasks: u32,
    pub node_count: u32,
}

/// Lay out atmosphere ranks first, coupler ranks after.
///
/// Node count is the integer quotient of tasks by tasks per node. A
/// remainder only produces a warning; deployments rely on it being
/// accepted.
pub fn build_layout(
    decomposition: &Decomposition,
    tasks_per_node: u32,
    atmosphere_exe: &str,
    coupler_exe: &str,
) -> CaseResult<ProcessLayout> {
    if tasks_per_node == 0 {
        return Err(CaseError::InvalidLayout {
            reason: "tasks per node must be positive".to_string(),
        });
    }
    let n_atm = decomposition.atmosphere_tasks()?;
    let total = decomposition.total_tasks()?;
    if n_atm == 0 || decomposition.coupler_tasks == 0 {
        return Err(CaseError::InvalidLayout {
            reason: format!(
                "every component needs at least one task (atmosphere {}, coupler {})",
                n_atm, decomposition.coupler_tasks
            ),
        });
    }

    let node_count = total / tasks_per_node;
    let remainder = total % tasks_per_node;
    if remainder != 0 {
        warn!(
            total_tasks = total,
            tasks_per_node,
            node_count,
            remainder,
            "task count is not a whole number of nodes; truncating"
        );
    }

    Ok(ProcessLayout {
        ranges: vec![
            RankRange {
                first: 0,
                last: n_atm - 1,
                executable: atmosphere_exe.to_string(),
            },
            RankRange {
                first: n_atm,
                last: total - 1,
                executable: coupler_exe.to_string(),
            },
        ],
        total_tasks: total,
        node_count,
    })
}

impl ProcessLayout {
    /// Multi-program map: one `first-last ./exe` line per range.
    pub fn rank_map(&self) -> String {
        let mut out = String::new();
        for range in &self.ranges {
            let exe = if range.executable.contains('/') {
                range.executable.clone()
            } else {
                format!("./{}", range.executable)
            };
            let _ = writeln!(out, "{}-{} {}", range.first, range.last, exe);
        }
        out
    }

    pub fn write_rank_map(&self, path: &Path) -> CaseResult<()> {
        fs::write(path, self.rank_map()).map_err(CaseError::io(path))?;
        debug!(path = %path.display(), nodes = self.node_count, "wrote rank map");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twelve_plus_twelve_on_two_nodes() {
        let decomposition = Decomposition {
            nprocx: 4,
            nprocy: 3,
            coupler_tasks: 12,
        };
        let layout = build_layout(&decomposition, 12, "cosmo", "cesm.exe").unwrap();
        assert_eq!(layout.total_tasks, 24);
        assert_eq!(layout.node_count, 2);
        assert_eq!(
            layout.ranges,
            vec![
                RankRange {
                    first: 0,
                    last: 11,
                    executable: "cosmo".to_string()
                },
                RankRange {
                    first: 12,
                    last: 23,
                    executable: "cesm.exe".to_string()
                },
            ]
        );
        assert_eq!(layout.rank_map(), "0-11 ./cosmo\n12-23 ./cesm.exe\n");
    }

    #[test]
    fn partial_node_is_truncated_not_rejected() {
        let decomposition = Decomposition {
            nprocx: 2,
            nprocy: 2,
            coupler_tasks: 3,
        };
        let layout = build_layout(&decomposition, 4, "cosmo", "/opt/cesm.exe").unwrap();
        assert_eq!(layout.total_tasks, 7);
        assert_eq!(layout.node_count, 1);
        assert_eq!(layout.rank_map(), "0-3 ./cosmo\n4-6 /opt/cesm.exe\n");
    }

    #[test]
    fn zero_tasks_are_rejected() {
        let decomposition = Decomposition {
            nprocx: 0,
            nprocy: 3,
            coupler_tasks: 12,
        };
        assert!(build_layout(&decomposition, 12, "a", "b").is_err());
        let decomposition = Decomposition {
            nprocx: 1,
            nprocy: 1,
            coupler_tasks: 1,
        };
        assert!(build_layout(&decomposition, 0, "a", "b").is_err());
    }

    #[test]
    fn oversized_decomposition_is_invalid_layout() {
        let decomposition = Decomposition {
            nprocx: 70_000,
            nprocy: 70_000,
            coupler_tasks: 1,
        };
        let err = build_layout(&decomposition, 12, "cosmo", "cesm.exe").unwrap_err();
        assert!(matches!(err, CaseError::InvalidLayout { .. }), "{err}");

        let decomposition = Decomposition {
            nprocx: 1,
            nprocy: u32::MAX,
            coupler_tasks: 1,
        };
        assert!(matches!(
            build_layout(&decomposition, 12, "cosmo", "cesm.exe"),
            Err(CaseError::InvalidLayout { .. })
        ));
    }
}
