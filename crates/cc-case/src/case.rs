//! Case facade: owns the namelist store and the derived schedule of one
//! case directory, and drives it through the restart chain.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use cc_core::{RunLength, format_atmosphere_date, format_case_date, parse_atmosphere_date};
use cc_namelist::{Group, NamelistStore};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};

use crate::chain::{ChainState, Transition, has_next_chunk, prepare_continuation};
use crate::descriptor::{CaseDescriptor, load_descriptor, save_descriptor};
use crate::error::{CaseError, CaseResult};
use crate::external::{BatchScheduler, ParallelLauncher};
use crate::layout::{Decomposition, DecompositionOverrides, ProcessLayout, build_layout};
use crate::names::*;
use crate::output::apply_output_window;
use crate::reconcile::{RunPeriod, apply_run_period, compute_run_period};
use crate::script::{ControlScript, ModulesOpt, update_log_file};
use crate::setup::{ParamChange, ParamDelete, apply_param_changes};

const SHEBANG: &str = "#!/bin/bash -l";

/// Resolved case options. Start and end dates may be left to the
/// namelists (`ydate_ini`, `ydate_end`).
#[derive(Debug, Clone, PartialEq)]
pub struct CaseParams {
    pub name: String,
    pub path: PathBuf,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub run_length: Option<RunLength>,
    pub atmosphere_exe: String,
    pub coupler_exe: String,
    pub wall_time: String,
    pub account: Option<String>,
    pub gpu_mode: bool,
    pub modules: ModulesOpt,
    pub dummy_day: bool,
    pub tasks_per_node: u32,
    pub overrides: DecompositionOverrides,
    /// Run once to generate the coupler's auxiliary files: a single
    /// atmosphere task on the coupler side and no dummy day.
    pub gen_oasis: bool,
}

impl From<CaseDescriptor> for CaseParams {
    fn from(d: CaseDescriptor) -> Self {
        let modules = d.modules();
        Self {
            name: d.name,
            path: d.path,
            start_date: Some(d.start_date),
            end_date: d.end_date,
            run_length: d.run_length,
            atmosphere_exe: d.atmosphere_exe,
            coupler_exe: d.coupler_exe,
            wall_time: d.wall_time,
            account: d.account,
            gpu_mode: d.gpu_mode,
            modules,
            dummy_day: d.dummy_day,
            tasks_per_node: d.tasks_per_node,
            // Already persisted in the namelists by the creating invocation.
            overrides: DecompositionOverrides::default(),
            gen_oasis: false,
        }
    }
}

/// Printable view of a case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseSummary {
    pub name: String,
    pub path: PathBuf,
    pub start_date: String,
    pub end_date: String,
    pub chunk_start: String,
    pub chunk_end: String,
    pub chunk_hours: i64,
    pub state: ChainState,
    pub total_tasks: u32,
    pub node_count: u32,
    pub rank_map: Vec<String>,
}

#[derive(Debug)]
pub struct Case {
    params: CaseParams,
    store: NamelistStore,
    start: NaiveDateTime,
    end: NaiveDateTime,
    period: RunPeriod,
    state: ChainState,
    layout: ProcessLayout,
    descriptor_path: PathBuf,
}

impl Case {
    /// Configure a new case in `params.path` and write its descriptor.
    pub fn create(params: CaseParams) -> CaseResult<Self> {
        Self::create_with(params, &[], &[])
    }

    /// Configure a new case, apply setup-file namelist edits and write its
    /// descriptor.
    ///
    /// The descriptor is written last, so a failed creation leaves none.
    /// The case path is made absolute first since batch jobs reopen the
    /// case from inside its directory.
    pub fn create_with(mut params: CaseParams, changes: &[ParamChange], deletes: &[ParamDelete]) -> CaseResult<Self> {
        params.path = std::path::absolute(&params.path).map_err(CaseError::io(&params.path))?;
        info!(name = %params.name, path = %params.path.display(), "setting up case");
        let descriptor_path = params.path.join(DESCRIPTOR);
        let mut case = Self::configure(params, descriptor_path)?;
        case.apply_edits(changes, deletes)?;
        case.save_descriptor()?;
        info!(
            name = %case.params.name,
            chunk_start = %case.period.start,
            chunk_end = %case.period.end,
            nodes = case.layout.node_count,
            "case created"
        );
        Ok(case)
    }

    /// Reopen a case from its descriptor, re-deriving everything from the
    /// namelists on disk.
    pub fn open(descriptor_path: &Path) -> CaseResult<Self> {
        let descriptor = load_descriptor(descriptor_path)?;
        let case = Self::configure(descriptor.into(), descriptor_path.to_path_buf())?;
        info!(name = %case.params.name, state = %case.state, "case opened");
        Ok(case)
    }

    /// Read a case for inspection. The chunk, chain state and layout are
    /// derived from the files as they are; nothing is written or removed.
    pub fn load(descriptor_path: &Path) -> CaseResult<Self> {
        let descriptor = load_descriptor(descriptor_path)?;
        let start = descriptor.start_date;
        let params = CaseParams::from(descriptor);
        let mut store = NamelistStore::new(&params.path);

        let end = match params.end_date {
            Some(date) => Some(date),
            None => namelist_end(&mut store)?,
        };
        let schedule = compute_run_period(&mut store, end, params.run_length.as_ref())?;
        let state = ChainState::derive(start, schedule.case_end, &schedule.period);
        let layout = build_layout(
            &Decomposition::from_store(&mut store)?,
            params.tasks_per_node,
            &params.atmosphere_exe,
            &params.coupler_exe,
        )?;
        debug!(name = %params.name, state = %state, "case loaded");
        Ok(Self {
            params,
            store,
            start,
            end: schedule.case_end,
            period: schedule.period,
            state,
            layout,
            descriptor_path: descriptor_path.to_path_buf(),
        })
    }

    fn configure(params: CaseParams, descriptor_path: PathBuf) -> CaseResult<Self> {
        let mut store = NamelistStore::new(&params.path);

        store
            .get(DRV_IN)?
            .set(INFODATA, "case_name", params.name.as_str())?;

        let org = store.get(INPUT_ORG)?;
        let start = match params.start_date {
            Some(date) => {
                org.set(RUNCTL, "ydate_ini", format_atmosphere_date(&date))?;
                date
            }
            None => parse_atmosphere_date(org.string(RUNCTL, "ydate_ini")?)?,
        };
        let end = match params.end_date {
            Some(date) => {
                org.set(RUNCTL, "ydate_end", format_atmosphere_date(&date))?;
                Some(date)
            }
            None => namelist_end(&mut store)?,
        };

        let schedule = compute_run_period(&mut store, end, params.run_length.as_ref())?;
        apply_run_period(&mut store, &params.path, start, &schedule.period)?;
        apply_output_window(store.get(INPUT_IO)?, schedule.period.hours())?;
        params.overrides.apply(&mut store)?;
        if params.gen_oasis {
            store.get(DRV_IN)?.set(CCSM_PES, "atm_ntasks", 1)?;
        }
        store.write_all()?;

        let state = ChainState::derive(start, schedule.case_end, &schedule.period);
        let layout = build_layout(
            &Decomposition::from_store(&mut store)?,
            params.tasks_per_node,
            &params.atmosphere_exe,
            &params.coupler_exe,
        )?;

        let mut case = Self {
            params,
            store,
            start,
            end: schedule.case_end,
            period: schedule.period,
            state,
            layout,
            descriptor_path,
        };
        case.layout.write_rank_map(&case.params.path.join(RANK_MAP))?;
        case.control_script().write(&case.params.path.join(CONTROL_SCRIPT))?;
        case.create_missing_dirs()?;
        Ok(case)
    }

    /// Move to the next chunk, or report that the chain is finished.
    ///
    /// On `Terminal` nothing is modified. Any failure aborts the advance;
    /// files flushed before the failure stay as written.
    pub fn advance(&mut self) -> CaseResult<Transition> {
        if !has_next_chunk(&self.period, self.end, self.params.dummy_day, self.state) {
            self.state = ChainState::Done;
            info!(name = %self.params.name, case_end = %self.end, "no chunk left");
            return Ok(Transition::Terminal);
        }

        prepare_continuation(&mut self.store, self.start, self.period.end)?;
        self.store.write_all()?;

        let schedule = compute_run_period(&mut self.store, Some(self.end), self.params.run_length.as_ref())?;
        let period = schedule.period;
        apply_run_period(&mut self.store, &self.params.path, self.start, &period)?;
        apply_output_window(self.store.get(INPUT_IO)?, period.hours())?;
        self.store.write_all()?;

        self.layout = self.rebuild_layout()?;
        self.layout.write_rank_map(&self.params.path.join(RANK_MAP))?;
        update_log_file(
            &self.params.path.join(CONTROL_SCRIPT),
            &period.log_file_name(&self.params.name),
        )?;

        self.period = period;
        self.state = if period.start == self.end {
            ChainState::FinalDummy
        } else {
            ChainState::Continuing
        };
        info!(
            name = %self.params.name,
            chunk_start = %period.start,
            chunk_end = %period.end,
            state = %self.state,
            "advanced to next chunk"
        );
        Ok(Transition::Continue(period))
    }

    /// Clean stale run artifacts and launch the current chunk.
    pub fn run(&self, launcher: &dyn ParallelLauncher) -> CaseResult<()> {
        self.clean_workdir()?;
        let started = Instant::now();
        launcher.launch(&self.params.path, &Path::new(".").join(RANK_MAP))?;
        info!(
            name = %self.params.name,
            elapsed_s = started.elapsed().as_secs_f64(),
            "case ran"
        );
        Ok(())
    }

    pub fn submit(&self, scheduler: &dyn BatchScheduler) -> CaseResult<()> {
        scheduler.submit(
            &self.params.path,
            Path::new(CONTROL_SCRIPT),
            Path::new(&self.descriptor_argument()),
        )
    }

    /// Namelist edits from a setup file. The layout, rank map and control
    /// script are regenerated since the edits may touch the decomposition.
    pub fn apply_overrides(&mut self, changes: &[ParamChange], deletes: &[ParamDelete]) -> CaseResult<()> {
        if changes.is_empty() && deletes.is_empty() {
            return Ok(());
        }
        self.apply_edits(changes, deletes)?;
        self.save_descriptor()
    }

    fn apply_edits(&mut self, changes: &[ParamChange], deletes: &[ParamDelete]) -> CaseResult<()> {
        if changes.is_empty() && deletes.is_empty() {
            return Ok(());
        }
        apply_param_changes(&mut self.store, changes, deletes)?;
        self.store.write_all()?;
        self.layout = self.rebuild_layout()?;
        self.layout.write_rank_map(&self.params.path.join(RANK_MAP))?;
        self.control_script().write(&self.params.path.join(CONTROL_SCRIPT))
    }

    pub fn descriptor(&self) -> CaseDescriptor {
        CaseDescriptor {
            name: self.params.name.clone(),
            path: self.params.path.clone(),
            start_date: self.start,
            end_date: Some(self.end),
            run_length: self.params.run_length,
            atmosphere_exe: self.params.atmosphere_exe.clone(),
            coupler_exe: self.params.coupler_exe.clone(),
            wall_time: self.params.wall_time.clone(),
            account: self.params.account.clone(),
            gpu_mode: self.params.gpu_mode,
            module_purge: self.params.modules == ModulesOpt::Purge,
            modules_opt: Some(self.params.modules),
            dummy_day: self.params.dummy_day,
            tasks_per_node: self.params.tasks_per_node,
        }
    }

    pub fn save_descriptor(&self) -> CaseResult<()> {
        save_descriptor(&self.descriptor_path, &self.descriptor())
    }

    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            name: self.params.name.clone(),
            path: self.params.path.clone(),
            start_date: format_case_date(&self.start),
            end_date: format_case_date(&self.end),
            chunk_start: format_case_date(&self.period.start),
            chunk_end: format_case_date(&self.period.end),
            chunk_hours: self.period.hours(),
            state: self.state,
            total_tasks: self.layout.total_tasks,
            node_count: self.layout.node_count,
            rank_map: self.layout.rank_map().lines().map(str::to_string).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.params.name
    }

    pub fn path(&self) -> &Path {
        &self.params.path
    }

    pub fn params(&self) -> &CaseParams {
        &self.params
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn period(&self) -> &RunPeriod {
        &self.period
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn layout(&self) -> &ProcessLayout {
        &self.layout
    }

    pub fn store(&self) -> &NamelistStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut NamelistStore {
        &mut self.store
    }

    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor_path
    }

    fn rebuild_layout(&mut self) -> CaseResult<ProcessLayout> {
        build_layout(
            &Decomposition::from_store(&mut self.store)?,
            self.params.tasks_per_node,
            &self.params.atmosphere_exe,
            &self.params.coupler_exe,
        )
    }

    fn descriptor_argument(&self) -> String {
        let file = self
            .descriptor_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DESCRIPTOR.to_string());
        format!("./{}", file)
    }

    fn control_script(&self) -> ControlScript {
        ControlScript {
            shebang: SHEBANG.to_string(),
            job_name: self.params.name.clone(),
            node_count: self.layout.node_count,
            log_file: self.period.log_file_name(&self.params.name),
            account: self.params.account.clone(),
            wall_time: self.params.wall_time.clone(),
            modules: self.params.modules,
            gpu_mode: self.params.gpu_mode,
            descriptor: self.descriptor_argument(),
        }
    }

    fn create_missing_dirs(&mut self) -> CaseResult<()> {
        let io = self.store.get(INPUT_IO)?;
        let mut dirs = vec![
            io.string(GRIBIN, "ydirini")?.to_string(),
            io.string(GRIBIN, "ydirbd")?.to_string(),
        ];
        for gribout in io.groups(GRIBOUT) {
            dirs.push(group_string(gribout, INPUT_IO, "ydir")?);
        }
        dirs.push(io.string(IOCTL, "ydir_restart_in")?.to_string());
        dirs.push(io.string(IOCTL, "ydir_restart_out")?.to_string());

        // Coupler timing output must start empty.
        let drv = self.store.get(DRV_IN)?;
        for param in ["timing_dir", "tchkpt_dir"] {
            let dir = self.params.path.join(drv.string(INFODATA, param)?);
            if dir.is_dir() {
                fs::remove_dir_all(&dir).map_err(CaseError::io(&dir))?;
                debug!(path = %dir.display(), "removed coupler timing directory");
            }
            dirs.push(drv.string(INFODATA, param)?.to_string());
        }

        for component in COUPLED_COMPONENTS {
            let file = modelio_file(component);
            let modelio = self.store.get(&file)?;
            dirs.push(modelio.string(MODELIO, "diri")?.to_string());
            dirs.push(modelio.string(MODELIO, "diro")?.to_string());
        }

        for rel in dirs {
            let dir = self.params.path.join(&rel);
            if !dir.exists() {
                fs::create_dir_all(&dir).map_err(CaseError::io(&dir))?;
                info!(path = %dir.display(), "created directory");
            }
        }
        Ok(())
    }

    fn clean_workdir(&self) -> CaseResult<()> {
        let dir = &self.params.path;
        let entries = fs::read_dir(dir).map_err(CaseError::io(dir))?;
        for entry in entries {
            let entry = entry.map_err(CaseError::io(dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_stale_artifact(&name) && entry.path().is_file() {
                let path = entry.path();
                fs::remove_file(&path).map_err(CaseError::io(&path))?;
                debug!(path = %path.display(), "removed stale run artifact");
            }
        }
        Ok(())
    }
}

/// `ydate_end` from the atmosphere namelist, if set.
fn namelist_end(store: &mut NamelistStore) -> CaseResult<Option<NaiveDateTime>> {
    let org = store.get(INPUT_ORG)?;
    if !org.require_group(RUNCTL)?.contains("ydate_end") {
        return Ok(None);
    }
    Ok(Some(parse_atmosphere_date(org.string(RUNCTL, "ydate_end")?)?))
}

fn group_string(group: &Group, file: &str, param: &str) -> CaseResult<String> {
    group
        .get(param)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| CaseError::MissingField {
            file: file.to_string(),
            block: group.name().to_string(),
            param: Some(param.to_string()),
        })
}

/// Files left by a previous launch: `YU*`, `debug*`, `core*`, `nout.*`,
/// `*.timers_*`.
fn is_stale_artifact(name: &str) -> bool {
    ["YU", "debug", "core", "nout."]
        .iter()
        .any(|prefix| name.starts_with(prefix))
        || name.contains(".timers_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_artifacts() {
        for name in ["YUSPECIF", "debug.0", "core", "nout.000000", "ccsm.timers_0"] {
            assert!(is_stale_artifact(name), "{name}");
        }
        for name in ["INPUT_ORG", "proc_config", "cesm.exe", "controller"] {
            assert!(!is_stale_artifact(name), "{name}");
        }
    }
}
