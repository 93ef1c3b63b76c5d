//! Coupled-case configuration and run chaining.
//!
//! This crate turns a directory of sub-model namelists into a runnable,
//! restartable case: it reconciles the start dates the atmosphere and the
//! coupler each encode, bounds every execution chunk, filters output
//! blocks that do not fit a chunk, lays out ranks over nodes and drives
//! the case from chunk to chunk until its end date.

pub mod case;
pub mod chain;
pub mod descriptor;
pub mod error;
pub mod external;
pub mod layout;
pub mod names;
pub mod output;
pub mod reconcile;
pub mod script;
pub mod setup;

// Re-export key types for convenience
pub use case::{Case, CaseParams, CaseSummary};
pub use chain::{ChainState, Transition};
pub use descriptor::{CaseDescriptor, load_descriptor, save_descriptor};
pub use error::{CaseError, CaseResult};
pub use external::{BatchScheduler, FileSync, ParallelLauncher, Rsync, SlurmScheduler, SrunLauncher};
pub use layout::{Decomposition, DecompositionOverrides, ProcessLayout, RankRange, build_layout};
pub use output::{OutputWindow, apply_output_window, filter_output_blocks};
pub use reconcile::{RunPeriod, RunSchedule, apply_run_period, compute_run_period};
pub use script::{ControlScript, ModulesOpt, update_log_file};
pub use setup::{CaseOptions, ParamChange, ParamDelete, SetupFile, apply_param_changes, load_setup_file};
