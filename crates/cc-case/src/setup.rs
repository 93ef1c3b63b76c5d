//! Case setup options and namelist overrides read from a setup file.
//!
//! Option precedence is command line, then setup file `main`, then the
//! built-in defaults. Missing path and account fall back to `$SCRATCH`
//! and `$PROJECT`.

use std::path::{Path, PathBuf};

use cc_core::{RunLength, parse_case_date};
use cc_namelist::{NamelistStore, Value, ValueKind};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::case::CaseParams;
use crate::error::{CaseError, CaseResult};
use crate::layout::DecompositionOverrides;
use crate::script::ModulesOpt;

pub const DEFAULT_NAME: &str = "COSMO_CLM2";
pub const DEFAULT_ATMOSPHERE_EXE: &str = "cosmo";
pub const DEFAULT_COUPLER_EXE: &str = "cesm.exe";
pub const DEFAULT_WALL_TIME: &str = "24:00:00";
pub const DEFAULT_TASKS_PER_NODE: u32 = 12;

/// Every case option, unset unless given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseOptions {
    pub name: Option<String>,
    pub path: Option<PathBuf>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub run_length: Option<String>,
    pub atmosphere_exe: Option<String>,
    pub coupler_exe: Option<String>,
    pub wall_time: Option<String>,
    pub account: Option<String>,
    pub gpu_mode: Option<bool>,
    pub dummy_day: Option<bool>,
    pub module_purge: Option<bool>,
    pub modules_opt: Option<ModulesOpt>,
    pub tasks_per_node: Option<u32>,
    pub nprocx: Option<u32>,
    pub nprocy: Option<u32>,
    pub coupler_tasks: Option<u32>,
    pub gen_oasis: Option<bool>,
}

impl CaseOptions {
    /// Fill every unset option from `fallback`.
    pub fn merge(self, fallback: CaseOptions) -> CaseOptions {
        CaseOptions {
            name: self.name.or(fallback.name),
            path: self.path.or(fallback.path),
            start_date: self.start_date.or(fallback.start_date),
            end_date: self.end_date.or(fallback.end_date),
            run_length: self.run_length.or(fallback.run_length),
            atmosphere_exe: self.atmosphere_exe.or(fallback.atmosphere_exe),
            coupler_exe: self.coupler_exe.or(fallback.coupler_exe),
            wall_time: self.wall_time.or(fallback.wall_time),
            account: self.account.or(fallback.account),
            gpu_mode: self.gpu_mode.or(fallback.gpu_mode),
            dummy_day: self.dummy_day.or(fallback.dummy_day),
            module_purge: self.module_purge.or(fallback.module_purge),
            modules_opt: self.modules_opt.or(fallback.modules_opt),
            tasks_per_node: self.tasks_per_node.or(fallback.tasks_per_node),
            nprocx: self.nprocx.or(fallback.nprocx),
            nprocy: self.nprocy.or(fallback.nprocy),
            coupler_tasks: self.coupler_tasks.or(fallback.coupler_tasks),
            gen_oasis: self.gen_oasis.or(fallback.gen_oasis),
        }
    }

    /// Apply defaults and resolve environment fallbacks. `env` looks up an
    /// environment variable.
    pub fn into_params(self, env: impl Fn(&str) -> Option<String>) -> CaseResult<CaseParams> {
        let name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_string());

        let path = match self.path {
            Some(path) => path,
            None => {
                let scratch = env("SCRATCH").ok_or_else(|| CaseError::InvalidValue {
                    what: "path".to_string(),
                    reason: "not given and $SCRATCH is not set".to_string(),
                })?;
                PathBuf::from(scratch).join(&name)
            }
        };

        let account = match self.account {
            Some(account) => Some(account),
            None => env("PROJECT").as_deref().and_then(account_from_project),
        };

        let start_date = self.start_date.as_deref().map(parse_case_date).transpose()?;
        let end_date = self.end_date.as_deref().map(parse_case_date).transpose()?;
        let run_length = self
            .run_length
            .as_deref()
            .map(str::parse::<RunLength>)
            .transpose()?;

        let modules = match (self.modules_opt, self.module_purge) {
            (Some(opt), _) => opt,
            (None, Some(true)) => ModulesOpt::Purge,
            _ => ModulesOpt::Switch,
        };

        let gen_oasis = self.gen_oasis.unwrap_or(false);

        Ok(CaseParams {
            name,
            path,
            start_date,
            end_date,
            run_length,
            atmosphere_exe: self
                .atmosphere_exe
                .as_deref()
                .map(executable_name)
                .unwrap_or_else(|| DEFAULT_ATMOSPHERE_EXE.to_string()),
            coupler_exe: self
                .coupler_exe
                .as_deref()
                .map(executable_name)
                .unwrap_or_else(|| DEFAULT_COUPLER_EXE.to_string()),
            wall_time: self.wall_time.unwrap_or_else(|| DEFAULT_WALL_TIME.to_string()),
            account,
            gpu_mode: self.gpu_mode.unwrap_or(false),
            modules,
            // The coupler stops after writing its auxiliary files.
            dummy_day: !gen_oasis && self.dummy_day.unwrap_or(true),
            tasks_per_node: self.tasks_per_node.unwrap_or(DEFAULT_TASKS_PER_NODE),
            overrides: DecompositionOverrides {
                nprocx: self.nprocx,
                nprocy: self.nprocy,
                coupler_tasks: self.coupler_tasks,
            },
            gen_oasis,
        })
    }
}

/// Executables are copied into the case directory, so only the file name
/// is kept.
fn executable_name(exe: &str) -> String {
    Path::new(exe)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| exe.to_string())
}

/// `$PROJECT` is `/<root>/<account>/<user>`; the account is the parent
/// directory name.
fn account_from_project(project: &str) -> Option<String> {
    let path = Path::new(project.trim_end_matches('/'));
    path.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl RawScalar {
    fn to_text(&self) -> String {
        match self {
            RawScalar::Bool(b) => b.to_string(),
            RawScalar::Int(i) => i.to_string(),
            RawScalar::Float(f) => format!("{:?}", f),
            RawScalar::Str(s) => s.clone(),
        }
    }
}

/// Value of a parameter override as written in the setup file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Scalar(RawScalar),
    Sequence(Vec<RawScalar>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamChange {
    pub file: String,
    pub block: String,
    /// 1-based index among repeated groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    pub param: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValueKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_kind: Option<ValueKind>,
    pub value: RawValue,
}

impl ParamChange {
    /// Convert the raw value by its declared kind. Sequences default to a
    /// list of strings, scalars to a string.
    pub fn to_value(&self) -> CaseResult<Value> {
        let item_kind = self.item_kind.unwrap_or_default();
        let what = || format!("{}/{}/{}", self.file, self.block, self.param);
        match &self.value {
            RawValue::Scalar(scalar) => {
                let kind = self.kind.unwrap_or_default();
                Ok(kind.convert(&scalar.to_text(), item_kind)?)
            }
            RawValue::Sequence(items) => match self.kind.unwrap_or(ValueKind::List) {
                ValueKind::List => {
                    if item_kind == ValueKind::List {
                        return Err(CaseError::InvalidValue {
                            what: what(),
                            reason: "nested lists are not supported".to_string(),
                        });
                    }
                    items
                        .iter()
                        .map(|item| item_kind.convert(&item.to_text(), ValueKind::String))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::List)
                        .map_err(CaseError::from)
                }
                other => Err(CaseError::InvalidValue {
                    what: what(),
                    reason: format!("a sequence cannot be converted to {:?}", other),
                }),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDelete {
    pub file: String,
    pub block: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    pub param: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetupFile {
    #[serde(default)]
    pub main: CaseOptions,
    #[serde(default)]
    pub change_par: Vec<ParamChange>,
    #[serde(default)]
    pub del_par: Vec<ParamDelete>,
}

pub fn load_setup_file(path: &Path) -> CaseResult<SetupFile> {
    if !path.is_file() {
        return Err(CaseError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(CaseError::io(path))?;
    serde_yaml::from_str(&content).map_err(|e| CaseError::Descriptor {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Apply namelist edits in order. Nothing is flushed.
pub fn apply_param_changes(
    store: &mut NamelistStore,
    changes: &[ParamChange],
    deletes: &[ParamDelete],
) -> CaseResult<()> {
    for change in changes {
        let value = change.to_value()?;
        let nml = store.get(&change.file)?;
        match change.n {
            Some(n) => nml.set_indexed(&change.block, n, &change.param, value)?,
            None => nml.set(&change.block, &change.param, value)?,
        }
        info!(file = %change.file, block = %change.block, param = %change.param, "changed namelist parameter");
    }
    for delete in deletes {
        let nml = store.get(&delete.file)?;
        match delete.n {
            Some(n) => nml.remove_indexed(&delete.block, n, &delete.param)?,
            None => nml.remove(&delete.block, &delete.param)?,
        };
        info!(file = %delete.file, block = %delete.block, param = %delete.param, "deleted namelist parameter");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn command_line_wins_over_setup_file() {
        let cli = CaseOptions {
            name: Some("cli".to_string()),
            ..Default::default()
        };
        let file = CaseOptions {
            name: Some("file".to_string()),
            wall_time: Some("02:00:00".to_string()),
            ..Default::default()
        };
        let merged = cli.merge(file);
        assert_eq!(merged.name.as_deref(), Some("cli"));
        assert_eq!(merged.wall_time.as_deref(), Some("02:00:00"));
    }

    #[test]
    fn defaults_and_environment_fallbacks() {
        let params = CaseOptions::default()
            .into_params(env(&[("SCRATCH", "/scratch/me"), ("PROJECT", "/project/s123/me")]))
            .unwrap();
        assert_eq!(params.name, DEFAULT_NAME);
        assert_eq!(params.path, PathBuf::from("/scratch/me/COSMO_CLM2"));
        assert_eq!(params.account.as_deref(), Some("s123"));
        assert_eq!(params.wall_time, DEFAULT_WALL_TIME);
        assert!(params.dummy_day);
        assert!(!params.gpu_mode);
        assert_eq!(params.modules, ModulesOpt::Switch);
        assert_eq!(params.tasks_per_node, 12);
        assert!(params.overrides.is_empty());
        assert!(!params.gen_oasis);
        assert_eq!(params.start_date, None);
    }

    #[test]
    fn gen_oasis_disables_dummy_day() {
        let params = CaseOptions {
            path: Some(PathBuf::from("/tmp/case")),
            dummy_day: Some(true),
            gen_oasis: Some(true),
            ..Default::default()
        }
        .into_params(env(&[]))
        .unwrap();
        assert!(params.gen_oasis);
        assert!(!params.dummy_day);
    }

    #[test]
    fn missing_scratch_without_path_fails() {
        let err = CaseOptions::default().into_params(env(&[])).unwrap_err();
        assert!(matches!(err, CaseError::InvalidValue { .. }));
    }

    #[test]
    fn executables_keep_file_name_only() {
        let params = CaseOptions {
            path: Some(PathBuf::from("/tmp/case")),
            atmosphere_exe: Some("./build/cosmo_gpu".to_string()),
            module_purge: Some(true),
            ..Default::default()
        }
        .into_params(env(&[]))
        .unwrap();
        assert_eq!(params.atmosphere_exe, "cosmo_gpu");
        assert_eq!(params.modules, ModulesOpt::Purge);
        assert_eq!(params.account, None);
    }

    #[test]
    fn setup_file_parses_changes() {
        let yaml = r#"
main:
  name: test
  run_length: 1m
change_par:
  - {file: INPUT_IO, block: gribout, n: 2, param: hcomb, kind: list, item_kind: float, value: [0, 48, 6]}
  - {file: INPUT_ORG, block: runctl, param: dt, kind: float, value: 60}
  - {file: drv_in, block: seq_infodata_inparm, param: case_desc, value: long run}
del_par:
  - {file: INPUT_IO, block: ioctl, param: lasync_io}
"#;
        let setup: SetupFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(setup.main.name.as_deref(), Some("test"));
        assert_eq!(
            setup.change_par[0].to_value().unwrap(),
            Value::from(vec![0.0, 48.0, 6.0])
        );
        assert_eq!(setup.change_par[1].to_value().unwrap(), Value::Float(60.0));
        assert_eq!(setup.change_par[2].to_value().unwrap(), Value::from("long run"));
        assert_eq!(setup.del_par[0].n, None);
    }

    #[test]
    fn missing_param_names_the_field() {
        let yaml = "change_par:\n  - {file: INPUT_IO, block: ioctl, value: 1}\n";
        let err = serde_yaml::from_str::<SetupFile>(yaml).unwrap_err();
        assert!(err.to_string().contains("param"));
    }

    #[test]
    fn unknown_main_option_is_rejected() {
        let yaml = "main:\n  colour: red\n";
        assert!(serde_yaml::from_str::<SetupFile>(yaml).is_err());
    }
}
