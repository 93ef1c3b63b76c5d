//! Case descriptor: the persisted identity of a case, re-read by every
//! later invocation.

use std::path::{Path, PathBuf};

use cc_core::RunLength;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CaseError, CaseResult};
use crate::script::ModulesOpt;

fn default_tasks_per_node() -> u32 {
    12
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseDescriptor {
    pub name: String,
    pub path: PathBuf,
    #[serde(with = "case_date")]
    pub start_date: NaiveDateTime,
    #[serde(default, with = "case_date_opt", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_length: Option<RunLength>,
    pub atmosphere_exe: String,
    pub coupler_exe: String,
    pub wall_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, with = "marker", skip_serializing_if = "marker::is_unset")]
    pub gpu_mode: bool,
    #[serde(default, with = "marker", skip_serializing_if = "marker::is_unset")]
    pub module_purge: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules_opt: Option<ModulesOpt>,
    #[serde(default, with = "marker", skip_serializing_if = "marker::is_unset")]
    pub dummy_day: bool,
    #[serde(default = "default_tasks_per_node")]
    pub tasks_per_node: u32,
}

impl CaseDescriptor {
    /// Explicit `modules_opt` first, then the legacy purge flag.
    pub fn modules(&self) -> ModulesOpt {
        match self.modules_opt {
            Some(opt) => opt,
            None if self.module_purge => ModulesOpt::Purge,
            None => ModulesOpt::Switch,
        }
    }
}

/// Boolean flags are stored as a presence marker: `"1"` when set, absent
/// otherwise. Any non-empty scalar reads as set.
mod marker {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Int(i64),
        Str(String),
        Null(()),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "1" } else { "" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Scalar::deserialize(deserializer)? {
            Scalar::Bool(b) => b,
            Scalar::Int(_) => true,
            Scalar::Str(s) => !s.trim().is_empty(),
            Scalar::Null(()) => false,
        })
    }

    pub fn is_unset(value: &bool) -> bool {
        !*value
    }
}

mod case_date {
    use cc_core::{format_case_date, parse_case_date};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_case_date(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_case_date(&text).map_err(D::Error::custom)
    }
}

mod case_date_opt {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => super::case_date::serialize(date, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        match text.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => cc_core::parse_case_date(text)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn descriptor_error(path: &Path, message: impl ToString) -> CaseError {
    CaseError::Descriptor {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Read a descriptor; `.json` files are JSON, anything else YAML.
pub fn load_descriptor(path: &Path) -> CaseResult<CaseDescriptor> {
    if !path.is_file() {
        return Err(CaseError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(CaseError::io(path))?;
    let descriptor: CaseDescriptor = if is_json(path) {
        serde_json::from_str(&content).map_err(|e| descriptor_error(path, e))?
    } else {
        serde_yaml::from_str(&content).map_err(|e| descriptor_error(path, e))?
    };
    debug!(path = %path.display(), name = %descriptor.name, "loaded case descriptor");
    Ok(descriptor)
}

pub fn save_descriptor(path: &Path, descriptor: &CaseDescriptor) -> CaseResult<()> {
    let content = if is_json(path) {
        serde_json::to_string_pretty(descriptor).map_err(|e| descriptor_error(path, e))?
    } else {
        serde_yaml::to_string(descriptor).map_err(|e| descriptor_error(path, e))?
    };
    std::fs::write(path, content).map_err(CaseError::io(path))?;
    debug!(path = %path.display(), "saved case descriptor");
    Ok(())
}
