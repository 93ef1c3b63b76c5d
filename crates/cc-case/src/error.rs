//! Error types for the case layer.

use std::path::PathBuf;

use cc_core::CoreError;
use cc_namelist::NamelistError;
use chrono::NaiveDateTime;

/// Every failure a case invocation can hit. None of them is retried; the
/// binary reports the message and exits.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Missing field: {file}/{block}{}", param.as_deref().map(|p| format!("/{}", p)).unwrap_or_default())]
    MissingField {
        file: String,
        block: String,
        param: Option<String>,
    },

    #[error("Start dates differ between atmosphere ({atmosphere}) and coupler ({coupler}) namelists")]
    DateMismatch {
        atmosphere: NaiveDateTime,
        coupler: NaiveDateTime,
    },

    #[error("Run lengths differ between atmosphere ({atmosphere_s} s) and coupler ({coupler_s} s) namelists")]
    DurationMismatch { atmosphere_s: f64, coupler_s: i64 },

    #[error("Invalid range: run start {start} is after {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Malformed duration '{expr}'")]
    MalformedDuration { expr: String },

    #[error("External command failed: {command} ({status})")]
    ExternalCommandFailure { command: String, status: String },

    #[error("Invalid process layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("Invalid value for {what}: {reason}")]
    InvalidValue { what: String, reason: String },

    #[error("Namelist error: {0}")]
    Namelist(String),

    #[error("Descriptor error in {}: {message}", path.display())]
    Descriptor { path: PathBuf, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for case operations.
pub type CaseResult<T> = Result<T, CaseError>;

impl CaseError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> CaseError {
        let path = path.into();
        move |source| CaseError::Io { path, source }
    }
}

impl From<NamelistError> for CaseError {
    fn from(err: NamelistError) -> Self {
        match err {
            NamelistError::NotFound { path } => CaseError::ConfigNotFound { path },
            NamelistError::MissingBlock { file, block } => CaseError::MissingField {
                file,
                block,
                param: None,
            },
            NamelistError::MissingField { file, block, param } => CaseError::MissingField {
                file,
                block,
                param: Some(param),
            },
            NamelistError::Io { path, source } => CaseError::Io { path, source },
            other => CaseError::Namelist(other.to_string()),
        }
    }
}

impl From<CoreError> for CaseError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedDuration { expr } => CaseError::MalformedDuration { expr },
            CoreError::MalformedDate { what, text, format } => CaseError::InvalidValue {
                what: what.to_string(),
                reason: format!("'{}' does not match {}", text, format),
            },
            CoreError::DateOutOfRange { what } => CaseError::InvalidValue {
                what,
                reason: "date out of range".to_string(),
            },
        }
    }
}
