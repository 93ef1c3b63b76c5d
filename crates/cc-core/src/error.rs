use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Malformed duration '{expr}': expected N1yN2m, N1y, N2m or N3d")]
    MalformedDuration { expr: String },

    #[error("Malformed date '{text}' for {what} (expected {format})")]
    MalformedDate {
        what: &'static str,
        text: String,
        format: &'static str,
    },

    #[error("Date out of range: {what}")]
    DateOutOfRange { what: String },
}
