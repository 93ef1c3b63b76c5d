//! cc-namelist: sub-model namelist files and the per-case store that owns them.

pub mod namelist;
pub mod parse;
pub mod store;
pub mod value;
pub mod write;

pub use namelist::{Group, Namelist};
pub use parse::parse_namelist;
pub use store::NamelistStore;
pub use value::{Value, ValueKind};
pub use write::render_namelist;

use std::path::PathBuf;

pub type NamelistResult<T> = Result<T, NamelistError>;

#[derive(thiserror::Error, Debug)]
pub enum NamelistError {
    #[error("Namelist file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Block '{block}' not found in namelist '{file}'")]
    MissingBlock { file: String, block: String },

    #[error("Parameter '{param}' not found in block '{block}' of namelist '{file}'")]
    MissingField {
        file: String,
        block: String,
        param: String,
    },

    #[error("Parameter '{param}' in block '{block}' of namelist '{file}' is not {expected} (found {found})")]
    WrongKind {
        file: String,
        block: String,
        param: String,
        expected: &'static str,
        found: String,
    },

    #[error("Cannot convert '{text}' to {kind}")]
    Conversion { text: String, kind: &'static str },

    #[error("Parse error in namelist '{file}' line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Namelist '{file}' was never loaded")]
    NotLoaded { file: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
