use std::io;

use thiserror::Error;

use crate::types::{LabelCode, RelativePath};

/// Error type for corpus, feature, model, and artifact failures.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("corpus entry '{path}' is inconsistent: {details}")]
    Integrity { path: RelativePath, details: String },
    #[error("{0} is not trained")]
    UntrainedModel(&'static str),
    #[error("unknown {family} code '{code}'")]
    UnknownLabel { family: String, code: LabelCode },
    #[error("no free file name for host '{host}' after {attempts} attempts")]
    FilenameExhaustion { host: String, attempts: usize },
    #[error("model artifact error: {0}")]
    Artifact(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
