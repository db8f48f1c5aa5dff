use std::path::PathBuf;

use qbank_core::error::CoreError;
use thiserror::Error;

/// Fatal export errors. Recoverable problems (dangling questions, rejected
/// images, stripped directives, failed compiles) never surface here; they
/// are reported through `ExportReport`.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template parse error: {0}")]
    TemplateParse(String),

    #[error("template rendering failed: {0}")]
    TemplateRender(String),

    #[error("list not found: {0}")]
    ListNotFound(String),

    #[error("data store error: {0}")]
    Source(String),

    #[error("sanitizer pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background export task failed: {0}")]
    Background(String),
}

impl From<tera::Error> for ExportError {
    fn from(e: tera::Error) -> Self {
        ExportError::TemplateRender(error_chain(&e))
    }
}

/// Tera keeps the useful part of its errors (line, variable name) in the
/// source chain; flatten it into one message.
pub(crate) fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.into(),
            source,
        }
    }
}
