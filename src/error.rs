use thiserror::Error;

/// Document-level failures. Anything returned here aborts the whole report;
/// per-block problems are absorbed by the pipeline and never surface as an
/// `Err`.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReportError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ReportError::InvalidInput(message.into())
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ReportError::InvalidConfiguration(message.into())
    }
}

/// Failures raised by the rendering collaborators. The pipeline catches
/// these per block and substitutes a placeholder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),

    #[error("renderer returned no image data")]
    EmptyOutput,

    #[error("operation not supported by renderer: {0}")]
    Unsupported(&'static str),

    #[error("invalid bitmap: {0}")]
    InvalidBitmap(String),
}

impl RenderError {
    pub fn failed(message: impl Into<String>) -> Self {
        RenderError::Failed(message.into())
    }
}
