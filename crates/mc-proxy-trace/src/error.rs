use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("trace encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
