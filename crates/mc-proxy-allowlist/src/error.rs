use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllowListError {
    #[error("allow-list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("allow-list {path} is malformed: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
