use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatblockError>;

#[derive(Debug, Error)]
pub enum ChatblockError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document is not available")]
    DocumentUnavailable,

    #[error("no ```{0} codeblock found")]
    BlockNotFound(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("script execution failed: {0}")]
    Script(String),
}
