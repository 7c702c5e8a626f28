#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("vfs error: {0}")]
    Vfs(#[from] vfs::VfsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config file {path}")]
    Config {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config file {path} does not exist")]
    ConfigNotFound { path: String },

    #[error("path {path} does not exist")]
    PathNotFound { path: String },
}

pub type CliResult<T> = std::result::Result<T, CliError>;
