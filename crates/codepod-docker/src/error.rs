use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("path not found in container {container_id}: {path}")]
    PathNotFound {
        container_id: String,
        path: String,
    },

    #[error("command timed out after {0}s")]
    CommandTimeout(u64),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid resource limits: {0}")]
    InvalidLimits(String),

    #[error("docker runtime failure: {0}")]
    Runtime(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
