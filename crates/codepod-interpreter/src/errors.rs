use codepod_docker::RuntimeError;
use thiserror::Error;

/// Failure of a single tool invocation. Tool-facing messages are carried
/// verbatim; the variant records which stage rejected the call.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Argument parsing/binding rejected the call before any work happened.
    #[error("{0}")]
    Validation(String),

    /// The referenced session is missing, destroyed, or expired.
    #[error("{0}")]
    SessionState(String),

    /// The request exceeds a server-configured policy cap.
    #[error("{0}")]
    Policy(String),

    /// Patch text failed to apply against the target file.
    #[error("{0}")]
    Patch(String),

    /// The tool started executing and failed partway.
    #[error("{0}")]
    Execution(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Store(#[from] crate::store::SessionStoreError),

    #[error(transparent)]
    FileStorage(#[from] crate::files::FileStorageError),
}

/// Construction-time failure of the tool registry. These are programming
/// errors in the capability table and abort startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("tool '{tool}' declares duplicate parameter '{param}'")]
    DuplicateParameter { tool: String, param: String },

    #[error("tool '{tool}' parameter '{param}' declares enum values for a non-string kind")]
    EnumOnNonString { tool: String, param: String },
}
