//! Code interpreter tool layer for the CodePod chat backend: the tool
//! registry and dispatcher, the Docker session orchestrator, the restricted
//! unified-diff patcher, and the turn-scoped context prefix builder.
//!
//! The orchestrator talks to the outside world only through three seams:
//! [`codepod_docker::DockerRuntime`] for containers, [`store::SessionStore`]
//! for session persistence, and [`files::FileStorage`] for chat uploads.

pub mod context;
pub mod errors;
pub mod events;
pub mod executor;
pub mod files;
pub mod options;
pub mod patch;
pub mod session;
pub mod store;
pub mod tools;

pub use context::{
    CloudFile, PromptMessage, StepRole, TurnContext, TurnId, TurnRecord, TurnStep,
    build_context_prefix, collect_active_sessions, collect_cloud_files, inject_context_prefix,
};
pub use errors::{RegistryError, ToolError};
pub use events::{BufferedProgressSink, NoopProgressSink, ProgressSink, ToolProgress};
pub use executor::SessionOrchestrator;
pub use files::{FileStorage, FileStorageError, MemoryFileStorage};
pub use options::{InterpreterOptions, PodConfig};
pub use patch::{apply_unified_diff, validate_patch_text};
pub use session::{SandboxSession, SessionHandle, SessionId};
pub use store::{MemorySessionStore, NewSandboxSession, SessionStore, SessionStoreError};
pub use tools::{ToolDefinition, ToolRegistry, ToolResult, ToolSpec, builtin_tools};
