//! Container runtime boundary for the CodePod sandbox: the `DockerRuntime`
//! trait, the wire models shared with the interpreter layer, resource and
//! network policy types, and byte-budget output truncation.

mod error;
mod limits;
mod models;
mod network;
mod runtime;
mod truncation;

pub use error::{RuntimeError, RuntimeResult};
pub use limits::{ResourceLimits, humanize_bytes};
pub use models::{
    CommandExitEvent, CommandOutputEvent, CommandStreamSummary, ContainerInfo, FileEntry,
    SessionUsage,
};
pub use network::{NetworkMode, ParseNetworkModeError};
pub use runtime::{DockerRuntime, OutputStream};
pub use truncation::{
    DEFAULT_TRUNCATION_MESSAGE, OutputOptions, TruncationStrategy, truncate_output,
};
