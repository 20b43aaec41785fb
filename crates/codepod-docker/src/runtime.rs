use crate::error::RuntimeError;
use crate::limits::ResourceLimits;
use crate::models::{CommandOutputEvent, ContainerInfo, FileEntry, SessionUsage};
use crate::network::NetworkMode;
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

pub type OutputStream = BoxStream<'static, Result<CommandOutputEvent, RuntimeError>>;

/// Boundary to the container runtime. The orchestrator never talks to a
/// daemon directly; everything goes through this trait so tests can swap in
/// a fake.
#[async_trait]
pub trait DockerRuntime: Send + Sync {
    /// Pulls `image` if it is not present locally. The stream carries pull
    /// progress as stdout/stderr events and ends when the image is ready.
    async fn ensure_image(
        &self,
        image: &str,
        cancel: CancellationToken,
    ) -> Result<OutputStream, RuntimeError>;

    async fn create_container(
        &self,
        image: &str,
        limits: &ResourceLimits,
        network_mode: NetworkMode,
        cancel: CancellationToken,
    ) -> Result<ContainerInfo, RuntimeError>;

    async fn delete_container(&self, container_id: &str) -> Result<(), RuntimeError>;

    /// Runs `command` wrapped in `shell_prefix` inside the container. The
    /// stream yields stdout/stderr deltas and terminates with exactly one
    /// `Exit` event whose output is already truncated.
    async fn execute_command_stream(
        &self,
        container_id: &str,
        shell_prefix: &[String],
        command: &str,
        working_dir: &str,
        timeout_secs: u64,
        cancel: CancellationToken,
    ) -> Result<OutputStream, RuntimeError>;

    async fn upload_file(
        &self,
        container_id: &str,
        container_path: &str,
        content: &[u8],
        cancel: CancellationToken,
    ) -> Result<(), RuntimeError>;

    async fn download_file(
        &self,
        container_id: &str,
        file_path: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, RuntimeError>;

    async fn list_directory(
        &self,
        container_id: &str,
        path: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<FileEntry>, RuntimeError>;

    async fn container_stats(
        &self,
        container_id: &str,
        cancel: CancellationToken,
    ) -> Result<Option<SessionUsage>, RuntimeError>;
}
