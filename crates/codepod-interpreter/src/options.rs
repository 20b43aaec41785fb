use codepod_docker::{NetworkMode, OutputOptions, ResourceLimits};
use serde::{Deserialize, Serialize};

const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Server-side policy for the code interpreter tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterpreterOptions {
    pub default_image: String,
    /// Short description of what is available inside the default image; used
    /// to enrich the tool schema sent to the model.
    pub default_image_description: Option<String>,
    /// Default command timeout. None means effectively unlimited.
    pub default_timeout_secs: Option<u64>,
    /// Idle timeout used to advance a session's expiry on every touch.
    pub session_idle_timeout_secs: u64,
    pub default_network_mode: NetworkMode,
    /// Most open network mode the model may request (None < Bridge < Host).
    pub max_allowed_network_mode: NetworkMode,
    pub default_resource_limits: ResourceLimits,
    /// Caps applied to requested limits. Unlimited fields accept anything.
    pub max_resource_limits: ResourceLimits,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            default_image: "mcr.microsoft.com/dotnet/sdk:10.0".to_string(),
            default_image_description: None,
            default_timeout_secs: Some(300),
            session_idle_timeout_secs: 30 * 60,
            default_network_mode: NetworkMode::None,
            max_allowed_network_mode: NetworkMode::Host,
            default_resource_limits: ResourceLimits::standard(),
            max_resource_limits: ResourceLimits::unlimited(),
        }
    }
}

impl InterpreterOptions {
    /// Clamps the requested timeout into [1s, 24h]; None falls back to the
    /// server default, and an unlimited default becomes the 24h ceiling.
    pub fn effective_timeout_secs(&self, requested: Option<u64>) -> u64 {
        match requested.or(self.default_timeout_secs) {
            Some(secs) => secs.clamp(1, MAX_TIMEOUT_SECS),
            None => MAX_TIMEOUT_SECS,
        }
    }

    pub fn allowed_network_modes_display(&self) -> String {
        NetworkMode::allowed_display(self.max_allowed_network_mode)
    }
}

/// Shape of the sandbox containers themselves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PodConfig {
    pub work_dir: String,
    /// Directory under `work_dir` the model is told to drop downloadable
    /// artifacts into.
    pub artifacts_dir: String,
    pub is_windows_container: bool,
    pub output_options: OutputOptions,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            work_dir: "/app".to_string(),
            artifacts_dir: "artifacts".to_string(),
            is_windows_container: false,
            output_options: OutputOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_timeout_prefers_request_over_default() {
        let options = InterpreterOptions::default();
        assert_eq!(options.effective_timeout_secs(Some(30)), 30);
        assert_eq!(options.effective_timeout_secs(None), 300);
    }

    #[test]
    fn effective_timeout_clamps_into_range() {
        let mut options = InterpreterOptions::default();
        assert_eq!(options.effective_timeout_secs(Some(0)), 1);
        assert_eq!(options.effective_timeout_secs(Some(999_999)), MAX_TIMEOUT_SECS);

        options.default_timeout_secs = None;
        assert_eq!(options.effective_timeout_secs(None), MAX_TIMEOUT_SECS);
    }

    #[test]
    fn allowed_modes_follow_the_cap() {
        let options = InterpreterOptions {
            max_allowed_network_mode: NetworkMode::Bridge,
            ..Default::default()
        };
        assert_eq!(options.allowed_network_modes_display(), "none, bridge");
    }
}
