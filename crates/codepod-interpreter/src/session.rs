use crate::context::TurnId;
use chrono::{DateTime, Utc};
use codepod_docker::NetworkMode;
use serde::{Deserialize, Serialize};

pub type SessionId = u64;

/// A persisted sandbox session: one container, owned by the turn that
/// created it, addressable by label from that turn's descendants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SandboxSession {
    pub id: SessionId,
    pub owner_turn_id: TurnId,
    pub label: String,
    pub container_id: String,
    pub image: String,
    /// Comma-separated shell wrapper, e.g. "/bin/sh,-lc".
    pub shell_prefix: String,
    pub ip: Option<String>,
    pub network_mode: NetworkMode,
    /// None means unlimited.
    pub memory_bytes: Option<u64>,
    pub cpu_cores: Option<f64>,
    pub max_processes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub terminated_at: Option<DateTime<Utc>>,
}

impl SandboxSession {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.terminated_at.is_none() && self.expires_at > now
    }

    /// One-line summary shown to the model in tool results and the context
    /// prefix.
    pub fn describe(&self) -> String {
        let mut parts = vec![
            format!("sessionId: {}", self.label),
            format!("image: {}", self.image),
            format!("networkMode: {}", self.network_mode),
        ];
        if let Some(memory) = self.memory_bytes {
            parts.push(format!("memory: {}", codepod_docker::humanize_bytes(memory)));
        }
        if let Some(cores) = self.cpu_cores {
            parts.push(format!("cpu: {cores} cores"));
        }
        if let Some(pids) = self.max_processes {
            parts.push(format!("maxProcesses: {pids}"));
        }
        parts.push(format!(
            "expiresAt: {} UTC",
            self.expires_at.format("%Y-%m-%d %H:%M:%S")
        ));
        parts.join(", ")
    }
}

/// Per-call view of a resolved session: the persisted record plus the
/// parsed shell wrapper. Lives in the request-scoped cache on `TurnContext`.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionHandle {
    pub session: SandboxSession,
    pub shell_prefix: Vec<String>,
}

impl SessionHandle {
    pub fn new(session: SandboxSession, is_windows_container: bool) -> Self {
        let shell_prefix = parse_shell_prefix_csv(&session.shell_prefix, is_windows_container);
        Self {
            session,
            shell_prefix,
        }
    }
}

/// Parses the stored CSV shell wrapper, falling back to the platform
/// bootstrap shell for legacy or misconfigured rows.
pub fn parse_shell_prefix_csv(csv: &str, is_windows_container: bool) -> Vec<String> {
    let parts: Vec<String> = csv
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if !parts.is_empty() {
        return parts;
    }
    if is_windows_container {
        vec!["cmd".to_string(), "/c".to_string()]
    } else {
        vec!["/bin/sh".to_string(), "-lc".to_string()]
    }
}

pub fn shell_prefix_to_csv(parts: &[String]) -> String {
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in_mins: i64, terminated: bool) -> SandboxSession {
        let now = Utc::now();
        SandboxSession {
            id: 1,
            owner_turn_id: 1,
            label: "s1".to_string(),
            container_id: "c1".to_string(),
            image: "img1".to_string(),
            shell_prefix: "/bin/sh,-lc".to_string(),
            ip: None,
            network_mode: NetworkMode::None,
            memory_bytes: Some(512 * 1024 * 1024),
            cpu_cores: Some(1.0),
            max_processes: Some(100),
            created_at: now,
            last_active_at: now,
            expires_at: now + Duration::minutes(expires_in_mins),
            terminated_at: terminated.then_some(now),
        }
    }

    #[test]
    fn active_means_unterminated_and_unexpired() {
        let now = Utc::now();
        assert!(session(10, false).is_active(now));
        assert!(!session(10, true).is_active(now));
        assert!(!session(-10, false).is_active(now));
    }

    #[test]
    fn describe_names_the_label_and_image() {
        let text = session(10, false).describe();
        assert!(text.contains("sessionId: s1"));
        assert!(text.contains("image: img1"));
        assert!(text.contains("networkMode: none"));
        assert!(text.contains("expiresAt:"));
    }

    #[test]
    fn shell_prefix_csv_round_trips() {
        let parts = parse_shell_prefix_csv("/bin/sh, -lc", false);
        assert_eq!(parts, vec!["/bin/sh".to_string(), "-lc".to_string()]);
        assert_eq!(shell_prefix_to_csv(&parts), "/bin/sh,-lc");
    }

    #[test]
    fn blank_shell_prefix_falls_back_to_bootstrap_shell() {
        assert_eq!(
            parse_shell_prefix_csv("", false),
            vec!["/bin/sh".to_string(), "-lc".to_string()]
        );
        assert_eq!(
            parse_shell_prefix_csv(" , ", true),
            vec!["cmd".to_string(), "/c".to_string()]
        );
    }
}
