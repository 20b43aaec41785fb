use crate::truncation::{OutputOptions, truncate_output};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub container_id: String,
    pub image: String,
    /// Shell wrapper used for `run_command`, e.g. ["/bin/sh", "-lc"].
    pub shell_prefix: Vec<String>,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutputEvent {
    Stdout { data: String },
    Stderr { data: String },
    Exit(CommandExitEvent),
}

/// Final event of a command stream. Stdout/stderr carried here are already
/// truncated to the runtime's output options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandExitEvent {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u64,
    pub is_truncated: bool,
}

impl CommandExitEvent {
    /// Formats the exit for the `run_command` tool result. A clean exit with
    /// no stderr and no truncation returns bare stdout; anything else gets
    /// the full metadata block.
    pub fn format_for_run_command(&self) -> String {
        if self.exit_code == 0 && self.stderr.is_empty() && !self.is_truncated {
            return self.stdout.clone();
        }

        let mut out = format!(
            "exit code: {}, execution time: {}ms",
            self.exit_code, self.execution_time_ms
        );
        if self.is_truncated {
            out.push_str(" (output truncated)");
        }
        out.push_str("\nStdout:\n");
        out.push_str(&self.stdout);
        out.push_str("\nStderr:\n");
        out.push_str(&self.stderr);
        out
    }
}

/// Accumulates streamed stdout/stderr and produces the truncated exit event.
/// Runtime implementations use this so every exit event carries output that
/// already respects the byte budget.
#[derive(Clone, Debug)]
pub struct CommandStreamSummary {
    options: OutputOptions,
    stdout: String,
    stderr: String,
}

impl CommandStreamSummary {
    pub fn new(options: OutputOptions) -> Self {
        Self {
            options,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn append_stdout(&mut self, data: &str) {
        self.stdout.push_str(data);
    }

    pub fn append_stderr(&mut self, data: &str) {
        self.stderr.push_str(data);
    }

    pub fn build_exit(&self, exit_code: i32, execution_time_ms: u64) -> CommandExitEvent {
        let (stdout, stdout_truncated) = truncate_output(&self.stdout, &self.options);
        let (stderr, stderr_truncated) = truncate_output(&self.stderr, &self.options);
        CommandExitEvent {
            exit_code,
            stdout,
            stderr,
            execution_time_ms,
            is_truncated: stdout_truncated || stderr_truncated,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub is_directory: bool,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionUsage {
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub memory_limit_bytes: Option<u64>,
    pub pids: u64,
}
