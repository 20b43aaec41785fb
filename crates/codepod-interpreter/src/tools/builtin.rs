use super::registry::{ToolFuture, ToolRegistry, ToolSpec};
use super::schema::ParamSpec;
use super::{
    optional_bool_arg, optional_f64_arg, optional_i64_arg, optional_str_arg, optional_u64_arg,
    required_str_arg, string_array_arg,
};
use crate::errors::RegistryError;
use std::sync::Arc;

// Parameter descriptions carry {placeholders} for server-configured
// defaults; the orchestrator substitutes real values when rendering the
// definitions for the model.

pub fn builtin_tools() -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::new(vec![
        create_docker_session_spec(),
        destroy_session_spec(),
        run_command_spec(),
        read_file_spec(),
        write_file_spec(),
        apply_diff_spec(),
        download_chat_files_spec(),
        get_session_stats_spec(),
    ])
}

fn session_id_param() -> ParamSpec {
    ParamSpec::required_string(
        "sessionId",
        "Session id returned by create_docker_session.",
    )
}

fn create_docker_session_spec() -> ToolSpec {
    ToolSpec {
        name: super::CREATE_DOCKER_SESSION,
        description: "Create a docker session. Returns the sessionId to pass to the other code \
                      interpreter tools. If an active session with the requested label already \
                      exists in this conversation branch, it is reused."
            .to_string(),
        params: vec![
            ParamSpec::optional_string(
                "image",
                "Docker image to use. null means use the server default: {defaultImage}.",
            ),
            ParamSpec::optional_string(
                "label",
                "Session label. If empty, the server derives one from the new container id.",
            ),
            ParamSpec::optional_integer(
                "memoryBytes",
                "Memory limit in bytes. null means use the server default: {defaultMemoryBytes}. \
                 0 means unlimited.",
            ),
            ParamSpec::optional_number(
                "cpuCores",
                "CPU limit in cores. null means use the server default: {defaultCpuCores}. \
                 0 means unlimited.",
            ),
            ParamSpec::optional_integer(
                "maxProcesses",
                "Max process count. null means use the server default: {defaultMaxProcesses}. \
                 0 means unlimited.",
            ),
            ParamSpec::optional_string(
                "networkMode",
                "Network mode. Allowed: {allowedNetworkModes}. null means use the server \
                 default: {defaultNetworkMode}.",
            )
            .with_enum(&["none", "bridge", "host"]),
        ],
        invoker: Arc::new(|orchestrator, ctx, args, sink, cancel| -> ToolFuture {
            Box::pin(async move {
                let label = optional_str_arg(&args, "label");
                let image = optional_str_arg(&args, "image");
                let memory_bytes = optional_u64_arg(&args, "memoryBytes")?;
                let cpu_cores = optional_f64_arg(&args, "cpuCores")?;
                let max_processes = optional_u64_arg(&args, "maxProcesses")?;
                let network_mode = optional_str_arg(&args, "networkMode");
                orchestrator
                    .create_docker_session(
                        &ctx,
                        label,
                        image,
                        memory_bytes,
                        cpu_cores,
                        max_processes,
                        network_mode,
                        sink.as_ref(),
                        cancel,
                    )
                    .await
            })
        }),
    }
}

fn destroy_session_spec() -> ToolSpec {
    ToolSpec {
        name: super::DESTROY_SESSION,
        description: "Destroy a docker session and its container. The sessionId stops being \
                      usable immediately."
            .to_string(),
        params: vec![session_id_param()],
        invoker: Arc::new(|orchestrator, ctx, args, _sink, _cancel| -> ToolFuture {
            Box::pin(async move {
                let session_id = required_str_arg(&args, "sessionId")?;
                orchestrator.destroy_session(&ctx, &session_id).await
            })
        }),
    }
}

fn run_command_spec() -> ToolSpec {
    ToolSpec {
        name: super::RUN_COMMAND,
        description: "Run a shell command inside the session's working directory {workDir}. \
                      Output is truncated to a server-configured byte budget."
            .to_string(),
        params: vec![
            session_id_param(),
            ParamSpec::required_string("command", "Shell command to run."),
            ParamSpec::optional_integer(
                "timeoutSeconds",
                "Command timeout in seconds. null means use the server default: \
                 {defaultTimeoutSeconds}.",
            ),
        ],
        invoker: Arc::new(|orchestrator, ctx, args, sink, cancel| -> ToolFuture {
            Box::pin(async move {
                let session_id = required_str_arg(&args, "sessionId")?;
                let command = required_str_arg(&args, "command")?;
                let timeout_secs = optional_u64_arg(&args, "timeoutSeconds")?;
                orchestrator
                    .run_command(&ctx, &session_id, &command, timeout_secs, sink.as_ref(), cancel)
                    .await
            })
        }),
    }
}

fn read_file_spec() -> ToolSpec {
    ToolSpec {
        name: super::READ_FILE,
        description: "Read a file from the session container. Text files come back as UTF-8, \
                      optionally windowed by line range; binary files come back as a base64 \
                      preview."
            .to_string(),
        params: vec![
            session_id_param(),
            ParamSpec::required_string("path", "Absolute path to the file under {workDir}."),
            ParamSpec::optional_integer("startLine", "Optional start line (1-based, inclusive)."),
            ParamSpec::optional_integer("endLine", "Optional end line (1-based, inclusive)."),
            ParamSpec::optional_boolean(
                "withLineNumbers",
                "Default false. If true, prefix each line with its line number and report the \
                 file's total line count on the first line.",
            ),
        ],
        invoker: Arc::new(|orchestrator, ctx, args, _sink, cancel| -> ToolFuture {
            Box::pin(async move {
                let session_id = required_str_arg(&args, "sessionId")?;
                let path = required_str_arg(&args, "path")?;
                let start_line = optional_i64_arg(&args, "startLine")?;
                let end_line = optional_i64_arg(&args, "endLine")?;
                let with_line_numbers =
                    optional_bool_arg(&args, "withLineNumbers")?.unwrap_or(false);
                orchestrator
                    .read_file(
                        &ctx,
                        &session_id,
                        &path,
                        start_line,
                        end_line,
                        with_line_numbers,
                        cancel,
                    )
                    .await
            })
        }),
    }
}

fn write_file_spec() -> ToolSpec {
    ToolSpec {
        name: super::WRITE_FILE,
        description: "Write a text file in the session container, replacing any existing \
                      content at the path."
            .to_string(),
        params: vec![
            session_id_param(),
            ParamSpec::required_string("path", "Path to write, under {workDir}."),
            ParamSpec::required_string("text", "Text content, written as UTF-8."),
        ],
        invoker: Arc::new(|orchestrator, ctx, args, _sink, cancel| -> ToolFuture {
            Box::pin(async move {
                let session_id = required_str_arg(&args, "sessionId")?;
                let path = required_str_arg(&args, "path")?;
                let text = required_str_arg(&args, "text")?;
                orchestrator
                    .write_file(&ctx, &session_id, &path, &text, cancel)
                    .await
            })
        }),
    }
}

fn apply_diff_spec() -> ToolSpec {
    ToolSpec {
        name: super::APPLY_DIFF,
        description: "Apply a patch to one file in the session container. The patch MUST \
                      contain only unified diff hunks with full headers \
                      (@@ -oldStart,oldCount +newStart,newCount @@). No git headers, no \
                      '*** Begin Patch' wrappers, no markdown fences. Represent empty context \
                      lines as a single space."
            .to_string(),
        params: vec![
            session_id_param(),
            ParamSpec::required_string("path", "Target file path under {workDir}."),
            ParamSpec::required_string("patch", "Unified diff hunks to apply."),
        ],
        invoker: Arc::new(|orchestrator, ctx, args, _sink, cancel| -> ToolFuture {
            Box::pin(async move {
                let session_id = required_str_arg(&args, "sessionId")?;
                let path = required_str_arg(&args, "path")?;
                let patch = required_str_arg(&args, "patch")?;
                orchestrator
                    .apply_diff(&ctx, &session_id, &path, &patch, cancel)
                    .await
            })
        }),
    }
}

fn download_chat_files_spec() -> ToolSpec {
    ToolSpec {
        name: super::DOWNLOAD_CHAT_FILES,
        description: "Download files uploaded to this chat into the session's working \
                      directory {workDir}, selected by wildcard patterns over the file names."
            .to_string(),
        params: vec![
            session_id_param(),
            ParamSpec::string_array(
                "patterns",
                "Wildcard patterns matched against cloud file names, e.g. [\"*.csv\"].",
                1,
            ),
        ],
        invoker: Arc::new(|orchestrator, ctx, args, _sink, cancel| -> ToolFuture {
            Box::pin(async move {
                let session_id = required_str_arg(&args, "sessionId")?;
                let patterns = string_array_arg(&args, "patterns")?;
                orchestrator
                    .download_chat_files(&ctx, &session_id, &patterns, cancel)
                    .await
            })
        }),
    }
}

fn get_session_stats_spec() -> ToolSpec {
    ToolSpec {
        name: super::GET_SESSION_STATS,
        description: "Report current resource usage (cpu, memory, process count) of the \
                      session container."
            .to_string(),
        params: vec![session_id_param()],
        invoker: Arc::new(|orchestrator, ctx, args, _sink, cancel| -> ToolFuture {
            Box::pin(async move {
                let session_id = required_str_arg(&args, "sessionId")?;
                orchestrator
                    .get_session_stats(&ctx, &session_id, cancel)
                    .await
            })
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_table_builds() {
        let registry = builtin_tools().expect("builtin registry is valid");
        for name in [
            super::super::CREATE_DOCKER_SESSION,
            super::super::DESTROY_SESSION,
            super::super::RUN_COMMAND,
            super::super::READ_FILE,
            super::super::WRITE_FILE,
            super::super::APPLY_DIFF,
            super::super::DOWNLOAD_CHAT_FILES,
            super::super::GET_SESSION_STATS,
        ] {
            assert!(registry.contains(name), "missing tool {name}");
        }
    }

    #[test]
    fn definitions_expose_placeholders_for_server_defaults() {
        let registry = builtin_tools().expect("builtin registry is valid");
        let definitions = registry.definitions();
        let create = definitions
            .iter()
            .find(|d| d.name == super::super::CREATE_DOCKER_SESSION)
            .expect("create_docker_session is registered");

        let schema = serde_json::to_string(&create.parameters).expect("schema serializes");
        assert!(schema.contains("{defaultImage}"));
        assert!(schema.contains("{defaultMemoryBytes}"));
        assert!(schema.contains("{allowedNetworkModes}"));
    }

    #[test]
    fn network_mode_enum_is_lowercase() {
        let registry = builtin_tools().expect("builtin registry is valid");
        let definitions = registry.definitions();
        let create = definitions
            .iter()
            .find(|d| d.name == super::super::CREATE_DOCKER_SESSION)
            .expect("create_docker_session is registered");
        assert_eq!(
            create.parameters["properties"]["networkMode"]["enum"],
            serde_json::json!(["none", "bridge", "host"])
        );
    }
}
