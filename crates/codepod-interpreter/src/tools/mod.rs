//! Tool registry and the built-in code interpreter capability table.

mod builtin;
mod registry;
mod schema;

pub use builtin::builtin_tools;
pub use registry::{ToolDefinition, ToolFuture, ToolInvoker, ToolRegistry, ToolResult, ToolSpec};
pub use schema::{ParamKind, ParamSpec, schema_for, validate_arguments};

use crate::errors::ToolError;
use serde_json::Value;

pub const CREATE_DOCKER_SESSION: &str = "create_docker_session";
pub const DESTROY_SESSION: &str = "destroy_session";
pub const RUN_COMMAND: &str = "run_command";
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const APPLY_DIFF: &str = "apply_diff";
pub const DOWNLOAD_CHAT_FILES: &str = "download_chat_files";
pub const GET_SESSION_STATS: &str = "get_session_stats";

// Argument extraction helpers used by the built-in invokers. Schema
// validation has already run by the time these are called; they are the
// second line of defense and produce the same messages.

pub(crate) fn required_str_arg(args: &Value, name: &str) -> Result<String, ToolError> {
    match args.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(ToolError::Validation(format!(
            "Parameter '{name}' cannot be empty"
        ))),
        Some(Value::Null) | None => Err(ToolError::Validation(format!(
            "Missing required parameter: {name}"
        ))),
        Some(_) => Err(ToolError::Validation(format!(
            "Parameter '{name}' must be a string"
        ))),
    }
}

/// Missing, null, and blank all mean "not provided".
pub(crate) fn optional_str_arg(args: &Value, name: &str) -> Option<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn optional_u64_arg(args: &Value, name: &str) -> Result<Option<u64>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            ToolError::Validation(format!("Parameter '{name}' must be a non-negative integer"))
        }),
    }
}

pub(crate) fn optional_i64_arg(args: &Value, name: &str) -> Result<Option<i64>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| ToolError::Validation(format!("Parameter '{name}' must be an integer"))),
    }
}

pub(crate) fn optional_f64_arg(args: &Value, name: &str) -> Result<Option<f64>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| ToolError::Validation(format!("Parameter '{name}' must be a number"))),
    }
}

pub(crate) fn optional_bool_arg(args: &Value, name: &str) -> Result<Option<bool>, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| ToolError::Validation(format!("Parameter '{name}' must be a boolean"))),
    }
}

pub(crate) fn string_array_arg(args: &Value, name: &str) -> Result<Vec<String>, ToolError> {
    match args.get(name) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ToolError::Validation(format!(
                        "Parameter '{name}' must be an array of strings"
                    ))
                })
            })
            .collect(),
        Some(Value::Null) | None => Err(ToolError::Validation(format!(
            "Missing required parameter: {name}"
        ))),
        Some(_) => Err(ToolError::Validation(format!(
            "Parameter '{name}' must be an array of strings"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_str_rejects_blank_and_missing() {
        let args = json!({"a": "x", "b": "  "});
        assert_eq!(required_str_arg(&args, "a").unwrap(), "x");
        assert!(required_str_arg(&args, "b").is_err());
        assert!(required_str_arg(&args, "c").is_err());
    }

    #[test]
    fn optional_str_treats_blank_as_absent() {
        let args = json!({"a": " x ", "b": "", "c": null});
        assert_eq!(optional_str_arg(&args, "a").as_deref(), Some("x"));
        assert_eq!(optional_str_arg(&args, "b"), None);
        assert_eq!(optional_str_arg(&args, "c"), None);
    }

    #[test]
    fn numeric_helpers_reject_wrong_types() {
        let args = json!({"n": "five"});
        assert!(optional_u64_arg(&args, "n").is_err());
        assert!(optional_i64_arg(&args, "n").is_err());
        assert!(optional_f64_arg(&args, "n").is_err());
        assert_eq!(optional_u64_arg(&args, "missing").unwrap(), None);
    }

    #[test]
    fn string_array_collects_items() {
        let args = json!({"p": ["*.txt", "data/*"]});
        assert_eq!(
            string_array_arg(&args, "p").unwrap(),
            vec!["*.txt".to_string(), "data/*".to_string()]
        );
        assert!(string_array_arg(&json!({"p": [1]}), "p").is_err());
    }
}
