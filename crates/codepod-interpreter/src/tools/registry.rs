use super::schema::{ParamKind, ParamSpec, schema_for, validate_arguments};
use crate::context::TurnContext;
use crate::errors::{RegistryError, ToolError};
use crate::events::ProgressSink;
use crate::executor::SessionOrchestrator;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send>>;

/// Executor closure bound to a registered tool. Receives the orchestrator,
/// the request-scoped turn context, the parsed argument object, the progress
/// sink for streaming output, and a cancellation token.
pub type ToolInvoker = Arc<
    dyn Fn(
            Arc<SessionOrchestrator>,
            Arc<TurnContext>,
            Value,
            Arc<dyn ProgressSink>,
            CancellationToken,
        ) -> ToolFuture
        + Send
        + Sync,
>;

pub struct ToolSpec {
    pub name: &'static str,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub invoker: ToolInvoker,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// What the model sees for one tool: name, description, and the generated
/// JSON Schema for its parameters.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Outcome of a dispatch. Failures are folded into a model-readable message
/// instead of propagating; the dispatcher never takes the request down.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

#[derive(Debug)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new(specs: Vec<ToolSpec>) -> Result<Self, RegistryError> {
        let mut tools = HashMap::new();
        for spec in specs {
            let mut seen = HashSet::new();
            for param in &spec.params {
                if !seen.insert(param.name) {
                    return Err(RegistryError::DuplicateParameter {
                        tool: spec.name.to_string(),
                        param: param.name.to_string(),
                    });
                }
                if !param.enum_values.is_empty() && param.kind != ParamKind::String {
                    return Err(RegistryError::EnumOnNonString {
                        tool: spec.name.to_string(),
                        param: param.name.to_string(),
                    });
                }
            }
            let name = spec.name.to_string();
            if tools.insert(name.clone(), spec).is_some() {
                return Err(RegistryError::DuplicateTool(name));
            }
        }
        Ok(Self { tools })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions sorted by name, so the schema sent to the model is stable
    /// across restarts.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|spec| ToolDefinition {
                name: spec.name.to_string(),
                description: spec.description.clone(),
                parameters: schema_for(&spec.params),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Dispatches one tool call. Unknown names, malformed JSON, argument
    /// binding failures, and tool failures all come back as error results
    /// with a message the model can act on.
    pub async fn invoke(
        &self,
        orchestrator: Arc<SessionOrchestrator>,
        ctx: Arc<TurnContext>,
        name: &str,
        raw_args: &str,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> ToolResult {
        let Some(spec) = self.tools.get(name) else {
            return ToolResult::error(format!("Unknown tool: {name}"));
        };

        let raw = if raw_args.trim().is_empty() {
            "{}"
        } else {
            raw_args
        };
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => return ToolResult::error(format!("Invalid JSON args: {e}")),
        };
        let Some(args) = parsed.as_object() else {
            return ToolResult::error("Tool args must be a JSON object");
        };
        if let Err(e) = validate_arguments(&spec.params, args) {
            return ToolResult::error(e.to_string());
        }

        match (spec.invoker)(orchestrator, ctx, parsed, sink, cancel).await {
            Ok(content) => ToolResult {
                content,
                is_error: false,
            },
            Err(e) => {
                warn!(tool = name, error = %e, "tool invocation failed");
                ToolResult::error(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TurnRecord;
    use crate::events::NoopProgressSink;
    use crate::executor::SessionOrchestrator;
    use crate::files::MemoryFileStorage;
    use crate::options::{InterpreterOptions, PodConfig};
    use crate::store::MemorySessionStore;
    use async_trait::async_trait;
    use codepod_docker::{
        ContainerInfo, DockerRuntime, FileEntry, NetworkMode, OutputStream, ResourceLimits,
        RuntimeError, SessionUsage,
    };

    struct StubRuntime;

    #[async_trait]
    impl DockerRuntime for StubRuntime {
        async fn ensure_image(
            &self,
            _image: &str,
            _cancel: CancellationToken,
        ) -> Result<OutputStream, RuntimeError> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn create_container(
            &self,
            image: &str,
            _limits: &ResourceLimits,
            _network_mode: NetworkMode,
            _cancel: CancellationToken,
        ) -> Result<ContainerInfo, RuntimeError> {
            Err(RuntimeError::ImageNotFound(image.to_string()))
        }

        async fn delete_container(&self, _container_id: &str) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn execute_command_stream(
            &self,
            container_id: &str,
            _shell_prefix: &[String],
            _command: &str,
            _working_dir: &str,
            _timeout_secs: u64,
            _cancel: CancellationToken,
        ) -> Result<OutputStream, RuntimeError> {
            Err(RuntimeError::ContainerNotFound(container_id.to_string()))
        }

        async fn upload_file(
            &self,
            container_id: &str,
            _container_path: &str,
            _content: &[u8],
            _cancel: CancellationToken,
        ) -> Result<(), RuntimeError> {
            Err(RuntimeError::ContainerNotFound(container_id.to_string()))
        }

        async fn download_file(
            &self,
            container_id: &str,
            _file_path: &str,
            _cancel: CancellationToken,
        ) -> Result<Vec<u8>, RuntimeError> {
            Err(RuntimeError::ContainerNotFound(container_id.to_string()))
        }

        async fn list_directory(
            &self,
            container_id: &str,
            _path: &str,
            _cancel: CancellationToken,
        ) -> Result<Vec<FileEntry>, RuntimeError> {
            Err(RuntimeError::ContainerNotFound(container_id.to_string()))
        }

        async fn container_stats(
            &self,
            _container_id: &str,
            _cancel: CancellationToken,
        ) -> Result<Option<SessionUsage>, RuntimeError> {
            Ok(None)
        }
    }

    fn echo_spec(name: &'static str, params: Vec<ParamSpec>) -> ToolSpec {
        ToolSpec {
            name,
            description: "echo".to_string(),
            params,
            invoker: Arc::new(|_, _, args, _, _| -> ToolFuture {
                Box::pin(async move {
                    let text = args
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or("(none)")
                        .to_string();
                    Ok(text)
                })
            }),
        }
    }

    fn failing_spec(name: &'static str) -> ToolSpec {
        ToolSpec {
            name,
            description: "always fails".to_string(),
            params: Vec::new(),
            invoker: Arc::new(|_, _, _, _, _| -> ToolFuture {
                Box::pin(async { Err(ToolError::Execution("boom".to_string())) })
            }),
        }
    }

    fn harness() -> (Arc<SessionOrchestrator>, Arc<TurnContext>) {
        let orchestrator = Arc::new(SessionOrchestrator::new(
            Arc::new(StubRuntime),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryFileStorage::new()),
            InterpreterOptions::default(),
            PodConfig::default(),
        ));
        let ctx = Arc::new(
            TurnContext::new(
                vec![TurnRecord {
                    id: 1,
                    parent_id: None,
                    steps: Vec::new(),
                }],
                1,
            )
            .unwrap(),
        );
        (orchestrator, ctx)
    }

    async fn dispatch(registry: &ToolRegistry, name: &str, raw_args: &str) -> ToolResult {
        let (orchestrator, ctx) = harness();
        registry
            .invoke(
                orchestrator,
                ctx,
                name,
                raw_args,
                Arc::new(NoopProgressSink),
                CancellationToken::new(),
            )
            .await
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dispatch_runs_the_invoker() {
        let registry = ToolRegistry::new(vec![echo_spec(
            "echo",
            vec![ParamSpec::required_string("text", "Text to echo.")],
        )])
        .unwrap();

        let result = dispatch(&registry, "echo", r#"{"text": "hi"}"#).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "hi");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unknown_tool_is_an_error_result() {
        let registry = ToolRegistry::new(vec![echo_spec("echo", Vec::new())]).unwrap();
        let result = dispatch(&registry, "nope", "{}").await;
        assert!(result.is_error);
        assert_eq!(result.content, "Unknown tool: nope");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_json_is_an_error_result() {
        let registry = ToolRegistry::new(vec![echo_spec("echo", Vec::new())]).unwrap();
        let result = dispatch(&registry, "echo", "{not json").await;
        assert!(result.is_error);
        assert!(result.content.starts_with("Invalid JSON args:"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn non_object_args_are_an_error_result() {
        let registry = ToolRegistry::new(vec![echo_spec("echo", Vec::new())]).unwrap();
        let result = dispatch(&registry, "echo", "[1, 2]").await;
        assert!(result.is_error);
        assert_eq!(result.content, "Tool args must be a JSON object");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn binding_failure_is_an_error_result() {
        let registry = ToolRegistry::new(vec![echo_spec(
            "echo",
            vec![ParamSpec::required_string("text", "Text to echo.")],
        )])
        .unwrap();

        let result = dispatch(&registry, "echo", "{}").await;
        assert!(result.is_error);
        assert_eq!(result.content, "Missing required parameter: text");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn invoker_failure_is_folded_into_the_result() {
        let registry = ToolRegistry::new(vec![failing_spec("boom")]).unwrap();
        let result = dispatch(&registry, "boom", "{}").await;
        assert!(result.is_error);
        assert_eq!(result.content, "boom");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_args_are_treated_as_an_empty_object() {
        let registry = ToolRegistry::new(vec![echo_spec("echo", Vec::new())]).unwrap();
        let result = dispatch(&registry, "echo", "  ").await;
        assert!(!result.is_error);
        assert_eq!(result.content, "(none)");
    }

    #[test]
    fn duplicate_tool_names_are_rejected() {
        let err =
            ToolRegistry::new(vec![echo_spec("echo", Vec::new()), echo_spec("echo", Vec::new())])
                .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool(_)));
    }

    #[test]
    fn duplicate_parameter_names_are_rejected() {
        let err = ToolRegistry::new(vec![echo_spec(
            "echo",
            vec![
                ParamSpec::required_string("text", "a"),
                ParamSpec::optional_string("text", "b"),
            ],
        )])
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateParameter { .. }));
    }

    #[test]
    fn enum_on_non_string_is_rejected() {
        let err = ToolRegistry::new(vec![echo_spec(
            "echo",
            vec![ParamSpec::optional_integer("mode", "m").with_enum(&["a"])],
        )])
        .unwrap_err();
        assert!(matches!(err, RegistryError::EnumOnNonString { .. }));
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let registry = ToolRegistry::new(vec![
            echo_spec("zeta", Vec::new()),
            echo_spec("alpha", Vec::new()),
        ])
        .unwrap();
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
