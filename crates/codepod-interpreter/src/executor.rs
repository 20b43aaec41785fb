use crate::context::{TurnContext, collect_active_sessions, collect_cloud_files};
use crate::errors::ToolError;
use crate::events::{ProgressSink, ToolProgress};
use crate::files::FileStorage;
use crate::options::{InterpreterOptions, PodConfig};
use crate::patch::{apply_unified_diff, validate_patch_text};
use crate::session::{SandboxSession, SessionHandle, shell_prefix_to_csv};
use crate::store::{NewSandboxSession, SessionStore};
use crate::tools::{ToolDefinition, ToolRegistry};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Duration, Utc};
use codepod_docker::{
    CommandOutputEvent, DockerRuntime, NetworkMode, OutputOptions, ResourceLimits, SessionUsage,
    humanize_bytes, truncate_output,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const SESSION_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Executes the code interpreter tools against one container runtime, one
/// session store, and one chat file storage. All per-request state lives on
/// the `TurnContext` passed into each call.
pub struct SessionOrchestrator {
    runtime: Arc<dyn DockerRuntime>,
    store: Arc<dyn SessionStore>,
    files: Arc<dyn FileStorage>,
    options: InterpreterOptions,
    pod: PodConfig,
}

impl SessionOrchestrator {
    pub fn new(
        runtime: Arc<dyn DockerRuntime>,
        store: Arc<dyn SessionStore>,
        files: Arc<dyn FileStorage>,
        options: InterpreterOptions,
        pod: PodConfig,
    ) -> Self {
        Self {
            runtime,
            store,
            files,
            options,
            pod,
        }
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    pub fn pod(&self) -> &PodConfig {
        &self.pod
    }

    /// Resolves a session label against the current turn's ancestor chain.
    /// Later turns shadow earlier ones when labels collide. Resolved handles
    /// are cached on the context for the rest of the request.
    pub async fn ensure_session(
        &self,
        ctx: &TurnContext,
        session_id: &str,
    ) -> Result<SessionHandle, ToolError> {
        let label = session_id.trim();
        if label.is_empty() {
            return Err(ToolError::Validation("sessionId is required".to_string()));
        }

        if let Some(handle) = ctx.cached_session(label) {
            return Ok(handle);
        }

        let chain = ctx.visible_turn_ids()?;
        let sessions = self.store.sessions_for_turns(&chain).await?;
        let Some(session) = sessions.iter().rev().find(|s| s.label == label).cloned() else {
            return Err(ToolError::SessionState(format!(
                "Session not found in this turn: {label}. Call create_docker_session first."
            )));
        };

        if let Some(err) = dead_session_error(label, &session, Utc::now()) {
            return Err(err);
        }

        let handle = SessionHandle::new(session, self.pod.is_windows_container);
        ctx.cache_session(label, handle.clone());
        Ok(handle)
    }

    /// Records activity on the session, pushing its expiry out by the idle
    /// timeout.
    async fn touch_session(&self, handle: &SessionHandle) -> Result<(), ToolError> {
        let now = Utc::now();
        let expires = now + Duration::seconds(self.options.session_idle_timeout_secs as i64);
        self.store.touch(handle.session.id, now, expires).await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_docker_session(
        &self,
        ctx: &TurnContext,
        label: Option<String>,
        image: Option<String>,
        memory_bytes: Option<u64>,
        cpu_cores: Option<f64>,
        max_processes: Option<u64>,
        network_mode: Option<String>,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        let chain = ctx.visible_turn_ids()?;
        let existing = self.store.sessions_for_turns(&chain).await?;
        let now = Utc::now();

        // A labelled request that matches a live session reuses it instead of
        // burning another container. A dead session under the same label is
        // reported, never silently replaced.
        if let Some(label) = label.as_deref() {
            if let Some(handle) = ctx.cached_session(label) {
                return Ok(format!("Reusing active session.\n{}", handle.session.describe()));
            }
            if let Some(session) = existing.iter().rev().find(|s| s.label == label).cloned() {
                if let Some(err) = dead_session_error(label, &session, now) {
                    return Err(err);
                }
                let handle = SessionHandle::new(session, self.pod.is_windows_container);
                ctx.cache_session(label, handle.clone());
                return Ok(format!("Reusing active session.\n{}", handle.session.describe()));
            }
        }

        let requested_mode = match network_mode.as_deref() {
            Some(raw) => raw
                .parse::<NetworkMode>()
                .map_err(|e| ToolError::Validation(e.to_string()))?,
            None => self.options.default_network_mode,
        };
        if requested_mode > self.options.max_allowed_network_mode {
            return Err(ToolError::Policy(format!(
                "Requested networkMode '{requested_mode}' exceeds MaxAllowedNetworkMode '{}'. \
                 Allowed: {}.",
                self.options.max_allowed_network_mode,
                self.options.allowed_network_modes_display()
            )));
        }

        let defaults = &self.options.default_resource_limits;
        let limits = ResourceLimits {
            memory_bytes: memory_bytes.unwrap_or(defaults.memory_bytes),
            cpu_cores: cpu_cores.unwrap_or(defaults.cpu_cores),
            max_processes: max_processes
                .map(|p| u32::try_from(p).unwrap_or(u32::MAX))
                .unwrap_or(defaults.max_processes),
        };
        limits
            .validate(&self.options.max_resource_limits)
            .map_err(|e| ToolError::Policy(e.to_string()))?;

        let image = image.unwrap_or_else(|| self.options.default_image.clone());

        let mut pull = self.runtime.ensure_image(&image, cancel.clone()).await?;
        while let Some(event) = pull.next().await {
            match event? {
                CommandOutputEvent::Stdout { data } => {
                    sink.emit(ToolProgress::Stdout { data })?;
                }
                CommandOutputEvent::Stderr { data } => {
                    sink.emit(ToolProgress::Stderr { data })?;
                }
                CommandOutputEvent::Exit(_) => {}
            }
        }

        let info = self
            .runtime
            .create_container(&image, &limits, requested_mode, cancel.clone())
            .await?;

        let taken: Vec<&str> = existing.iter().map(|s| s.label.as_str()).collect();
        let label = match label {
            Some(label) => label,
            None => unique_label(&derive_label(&info.container_id), &taken),
        };

        let now = Utc::now();
        let stored = self
            .store
            .insert(NewSandboxSession {
                owner_turn_id: ctx.current_turn_id(),
                label: label.clone(),
                container_id: info.container_id.clone(),
                image,
                shell_prefix: shell_prefix_to_csv(&info.shell_prefix),
                ip: info.ip,
                network_mode: requested_mode,
                memory_bytes: (limits.memory_bytes > 0).then_some(limits.memory_bytes),
                cpu_cores: (limits.cpu_cores > 0.0).then_some(limits.cpu_cores),
                max_processes: (limits.max_processes > 0).then_some(limits.max_processes),
                created_at: now,
                last_active_at: now,
                expires_at: now
                    + Duration::seconds(self.options.session_idle_timeout_secs as i64),
            })
            .await?;

        let handle = SessionHandle::new(stored.clone(), self.pod.is_windows_container);
        ctx.cache_session(&stored.label, handle);

        let mut out = format!("Created session.\n{}", stored.describe());
        // Images can ship a skills.md describing what is preinstalled; when
        // present it is worth more to the model than anything we could say.
        let skills_path = format!("{}/skills.md", self.pod.work_dir);
        if let Ok(bytes) = self
            .runtime
            .download_file(&stored.container_id, &skills_path, cancel)
            .await
        {
            if let Ok(text) = String::from_utf8(bytes) {
                if !text.trim().is_empty() {
                    out.push_str("\n\n");
                    out.push_str(text.trim_end());
                }
            }
        }
        Ok(out)
    }

    pub async fn destroy_session(
        &self,
        ctx: &TurnContext,
        session_id: &str,
    ) -> Result<String, ToolError> {
        let handle = self.ensure_session(ctx, session_id).await?;

        // The container may already be gone (host restart, manual cleanup);
        // the store record is what matters.
        if let Err(e) = self
            .runtime
            .delete_container(&handle.session.container_id)
            .await
        {
            warn!(
                container_id = %handle.session.container_id,
                error = %e,
                "failed to delete container while destroying session"
            );
        }

        self.store.terminate(handle.session.id, Utc::now()).await?;
        ctx.evict_session(&handle.session.label);
        Ok(format!("Destroyed session: {}", handle.session.label))
    }

    pub async fn run_command(
        &self,
        ctx: &TurnContext,
        session_id: &str,
        command: &str,
        timeout_secs: Option<u64>,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        let handle = self.ensure_session(ctx, session_id).await?;
        if command.trim().is_empty() {
            return Err(ToolError::Validation("command is required".to_string()));
        }

        let timeout = self.options.effective_timeout_secs(timeout_secs);
        let mut stream = self
            .runtime
            .execute_command_stream(
                &handle.session.container_id,
                &handle.shell_prefix,
                command,
                &self.pod.work_dir,
                timeout,
                cancel,
            )
            .await?;

        let mut exit = None;
        while let Some(event) = stream.next().await {
            match event? {
                CommandOutputEvent::Stdout { data } => {
                    sink.emit(ToolProgress::Stdout { data })?;
                }
                CommandOutputEvent::Stderr { data } => {
                    sink.emit(ToolProgress::Stderr { data })?;
                }
                CommandOutputEvent::Exit(e) => {
                    exit = Some(e);
                    break;
                }
            }
        }
        let exit = exit.ok_or_else(|| {
            ToolError::Execution("Command stream ended without exit event".to_string())
        })?;

        self.touch_session(&handle).await?;

        let output = exit.format_for_run_command();
        if exit.exit_code != 0 {
            return Err(ToolError::Execution(output));
        }
        Ok(output)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn read_file(
        &self,
        ctx: &TurnContext,
        session_id: &str,
        path: &str,
        start_line: Option<i64>,
        end_line: Option<i64>,
        with_line_numbers: bool,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        let handle = self.ensure_session(ctx, session_id).await?;
        validate_line_range(start_line, end_line)?;

        let bytes = self
            .runtime
            .download_file(&handle.session.container_id, path, cancel)
            .await?;
        self.touch_session(&handle).await?;

        match String::from_utf8(bytes) {
            Ok(text) => Ok(format_text_file(
                &text,
                start_line,
                end_line,
                with_line_numbers,
                &self.pod.output_options,
            )),
            Err(e) => Ok(format_binary_preview(
                path,
                &e.into_bytes(),
                with_line_numbers,
                &self.pod.output_options,
            )),
        }
    }

    pub async fn write_file(
        &self,
        ctx: &TurnContext,
        session_id: &str,
        path: &str,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        let handle = self.ensure_session(ctx, session_id).await?;
        self.runtime
            .upload_file(&handle.session.container_id, path, text.as_bytes(), cancel)
            .await?;
        self.touch_session(&handle).await?;

        let lines = if text.is_empty() {
            0
        } else {
            text.split('\n').count()
        };
        Ok(format!("Wrote {lines} lines to {path}"))
    }

    pub async fn apply_diff(
        &self,
        ctx: &TurnContext,
        session_id: &str,
        path: &str,
        patch: &str,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        validate_patch_text(patch)?;

        let handle = self.ensure_session(ctx, session_id).await?;
        let bytes = self
            .runtime
            .download_file(&handle.session.container_id, path, cancel.clone())
            .await?;
        let original = String::from_utf8_lossy(&bytes).into_owned();

        let patched = apply_unified_diff(&original, patch)?;
        self.runtime
            .upload_file(&handle.session.container_id, path, patched.as_bytes(), cancel)
            .await?;
        self.touch_session(&handle).await?;

        Ok(format!("Patched {path} ({} bytes)", patched.len()))
    }

    pub async fn download_chat_files(
        &self,
        ctx: &TurnContext,
        session_id: &str,
        patterns: &[String],
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        let handle = self.ensure_session(ctx, session_id).await?;

        let patterns: Vec<&str> = patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();
        if patterns.is_empty() {
            return Err(ToolError::Validation("patterns is required".to_string()));
        }
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            compiled.push(glob::Pattern::new(pattern).map_err(|e| {
                ToolError::Validation(format!("Invalid pattern '{pattern}': {e}"))
            })?);
        }

        let files = collect_cloud_files(ctx.visible_steps()?);
        let mut downloaded = Vec::new();
        for file in &files {
            if !compiled.iter().any(|p| p.matches(&file.file_name)) {
                continue;
            }
            let content = self.files.download(&file.storage_key).await?;
            let dest = format!("{}/{}", self.pod.work_dir, file.file_name);
            self.runtime
                .upload_file(&handle.session.container_id, &dest, &content, cancel.clone())
                .await?;
            downloaded.push(file.describe());
        }
        self.touch_session(&handle).await?;

        if downloaded.is_empty() {
            return Ok("No files matched the given patterns.".to_string());
        }
        let mut out = String::from("Downloaded:\n");
        for line in downloaded {
            out.push_str(&format!("- {line}\n"));
        }
        Ok(out.trim_end().to_string())
    }

    pub async fn get_session_stats(
        &self,
        ctx: &TurnContext,
        session_id: &str,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        let handle = self.ensure_session(ctx, session_id).await?;
        let stats = self
            .runtime
            .container_stats(&handle.session.container_id, cancel)
            .await?;
        self.touch_session(&handle).await?;

        match stats {
            Some(usage) => Ok(format_session_usage(&usage)),
            None => Ok("No stats available for this session.".to_string()),
        }
    }

    /// Builds the block prepended to the model's view of the conversation,
    /// announcing cloud files and the sessions still alive in this branch.
    pub async fn build_context_prefix(
        &self,
        ctx: &TurnContext,
    ) -> Result<Option<String>, ToolError> {
        let chain = ctx.visible_turn_ids()?;
        let sessions = self.store.sessions_for_turns(&chain).await?;
        let active = collect_active_sessions(&sessions, Utc::now());
        let files = collect_cloud_files(ctx.visible_steps()?);
        Ok(crate::context::build_context_prefix(&files, &active))
    }

    pub fn build_system_message(&self) -> String {
        format!(
            "You have code interpreter tools backed by a Docker container.\n\
             Working directory: {work_dir}\n\
             If the user should download a produced file, you MUST copy it into \
             {work_dir}/{artifacts_dir} so the user can download it!\n\
             Call create_docker_session first to get a sessionId for the other tools.",
            work_dir = self.pod.work_dir,
            artifacts_dir = self.pod.artifacts_dir,
        )
    }

    /// Tool definitions with server-configured defaults substituted for the
    /// `{placeholder}` tokens in descriptions.
    pub fn render_tool_definitions(
        &self,
        registry: &ToolRegistry,
    ) -> Result<Vec<ToolDefinition>, ToolError> {
        let replacements = self.placeholder_values();
        let mut rendered = Vec::new();
        for mut definition in registry.definitions() {
            definition.description = substitute(&definition.description, &replacements);
            let schema = serde_json::to_string(&definition.parameters)
                .map_err(|e| ToolError::Execution(format!("tool schema serialization: {e}")))?;
            definition.parameters = serde_json::from_str(&substitute(&schema, &replacements))
                .map_err(|e| ToolError::Execution(format!("tool schema substitution: {e}")))?;
            rendered.push(definition);
        }
        Ok(rendered)
    }

    fn placeholder_values(&self) -> Vec<(&'static str, String)> {
        let defaults = &self.options.default_resource_limits;
        let image = match &self.options.default_image_description {
            Some(desc) => format!("{} ({desc})", self.options.default_image),
            None => self.options.default_image.clone(),
        };
        let timeout = match self.options.default_timeout_secs {
            Some(secs) => secs.to_string(),
            None => "unlimited".to_string(),
        };
        let memory = if defaults.memory_bytes == 0 {
            "0 (unlimited)".to_string()
        } else {
            format!(
                "{} ({})",
                defaults.memory_bytes,
                humanize_bytes(defaults.memory_bytes)
            )
        };
        let cpu = if defaults.cpu_cores == 0.0 {
            "0 (unlimited)".to_string()
        } else {
            defaults.cpu_cores.to_string()
        };
        let processes = if defaults.max_processes == 0 {
            "0 (unlimited)".to_string()
        } else {
            defaults.max_processes.to_string()
        };

        vec![
            ("{workDir}", self.pod.work_dir.clone()),
            ("{defaultImage}", image),
            ("{defaultTimeoutSeconds}", timeout),
            ("{defaultMemoryBytes}", memory),
            ("{defaultCpuCores}", cpu),
            ("{defaultMaxProcesses}", processes),
            (
                "{defaultNetworkMode}",
                self.options.default_network_mode.to_string(),
            ),
            (
                "{allowedNetworkModes}",
                self.options.allowed_network_modes_display(),
            ),
        ]
    }
}

/// A session record that can no longer serve requests, with the timestamp of
/// whichever event killed it.
fn dead_session_error(
    label: &str,
    session: &SandboxSession,
    now: DateTime<Utc>,
) -> Option<ToolError> {
    if let Some(at) = session.terminated_at {
        return Some(ToolError::SessionState(format!(
            "Session '{label}' was destroyed at {} UTC. Create a new session.",
            at.format(SESSION_TS_FORMAT)
        )));
    }
    if session.expires_at <= now {
        return Some(ToolError::SessionState(format!(
            "Session '{label}' expired at {} UTC. Create a new session.",
            session.expires_at.format(SESSION_TS_FORMAT)
        )));
    }
    None
}

fn substitute(text: &str, replacements: &[(&'static str, String)]) -> String {
    let mut out = text.to_string();
    for (token, value) in replacements {
        out = out.replace(token, value);
    }
    out
}

/// Default session label: the container id without any registry prefix,
/// shortened to the familiar 12 characters.
fn derive_label(container_id: &str) -> String {
    let id = container_id.rsplit(':').next().unwrap_or(container_id);
    id.chars().take(12).collect()
}

fn unique_label(base: &str, taken: &[&str]) -> String {
    if !taken.contains(&base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(&candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

fn validate_line_range(start_line: Option<i64>, end_line: Option<i64>) -> Result<(), ToolError> {
    if let Some(start) = start_line {
        if start < 1 {
            return Err(ToolError::Validation("startLine must be >= 1".to_string()));
        }
    }
    if let Some(end) = end_line {
        if end < 1 {
            return Err(ToolError::Validation("endLine must be >= 1".to_string()));
        }
    }
    if let (Some(start), Some(end)) = (start_line, end_line) {
        if end < start {
            return Err(ToolError::Validation(
                "endLine must be >= startLine".to_string(),
            ));
        }
    }
    Ok(())
}

/// Renders a text file for the model: optional 1-based line window, optional
/// line numbering with a TotalLines header, then byte-budget truncation.
/// When numbering is on, the header survives truncation so the model always
/// learns the file's real size.
fn format_text_file(
    text: &str,
    start_line: Option<i64>,
    end_line: Option<i64>,
    with_line_numbers: bool,
    options: &OutputOptions,
) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let total = lines.len();

    let start = start_line.map(|s| s as usize).unwrap_or(1);
    let end = end_line.map(|e| (e as usize).min(total)).unwrap_or(total);
    let selected: &[&str] = if start > total {
        &[]
    } else {
        &lines[start - 1..end]
    };

    let body = if with_line_numbers {
        selected
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}: {line}", start + i))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        selected.join("\n")
    };

    if !with_line_numbers {
        let (out, _) = truncate_output(&body, options);
        return out;
    }

    let header = format!("TotalLines: {total}\n");
    let budget = options.max_output_bytes;
    let body_options = OutputOptions {
        max_output_bytes: if budget == 0 {
            0
        } else {
            budget.saturating_sub(header.len()).max(1)
        },
        ..options.clone()
    };
    let (body, _) = truncate_output(&body, &body_options);
    format!("{header}{body}")
}

/// Non-UTF-8 files come back as a base64 preview sized so the encoded form
/// still fits the output budget.
fn format_binary_preview(
    path: &str,
    bytes: &[u8],
    with_line_numbers: bool,
    options: &OutputOptions,
) -> String {
    let header = if with_line_numbers {
        "TotalLines: 0\n".to_string()
    } else {
        String::new()
    };

    let budget = options.max_output_bytes;
    let preview_len = if budget == 0 {
        bytes.len()
    } else {
        // Base64 inflates by 4/3; leave room for the header lines.
        let meta = format!("{header}Path: {path}\nSize: {}\nBase64(first 0 bytes):\n", bytes.len());
        let available = budget.saturating_sub(meta.len());
        (available / 4 * 3).max(1).min(bytes.len())
    };

    format!(
        "{header}Path: {path}\nSize: {}\nBase64(first {preview_len} bytes):\n{}",
        bytes.len(),
        BASE64.encode(&bytes[..preview_len])
    )
}

fn format_session_usage(usage: &SessionUsage) -> String {
    let memory = match usage.memory_limit_bytes {
        Some(limit) if limit > 0 => format!(
            "{} / {}",
            humanize_bytes(usage.memory_bytes),
            humanize_bytes(limit)
        ),
        _ => humanize_bytes(usage.memory_bytes),
    };
    format!(
        "cpu: {:.1}%, memory: {memory}, processes: {}",
        usage.cpu_percent, usage.pids
    )
}
