use crate::errors::ToolError;
use crate::session::{SandboxSession, SessionHandle};
use chrono::{DateTime, Utc};
use codepod_docker::humanize_bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

pub type TurnId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    User,
    Assistant,
}

/// A file uploaded to the chat, visible to the sandbox tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloudFile {
    pub file_name: String,
    pub size: u64,
    pub media_type: String,
    pub storage_key: String,
    /// width x height for images.
    pub image_size: Option<(u32, u32)>,
}

impl CloudFile {
    pub fn describe(&self) -> String {
        match self.image_size {
            Some((w, h)) => format!(
                "{} (size:{}, resolution: {}x{})",
                self.file_name,
                humanize_bytes(self.size),
                w,
                h
            ),
            None => format!("{} (size:{})", self.file_name, humanize_bytes(self.size)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnStep {
    pub role: StepRole,
    pub attachments: Vec<CloudFile>,
}

/// One node of the turn tree. Turns reference their parent; branches of the
/// conversation share ancestors but never see each other's descendants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub id: TurnId,
    pub parent_id: Option<TurnId>,
    pub steps: Vec<TurnStep>,
}

/// Request-scoped view of the turn tree for one tool-calling round: the
/// loaded turn arena, the id of the assistant turn being generated, and the
/// per-call session resolution cache. Dropped when the round ends, so cached
/// session state never leaks across requests.
#[derive(Debug)]
pub struct TurnContext {
    turns: HashMap<TurnId, TurnRecord>,
    current_turn_id: TurnId,
    session_cache: Mutex<HashMap<String, SessionHandle>>,
}

impl TurnContext {
    pub fn new(turns: Vec<TurnRecord>, current_turn_id: TurnId) -> Result<Self, ToolError> {
        let turns: HashMap<TurnId, TurnRecord> = turns.into_iter().map(|t| (t.id, t)).collect();
        if !turns.contains_key(&current_turn_id) {
            return Err(ToolError::Execution(format!(
                "current turn {current_turn_id} is not in the loaded turn tree"
            )));
        }
        Ok(Self {
            turns,
            current_turn_id,
            session_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn current_turn_id(&self) -> TurnId {
        self.current_turn_id
    }

    /// Ancestor chain of the current turn, root first and ending with the
    /// current turn itself. The walk is bounded by the arena size; running
    /// past that bound means the parent links form a cycle, which is corrupt
    /// data and a hard error.
    pub fn visible_turn_ids(&self) -> Result<Vec<TurnId>, ToolError> {
        let mut chain = Vec::new();
        let mut cursor = Some(self.current_turn_id);
        while let Some(id) = cursor {
            if chain.len() > self.turns.len() {
                return Err(ToolError::Execution(format!(
                    "corrupt turn ancestry: parent cycle detected at turn {id}"
                )));
            }
            let Some(turn) = self.turns.get(&id) else {
                // The chain was loaded partially; treat the missing parent as
                // the top of the visible history.
                break;
            };
            chain.push(id);
            cursor = turn.parent_id;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Steps of every visible turn, in chain order.
    pub fn visible_steps(&self) -> Result<Vec<&TurnStep>, ToolError> {
        let mut steps = Vec::new();
        for id in self.visible_turn_ids()? {
            if let Some(turn) = self.turns.get(&id) {
                steps.extend(turn.steps.iter());
            }
        }
        Ok(steps)
    }

    pub fn cached_session(&self, label: &str) -> Option<SessionHandle> {
        let cache = self.session_cache.lock().ok()?;
        cache.get(label).cloned()
    }

    pub fn cache_session(&self, label: &str, handle: SessionHandle) {
        if let Ok(mut cache) = self.session_cache.lock() {
            cache.insert(label.to_string(), handle);
        }
    }

    pub fn evict_session(&self, label: &str) {
        if let Ok(mut cache) = self.session_cache.lock() {
            cache.remove(label);
        }
    }
}

/// Deduplicates attachments by file name; a re-upload later in the history
/// wins over earlier ones.
pub fn collect_cloud_files<'a>(steps: impl IntoIterator<Item = &'a TurnStep>) -> Vec<CloudFile> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, CloudFile> = HashMap::new();

    for step in steps {
        for file in &step.attachments {
            if !by_name.contains_key(&file.file_name) {
                order.push(file.file_name.clone());
            }
            by_name.insert(file.file_name.clone(), file.clone());
        }
    }

    order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect()
}

/// Active sessions deduplicated by label; the most recent occurrence in
/// turn order wins. Terminated and expired sessions are dropped.
pub fn collect_active_sessions(
    sessions: &[SandboxSession],
    now: DateTime<Utc>,
) -> Vec<SandboxSession> {
    let mut order: Vec<String> = Vec::new();
    let mut by_label: HashMap<String, SandboxSession> = HashMap::new();

    for session in sessions {
        if session.label.trim().is_empty() || !session.is_active(now) {
            continue;
        }
        if !by_label.contains_key(&session.label) {
            order.push(session.label.clone());
        }
        by_label.insert(session.label.clone(), session.clone());
    }

    order
        .into_iter()
        .filter_map(|label| by_label.remove(&label))
        .collect()
}

/// Builds the context block prepended to the model's view of the
/// conversation. Returns None when there is nothing to announce.
pub fn build_context_prefix(
    cloud_files: &[CloudFile],
    active_sessions: &[SandboxSession],
) -> Option<String> {
    if cloud_files.is_empty() && active_sessions.is_empty() {
        return None;
    }

    let mut out = String::new();

    if !cloud_files.is_empty() {
        out.push_str("[Cloud Files Available]\n");
        for file in cloud_files {
            out.push_str(&format!("- {}\n", file.describe()));
        }
        out.push_str(
            "Use download_chat_files with wildcard patterns matching the file names above.\n\n",
        );
    }

    if !active_sessions.is_empty() {
        out.push_str("[Active Docker Sessions]\n");
        for session in active_sessions {
            out.push_str(&format!("- {}\n", session.describe()));
        }
        out.push_str("Use the sessionId above when calling code interpreter tools.\n");
    }

    Some(out.trim_end().to_string())
}

/// A message about to be sent to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: StepRole,
    pub content: String,
}

/// Prepends the context prefix to the first user-authored message of the
/// round. Returns false when there is no user message to attach to.
pub fn inject_context_prefix(messages: &mut [PromptMessage], prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    for message in messages.iter_mut() {
        if message.role == StepRole::User {
            message.content = format!("{prefix}\n\n{}", message.content);
            return true;
        }
    }
    false
}
