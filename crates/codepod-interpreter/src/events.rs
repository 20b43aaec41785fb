use crate::errors::ToolError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Incremental output surfaced to the chat client while a tool is running
/// (image pull progress, command stdout/stderr). The final tool result
/// travels separately through the dispatcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolProgress {
    Stdout { data: String },
    Stderr { data: String },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: ToolProgress) -> Result<(), ToolError>;
}

#[derive(Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn emit(&self, _progress: ToolProgress) -> Result<(), ToolError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct BufferedProgressSink {
    inner: Arc<Mutex<Vec<ToolProgress>>>,
}

impl BufferedProgressSink {
    pub fn snapshot(&self) -> Vec<ToolProgress> {
        let guard = self.inner.lock().expect("buffered sink mutex poisoned");
        guard.clone()
    }
}

impl ProgressSink for BufferedProgressSink {
    fn emit(&self, progress: ToolProgress) -> Result<(), ToolError> {
        let mut guard = self.inner.lock().expect("buffered sink mutex poisoned");
        guard.push(progress);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_sink_records_deltas_in_order() {
        let sink = BufferedProgressSink::default();
        sink.emit(ToolProgress::Stdout {
            data: "pulling".to_string(),
        })
        .expect("emit should succeed");
        sink.emit(ToolProgress::Stderr {
            data: "warn".to_string(),
        })
        .expect("emit should succeed");

        let deltas = sink.snapshot();
        assert_eq!(deltas.len(), 2);
        assert!(matches!(deltas[0], ToolProgress::Stdout { .. }));
    }
}
