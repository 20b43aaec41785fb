use crate::error::RuntimeError;
use serde::{Deserialize, Serialize};

/// Per-container resource caps. A value of 0 means unlimited.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_bytes: u64,
    pub cpu_cores: f64,
    pub max_processes: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::standard()
    }
}

impl ResourceLimits {
    pub fn unlimited() -> Self {
        Self {
            memory_bytes: 0,
            cpu_cores: 0.0,
            max_processes: 0,
        }
    }

    pub fn minimal() -> Self {
        Self {
            memory_bytes: 128 * 1024 * 1024,
            cpu_cores: 0.5,
            max_processes: 50,
        }
    }

    pub fn standard() -> Self {
        Self {
            memory_bytes: 512 * 1024 * 1024,
            cpu_cores: 1.0,
            max_processes: 100,
        }
    }

    pub fn large() -> Self {
        Self {
            memory_bytes: 2 * 1024 * 1024 * 1024,
            cpu_cores: 2.0,
            max_processes: 200,
        }
    }

    /// Checks these limits against the server maximums. Unlimited (0) is only
    /// acceptable when the corresponding maximum is itself unlimited.
    pub fn validate(&self, max: &ResourceLimits) -> Result<(), RuntimeError> {
        if self.cpu_cores < 0.0 {
            return Err(RuntimeError::InvalidLimits(
                "CPU limit must be >= 0".to_string(),
            ));
        }

        if max.memory_bytes > 0 && self.memory_bytes == 0 {
            return Err(RuntimeError::InvalidLimits(
                "Memory unlimited exceeds maximum".to_string(),
            ));
        }
        if max.cpu_cores > 0.0 && self.cpu_cores == 0.0 {
            return Err(RuntimeError::InvalidLimits(
                "CPU unlimited exceeds maximum".to_string(),
            ));
        }
        if max.max_processes > 0 && self.max_processes == 0 {
            return Err(RuntimeError::InvalidLimits(
                "Process unlimited exceeds maximum".to_string(),
            ));
        }

        if max.memory_bytes > 0 && self.memory_bytes > max.memory_bytes {
            return Err(RuntimeError::InvalidLimits(format!(
                "Memory limit {} exceeds maximum {}",
                self.memory_bytes, max.memory_bytes
            )));
        }
        if max.cpu_cores > 0.0 && self.cpu_cores > max.cpu_cores {
            return Err(RuntimeError::InvalidLimits(format!(
                "CPU limit {} exceeds maximum {}",
                self.cpu_cores, max.cpu_cores
            )));
        }
        if max.max_processes > 0 && self.max_processes > max.max_processes {
            return Err(RuntimeError::InvalidLimits(format!(
                "Process limit {} exceeds maximum {}",
                self.max_processes, max.max_processes
            )));
        }

        Ok(())
    }

    /// Model-readable summary, e.g. "memory=512MB, cpu=1 cores, maxProcesses=100".
    pub fn describe(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if self.memory_bytes > 0 {
            parts.push(format!("memory={}", humanize_bytes(self.memory_bytes)));
        } else {
            parts.push("memory=unlimited".to_string());
        }
        if self.cpu_cores > 0.0 {
            parts.push(format!("cpu={} cores", trim_float(self.cpu_cores)));
        } else {
            parts.push("cpu=unlimited".to_string());
        }
        if self.max_processes > 0 {
            parts.push(format!("maxProcesses={}", self.max_processes));
        } else {
            parts.push("maxProcesses=unlimited".to_string());
        }
        parts.join(", ")
    }
}

pub fn humanize_bytes(size: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;
    if size >= GB {
        format!("{}GB", trim_float(size as f64 / GB as f64))
    } else if size >= MB {
        format!("{}MB", trim_float(size as f64 / MB as f64))
    } else if size >= KB {
        format!("{}KB", trim_float(size as f64 / KB as f64))
    } else {
        format!("{size}B")
    }
}

/// Formats with at most two decimal places, dropping trailing zeros.
fn trim_float(v: f64) -> String {
    let s = format!("{:.2}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
