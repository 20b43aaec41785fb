use serde::{Deserialize, Serialize};

pub const DEFAULT_TRUNCATION_MESSAGE: &str = "\n... [Output truncated: {omitted} lines omitted] ...\n";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationStrategy {
    Head,
    Tail,
    #[default]
    HeadAndTail,
}

/// Controls how oversized tool output is cut down before it reaches the
/// model. The budget is in bytes, but the marker reports omitted *lines*;
/// byte counts mean nothing to a language model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Maximum output size in bytes. 0 disables truncation.
    pub max_output_bytes: usize,
    pub strategy: TruncationStrategy,
    /// Marker inserted at the cut point; `{omitted}` expands to the number
    /// of whole lines that were dropped.
    pub truncation_message: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            max_output_bytes: 10 * 1024,
            strategy: TruncationStrategy::HeadAndTail,
            truncation_message: DEFAULT_TRUNCATION_MESSAGE.to_string(),
        }
    }
}

impl OutputOptions {
    pub fn with_budget(max_output_bytes: usize, strategy: TruncationStrategy) -> Self {
        Self {
            max_output_bytes,
            strategy,
            ..Self::default()
        }
    }

    fn note(&self, omitted: usize) -> String {
        self.truncation_message
            .replace("{omitted}", &omitted.to_string())
    }
}

/// Cuts `output` down to the byte budget, inserting the truncation marker at
/// the cut point. Returns the (possibly unchanged) text and whether any
/// truncation happened.
pub fn truncate_output(output: &str, options: &OutputOptions) -> (String, bool) {
    let budget = options.max_output_bytes;
    if budget == 0 || output.len() <= budget {
        return (output.to_string(), false);
    }

    let (head, tail) = match options.strategy {
        TruncationStrategy::Head => (take_head(output, budget), ""),
        TruncationStrategy::Tail => ("", take_tail(output, budget)),
        TruncationStrategy::HeadAndTail => {
            let half = budget / 2;
            (take_head(output, half), take_tail(output, half))
        }
    };

    let total_lines = count_lines(output);
    let kept_lines = count_lines(head) + count_lines(tail);
    let omitted = total_lines.saturating_sub(kept_lines);

    let mut result = String::with_capacity(head.len() + tail.len() + 64);
    result.push_str(head);
    result.push_str(&options.note(omitted));
    result.push_str(tail);
    (result, true)
}

/// Longest prefix of `s` that fits in `budget` bytes without splitting a
/// character.
fn take_head(s: &str, budget: usize) -> &str {
    if s.len() <= budget {
        return s;
    }
    let mut end = budget;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Longest suffix of `s` that fits in `budget` bytes without splitting a
/// character.
fn take_tail(s: &str, budget: usize) -> &str {
    if s.len() <= budget {
        return s;
    }
    let mut start = s.len() - budget;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

fn count_lines(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.split('\n').count()
}
