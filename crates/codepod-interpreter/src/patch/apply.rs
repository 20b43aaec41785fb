use super::parse_hunk_header;
use crate::errors::ToolError;

/// How far a hunk may sit from its declared position before we give up.
/// Covers stale line numbers from an earlier read without letting a hunk
/// land somewhere unrelated.
const MAX_LINE_DRIFT: usize = 10;

enum HunkLine {
    Context(String),
    Add(String),
    Delete(String),
}

struct Hunk {
    old_start: usize,
    lines: Vec<HunkLine>,
}

/// Applies unified-diff hunks to `original`. File headers and the
/// no-newline marker are skipped; a diff with zero hunks returns the
/// original unchanged. Context and delete lines must match the source
/// (whitespace-insensitively for drift in indentation), and context lines
/// always preserve the original file's text in the output.
pub fn apply_unified_diff(original: &str, diff: &str) -> Result<String, ToolError> {
    let hunks = parse_hunks(diff)?;
    if hunks.is_empty() {
        return Ok(original.to_string());
    }

    let src: Vec<&str> = original.split('\n').collect();
    let mut out: Vec<String> = Vec::new();
    let mut cursor = 0usize;

    for hunk in &hunks {
        let target = hunk.old_start.saturating_sub(1).max(cursor);
        let start = find_hunk_start(&src, cursor, target, hunk)?;

        for line in &src[cursor..start] {
            out.push((*line).to_string());
        }

        let mut idx = start;
        for line in &hunk.lines {
            match line {
                HunkLine::Context(_) => {
                    out.push(src[idx].to_string());
                    idx += 1;
                }
                HunkLine::Delete(_) => idx += 1,
                HunkLine::Add(text) => out.push(text.clone()),
            }
        }
        cursor = idx;
    }

    for line in &src[cursor..] {
        out.push((*line).to_string());
    }
    Ok(out.join("\n"))
}

fn parse_hunks(diff: &str) -> Result<Vec<Hunk>, ToolError> {
    let normalized = diff.replace("\r\n", "\n");
    let mut hunks: Vec<Hunk> = Vec::new();

    for line in normalized.split('\n') {
        if line.is_empty() {
            continue;
        }
        if line.starts_with("--- ") || line.starts_with("+++ ") {
            continue;
        }
        // "\ No newline at end of file"
        if line.starts_with('\\') {
            continue;
        }
        if line.starts_with("@@") {
            let header = parse_hunk_header(line).ok_or_else(|| {
                ToolError::Patch(format!("Invalid hunk header: '{line}'"))
            })?;
            hunks.push(Hunk {
                old_start: header.old_start,
                lines: Vec::new(),
            });
            continue;
        }

        let Some(hunk) = hunks.last_mut() else {
            return Err(ToolError::Patch(format!(
                "Unexpected patch line outside of a hunk: '{line}'"
            )));
        };
        match line.as_bytes()[0] {
            b' ' => hunk.lines.push(HunkLine::Context(line[1..].to_string())),
            b'+' => hunk.lines.push(HunkLine::Add(line[1..].to_string())),
            b'-' => hunk.lines.push(HunkLine::Delete(line[1..].to_string())),
            _ => {
                return Err(ToolError::Patch(format!("Invalid hunk line: '{line}'")));
            }
        }
    }
    Ok(hunks)
}

/// Locates where the hunk actually applies: the declared position first,
/// then nearby offsets in increasing distance.
fn find_hunk_start(
    src: &[&str],
    cursor: usize,
    target: usize,
    hunk: &Hunk,
) -> Result<usize, ToolError> {
    let mut offsets: Vec<isize> = Vec::with_capacity(2 * MAX_LINE_DRIFT + 1);
    offsets.push(0);
    for drift in 1..=MAX_LINE_DRIFT as isize {
        offsets.push(drift);
        offsets.push(-drift);
    }

    for offset in offsets {
        let candidate = target as isize + offset;
        if candidate < cursor as isize {
            continue;
        }
        let candidate = candidate as usize;
        if hunk_matches(src, candidate, hunk) {
            return Ok(candidate);
        }
    }

    Err(mismatch_error(src, target, hunk))
}

fn hunk_matches(src: &[&str], start: usize, hunk: &Hunk) -> bool {
    let mut idx = start;
    for line in &hunk.lines {
        match line {
            HunkLine::Context(expected) | HunkLine::Delete(expected) => {
                let Some(actual) = src.get(idx) else {
                    return false;
                };
                if !lines_match(expected, actual) {
                    return false;
                }
                idx += 1;
            }
            HunkLine::Add(_) => {}
        }
    }
    true
}

fn lines_match(expected: &str, actual: &str) -> bool {
    expected == actual || expected.trim() == actual.trim()
}

/// Reports the first mismatching line at the declared position, naming both
/// what the patch expected and what the file contains.
fn mismatch_error(src: &[&str], start: usize, hunk: &Hunk) -> ToolError {
    let mut idx = start;
    for line in &hunk.lines {
        if let HunkLine::Context(expected) | HunkLine::Delete(expected) = line {
            let actual = src.get(idx).copied().unwrap_or("<end of file>");
            if !lines_match(expected, actual) {
                return ToolError::Patch(format!(
                    "Patch does not apply at line {}: expected '{}', got '{}'",
                    idx + 1,
                    expected,
                    actual
                ));
            }
            idx += 1;
        }
    }
    ToolError::Patch(format!(
        "Patch hunk starting at line {} does not apply",
        hunk.old_start
    ))
}
