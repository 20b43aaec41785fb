use super::{FULL_HEADER_HINT, parse_hunk_header};
use crate::errors::ToolError;

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Checks model-provided patch text before any file is touched. Only bare
/// unified-diff hunks are accepted; wrappers get a message naming the
/// offense so the model can fix its output instead of guessing.
pub fn validate_patch_text(patch: &str) -> Result<(), ToolError> {
    if patch.trim().is_empty() {
        return Err(ToolError::Validation("patch is required".to_string()));
    }

    let normalized = patch.replace("\r\n", "\n");
    let mut lines: Vec<&str> = normalized.split('\n').collect();
    // A trailing newline must not count as an extra empty line.
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let mut in_hunk = false;
    let mut saw_hunk_header = false;

    for line in lines {
        if line.is_empty() {
            if in_hunk {
                return Err(ToolError::Validation(
                    "Unsupported patch format: empty lines are not allowed inside hunks. \
                     Use a single space ' ' line to represent an empty context line."
                        .to_string(),
                ));
            }
            continue;
        }

        if line.starts_with("```") {
            return Err(ToolError::Validation(
                "Unsupported patch format: no markdown code fences are allowed. \
                 Provide only unified diff hunks, with no markdown wrappers."
                    .to_string(),
            ));
        }

        if line.starts_with("*** ") {
            return Err(ToolError::Validation(format!(
                "Unsupported patch format: '{line}' wrappers (e.g. '*** Begin Patch') are not \
                 supported. Provide only unified diff hunks."
            )));
        }

        if is_git_header(line) {
            return Err(ToolError::Validation(format!(
                "Unsupported patch format: git-style headers like 'diff --git' are not \
                 supported. Each hunk must use a full header like: {FULL_HEADER_HINT}."
            )));
        }

        // The target file comes from the `path` argument; plain file headers
        // carry no extra information, so tolerate and ignore them.
        if line.starts_with("--- ") || line.starts_with("+++ ") {
            continue;
        }

        if line.starts_with("@@") {
            if parse_hunk_header(line).is_none() {
                return Err(ToolError::Validation(format!(
                    "Invalid hunk header: '{line}'. apply_diff only supports unified diff \
                     hunks. Each hunk must use a full header like: {FULL_HEADER_HINT}."
                )));
            }
            in_hunk = true;
            saw_hunk_header = true;
            continue;
        }

        if !in_hunk {
            return Err(ToolError::Validation(
                "Unsupported patch format: provide only unified diff hunks \
                 (lines starting with '@@', ' ', '+', '-', or '\\ No newline at end of file'). \
                 Do not include any headers or wrappers."
                    .to_string(),
            ));
        }

        match line.chars().next() {
            Some(' ') | Some('+') | Some('-') => continue,
            _ if line == NO_NEWLINE_MARKER => continue,
            _ => {
                return Err(ToolError::Validation(format!(
                    "Unsupported patch format: invalid hunk line '{line}'. Within hunks, each \
                     line must start with ' ' (context), '+' (add), '-' (delete), or be exactly \
                     '\\ No newline at end of file'."
                )));
            }
        }
    }

    if !saw_hunk_header {
        return Err(ToolError::Validation(format!(
            "Unsupported patch format: no unified diff hunks found. Provide only unified diff \
             hunks starting with a header like: {FULL_HEADER_HINT}."
        )));
    }

    Ok(())
}

fn is_git_header(line: &str) -> bool {
    const GIT_PREFIXES: [&str; 9] = [
        "diff --git ",
        "index ",
        "new file mode ",
        "deleted file mode ",
        "similarity index ",
        "rename from ",
        "rename to ",
        "GIT binary patch",
        "Binary files ",
    ];
    GIT_PREFIXES.iter().any(|p| line.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_of(patch: &str) -> String {
        validate_patch_text(patch).unwrap_err().to_string()
    }

    #[test]
    fn plain_hunks_pass() {
        let patch = "@@ -2,1 +2,1 @@\n-b\n+x\n";
        assert!(validate_patch_text(patch).is_ok());
    }

    #[test]
    fn file_headers_are_tolerated() {
        let patch = "--- a/x\n+++ b/x\n@@ -1,1 +1,1 @@\n-a\n+b\n";
        assert!(validate_patch_text(patch).is_ok());
    }

    #[test]
    fn blank_patch_is_required() {
        assert_eq!(error_of("   \n"), "patch is required");
    }

    #[test]
    fn git_apply_style_patch_is_rejected_with_helpful_message() {
        let patch = "diff --git a/x b/x\nindex 1234567..89abcde 100644\n--- a/x\n+++ b/x\n@@ -1,1 +1,1 @@\n-a\n+b\n";
        let error = error_of(patch);
        assert!(error.contains("diff --git"));
        assert!(error.contains("@@ -oldStart,oldCount +newStart,newCount @@"));
    }

    #[test]
    fn begin_patch_wrapper_is_rejected_with_helpful_message() {
        let patch = "*** Begin Patch\n*** Update File: x\n@@ -1,1 +1,1 @@\n-a\n+b\n*** End Patch\n";
        let error = error_of(patch);
        assert!(error.contains("Begin Patch"));
        assert!(error.to_lowercase().contains("only unified diff hunks"));
    }

    #[test]
    fn markdown_code_fence_is_rejected_with_helpful_message() {
        let patch = "```diff\n@@ -1,1 +1,1 @@\n-a\n+b\n```\n";
        let error = error_of(patch).to_lowercase();
        assert!(error.contains("markdown"));
        assert!(error.contains("no markdown code fences"));
    }

    #[test]
    fn incomplete_hunk_header_is_rejected_with_helpful_message() {
        let patch = "@@\n-a\n+b\n";
        let error = error_of(patch);
        assert!(error.contains("Invalid hunk header"));
        assert!(error.contains("@@ -oldStart,oldCount +newStart,newCount @@"));
    }

    #[test]
    fn empty_line_inside_hunk_is_rejected() {
        let patch = "@@ -1,1 +1,1 @@\n\n-a\n+b\n";
        let error = error_of(patch).to_lowercase();
        assert!(error.contains("empty lines"));
        assert!(error.contains("inside hunks"));
        assert!(error.contains("single space"));
    }

    #[test]
    fn stray_text_outside_hunks_is_rejected() {
        let patch = "please apply this\n@@ -1,1 +1,1 @@\n-a\n+b\n";
        let error = error_of(patch);
        assert!(error.contains("only unified diff hunks"));
    }

    #[test]
    fn invalid_line_inside_hunk_names_the_line() {
        let patch = "@@ -1,1 +1,1 @@\n-a\n+b\n*stray\n";
        let error = error_of(patch);
        assert!(error.contains("invalid hunk line '*stray'"));
    }

    #[test]
    fn no_hunks_at_all_is_rejected() {
        let patch = "--- a/x\n+++ b/x\n";
        let error = error_of(patch);
        assert!(error.contains("no unified diff hunks found"));
    }

    #[test]
    fn trailing_newline_does_not_trip_the_empty_line_rule() {
        let patch = "@@ -1,1 +1,1 @@\n-a\n+b\n\n";
        assert!(validate_patch_text(patch).is_ok());
    }
}
