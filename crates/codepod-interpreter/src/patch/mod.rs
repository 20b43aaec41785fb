//! Restricted unified-diff support for the `apply_diff` tool: a strict
//! validator for model-provided patch text and an applier with a small
//! line-drift tolerance.

mod apply;
mod validate;

pub use apply::apply_unified_diff;
pub use validate::validate_patch_text;

pub(crate) const FULL_HEADER_HINT: &str = "@@ -oldStart,oldCount +newStart,newCount @@";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct HunkHeader {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

/// Parses a full hunk header `@@ -a,b +c,d @@` (optional trailing section
/// text). Abbreviated forms are rejected on purpose; models handle the
/// explicit shape more reliably.
pub(crate) fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let rest = line.strip_prefix("@@ -")?;
    let (old_start, rest) = read_uint(rest)?;
    let rest = rest.strip_prefix(',')?;
    let (old_count, rest) = read_uint(rest)?;
    let rest = rest.strip_prefix(" +")?;
    let (new_start, rest) = read_uint(rest)?;
    let rest = rest.strip_prefix(',')?;
    let (new_count, rest) = read_uint(rest)?;
    rest.strip_prefix(" @@")?;
    Some(HunkHeader {
        old_start,
        old_count,
        new_start,
        new_count,
    })
}

fn read_uint(s: &str) -> Option<(usize, &str)> {
    let digits = s.len() - s.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let value: usize = s[..digits].parse().ok()?;
    Some((value, &s[digits..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_header_parses() {
        let header = parse_hunk_header("@@ -2,1 +2,1 @@").unwrap();
        assert_eq!(header.old_start, 2);
        assert_eq!(header.old_count, 1);
        assert_eq!(header.new_start, 2);
        assert_eq!(header.new_count, 1);
    }

    #[test]
    fn section_text_after_header_is_allowed() {
        assert!(parse_hunk_header("@@ -10,4 +12,5 @@ fn main()").is_some());
    }

    #[test]
    fn abbreviated_headers_are_rejected() {
        assert!(parse_hunk_header("@@").is_none());
        assert!(parse_hunk_header("@@ -2 +2 @@").is_none());
        assert!(parse_hunk_header("@@ -2,1 +2,1").is_none());
    }
}
