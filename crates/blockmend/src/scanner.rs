//! Block scanner: finds record-block line ranges by nested-brace depth.
//!
//! This is not a grammar-aware parser. It walks the file line by line,
//! counting `{}`/`[]` nesting outside string literals and line comments,
//! and yields the `[start, end]` line range of every block whose opening
//! line contains the configured marker. Nested sub-objects and arrays
//! raise and lower the depth but can never close a block early; a block
//! ends on the line where the depth returns to the block's own level.

use crate::error::{MendError, Result};

/// A contiguous line range holding one record block.
///
/// `start` and `end` are 0-based inclusive indices into the scanned line
/// slice. `ordinal` counts blocks in document order, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start: usize,
    pub end: usize,
    pub ordinal: usize,
}

impl Block {
    /// Number of lines the block spans.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }

    /// 1-based `(start, end)` pair for diagnostics.
    #[must_use]
    pub fn lines_1based(&self) -> (usize, usize) {
        (self.start + 1, self.end + 1)
    }
}

/// Brace accounting for a single line.
///
/// `delta` is the net nesting change, `min_run` the lowest running value
/// reached while walking the line (always ≤ 0), and `opens_brace` records
/// whether an unquoted `{` appeared at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineBraces {
    pub delta: i32,
    pub min_run: i32,
    pub opens_brace: bool,
}

/// Count nesting tokens on one line, skipping string literals (`'`, `"`,
/// backtick, with `\` escapes) and everything after an unquoted `//`.
pub(crate) fn line_braces(line: &str) -> LineBraces {
    let mut delta = 0i32;
    let mut min_run = 0i32;
    let mut opens_brace = false;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => in_string = Some(ch),
            '/' if chars.peek() == Some(&'/') => break,
            '{' => {
                opens_brace = true;
                delta += 1;
            }
            '[' => delta += 1,
            '}' | ']' => {
                delta -= 1;
                min_run = min_run.min(delta);
            }
            _ => {}
        }
    }

    LineBraces {
        delta,
        min_run,
        opens_brace,
    }
}

/// The code portion of a line: everything before an unquoted `//`.
pub(crate) fn code_span(line: &str) -> &str {
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    let mut iter = line.char_indices().peekable();

    while let Some((idx, ch)) = iter.next() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => in_string = Some(ch),
            '/' if iter.peek().map(|&(_, next)| next) == Some('/') => {
                return &line[..idx];
            }
            _ => {}
        }
    }
    line
}

/// Text after the first unquoted `{` on a line, with any trailing comment
/// removed. `None` when the line opens no brace.
pub(crate) fn open_brace_suffix(line: &str) -> Option<&str> {
    let code = code_span(line);
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (idx, ch) in code.char_indices() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => in_string = Some(ch),
            '{' => return Some(&code[idx + ch.len_utf8()..]),
            _ => {}
        }
    }
    None
}

/// Lazy block sequence over a line slice.
///
/// Yields `Ok(Block)` per matched block in document order, or a single
/// `Err` on a structural fault (unterminated block, unbalanced braces),
/// after which the iterator is fused.
pub struct Blocks<'a> {
    lines: &'a [&'a str],
    marker: &'a str,
    pos: usize,
    next_ordinal: usize,
    done: bool,
}

impl<'a> Blocks<'a> {
    #[must_use]
    pub fn new(lines: &'a [&'a str], marker: &'a str) -> Self {
        Self {
            lines,
            marker,
            pos: 0,
            next_ordinal: 1,
            done: false,
        }
    }

    fn emit(&mut self, start: usize, end: usize) -> Block {
        let block = Block {
            start,
            end,
            ordinal: self.next_ordinal,
        };
        self.next_ordinal += 1;
        self.pos = end + 1;
        block
    }

    fn fail(&mut self, line: usize, message: String) -> MendError {
        self.done = true;
        MendError::Structural { line, message }
    }
}

impl Iterator for Blocks<'_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.pos < self.lines.len() {
            let start = self.pos;
            let line = self.lines[start];
            if !line.contains(self.marker) {
                self.pos += 1;
                continue;
            }
            let braces = line_braces(line);
            if !braces.opens_brace {
                self.pos += 1;
                continue;
            }
            if braces.delta < 0 {
                return Some(Err(self.fail(
                    start + 1,
                    "marker line closes more braces than it opens".to_string(),
                )));
            }
            if braces.delta == 0 {
                return Some(Ok(self.emit(start, start)));
            }

            let mut depth = braces.delta;
            let mut i = start + 1;
            while i < self.lines.len() {
                let inner = line_braces(self.lines[i]);
                if depth + inner.min_run < 0 {
                    return Some(Err(self.fail(
                        i + 1,
                        format!(
                            "unmatched closing brace inside block opened at line {}",
                            start + 1
                        ),
                    )));
                }
                depth += inner.delta;
                if depth == 0 {
                    return Some(Ok(self.emit(start, i)));
                }
                i += 1;
            }
            return Some(Err(self.fail(
                start + 1,
                "block has no matching closing brace before end of file".to_string(),
            )));
        }

        None
    }
}

/// Collect every block in `lines` whose opening line contains `marker`.
pub fn scan(lines: &[&str], marker: &str) -> Result<Vec<Block>> {
    Blocks::new(lines, marker).collect()
}

/// Relative nesting depth at the start of each line of `block`.
///
/// Uses the same counting rule as the scanner: index 0 (the opening line)
/// is depth 0, lines at the block's own top level are depth 1. Errors if
/// the depth dips below zero or fails to return to zero on the closing
/// line.
pub(crate) fn depth_map(lines: &[&str], block: Block) -> Result<Vec<usize>> {
    let mut depths = Vec::with_capacity(block.line_count());
    let mut depth = 0i32;

    for i in block.start..=block.end {
        depths.push(depth as usize);
        let braces = line_braces(lines[i]);
        if depth + braces.min_run < 0 {
            return Err(MendError::structural(
                i + 1,
                format!(
                    "unmatched closing brace inside block opened at line {}",
                    block.start + 1
                ),
            ));
        }
        depth += braces.delta;
    }
    if depth != 0 {
        return Err(MendError::structural(
            block.end + 1,
            "block does not close at its final line".to_string(),
        ));
    }

    Ok(depths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<&str> {
        src.split('\n').collect()
    }

    #[test]
    fn counts_braces_and_brackets() {
        let b = line_braces("  profile: {");
        assert_eq!(b.delta, 1);
        assert!(b.opens_brace);

        let b = line_braces("  evidence: [");
        assert_eq!(b.delta, 1);
        assert!(!b.opens_brace);

        let b = line_braces("  },");
        assert_eq!(b.delta, -1);
        assert_eq!(b.min_run, -1);
    }

    #[test]
    fn braces_inside_strings_do_not_count() {
        let b = line_braces("  note: 'open { and ] inside',");
        assert_eq!(b.delta, 0);
        assert!(!b.opens_brace);

        let b = line_braces(r#"  escaped: 'it\'s { right',"#);
        assert_eq!(b.delta, 0);
    }

    #[test]
    fn braces_after_line_comment_do_not_count() {
        let b = line_braces("  x: 1, // { ignored");
        assert_eq!(b.delta, 0);
        // A comment introducer inside a string is content, not a comment.
        let b = line_braces("  url: 'https://example.com/{id}',");
        assert_eq!(b.delta, 0);
    }

    #[test]
    fn code_span_stops_at_unquoted_comment() {
        assert_eq!(code_span("  x: 1, // note"), "  x: 1, ");
        assert_eq!(code_span("  url: 'https://a/b',"), "  url: 'https://a/b',");
        assert_eq!(code_span("plain"), "plain");
    }

    #[test]
    fn open_brace_suffix_skips_quoted_braces() {
        assert_eq!(open_brace_suffix("  profile: {"), Some(""));
        assert_eq!(open_brace_suffix("  profile: { // note"), Some(" "));
        assert_eq!(open_brace_suffix("  profile: { a: 1,"), Some(" a: 1,"));
        assert_eq!(open_brace_suffix("  note: '{x}'"), None);
    }

    #[test]
    fn scans_a_single_block() {
        let src = "before\n  profile: {\n    a: 1,\n    b: 2\n  },\nafter";
        let lines = lines(src);
        let blocks = scan(&lines, "profile: {").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start, 1);
        assert_eq!(blocks[0].end, 4);
        assert_eq!(blocks[0].ordinal, 1);
    }

    #[test]
    fn nested_braces_do_not_close_the_block() {
        let src = "\
  profile: {
    inner: {
      a: 1
    },
    list: [
      { b: 2 },
    ],
    c: 3
  },";
        let lines = lines(src);
        let blocks = scan(&lines, "profile: {").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks[0].end, 8);
    }

    #[test]
    fn yields_blocks_in_document_order_with_ordinals() {
        let src = "\
  {
    a: 1
  },
  {
    b: 2
  },";
        let lines = lines(src);
        let blocks = scan(&lines, "{").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].ordinal, 1);
        assert_eq!(blocks[1].ordinal, 2);
        assert_eq!(blocks[1].start, 3);
        assert_eq!(blocks[1].end, 5);
    }

    #[test]
    fn single_line_block_is_yielded() {
        let src = "  profile: { a: 1 },\nnext";
        let lines = lines(src);
        let blocks = scan(&lines, "profile: {").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks[0].end, 0);
    }

    #[test]
    fn marker_inside_a_string_does_not_open_a_block() {
        let src = "  note: 'profile: { not real',\n  x: 1";
        let lines = lines(src);
        let blocks = scan(&lines, "profile: {").unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn unterminated_block_is_a_structural_error() {
        let src = "  profile: {\n    a: 1,";
        let lines = lines(src);
        let err = scan(&lines, "profile: {").unwrap_err();
        match err {
            MendError::Structural { line, .. } => assert_eq!(line, 1),
            other => panic!("expected structural error, got {other}"),
        }
    }

    #[test]
    fn excess_closers_inside_a_block_are_a_structural_error() {
        let src = "  profile: {\n    }}\n  },";
        let lines = lines(src);
        let err = scan(&lines, "profile: {").unwrap_err();
        match err {
            MendError::Structural { line, .. } => assert_eq!(line, 2),
            other => panic!("expected structural error, got {other}"),
        }
    }

    #[test]
    fn iterator_is_fused_after_an_error() {
        let src = "  profile: {\n    a: 1,";
        let lines = lines(src);
        let mut blocks = Blocks::new(&lines, "profile: {");
        assert!(matches!(blocks.next(), Some(Err(_))));
        assert!(blocks.next().is_none());
    }

    #[test]
    fn scanner_is_restartable() {
        let src = "  profile: {\n    a: 1\n  },";
        let lines = lines(src);
        let first = scan(&lines, "profile: {").unwrap();
        let second = scan(&lines, "profile: {").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn depth_map_marks_top_level_lines() {
        let src = "\
  profile: {
    a: 1,
    inner: {
      deep: 2
    },
    b: 3
  },";
        let lines = lines(src);
        let block = scan(&lines, "profile: {").unwrap()[0];
        let depths = depth_map(&lines, block).unwrap();
        assert_eq!(depths, vec![0, 1, 1, 2, 2, 1, 1]);
    }

    #[test]
    fn depth_map_rejects_unbalanced_ranges() {
        let lines = vec!["  profile: {", "    a: 1,"];
        let block = Block {
            start: 0,
            end: 1,
            ordinal: 1,
        };
        assert!(depth_map(&lines, block).is_err());
    }
}
