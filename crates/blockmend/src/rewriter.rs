//! Block rewriter: applies a correction plan to a block's lines.
//!
//! Pure transform. Drops are applied by omission, inserts are rendered
//! with indentation, quote style, and trailing commas taken from the
//! surrounding block rather than hardcoded, and a sibling line gains a
//! comma only when an insert after it would otherwise break the literal
//! syntax. The caller splices the returned lines back into the file.

use std::collections::{BTreeMap, BTreeSet};

use crate::classifier::{CorrectionPlan, InsertLine, key_of};
use crate::scanner::{Block, code_span};

/// Result of applying one plan to one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// The corrected block lines, `start..=end` replaced wholesale.
    pub lines: Vec<String>,
    /// Absolute indices of pre-existing lines that gained a trailing comma.
    pub amended: Vec<usize>,
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Quote character used on a sample line, defaulting to single quotes.
fn quote_style(sample: Option<&str>) -> char {
    let Some(line) = sample else {
        return '\'';
    };
    code_span(line)
        .chars()
        .find(|ch| matches!(ch, '\'' | '"' | '`'))
        .unwrap_or('\'')
}

/// Append a comma after the last code character, keeping comments and
/// line endings in place.
fn append_comma(line: &str) -> String {
    let insert_at = code_span(line).trim_end().len();
    let mut out = String::with_capacity(line.len() + 1);
    out.push_str(&line[..insert_at]);
    out.push(',');
    out.push_str(&line[insert_at..]);
    out
}

/// Whether the surviving last value line of the block carries a trailing
/// comma. Decides the comma on an insert that ends up last.
fn trailing_comma_convention(lines: &[&str], block: Block, dropped: &BTreeSet<usize>) -> bool {
    for index in (block.start + 1..block.end).rev() {
        if dropped.contains(&index) {
            continue;
        }
        let code = code_span(lines[index]).trim_end();
        if code.trim_start().is_empty() {
            continue;
        }
        return code.ends_with(',');
    }
    false
}

fn first_key_line(lines: &[&str], block: Block, dropped: &BTreeSet<usize>) -> Option<usize> {
    (block.start + 1..block.end)
        .find(|&index| !dropped.contains(&index) && key_of(lines[index]).is_some())
}

/// Whether any code-bearing content follows the `position`th insert.
fn insert_has_successor(
    plan: &CorrectionPlan,
    position: usize,
    lines: &[&str],
    dropped: &BTreeSet<usize>,
) -> bool {
    let insert = &plan.inserts[position];
    let original_follows = (insert.before..plan.block.end)
        .any(|index| !dropped.contains(&index) && !code_span(lines[index]).trim().is_empty());
    if original_follows {
        return true;
    }
    plan.inserts.iter().enumerate().any(|(other, candidate)| {
        candidate.before > insert.before || (candidate.before == insert.before && other > position)
    })
}

fn render_insert(
    insert: &InsertLine,
    lines: &[&str],
    block: Block,
    dropped: &BTreeSet<usize>,
    with_comma: bool,
    crlf: bool,
) -> String {
    let sample = insert
        .anchor
        .or_else(|| first_key_line(lines, block, dropped))
        .map(|index| lines[index]);
    let indent = match insert.indent.as_deref() {
        Some(fixed) => fixed.to_string(),
        None => match sample {
            Some(line) => leading_whitespace(line).trim_end_matches('\r').to_string(),
            None => format!("{}  ", leading_whitespace(lines[block.start])),
        },
    };
    let quote = quote_style(sample);
    let value = insert.value.replace(quote, &format!("\\{quote}"));

    let mut text = format!("{indent}{}: {quote}{value}{quote}", insert.key);
    if with_comma {
        text.push(',');
    }
    if crlf {
        text.push('\r');
    }
    text
}

/// Apply `plan` to the block's lines, returning the corrected sequence.
///
/// Output length is input length minus drops plus inserts. Lines not
/// named by the plan are passed through byte-identical, except for a
/// sibling that must gain a separator comma ahead of an insert.
#[must_use]
pub fn rewrite(lines: &[&str], plan: &CorrectionPlan) -> RewriteOutcome {
    let block = plan.block;
    if plan.is_empty() {
        return RewriteOutcome {
            lines: (block.start..=block.end)
                .map(|index| lines[index].to_string())
                .collect(),
            amended: Vec::new(),
        };
    }

    let dropped: BTreeSet<usize> = plan.drops.iter().map(|d| d.line).collect();
    let convention = trailing_comma_convention(lines, block, &dropped);
    let crlf = lines[block.start].ends_with('\r');

    let mut rendered: Vec<(usize, String)> = Vec::with_capacity(plan.inserts.len());
    let mut amendments: BTreeMap<usize, String> = BTreeMap::new();

    for (position, insert) in plan.inserts.iter().enumerate() {
        let with_comma = insert_has_successor(plan, position, lines, &dropped) || convention;
        rendered.push((
            insert.before,
            render_insert(insert, lines, block, &dropped, with_comma, crlf),
        ));

        // The nearest code line above the insert must carry a separator;
        // blank and comment-only lines never take one. Rendered inserts
        // above it already do.
        if rendered
            .iter()
            .take(position)
            .any(|(before, _)| *before == insert.before)
        {
            continue;
        }
        let predecessor = (block.start + 1..insert.before)
            .rev()
            .find(|index| !dropped.contains(index) && !code_span(lines[*index]).trim().is_empty());
        if let Some(index) = predecessor {
            let code = code_span(lines[index]).trim_end();
            if !code.ends_with([',', '{', '[']) {
                amendments.insert(index, append_comma(lines[index]));
            }
        }
    }

    let mut out = Vec::with_capacity(block.line_count() + plan.inserts.len());
    for index in block.start..=block.end {
        for (before, text) in &rendered {
            if *before == index {
                out.push(text.clone());
            }
        }
        if dropped.contains(&index) {
            continue;
        }
        match amendments.get(&index) {
            Some(text) => out.push(text.clone()),
            None => out.push(lines[index].to_string()),
        }
    }

    RewriteOutcome {
        lines: out,
        amended: amendments.into_keys().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::config::{AnchorSide, PassConfig, RequiredKey};
    use crate::scanner::scan;

    fn lines(src: &str) -> Vec<&str> {
        src.split('\n').collect()
    }

    fn pass(duplicates: &[&str], required: Vec<RequiredKey>) -> PassConfig {
        PassConfig {
            name: "test".to_string(),
            marker: "{".to_string(),
            duplicate_keys: duplicates.iter().map(|k| (*k).to_string()).collect(),
            required_keys: required,
        }
    }

    fn required(name: &str, value: &str, anchor: &str, side: AnchorSide) -> RequiredKey {
        RequiredKey {
            name: name.to_string(),
            default_value: value.to_string(),
            anchor: anchor.to_string(),
            side,
            indent: None,
            overrides: Vec::new(),
        }
    }

    fn apply(src: &str, pass: &PassConfig) -> RewriteOutcome {
        let lines = lines(src);
        let block = scan(&lines, &pass.marker).unwrap()[0];
        let plan = classify(&lines, block, pass).unwrap();
        rewrite(&lines, &plan)
    }

    #[test]
    fn drops_duplicates_by_omission() {
        let outcome = apply(
            "  {
    outcome: 'A',
    outcome: 'B',
    keySuccess: 'yes'
  },",
            &pass(&["outcome"], Vec::new()),
        );

        assert_eq!(
            outcome.lines,
            vec![
                "  {",
                "    outcome: 'A',",
                "    keySuccess: 'yes'",
                "  },",
            ]
        );
        assert!(outcome.amended.is_empty());
    }

    #[test]
    fn inserts_missing_keys_and_amends_the_anchor_comma() {
        let mut pass = pass(
            &[],
            vec![
                required("experienceLevel", "5 years", "education", AnchorSide::Before),
                required("country", "India", "education", AnchorSide::After),
            ],
        );
        pass.marker = "profile: {".to_string();

        let outcome = apply(
            "    profile: {
      position: 'Research Scientist',
      company: 'X',
      education: 'PhD'
    },",
            &pass,
        );

        assert_eq!(
            outcome.lines,
            vec![
                "    profile: {",
                "      position: 'Research Scientist',",
                "      company: 'X',",
                "      experienceLevel: '5 years',",
                "      education: 'PhD',",
                "      country: 'India'",
                "    },",
            ]
        );
        assert_eq!(outcome.amended, vec![3]);
    }

    #[test]
    fn last_insert_keeps_comma_when_block_convention_has_one() {
        let mut pass = pass(
            &[],
            vec![required("country", "India", "education", AnchorSide::After)],
        );
        pass.marker = "profile: {".to_string();

        let outcome = apply(
            "    profile: {
      position: 'X',
      education: 'PhD',
    },",
            &pass,
        );

        assert_eq!(
            outcome.lines,
            vec![
                "    profile: {",
                "      position: 'X',",
                "      education: 'PhD',",
                "      country: 'India',",
                "    },",
            ]
        );
        assert!(outcome.amended.is_empty());
    }

    #[test]
    fn fallback_insert_lands_before_the_closing_line() {
        let mut pass = pass(
            &[],
            vec![required("country", "India", "education", AnchorSide::After)],
        );
        pass.marker = "profile: {".to_string();

        let outcome = apply(
            "    profile: {
      position: 'X',
      company: 'Y'
    },",
            &pass,
        );

        assert_eq!(
            outcome.lines,
            vec![
                "    profile: {",
                "      position: 'X',",
                "      company: 'Y',",
                "      country: 'India'",
                "    },",
            ]
        );
        assert_eq!(outcome.amended, vec![2]);
    }

    #[test]
    fn comment_line_above_a_fallback_insert_is_not_amended() {
        let mut pass = pass(
            &[],
            vec![required("country", "India", "education", AnchorSide::After)],
        );
        pass.marker = "profile: {".to_string();

        let outcome = apply(
            "    profile: {
      position: 'X'
      // pending fields
    },",
            &pass,
        );

        assert_eq!(
            outcome.lines,
            vec![
                "    profile: {",
                "      position: 'X',",
                "      // pending fields",
                "      country: 'India'",
                "    },",
            ]
        );
        assert_eq!(outcome.amended, vec![1]);
    }

    #[test]
    fn trailing_comment_does_not_put_a_comma_on_the_insert() {
        let mut pass = pass(
            &[],
            vec![required("country", "India", "education", AnchorSide::After)],
        );
        pass.marker = "profile: {".to_string();

        let outcome = apply(
            "    profile: {
      position: 'X',
      education: 'PhD'
      // reviewed upstream
    },",
            &pass,
        );

        assert_eq!(
            outcome.lines,
            vec![
                "    profile: {",
                "      position: 'X',",
                "      education: 'PhD',",
                "      country: 'India'",
                "      // reviewed upstream",
                "    },",
            ]
        );
        assert_eq!(outcome.amended, vec![2]);
    }

    #[test]
    fn fixed_indent_override_is_used_verbatim() {
        let mut key = required("country", "India", "education", AnchorSide::After);
        key.indent = Some("        ".to_string());
        let mut pass = pass(&[], vec![key]);
        pass.marker = "profile: {".to_string();

        let outcome = apply(
            "\
    profile: {
      education: 'PhD'
    },",
            &pass,
        );

        assert_eq!(outcome.lines[2], "        country: 'India'");
    }

    #[test]
    fn insert_that_becomes_last_after_a_drop_follows_survivor_convention() {
        let outcome = apply(
            "  {
    outcome: 'A',
    outcome: 'B'
  },",
            &pass(
                &["outcome"],
                vec![required("keySuccess", "yes", "outcome", AnchorSide::After)],
            ),
        );

        assert_eq!(
            outcome.lines,
            vec![
                "  {",
                "    outcome: 'A',",
                "    keySuccess: 'yes',",
                "  },",
            ]
        );
    }

    #[test]
    fn quote_style_follows_the_anchor_line() {
        let mut pass = pass(
            &[],
            vec![required("country", "India", "education", AnchorSide::After)],
        );
        pass.marker = "profile: {".to_string();

        let outcome = apply(
            "\
    profile: {
      education: \"PhD\"
    },",
            &pass,
        );

        assert_eq!(outcome.lines[2], "      country: \"India\"");
    }

    #[test]
    fn crlf_blocks_get_crlf_inserts_and_amendments() {
        let mut pass = pass(
            &[],
            vec![required("country", "India", "education", AnchorSide::After)],
        );
        pass.marker = "profile: {".to_string();

        let outcome = apply(
            "    profile: {\r\n      education: 'PhD'\r\n    },\r",
            &pass,
        );

        assert_eq!(
            outcome.lines,
            vec![
                "    profile: {\r",
                "      education: 'PhD',\r",
                "      country: 'India'\r",
                "    },\r",
            ]
        );
        assert_eq!(outcome.amended, vec![1]);
    }

    #[test]
    fn line_count_identity_holds() {
        let src = "\
  {
    outcome: 'A',
    outcome: 'B',
    keySuccess: 'yes'
  },";
        let all = lines(src);
        let block = scan(&all, "{").unwrap()[0];
        let config = pass(
            &["outcome"],
            vec![required("country", "India", "keySuccess", AnchorSide::After)],
        );
        let plan = classify(&all, block, &config).unwrap();
        let outcome = rewrite(&all, &plan);

        assert_eq!(
            outcome.lines.len(),
            block.line_count() - plan.drops.len() + plan.inserts.len()
        );
    }

    #[test]
    fn empty_plan_passes_lines_through() {
        let src = "  {
    outcome: 'A'
  },";
        let all = lines(src);
        let block = scan(&all, "{").unwrap()[0];
        let plan = classify(&all, block, &pass(&["outcome"], Vec::new())).unwrap();
        let outcome = rewrite(&all, &plan);

        assert_eq!(outcome.lines, vec!["  {", "    outcome: 'A'", "  },"]);
        assert!(outcome.amended.is_empty());
    }
}
