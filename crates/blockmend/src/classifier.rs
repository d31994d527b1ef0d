//! Key classifier: turns one scanned block into a correction plan.
//!
//! Classification is read-only. The plan lists line drops for duplicate
//! keys and anchored inserts for missing required keys, all expressed
//! against the original line indices; nothing is mutated here, which keeps
//! index arithmetic honest when the rewriter later applies the plan.

use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::warn;

use crate::config::{AnchorSide, PassConfig, RequiredKey};
use crate::error::Result;
use crate::scanner::{Block, code_span, depth_map, line_braces, open_brace_suffix};

/// Nesting depth beyond which a key match is treated as noise. Record
/// content in practice sits at depth 1 with sub-objects one or two levels
/// deeper; anything this deep is almost certainly unrelated structure.
const SUSPICIOUS_DEPTH: usize = 6;

// ── Plan types ───────────────────────────────────────────────────────────

/// A key token found inside a block, with its line and relative depth.
/// Depth 1 is the block's own top level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOccurrence {
    pub key: String,
    pub line: usize,
    pub depth: usize,
}

/// Drop one duplicate key line, keeping the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropLine {
    pub line: usize,
    pub key: String,
    pub kept_line: usize,
}

/// Insert a missing required key before the given line index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertLine {
    pub before: usize,
    pub key: String,
    pub value: String,
    /// Fixed indentation from the configuration; `None` derives it from
    /// the anchor line.
    pub indent: Option<String>,
    /// Resolved anchor key line; `None` means the anchor was missing and
    /// the insert fell back to the end of the block.
    pub anchor: Option<usize>,
    pub degraded: bool,
}

/// All corrections for one block, computed before any text changes.
///
/// Drops are in increasing line order; inserts follow the required-key
/// configuration order. An empty plan means the block is already
/// well-formed for this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionPlan {
    pub block: Block,
    pub drops: Vec<DropLine>,
    pub inserts: Vec<InsertLine>,
}

impl CorrectionPlan {
    fn untouched(block: Block) -> Self {
        Self {
            block,
            drops: Vec::new(),
            inserts: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drops.is_empty() && self.inserts.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.drops.len() + self.inserts.len()
    }
}

// ── Key and value extraction ─────────────────────────────────────────────

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_$][A-Za-z0-9_$]*)\s*:").expect("key regex"))
}

/// Key token at the start of a line, if the line is a key line.
pub(crate) fn key_of(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    key_regex()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Scalar value text of a key line: the part after the colon with the
/// trailing separator and matching quotes stripped.
pub(crate) fn value_of(line: &str) -> Option<&str> {
    let code = code_span(line);
    let colon = code.find(':')?;
    let mut value = code[colon + 1..].trim();
    value = value
        .trim_end_matches(',')
        .trim_end_matches(';')
        .trim_end();
    for quote in ['\'', '"', '`'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return Some(&value[1..value.len() - 1]);
        }
    }
    Some(value)
}

// ── Classification ───────────────────────────────────────────────────────

/// Collect every key occurrence strictly inside `block`, tagged with its
/// depth relative to the block start.
pub fn key_occurrences(lines: &[&str], block: Block) -> Result<Vec<KeyOccurrence>> {
    let depths = depth_map(lines, block)?;
    let mut occurrences = Vec::new();
    for index in block.start + 1..block.end {
        if let Some(key) = key_of(lines[index]) {
            occurrences.push(KeyOccurrence {
                key: key.to_string(),
                line: index,
                depth: depths[index - block.start],
            });
        }
    }
    Ok(occurrences)
}

fn relevant_keys(pass: &PassConfig) -> Vec<&str> {
    let mut keys: Vec<&str> = pass
        .duplicate_keys
        .iter()
        .map(String::as_str)
        .collect();
    for required in &pass.required_keys {
        keys.push(required.name.as_str());
    }
    keys
}

/// Default value for a missing key, after consulting the pass overrides
/// against the block's own sibling values.
fn resolve_value<'a>(
    required: &'a RequiredKey,
    lines: &[&str],
    top_level: &[&KeyOccurrence],
) -> &'a str {
    for over in &required.overrides {
        let sibling = top_level
            .iter()
            .find(|occurrence| occurrence.key == over.match_key);
        if let Some(occurrence) = sibling {
            if value_of(lines[occurrence.line]) == Some(over.equals.as_str()) {
                return &over.value;
            }
        }
    }
    &required.default_value
}

/// Compute the correction plan for one block under one pass.
///
/// Blocks the line-granular model cannot edit safely (single-line blocks,
/// opener lines carrying content after the brace, lines that close and
/// reopen the record mid-line) are classified as untouchable: a warning
/// is logged and an empty plan returned, so the text passes through
/// byte-identical.
pub fn classify(lines: &[&str], block: Block, pass: &PassConfig) -> Result<CorrectionPlan> {
    if block.start == block.end {
        warn!(
            block = block.ordinal,
            line = block.start + 1,
            "single-line block; leaving untouched"
        );
        return Ok(CorrectionPlan::untouched(block));
    }
    let opener_tail = open_brace_suffix(lines[block.start]).unwrap_or("");
    if !opener_tail.trim().is_empty() {
        warn!(
            block = block.ordinal,
            line = block.start + 1,
            "content after opening brace; leaving block untouched"
        );
        return Ok(CorrectionPlan::untouched(block));
    }
    if !lines[block.end].trim_start().starts_with(['}', ']']) {
        warn!(
            block = block.ordinal,
            line = block.end + 1,
            "content before closing brace; leaving block untouched"
        );
        return Ok(CorrectionPlan::untouched(block));
    }

    let depths = depth_map(lines, block)?;

    // A `}, {` separator has net depth zero, so the scanner sees the
    // records around it as one region. Editing that region would dedup
    // across records or drop structural braces.
    for index in block.start + 1..block.end {
        if depths[index - block.start] as i32 + line_braces(lines[index]).min_run == 0 {
            warn!(
                block = block.ordinal,
                line = index + 1,
                "record closes and reopens mid-line; leaving block untouched"
            );
            return Ok(CorrectionPlan::untouched(block));
        }
    }

    let occurrences = key_occurrences(lines, block)?;

    let watched = relevant_keys(pass);
    for occurrence in &occurrences {
        if occurrence.depth >= SUSPICIOUS_DEPTH && watched.contains(&occurrence.key.as_str()) {
            warn!(
                block = block.ordinal,
                line = occurrence.line + 1,
                key = %occurrence.key,
                depth = occurrence.depth,
                "key match at suspicious depth; not treated as a top-level key"
            );
        }
    }

    let top_level: Vec<&KeyOccurrence> = occurrences
        .iter()
        .filter(|occurrence| occurrence.depth == 1)
        .collect();

    let mut drops = Vec::new();
    for key in &pass.duplicate_keys {
        let mut found: Vec<&&KeyOccurrence> = top_level
            .iter()
            .filter(|occurrence| occurrence.key == *key)
            .collect();
        if found.len() < 2 {
            continue;
        }
        let kept = found.remove(0);
        for extra in found {
            if line_braces(lines[extra.line]).delta != 0 {
                warn!(
                    block = block.ordinal,
                    line = extra.line + 1,
                    key = %key,
                    "duplicate key opens a nested value; left in place"
                );
                continue;
            }
            drops.push(DropLine {
                line: extra.line,
                key: key.clone(),
                kept_line: kept.line,
            });
        }
    }
    drops.sort_unstable_by_key(|drop| drop.line);

    let mut inserts = Vec::new();
    for required in &pass.required_keys {
        if top_level
            .iter()
            .any(|occurrence| occurrence.key == required.name)
        {
            continue;
        }
        let value = resolve_value(required, lines, &top_level).to_string();
        let anchor = top_level
            .iter()
            .find(|occurrence| occurrence.key == required.anchor);
        match anchor {
            Some(occurrence) => {
                let before = match required.side {
                    AnchorSide::Before => occurrence.line,
                    AnchorSide::After => {
                        // Skip past the anchor's value span so multi-line
                        // values stay intact.
                        (occurrence.line + 1..=block.end)
                            .find(|&index| depths[index - block.start] == 1)
                            .unwrap_or(block.end)
                    }
                };
                inserts.push(InsertLine {
                    before,
                    key: required.name.clone(),
                    value,
                    indent: required.indent.clone(),
                    anchor: Some(occurrence.line),
                    degraded: false,
                });
            }
            None => {
                warn!(
                    block = block.ordinal,
                    key = %required.name,
                    anchor = %required.anchor,
                    "anchor key missing; inserting at end of block"
                );
                inserts.push(InsertLine {
                    before: block.end,
                    key: required.name.clone(),
                    value,
                    indent: required.indent.clone(),
                    anchor: None,
                    degraded: true,
                });
            }
        }
    }

    Ok(CorrectionPlan {
        block,
        drops,
        inserts,
    })
}
