//! Run report: every correction the engine made, plus file digests.
//!
//! The report is the only user-visible account of a run. Each changed
//! line maps to exactly one record, so a reader can reconcile the diff
//! of the rewritten file against the report line by line.

use serde::Serialize;

use crate::classifier::{CorrectionPlan, key_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionOp {
    DropLine,
    InsertLine,
    AmendComma,
}

impl CorrectionOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DropLine => "drop_line",
            Self::InsertLine => "insert_line",
            Self::AmendComma => "amend_comma",
        }
    }
}

/// One applied correction. `line` and `block_lines` are 1-based in the
/// pre-correction file.
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionRecord {
    pub pass: String,
    pub block: usize,
    pub block_lines: (usize, usize),
    pub line: usize,
    pub op: CorrectionOp,
    pub key: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted_text: Option<String>,
    pub degraded: bool,
}

/// Per-pass totals.
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub pass: String,
    pub blocks_scanned: usize,
    pub blocks_corrected: usize,
    pub corrections: usize,
}

/// Full account of one run over one file.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub path: String,
    pub generated_at: String,
    pub mode: String,
    pub passes: Vec<PassSummary>,
    pub corrections: Vec<CorrectionRecord>,
    pub rewritten: bool,
    pub input_sha256: String,
    pub output_sha256: String,
}

impl RepairReport {
    /// Plain-text rendering for the default (non `--json`) output.
    #[must_use]
    pub fn human_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("blockmend {} {}\n", self.mode, self.path));
        for pass in &self.passes {
            out.push_str(&format!(
                "  pass {}: {} block(s) scanned, {} corrected, {} correction(s)\n",
                pass.pass, pass.blocks_scanned, pass.blocks_corrected, pass.corrections
            ));
            for record in self
                .corrections
                .iter()
                .filter(|record| record.pass == pass.pass)
            {
                let flag = if record.degraded { " [degraded]" } else { "" };
                out.push_str(&format!(
                    "    block {} line {}: {} {} ({}){}\n",
                    record.block,
                    record.line,
                    record.op.as_str(),
                    record.key,
                    record.detail,
                    flag
                ));
            }
        }
        if self.corrections.is_empty() {
            out.push_str("  no corrections needed; file left untouched\n");
        } else if self.rewritten {
            out.push_str(&format!(
                "  rewrote file (sha256 {} -> {})\n",
                &self.input_sha256[..12.min(self.input_sha256.len())],
                &self.output_sha256[..12.min(self.output_sha256.len())]
            ));
        } else {
            out.push_str(&format!(
                "  {} correction(s) pending; file not written\n",
                self.corrections.len()
            ));
        }
        out
    }
}

/// Expand one block's plan, plus the comma amendments its rewrite made,
/// into correction records.
#[must_use]
pub fn plan_records(
    pass: &str,
    lines: &[&str],
    plan: &CorrectionPlan,
    amended: &[usize],
) -> Vec<CorrectionRecord> {
    let block = plan.block;
    let mut records = Vec::with_capacity(plan.len() + amended.len());

    for drop in &plan.drops {
        records.push(CorrectionRecord {
            pass: pass.to_string(),
            block: block.ordinal,
            block_lines: block.lines_1based(),
            line: drop.line + 1,
            op: CorrectionOp::DropLine,
            key: drop.key.clone(),
            detail: format!("kept first occurrence at line {}", drop.kept_line + 1),
            dropped_text: Some(lines[drop.line].trim().to_string()),
            inserted_text: None,
            degraded: false,
        });
    }

    for insert in &plan.inserts {
        let detail = match insert.anchor {
            Some(anchor) => format!("anchored to line {}", anchor + 1),
            None => "anchor missing; placed at end of block".to_string(),
        };
        records.push(CorrectionRecord {
            pass: pass.to_string(),
            block: block.ordinal,
            block_lines: block.lines_1based(),
            line: insert.before + 1,
            op: CorrectionOp::InsertLine,
            key: insert.key.clone(),
            detail,
            dropped_text: None,
            inserted_text: Some(insert.value.clone()),
            degraded: insert.degraded,
        });
    }

    for &index in amended {
        records.push(CorrectionRecord {
            pass: pass.to_string(),
            block: block.ordinal,
            block_lines: block.lines_1based(),
            line: index + 1,
            op: CorrectionOp::AmendComma,
            key: key_of(lines[index]).unwrap_or_default().to_string(),
            detail: "separator comma ahead of an inserted key".to_string(),
            dropped_text: None,
            inserted_text: None,
            degraded: false,
        });
    }

    records
}
