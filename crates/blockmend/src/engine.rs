//! Repair engine: runs scan → classify → rewrite across all passes.
//!
//! The whole file is read once, every pass's plans are computed against
//! the current in-memory lines before any of them is applied, and the
//! file is written back once at the very end, and only when something
//! changed. A structural error anywhere aborts the run before that final
//! write, so a failed run never leaves a half-corrected file behind.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use tracing::{debug, info};

use crate::classifier::{CorrectionPlan, classify};
use crate::config::{PassConfig, resolve_passes};
use crate::error::{MendError, Result};
use crate::report::{PassSummary, RepairReport, plan_records};
use crate::rewriter::rewrite;
use crate::scanner::Blocks;
use crate::util::{now_utc_iso, sha256_hex};

/// Whether a run may write the file back or only report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Fix,
    Check,
}

impl RunMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fix => "fix",
            Self::Check => "check",
        }
    }
}

/// Result of one engine run: the corrected content (when anything
/// changed) and the full report.
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub content: Option<String>,
    pub report: RepairReport,
}

/// Repair `content` in memory, applying `passes` in order. Each pass sees
/// the lines as corrected by the passes before it.
pub fn repair_content(content: &str, passes: &[PassConfig], mode: RunMode) -> Result<EngineOutcome> {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    let mut summaries = Vec::with_capacity(passes.len());
    let mut corrections = Vec::new();
    let mut changed = false;

    for pass in passes {
        pass.validate()?;
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let mut blocks_scanned = 0;
        let mut plans: Vec<CorrectionPlan> = Vec::new();
        for block in Blocks::new(&refs, &pass.marker) {
            let block = block?;
            blocks_scanned += 1;
            let plan = classify(&refs, block, pass)?;
            if !plan.is_empty() {
                plans.push(plan);
            }
        }

        let before = corrections.len();
        let mut next: Vec<String> = Vec::with_capacity(lines.len());
        let mut cursor = 0;
        for plan in &plans {
            next.extend(refs[cursor..plan.block.start].iter().map(|s| s.to_string()));
            let outcome = rewrite(&refs, plan);
            corrections.extend(plan_records(&pass.name, &refs, plan, &outcome.amended));
            next.extend(outcome.lines);
            cursor = plan.block.end + 1;
        }
        next.extend(refs[cursor..].iter().map(|s| s.to_string()));

        debug!(
            pass = %pass.name,
            blocks = blocks_scanned,
            corrected = plans.len(),
            corrections = corrections.len() - before,
            "pass complete"
        );
        summaries.push(PassSummary {
            pass: pass.name.clone(),
            blocks_scanned,
            blocks_corrected: plans.len(),
            corrections: corrections.len() - before,
        });

        if !plans.is_empty() {
            changed = true;
            lines = next;
        }
    }

    let output = if changed { Some(lines.join("\n")) } else { None };
    let report = RepairReport {
        path: String::new(),
        generated_at: now_utc_iso(),
        mode: mode.as_str().to_string(),
        passes: summaries,
        corrections,
        rewritten: false,
        input_sha256: sha256_hex(content),
        output_sha256: sha256_hex(output.as_deref().unwrap_or(content)),
    };

    Ok(EngineOutcome {
        content: output,
        report,
    })
}

/// Repair one file on disk. In `Fix` mode the corrected content is
/// written back in place; `Check` never writes.
pub fn repair_file(path: &Path, passes: &[PassConfig], mode: RunMode) -> Result<EngineOutcome> {
    let content = fs::read_to_string(path)?;
    let mut outcome = repair_content(&content, passes, mode)?;
    outcome.report.path = path.display().to_string();

    if mode == RunMode::Fix {
        if let Some(corrected) = &outcome.content {
            fs::write(path, corrected)?;
            outcome.report.rewritten = true;
            info!(
                path = %path.display(),
                corrections = outcome.report.corrections.len(),
                "rewrote file"
            );
        }
    }
    Ok(outcome)
}

// ── fix / check commands ─────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct FixArgs {
    /// File to repair in place.
    pub file: PathBuf,

    /// JSON config file declaring the passes to run.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Built-in profile name; repeatable. Defaults to all profiles.
    #[arg(long = "profile", conflicts_with = "config")]
    pub profiles: Vec<String>,

    /// Emit the run report as JSON instead of plain text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// File to inspect. Never written.
    pub file: PathBuf,

    /// JSON config file declaring the passes to run.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Built-in profile name; repeatable. Defaults to all profiles.
    #[arg(long = "profile", conflicts_with = "config")]
    pub profiles: Vec<String>,

    /// Emit the run report as JSON instead of plain text.
    #[arg(long)]
    pub json: bool,
}

fn emit_report(report: &RepairReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.human_summary());
    }
    Ok(())
}

pub fn run_fix(args: FixArgs) -> Result<()> {
    let passes = resolve_passes(args.config.as_deref(), &args.profiles)?;
    let outcome = repair_file(&args.file, &passes, RunMode::Fix)?;
    emit_report(&outcome.report, args.json)
}

/// Like `fix` but read-only: exits nonzero when corrections are pending,
/// so the command slots into CI the way a linter does.
pub fn run_check(args: CheckArgs) -> Result<()> {
    let passes = resolve_passes(args.config.as_deref(), &args.profiles)?;
    let outcome = repair_file(&args.file, &passes, RunMode::Check)?;
    emit_report(&outcome.report, args.json)?;

    let pending = outcome.report.corrections.len();
    if pending > 0 {
        return Err(MendError::RepairsPending { pending });
    }
    Ok(())
}
