//! Pass configuration: which blocks to scan and how to mend them.
//!
//! A pass names a block-open marker, the keys eligible for dedup, and the
//! required keys with their anchors and defaults. Passes come from three
//! places: the built-in profiles, a JSON config file, or `--profile`
//! selections on the command line.

use std::fs;
use std::path::Path;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::{MendError, Result};

// ── Types ────────────────────────────────────────────────────────────────

/// Which side of the anchor key a missing key is inserted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorSide {
    Before,
    #[default]
    After,
}

/// Per-block default override, keyed on the value of a sibling key.
///
/// When the block's `match_key` has value `equals`, the required key's
/// default is replaced with `value`. First matching override wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueOverride {
    pub match_key: String,
    pub equals: String,
    pub value: String,
}

/// A key every matched block must contain, with its insertion recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredKey {
    pub name: String,
    pub default_value: String,
    pub anchor: String,
    #[serde(default)]
    pub side: AnchorSide,
    /// Fixed indentation for the inserted line. When absent, indentation
    /// is copied from the anchor line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<ValueOverride>,
}

/// One repair pass: marker plus dedup and required-key rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassConfig {
    pub name: String,
    pub marker: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicate_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_keys: Vec<RequiredKey>,
}

/// Top-level shape of a JSON config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MendConfig {
    pub passes: Vec<PassConfig>,
}

impl PassConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MendError::invalid_config("pass name cannot be empty"));
        }
        if self.marker.is_empty() {
            return Err(MendError::invalid_config(format!(
                "pass '{}' has an empty marker",
                self.name
            )));
        }
        if self.duplicate_keys.is_empty() && self.required_keys.is_empty() {
            return Err(MendError::invalid_config(format!(
                "pass '{}' has no duplicate_keys and no required_keys",
                self.name
            )));
        }
        let mut seen = Vec::new();
        for required in &self.required_keys {
            if required.name.trim().is_empty() {
                return Err(MendError::invalid_config(format!(
                    "pass '{}' has a required key with an empty name",
                    self.name
                )));
            }
            if required.default_value.is_empty() {
                return Err(MendError::invalid_config(format!(
                    "pass '{}': required key '{}' has an empty default value",
                    self.name, required.name
                )));
            }
            if required.anchor.trim().is_empty() {
                return Err(MendError::invalid_config(format!(
                    "pass '{}': required key '{}' has an empty anchor",
                    self.name, required.name
                )));
            }
            if required.anchor == required.name {
                return Err(MendError::invalid_config(format!(
                    "pass '{}': required key '{}' anchors to itself",
                    self.name, required.name
                )));
            }
            if seen.contains(&required.name.as_str()) {
                return Err(MendError::invalid_config(format!(
                    "pass '{}' lists required key '{}' twice",
                    self.name, required.name
                )));
            }
            seen.push(required.name.as_str());
        }
        Ok(())
    }
}

// ── Built-in profiles ────────────────────────────────────────────────────

/// Position-specific defaults for the `profile-fields` profile:
/// (position value, experience level, country).
const POSITION_DEFAULTS: &[(&str, &str, &str)] = &[
    ("Senior Robotics Engineer", "12 years", "India"),
    ("Research Scientist", "8 years", "South Korea"),
    ("Senior Full Stack Developer", "10 years", "Brazil"),
    ("Blockchain Developer", "5 years", "Ukraine"),
    ("Postdoctoral Researcher", "2 years", "Germany"),
    ("Senior Research Scientist", "10 years", "India"),
    ("Principal Scientist", "15 years", "UK"),
    ("Senior Marine Researcher", "12 years", "Australia"),
    ("Senior Formulation Scientist", "8 years", "India"),
    ("Chief Compliance Architect", "12 years", "Canada"),
    ("Senior Product Manager", "10 years", "China"),
    ("Senior Quant", "7 years", "Russia"),
    ("Payment Systems Architect", "9 years", "India"),
    ("Principal Data Scientist", "10 years", "Canada"),
    ("Computational Biology Director", "12 years", "China"),
    ("Accessibility Technology Lead", "8 years", "Brazil"),
];

fn position_override(position: &str, value: &str) -> ValueOverride {
    ValueOverride {
        match_key: "position".to_string(),
        equals: position.to_string(),
        value: value.to_string(),
    }
}

fn outcome_dedup() -> PassConfig {
    PassConfig {
        name: "outcome-dedup".to_string(),
        marker: "{".to_string(),
        duplicate_keys: vec!["outcome".to_string()],
        required_keys: Vec::new(),
    }
}

fn profile_fields() -> PassConfig {
    PassConfig {
        name: "profile-fields".to_string(),
        marker: "profile: {".to_string(),
        duplicate_keys: Vec::new(),
        required_keys: vec![
            RequiredKey {
                name: "experienceLevel".to_string(),
                default_value: "5 years".to_string(),
                anchor: "education".to_string(),
                side: AnchorSide::Before,
                indent: None,
                overrides: POSITION_DEFAULTS
                    .iter()
                    .map(|&(position, years, _)| position_override(position, years))
                    .collect(),
            },
            RequiredKey {
                name: "country".to_string(),
                default_value: "India".to_string(),
                anchor: "education".to_string(),
                side: AnchorSide::After,
                indent: None,
                overrides: POSITION_DEFAULTS
                    .iter()
                    .map(|&(position, _, country)| position_override(position, country))
                    .collect(),
            },
        ],
    }
}

/// Built-in profiles, in the order a default run applies them.
#[must_use]
pub fn builtin_profiles() -> Vec<PassConfig> {
    vec![outcome_dedup(), profile_fields()]
}

pub fn find_profile(name: &str) -> Result<PassConfig> {
    builtin_profiles()
        .into_iter()
        .find(|profile| profile.name == name)
        .ok_or_else(|| MendError::UnknownProfile {
            name: name.to_string(),
        })
}

pub fn print_profiles() {
    for profile in builtin_profiles() {
        let mut actions = Vec::new();
        if !profile.duplicate_keys.is_empty() {
            actions.push(format!("dedup {}", profile.duplicate_keys.join(", ")));
        }
        if !profile.required_keys.is_empty() {
            let names: Vec<&str> = profile
                .required_keys
                .iter()
                .map(|required| required.name.as_str())
                .collect();
            actions.push(format!("require {}", names.join(", ")));
        }
        println!(
            "{:<16} marker {:?}  {}",
            profile.name,
            profile.marker,
            actions.join("; ")
        );
    }
}

// ── Loading and resolution ───────────────────────────────────────────────

pub fn load_config(path: &Path) -> Result<Vec<PassConfig>> {
    let text = fs::read_to_string(path)?;
    let config: MendConfig = serde_json::from_str(&text)?;
    if config.passes.is_empty() {
        return Err(MendError::invalid_config(format!(
            "{} declares no passes",
            path.display()
        )));
    }
    for pass in &config.passes {
        pass.validate()?;
    }
    Ok(config.passes)
}

/// Resolve the pass list for one run: config file if given, otherwise the
/// named built-in profiles, otherwise every built-in profile.
pub fn resolve_passes(config: Option<&Path>, profiles: &[String]) -> Result<Vec<PassConfig>> {
    if let Some(path) = config {
        return load_config(path);
    }
    if profiles.is_empty() {
        return Ok(builtin_profiles());
    }
    profiles.iter().map(|name| find_profile(name)).collect()
}

// ── show-config command ──────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct ShowConfigArgs {
    /// JSON config file to resolve instead of the built-in profiles.
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Built-in profile name; repeatable.
    #[arg(long = "profile", conflicts_with = "config")]
    pub profiles: Vec<String>,
}

pub fn run_show_config(args: ShowConfigArgs) -> Result<()> {
    let passes = resolve_passes(args.config.as_deref(), &args.profiles)?;
    let config = MendConfig { passes };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
