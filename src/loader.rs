//! Custom rule discovery.
//!
//! Rule directories are walked once at startup; every `.yaml`/`.yml` file is
//! parsed as a [`PatternRuleSpec`]. Invalid files are skipped with a
//! diagnostic so one broken rule never blocks a run.

use std::path::Path;

use regex::Regex;
use walkdir::WalkDir;

use crate::config::{Diagnostic, DiagnosticKind};
use crate::rules::PatternRuleSpec;

fn is_rule_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn validate(spec: &PatternRuleSpec, origin: &Path) -> Result<(), String> {
    if spec.id.trim().is_empty() {
        return Err(format!("{}: rule id must not be empty", origin.display()));
    }
    if spec.kinds.is_empty() {
        return Err(format!(
            "{}: rule `{}` lists no node kinds",
            origin.display(),
            spec.id
        ));
    }
    if let Err(err) = Regex::new(&spec.pattern) {
        return Err(format!(
            "{}: rule `{}` has an invalid pattern: {err}",
            origin.display(),
            spec.id
        ));
    }
    Ok(())
}

/// Walk the configured rule directories and collect every valid rule spec.
///
/// Files are visited in sorted order so discovery is deterministic across
/// runs and platforms. Unreadable or malformed files become diagnostics.
pub fn discover_rules(paths: &[impl AsRef<Path>]) -> (Vec<PatternRuleSpec>, Vec<Diagnostic>) {
    let mut specs = Vec::new();
    let mut diagnostics = Vec::new();

    for root in paths {
        let root = root.as_ref();
        if !root.exists() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::InvalidCustomRule,
                format!("rule path {} does not exist", root.display()),
            ));
            continue;
        }
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::InvalidCustomRule,
                        format!("failed to walk {}: {err}", root.display()),
                    ));
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_rule_file(entry.path()) {
                continue;
            }
            let content = match std::fs::read_to_string(entry.path()) {
                Ok(content) => content,
                Err(err) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::InvalidCustomRule,
                        format!("failed to read {}: {err}", entry.path().display()),
                    ));
                    continue;
                }
            };
            let spec: PatternRuleSpec = match serde_yaml::from_str(&content) {
                Ok(spec) => spec,
                Err(err) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::InvalidCustomRule,
                        format!("failed to parse {}: {err}", entry.path().display()),
                    ));
                    continue;
                }
            };
            match validate(&spec, entry.path()) {
                Ok(()) => specs.push(spec),
                Err(message) => {
                    diagnostics.push(Diagnostic::new(DiagnosticKind::InvalidCustomRule, message))
                }
            }
        }
    }

    (specs, diagnostics)
}
