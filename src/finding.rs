//! Core types for analysis results.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Rule id used for findings that report a file that could not be parsed.
pub const PARSE_ERROR_RULE_ID: &str = "internal:parse";

/// Category assigned to internal diagnostic findings (parse failures,
/// rule execution errors).
pub const INTERNAL_CATEGORY: &str = "internal";

/// Severity levels for findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// A single reported defect instance. Immutable once produced: the
/// fingerprint is computed at construction time and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub category: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub fingerprint: String,
}

impl Finding {
    /// Sort key within a single file: (line, column, rule id).
    pub fn position_key(&self) -> (usize, usize, &str) {
        (self.line, self.column, &self.rule_id)
    }
}

/// Compute a stable fingerprint for a finding.
///
/// Identity fields are the rule id, the project-relative path, and a
/// structural description of the offending location (enclosing definition
/// name, node kind, normalized snippet). Line numbers are deliberately
/// excluded so edits elsewhere in the file do not shift fingerprints.
pub fn fingerprint(rule_id: &str, file: &str, context: &str, kind: &str, snippet: &str) -> String {
    let normalized: String = snippet
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(120)
        .collect();

    let canonical = format!("{}|{}|{}|{}|{}", rule_id, file, context, kind, normalized);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Aggregated results for a batch of files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub findings: Vec<Finding>,
    /// Number of files analyzed (including files that failed to parse).
    pub scanned: usize,
    /// Findings not present in the baseline (set when a baseline was applied).
    #[serde(default)]
    pub new_findings: Option<Vec<Finding>>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// The findings that should be surfaced to the reporter: baseline-new
    /// findings when a baseline was applied, everything otherwise.
    pub fn surfaced(&self) -> &[Finding] {
        match &self.new_findings {
            Some(new) => new,
            None => &self.findings,
        }
    }

    pub fn has_findings(&self) -> bool {
        !self.surfaced().is_empty()
    }
}
