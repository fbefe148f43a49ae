//! Output formatting for analysis results.
//!
//! Two formats: pretty (colored terminal output) and JSON (structured output
//! for CI pipelines and editor integrations).

use colored::*;
use serde::{Deserialize, Serialize};

use crate::finding::{BatchResult, Finding, Severity};

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    pub profile: String,
    pub files_scanned: usize,
    pub findings: Vec<JsonFinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_findings: Option<Vec<JsonFinding>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_ref: Option<String>,
    pub suppressed_count: usize,
}

#[derive(Serialize, Deserialize)]
pub struct JsonFinding {
    pub rule: String,
    pub severity: String,
    pub category: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub fingerprint: String,
}

fn finding_to_json(f: &Finding) -> JsonFinding {
    JsonFinding {
        rule: f.rule_id.clone(),
        severity: f.severity.to_string(),
        category: f.category.clone(),
        file: f.file.clone(),
        line: f.line,
        column: f.column,
        message: f.message.clone(),
        suggestion: f.suggestion.clone(),
        fingerprint: f.fingerprint.clone(),
    }
}

/// Write results as JSON to stdout.
pub fn write_json(
    path: &str,
    profile: &str,
    result: &BatchResult,
    baseline_ref: Option<&str>,
    suppressed_count: usize,
) -> anyhow::Result<()> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        profile: profile.to_string(),
        files_scanned: result.scanned,
        findings: result.findings.iter().map(finding_to_json).collect(),
        new_findings: result
            .new_findings
            .as_ref()
            .map(|fs| fs.iter().map(finding_to_json).collect()),
        baseline_ref: baseline_ref.map(str::to_string),
        suppressed_count,
    };

    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty(
    path: &str,
    profile: &str,
    result: &BatchResult,
    baseline_ref: Option<&str>,
    suppressed_count: usize,
) {
    println!();
    print!("  ");
    print!("{}", "faultcheck".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", path);
    print!("  {}", "Profile:  ".dimmed());
    println!("{}", profile);
    if let Some(baseline) = baseline_ref {
        print!("  {}", "Baseline: ".dimmed());
        println!("{}", baseline);
    }
    println!();

    let surfaced = result.surfaced();
    if !surfaced.is_empty() {
        write_findings(surfaced);
        println!();
    }

    write_summary(result, surfaced.len(), suppressed_count);
    println!();
}

fn write_findings(findings: &[Finding]) {
    println!("  {} ({}):", "Findings".bold(), findings.len());
    println!();

    for f in findings {
        write_severity_tag(f.severity);
        print!("   ");
        print!("{:<8}", f.rule_id.dimmed());
        print!("{}", f.file.blue());
        println!("{}", format!(":{}:{}", f.line, f.column).dimmed());

        println!("            {}", f.message);
        if let Some(suggestion) = &f.suggestion {
            println!("            {}", suggestion.dimmed());
        }
        println!();
    }
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::High => print!("    {} ", "HIGH  ".red()),
        Severity::Medium => print!("    {} ", "MEDIUM".yellow()),
        Severity::Low => print!("    {} ", "LOW   ".blue()),
    }
}

fn write_summary(result: &BatchResult, surfaced: usize, suppressed_count: usize) {
    let plural = if result.scanned != 1 { "s" } else { "" };
    if surfaced == 0 {
        print!("  {}", "✓ CLEAN".green());
        print!("  {} file{} scanned", result.scanned, plural);
    } else {
        print!("  {}", "✗ FINDINGS".red());
        print!(
            "  {} finding{} in {} file{} scanned",
            surfaced,
            if surfaced != 1 { "s" } else { "" },
            result.scanned,
            plural
        );
    }
    if suppressed_count > 0 {
        print!("  {}", format!("({suppressed_count} baselined)").dimmed());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_finding() -> Finding {
        Finding {
            rule_id: "B001".to_string(),
            severity: Severity::Medium,
            category: "maintainability".to_string(),
            file: "app.py".to_string(),
            line: 3,
            column: 14,
            message: "Mutable default argument detected.".to_string(),
            suggestion: Some("Use None instead.".to_string()),
            fingerprint: "abc123".to_string(),
        }
    }

    #[test]
    fn json_report_round_trips() {
        let report = JsonReport {
            version: "0.1.0".to_string(),
            path: "src".to_string(),
            profile: "default".to_string(),
            files_scanned: 2,
            findings: vec![finding_to_json(&sample_finding())],
            new_findings: None,
            baseline_ref: None,
            suppressed_count: 0,
        };
        let json = serde_json::to_string(&report).unwrap();
        let parsed: JsonReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(parsed.findings[0].rule, "B001");
        assert_eq!(parsed.findings[0].severity, "MEDIUM");
        assert!(!json.contains("new_findings"));
    }

    #[test]
    fn baseline_fields_serialize_when_present() {
        let report = JsonReport {
            version: "0.1.0".to_string(),
            path: "src".to_string(),
            profile: "default".to_string(),
            files_scanned: 1,
            findings: vec![finding_to_json(&sample_finding())],
            new_findings: Some(vec![]),
            baseline_ref: Some(".faultcheck-baseline.json".to_string()),
            suppressed_count: 1,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("new_findings"));
        assert!(json.contains("baseline_ref"));
        assert!(json.contains("\"suppressed_count\":1"));
    }
}
