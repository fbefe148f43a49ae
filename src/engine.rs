//! Single-file analysis engine.
//!
//! The engine owns the syntax-tree traversal: one depth-first walk per file,
//! with nodes dispatched to rules by kind. Rules never traverse themselves;
//! they inspect the node they are handed and either continue or opt out of
//! the subtree below it.

use std::collections::HashMap;
use std::path::Path;

use tree_sitter::Node;

use crate::finding::{fingerprint, Finding, Severity, INTERNAL_CATEGORY, PARSE_ERROR_RULE_ID};
use crate::parser::{parse_python, ParsedFile};
use crate::registry::{EnabledRuleSet, RuleRegistry};
use crate::rules::{Flow, RuleContext};

/// Per-file execution state for one enabled rule.
struct RuleSlot {
    id: String,
    category: String,
    severity: Severity,
    rule: Box<dyn crate::rules::Rule>,
    findings: Vec<Finding>,
    failed: bool,
}

/// Shared, read-only analysis engine. One instance serves the whole batch;
/// per-file rule state lives in slots created for each file.
pub struct AnalysisEngine<'a> {
    registry: &'a RuleRegistry,
    enabled: &'a EnabledRuleSet,
}

impl<'a> AnalysisEngine<'a> {
    pub fn new(registry: &'a RuleRegistry, enabled: &'a EnabledRuleSet) -> Self {
        Self { registry, enabled }
    }

    /// Analyze one file on disk. Read and parse failures become synthetic
    /// findings so a single bad file never aborts the batch.
    pub fn analyze_path(&self, path: &Path, root: &Path) -> Vec<Finding> {
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        match std::fs::read(path) {
            Ok(source) => self.analyze_source(&rel, &source),
            Err(err) => vec![file_error_finding(&rel, &format!("failed to read file: {err}"))],
        }
    }

    /// Analyze in-memory source. `rel_path` is the path recorded on findings.
    pub fn analyze_source(&self, rel_path: &str, source: &[u8]) -> Vec<Finding> {
        let file = match parse_python(Path::new(rel_path), source) {
            Ok(file) => file,
            Err(err) => return vec![file_error_finding(rel_path, &err.to_string())],
        };

        let mut slots: Vec<RuleSlot> = self
            .enabled
            .values()
            .filter_map(|enabled| {
                let rule = self.registry.instantiate(&enabled.descriptor.id)?;
                Some(RuleSlot {
                    id: enabled.descriptor.id.clone(),
                    category: enabled.descriptor.category.clone(),
                    severity: enabled.severity,
                    rule,
                    findings: Vec::new(),
                    failed: false,
                })
            })
            .collect();

        // Dispatch table built once per file: node kind -> interested slots.
        let mut dispatch: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, slot) in slots.iter().enumerate() {
            for kind in slot.rule.node_kinds() {
                dispatch.entry(kind.to_string()).or_default().push(idx);
            }
        }

        let mut active = vec![true; slots.len()];
        walk(
            file.tree.root_node(),
            &file,
            &mut slots,
            &dispatch,
            &mut active,
        );

        for slot in &mut slots {
            if slot.failed {
                continue;
            }
            let RuleSlot {
                id,
                category,
                severity,
                rule,
                findings,
                failed,
            } = slot;
            let mut ctx = RuleContext::new(&file, id, category, *severity, findings);
            if let Err(err) = rule.finalize(&mut ctx) {
                *failed = true;
                findings.push(rule_error_finding(id, rel_path, &err.to_string()));
            }
        }

        let mut findings: Vec<Finding> = slots.into_iter().flat_map(|s| s.findings).collect();
        findings.sort_by(|a, b| a.position_key().cmp(&b.position_key()));
        findings
    }
}

fn walk(
    node: Node,
    file: &ParsedFile,
    slots: &mut [RuleSlot],
    dispatch: &HashMap<String, Vec<usize>>,
    active: &mut [bool],
) {
    let mut deactivated = Vec::new();

    if let Some(interested) = dispatch.get(node.kind()) {
        for &idx in interested {
            if !active[idx] || slots[idx].failed {
                continue;
            }
            let RuleSlot {
                id,
                category,
                severity,
                rule,
                findings,
                failed,
            } = &mut slots[idx];
            let mut ctx = RuleContext::new(file, id, category, *severity, findings);
            match rule.check_node(&mut ctx, node) {
                Ok(Flow::Continue) => {}
                Ok(Flow::SkipChildren) => {
                    active[idx] = false;
                    deactivated.push(idx);
                }
                Err(err) => {
                    // A panicking or erroring rule is isolated: surfaced as a
                    // finding, skipped for the rest of this file.
                    *failed = true;
                    findings.push(rule_error_finding(id, &file.path, &err.to_string()));
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, file, slots, dispatch, active);
    }

    // A rule that skipped this subtree sees the rest of the tree again.
    for idx in deactivated {
        active[idx] = true;
    }
}

/// Synthetic finding for a file that could not be read or parsed.
fn file_error_finding(rel_path: &str, message: &str) -> Finding {
    Finding {
        rule_id: PARSE_ERROR_RULE_ID.to_string(),
        severity: Severity::High,
        category: INTERNAL_CATEGORY.to_string(),
        file: rel_path.to_string(),
        line: 1,
        column: 1,
        message: message.to_string(),
        suggestion: None,
        fingerprint: fingerprint(PARSE_ERROR_RULE_ID, rel_path, "<module>", "module", message),
    }
}

/// Synthetic finding for a rule that failed mid-file.
fn rule_error_finding(rule_id: &str, rel_path: &str, message: &str) -> Finding {
    Finding {
        rule_id: rule_id.to_string(),
        severity: Severity::High,
        category: INTERNAL_CATEGORY.to_string(),
        file: rel_path.to_string(),
        line: 1,
        column: 1,
        message: format!("rule failed and was skipped for this file: {message}"),
        suggestion: None,
        fingerprint: fingerprint(rule_id, rel_path, "<module>", "module", message),
    }
}
