//! Rule execution model.
//!
//! A rule is identity + metadata + a table of node-kind handlers. The engine
//! owns traversal: it walks the tree depth-first and dispatches each node to
//! every enabled rule that registered for that node's kind. Descent into
//! children is automatic unless a handler returns [`Flow::SkipChildren`], so
//! a rule author cannot truncate analysis by forgetting to recurse.

mod best_practices;
mod guard;
mod logic;
mod naming;
mod pattern;

pub use guard::{
    analyze_guard, block_terminates, loop_has_reachable_exit, Guard, GuardSense, GuardState,
    GuardTracker,
};
pub use pattern::{PatternRule, PatternRuleSpec};

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::finding::{fingerprint, Finding, Severity};
use crate::parser::ParsedFile;

/// Identity and metadata for a rule. Two descriptors with the same id are a
/// conflict; the registry enforces uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub category: String,
}

/// Whether the engine should descend into the current node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    SkipChildren,
}

/// A unit of analysis. Instantiated fresh for every file so per-file state
/// (guard sets, collected candidates) never leaks across files.
pub trait Rule {
    /// Node kinds this rule wants to see. Queried once per file.
    fn node_kinds(&self) -> Vec<&str>;

    /// Handle one node of a registered kind.
    fn check_node(&mut self, ctx: &mut RuleContext<'_>, node: Node) -> anyhow::Result<Flow>;

    /// Called after the whole tree has been traversed, for rules that need
    /// end-of-file state before reporting.
    fn finalize(&mut self, _ctx: &mut RuleContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Factory for per-file rule instances. Shared read-only across workers.
pub type RuleFactory = Box<dyn Fn() -> Box<dyn Rule> + Send + Sync>;

/// Per-rule view of the file under analysis plus a finding sink.
pub struct RuleContext<'a> {
    file: &'a ParsedFile,
    rule_id: &'a str,
    category: &'a str,
    severity: Severity,
    findings: &'a mut Vec<Finding>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        file: &'a ParsedFile,
        rule_id: &'a str,
        category: &'a str,
        severity: Severity,
        findings: &'a mut Vec<Finding>,
    ) -> Self {
        Self {
            file,
            rule_id,
            category,
            severity,
            findings,
        }
    }

    pub fn file(&self) -> &ParsedFile {
        self.file
    }

    pub fn text(&self, node: Node) -> &str {
        self.file.node_text(node)
    }

    /// Emit a pre-built finding (used by rules that construct findings during
    /// traversal and flush them in `finalize`).
    pub fn emit(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Emit a finding at the given node. The fingerprint is derived from the
    /// rule id, the file path, and the structural location (enclosing
    /// definition, node kind, normalized snippet) so it is stable across
    /// unrelated edits elsewhere in the file.
    pub fn report(&mut self, node: Node, message: impl Into<String>, suggestion: Option<&str>) {
        let (line, column) = self.file.position(node);
        let context = self.file.enclosing_definition(node);
        let snippet = self.file.node_text(node);

        self.findings.push(Finding {
            rule_id: self.rule_id.to_string(),
            severity: self.severity,
            category: self.category.to_string(),
            file: self.file.path.clone(),
            line,
            column,
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
            fingerprint: fingerprint(self.rule_id, &self.file.path, &context, node.kind(), snippet),
        });
    }
}

/// All built-in rules with their descriptors and per-file factories.
pub fn builtin_rules() -> Vec<(RuleDescriptor, RuleFactory)> {
    vec![
        (
            logic::InfiniteLoopRule::descriptor(),
            Box::new(|| Box::new(logic::InfiniteLoopRule)),
        ),
        (
            logic::SortedUniquePromiseRule::descriptor(),
            Box::new(|| Box::new(logic::SortedUniquePromiseRule)),
        ),
        (
            logic::NoneDerefRule::descriptor(),
            Box::new(|| Box::new(logic::NoneDerefRule::new())),
        ),
        (
            best_practices::MutableDefaultRule::descriptor(),
            Box::new(|| Box::new(best_practices::MutableDefaultRule)),
        ),
        (
            best_practices::SilentExceptionRule::descriptor(),
            Box::new(|| Box::new(best_practices::SilentExceptionRule)),
        ),
        (
            best_practices::ResourceCleanupRule::descriptor(),
            Box::new(|| Box::new(best_practices::ResourceCleanupRule)),
        ),
        (
            naming::MisleadingNameRule::descriptor(),
            Box::new(|| Box::new(naming::MisleadingNameRule::new())),
        ),
    ]
}
