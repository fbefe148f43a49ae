//! Declarative custom rules.
//!
//! External rule units are YAML files describing a pattern rule: identity,
//! metadata, the node kinds to inspect, and a regex matched against node
//! text. Discovery compiles each file into a [`PatternRuleSpec`] once, in the
//! controlling process; workers only ever see the resulting immutable data.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::finding::Severity;
use crate::rules::{Flow, Rule, RuleContext, RuleDescriptor};

/// A custom rule definition as loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRuleSpec {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default = "default_category")]
    pub category: String,
    /// Node kinds to inspect (e.g., `call`, `attribute`, `string`).
    #[serde(default)]
    pub kinds: Vec<String>,
    /// Regex matched against the text of each inspected node.
    pub pattern: String,
    pub message: String,
    #[serde(default)]
    pub suggestion: Option<String>,
}

fn default_severity() -> Severity {
    Severity::Medium
}

fn default_category() -> String {
    "custom".to_string()
}

impl PatternRuleSpec {
    pub fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor {
            id: self.id.clone(),
            name: if self.name.is_empty() {
                self.id.clone()
            } else {
                self.name.clone()
            },
            description: self.description.clone(),
            severity: self.severity,
            category: self.category.clone(),
        }
    }
}

/// Per-file instance of a declarative rule.
pub struct PatternRule {
    spec: Arc<PatternRuleSpec>,
    regex: Regex,
}

impl PatternRule {
    /// Compile a spec. Fails on an invalid regex; the loader reports that as
    /// an invalid-custom-rule diagnostic rather than crashing discovery.
    pub fn compile(spec: Arc<PatternRuleSpec>) -> anyhow::Result<Self> {
        let regex = Regex::new(&spec.pattern)?;
        Ok(Self { spec, regex })
    }

    /// Cheap clone for per-file instantiation (regexes share their compiled
    /// program).
    pub fn instance(&self) -> PatternRule {
        PatternRule {
            spec: self.spec.clone(),
            regex: self.regex.clone(),
        }
    }
}

impl Rule for PatternRule {
    fn node_kinds(&self) -> Vec<&str> {
        self.spec.kinds.iter().map(String::as_str).collect()
    }

    fn check_node(&mut self, ctx: &mut RuleContext<'_>, node: Node) -> anyhow::Result<Flow> {
        let text = ctx.text(node).to_string();
        if self.regex.is_match(&text) {
            ctx.report(node, self.spec.message.clone(), self.spec.suggestion.as_deref());
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Finding;
    use crate::parser::parse_python;
    use std::path::Path;

    fn spec_yaml() -> PatternRuleSpec {
        serde_yaml::from_str(
            r#"
id: X100
name: No Eval
description: eval() executes arbitrary code.
severity: HIGH
category: security
kinds: [call]
pattern: "^eval\\("
message: "Use of eval() detected."
suggestion: "Parse the input explicitly instead."
"#,
        )
        .unwrap()
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: PatternRuleSpec =
            serde_yaml::from_str("id: X1\npattern: foo\nmessage: bar\n").unwrap();
        assert_eq!(spec.severity, Severity::Medium);
        assert_eq!(spec.category, "custom");
        assert!(spec.kinds.is_empty());
        assert_eq!(spec.descriptor().name, "X1");
    }

    #[test]
    fn invalid_regex_fails_compile() {
        let mut spec = spec_yaml();
        spec.pattern = "(unclosed".to_string();
        assert!(PatternRule::compile(Arc::new(spec)).is_err());
    }

    #[test]
    fn pattern_rule_matches_node_text() {
        let spec = Arc::new(spec_yaml());
        let compiled = PatternRule::compile(spec.clone()).unwrap();
        let mut rule = compiled.instance();

        let file =
            parse_python(Path::new("t.py"), b"x = eval(user_input)\ny = max(1, 2)\n").unwrap();
        let descriptor = spec.descriptor();
        let mut findings: Vec<Finding> = Vec::new();

        fn walk(
            rule: &mut PatternRule,
            file: &crate::parser::ParsedFile,
            descriptor: &RuleDescriptor,
            findings: &mut Vec<Finding>,
            node: Node,
        ) {
            if rule.node_kinds().contains(&node.kind()) {
                let mut ctx = RuleContext::new(
                    file,
                    &descriptor.id,
                    &descriptor.category,
                    descriptor.severity,
                    findings,
                );
                rule.check_node(&mut ctx, node).unwrap();
            }
            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            for child in children {
                walk(rule, file, descriptor, findings, child);
            }
        }

        walk(&mut rule, &file, &descriptor, &mut findings, file.tree.root_node());

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "X100");
        assert_eq!(findings[0].category, "security");
    }
}
