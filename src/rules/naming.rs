//! Naming convention rules.

use tree_sitter::Node;

use crate::finding::{fingerprint, Finding, Severity};
use crate::rules::{Flow, Rule, RuleContext, RuleDescriptor};

/// `N001`: a `get_*` function that never returns a value.
///
/// Candidates are collected during traversal and emitted in `finalize`, once
/// the whole tree has been seen.
pub struct MisleadingNameRule {
    candidates: Vec<Finding>,
}

impl MisleadingNameRule {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    pub fn descriptor() -> RuleDescriptor {
        RuleDescriptor {
            id: "N001".to_string(),
            name: "Misleading Name".to_string(),
            description: "Function name promises behavior the body does not deliver.".to_string(),
            severity: Severity::Low,
            category: "style".to_string(),
        }
    }

    fn returns_value(node: Node) -> bool {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            // Nested definitions return for themselves, not for this function.
            if matches!(n.kind(), "function_definition" | "lambda" | "class_definition")
                && n != node
            {
                continue;
            }
            if n.kind() == "return_statement" && n.named_child_count() > 0 {
                return true;
            }
            let mut cursor = n.walk();
            for child in n.named_children(&mut cursor) {
                stack.push(child);
            }
        }
        false
    }

    /// Single pass/ellipsis/docstring bodies are abstract methods or stubs.
    /// Any other single expression (a call, say) is a real body.
    fn is_abstract(body: Node) -> bool {
        let mut cursor = body.walk();
        let statements: Vec<Node> = body
            .named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .collect();
        if statements.len() != 1 {
            return false;
        }
        match statements[0].kind() {
            "pass_statement" => true,
            "expression_statement" => statements[0]
                .named_child(0)
                .map(|e| matches!(e.kind(), "string" | "ellipsis"))
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl Default for MisleadingNameRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for MisleadingNameRule {
    fn node_kinds(&self) -> Vec<&str> {
        vec!["function_definition"]
    }

    fn check_node(&mut self, ctx: &mut RuleContext<'_>, node: Node) -> anyhow::Result<Flow> {
        let name_node = match node.child_by_field_name("name") {
            Some(n) => n,
            None => return Ok(Flow::Continue),
        };
        let name = ctx.text(name_node).to_string();
        if !name.starts_with("get_") {
            return Ok(Flow::Continue);
        }

        let body = match node.child_by_field_name("body") {
            Some(b) => b,
            None => return Ok(Flow::Continue),
        };
        if Self::is_abstract(body) || Self::returns_value(body) {
            return Ok(Flow::Continue);
        }

        let file = ctx.file();
        let (line, column) = file.position(node);
        let descriptor = Self::descriptor();
        self.candidates.push(Finding {
            rule_id: descriptor.id.clone(),
            severity: descriptor.severity,
            category: descriptor.category,
            file: file.path.clone(),
            line,
            column,
            message: format!(
                "Function '{}' starts with 'get_' but does not return a value.",
                name
            ),
            suggestion: Some("Return the value the name promises, or rename the function.".to_string()),
            fingerprint: fingerprint(
                &descriptor.id,
                &file.path,
                &file.enclosing_definition(node),
                node.kind(),
                &format!("def {}", name),
            ),
        });
        Ok(Flow::Continue)
    }

    fn finalize(&mut self, ctx: &mut RuleContext<'_>) -> anyhow::Result<()> {
        for finding in self.candidates.drain(..) {
            ctx.emit(finding);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_python;
    use std::path::Path;

    fn run(source: &str) -> Vec<Finding> {
        let file = parse_python(Path::new("test.py"), source.as_bytes()).unwrap();
        let descriptor = MisleadingNameRule::descriptor();
        let mut rule = MisleadingNameRule::new();
        let mut findings = Vec::new();

        fn walk(
            rule: &mut MisleadingNameRule,
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

        let mut ctx = RuleContext::new(
            &file,
            &descriptor.id,
            &descriptor.category,
            descriptor.severity,
            &mut findings,
        );
        rule.finalize(&mut ctx).unwrap();
        findings
    }

    #[test]
    fn getter_without_return_is_reported_at_finalize() {
        let findings = run("def get_name(user):\n    print(user)\n");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("get_name"));
    }

    #[test]
    fn getter_with_return_is_clean() {
        assert!(run("def get_name(user):\n    return user.name\n").is_empty());
    }

    #[test]
    fn abstract_getter_is_exempt() {
        assert!(run("def get_name(user):\n    pass\n").is_empty());
        assert!(run("def get_name(user):\n    ...\n").is_empty());
        assert!(run("def get_name(user):\n    \"\"\"Overridden by subclasses.\"\"\"\n").is_empty());
    }

    #[test]
    fn single_call_body_is_not_abstract() {
        let findings = run("def get_token(session):\n    session.refresh()\n");
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn nested_return_does_not_count_for_outer() {
        let findings = run(
            "def get_value(x):\n    def helper():\n        return 1\n    helper()\n",
        );
        assert_eq!(findings.len(), 1, "only the nested helper returns");
    }

    #[test]
    fn non_getter_is_ignored() {
        assert!(run("def compute(x):\n    print(x)\n").is_empty());
    }
}
