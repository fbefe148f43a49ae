//! Maintainability and resource-handling rules.

use tree_sitter::Node;

use crate::finding::Severity;
use crate::rules::{Flow, Rule, RuleContext, RuleDescriptor};

/// `B001`: mutable default parameter binding (list/dict/set literal).
pub struct MutableDefaultRule;

impl MutableDefaultRule {
    pub fn descriptor() -> RuleDescriptor {
        RuleDescriptor {
            id: "B001".to_string(),
            name: "Mutable Default".to_string(),
            description: "Mutable default argument shared across calls.".to_string(),
            severity: Severity::Medium,
            category: "maintainability".to_string(),
        }
    }
}

impl Rule for MutableDefaultRule {
    fn node_kinds(&self) -> Vec<&str> {
        vec!["default_parameter", "typed_default_parameter"]
    }

    fn check_node(&mut self, ctx: &mut RuleContext<'_>, node: Node) -> anyhow::Result<Flow> {
        if let Some(value) = node.child_by_field_name("value") {
            if matches!(value.kind(), "list" | "dictionary" | "set") {
                ctx.report(
                    value,
                    "Mutable default argument detected. The default is shared across calls.",
                    Some("Change the default to None and initialize inside the function."),
                );
            }
        }
        Ok(Flow::Continue)
    }
}

/// `B002`: bare `except` or `except Exception` whose body only swallows.
pub struct SilentExceptionRule;

impl SilentExceptionRule {
    pub fn descriptor() -> RuleDescriptor {
        RuleDescriptor {
            id: "B002".to_string(),
            name: "Silent Exception".to_string(),
            description: "Exception swallowed without logging or handling.".to_string(),
            severity: Severity::High,
            category: "maintainability".to_string(),
        }
    }

    /// Whether the handler catches everything: bare `except`, `except
    /// Exception`, or `except Exception as e`.
    fn catches_everything(ctx: &RuleContext<'_>, handler: Node) -> bool {
        let mut cursor = handler.walk();
        let typed = handler
            .named_children(&mut cursor)
            .find(|c| c.kind() != "block" && c.kind() != "comment");

        match typed {
            None => true,
            Some(t) => {
                let type_node = if t.kind() == "as_pattern" {
                    t.named_child(0).unwrap_or(t)
                } else {
                    t
                };
                type_node.kind() == "identifier" && ctx.text(type_node) == "Exception"
            }
        }
    }

    /// Whether the handler body is only `pass` or `...`.
    fn body_swallows(handler: Node) -> bool {
        let block = {
            let mut cursor = handler.walk();
            handler
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "block")
                .last()
        };
        let block = match block {
            Some(b) => b,
            None => return false,
        };

        let mut cursor = block.walk();
        let statements: Vec<Node> = block
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
                .map(|e| e.kind() == "ellipsis")
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl Rule for SilentExceptionRule {
    fn node_kinds(&self) -> Vec<&str> {
        vec!["try_statement"]
    }

    fn check_node(&mut self, ctx: &mut RuleContext<'_>, node: Node) -> anyhow::Result<Flow> {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();

        // try/else signals intentional control flow around failure.
        if children.iter().any(|c| c.kind() == "else_clause") {
            return Ok(Flow::Continue);
        }

        // A single-statement try body is the try-get / try-execute pattern.
        if let Some(body) = children.iter().find(|c| c.kind() == "block") {
            let mut body_cursor = body.walk();
            let statements: Vec<Node> = body
                .named_children(&mut body_cursor)
                .filter(|c| c.kind() != "comment")
                .collect();
            if statements.len() == 1
                && matches!(
                    statements[0].kind(),
                    "return_statement" | "expression_statement"
                )
            {
                return Ok(Flow::Continue);
            }
        }

        for handler in children.iter().filter(|c| c.kind() == "except_clause") {
            if Self::catches_everything(ctx, *handler) && Self::body_swallows(*handler) {
                ctx.report(
                    *handler,
                    "Silent exception swallowing. The error is discarded without a trace.",
                    Some("Log the error or handle it explicitly."),
                );
            }
        }

        Ok(Flow::Continue)
    }
}

/// `B003`: `open()` outside a `with` item, leaking the handle on error paths.
pub struct ResourceCleanupRule;

impl ResourceCleanupRule {
    pub fn descriptor() -> RuleDescriptor {
        RuleDescriptor {
            id: "B003".to_string(),
            name: "Resource Cleanup".to_string(),
            description: "Resource acquired without a context manager.".to_string(),
            severity: Severity::Medium,
            category: "performance".to_string(),
        }
    }

    /// Whether this call sits inside a `with` item's context expression.
    fn managed_by_with(node: Node) -> bool {
        let mut current = node.parent();
        while let Some(n) = current {
            match n.kind() {
                "with_item" => return true,
                // Once we cross a statement boundary the call is plain.
                "block" | "module" | "function_definition" => return false,
                _ => current = n.parent(),
            }
        }
        false
    }
}

impl Rule for ResourceCleanupRule {
    fn node_kinds(&self) -> Vec<&str> {
        vec!["call"]
    }

    fn check_node(&mut self, ctx: &mut RuleContext<'_>, node: Node) -> anyhow::Result<Flow> {
        let function = match node.child_by_field_name("function") {
            Some(f) => f,
            None => return Ok(Flow::Continue),
        };
        if function.kind() != "identifier" || ctx.text(function) != "open" {
            return Ok(Flow::Continue);
        }

        if !Self::managed_by_with(node) {
            ctx.report(
                node,
                "Resource usage without context manager. The handle may leak on error paths.",
                Some("Wrap the open() call in a 'with' statement."),
            );
        }
        Ok(Flow::Continue)
    }
}
