//! Control-flow helpers shared by the flow-aware rules.
//!
//! `GuardTracker` models which identifiers are provably None or provably
//! guarded at a point in the tree. State lives in a stack of scopes, one per
//! syntactically active control region: entering a branch pushes a scope,
//! leaving it pops, so facts established inside a branch never leak into
//! sibling branches.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::parser::ParsedFile;

/// Tri-state guard flag for an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Provably None on this path.
    Null,
    /// Provably not None on this path.
    Guarded,
    /// Nothing known.
    Unknown,
}

/// What a conditional expression asserts about an identifier in the branch
/// where it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardSense {
    IsNull,
    NotNull,
}

impl GuardSense {
    pub fn complement(self) -> GuardSense {
        match self {
            GuardSense::IsNull => GuardSense::NotNull,
            GuardSense::NotNull => GuardSense::IsNull,
        }
    }

    pub fn state(self) -> GuardState {
        match self {
            GuardSense::IsNull => GuardState::Null,
            GuardSense::NotNull => GuardState::Guarded,
        }
    }
}

/// A guard fact extracted from a conditional expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub name: String,
    pub sense: GuardSense,
}

/// Scope-stacked identifier state.
#[derive(Debug, Default)]
pub struct GuardTracker {
    scopes: Vec<HashMap<String, GuardState>>,
}

impl GuardTracker {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope, returning the facts established in it so the
    /// caller can decide what (if anything) survives the branch.
    pub fn pop_scope(&mut self) -> HashMap<String, GuardState> {
        debug_assert!(self.scopes.len() > 1, "popping the root scope");
        self.scopes.pop().unwrap_or_default()
    }

    /// Record a fact in the innermost scope, shadowing outer entries.
    pub fn set(&mut self, name: &str, state: GuardState) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), state);
        }
    }

    /// Current state of an identifier, looked up through the scope chain.
    pub fn state(&self, name: &str) -> GuardState {
        for scope in self.scopes.iter().rev() {
            if let Some(state) = scope.get(name) {
                return *state;
            }
        }
        GuardState::Unknown
    }

    /// Propagate the Null facts a branch established into the current scope,
    /// optionally excluding one identifier (the branch's own asserted guard
    /// variable, which reflects the condition rather than an assignment).
    pub fn merge_nulls(&mut self, branch: &HashMap<String, GuardState>, except: Option<&str>) {
        for (name, state) in branch {
            if *state == GuardState::Null && except != Some(name.as_str()) {
                self.set(name, GuardState::Null);
            }
        }
    }
}

/// Extract the guard fact (if any) a conditional expression establishes in
/// its truthy branch.
///
/// Recognized forms: `x is None` / `x is not None` (and `==`/`!=` against
/// None), bare truthiness `x`, negation `not x`, and the built-in guards
/// `isinstance(x, T)` / `hasattr(x, a)`. A bare truthiness check is treated
/// as establishing guarded even though None is only one falsy value; that is
/// a deliberate precision/recall trade-off.
pub fn analyze_guard(file: &ParsedFile, cond: Node) -> Option<Guard> {
    match cond.kind() {
        "parenthesized_expression" => {
            let inner = cond.named_child(0)?;
            analyze_guard(file, inner)
        }
        "identifier" => Some(Guard {
            name: file.node_text(cond).to_string(),
            sense: GuardSense::NotNull,
        }),
        "not_operator" => {
            let arg = cond.child_by_field_name("argument")?;
            let inner = analyze_guard(file, arg)?;
            Some(Guard {
                name: inner.name,
                sense: inner.sense.complement(),
            })
        }
        "comparison_operator" => analyze_none_comparison(file, cond),
        "call" => {
            let function = cond.child_by_field_name("function")?;
            if function.kind() != "identifier" {
                return None;
            }
            if !matches!(file.node_text(function), "isinstance" | "hasattr") {
                return None;
            }
            let args = cond.child_by_field_name("arguments")?;
            let first = args.named_child(0)?;
            if first.kind() != "identifier" {
                return None;
            }
            Some(Guard {
                name: file.node_text(first).to_string(),
                sense: GuardSense::NotNull,
            })
        }
        _ => None,
    }
}

fn analyze_none_comparison(file: &ParsedFile, cond: Node) -> Option<Guard> {
    // Only single comparisons; chained comparisons carry more than one
    // operator token and are left alone.
    let mut operator = None;
    let mut operator_count = 0;
    for i in 0..cond.child_count() {
        let child = cond.child(i)?;
        if matches!(child.kind(), "is" | "is not" | "==" | "!=") {
            operator = Some(child.kind());
            operator_count += 1;
        }
    }
    if operator_count != 1 {
        return None;
    }

    let left = cond.named_child(0)?;
    let right = cond.named_child(cond.named_child_count() - 1)?;
    // Either operand order: `x is None` or `None == x`.
    let ident = if left.kind() == "identifier" && right.kind() == "none" {
        left
    } else if left.kind() == "none" && right.kind() == "identifier" {
        right
    } else {
        return None;
    };

    let sense = match operator? {
        "is" | "==" => GuardSense::IsNull,
        _ => GuardSense::NotNull,
    };
    Some(Guard {
        name: file.node_text(ident).to_string(),
        sense,
    })
}

/// Whether a block provably exits control flow early at its top level
/// (return, raise, break, continue). Used to recognize guard clauses.
pub fn block_terminates(block: Node) -> bool {
    let mut cursor = block.walk();
    let terminates = block.named_children(&mut cursor).any(|stmt| {
        matches!(
            stmt.kind(),
            "return_statement" | "raise_statement" | "break_statement" | "continue_statement"
        )
    });
    terminates
}

/// Whether a loop body contains a reachable exit: a `break` not strictly
/// inside a nested loop's own exit machinery, or a `return`, `raise`, or
/// `yield` anywhere reachable. Nested function and lambda definitions are
/// not descended into, since their bodies execute later and elsewhere.
pub fn loop_has_reachable_exit(body: Node) -> bool {
    fn scan(node: Node, in_nested_loop: bool) -> bool {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "function_definition" | "lambda" | "class_definition" => continue,
                "break_statement" if !in_nested_loop => return true,
                "return_statement" | "raise_statement" => return true,
                "yield" => return true,
                "while_statement" | "for_statement" => {
                    if scan(child, true) {
                        return true;
                    }
                }
                _ => {
                    if scan(child, in_nested_loop) {
                        return true;
                    }
                }
            }
        }
        false
    }
    scan(body, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_python;
    use std::path::Path;

    fn parse(source: &str) -> ParsedFile {
        parse_python(Path::new("test.py"), source.as_bytes()).unwrap()
    }

    fn find_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
        if node.kind() == kind {
            return Some(node);
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if let Some(found) = find_kind(child, kind) {
                return Some(found);
            }
        }
        None
    }

    fn guard_of(source: &str) -> Option<Guard> {
        let file = parse(source);
        let root = file.tree.root_node();
        let if_stmt = find_kind(root, "if_statement").unwrap();
        let cond = if_stmt.child_by_field_name("condition").unwrap();
        analyze_guard(&file, cond)
    }

    #[test]
    fn tracker_scopes_shadow_and_pop() {
        let mut tracker = GuardTracker::new();
        tracker.set("x", GuardState::Null);
        assert_eq!(tracker.state("x"), GuardState::Null);

        tracker.push_scope();
        assert_eq!(tracker.state("x"), GuardState::Null);
        tracker.set("x", GuardState::Guarded);
        assert_eq!(tracker.state("x"), GuardState::Guarded);

        tracker.pop_scope();
        assert_eq!(tracker.state("x"), GuardState::Null);
        assert_eq!(tracker.state("never_seen"), GuardState::Unknown);
    }

    #[test]
    fn merge_nulls_respects_exclusion() {
        let mut tracker = GuardTracker::new();
        tracker.push_scope();
        tracker.set("a", GuardState::Null);
        tracker.set("b", GuardState::Null);
        tracker.set("c", GuardState::Guarded);
        let branch = tracker.pop_scope();

        tracker.merge_nulls(&branch, Some("a"));
        assert_eq!(tracker.state("a"), GuardState::Unknown);
        assert_eq!(tracker.state("b"), GuardState::Null);
        assert_eq!(tracker.state("c"), GuardState::Unknown);
    }

    #[test]
    fn recognizes_is_none_forms() {
        let g = guard_of("if x is None:\n    pass\n").unwrap();
        assert_eq!(g.name, "x");
        assert_eq!(g.sense, GuardSense::IsNull);

        let g = guard_of("if x is not None:\n    pass\n").unwrap();
        assert_eq!(g.sense, GuardSense::NotNull);

        let g = guard_of("if x == None:\n    pass\n").unwrap();
        assert_eq!(g.sense, GuardSense::IsNull);
    }

    #[test]
    fn recognizes_reversed_none_comparison() {
        let g = guard_of("if None == x:\n    pass\n").unwrap();
        assert_eq!(g.name, "x");
        assert_eq!(g.sense, GuardSense::IsNull);

        let g = guard_of("if None != x:\n    pass\n").unwrap();
        assert_eq!(g.name, "x");
        assert_eq!(g.sense, GuardSense::NotNull);
    }

    #[test]
    fn recognizes_truthiness_and_negation() {
        let g = guard_of("if x:\n    pass\n").unwrap();
        assert_eq!(g.sense, GuardSense::NotNull);

        let g = guard_of("if not x:\n    pass\n").unwrap();
        assert_eq!(g.sense, GuardSense::IsNull);

        let g = guard_of("if (x):\n    pass\n").unwrap();
        assert_eq!(g.sense, GuardSense::NotNull);
    }

    #[test]
    fn recognizes_builtin_guard_calls() {
        let g = guard_of("if isinstance(x, str):\n    pass\n").unwrap();
        assert_eq!(g.name, "x");
        assert_eq!(g.sense, GuardSense::NotNull);

        let g = guard_of("if hasattr(x, 'attr'):\n    pass\n").unwrap();
        assert_eq!(g.sense, GuardSense::NotNull);
    }

    #[test]
    fn ignores_unrelated_conditions() {
        assert!(guard_of("if a < b:\n    pass\n").is_none());
        assert!(guard_of("if f(y):\n    pass\n").is_none());
        assert!(guard_of("if x.attr is None:\n    pass\n").is_none());
    }

    #[test]
    fn terminating_blocks() {
        let file = parse("if x is None:\n    return\n");
        let block = find_kind(file.tree.root_node(), "block").unwrap();
        assert!(block_terminates(block));

        let file = parse("if x is None:\n    y = 1\n");
        let block = find_kind(file.tree.root_node(), "block").unwrap();
        assert!(!block_terminates(block));
    }

    #[test]
    fn loop_exit_detection() {
        let check = |src: &str| {
            let file = parse(src);
            let while_stmt = find_kind(file.tree.root_node(), "while_statement").unwrap();
            let b = while_stmt.child_by_field_name("body").unwrap();
            loop_has_reachable_exit(b)
        };

        assert!(!check("while True:\n    pass\n"));
        assert!(check("while True:\n    break\n"));
        assert!(check("while True:\n    if c:\n        break\n"));
        assert!(check("while True:\n    return 1\n"));
        assert!(check("while True:\n    yield x\n"));
        // A break belonging to an inner loop does not exit the outer loop.
        assert!(!check("while True:\n    for i in items:\n        break\n"));
        // But a return inside an inner loop does.
        assert!(check("while True:\n    for i in items:\n        return i\n"));
        // Exits inside nested function definitions run elsewhere.
        assert!(!check("while True:\n    def f():\n        return 1\n"));
    }
}
