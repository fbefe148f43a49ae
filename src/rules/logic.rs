//! Correctness rules: unreachable loop exits, unguarded None dereferences,
//! and functions whose names promise sorted/unique output they never produce.

use tree_sitter::Node;

use crate::finding::Severity;
use crate::rules::guard::{
    analyze_guard, block_terminates, loop_has_reachable_exit, GuardSense, GuardState, GuardTracker,
};
use crate::rules::{Flow, Rule, RuleContext, RuleDescriptor};

/// `L001`: a `while True` (or `while 1`) loop with no reachable exit.
pub struct InfiniteLoopRule;

impl InfiniteLoopRule {
    pub fn descriptor() -> RuleDescriptor {
        RuleDescriptor {
            id: "L001".to_string(),
            name: "Infinite Loop".to_string(),
            description: "Always-true loop with no reachable exit.".to_string(),
            severity: Severity::High,
            category: "correctness".to_string(),
        }
    }
}

impl Rule for InfiniteLoopRule {
    fn node_kinds(&self) -> Vec<&str> {
        vec!["while_statement"]
    }

    fn check_node(&mut self, ctx: &mut RuleContext<'_>, node: Node) -> anyhow::Result<Flow> {
        let condition = match node.child_by_field_name("condition") {
            Some(c) => c,
            None => return Ok(Flow::Continue),
        };

        let always_true = condition.kind() == "true"
            || (condition.kind() == "integer" && ctx.text(condition) == "1");
        if !always_true {
            return Ok(Flow::Continue);
        }

        if let Some(body) = node.child_by_field_name("body") {
            if !loop_has_reachable_exit(body) {
                ctx.report(
                    node,
                    "Potential infinite loop: 'while True' has no reachable 'break', 'return', 'raise', or 'yield'.",
                    Some("Add a break statement, a yield, or a conditional exit."),
                );
            }
        }

        // Nested loops are dispatched on their own visit.
        Ok(Flow::Continue)
    }
}

/// `L002`: function names claiming sorted/unique output without any
/// sorting or uniqueness logic in the body.
pub struct SortedUniquePromiseRule;

impl SortedUniquePromiseRule {
    pub fn descriptor() -> RuleDescriptor {
        RuleDescriptor {
            id: "L002".to_string(),
            name: "Sorted/Unique Promise".to_string(),
            description: "Function claims sorted or unique output without enforcing it."
                .to_string(),
            severity: Severity::Low,
            category: "correctness".to_string(),
        }
    }

    fn body_satisfies(ctx: &RuleContext<'_>, node: Node, sorted: bool, unique: bool) -> bool {
        match node.kind() {
            "call" => {
                if let Some(function) = node.child_by_field_name("function") {
                    let callee = match function.kind() {
                        "identifier" => ctx.text(function),
                        "attribute" => function
                            .child_by_field_name("attribute")
                            .map(|a| ctx.text(a))
                            .unwrap_or(""),
                        _ => "",
                    };
                    if sorted && matches!(callee, "sorted" | "sort") {
                        return true;
                    }
                    if unique
                        && matches!(
                            callee,
                            "set" | "unique" | "distinct" | "uuid4" | "sha256" | "md5"
                        )
                    {
                        return true;
                    }
                }
            }
            // f"{a}-{b}" style id construction counts as uniqueness logic
            "string" if unique => {
                let mut cursor = node.walk();
                let interpolations = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "interpolation")
                    .count();
                if interpolations >= 2 {
                    return true;
                }
            }
            "binary_operator" if unique => {
                let is_add = node
                    .child_by_field_name("operator")
                    .map(|o| o.kind() == "+")
                    .unwrap_or(false);
                if is_add && count_name_refs(node) >= 2 {
                    return true;
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        let found = node
            .named_children(&mut cursor)
            .any(|child| Self::body_satisfies(ctx, child, sorted, unique));
        found
    }
}

fn count_name_refs(node: Node) -> usize {
    let mut count = 0;
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if matches!(n.kind(), "identifier" | "attribute") {
            count += 1;
            continue;
        }
        let mut cursor = n.walk();
        for child in n.named_children(&mut cursor) {
            stack.push(child);
        }
    }
    count
}

impl Rule for SortedUniquePromiseRule {
    fn node_kinds(&self) -> Vec<&str> {
        vec!["function_definition"]
    }

    fn check_node(&mut self, ctx: &mut RuleContext<'_>, node: Node) -> anyhow::Result<Flow> {
        let name = match node.child_by_field_name("name") {
            Some(n) => ctx.text(n).to_lowercase(),
            None => return Ok(Flow::Continue),
        };
        let claims_sorted = name.contains("sorted");
        let claims_unique = name.contains("unique");
        if !claims_sorted && !claims_unique {
            return Ok(Flow::Continue);
        }

        let body = match node.child_by_field_name("body") {
            Some(b) => b,
            None => return Ok(Flow::Continue),
        };

        if !Self::body_satisfies(ctx, body, claims_sorted, claims_unique) {
            let promise = if claims_sorted { "sorted" } else { "unique" };
            ctx.report(
                node,
                format!(
                    "Function '{}' seems to promise {} results but no such logic was found.",
                    name, promise
                ),
                Some(&format!("Implement {} logic explicitly.", promise)),
            );
        }
        Ok(Flow::Continue)
    }
}

/// `L003`: dereference of an identifier that is provably None on some path.
///
/// Control-flow aware: uses [`GuardTracker`] to follow assignments, branch
/// guards, guard clauses, and short-circuit boolean evaluation within each
/// function body.
pub struct NoneDerefRule {
    tracker: GuardTracker,
}

impl NoneDerefRule {
    pub fn new() -> Self {
        Self {
            tracker: GuardTracker::new(),
        }
    }

    pub fn descriptor() -> RuleDescriptor {
        RuleDescriptor {
            id: "L003".to_string(),
            name: "Unchecked None Dereference".to_string(),
            description: "Attribute access or subscript on a value that may be None.".to_string(),
            severity: Severity::High,
            category: "correctness".to_string(),
        }
    }

    fn scan_block(&mut self, ctx: &mut RuleContext<'_>, block: Node) {
        let mut cursor = block.walk();
        let statements: Vec<Node> = block.named_children(&mut cursor).collect();

        for stmt in statements {
            match stmt.kind() {
                "expression_statement" => {
                    let mut inner_cursor = stmt.walk();
                    let children: Vec<Node> = stmt.named_children(&mut inner_cursor).collect();
                    for inner in children {
                        if inner.kind() == "assignment" {
                            self.scan_assignment(ctx, inner);
                        } else {
                            self.check_deref(ctx, inner);
                        }
                    }
                }
                "if_statement" => self.scan_if(ctx, stmt),
                "while_statement" => {
                    if let Some(cond) = stmt.child_by_field_name("condition") {
                        self.check_deref(ctx, cond);
                    }
                    if let Some(body) = stmt.child_by_field_name("body") {
                        // The body may never run; its facts stay in the loop.
                        self.tracker.push_scope();
                        self.scan_block(ctx, body);
                        self.tracker.pop_scope();
                    }
                }
                "for_statement" => {
                    if let Some(iter) = stmt.child_by_field_name("right") {
                        self.check_deref(ctx, iter);
                    }
                    self.tracker.push_scope();
                    if let Some(target) = stmt.child_by_field_name("left") {
                        for name in rebound_names(ctx, target) {
                            self.tracker.set(&name, GuardState::Guarded);
                        }
                    }
                    if let Some(body) = stmt.child_by_field_name("body") {
                        self.scan_block(ctx, body);
                    }
                    self.tracker.pop_scope();
                }
                "with_statement" => self.scan_with(ctx, stmt),
                "try_statement" => {
                    let mut try_cursor = stmt.walk();
                    let parts: Vec<Node> = stmt.named_children(&mut try_cursor).collect();
                    for part in parts {
                        let body = match part.kind() {
                            "block" => Some(part),
                            "except_clause" | "else_clause" | "finally_clause" => {
                                last_block_of(part)
                            }
                            _ => None,
                        };
                        if let Some(b) = body {
                            // Handlers may run after a partial try body, so
                            // nothing they establish is trusted afterwards.
                            self.tracker.push_scope();
                            self.scan_block(ctx, b);
                            self.tracker.pop_scope();
                        }
                    }
                }
                "assert_statement" => {
                    if let Some(cond) = stmt.named_child(0) {
                        self.check_deref(ctx, cond);
                        if let Some(g) = analyze_guard(ctx.file(), cond) {
                            if g.sense == GuardSense::NotNull {
                                self.tracker.set(&g.name, GuardState::Guarded);
                            }
                        }
                    }
                }
                // Nested definitions run later and elsewhere; the engine
                // dispatches them for their own scan.
                "function_definition" | "class_definition" | "decorated_definition" => {}
                _ => self.check_deref(ctx, stmt),
            }
        }
    }

    fn scan_assignment(&mut self, ctx: &mut RuleContext<'_>, node: Node) {
        // Follow chained assignment (`a = b = None`) down to the final value.
        let mut targets = Vec::new();
        let mut current = node;
        let value = loop {
            if let Some(left) = current.child_by_field_name("left") {
                targets.push(left);
            }
            match current.child_by_field_name("right") {
                Some(right) if right.kind() == "assignment" => current = right,
                Some(right) => break Some(right),
                None => break None,
            }
        };

        let assigns_none = match value {
            Some(v) => {
                self.check_deref(ctx, v);
                v.kind() == "none"
            }
            // Bare annotation (`x: T`) binds nothing.
            None => return,
        };

        for target in targets {
            for name in rebound_names(ctx, target) {
                let state = if assigns_none {
                    GuardState::Null
                } else {
                    GuardState::Guarded
                };
                self.tracker.set(&name, state);
            }
        }
    }

    fn scan_if(&mut self, ctx: &mut RuleContext<'_>, node: Node) {
        let condition = node.child_by_field_name("condition");
        if let Some(cond) = condition {
            self.check_deref(ctx, cond);
        }
        let guard = condition.and_then(|c| analyze_guard(ctx.file(), c));

        let mut cursor = node.walk();
        let alternatives: Vec<Node> = node
            .children_by_field_name("alternative", &mut cursor)
            .collect();
        let has_alternative = !alternatives.is_empty();

        if let Some(body) = node.child_by_field_name("consequence") {
            let terminates = block_terminates(body);

            self.tracker.push_scope();
            if let Some(g) = &guard {
                self.tracker.set(&g.name, g.sense.state());
            }
            self.scan_block(ctx, body);
            let end_state = guard.as_ref().map(|g| self.tracker.state(&g.name));
            let local = self.tracker.pop_scope();

            match &guard {
                Some(g) if g.sense == GuardSense::IsNull => {
                    self.tracker.merge_nulls(&local, Some(&g.name));
                    // Guard clause (early exit) or lazy init (repaired in
                    // branch): either way the identifier is safe for the
                    // remainder of the enclosing scope.
                    if terminates || end_state != Some(GuardState::Null) {
                        self.tracker.set(&g.name, GuardState::Guarded);
                    }
                }
                Some(g) => {
                    self.tracker.merge_nulls(&local, Some(&g.name));
                    if !has_alternative && terminates {
                        // Inverted guard clause: the complement holds after.
                        self.tracker.set(&g.name, GuardState::Null);
                    }
                }
                None => self.tracker.merge_nulls(&local, None),
            }
        }

        for alt in alternatives {
            match alt.kind() {
                "elif_clause" => {
                    let elif_cond = alt.child_by_field_name("condition");
                    if let Some(c) = elif_cond {
                        self.check_deref(ctx, c);
                    }
                    let elif_guard = elif_cond.and_then(|c| analyze_guard(ctx.file(), c));

                    if let Some(body) = alt.child_by_field_name("consequence") {
                        self.tracker.push_scope();
                        // Reaching an elif means the primary condition failed.
                        if let Some(g) = &guard {
                            self.tracker.set(&g.name, g.sense.complement().state());
                        }
                        if let Some(g) = &elif_guard {
                            self.tracker.set(&g.name, g.sense.state());
                        }
                        self.scan_block(ctx, body);
                        let local = self.tracker.pop_scope();
                        let except = elif_guard.as_ref().map(|g| g.name.as_str());
                        self.tracker.merge_nulls(&local, except);
                    }
                }
                "else_clause" => {
                    if let Some(body) = alt.child_by_field_name("body") {
                        self.tracker.push_scope();
                        if let Some(g) = &guard {
                            self.tracker.set(&g.name, g.sense.complement().state());
                        }
                        self.scan_block(ctx, body);
                        let local = self.tracker.pop_scope();
                        let except = guard.as_ref().map(|g| g.name.as_str());
                        self.tracker.merge_nulls(&local, except);
                    }
                }
                _ => {}
            }
        }
    }

    fn scan_with(&mut self, ctx: &mut RuleContext<'_>, node: Node) {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            let mut cursor = n.walk();
            for child in n.named_children(&mut cursor) {
                match child.kind() {
                    "with_item" => {
                        if let Some(value) = child.child_by_field_name("value") {
                            if value.kind() == "as_pattern" {
                                if let Some(expr) = value.named_child(0) {
                                    self.check_deref(ctx, expr);
                                }
                                // `with ... as f`: f is freshly bound.
                                if let Some(alias) = value.child_by_field_name("alias") {
                                    for name in rebound_names(ctx, alias) {
                                        self.tracker.set(&name, GuardState::Guarded);
                                    }
                                }
                            } else {
                                self.check_deref(ctx, value);
                            }
                        }
                    }
                    "with_clause" => stack.push(child),
                    _ => {}
                }
            }
        }

        // State changes in a with body persist: the body always runs.
        if let Some(body) = node.child_by_field_name("body") {
            self.scan_block(ctx, body);
        }
    }

    fn check_deref(&mut self, ctx: &mut RuleContext<'_>, node: Node) {
        match node.kind() {
            "boolean_operator" => {
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| o.kind())
                    .unwrap_or("");
                self.tracker.push_scope();
                if let Some(left) = node.child_by_field_name("left") {
                    self.check_deref(ctx, left);
                    if let Some(g) = analyze_guard(ctx.file(), left) {
                        // `x and x.attr`: the right operand only evaluates
                        // when x is truthy. `x is None or x.attr`: reaching
                        // the right operand means x was not None.
                        let guards_right = match op {
                            "and" => g.sense == GuardSense::NotNull,
                            "or" => g.sense == GuardSense::IsNull,
                            _ => false,
                        };
                        if guards_right {
                            self.tracker.set(&g.name, GuardState::Guarded);
                        }
                    }
                }
                if let Some(right) = node.child_by_field_name("right") {
                    self.check_deref(ctx, right);
                }
                self.tracker.pop_scope();
            }
            "attribute" => {
                if let Some(object) = node.child_by_field_name("object") {
                    if object.kind() == "identifier" {
                        let name = ctx.text(object).to_string();
                        if self.tracker.state(&name) == GuardState::Null {
                            let attr = node
                                .child_by_field_name("attribute")
                                .map(|a| ctx.text(a).to_string())
                                .unwrap_or_default();
                            // Dunder attributes like __class__ are safe on None.
                            if !(attr.starts_with("__") && attr.ends_with("__")) {
                                self.report_deref(ctx, node, &name, "dereference", "attributes");
                            }
                        }
                    } else {
                        self.check_deref(ctx, object);
                    }
                }
            }
            "subscript" => {
                if let Some(value) = node.child_by_field_name("value") {
                    if value.kind() == "identifier" {
                        let name = ctx.text(value).to_string();
                        if self.tracker.state(&name) == GuardState::Null {
                            self.report_deref(ctx, node, &name, "subscript", "subscripting");
                        }
                    } else {
                        self.check_deref(ctx, value);
                    }
                }
                if let Some(index) = node.child_by_field_name("subscript") {
                    self.check_deref(ctx, index);
                }
            }
            "function_definition" | "lambda" | "class_definition" => {}
            _ => {
                let mut cursor = node.walk();
                let children: Vec<Node> = node.named_children(&mut cursor).collect();
                for child in children {
                    self.check_deref(ctx, child);
                }
            }
        }
    }

    fn report_deref(
        &mut self,
        ctx: &mut RuleContext<'_>,
        node: Node,
        name: &str,
        what: &str,
        action: &str,
    ) {
        ctx.report(
            node,
            format!("Potential None {}: '{}' was assigned None.", what, name),
            Some(&format!("Check if '{}' is None before {}.", name, action)),
        );
    }
}

impl Default for NoneDerefRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for NoneDerefRule {
    fn node_kinds(&self) -> Vec<&str> {
        vec!["function_definition"]
    }

    fn check_node(&mut self, ctx: &mut RuleContext<'_>, node: Node) -> anyhow::Result<Flow> {
        // Fresh state per function: nested definitions get their own visit.
        self.tracker = GuardTracker::new();
        if let Some(body) = node.child_by_field_name("body") {
            self.scan_block(ctx, body);
        }
        Ok(Flow::Continue)
    }
}

/// Collect the identifier names an assignment target rebinds. Attribute and
/// subscript targets mutate an object rather than rebinding a name, so they
/// are skipped.
fn rebound_names(ctx: &RuleContext<'_>, target: Node) -> Vec<String> {
    let mut names = Vec::new();
    let mut stack = vec![target];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "identifier" => names.push(ctx.text(node).to_string()),
            "as_pattern_target"
            | "tuple_pattern"
            | "list_pattern"
            | "pattern_list"
            | "list_splat_pattern" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    stack.push(child);
                }
            }
            _ => {}
        }
    }
    names
}

fn last_block_of(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() == "block")
        .last()
}
