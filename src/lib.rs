//! Faultcheck - logic-defect analyzer for Python code.
//!
//! Faultcheck scans Python sources for defects that are syntactically valid
//! but semantically suspect: loops that cannot terminate, dereferences of
//! values known to be None, silently swallowed exceptions, mutable default
//! arguments, and names that promise behavior the code does not deliver.
//!
//! # Architecture
//!
//! Analysis is tree-sitter based and rule-driven:
//!
//! - `parser`: Python parsing and per-file source access
//! - `rules`: the `Rule` trait, built-in rules, and declarative pattern rules
//! - `registry`: rule registration and profile/override resolution
//! - `config`: run configuration loaded from YAML
//! - `loader`: custom rule discovery from rule directories
//! - `engine`: single-file traversal dispatching nodes to rules
//! - `pool`: parallel batch execution over many files
//! - `baseline`: accepted-finding persistence and diffing
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a New Rule
//!
//! Implement the `Rule` trait (see `src/rules/` for examples) and register
//! it in `rules::builtin_rules`, or ship a declarative YAML pattern rule and
//! point `rule_paths` at its directory.

pub mod baseline;
pub mod cli;
pub mod config;
pub mod engine;
pub mod finding;
pub mod loader;
pub mod parser;
pub mod pool;
pub mod registry;
pub mod report;
pub mod rules;

pub use baseline::{BaselineError, BaselineStore};
pub use config::{ConfigError, Diagnostic, DiagnosticKind, ResolvedConfig};
pub use engine::AnalysisEngine;
pub use finding::{BatchResult, Finding, Severity};
pub use parser::{parse_python, ParsedFile};
pub use pool::WorkerPool;
pub use registry::{EnabledRule, EnabledRuleSet, RuleRegistry};
pub use rules::{Flow, Rule, RuleContext, RuleDescriptor};
