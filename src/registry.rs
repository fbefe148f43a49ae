//! Rule registry and enablement resolution.
//!
//! The registry holds every known rule (built-in and discovered) keyed by id.
//! Resolution turns a [`ResolvedConfig`] into the concrete set of rules a run
//! will execute, applying profile membership first and per-rule overrides on
//! top.

use std::collections::BTreeMap;

use crate::config::{ConfigError, Diagnostic, DiagnosticKind, ResolvedConfig};
use crate::finding::Severity;
use crate::rules::{builtin_rules, Rule, RuleDescriptor, RuleFactory};

struct RegisteredRule {
    descriptor: RuleDescriptor,
    factory: RuleFactory,
}

/// One rule selected for execution, with its effective severity.
#[derive(Debug, Clone)]
pub struct EnabledRule {
    pub descriptor: RuleDescriptor,
    pub severity: Severity,
}

/// The resolved rule set for a run, ordered by rule id.
pub type EnabledRuleSet = BTreeMap<String, EnabledRule>;

pub struct RuleRegistry {
    rules: BTreeMap<String, RegisteredRule>,
    builtin_ids: Vec<String>,
}

impl RuleRegistry {
    /// Registry pre-populated with the built-in rules.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            rules: BTreeMap::new(),
            builtin_ids: Vec::new(),
        };
        for (descriptor, factory) in builtin_rules() {
            registry.builtin_ids.push(descriptor.id.clone());
            registry
                .rules
                .insert(descriptor.id.clone(), RegisteredRule { descriptor, factory });
        }
        registry
    }

    /// Register a discovered rule. Built-ins always win id conflicts; among
    /// custom rules the first registration wins. Either collision produces a
    /// diagnostic rather than an error.
    pub fn register_custom(
        &mut self,
        descriptor: RuleDescriptor,
        factory: RuleFactory,
    ) -> Option<Diagnostic> {
        let id = descriptor.id.clone();
        if self.builtin_ids.iter().any(|b| *b == id) {
            return Some(Diagnostic::new(
                DiagnosticKind::RuleConflict,
                format!("custom rule `{id}` shadows a built-in rule and was ignored"),
            ));
        }
        if self.rules.contains_key(&id) {
            return Some(Diagnostic::new(
                DiagnosticKind::RuleConflict,
                format!("duplicate custom rule `{id}` ignored (first definition wins)"),
            ));
        }
        self.rules.insert(id, RegisteredRule { descriptor, factory });
        None
    }

    pub fn descriptor(&self, id: &str) -> Option<&RuleDescriptor> {
        self.rules.get(id).map(|r| &r.descriptor)
    }

    /// Fresh instance of a registered rule. Rules carry per-file state, so
    /// every file gets its own instances.
    pub fn instantiate(&self, id: &str) -> Option<Box<dyn Rule>> {
        self.rules.get(id).map(|r| (r.factory)())
    }

    /// Categories enabled by a built-in profile, or `None` for custom ones.
    fn builtin_profile(&self, name: &str) -> Option<Vec<String>> {
        match name {
            "default" => Some(vec![
                "correctness".to_string(),
                "maintainability".to_string(),
                "performance".to_string(),
                "style".to_string(),
            ]),
            "strict" => {
                let mut categories: Vec<String> = self
                    .rules
                    .values()
                    .map(|r| r.descriptor.category.clone())
                    .collect();
                categories.sort();
                categories.dedup();
                Some(categories)
            }
            _ => None,
        }
    }

    /// Resolve the enabled rule set for a run.
    ///
    /// Precedence, lowest to highest: profile category membership, then
    /// per-rule overrides. An unknown profile is fatal; an override naming an
    /// unregistered rule only produces a diagnostic.
    pub fn resolve(
        &self,
        config: &ResolvedConfig,
    ) -> Result<(EnabledRuleSet, Vec<Diagnostic>), ConfigError> {
        let mut diagnostics = Vec::new();

        let mut categories = self
            .builtin_profile(&config.profile)
            .unwrap_or_default();
        let custom = config.profiles.get(&config.profile);
        if let Some(extra) = custom {
            categories.extend(extra.iter().cloned());
        } else if categories.is_empty() {
            return Err(ConfigError::UnknownProfile(config.profile.clone()));
        }
        categories.sort();
        categories.dedup();

        let mut enabled: EnabledRuleSet = BTreeMap::new();
        for rule in self.rules.values() {
            if categories.iter().any(|c| *c == rule.descriptor.category) {
                enabled.insert(
                    rule.descriptor.id.clone(),
                    EnabledRule {
                        descriptor: rule.descriptor.clone(),
                        severity: rule.descriptor.severity,
                    },
                );
            }
        }

        for (id, setting) in &config.rules {
            let Some(registered) = self.rules.get(id) else {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnknownRuleOverride,
                    format!("override for unknown rule `{id}` ignored"),
                ));
                continue;
            };
            match setting.enabled {
                Some(false) => {
                    enabled.remove(id);
                    continue;
                }
                Some(true) => {
                    enabled.entry(id.clone()).or_insert_with(|| EnabledRule {
                        descriptor: registered.descriptor.clone(),
                        severity: registered.descriptor.severity,
                    });
                }
                // A severity-only override adjusts the rule if its profile
                // enabled it; it never enables the rule on its own.
                None => {}
            }
            if let Some(severity) = setting.severity {
                if let Some(entry) = enabled.get_mut(id) {
                    entry.severity = severity;
                }
            }
        }

        Ok((enabled, diagnostics))
    }
}
