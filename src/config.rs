//! Run configuration.
//!
//! A `ResolvedConfig` is derived once per run from a YAML file (plus CLI
//! overrides) and shared read-only across all workers. Configuration-level
//! errors are fatal and surfaced before any file is dispatched; everything
//! softer flows through the [`Diagnostic`] side channel.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use thiserror::Error;

use crate::finding::Severity;

/// Default configuration file name, looked up next to the scanned path.
pub const DEFAULT_CONFIG_NAME: &str = "faultcheck.yaml";

/// Fatal configuration errors. Nothing is analyzed when one of these occurs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("unknown profile `{0}`")]
    UnknownProfile(String),
    #[error("invalid override for rule `{rule}`: `{value}` (expected OFF, a severity, or a map)")]
    InvalidOverride { rule: String, value: String },
    #[error("invalid exclude pattern `{pattern}`: {source}")]
    InvalidExclude {
        pattern: String,
        source: globset::Error,
    },
}

/// Non-fatal configuration problems, reported alongside (not as) findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A discovered rule id collides with a built-in id; the built-in wins.
    RuleConflict,
    /// An override references a rule id nobody registered.
    UnknownRuleOverride,
    /// A custom rule file was rejected during discovery.
    InvalidCustomRule,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::RuleConflict => "rule-conflict",
            DiagnosticKind::UnknownRuleOverride => "unknown-rule-override",
            DiagnosticKind::InvalidCustomRule => "invalid-custom-rule",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// Per-rule ON/OFF and severity override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOverride {
    pub enabled: Option<bool>,
    pub severity: Option<Severity>,
}

/// Immutable, fully resolved run configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Active profile name.
    pub profile: String,
    /// Custom profile definitions: profile name -> category list.
    pub profiles: BTreeMap<String, Vec<String>>,
    /// Explicit per-rule overrides, highest precedence.
    pub rules: BTreeMap<String, RuleOverride>,
    /// Directories scanned for custom rule files.
    pub rule_paths: Vec<PathBuf>,
    /// Glob patterns for paths excluded from analysis.
    pub exclude: Vec<String>,
    /// Worker count; `None` means hardware parallelism.
    pub jobs: Option<usize>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            profiles: BTreeMap::new(),
            rules: BTreeMap::new(),
            rule_paths: Vec::new(),
            exclude: Vec::new(),
            jobs: None,
        }
    }
}

/// Raw YAML shape. Rule settings accept a string (`"OFF"` or a severity),
/// a bool, or a map with `enabled`/`severity` keys.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    profiles: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    rules: BTreeMap<String, RawRuleSetting>,
    #[serde(default)]
    rule_paths: Vec<PathBuf>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    jobs: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRuleSetting {
    Flag(bool),
    Word(String),
    Detailed {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        severity: Option<Severity>,
    },
}

impl RawRuleSetting {
    fn normalize(self, rule: &str) -> Result<RuleOverride, ConfigError> {
        match self {
            RawRuleSetting::Flag(enabled) => Ok(RuleOverride {
                enabled: Some(enabled),
                severity: None,
            }),
            RawRuleSetting::Word(word) => {
                if word.eq_ignore_ascii_case("off") {
                    return Ok(RuleOverride {
                        enabled: Some(false),
                        severity: None,
                    });
                }
                if word.eq_ignore_ascii_case("on") {
                    return Ok(RuleOverride {
                        enabled: Some(true),
                        severity: None,
                    });
                }
                match word.parse::<Severity>() {
                    Ok(severity) => Ok(RuleOverride {
                        enabled: Some(true),
                        severity: Some(severity),
                    }),
                    Err(_) => Err(ConfigError::InvalidOverride {
                        rule: rule.to_string(),
                        value: word,
                    }),
                }
            }
            RawRuleSetting::Detailed { enabled, severity } => Ok(RuleOverride { enabled, severity }),
        }
    }
}

impl ResolvedConfig {
    /// Load a config file. A missing file yields the default configuration;
    /// an unreadable or malformed file is fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content, path)
    }

    /// Parse YAML content. `path` is used for error reporting only.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        let mut rules = BTreeMap::new();
        for (id, setting) in raw.rules {
            let normalized = setting.normalize(&id)?;
            rules.insert(id, normalized);
        }

        Ok(Self {
            profile: raw.profile.unwrap_or_else(|| "default".to_string()),
            profiles: raw.profiles,
            rules,
            rule_paths: raw.rule_paths,
            exclude: raw.exclude,
            jobs: raw.jobs,
        })
    }

    /// Build the exclusion matcher. Bad patterns are fatal: silently skipping
    /// the wrong files would be worse than refusing to run.
    pub fn exclusion_matcher(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidExclude {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|source| ConfigError::InvalidExclude {
                pattern: self.exclude.join(", "),
                source,
            })
    }
}
