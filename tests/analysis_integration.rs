//! Integration tests for the full analysis pipeline.
//!
//! These tests build small Python projects on disk and run them through
//! configuration loading, rule resolution, custom rule discovery, the worker
//! pool, and baseline diffing.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use faultcheck::baseline::BaselineStore;
use faultcheck::config::ResolvedConfig;
use faultcheck::finding::{BatchResult, PARSE_ERROR_RULE_ID};
use faultcheck::loader;
use faultcheck::pool::WorkerPool;
use faultcheck::registry::RuleRegistry;
use faultcheck::rules::{PatternRule, Rule, RuleFactory};

fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn run_batch(config: &ResolvedConfig, files: &[PathBuf], root: &Path) -> BatchResult {
    let (specs, _) = loader::discover_rules(&config.rule_paths);
    let mut registry = RuleRegistry::with_builtins();
    for spec in specs {
        let descriptor = spec.descriptor();
        let compiled = PatternRule::compile(std::sync::Arc::new(spec)).unwrap();
        let factory: RuleFactory =
            Box::new(move || Box::new(compiled.instance()) as Box<dyn Rule>);
        registry.register_custom(descriptor, factory);
    }
    let (enabled, _) = registry.resolve(config).unwrap();
    WorkerPool::new(config.jobs)
        .run(&registry, &enabled, files, root)
        .unwrap()
}

#[test]
fn batch_surfaces_defects_across_files() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_file(
            dir.path(),
            "jobs.py",
            "def poll():\n    while True:\n        pass\n",
        ),
        write_file(
            dir.path(),
            "store.py",
            "def load(cache={}):\n    return cache\n",
        ),
        write_file(
            dir.path(),
            "users.py",
            "def greet(user):\n    user = None\n    print(user.name)\n",
        ),
    ];

    let result = run_batch(&ResolvedConfig::default(), &files, dir.path());
    assert_eq!(result.scanned, 3);

    let by_file: Vec<(&str, &str)> = result
        .findings
        .iter()
        .map(|f| (f.file.as_str(), f.rule_id.as_str()))
        .collect();
    assert!(by_file.contains(&("jobs.py", "L001")));
    assert!(by_file.contains(&("store.py", "B001")));
    assert!(by_file.contains(&("users.py", "L003")));
}

#[test]
fn unparsable_file_yields_finding_and_batch_continues() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_file(dir.path(), "bad.py", "def broken(:\n"),
        write_file(dir.path(), "good.py", "def save(extras=[]):\n    pass\n"),
    ];

    let result = run_batch(&ResolvedConfig::default(), &files, dir.path());
    assert_eq!(result.scanned, 2);

    let parse_errors: Vec<_> = result
        .findings
        .iter()
        .filter(|f| f.rule_id == PARSE_ERROR_RULE_ID)
        .collect();
    assert_eq!(parse_errors.len(), 1);
    assert_eq!(parse_errors[0].file, "bad.py");

    assert!(result.findings.iter().any(|f| f.rule_id == "B001"));
}

#[test]
fn repeated_runs_are_deterministic() {
    let dir = TempDir::new().unwrap();
    let mut files = Vec::new();
    for i in 0..8 {
        files.push(write_file(
            dir.path(),
            &format!("mod_{i}.py"),
            "def load(cache={}):\n    while True:\n        pass\n",
        ));
    }

    let first = run_batch(&ResolvedConfig::default(), &files, dir.path());
    let second = run_batch(&ResolvedConfig::default(), &files, dir.path());

    let keys = |r: &BatchResult| -> Vec<(String, usize, usize, String)> {
        r.findings
            .iter()
            .map(|f| (f.file.clone(), f.line, f.column, f.rule_id.clone()))
            .collect()
    };
    assert_eq!(keys(&first), keys(&second));

    // Findings arrive grouped by file, in path order.
    let file_order: Vec<&str> = first.findings.iter().map(|f| f.file.as_str()).collect();
    let mut sorted = file_order.clone();
    sorted.sort();
    assert_eq!(file_order, sorted);
}

#[test]
fn custom_rules_participate_in_a_run() {
    let dir = TempDir::new().unwrap();
    let rules_dir = dir.path().join("rules");
    fs::create_dir(&rules_dir).unwrap();
    write_file(
        dir.path(),
        "rules/no_eval.yaml",
        "id: C001\nname: No Eval\nseverity: HIGH\ncategory: security\nkinds: [call]\npattern: \"^eval\\\\(\"\nmessage: eval() executes arbitrary code\n",
    );
    let files = vec![write_file(
        dir.path(),
        "app.py",
        "def run(payload):\n    return eval(payload)\n",
    )];

    let config = ResolvedConfig::from_yaml(
        &format!(
            "profile: strict\nrule_paths: [{}]\n",
            rules_dir.display()
        ),
        Path::new("faultcheck.yaml"),
    )
    .unwrap();

    let result = run_batch(&config, &files, dir.path());
    let custom: Vec<_> = result
        .findings
        .iter()
        .filter(|f| f.rule_id == "C001")
        .collect();
    assert_eq!(custom.len(), 1);
    assert_eq!(custom[0].category, "security");
    assert!(custom[0].message.contains("eval"));
}

#[test]
fn config_overrides_flow_through_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let files = vec![write_file(
        dir.path(),
        "app.py",
        "def load(cache={}):\n    while True:\n        pass\n",
    )];

    let config = ResolvedConfig::from_yaml(
        "rules:\n  L001: \"OFF\"\n  B001: HIGH\n",
        Path::new("faultcheck.yaml"),
    )
    .unwrap();

    let result = run_batch(&config, &files, dir.path());
    assert!(result.findings.iter().all(|f| f.rule_id != "L001"));
    let b001 = result
        .findings
        .iter()
        .find(|f| f.rule_id == "B001")
        .unwrap();
    assert_eq!(b001.severity, faultcheck::Severity::High);
}

#[test]
fn baseline_workflow_suppresses_old_findings_only() {
    let dir = TempDir::new().unwrap();
    let baseline_path = dir.path().join(".faultcheck-baseline.json");
    let files = vec![write_file(
        dir.path(),
        "app.py",
        "def load(cache={}):\n    return cache\n",
    )];

    // Accept the current state.
    let result = run_batch(&ResolvedConfig::default(), &files, dir.path());
    assert_eq!(result.findings.len(), 1);
    let store = BaselineStore::new(&baseline_path);
    store.generate(&result).unwrap();

    // The same file moved down two lines plus a fresh defect.
    let files = vec![write_file(
        dir.path(),
        "app.py",
        "import os\n\ndef load(cache={}):\n    return cache\n\ndef poll():\n    while True:\n        pass\n",
    )];
    let mut rerun = run_batch(&ResolvedConfig::default(), &files, dir.path());
    assert_eq!(rerun.findings.len(), 2);

    let suppressed = store.filter(&mut rerun).unwrap();
    assert_eq!(suppressed, 1);
    let surfaced = rerun.surfaced();
    assert_eq!(surfaced.len(), 1);
    assert_eq!(surfaced[0].rule_id, "L001");
}
