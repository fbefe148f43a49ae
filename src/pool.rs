//! Parallel batch execution.
//!
//! Files are independent units of work: each worker parses and analyzes one
//! file at a time against the shared read-only rule set, and per-file results
//! are merged in path order so batch output is deterministic regardless of
//! scheduling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::engine::AnalysisEngine;
use crate::finding::BatchResult;
use crate::registry::{EnabledRuleSet, RuleRegistry};

pub struct WorkerPool {
    jobs: Option<usize>,
}

impl WorkerPool {
    /// `jobs: None` uses rayon's default (one worker per hardware thread).
    pub fn new(jobs: Option<usize>) -> Self {
        Self { jobs }
    }

    /// Analyze every file in the batch. `root` anchors the relative paths
    /// recorded on findings.
    pub fn run(
        &self,
        registry: &RuleRegistry,
        enabled: &EnabledRuleSet,
        files: &[PathBuf],
        root: &Path,
    ) -> Result<BatchResult> {
        let engine = AnalysisEngine::new(registry, enabled);

        let analyze = |files: &[PathBuf]| -> Vec<(PathBuf, Vec<crate::finding::Finding>)> {
            files
                .par_iter()
                .map(|path| (path.clone(), engine.analyze_path(path, root)))
                .collect()
        };

        let mut per_file = match self.jobs {
            Some(jobs) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build()
                    .context("failed to build worker pool")?;
                pool.install(|| analyze(files))
            }
            None => analyze(files),
        };

        // Deterministic merge order, independent of worker scheduling.
        per_file.sort_by(|a, b| a.0.cmp(&b.0));

        let mut result = BatchResult::new();
        result.scanned = files.len();
        for (_, findings) in per_file {
            result.findings.extend(findings);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolvedConfig;
    use crate::finding::PARSE_ERROR_RULE_ID;
    use std::fs;
    use tempfile::TempDir;

    fn batch(sources: &[(&str, &str)], jobs: Option<usize>) -> BatchResult {
        let dir = TempDir::new().unwrap();
        let mut files = Vec::new();
        for (name, source) in sources {
            let path = dir.path().join(name);
            fs::write(&path, source).unwrap();
            files.push(path);
        }
        let registry = RuleRegistry::with_builtins();
        let (enabled, _) = registry.resolve(&ResolvedConfig::default()).unwrap();
        WorkerPool::new(jobs)
            .run(&registry, &enabled, &files, dir.path())
            .unwrap()
    }

    #[test]
    fn batch_merges_findings_in_path_order() {
        let result = batch(
            &[
                ("b.py", "def load(cache={}):\n    pass\n"),
                ("a.py", "def save(extras=[]):\n    pass\n"),
            ],
            Some(2),
        );
        assert_eq!(result.scanned, 2);
        assert_eq!(result.findings.len(), 2);
        assert_eq!(result.findings[0].file, "a.py");
        assert_eq!(result.findings[1].file, "b.py");
    }

    #[test]
    fn unparsable_file_does_not_abort_the_batch() {
        let result = batch(
            &[
                ("bad.py", "def broken(:\n"),
                ("good.py", "def load(cache={}):\n    pass\n"),
            ],
            None,
        );
        assert_eq!(result.scanned, 2);
        let ids: Vec<&str> = result.findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.contains(&PARSE_ERROR_RULE_ID));
        assert!(ids.contains(&"B001"));
    }

    #[test]
    fn single_worker_matches_parallel_output() {
        let sources = &[
            ("m1.py", "def load(cache={}):\n    while True:\n        pass\n"),
            ("m2.py", "def get_name(user):\n    print(user)\n"),
        ];
        let serial = batch(sources, Some(1));
        let parallel = batch(sources, Some(4));
        let serial_keys: Vec<_> = serial
            .findings
            .iter()
            .map(|f| (f.file.clone(), f.position_key().0, f.rule_id.clone()))
            .collect();
        let parallel_keys: Vec<_> = parallel
            .findings
            .iter()
            .map(|f| (f.file.clone(), f.position_key().0, f.rule_id.clone()))
            .collect();
        assert_eq!(serial_keys, parallel_keys);
    }
}
