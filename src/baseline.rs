//! Baseline persistence and diffing.
//!
//! A baseline is the set of finding fingerprints accepted at a point in time.
//! Later runs subtract it so only new findings are surfaced. Fingerprints are
//! structural, so unrelated edits (added imports, moved functions) do not
//! resurrect accepted findings.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::finding::BatchResult;

const BASELINE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("failed to read baseline {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write baseline {path}: {source}")]
    Unwritable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed baseline {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unsupported baseline version {found} in {path} (expected {BASELINE_VERSION})")]
    UnsupportedVersion { path: PathBuf, found: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct BaselineFile {
    version: u32,
    fingerprints: BTreeSet<String>,
}

pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the baseline from a batch, replacing any previous content.
    pub fn generate(&self, result: &BatchResult) -> Result<usize, BaselineError> {
        let file = BaselineFile {
            version: BASELINE_VERSION,
            fingerprints: result
                .findings
                .iter()
                .map(|f| f.fingerprint.clone())
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| {
            BaselineError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(|source| BaselineError::Unwritable {
            path: self.path.clone(),
            source,
        })?;
        Ok(file.fingerprints.len())
    }

    fn load(&self) -> Result<BTreeSet<String>, BaselineError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|source| BaselineError::Unreadable {
                path: self.path.clone(),
                source,
            })?;
        let file: BaselineFile =
            serde_json::from_str(&content).map_err(|source| BaselineError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        if file.version != BASELINE_VERSION {
            return Err(BaselineError::UnsupportedVersion {
                path: self.path.clone(),
                found: file.version,
            });
        }
        Ok(file.fingerprints)
    }

    /// Subtract the baseline from a batch. All findings stay on the result;
    /// `new_findings` holds the unsuppressed subset. Returns the number of
    /// suppressed findings.
    pub fn filter(&self, result: &mut BatchResult) -> Result<usize, BaselineError> {
        let known = self.load()?;
        let new_findings: Vec<_> = result
            .findings
            .iter()
            .filter(|f| !known.contains(&f.fingerprint))
            .cloned()
            .collect();
        let suppressed = result.findings.len() - new_findings.len();
        result.new_findings = Some(new_findings);
        Ok(suppressed)
    }
}
