//! Command-line interface for faultcheck.

use clap::{Parser, Subcommand};
use globset::GlobSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::baseline::BaselineStore;
use crate::config::{Diagnostic, ResolvedConfig, DEFAULT_CONFIG_NAME};
use crate::finding::BatchResult;
use crate::loader;
use crate::pool::WorkerPool;
use crate::registry::RuleRegistry;
use crate::report;
use crate::rules::PatternRule;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Default baseline file name.
const DEFAULT_BASELINE_NAME: &str = ".faultcheck-baseline.json";

/// Logic-defect analyzer for Python code.
///
/// Faultcheck scans Python sources for defects that are syntactically valid
/// but semantically suspect: loops that cannot terminate, dereferences of
/// values known to be None, silently swallowed exceptions, mutable default
/// arguments, and names that promise behavior the code does not deliver.
#[derive(Parser)]
#[command(name = "faultcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a file or directory and report findings
    #[command(visible_alias = "lint")]
    Check(CheckArgs),
    /// Record the current findings as the accepted baseline
    Baseline(BaselineArgs),
}

/// Arguments for the check command.
#[derive(Parser)]
pub struct CheckArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: faultcheck.yaml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Rule profile to apply (overrides the config file)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Number of worker threads (default: one per hardware thread)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Baseline file; only findings absent from it are surfaced
    #[arg(short, long)]
    pub baseline: Option<PathBuf>,
}

/// Arguments for the baseline command.
#[derive(Parser)]
pub struct BaselineArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: faultcheck.yaml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Rule profile to apply (overrides the config file)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Number of worker threads (default: one per hardware thread)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Where to write the baseline file
    #[arg(short, long, default_value = DEFAULT_BASELINE_NAME)]
    pub output: PathBuf,
}

/// Collect Python files under a root, honoring the exclusion globs.
fn collect_files(root: &Path, exclude: &GlobSet) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            // The root itself is always scanned, whatever its name.
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            // Skip hidden directories and common vendored trees
            if e.file_type().is_dir()
                && (name.starts_with('.')
                    || name == "__pycache__"
                    || name == "node_modules"
                    || name == "venv")
            {
                return false;
            }
            true
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("py") {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if exclude.is_match(&rel) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    Ok(files)
}

fn write_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("Warning: {}", diagnostic);
    }
}

/// Load config, apply CLI overrides, and resolve the rule set.
fn prepare(
    config_path: Option<&Path>,
    profile: Option<&str>,
    jobs: Option<usize>,
) -> anyhow::Result<(ResolvedConfig, RuleRegistry, crate::registry::EnabledRuleSet)> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME));
    let mut config = ResolvedConfig::load(&config_path)?;
    if let Some(profile) = profile {
        config.profile = profile.to_string();
    }
    if jobs.is_some() {
        config.jobs = jobs;
    }

    let (specs, diagnostics) = loader::discover_rules(&config.rule_paths);
    write_diagnostics(&diagnostics);

    let mut registry = RuleRegistry::with_builtins();
    for spec in specs {
        let descriptor = spec.descriptor();
        let compiled = PatternRule::compile(std::sync::Arc::new(spec))?;
        let factory: crate::rules::RuleFactory =
            Box::new(move || Box::new(compiled.instance()) as Box<dyn crate::rules::Rule>);
        if let Some(diagnostic) = registry.register_custom(descriptor, factory) {
            write_diagnostics(&[diagnostic]);
        }
    }

    let (enabled, diagnostics) = registry.resolve(&config)?;
    write_diagnostics(&diagnostics);

    Ok((config, registry, enabled))
}

/// Analyze the target path and return the batch result.
fn analyze(
    path: &Path,
    config: &ResolvedConfig,
    registry: &RuleRegistry,
    enabled: &crate::registry::EnabledRuleSet,
) -> anyhow::Result<Option<BatchResult>> {
    let abs_path = path
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("cannot access path {:?}: {}", path, e))?;
    let metadata = std::fs::metadata(&abs_path)?;

    let (root, files) = if metadata.is_dir() {
        let exclude = config.exclusion_matcher()?;
        (abs_path.clone(), collect_files(&abs_path, &exclude)?)
    } else {
        let root = abs_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| abs_path.clone());
        (root, vec![abs_path.clone()])
    };

    if files.is_empty() {
        return Ok(None);
    }

    let pool = WorkerPool::new(config.jobs);
    let result = pool.run(registry, enabled, &files, &root)?;
    Ok(Some(result))
}

/// Run the check command.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let (config, registry, enabled) = match prepare(
        args.config.as_deref(),
        args.profile.as_deref(),
        args.jobs,
    ) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let mut result = match analyze(&args.path, &config, &registry, &enabled) {
        Ok(Some(result)) => result,
        Ok(None) => {
            eprintln!("Warning: no files to scan");
            return Ok(EXIT_SUCCESS);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let mut suppressed_count = 0;
    let baseline_ref = args.baseline.as_ref().map(|p| p.to_string_lossy().to_string());
    if let Some(baseline_path) = &args.baseline {
        let store = BaselineStore::new(baseline_path);
        match store.filter(&mut result) {
            Ok(suppressed) => suppressed_count = suppressed,
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    let path_str = args.path.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(
            &path_str,
            &config.profile,
            &result,
            baseline_ref.as_deref(),
            suppressed_count,
        )?,
        _ => report::write_pretty(
            &path_str,
            &config.profile,
            &result,
            baseline_ref.as_deref(),
            suppressed_count,
        ),
    }

    if result.surfaced().is_empty() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the baseline command.
pub fn run_baseline(args: &BaselineArgs) -> anyhow::Result<i32> {
    let (config, registry, enabled) = match prepare(
        args.config.as_deref(),
        args.profile.as_deref(),
        args.jobs,
    ) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let result = match analyze(&args.path, &config, &registry, &enabled) {
        Ok(Some(result)) => result,
        Ok(None) => {
            eprintln!("Warning: no files to scan");
            return Ok(EXIT_SUCCESS);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let store = BaselineStore::new(&args.output);
    match store.generate(&result) {
        Ok(count) => {
            println!(
                "Baseline written to {} ({} finding{} accepted)",
                args.output.display(),
                count,
                if count != 1 { "s" } else { "" }
            );
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn collect_files_finds_python_sources_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("notes.md"), "# notes\n").unwrap();
        fs::create_dir(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/util.py"), "y = 2\n").unwrap();

        let exclude = ResolvedConfig::default().exclusion_matcher().unwrap();
        let files = collect_files(dir.path(), &exclude).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["app.py", "util.py"]);
    }

    #[test]
    fn collect_files_skips_hidden_and_cache_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/hook.py"), "x = 1\n").unwrap();
        fs::create_dir(dir.path().join("__pycache__")).unwrap();
        fs::write(dir.path().join("__pycache__/app.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();

        let exclude = ResolvedConfig::default().exclusion_matcher().unwrap();
        let files = collect_files(dir.path(), &exclude).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn collect_files_honors_exclusion_globs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("tests")).unwrap();
        fs::write(dir.path().join("tests/test_app.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();

        let config = ResolvedConfig {
            exclude: vec!["tests/**".to_string()],
            ..Default::default()
        };
        let exclude = config.exclusion_matcher().unwrap();
        let files = collect_files(dir.path(), &exclude).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("app.py"));
    }

    #[test]
    fn cli_parses_check_and_baseline() {
        let cli = Cli::try_parse_from(["faultcheck", "check", "src", "--format", "json"]).unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.path, PathBuf::from("src"));
                assert_eq!(args.format, "json");
            }
            _ => panic!("expected check command"),
        }

        let cli = Cli::try_parse_from(["faultcheck", "baseline", "src", "-j", "2"]).unwrap();
        match cli.command {
            Commands::Baseline(args) => {
                assert_eq!(args.jobs, Some(2));
                assert_eq!(args.output, PathBuf::from(DEFAULT_BASELINE_NAME));
            }
            _ => panic!("expected baseline command"),
        }
    }
}
