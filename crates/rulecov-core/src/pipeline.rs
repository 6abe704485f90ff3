//! Checking pipeline: one rule, one rule file, or a set of paths.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::apex::{ApexParser, BuiltinApexParser};
use crate::config::CoverageConfig;
use crate::coverage::{CoverageContext, XPathCoverageResult, check_coverage};
use crate::error::{CoverageError, RuleResult};
use crate::examples::{ExampleData, parse_examples};
use crate::fs::RuleFileCache;
use crate::location::LineLocator;
use crate::rule_file::{RuleDefinition, parse_ruleset};
use crate::xpath::{
    CollisionPolicy, HardcodedValue, LetVariable, XPathAnalysis, analyze_xpath_with,
    extract_hardcoded_values, extract_let_variables,
};

/// Coverage of one rule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleReport {
    pub rule_name: String,
    pub analysis: XPathAnalysis,
    pub coverage: XPathCoverageResult,
    pub hardcoded_values: Vec<HardcodedValue>,
    pub let_variables: Vec<LetVariable>,
    pub examples: Vec<ExampleData>,
}

impl RuleReport {
    pub fn is_covered(&self) -> bool {
        self.coverage.overall_success
    }
}

/// All rules of one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub rules: Vec<RuleReport>,
}

/// A file that could not be checked.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReport {
    pub files: Vec<FileReport>,
    pub failures: Vec<FileFailure>,
    pub files_checked: usize,
}

impl ProjectReport {
    pub fn rules(&self) -> impl Iterator<Item = (&Path, &RuleReport)> {
        self.files
            .iter()
            .flat_map(|f| f.rules.iter().map(move |r| (f.path.as_path(), r)))
    }

    /// True when every rule of every readable file is fully covered.
    pub fn overall_success(&self) -> bool {
        self.rules().all(|(_, r)| r.is_covered())
    }

    pub fn uncovered_rules(&self) -> usize {
        self.rules().filter(|(_, r)| !r.is_covered()).count()
    }
}

/// Check one rule. Line numbers are relative to the file the rule came from.
pub fn check_rule(
    rule: &RuleDefinition,
    config: &CoverageConfig,
    parser: &dyn ApexParser,
) -> RuleReport {
    let xpath = rule.xpath.as_deref().unwrap_or("");
    let policy = CollisionPolicy::from(config.node_types());
    let analysis = analyze_xpath_with(Some(xpath), &policy);
    let examples = parse_examples(&rule.examples, Some(parser));

    let coverage = {
        let locator = LineLocator::with_property(&rule.text, xpath, rule.xpath_span.clone())
            .with_line_offset(rule.line_offset);
        let ctx = CoverageContext::new(&examples, xpath, parser).with_locator(locator);
        check_coverage(&analysis, &ctx, config)
    };
    tracing::debug!(
        rule = %rule.name,
        covered = coverage.overall_success,
        uncovered = coverage.uncovered_branches.len(),
        "rule checked"
    );

    let hardcoded_values = if config.report_hardcoded_values() {
        extract_hardcoded_values(xpath)
    } else {
        Vec::new()
    };

    RuleReport {
        rule_name: rule.name.clone(),
        analysis,
        let_variables: extract_let_variables(xpath),
        hardcoded_values,
        coverage,
        examples,
    }
}

/// Check every rule in a ruleset file.
///
/// A rule without a `name` takes the file stem. Unreadable or malformed files
/// are errors.
pub fn check_rule_file(
    path: &Path,
    config: &CoverageConfig,
    cache: &RuleFileCache,
) -> RuleResult<Vec<RuleReport>> {
    check_rule_file_with(path, config, cache, &BuiltinApexParser)
}

pub fn check_rule_file_with(
    path: &Path,
    config: &CoverageConfig,
    cache: &RuleFileCache,
    parser: &dyn ApexParser,
) -> RuleResult<Vec<RuleReport>> {
    let text = cache.read(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let rules = parse_ruleset(&text).map_err(|source| CoverageError::MalformedRuleFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reports: Vec<RuleReport> = rules
        .into_iter()
        .map(|mut rule| {
            if rule.name.is_empty() {
                rule.name = stem.clone();
            }
            check_rule(&rule, config, parser)
        })
        .collect();
    reports.sort_by(|a, b| a.rule_name.cmp(&b.rule_name));
    Ok(reports)
}

#[cfg(feature = "filesystem")]
pub use walk::check_paths;

#[cfg(feature = "filesystem")]
mod walk {
    use super::*;
    use rayon::iter::ParallelBridge;
    use rayon::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// One compiled `exclude` entry. Paths are root-relative with `/`
    /// separators.
    struct ExcludeGlob {
        /// Matches excluded files.
        files: glob::Pattern,
        /// Matches directories whose whole subtree is excluded.
        subtree: Option<glob::Pattern>,
        /// Base of a `dir/` entry; a file with exactly that name is kept.
        dir: Option<String>,
    }

    impl ExcludeGlob {
        fn compile(raw: &str) -> RuleResult<Self> {
            let invalid = |e: glob::PatternError| CoverageError::InvalidExcludePattern {
                pattern: raw.to_string(),
                message: e.to_string(),
            };
            let normalized = raw.replace('\\', "/");
            let dir = normalized.strip_suffix('/').map(str::to_string);
            let (files, subtree) = match &dir {
                Some(base) => (format!("{base}/**"), Some(base.as_str())),
                None => (normalized.clone(), normalized.strip_suffix("/**")),
            };
            Ok(Self {
                files: glob::Pattern::new(&files).map_err(invalid)?,
                subtree: subtree.map(glob::Pattern::new).transpose().map_err(invalid)?,
                dir,
            })
        }
    }

    struct Excludes(Vec<ExcludeGlob>);

    impl Excludes {
        fn compile(patterns: &[String]) -> RuleResult<Self> {
            patterns
                .iter()
                .map(|p| ExcludeGlob::compile(p))
                .collect::<RuleResult<Vec<_>>>()
                .map(Self)
        }

        /// True if the walk should not descend into `dir`. The root (`""`)
        /// is never pruned.
        fn prunes_dir(&self, dir: &str) -> bool {
            !dir.is_empty()
                && self.0.iter().any(|g| {
                    g.files.matches(dir) || g.subtree.as_ref().is_some_and(|s| s.matches(dir))
                })
        }

        fn excludes_file(&self, file: &str) -> bool {
            self.0
                .iter()
                .any(|g| g.files.matches(file) && g.dir.as_deref() != Some(file))
        }
    }

    /// `path` relative to `root`, `/`-separated, without a leading `./`.
    fn relative(path: &Path, root: &Path) -> String {
        let rel = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");
        rel.trim_start_matches("./").to_string()
    }

    fn is_rule_file(path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
    }

    /// File-count limit shared by all workers.
    struct FileLimit {
        checked: AtomicUsize,
        exceeded: AtomicBool,
        max: Option<usize>,
    }

    impl FileLimit {
        /// Count one more file; false once the limit is passed.
        fn admit(&self) -> bool {
            if self.exceeded.load(Ordering::SeqCst) {
                return false;
            }
            let count = self.checked.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.max
                && count >= limit
            {
                self.exceeded.store(true, Ordering::SeqCst);
                return false;
            }
            true
        }
    }

    type Outcome = (Vec<FileReport>, Vec<FileFailure>);

    /// Check one file and drop its text from `cache` afterwards; nothing
    /// reads a file again once its rules are checked.
    fn check_one(path: PathBuf, config: &CoverageConfig, cache: &RuleFileCache, out: &mut Outcome) {
        let result = check_rule_file(&path, config, cache);
        cache.forget(&path);
        match result {
            Ok(rules) => out.0.push(FileReport { path, rules }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping rule file");
                out.1.push(FileFailure {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Check rule files under each path.
    ///
    /// Directories are walked for `*.xml` (honouring `.gitignore` and the
    /// configured excludes); files named explicitly are always checked.
    /// Files are analysed in parallel and reported sorted by path.
    pub fn check_paths(paths: &[PathBuf], config: &CoverageConfig) -> RuleResult<ProjectReport> {
        use ignore::WalkBuilder;

        config.validate()?;
        let excludes = Arc::new(Excludes::compile(config.exclude())?);
        let cache = RuleFileCache::real();
        let limit = FileLimit {
            checked: AtomicUsize::new(0),
            exceeded: AtomicBool::new(false),
            max: config.max_files(),
        };

        let mut outcome: Outcome = (Vec::new(), Vec::new());
        for root in paths {
            if root.is_file() {
                if limit.admit() {
                    check_one(root.clone(), config, &cache, &mut outcome);
                }
                continue;
            }

            let (files, failures) = WalkBuilder::new(root)
                .hidden(false)
                .git_ignore(true)
                .git_exclude(false)
                .filter_entry({
                    let excludes = Arc::clone(&excludes);
                    let root = root.clone();
                    move |entry| {
                        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                        !is_dir || !excludes.prunes_dir(&relative(entry.path(), &root))
                    }
                })
                .build()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_file() && is_rule_file(entry.path()))
                .filter(|entry| !excludes.excludes_file(&relative(entry.path(), root)))
                .map(|entry| entry.path().to_path_buf())
                .par_bridge()
                .fold(
                    || (Vec::new(), Vec::new()),
                    |mut acc: Outcome, file_path| {
                        if limit.admit() {
                            check_one(file_path, config, &cache, &mut acc);
                        }
                        acc
                    },
                )
                .reduce(
                    || (Vec::new(), Vec::new()),
                    |(mut f1, mut e1), (f2, e2)| {
                        f1.extend(f2);
                        e1.extend(e2);
                        (f1, e1)
                    },
                );
            outcome.0.extend(files);
            outcome.1.extend(failures);
        }

        if limit.exceeded.load(Ordering::Relaxed)
            && let Some(max) = limit.max
        {
            return Err(CoverageError::TooManyFiles {
                count: limit.checked.load(Ordering::Relaxed),
                limit: max,
            });
        }

        let (mut files, mut failures) = outcome;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        let files_checked = files.len() + failures.len();
        Ok(ProjectReport {
            files,
            failures,
            files_checked,
        })
    }

}
