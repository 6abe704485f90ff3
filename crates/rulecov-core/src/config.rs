//! Coverage checker configuration
//!
//! Loaded from a TOML file (conventionally `.rulecov.toml`):
//!
//! ```toml
//! report_hardcoded_values = true
//! exclude = ["target/**", "legacy/**"]
//!
//! [node_types]
//! exclude_attribute_collisions = true
//! extra_collisions = ["Label"]
//!
//! [checks]
//! operators = false
//! disabled_strategies = ["quantified"]
//! ```

use crate::error::{CoverageError, RuleResult};
use crate::fs::safe_read_file;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default maximum rule files discovered in one run.
pub const DEFAULT_MAX_FILES: usize = 10_000;

fn default_true() -> bool {
    true
}

fn default_max_files() -> Option<usize> {
    Some(DEFAULT_MAX_FILES)
}

/// Node-type extraction policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeTypeConfig {
    /// Drop node-type-shaped tokens that are really PMD attribute names
    /// (`Type`, `ReturnType`, ...).
    #[serde(default = "default_true")]
    pub exclude_attribute_collisions: bool,

    /// Additional names treated as attribute collisions.
    pub extra_collisions: Vec<String>,
}

impl Default for NodeTypeConfig {
    fn default() -> Self {
        Self {
            exclude_attribute_collisions: true,
            extra_collisions: Vec::new(),
        }
    }
}

/// Which coverage categories run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChecksConfig {
    #[serde(default = "default_true")]
    pub attributes: bool,

    #[serde(default = "default_true")]
    pub operators: bool,

    #[serde(default = "default_true")]
    pub conditionals: bool,

    /// Conditional strategy names to skip, e.g. `"quantified"`.
    pub disabled_strategies: Vec<String>,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            attributes: true,
            operators: true,
            conditionals: true,
            disabled_strategies: Vec::new(),
        }
    }
}

/// Configuration for the coverage engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoverageConfig {
    node_types: NodeTypeConfig,

    checks: ChecksConfig,

    /// Report string/number literals hardcoded in XPath expressions.
    report_hardcoded_values: bool,

    /// Glob patterns pruned during rule discovery.
    exclude: Vec<String>,

    /// Discovery limit; `None` disables it.
    #[serde(default = "default_max_files")]
    max_files: Option<usize>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            node_types: NodeTypeConfig::default(),
            checks: ChecksConfig::default(),
            report_hardcoded_values: true,
            exclude: vec![
                "target/**".to_string(),
                ".git/**".to_string(),
                "node_modules/**".to_string(),
            ],
            max_files: Some(DEFAULT_MAX_FILES),
        }
    }
}

impl CoverageConfig {
    pub fn builder() -> CoverageConfigBuilder {
        CoverageConfigBuilder::new()
    }

    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> RuleResult<Self> {
        let path = path.as_ref();
        let content = safe_read_file(path)?;
        toml::from_str(&content).map_err(|e| CoverageError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load config or fall back to defaults, returning the load problem as a
    /// warning instead of failing.
    pub fn load_or_default(path: Option<&PathBuf>) -> (Self, Option<String>) {
        match path {
            Some(p) => match Self::load(p) {
                Ok(config) => (config, None),
                Err(e) => (
                    Self::default(),
                    Some(format!(
                        "Failed to load config {}: {}; using defaults",
                        p.display(),
                        e
                    )),
                ),
            },
            None => (Self::default(), None),
        }
    }

    #[inline]
    pub fn node_types(&self) -> &NodeTypeConfig {
        &self.node_types
    }

    #[inline]
    pub fn checks(&self) -> &ChecksConfig {
        &self.checks
    }

    #[inline]
    pub fn report_hardcoded_values(&self) -> bool {
        self.report_hardcoded_values
    }

    #[inline]
    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    #[inline]
    pub fn max_files(&self) -> Option<usize> {
        self.max_files
    }

    /// Whether a conditional strategy has been switched off.
    pub fn is_strategy_disabled(&self, name: &str) -> bool {
        self.checks
            .disabled_strategies
            .iter()
            .any(|s| s.eq_ignore_ascii_case(name))
    }

    /// Validate patterns, returning the first bad one.
    pub fn validate(&self) -> RuleResult<()> {
        for pattern in &self.exclude {
            glob::Pattern::new(pattern).map_err(|e| CoverageError::InvalidExcludePattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Builder for [`CoverageConfig`].
#[derive(Debug, Clone, Default)]
pub struct CoverageConfigBuilder {
    config: CoverageConfig,
}

impl CoverageConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_attribute_collisions(mut self, enabled: bool) -> Self {
        self.config.node_types.exclude_attribute_collisions = enabled;
        self
    }

    pub fn extra_collision(mut self, name: impl Into<String>) -> Self {
        self.config.node_types.extra_collisions.push(name.into());
        self
    }

    pub fn check_attributes(mut self, enabled: bool) -> Self {
        self.config.checks.attributes = enabled;
        self
    }

    pub fn check_operators(mut self, enabled: bool) -> Self {
        self.config.checks.operators = enabled;
        self
    }

    pub fn check_conditionals(mut self, enabled: bool) -> Self {
        self.config.checks.conditionals = enabled;
        self
    }

    pub fn disable_strategy(mut self, name: impl Into<String>) -> Self {
        self.config.checks.disabled_strategies.push(name.into());
        self
    }

    pub fn report_hardcoded_values(mut self, enabled: bool) -> Self {
        self.config.report_hardcoded_values = enabled;
        self
    }

    pub fn exclude(mut self, patterns: Vec<String>) -> Self {
        self.config.exclude = patterns;
        self
    }

    pub fn max_files(mut self, limit: Option<usize>) -> Self {
        self.config.max_files = limit;
        self
    }

    pub fn build(self) -> CoverageConfig {
        self.config
    }
}
