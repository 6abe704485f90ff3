//! # rulecov-core
//!
//! Coverage engine for PMD Apex XPath rules.
//!
//! Given a rule file, the engine:
//! - extracts the rule's XPath and decomposes it into node types, attributes,
//!   operators, boolean conditionals, hardcoded literals and `let` bindings
//! - parses the rule's `<example>` blocks and their violation/valid markers
//! - decides whether the examples exercise each component
//! - points every gap at its line in the rule file
//!
//! Coverage gaps are reported as data; only I/O, malformed rule XML and
//! configuration fail.

pub mod apex;
pub mod config;
pub mod coverage;
pub mod error;
pub mod examples;
pub mod fs;
pub mod location;
pub mod pipeline;
pub mod rule_file;
pub mod xpath;

pub use apex::{ApexParser, AstNode, BuiltinApexParser, NodeKind, ParseOutcome};
pub use config::CoverageConfig;
pub use coverage::{
    CoverageCategory, CoverageContext, CoverageDetail, CoverageEvidence, CoverageResult,
    EvidenceKind, XPathCoverageResult, check_coverage,
};
pub use error::{CoverageError, RuleResult};
pub use examples::{ExampleData, Marker, parse_examples};
pub use fs::{FileSystem, RealFileSystem, RuleFileCache};
pub use location::{LineLocator, LineTarget, locate_in_file};
#[cfg(feature = "filesystem")]
pub use pipeline::check_paths;
pub use pipeline::{
    FileFailure, FileReport, ProjectReport, RuleReport, check_rule, check_rule_file,
    check_rule_file_with,
};
pub use rule_file::{RuleDefinition, XmlError, parse_ruleset};
pub use xpath::{XPathAnalysis, analyze_xpath, analyze_xpath_with};
