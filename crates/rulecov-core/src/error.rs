//! Error types for the fallible edges of the engine.
//!
//! Coverage gaps are never errors: they are reported as data inside
//! [`CoverageResult`](crate::coverage::CoverageResult). Only rule discovery,
//! configuration loading, rule-file reads and malformed rule XML can fail.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub type RuleResult<T> = Result<T, CoverageError>;

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed rule file {path}: {source}")]
    MalformedRuleFile {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Refusing to read symlink: {path}")]
    FileSymlink { path: PathBuf },

    #[error("File too large: {path} ({size} bytes, limit {limit} bytes)")]
    FileTooBig {
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    #[error("Not a regular file: {path}")]
    FileNotRegular { path: PathBuf },

    #[error("Invalid exclude pattern: {pattern} ({message})")]
    InvalidExcludePattern { pattern: String, message: String },

    #[error("Invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Too many rule files: {count} files found, limit is {limit}")]
    TooManyFiles { count: usize, limit: usize },

    /// A failure remembered by the rule-file cache.
    #[error(transparent)]
    Shared(Arc<CoverageError>),

    #[error(transparent)]
    Other(anyhow::Error),
}

impl CoverageError {
    /// Path of the file the error refers to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            CoverageError::FileRead { path, .. }
            | CoverageError::MalformedRuleFile { path, .. }
            | CoverageError::FileSymlink { path }
            | CoverageError::FileTooBig { path, .. }
            | CoverageError::FileNotRegular { path }
            | CoverageError::Config { path, .. } => Some(path),
            CoverageError::Shared(inner) => inner.path(),
            _ => None,
        }
    }
}
