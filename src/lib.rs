//! Stylegate - gate commits on a style checker, offer autoformatter fixes
//!
//! This crate implements a git pre-commit hook. It lists the staged files with
//! a recognised extension, runs an external style checker over them, lets an
//! external autoformatter rewrite scratch copies, re-checks those copies and
//! then decides (asking the user when there is something to decide) whether
//! the commit proceeds with formatting, proceeds without it, or is blocked.
//!
//! # Example
//!
//! ```no_run
//! use stylegate::{run_hook, GitCli, HookConfig, SystemRunner, TerminalConsole, Vcs};
//!
//! let runner = SystemRunner;
//! let git = GitCli::discover(&runner, ".").unwrap();
//! let config = HookConfig::resolve(git.repo_root(), Default::default()).unwrap();
//! let outcome = run_hook(&config, &git, &runner, &mut TerminalConsole::new()).unwrap();
//! std::process::exit(outcome.exit_code());
//! ```

mod config;
mod console;
mod engine;
mod hook;
mod install;
mod menu;
mod runner;
mod scratch;
mod vcs;
mod workspace;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use config::{CommandSpec, ConfigLayer, FeatureToggles, HookConfig, ToolCommand, ToolConfig, CONFIG_FILE_NAME};
pub use crate::console::TerminalConsole;
pub use engine::{Console, Engine, Evidence, Pass, ViolationReport};
pub use hook::{ensure_tools, run_check, run_hook, CheckReport};
pub use install::{install_hook, uninstall_hook, HOOK_MARKER};
pub use menu::{Action, ActionMenu};
pub use runner::{CommandRunner, SystemRunner, ToolOutput};
pub use scratch::{DiffSnapshot, ScratchSpace};
pub use vcs::{GitCli, Vcs};
pub use workspace::Workspace;

/// Result of running the checker over one set of files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckResult {
    /// The pass has not been evaluated (yet)
    #[default]
    Unknown,
    Clean,
    Violated,
}

impl CheckResult {
    /// Map a checker exit status onto a result: nonzero means violations
    pub fn from_success(success: bool) -> Self {
        if success {
            CheckResult::Clean
        } else {
            CheckResult::Violated
        }
    }

    /// `Some(true)` when violated, `None` while unknown
    pub fn violates(&self) -> Option<bool> {
        match self {
            CheckResult::Unknown => None,
            CheckResult::Clean => Some(false),
            CheckResult::Violated => Some(true),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, CheckResult::Unknown)
    }
}

impl std::fmt::Display for CheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CheckResult::Unknown => "unknown",
            CheckResult::Clean => "clean",
            CheckResult::Violated => "violated",
        };
        write!(f, "{}", name)
    }
}

/// Why a run ended up blocking the commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The user picked "Cancel" or declined a confirmation
    Cancelled,
    /// The checker found violations and policy does not allow overriding
    Violations,
}

/// Terminal result of one hook invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Formatter output was copied over the originals and staged
    ProceedWithFormatting,
    /// Commit goes ahead with the staged content untouched
    ProceedWithoutFormatting,
    Aborted(AbortReason),
}

impl Outcome {
    /// Process exit status for git: 0 lets the commit through
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::ProceedWithFormatting | Outcome::ProceedWithoutFormatting => 0,
            Outcome::Aborted(_) => 1,
        }
    }

    pub fn allows_commit(&self) -> bool {
        self.exit_code() == 0
    }
}

/// Ordered set of repository-relative paths the hook works on
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct ChangedFileSet {
    paths: Vec<PathBuf>,
}

impl ChangedFileSet {
    /// Keep the paths whose extension is in `extensions`, preserving order
    /// and dropping duplicates
    pub fn from_paths<I>(paths: I, extensions: &[String]) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut kept: Vec<PathBuf> = Vec::new();
        for path in paths {
            if has_extension(&path, extensions) && !kept.contains(&path) {
                kept.push(path);
            }
        }
        Self { paths: kept }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChangedFileSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Errors that can occur while running the hook
#[derive(Error, Debug)]
pub enum HookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("{tool} is enabled but `{program}` was not found")]
    ToolMissing { tool: String, program: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("Invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Existing hook at {path} was not installed by stylegate (use --force to replace it)")]
    HookExists { path: PathBuf },

    #[error("Terminal error: {0}")]
    Terminal(String),
}

/// Result type for hook operations
pub type HookResult<T> = Result<T, HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_changed_file_set_filters_extension() {
        let set = ChangedFileSet::from_paths(
            vec![
                PathBuf::from("src/Main.java"),
                PathBuf::from("README.md"),
                PathBuf::from("build.gradle"),
                PathBuf::from("src/Util.JAVA"),
            ],
            &exts(&["java"]),
        );
        assert_eq!(
            set.paths(),
            &[PathBuf::from("src/Main.java"), PathBuf::from("src/Util.JAVA")]
        );
    }

    #[test]
    fn test_changed_file_set_dedups_in_order() {
        let set = ChangedFileSet::from_paths(
            vec![
                PathBuf::from("b.java"),
                PathBuf::from("a.java"),
                PathBuf::from("b.java"),
            ],
            &exts(&[".java"]),
        );
        assert_eq!(set.paths(), &[PathBuf::from("b.java"), PathBuf::from("a.java")]);
    }

    #[test]
    fn test_changed_file_set_ignores_extensionless() {
        let set = ChangedFileSet::from_paths(vec![PathBuf::from("Makefile")], &exts(&["java"]));
        assert!(set.is_empty());
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(Outcome::ProceedWithFormatting.exit_code(), 0);
        assert_eq!(Outcome::ProceedWithoutFormatting.exit_code(), 0);
        assert_eq!(Outcome::Aborted(AbortReason::Cancelled).exit_code(), 1);
        assert!(!Outcome::Aborted(AbortReason::Violations).allows_commit());
    }

    #[test]
    fn test_check_result_from_success() {
        assert_eq!(CheckResult::from_success(true), CheckResult::Clean);
        assert_eq!(CheckResult::from_success(false).violates(), Some(true));
        assert_eq!(CheckResult::Unknown.violates(), None);
        assert!(!CheckResult::Unknown.is_known());
    }
}
