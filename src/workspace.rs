//! The real [`Evidence`]: external tools run against scratch copies of the
//! staged content of the changed files

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{HookConfig, ToolConfig};
use crate::engine::{Evidence, Pass, ViolationReport};
use crate::runner::{CommandRunner, ToolOutput};
use crate::scratch::ScratchSpace;
use crate::vcs::Vcs;
use crate::{ChangedFileSet, CheckResult, HookError, HookResult};

const CHECKER: &str = "checker";
const FORMATTER: &str = "formatter";
const DIFF_VIEWER: &str = "diff viewer";

/// Tools, scratch space and version control for one run
pub struct Workspace<'a, R: CommandRunner, V: Vcs> {
    config: &'a HookConfig,
    runner: &'a R,
    vcs: &'a V,
    files: &'a ChangedFileSet,
    scratch: Option<ScratchSpace>,
    changed: Option<Vec<PathBuf>>,
    original_log: String,
    formatted_log: String,
    log_file: Option<File>,
}

impl<'a, R: CommandRunner, V: Vcs> Workspace<'a, R, V> {
    pub fn new(config: &'a HookConfig, runner: &'a R, vcs: &'a V, files: &'a ChangedFileSet) -> Self {
        Self {
            config,
            runner,
            vcs,
            files,
            scratch: None,
            changed: None,
            original_log: String::new(),
            formatted_log: String::new(),
            log_file: None,
        }
    }

    /// Keep checker output in `path` (truncated now) so it outlives the
    /// scratch directory
    pub fn with_log_file(mut self, path: &Path) -> Self {
        match File::create(path) {
            Ok(file) => self.log_file = Some(file),
            Err(e) => tracing::warn!("cannot write log {}: {}", path.display(), e),
        }
        self
    }

    /// Files the formatter changed; empty until the comparison has run
    pub fn changed_files(&self) -> &[PathBuf] {
        self.changed.as_deref().unwrap_or(&[])
    }

    fn run_tool(&self, name: &str, tool: &ToolConfig, files: &[PathBuf]) -> HookResult<ToolOutput> {
        let args = tool.arguments(files);
        tracing::info!(tool = name, files = files.len(), "running {}", tool.command.display());
        self.runner
            .run(&tool.command.program, &args, self.vcs.repo_root(), self.config.tool_timeout)
    }

    fn check(&mut self, pass: Pass, files: &[PathBuf]) -> HookResult<CheckResult> {
        let output = self.run_tool(CHECKER, &self.config.checker, files)?;
        let result = CheckResult::from_success(output.success());
        let mut log = output.log();
        if pass == Pass::Original {
            // Report the originals under their repository paths
            let mut prefix = self.scratch()?.original_root().into_os_string();
            prefix.push(std::path::MAIN_SEPARATOR_STR);
            log = log.replace(prefix.to_string_lossy().as_ref(), "");
        }
        self.persist(pass, result, &log);
        match pass {
            Pass::Original => self.original_log = log,
            Pass::Formatted => self.formatted_log = log,
        }
        Ok(result)
    }

    fn persist(&mut self, pass: Pass, result: CheckResult, log: &str) {
        let Some(file) = self.log_file.as_mut() else {
            return;
        };
        if let Err(e) = write_section(file, pass, result, log) {
            tracing::warn!("cannot write checker log: {}", e);
        }
    }

    /// Scratch space holding the staged content, exported on first use
    fn ensure_scratch(&mut self) -> HookResult<&ScratchSpace> {
        let scratch = match self.scratch.take() {
            Some(scratch) => scratch,
            None => {
                let scratch = ScratchSpace::create(self.vcs.repo_root(), self.files)?;
                self.vcs.export_staged(self.files.paths(), &scratch.original_root())?;
                scratch
            }
        };
        Ok(self.scratch.insert(scratch))
    }

    fn scratch(&self) -> HookResult<&ScratchSpace> {
        self.scratch.as_ref().ok_or_else(|| HookError::ToolFailed {
            tool: FORMATTER.to_string(),
            message: "no formatted copies exist yet".to_string(),
        })
    }

    fn formatted_copies(&self) -> HookResult<Vec<PathBuf>> {
        let scratch = self.scratch()?;
        Ok(self.files.iter().map(|rel| scratch.formatted_path(rel)).collect())
    }

    fn compare(&mut self) -> HookResult<&[PathBuf]> {
        if self.changed.is_none() {
            let changed = self.scratch()?.changed_files()?;
            tracing::info!(changed = changed.len(), "compared formatted copies");
            self.changed = Some(changed);
        }
        Ok(self.changed_files())
    }
}

impl<R: CommandRunner, V: Vcs> Evidence for Workspace<'_, R, V> {
    fn check_original(&mut self) -> HookResult<CheckResult> {
        let files = self.files;
        let scratch = self.ensure_scratch()?;
        let originals: Vec<PathBuf> = files.iter().map(|rel| scratch.original_path(rel)).collect();
        self.check(Pass::Original, &originals)
    }

    fn run_formatter(&mut self) -> HookResult<()> {
        let copies = self.ensure_scratch()?.populate()?;

        let output = self.run_tool(FORMATTER, &self.config.formatter, &copies)?;
        if !output.success() {
            // Only the content comparison counts
            tracing::warn!(status = ?output.status, "formatter exited unsuccessfully: {}", output.log().trim());
        }
        Ok(())
    }

    fn check_formatted(&mut self) -> HookResult<CheckResult> {
        let copies = self.formatted_copies()?;
        self.check(Pass::Formatted, &copies)
    }

    fn formatter_changed_files(&mut self) -> HookResult<bool> {
        Ok(!self.compare()?.is_empty())
    }

    fn violation_report(&self, pass: Pass) -> ViolationReport {
        let log = match pass {
            Pass::Original => &self.original_log,
            Pass::Formatted => &self.formatted_log,
        };
        ViolationReport {
            pass,
            files: mentioned_files(self.files.paths(), log),
            log: log.clone(),
        }
    }

    fn show_diff(&mut self) -> HookResult<()> {
        let changed = self.compare()?.to_vec();
        let Some(scratch) = self.scratch.as_mut() else {
            return Ok(());
        };
        let snapshot = scratch.diff_snapshot(&changed)?;
        let command = &self.config.diff_command;
        let args = command.arguments(None, &[snapshot.original.clone(), snapshot.formatted.clone()]);

        match self.runner.run_attached(&command.program, &args, &snapshot.base) {
            Ok(status) => {
                tracing::debug!(?status, "{} finished", DIFF_VIEWER);
                Ok(())
            }
            Err(e) => {
                // Informational only, the menu comes back either way
                tracing::warn!("{} failed: {}", DIFF_VIEWER, e);
                Ok(())
            }
        }
    }

    fn apply_formatting(&mut self) -> HookResult<()> {
        let changed = self.compare()?.to_vec();
        let scratch = self.scratch()?;
        for rel in &changed {
            self.vcs.stage(rel, &scratch.formatted_path(rel))?;
            if scratch.apply(rel)? {
                tracing::info!(file = %rel.display(), "applied formatting");
            } else {
                tracing::warn!(file = %rel.display(), "staged formatted content; working file has unstaged changes and was left as is");
            }
        }
        Ok(())
    }
}

/// Files the checker output names, or all of `files` when it names none
fn mentioned_files(files: &[PathBuf], log: &str) -> Vec<PathBuf> {
    let named: Vec<PathBuf> = files
        .iter()
        .filter(|rel| mentions(log, &rel.to_string_lossy()))
        .cloned()
        .collect();
    if named.is_empty() {
        files.to_vec()
    } else {
        named
    }
}

/// Whether `log` contains `name` as a whole path component sequence
fn mentions(log: &str, name: &str) -> bool {
    log.match_indices(name).any(|(at, _)| {
        let before = log[..at].chars().next_back();
        let after = log[at + name.len()..].chars().next();
        !before.is_some_and(|c| is_name_char(c) || c == '.') && !after.is_some_and(is_name_char)
    })
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn write_section(file: &mut File, pass: Pass, result: CheckResult, log: &str) -> std::io::Result<()> {
    writeln!(file, "== checker on {} ({}) ==", pass, result)?;
    file.write_all(log.as_bytes())?;
    if !log.ends_with('\n') {
        writeln!(file)?;
    }
    Ok(())
}
