//! Entry points tying configuration, git, tools and the engine together

use std::path::Path;

use crate::config::HookConfig;
use crate::engine::{Console, Engine, Evidence, Pass};
use crate::runner::CommandRunner;
use crate::vcs::Vcs;
use crate::workspace::Workspace;
use crate::{ChangedFileSet, CheckResult, HookError, HookResult, Outcome};

/// Fail with [`HookError::ToolMissing`] if an enabled tool cannot be found
pub fn ensure_tools<R: CommandRunner>(config: &HookConfig, runner: &R, cwd: &Path) -> HookResult<()> {
    let required = [
        ("checker", config.toggles.checker, &config.checker.command.program),
        ("formatter", config.toggles.formatter, &config.formatter.command.program),
    ];
    for (tool, enabled, program) in required {
        if enabled && runner.locate(program, cwd).is_none() {
            return Err(HookError::ToolMissing {
                tool: tool.to_string(),
                program: program.clone(),
            });
        }
    }
    Ok(())
}

/// Run the pre-commit hook and return its outcome.
///
/// Nothing is touched when no staged file matches. Missing tools are
/// reported before any file is copied. The scratch directory is gone by
/// the time this returns, whatever the result.
pub fn run_hook<R, V>(config: &HookConfig, vcs: &V, runner: &R, console: &mut dyn Console) -> HookResult<Outcome>
where
    R: CommandRunner,
    V: Vcs,
{
    let files = vcs.changed_paths(&config.extensions)?;
    if files.is_empty() {
        tracing::info!(extensions = ?config.extensions, "no staged files to check");
        return Ok(Outcome::ProceedWithoutFormatting);
    }

    ensure_tools(config, runner, vcs.repo_root())?;

    let mut workspace = Workspace::new(config, runner, vcs, &files);
    if config.toggles.checker {
        workspace = workspace.with_log_file(&config.log_path(&vcs.git_dir()?));
    }

    let mut engine = Engine::new(config.toggles, &files);
    let outcome = engine.run(&mut workspace, console)?;
    tracing::info!(?outcome, original = %engine.original(), formatted = %engine.formatted(), "hook finished");
    Ok(outcome)
}

/// Result of a plain checker run over the staged files
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CheckReport {
    pub files: ChangedFileSet,
    pub result: CheckResult,
    pub log: String,
}

impl CheckReport {
    pub fn exit_code(&self) -> i32 {
        match self.result {
            CheckResult::Violated => 1,
            CheckResult::Clean | CheckResult::Unknown => 0,
        }
    }
}

/// Run only the checker over the staged content, never prompting and never
/// formatting. The checker runs even when disabled for the hook.
pub fn run_check<R, V>(config: &HookConfig, vcs: &V, runner: &R) -> HookResult<CheckReport>
where
    R: CommandRunner,
    V: Vcs,
{
    let files = vcs.changed_paths(&config.extensions)?;
    if files.is_empty() {
        return Ok(CheckReport {
            files,
            result: CheckResult::Unknown,
            log: String::new(),
        });
    }

    let program = &config.checker.command.program;
    if runner.locate(program, vcs.repo_root()).is_none() {
        return Err(HookError::ToolMissing {
            tool: "checker".to_string(),
            program: program.clone(),
        });
    }

    let (result, log) = {
        let mut workspace = Workspace::new(config, runner, vcs, &files);
        let result = workspace.check_original()?;
        (result, workspace.violation_report(Pass::Original).log)
    };
    Ok(CheckReport { files, result, log })
}
