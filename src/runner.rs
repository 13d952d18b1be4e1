//! Running external programs
//!
//! All checker, formatter, git and diff invocations go through the
//! [`CommandRunner`] trait so the rest of the crate never touches
//! `std::process` directly.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use crate::{HookError, HookResult};

/// Exit status plus captured output of a finished program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Stdout followed by stderr, for showing to the user
    pub fn log(&self) -> String {
        let mut log = self.stdout_text();
        if !self.stderr.is_empty() {
            if !log.is_empty() && !log.ends_with('\n') {
                log.push('\n');
            }
            log.push_str(&self.stderr_text());
        }
        log
    }
}

impl From<&Output> for ToolOutput {
    fn from(output: &Output) -> Self {
        Self {
            status: output.status.code(),
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        }
    }
}

/// Launches external programs
pub trait CommandRunner {
    /// Run to completion with captured output. With a timeout the child is
    /// killed once it expires.
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> HookResult<ToolOutput>;

    /// Run with the terminal attached (diff viewers and pagers)
    fn run_attached(&self, program: &str, args: &[OsString], cwd: &Path) -> HookResult<Option<i32>>;

    /// Resolve a program the way the shell would; `None` if it cannot be found
    fn locate(&self, program: &str, cwd: &Path) -> Option<PathBuf>;
}

/// [`CommandRunner`] backed by real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[tracing::instrument(skip(self, args), fields(args = args.len()))]
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> HookResult<ToolOutput> {
        let output = match timeout {
            None => {
                let output = Command::new(program)
                    .args(args)
                    .current_dir(cwd)
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output()?;
                ToolOutput::from(&output)
            }
            Some(limit) => run_bounded(program, args, cwd, limit)?,
        };

        tracing::debug!(status = ?output.status, "{} finished", program);
        Ok(output)
    }

    fn run_attached(&self, program: &str, args: &[OsString], cwd: &Path) -> HookResult<Option<i32>> {
        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(status.code())
    }

    fn locate(&self, program: &str, cwd: &Path) -> Option<PathBuf> {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            let path = cwd.join(candidate);
            return path.is_file().then_some(path);
        }

        let search = std::env::var_os("PATH")?;
        std::env::split_paths(&search).find_map(|dir| {
            executable_names(program)
                .into_iter()
                .map(|name| dir.join(name))
                .find(|path| path.is_file())
        })
    }
}

#[cfg(windows)]
fn executable_names(program: &str) -> Vec<String> {
    let exts = std::env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.CMD;.BAT".to_string());
    let mut names = vec![program.to_string()];
    names.extend(exts.split(';').map(|ext| format!("{}{}", program, ext.to_lowercase())));
    names
}

#[cfg(not(windows))]
fn executable_names(program: &str) -> Vec<String> {
    vec![program.to_string()]
}

/// Run with captured output, killing the child once `limit` passes
fn run_bounded(program: &str, args: &[OsString], cwd: &Path, limit: Duration) -> HookResult<ToolOutput> {
    let handle = duct::cmd(program, args)
        .dir(cwd)
        .stdin_null()
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .start()?;

    match handle.wait_timeout(limit)? {
        Some(output) => Ok(ToolOutput::from(output)),
        None => {
            tracing::warn!(program, secs = limit.as_secs(), "killing tool after timeout");
            handle.kill()?;
            Err(HookError::Timeout {
                tool: program.to_string(),
                secs: limit.as_secs(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<OsString> {
        vec!["-c".into(), script.into()]
    }

    #[test]
    fn test_run_captures_output_and_status() {
        let dir = TempDir::new().unwrap();
        let output = SystemRunner
            .run("sh", &sh("echo out; echo err >&2; exit 3"), dir.path(), None)
            .unwrap();
        assert_eq!(output.status, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout_text(), "out\n");
        assert_eq!(output.log(), "out\nerr\n");
    }

    #[test]
    fn test_run_with_timeout_finishes() {
        let dir = TempDir::new().unwrap();
        let output = SystemRunner
            .run("sh", &sh("echo done"), dir.path(), Some(Duration::from_secs(10)))
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout_text(), "done\n");
    }

    #[test]
    fn test_run_times_out() {
        let dir = TempDir::new().unwrap();
        let err = SystemRunner
            .run("sh", &sh("exec sleep 5"), dir.path(), Some(Duration::from_millis(100)))
            .unwrap_err();
        assert!(matches!(err, HookError::Timeout { .. }));
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = SystemRunner
            .run("stylegate-no-such-program", &[], dir.path(), None)
            .unwrap_err();
        assert!(matches!(err, HookError::Io(_)));
    }

    #[test]
    fn test_locate() {
        let dir = TempDir::new().unwrap();
        assert!(SystemRunner.locate("sh", dir.path()).is_some());
        assert!(SystemRunner
            .locate("stylegate-no-such-program", dir.path())
            .is_none());

        std::fs::create_dir(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin/tool"), "#!/bin/sh\n").unwrap();
        assert_eq!(
            SystemRunner.locate("bin/tool", dir.path()),
            Some(dir.path().join("bin/tool"))
        );
    }

    #[test]
    fn test_log_without_stderr() {
        let output = ToolOutput {
            status: Some(0),
            stdout: b"only".to_vec(),
            stderr: Vec::new(),
        };
        assert_eq!(output.log(), "only");
    }
}
