//! Version control access through the `git` command line

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::runner::CommandRunner;
use crate::{ChangedFileSet, HookError, HookResult};

/// What the hook needs from version control
pub trait Vcs {
    /// Absolute path of the working tree root
    fn repo_root(&self) -> &Path;

    /// Staged paths (added, copied, modified, renamed) with one of the
    /// given extensions, relative to the root
    fn changed_paths(&self, extensions: &[String]) -> HookResult<ChangedFileSet>;

    /// Write the staged content of `paths` below `dest`, keeping their
    /// relative layout. This is what the commit will contain, whatever the
    /// working tree holds.
    fn export_staged(&self, paths: &[PathBuf], dest: &Path) -> HookResult<()>;

    /// Record the content of `source` as the staged version of `path`.
    /// The working tree is not touched.
    fn stage(&self, path: &Path, source: &Path) -> HookResult<()>;

    /// Absolute path of the git directory
    fn git_dir(&self) -> HookResult<PathBuf>;

    /// Directory git runs hooks from (honours `core.hooksPath`)
    fn hooks_dir(&self) -> HookResult<PathBuf>;
}

/// [`Vcs`] implemented by shelling out to `git`
pub struct GitCli<'r, R: CommandRunner> {
    runner: &'r R,
    root: PathBuf,
}

impl<'r, R: CommandRunner> GitCli<'r, R> {
    /// Find the repository containing `cwd`
    pub fn discover(runner: &'r R, cwd: impl AsRef<Path>) -> HookResult<Self> {
        let out = git(runner, cwd.as_ref(), &["rev-parse", "--show-toplevel"])?;
        let root = PathBuf::from(out.trim_end_matches(['\n', '\r']));
        Ok(Self { runner, root })
    }

    fn git(&self, args: &[&str]) -> HookResult<String> {
        git(self.runner, &self.root, args)
    }

    fn git_raw(&self, args: Vec<OsString>) -> HookResult<Vec<u8>> {
        git_raw(self.runner, &self.root, args)
    }

    fn absolute(&self, path: &str) -> PathBuf {
        let path = Path::new(path.trim_end_matches(['\n', '\r']));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Index mode of `path`, e.g. `100755` for executables
    fn staged_mode(&self, path: &Path) -> HookResult<String> {
        let out = self.git_raw(vec!["ls-files".into(), "-s".into(), "-z".into(), "--".into(), path.into()])?;
        let mode = String::from_utf8_lossy(&out)
            .split_whitespace()
            .next()
            .unwrap_or(DEFAULT_MODE)
            .to_string();
        Ok(mode)
    }
}

/// Index mode used for paths not in the index yet
const DEFAULT_MODE: &str = "100644";

impl<R: CommandRunner> Vcs for GitCli<'_, R> {
    fn repo_root(&self) -> &Path {
        &self.root
    }

    fn changed_paths(&self, extensions: &[String]) -> HookResult<ChangedFileSet> {
        let out = self.git_raw(
            ["diff", "--cached", "--name-only", "-z", "--diff-filter=ACMR"]
                .into_iter()
                .map(OsString::from)
                .collect(),
        )?;
        let paths = out
            .split(|b| *b == 0)
            .filter(|p| !p.is_empty())
            .map(path_from_bytes);
        let files = ChangedFileSet::from_paths(paths, extensions);
        tracing::debug!(count = files.len(), "staged files selected");
        Ok(files)
    }

    fn export_staged(&self, paths: &[PathBuf], dest: &Path) -> HookResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        // checkout-index treats the prefix as a plain string prefix
        let mut prefix = OsString::from("--prefix=");
        prefix.push(dest.as_os_str());
        prefix.push(std::path::MAIN_SEPARATOR_STR);

        let mut args: Vec<OsString> = vec!["checkout-index".into(), prefix, "--".into()];
        args.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));
        self.git_raw(args)?;
        tracing::debug!(count = paths.len(), dest = %dest.display(), "exported staged files");
        Ok(())
    }

    fn stage(&self, path: &Path, source: &Path) -> HookResult<()> {
        let mode = self.staged_mode(path)?;

        let mut path_arg = OsString::from("--path=");
        path_arg.push(path.as_os_str());
        let out = self.git_raw(vec![
            "hash-object".into(),
            "-w".into(),
            path_arg,
            "--".into(),
            source.as_os_str().into(),
        ])?;
        let blob = String::from_utf8_lossy(&out).trim().to_string();

        let mut cacheinfo = OsString::from(format!("{},{},", mode, blob));
        cacheinfo.push(path.as_os_str());
        self.git_raw(vec![
            "update-index".into(),
            "--add".into(),
            "--cacheinfo".into(),
            cacheinfo,
        ])?;
        tracing::debug!(file = %path.display(), %blob, "staged blob");
        Ok(())
    }

    fn git_dir(&self) -> HookResult<PathBuf> {
        let out = self.git(&["rev-parse", "--git-dir"])?;
        Ok(self.absolute(&out))
    }

    fn hooks_dir(&self) -> HookResult<PathBuf> {
        let out = self.git(&["rev-parse", "--git-path", "hooks"])?;
        Ok(self.absolute(&out))
    }
}

fn git<R: CommandRunner>(runner: &R, cwd: &Path, args: &[&str]) -> HookResult<String> {
    let out = git_raw(runner, cwd, args.iter().map(OsString::from).collect())?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn git_raw<R: CommandRunner>(runner: &R, cwd: &Path, args: Vec<OsString>) -> HookResult<Vec<u8>> {
    let output = runner.run("git", &args, cwd, None)?;
    if !output.success() {
        let command: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        return Err(HookError::Git {
            command: command.join(" "),
            message: output.stderr_text().trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Paths come from git as raw bytes
#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
