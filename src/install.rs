//! Writing and removing the `pre-commit` shim in a repository's hooks dir

use std::fs;
use std::path::{Path, PathBuf};

use crate::{HookError, HookResult};

/// Line identifying hooks written by this tool
pub const HOOK_MARKER: &str = "# installed by stylegate";

const HOOK_NAME: &str = "pre-commit";

fn hook_script(exe: &Path) -> String {
    format!(
        "#!/bin/sh\n{}\nexec \"{}\" run \"$@\"\n",
        HOOK_MARKER,
        exe.display()
    )
}

fn is_ours(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|text| text.lines().any(|line| line.trim() == HOOK_MARKER))
        .unwrap_or(false)
}

/// Install a `pre-commit` hook running `exe`.
///
/// A hook written by someone else is only replaced with `force`. Reinstalling
/// over our own hook always works, e.g. after the binary moved.
pub fn install_hook(hooks_dir: &Path, exe: &Path, force: bool) -> HookResult<PathBuf> {
    let path = hooks_dir.join(HOOK_NAME);
    if path.exists() && !force && !is_ours(&path) {
        return Err(HookError::HookExists { path });
    }

    fs::create_dir_all(hooks_dir)?;
    fs::write(&path, hook_script(exe))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    }

    tracing::info!(hook = %path.display(), exe = %exe.display(), "installed hook");
    Ok(path)
}

/// Remove our `pre-commit` hook. Returns `false` when there is nothing of
/// ours to remove; foreign hooks are left alone.
pub fn uninstall_hook(hooks_dir: &Path) -> HookResult<bool> {
    let path = hooks_dir.join(HOOK_NAME);
    if !path.exists() {
        return Ok(false);
    }
    if !is_ours(&path) {
        tracing::warn!(hook = %path.display(), "not removing a hook stylegate did not write");
        return Ok(false);
    }
    fs::remove_file(&path)?;
    tracing::info!(hook = %path.display(), "removed hook");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_install_writes_executable_shim() {
        let dir = TempDir::new().unwrap();
        let hooks = dir.path().join("hooks");
        let path = install_hook(&hooks, Path::new("/usr/local/bin/stylegate"), false).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("#!/bin/sh\n"));
        assert!(text.contains(HOOK_MARKER));
        assert!(text.contains("exec \"/usr/local/bin/stylegate\" run \"$@\""));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_foreign_hook_needs_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(HOOK_NAME);
        fs::write(&path, "#!/bin/sh\nmake lint\n").unwrap();

        let err = install_hook(dir.path(), Path::new("stylegate"), false).unwrap_err();
        assert!(matches!(err, HookError::HookExists { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh\nmake lint\n");

        install_hook(dir.path(), Path::new("stylegate"), true).unwrap();
        assert!(is_ours(&path));
    }

    #[test]
    fn test_reinstall_over_own_hook() {
        let dir = TempDir::new().unwrap();
        install_hook(dir.path(), Path::new("/old/stylegate"), false).unwrap();
        let path = install_hook(dir.path(), Path::new("/new/stylegate"), false).unwrap();
        assert!(fs::read_to_string(path).unwrap().contains("/new/stylegate"));
    }

    #[test]
    fn test_uninstall_only_removes_own_hook() {
        let dir = TempDir::new().unwrap();
        assert!(!uninstall_hook(dir.path()).unwrap());

        let path = dir.path().join(HOOK_NAME);
        fs::write(&path, "#!/bin/sh\nmake lint\n").unwrap();
        assert!(!uninstall_hook(dir.path()).unwrap());
        assert!(path.exists());

        install_hook(dir.path(), Path::new("stylegate"), true).unwrap();
        assert!(uninstall_hook(dir.path()).unwrap());
        assert!(!path.exists());
    }
}
