//! Scratch copies of the changed files
//!
//! The staged content of every changed file is exported into a temporary
//! directory owned by [`ScratchSpace`]. The checker and the formatter only
//! ever see those copies, so unstaged edits in the working tree play no
//! part. The directory is removed when the value is dropped, which covers
//! normal exits, aborts and errors alike.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{ChangedFileSet, HookResult};

const ORIGINAL_DIR: &str = "original";
const FORMATTED_DIR: &str = "formatted";
const DIFF_DIR: &str = "diff";

/// Two directory trees holding the changed files before and after formatting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSnapshot {
    /// Parent of both trees; diff viewers run from here
    pub base: PathBuf,
    /// Name of the tree with the original files, relative to `base`
    pub original: PathBuf,
    /// Name of the tree with the formatted files, relative to `base`
    pub formatted: PathBuf,
}

/// Temporary working area for one hook run
pub struct ScratchSpace {
    dir: TempDir,
    repo_root: PathBuf,
    files: Vec<PathBuf>,
    snapshot: Option<DiffSnapshot>,
}

impl ScratchSpace {
    /// Create an empty scratch directory for `files` (relative to `repo_root`)
    pub fn create(repo_root: &Path, files: &ChangedFileSet) -> HookResult<Self> {
        let dir = tempfile::Builder::new().prefix("stylegate-").tempdir()?;
        fs::create_dir(dir.path().join(ORIGINAL_DIR))?;
        tracing::debug!(path = %dir.path().display(), "created scratch space");
        Ok(Self {
            dir,
            repo_root: repo_root.to_path_buf(),
            files: files.paths().to_vec(),
            snapshot: None,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Tree the staged content is exported into
    pub fn original_root(&self) -> PathBuf {
        self.dir.path().join(ORIGINAL_DIR)
    }

    /// Copy of the staged content of `rel`
    pub fn original_path(&self, rel: &Path) -> PathBuf {
        self.original_root().join(rel)
    }

    /// Where the formatter's copy of `rel` lives
    pub fn formatted_path(&self, rel: &Path) -> PathBuf {
        self.dir.path().join(FORMATTED_DIR).join(rel)
    }

    /// The file in the working tree
    pub fn working_path(&self, rel: &Path) -> PathBuf {
        self.repo_root.join(rel)
    }

    /// Copy every original into the formatter's tree, keeping relative
    /// layout, and return the copies' paths
    pub fn populate(&self) -> HookResult<Vec<PathBuf>> {
        let mut copies = Vec::with_capacity(self.files.len());
        for rel in &self.files {
            let dest = self.formatted_path(rel);
            copy_file(&self.original_path(rel), &dest)?;
            copies.push(dest);
        }
        Ok(copies)
    }

    /// Relative paths whose formatted copy differs byte-wise from the original
    pub fn changed_files(&self) -> HookResult<Vec<PathBuf>> {
        let mut changed = Vec::new();
        for rel in &self.files {
            let original = fs::read(self.original_path(rel))?;
            let formatted = fs::read(self.formatted_path(rel))?;
            if original != formatted {
                changed.push(rel.clone());
            }
        }
        Ok(changed)
    }

    /// Build the before/after trees for `files` the first time it is asked
    /// for, then hand out the same snapshot
    pub fn diff_snapshot(&mut self, files: &[PathBuf]) -> HookResult<&DiffSnapshot> {
        let snapshot = match self.snapshot.take() {
            Some(snapshot) => snapshot,
            None => {
                let base = self.dir.path().join(DIFF_DIR);
                for rel in files {
                    copy_file(
                        &self.original_path(rel),
                        &base.join(ORIGINAL_DIR).join(rel),
                    )?;
                    copy_file(
                        &self.formatted_path(rel),
                        &base.join(FORMATTED_DIR).join(rel),
                    )?;
                }
                DiffSnapshot {
                    base,
                    original: PathBuf::from(ORIGINAL_DIR),
                    formatted: PathBuf::from(FORMATTED_DIR),
                }
            }
        };
        Ok(self.snapshot.insert(snapshot))
    }

    /// Bring the working file of `rel` in line with its formatted copy.
    ///
    /// Only done when the working file still holds the staged content;
    /// returns `false` and leaves the file alone when it has unstaged edits.
    pub fn apply(&self, rel: &Path) -> HookResult<bool> {
        let working = self.working_path(rel);
        let Ok(current) = fs::read(&working) else {
            return Ok(false);
        };
        if current != fs::read(self.original_path(rel))? {
            return Ok(false);
        }
        copy_file(&self.formatted_path(rel), &working)?;
        Ok(true)
    }
}

fn copy_file(from: &Path, to: &Path) -> HookResult<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "class A {\n\tint x;\n}\n";
    const B: &str = "class B {}\n";

    /// Working tree and matching staged copies of two files
    fn setup() -> (TempDir, ScratchSpace) {
        let repo = TempDir::new().unwrap();
        fs::create_dir_all(repo.path().join("src/pkg")).unwrap();
        fs::write(repo.path().join("src/pkg/A.java"), A).unwrap();
        fs::write(repo.path().join("B.java"), B).unwrap();
        let files = ChangedFileSet::from_paths(
            vec![PathBuf::from("src/pkg/A.java"), PathBuf::from("B.java")],
            &["java".to_string()],
        );
        let scratch = ScratchSpace::create(repo.path(), &files).unwrap();
        for rel in files.iter() {
            copy_file(&repo.path().join(rel), &scratch.original_path(rel)).unwrap();
        }
        (repo, scratch)
    }

    #[test]
    fn test_populate_mirrors_layout() {
        let (_repo, scratch) = setup();
        let copies = scratch.populate().unwrap();

        assert_eq!(copies.len(), 2);
        assert!(copies[0].ends_with("formatted/src/pkg/A.java"));
        assert_eq!(fs::read_to_string(&copies[0]).unwrap(), A);
        assert!(scratch.changed_files().unwrap().is_empty());
    }

    #[test]
    fn test_populate_uses_staged_copy() {
        let (repo, scratch) = setup();
        fs::write(repo.path().join("B.java"), "class B { int unstaged; }\n").unwrap();
        scratch.populate().unwrap();

        assert_eq!(
            fs::read_to_string(scratch.formatted_path(Path::new("B.java"))).unwrap(),
            B
        );
        assert!(scratch.changed_files().unwrap().is_empty());
    }

    #[test]
    fn test_changed_files_detects_edits() {
        let (_repo, scratch) = setup();
        scratch.populate().unwrap();
        fs::write(
            scratch.formatted_path(Path::new("src/pkg/A.java")),
            "class A {\n    int x;\n}\n",
        )
        .unwrap();

        assert_eq!(
            scratch.changed_files().unwrap(),
            vec![PathBuf::from("src/pkg/A.java")]
        );
    }

    #[test]
    fn test_apply_copies_back() {
        let (repo, scratch) = setup();
        scratch.populate().unwrap();
        fs::write(scratch.formatted_path(Path::new("B.java")), "class B { }\n").unwrap();

        assert!(scratch.apply(Path::new("B.java")).unwrap());
        assert_eq!(
            fs::read_to_string(repo.path().join("B.java")).unwrap(),
            "class B { }\n"
        );
    }

    #[test]
    fn test_apply_skips_working_file_with_unstaged_edits() {
        let (repo, scratch) = setup();
        scratch.populate().unwrap();
        fs::write(scratch.formatted_path(Path::new("B.java")), "class B { }\n").unwrap();
        fs::write(repo.path().join("B.java"), "class B {}\n// wip\n").unwrap();

        assert!(!scratch.apply(Path::new("B.java")).unwrap());
        assert_eq!(
            fs::read_to_string(repo.path().join("B.java")).unwrap(),
            "class B {}\n// wip\n"
        );
    }

    #[test]
    fn test_diff_snapshot_built_once() {
        let (_repo, mut scratch) = setup();
        scratch.populate().unwrap();
        let rel = PathBuf::from("B.java");
        fs::write(scratch.formatted_path(&rel), "class B { }\n").unwrap();

        let first = scratch.diff_snapshot(&[rel.clone()]).unwrap().clone();
        assert_eq!(
            fs::read_to_string(first.base.join("original/B.java")).unwrap(),
            B
        );
        assert_eq!(
            fs::read_to_string(first.base.join("formatted/B.java")).unwrap(),
            "class B { }\n"
        );

        // Later edits to the scratch copy do not rebuild the snapshot
        fs::write(scratch.formatted_path(&rel), "class B {  }\n").unwrap();
        let second = scratch.diff_snapshot(&[rel]).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(
            fs::read_to_string(second.base.join("formatted/B.java")).unwrap(),
            "class B { }\n"
        );
    }

    #[test]
    fn test_dropping_removes_directory() {
        let (_repo, scratch) = setup();
        scratch.populate().unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }
}
