//! Throwaway git repositories wired to the fixture tools

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Path to the built binary
pub fn binary_path() -> &'static str {
    env!("CARGO_BIN_EXE_stylegate")
}

/// Path to a stand-in tool under fixtures/tools
pub fn tool(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures/tools")
        .join(name)
}

pub struct Repo {
    dir: TempDir,
}

impl Repo {
    /// New repository with a `.stylegate.toml` pointing at the fixture
    /// checker and formatter
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let repo = Repo { dir };
        repo.git(&["init", "-q"]);
        repo.git(&["config", "user.email", "dev@example.com"]);
        repo.git(&["config", "user.name", "Dev"]);

        let config = format!(
            "checker-command = [\"sh\", {:?}, \"-c\", \"{{config}}\"]\nformatter-command = [\"sh\", {:?}]\n",
            tool("check.sh").to_string_lossy(),
            tool("format.sh").to_string_lossy()
        );
        fs::write(repo.path().join(".stylegate.toml"), config).expect("Failed to write config");
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git(&self, args: &[&str]) -> Output {
        Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("Failed to run git")
    }

    /// Write `content` to `name` and stage it
    pub fn stage(&self, name: &str, content: &str) {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directories");
        }
        fs::write(&path, content).expect("Failed to write file");
        self.git(&["add", name]);
    }

    /// Write `content` to `name` without staging it
    pub fn write(&self, name: &str, content: &str) {
        fs::write(self.path().join(name), content).expect("Failed to write file");
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name)).expect("Failed to read file")
    }

    /// Content of `name` in the index
    pub fn staged(&self, name: &str) -> String {
        let out = self.git(&["show", &format!(":{}", name)]);
        String::from_utf8_lossy(&out.stdout).into_owned()
    }

    /// Command for the binary inside this repository, isolated from any
    /// STYLEGATE_* settings of the calling environment
    pub fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(binary_path());
        command.args(args).current_dir(self.path());
        for (key, _) in std::env::vars() {
            if key.starts_with("STYLEGATE_") {
                command.env_remove(key);
            }
        }
        command
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("Failed to run stylegate")
    }
}

pub const UNFORMATTED: &str = "class Main {\n\tint x;\n}\n";
pub const FORMATTED: &str = "class Main {\n    int x;\n}\n";
pub const UNFIXABLE: &str = "class Main {\n    int VIOLATION;\n}\n";
