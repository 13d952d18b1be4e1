//! Hook configuration: feature toggles, tool commands and config layering
//!
//! Values come from three layers, lowest precedence first: built-in
//! defaults, an optional `.stylegate.toml` at the repository root, and the
//! command line (which also reads `STYLEGATE_*` environment variables).
//! Everything is resolved once into an immutable [`HookConfig`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{HookError, HookResult};

/// Name of the optional per-repository config file
pub const CONFIG_FILE_NAME: &str = ".stylegate.toml";

/// Placeholder replaced by the tool's config path
const CONFIG_PLACEHOLDER: &str = "{config}";

const DEFAULT_CHECKER_COMMAND: &str = "checkstyle -c {config}";
const DEFAULT_CHECKER_CONFIG: &str = "checkstyle.xml";
const DEFAULT_FORMATTER_COMMAND: &str = "google-java-format --replace";
const DEFAULT_FORMATTER_CONFIG: &str = "formatter.xml";
const DEFAULT_DIFF_COMMAND: &str = "git diff --no-index --";
const DEFAULT_EXTENSION: &str = "java";
const DEFAULT_LOG_FILE: &str = "stylegate.log";

/// Switches fixed before the run starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureToggles {
    /// Run the style checker
    pub checker: bool,
    /// Run the autoformatter on scratch copies
    pub formatter: bool,
    /// Skip the formatter entirely when the originals already pass the checker
    pub skip_formatter_if_clean: bool,
    /// Let the user commit files that still violate the style rules
    pub allow_violations: bool,
    /// Treat the originals as violating when the formatted copies violate,
    /// instead of running the checker on the originals as well.
    /// Assumes the formatter never introduces violations.
    pub assume_original_violates: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            checker: true,
            formatter: true,
            skip_formatter_if_clean: false,
            allow_violations: false,
            assume_original_violates: true,
        }
    }
}

/// An external command line: program plus leading arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Split a command line into words with shell quoting rules, so
    /// `"/opt/my tools/fmt" --replace` keeps the quoted path whole
    pub fn parse(line: &str) -> Result<Self, String> {
        let words = shell_words::split(line).map_err(|e| e.to_string())?;
        Self::from_words(words).ok_or_else(|| "command must not be empty".to_string())
    }

    /// Program and arguments given word by word; `None` when there are none
    pub fn from_words(words: Vec<String>) -> Option<Self> {
        let mut words = words.into_iter();
        let program = words.next().filter(|p| !p.is_empty())?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }

    /// Arguments for one invocation: `{config}` substituted, then the files
    pub fn arguments(&self, config: Option<&Path>, files: &[PathBuf]) -> Vec<OsString> {
        let mut out: Vec<OsString> = Vec::with_capacity(self.args.len() + files.len());
        for arg in &self.args {
            match config {
                Some(config) if arg.contains(CONFIG_PLACEHOLDER) => {
                    let config = config.to_string_lossy();
                    out.push(arg.replace(CONFIG_PLACEHOLDER, &config).into());
                }
                _ => out.push(arg.into()),
            }
        }
        out.extend(files.iter().map(|f| f.as_os_str().to_os_string()));
        out
    }

    pub fn display(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(&self.args))
    }
}

/// A command as written in configuration: one shell-style line, or an
/// array of words taken verbatim
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Words(Vec<String>),
}

impl CommandSpec {
    pub fn into_command(self) -> Result<ToolCommand, String> {
        match self {
            CommandSpec::Line(line) => ToolCommand::parse(&line),
            CommandSpec::Words(words) => {
                ToolCommand::from_words(words).ok_or_else(|| "command must not be empty".to_string())
            }
        }
    }
}

impl From<&str> for CommandSpec {
    fn from(line: &str) -> Self {
        CommandSpec::Line(line.to_string())
    }
}

/// A tool command together with the style config it is pointed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub command: ToolCommand,
    pub config_path: PathBuf,
}

impl ToolConfig {
    pub fn arguments(&self, files: &[PathBuf]) -> Vec<OsString> {
        self.command.arguments(Some(&self.config_path), files)
    }
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone)]
pub struct HookConfig {
    pub toggles: FeatureToggles,
    pub checker: ToolConfig,
    pub formatter: ToolConfig,
    /// File extensions (without the dot) the hook looks at
    pub extensions: Vec<String>,
    /// Viewer invoked with two directories: originals, then formatted copies
    pub diff_command: ToolCommand,
    /// Upper bound for a single checker/formatter run; `None` blocks
    pub tool_timeout: Option<Duration>,
    /// Where captured checker output is kept; relative paths are taken
    /// from the git directory
    pub log_file: PathBuf,
}

/// One layer of optional settings, as read from the config file or the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigLayer {
    pub checker: Option<bool>,
    pub formatter: Option<bool>,
    pub skip_formatter_if_clean: Option<bool>,
    pub allow_violations: Option<bool>,
    pub assume_original_violates: Option<bool>,
    pub checker_command: Option<CommandSpec>,
    pub checker_config: Option<PathBuf>,
    pub formatter_command: Option<CommandSpec>,
    pub formatter_config: Option<PathBuf>,
    pub extensions: Option<Vec<String>>,
    pub diff_command: Option<CommandSpec>,
    /// Seconds; 0 disables the timeout
    pub tool_timeout: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl ConfigLayer {
    /// Read a layer from a TOML file
    pub fn load(path: &Path) -> HookResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> HookResult<Self> {
        toml::from_str(text).map_err(|e| HookError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Combine with a higher-precedence layer; its values win where set
    pub fn overlay(self, higher: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            checker: higher.checker.or(self.checker),
            formatter: higher.formatter.or(self.formatter),
            skip_formatter_if_clean: higher.skip_formatter_if_clean.or(self.skip_formatter_if_clean),
            allow_violations: higher.allow_violations.or(self.allow_violations),
            assume_original_violates: higher
                .assume_original_violates
                .or(self.assume_original_violates),
            checker_command: higher.checker_command.or(self.checker_command),
            checker_config: higher.checker_config.or(self.checker_config),
            formatter_command: higher.formatter_command.or(self.formatter_command),
            formatter_config: higher.formatter_config.or(self.formatter_config),
            extensions: higher.extensions.or(self.extensions),
            diff_command: higher.diff_command.or(self.diff_command),
            tool_timeout: higher.tool_timeout.or(self.tool_timeout),
            log_file: higher.log_file.or(self.log_file),
        }
    }
}

impl HookConfig {
    /// Apply a merged layer on top of the defaults. Relative tool config
    /// paths are resolved against `repo_root`.
    pub fn resolve(repo_root: &Path, layer: ConfigLayer) -> HookResult<Self> {
        let defaults = FeatureToggles::default();
        let toggles = FeatureToggles {
            checker: layer.checker.unwrap_or(defaults.checker),
            formatter: layer.formatter.unwrap_or(defaults.formatter),
            skip_formatter_if_clean: layer
                .skip_formatter_if_clean
                .unwrap_or(defaults.skip_formatter_if_clean),
            allow_violations: layer.allow_violations.unwrap_or(defaults.allow_violations),
            assume_original_violates: layer
                .assume_original_violates
                .unwrap_or(defaults.assume_original_violates),
        };

        let checker = ToolConfig {
            command: parse_command(
                "checker-command",
                layer.checker_command.unwrap_or_else(|| DEFAULT_CHECKER_COMMAND.into()),
            )?,
            config_path: repo_root.join(
                layer
                    .checker_config
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKER_CONFIG)),
            ),
        };
        let formatter = ToolConfig {
            command: parse_command(
                "formatter-command",
                layer.formatter_command.unwrap_or_else(|| DEFAULT_FORMATTER_COMMAND.into()),
            )?,
            config_path: repo_root.join(
                layer
                    .formatter_config
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FORMATTER_CONFIG)),
            ),
        };
        let diff_command = parse_command(
            "diff-command",
            layer.diff_command.unwrap_or_else(|| DEFAULT_DIFF_COMMAND.into()),
        )?;

        let extensions: Vec<String> = layer
            .extensions
            .unwrap_or_else(|| vec![DEFAULT_EXTENSION.to_string()])
            .into_iter()
            .flat_map(|e| {
                e.split(',')
                    .map(|s| s.trim().trim_start_matches('.').to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|e| !e.is_empty())
            .collect();
        if extensions.is_empty() {
            return Err(HookError::Config {
                path: PathBuf::from("extensions"),
                message: "at least one file extension is required".to_string(),
            });
        }

        Ok(Self {
            toggles,
            checker,
            formatter,
            extensions,
            diff_command,
            tool_timeout: layer
                .tool_timeout
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            log_file: layer
                .log_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        })
    }

    /// Location of the checker log for a repository whose git directory
    /// is `git_dir`
    pub fn log_path(&self, git_dir: &Path) -> PathBuf {
        if self.log_file.is_absolute() {
            self.log_file.clone()
        } else {
            git_dir.join(&self.log_file)
        }
    }
}

fn parse_command(key: &str, spec: CommandSpec) -> HookResult<ToolCommand> {
    spec.into_command().map_err(|message| HookError::Config {
        path: PathBuf::from(key),
        message,
    })
}
