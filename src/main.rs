//! Stylegate CLI - style checker and autoformatter as a git pre-commit hook
//!
//! Usage:
//!   stylegate                 # Run the hook (same as `stylegate run`)
//!   stylegate check [--json]  # Only run the checker on staged files
//!   stylegate install         # Install .git/hooks/pre-commit
//!   stylegate uninstall       # Remove it again

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use console::style;

use stylegate::{
    install_hook, run_check, run_hook, uninstall_hook, AbortReason, CommandSpec, ConfigLayer, GitCli,
    HookConfig, HookResult, Outcome, SystemRunner, TerminalConsole, Vcs, CONFIG_FILE_NAME,
};

#[derive(Parser)]
#[command(name = "stylegate")]
#[command(about = "Gate commits on a style checker and offer autoformatter fixes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to .stylegate.toml in the repository root)
    #[arg(long, global = true, value_name = "FILE", env = "STYLEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pre-commit hook
    Run,
    /// Run only the checker over the staged files, never prompting
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Install the pre-commit hook into the current repository
    Install {
        /// Replace an existing hook not written by stylegate
        #[arg(long)]
        force: bool,
    },
    /// Remove the pre-commit hook installed by stylegate
    Uninstall,
}

/// Settings taking precedence over the config file
#[derive(Args, Default)]
struct Overrides {
    /// Enable the style checker
    #[arg(long, global = true, env = "STYLEGATE_CHECKER", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    checker: Option<bool>,

    /// Enable the autoformatter
    #[arg(long, global = true, env = "STYLEGATE_FORMATTER", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    formatter: Option<bool>,

    /// Skip the formatter when the staged files already pass the checker
    #[arg(long, global = true, env = "STYLEGATE_SKIP_FORMATTER_IF_CLEAN", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    skip_formatter_if_clean: Option<bool>,

    /// Allow committing files that fail the checker after confirmation
    #[arg(long, global = true, env = "STYLEGATE_ALLOW_VIOLATIONS", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    allow_violations: Option<bool>,

    /// Treat the originals as violating when the formatted copies do
    #[arg(long, global = true, env = "STYLEGATE_ASSUME_ORIGINAL_VIOLATES", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    assume_original_violates: Option<bool>,

    /// Checker command line; `{config}` expands to the checker config
    #[arg(long, global = true, env = "STYLEGATE_CHECKER_COMMAND", value_name = "COMMAND")]
    checker_command: Option<String>,

    #[arg(long, global = true, env = "STYLEGATE_CHECKER_CONFIG", value_name = "FILE")]
    checker_config: Option<PathBuf>,

    /// Formatter command line; `{config}` expands to the formatter config
    #[arg(long, global = true, env = "STYLEGATE_FORMATTER_COMMAND", value_name = "COMMAND")]
    formatter_command: Option<String>,

    #[arg(long, global = true, env = "STYLEGATE_FORMATTER_CONFIG", value_name = "FILE")]
    formatter_config: Option<PathBuf>,

    /// File extensions to check (comma separated, repeatable)
    #[arg(long = "extension", global = true, env = "STYLEGATE_EXTENSIONS", value_delimiter = ',', value_name = "EXT")]
    extensions: Vec<String>,

    /// Viewer run with the original and formatted directories
    #[arg(long, global = true, env = "STYLEGATE_DIFF_COMMAND", value_name = "COMMAND")]
    diff_command: Option<String>,

    /// Give up on a checker or formatter run after this many seconds
    #[arg(long, global = true, env = "STYLEGATE_TOOL_TIMEOUT", value_name = "SECS")]
    tool_timeout: Option<u64>,

    /// Checker log location (relative paths are inside the git directory)
    #[arg(long, global = true, env = "STYLEGATE_LOG_FILE", value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Overrides {
    fn into_layer(self) -> ConfigLayer {
        ConfigLayer {
            checker: self.checker,
            formatter: self.formatter,
            skip_formatter_if_clean: self.skip_formatter_if_clean,
            allow_violations: self.allow_violations,
            assume_original_violates: self.assume_original_violates,
            checker_command: self.checker_command.map(CommandSpec::Line),
            checker_config: self.checker_config,
            formatter_command: self.formatter_command.map(CommandSpec::Line),
            formatter_config: self.formatter_config,
            extensions: (!self.extensions.is_empty()).then_some(self.extensions),
            diff_command: self.diff_command.map(CommandSpec::Line),
            tool_timeout: self.tool_timeout,
            log_file: self.log_file,
        }
    }
}

fn main() -> ExitCode {
    // Enable virtual terminal processing on Windows for ANSI support
    #[cfg(windows)]
    let _ = crossterm::ansi_support::supports_ansi();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("  {} {}", style("✗").red().bold(), style(e).red());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("STYLEGATE_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init();

    tracing::debug!("logging initialized at level {}", level);
}

fn run(cli: Cli) -> HookResult<u8> {
    let runner = SystemRunner;
    let git = GitCli::discover(&runner, env::current_dir()?)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = load_config(git.repo_root(), cli.config, cli.overrides)?;
            let hint = config.log_path(&git.git_dir()?);
            let mut console = TerminalConsole::new().with_log_hint(hint.display().to_string());

            let outcome = run_hook(&config, &git, &runner, &mut console)?;
            report_outcome(outcome);
            Ok(exit_status(outcome.exit_code()))
        }
        Commands::Check { json } => {
            let config = load_config(git.repo_root(), cli.config, cli.overrides)?;
            let report = run_check(&config, &git, &runner)?;
            if json {
                let text = serde_json::to_string_pretty(&report).map_err(io::Error::from)?;
                println!("{}", text);
            } else if report.files.is_empty() {
                eprintln!("  {} No staged files to check", style("✓").green().bold());
            } else if report.exit_code() == 0 {
                eprintln!(
                    "  {} {}",
                    style("✓").green().bold(),
                    style(format!("Style check passed ({} files)", report.files.len())).green()
                );
            } else {
                eprintln!("  {} {}", style("✗").red().bold(), style("Style violations:").red());
                eprint!("{}", report.log);
            }
            Ok(exit_status(report.exit_code()))
        }
        Commands::Install { force } => {
            let path = install_hook(&git.hooks_dir()?, &env::current_exe()?, force)?;
            eprintln!(
                "  {} Installed {}",
                style("✓").green().bold(),
                style(path.display()).white().bold()
            );
            Ok(0)
        }
        Commands::Uninstall => {
            if uninstall_hook(&git.hooks_dir()?)? {
                eprintln!("  {} Removed pre-commit hook", style("✓").green().bold());
            } else {
                eprintln!("  {} No stylegate hook installed", style("!").yellow().bold());
            }
            Ok(0)
        }
    }
}

/// Defaults, then the config file, then environment and flags
fn load_config(
    repo_root: &Path,
    file: Option<PathBuf>,
    overrides: Overrides,
) -> HookResult<HookConfig> {
    let file_layer = match file {
        Some(path) => ConfigLayer::load(&path)?,
        None => {
            let path = repo_root.join(CONFIG_FILE_NAME);
            if path.is_file() {
                ConfigLayer::load(&path)?
            } else {
                ConfigLayer::default()
            }
        }
    };
    HookConfig::resolve(repo_root, file_layer.overlay(overrides.into_layer()))
}

fn report_outcome(outcome: Outcome) {
    match outcome {
        Outcome::ProceedWithFormatting => eprintln!(
            "  {} {}",
            style("✓").green().bold(),
            style("Formatting applied").green()
        ),
        Outcome::ProceedWithoutFormatting => {}
        Outcome::Aborted(reason) => {
            let message = match reason {
                AbortReason::Cancelled => "Commit cancelled",
                AbortReason::Violations => "Commit blocked by style violations",
            };
            eprintln!("  {} {}", style("✗").red().bold(), style(message).red());
        }
    }
}

fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
