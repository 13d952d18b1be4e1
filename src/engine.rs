//! The decision engine
//!
//! Given the feature toggles and evidence about the changed files, decides
//! whether the commit proceeds with formatting, proceeds without it, or is
//! blocked. Evidence is pulled through [`Evidence`] one step at a time, in a
//! fixed order, and only when a decision depends on it: a short-circuit
//! means the later tools never run. All interaction goes through
//! [`Console`], so the engine itself does no terminal I/O.
//!
//! Rules, first match wins:
//!
//! 1. Checker and formatter both disabled: proceed, nothing touched.
//! 2. Formatter disabled: proceed if the checker is happy, otherwise block,
//!    or ask for confirmation when violations may be overridden.
//! 3. `skip_formatter_if_clean` and the originals pass: proceed without
//!    ever running the formatter.
//! 4. The formatted copies still violate and violations may not be
//!    overridden: block.
//! 5. The formatter changed nothing: proceed when clean, otherwise ask.
//! 6. Present the menu until a terminal action is picked.

use std::path::PathBuf;

use crate::config::FeatureToggles;
use crate::menu::{Action, ActionMenu};
use crate::{AbortReason, ChangedFileSet, CheckResult, HookResult, Outcome};

/// Which set of files a checker run looked at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// The files as staged
    Original,
    /// The scratch copies after formatting
    Formatted,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::Original => write!(f, "original files"),
            Pass::Formatted => write!(f, "formatted files"),
        }
    }
}

/// Violations found by one checker pass, for showing to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationReport {
    pub pass: Pass,
    pub files: Vec<PathBuf>,
    /// Captured checker output; empty when the pass was inferred rather
    /// than run
    pub log: String,
}

/// Source of the facts the engine decides on, plus the two side effects
/// the menu can trigger
pub trait Evidence {
    /// Run the checker on the original files
    fn check_original(&mut self) -> HookResult<CheckResult>;

    /// Copy the originals to scratch and run the formatter on the copies
    fn run_formatter(&mut self) -> HookResult<()>;

    /// Run the checker on the formatted copies
    fn check_formatted(&mut self) -> HookResult<CheckResult>;

    /// Whether any formatted copy differs from its original
    fn formatter_changed_files(&mut self) -> HookResult<bool>;

    /// What to tell the user about a violating pass
    fn violation_report(&self, pass: Pass) -> ViolationReport;

    /// Show originals vs. formatted copies
    fn show_diff(&mut self) -> HookResult<()>;

    /// Copy formatted files over the originals and stage them
    fn apply_formatting(&mut self) -> HookResult<()>;
}

/// The interactive surface
pub trait Console {
    /// Show the menu and block until one of its actions is picked
    fn present_menu(&mut self, menu: &ActionMenu) -> HookResult<Action>;

    /// Ask a yes/no question
    fn confirm(&mut self, prompt: &str) -> HookResult<bool>;

    fn info(&mut self, message: &str);

    fn warn(&mut self, message: &str);

    fn violations(&mut self, report: &ViolationReport);
}

/// Decision state for one run
pub struct Engine<'a> {
    toggles: FeatureToggles,
    files: &'a ChangedFileSet,
    original: CheckResult,
    formatted: CheckResult,
}

impl<'a> Engine<'a> {
    pub fn new(toggles: FeatureToggles, files: &'a ChangedFileSet) -> Self {
        Self {
            toggles,
            files,
            original: CheckResult::Unknown,
            formatted: CheckResult::Unknown,
        }
    }

    /// What is known about the original files so far
    pub fn original(&self) -> CheckResult {
        self.original
    }

    /// What is known about the formatted copies so far
    pub fn formatted(&self) -> CheckResult {
        self.formatted
    }

    /// Drive the run to its outcome
    #[tracing::instrument(skip_all, fields(files = self.files.len()))]
    pub fn run(&mut self, evidence: &mut dyn Evidence, console: &mut dyn Console) -> HookResult<Outcome> {
        let toggles = self.toggles;

        if self.files.is_empty() {
            tracing::debug!("no matching staged files");
            return Ok(Outcome::ProceedWithoutFormatting);
        }

        if !toggles.checker && !toggles.formatter {
            tracing::debug!("checker and formatter disabled");
            return Ok(Outcome::ProceedWithoutFormatting);
        }

        if !toggles.formatter {
            return self.checker_only(evidence, console);
        }

        if toggles.checker && toggles.skip_formatter_if_clean && !self.violates_original(evidence)? {
            console.info("Style check passed, formatter skipped");
            return Ok(Outcome::ProceedWithoutFormatting);
        }

        evidence.run_formatter()?;

        let violates_formatted = if toggles.checker {
            self.formatted = evidence.check_formatted()?;
            self.formatted == CheckResult::Violated
        } else {
            false
        };
        tracing::info!(formatted = %self.formatted, "formatted copies checked");

        if violates_formatted {
            if toggles.assume_original_violates && !self.original.is_known() {
                tracing::debug!("formatted copies violate, assuming originals do too");
                self.original = CheckResult::Violated;
            }
            if !toggles.allow_violations {
                console.violations(&evidence.violation_report(Pass::Formatted));
                return Ok(Outcome::Aborted(AbortReason::Violations));
            }
        }

        if !evidence.formatter_changed_files()? {
            if !violates_formatted {
                console.info("Files are already formatted");
                return Ok(Outcome::ProceedWithoutFormatting);
            }
            console.violations(&evidence.violation_report(Pass::Formatted));
            return self.confirm_violations(console, "The formatter cannot fix these violations. Commit anyway?");
        }

        let violates_original = toggles.checker && self.violates_original(evidence)?;
        let menu = ActionMenu::build(&toggles, violates_original, violates_formatted);
        if violates_formatted {
            console.violations(&evidence.violation_report(Pass::Formatted));
        }
        self.menu_loop(&menu, evidence, console)
    }

    /// Rule 2: no formatter, the checker alone decides
    fn checker_only(&mut self, evidence: &mut dyn Evidence, console: &mut dyn Console) -> HookResult<Outcome> {
        if !self.violates_original(evidence)? {
            console.info("Style check passed");
            return Ok(Outcome::ProceedWithoutFormatting);
        }

        console.violations(&evidence.violation_report(Pass::Original));
        if !self.toggles.allow_violations {
            return Ok(Outcome::Aborted(AbortReason::Violations));
        }
        self.confirm_violations(console, "Commit with style violations?")
    }

    fn confirm_violations(&self, console: &mut dyn Console, prompt: &str) -> HookResult<Outcome> {
        if console.confirm(prompt)? {
            console.warn("Committing files that violate the style rules");
            Ok(Outcome::ProceedWithoutFormatting)
        } else {
            Ok(Outcome::Aborted(AbortReason::Cancelled))
        }
    }

    fn menu_loop(
        &self,
        menu: &ActionMenu,
        evidence: &mut dyn Evidence,
        console: &mut dyn Console,
    ) -> HookResult<Outcome> {
        loop {
            let action = console.present_menu(menu)?;
            if !menu.contains(action) {
                tracing::warn!(%action, "ignoring action that is not on the menu");
                continue;
            }
            tracing::info!(%action, "action selected");

            match action {
                Action::ViewDiff => {
                    evidence.show_diff()?;
                    continue;
                }
                Action::Apply | Action::ApplyViolating => evidence.apply_formatting()?,
                Action::CommitUnformatted | Action::CommitUnformattedViolating | Action::Cancel => {}
            }

            if action.is_flagged() {
                console.warn("Committing files that violate the style rules");
            }
            if let Some(outcome) = action.outcome() {
                return Ok(outcome);
            }
        }
    }

    /// Collapse the original pass, running the checker only if nothing is
    /// known yet
    fn violates_original(&mut self, evidence: &mut dyn Evidence) -> HookResult<bool> {
        if !self.original.is_known() {
            self.original = evidence.check_original()?;
            tracing::info!(original = %self.original, "original files checked");
        }
        Ok(self.original == CheckResult::Violated)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted stand-ins for the engine's collaborators

    use super::*;
    use crate::HookError;
    use std::collections::VecDeque;

    /// Canned evidence that records every call
    #[derive(Debug, Default)]
    pub struct FakeEvidence {
        pub original: Option<CheckResult>,
        pub formatted: Option<CheckResult>,
        pub changed: bool,
        pub calls: Vec<&'static str>,
    }

    impl FakeEvidence {
        pub fn new(original: CheckResult, formatted: CheckResult, changed: bool) -> Self {
            Self {
                original: Some(original),
                formatted: Some(formatted),
                changed,
                calls: Vec::new(),
            }
        }

        pub fn called(&self, name: &str) -> bool {
            self.calls.contains(&name)
        }

        pub fn count(&self, name: &str) -> usize {
            self.calls.iter().filter(|c| **c == name).count()
        }
    }

    impl Evidence for FakeEvidence {
        fn check_original(&mut self) -> HookResult<CheckResult> {
            self.calls.push("check_original");
            Ok(self.original.unwrap_or(CheckResult::Clean))
        }

        fn run_formatter(&mut self) -> HookResult<()> {
            self.calls.push("run_formatter");
            Ok(())
        }

        fn check_formatted(&mut self) -> HookResult<CheckResult> {
            assert!(
                self.called("run_formatter"),
                "formatted copies checked before the formatter ran"
            );
            self.calls.push("check_formatted");
            Ok(self.formatted.unwrap_or(CheckResult::Clean))
        }

        fn formatter_changed_files(&mut self) -> HookResult<bool> {
            self.calls.push("formatter_changed_files");
            Ok(self.changed)
        }

        fn violation_report(&self, pass: Pass) -> ViolationReport {
            ViolationReport {
                pass,
                files: vec![PathBuf::from("A.java")],
                log: "A.java:1: bad".to_string(),
            }
        }

        fn show_diff(&mut self) -> HookResult<()> {
            self.calls.push("show_diff");
            Ok(())
        }

        fn apply_formatting(&mut self) -> HookResult<()> {
            self.calls.push("apply_formatting");
            Ok(())
        }
    }

    /// Console answering from a script
    #[derive(Debug, Default)]
    pub struct ScriptedConsole {
        pub choices: VecDeque<Action>,
        pub answers: VecDeque<bool>,
        pub menus: Vec<Vec<Action>>,
        pub prompts: Vec<String>,
        pub infos: Vec<String>,
        pub warnings: Vec<String>,
        pub reports: Vec<ViolationReport>,
    }

    impl ScriptedConsole {
        pub fn choosing(choices: &[Action]) -> Self {
            Self {
                choices: choices.iter().copied().collect(),
                ..Default::default()
            }
        }

        pub fn answering(answer: bool) -> Self {
            Self {
                answers: VecDeque::from([answer]),
                ..Default::default()
            }
        }

        pub fn was_prompted(&self) -> bool {
            !self.menus.is_empty() || !self.prompts.is_empty()
        }
    }

    impl Console for ScriptedConsole {
        fn present_menu(&mut self, menu: &ActionMenu) -> HookResult<Action> {
            self.menus.push(menu.actions().to_vec());
            self.choices
                .pop_front()
                .ok_or_else(|| HookError::Terminal("menu script exhausted".to_string()))
        }

        fn confirm(&mut self, prompt: &str) -> HookResult<bool> {
            self.prompts.push(prompt.to_string());
            self.answers
                .pop_front()
                .ok_or_else(|| HookError::Terminal("confirm script exhausted".to_string()))
        }

        fn info(&mut self, message: &str) {
            self.infos.push(message.to_string());
        }

        fn warn(&mut self, message: &str) {
            self.warnings.push(message.to_string());
        }

        fn violations(&mut self, report: &ViolationReport) {
            self.reports.push(report.clone());
        }
    }
}
