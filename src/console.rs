//! Terminal implementation of [`Console`]
//!
//! Menus and confirmations are read key by key in raw mode. crossterm reads
//! from the controlling terminal even when the hook's stdin is redirected,
//! which is what git hooks need. Output goes to stderr.

use std::io::{self, stderr, Write};

use console::style;
use crossterm::{
    cursor::{Hide, MoveToColumn, MoveUp, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, Clear, ClearType},
};

use crate::engine::{Console, ViolationReport};
use crate::menu::{Action, ActionMenu};
use crate::{HookError, HookResult};

/// Lines of checker output shown inline before pointing at the log file
const MAX_LOG_LINES: usize = 40;

/// [`Console`] on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalConsole {
    log_hint: Option<String>,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mention where the full checker output is kept when it gets cut short
    pub fn with_log_hint(mut self, hint: impl Into<String>) -> Self {
        self.log_hint = Some(hint.into());
        self
    }
}

/// Raw mode for as long as the guard lives
struct RawMode;

impl RawMode {
    fn enable() -> HookResult<Self> {
        terminal::enable_raw_mode()
            .map_err(|e| HookError::Terminal(format!("no controlling terminal: {}", e)))?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = execute!(stderr(), Show);
        let _ = terminal::disable_raw_mode();
    }
}

/// What a key press does to the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuKey {
    Move(usize),
    Choose(usize),
    Ignore,
}

/// Map a key to a menu effect; Esc, `q` and Ctrl+C pick Cancel
fn handle_menu_key(key: KeyEvent, selected: usize, menu: &ActionMenu) -> MenuKey {
    let total = menu.len();
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            menu.cancel_index().map_or(MenuKey::Ignore, MenuKey::Choose)
        }
        KeyCode::Esc | KeyCode::Char('q') => {
            menu.cancel_index().map_or(MenuKey::Ignore, MenuKey::Choose)
        }
        KeyCode::Enter => MenuKey::Choose(selected),
        KeyCode::Up | KeyCode::Char('k') => MenuKey::Move(move_selection(selected, total, -1)),
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
            MenuKey::Move(move_selection(selected, total, 1))
        }
        KeyCode::Char(c) => match c.to_digit(10) {
            Some(n) if n >= 1 && (n as usize) <= total => MenuKey::Choose(n as usize - 1),
            _ => MenuKey::Ignore,
        },
        _ => MenuKey::Ignore,
    }
}

/// Move selection with wrap-around
fn move_selection(current: usize, total: usize, delta: isize) -> usize {
    if total == 0 {
        return 0;
    }
    ((current as isize + delta).rem_euclid(total as isize)) as usize
}

/// `Some(answer)` once a key settles the question; Enter and Esc mean no
fn handle_confirm_key(key: KeyEvent) -> Option<bool> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(false),
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Enter | KeyCode::Esc => Some(false),
        _ => None,
    }
}

fn render_menu(menu: &ActionMenu, selected: usize) -> String {
    let mut output = String::new();
    for (i, action) in menu.actions().iter().enumerate() {
        let label = if action.is_flagged() {
            style(action.label()).yellow().to_string()
        } else {
            action.label().to_string()
        };
        if i == selected {
            output.push_str(&format!(
                "  {} {} {}\r\n",
                style("❯").cyan(),
                style(i + 1).cyan(),
                style(label).bold()
            ));
        } else {
            output.push_str(&format!("    {} {}\r\n", style(i + 1).dim(), label));
        }
    }
    output.push_str(&format!(
        "{}\r\n",
        style("  ↑↓ navigate │ enter select │ esc cancel").dim()
    ));
    output
}

fn read_key() -> HookResult<KeyEvent> {
    loop {
        match event::read().map_err(|e| HookError::Terminal(e.to_string()))? {
            Event::Key(key) if key.kind != KeyEventKind::Release => return Ok(key),
            _ => {}
        }
    }
}

fn terminal_error(e: io::Error) -> HookError {
    HookError::Terminal(e.to_string())
}

impl Console for TerminalConsole {
    fn present_menu(&mut self, menu: &ActionMenu) -> HookResult<Action> {
        let mut err = stderr();
        eprintln!();
        eprintln!("  {}", style("The formatter has changes for the staged files").cyan());

        let lines = menu.len() as u16 + 1;
        let mut selected = 0;
        let chosen = {
            let _raw = RawMode::enable()?;
            execute!(err, Hide).map_err(terminal_error)?;
            loop {
                write!(err, "{}", render_menu(menu, selected)).map_err(terminal_error)?;
                err.flush().map_err(terminal_error)?;

                let effect = handle_menu_key(read_key()?, selected, menu);
                if let MenuKey::Choose(index) = effect {
                    break index;
                }
                if let MenuKey::Move(index) = effect {
                    selected = index;
                }
                execute!(err, MoveUp(lines), MoveToColumn(0), Clear(ClearType::FromCursorDown))
                    .map_err(terminal_error)?;
            }
        };

        let action = menu
            .get(chosen)
            .ok_or_else(|| HookError::Terminal(format!("no menu entry {}", chosen + 1)))?;
        eprintln!("  {} {}", style("❯").cyan(), style(action.label()).bold());
        Ok(action)
    }

    fn confirm(&mut self, prompt: &str) -> HookResult<bool> {
        let mut err = stderr();
        write!(
            err,
            "  {} {} {} ",
            style("?").yellow().bold(),
            prompt,
            style("[y/N]").dim()
        )
        .map_err(terminal_error)?;
        err.flush().map_err(terminal_error)?;

        let answer = {
            let _raw = RawMode::enable()?;
            loop {
                if let Some(answer) = handle_confirm_key(read_key()?) {
                    break answer;
                }
            }
        };
        eprintln!("{}", if answer { "yes" } else { "no" });
        if !answer {
            eprintln!("  {} Cancelled", style("✗").dim());
        }
        Ok(answer)
    }

    fn info(&mut self, message: &str) {
        eprintln!("  {} {}", style("✓").green().bold(), style(message).green());
    }

    fn warn(&mut self, message: &str) {
        eprintln!("  {} {}", style("!").yellow().bold(), style(message).yellow());
    }

    fn violations(&mut self, report: &ViolationReport) {
        eprintln!(
            "  {} {}",
            style("✗").red().bold(),
            style(format!("Style violations in {}:", report.pass)).red()
        );
        for file in &report.files {
            eprintln!("      {}", style(file.display()).white().bold());
        }

        let lines: Vec<&str> = report.log.lines().collect();
        if lines.is_empty() {
            return;
        }
        eprintln!("{}", style("─".repeat(60)).dim());
        for line in lines.iter().take(MAX_LOG_LINES) {
            eprintln!("{}", line);
        }
        if lines.len() > MAX_LOG_LINES {
            let more = lines.len() - MAX_LOG_LINES;
            match &self.log_hint {
                Some(hint) => eprintln!("{}", style(format!("… {} more lines in {}", more, hint)).dim()),
                None => eprintln!("{}", style(format!("… {} more lines", more)).dim()),
            }
        }
        eprintln!("{}", style("─".repeat(60)).dim());
    }
}
