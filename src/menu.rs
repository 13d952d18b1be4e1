//! Actions offered to the user once the formatter has changes to show

use crate::config::FeatureToggles;
use crate::{AbortReason, Outcome};

/// One entry of the interactive menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Copy formatted files over the originals, stage them, commit
    Apply,
    /// Same as `Apply`, but the formatted files still violate
    ApplyViolating,
    /// Commit the staged content as it is
    CommitUnformatted,
    /// Same as `CommitUnformatted`, knowingly committing violations
    CommitUnformattedViolating,
    /// Show originals vs. formatted copies, then ask again
    ViewDiff,
    Cancel,
}

impl Action {
    /// Text shown in the menu
    pub fn label(&self) -> &'static str {
        match self {
            Action::Apply => "Apply formatter & commit",
            Action::ApplyViolating => "Apply formatter & commit (VIOLATES)",
            Action::CommitUnformatted => "Commit without formatting",
            Action::CommitUnformattedViolating => "Commit without formatting (VIOLATES)",
            Action::ViewDiff => "View diff",
            Action::Cancel => "Cancel",
        }
    }

    /// Whether choosing this ends the menu loop
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Action::ViewDiff)
    }

    /// Whether choosing this commits files that fail the checker
    pub fn is_flagged(&self) -> bool {
        matches!(
            self,
            Action::ApplyViolating | Action::CommitUnformattedViolating
        )
    }

    /// The run's outcome when this action is chosen; `None` for `ViewDiff`
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Action::Apply | Action::ApplyViolating => Some(Outcome::ProceedWithFormatting),
            Action::CommitUnformatted | Action::CommitUnformattedViolating => {
                Some(Outcome::ProceedWithoutFormatting)
            }
            Action::Cancel => Some(Outcome::Aborted(AbortReason::Cancelled)),
            Action::ViewDiff => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Ordered, duplicate-free list of actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMenu {
    actions: Vec<Action>,
}

impl ActionMenu {
    /// Build the menu for a run where the formatter has changes to offer.
    ///
    /// Exactly one apply variant (flagged when the formatted copies still
    /// violate), a commit-without-formatting entry when the originals are
    /// clean or, flagged, when violations may be overridden, then "View
    /// diff" and "Cancel".
    pub fn build(toggles: &FeatureToggles, violates_original: bool, violates_formatted: bool) -> Self {
        let mut actions = Vec::with_capacity(4);

        actions.push(if violates_formatted {
            Action::ApplyViolating
        } else {
            Action::Apply
        });

        if !violates_original {
            actions.push(Action::CommitUnformatted);
        } else if toggles.allow_violations {
            actions.push(Action::CommitUnformattedViolating);
        }

        actions.push(Action::ViewDiff);
        actions.push(Action::Cancel);

        Self { actions }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.actions.iter().map(Action::label).collect()
    }

    pub fn contains(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    pub fn get(&self, index: usize) -> Option<Action> {
        self.actions.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Position of `Cancel`, used when the user backs out of the menu
    pub fn cancel_index(&self) -> Option<usize> {
        self.actions.iter().position(|a| *a == Action::Cancel)
    }
}
