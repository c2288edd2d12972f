//! Connection set for matching questions.
//!
//! The board holds at most one connection per left item. Right items are
//! unconstrained: several left items may point at the same right item.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::Submission;

/// A single left → right link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Connection {
    pub left: usize,
    pub right: usize,
}

impl Connection {
    #[must_use]
    pub fn new(left: usize, right: usize) -> Self {
        Self { left, right }
    }
}

/// What a left-side selection did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeftSelection {
    /// The item was connected; its connection was removed.
    Disconnected(Connection),
    /// The item is now waiting for a right-side target.
    Pending(usize),
    /// The item was already pending; the pending state was dropped.
    Cancelled(usize),
}

/// Outcome of grading a connection set against ground truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGrade {
    pub is_correct: bool,
    /// One entry per left index present in the ground truth.
    pub per_left: BTreeMap<usize, bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchingBoard {
    pending_left: Option<usize>,
    connections: BTreeMap<usize, usize>,
}

impl MatchingBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle a left item.
    ///
    /// A connected item loses its connection; a pending item stops pending;
    /// anything else becomes the pending selection.
    pub fn select_left(&mut self, index: usize) -> LeftSelection {
        if let Some(right) = self.connections.remove(&index) {
            self.pending_left = None;
            return LeftSelection::Disconnected(Connection::new(index, right));
        }
        if self.pending_left == Some(index) {
            self.pending_left = None;
            return LeftSelection::Cancelled(index);
        }
        self.pending_left = Some(index);
        LeftSelection::Pending(index)
    }

    /// Connect the pending left item to `index`, replacing its prior link.
    ///
    /// Returns `None` (and changes nothing) when no left item is pending.
    pub fn select_right(&mut self, index: usize) -> Option<Connection> {
        let left = self.pending_left.take()?;
        self.connections.insert(left, index);
        Some(Connection::new(left, index))
    }

    /// Link `left` to `right` directly, bypassing the pending step.
    pub fn connect(&mut self, left: usize, right: usize) -> Option<usize> {
        if self.pending_left == Some(left) {
            self.pending_left = None;
        }
        self.connections.insert(left, right)
    }

    #[must_use]
    pub fn pending_left(&self) -> Option<usize> {
        self.pending_left
    }

    #[must_use]
    pub fn connection_for(&self, left: usize) -> Option<usize> {
        self.connections.get(&left).copied()
    }

    /// Connections ordered by left index.
    #[must_use]
    pub fn connections(&self) -> Vec<Connection> {
        self.connections
            .iter()
            .map(|(&left, &right)| Connection::new(left, right))
            .collect()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn user_matches(&self) -> &BTreeMap<usize, usize> {
        &self.connections
    }

    pub fn clear(&mut self) {
        self.pending_left = None;
        self.connections.clear();
    }

    #[must_use]
    pub fn grade_all(&self, correct_matches: &BTreeMap<usize, usize>) -> MatchGrade {
        grade_matches(&self.connections, correct_matches)
    }

    #[must_use]
    pub fn missing_connections(&self, correct_matches: &BTreeMap<usize, usize>) -> Vec<Connection> {
        missing_connections(&self.connections, correct_matches)
    }

    /// Freeze the current connections into a submission. Pending state is dropped.
    #[must_use]
    pub fn into_submission(self) -> Submission {
        Submission::Matching(self.connections)
    }

    #[must_use]
    pub fn to_submission(&self) -> Submission {
        Submission::Matching(self.connections.clone())
    }
}

/// Grade user connections against the required set.
///
/// Each ground-truth left index is scored; left items without ground truth are
/// never scored. Full correctness also requires the user's connection count to
/// equal the required count, so stray extra links fail the question.
#[must_use]
pub fn grade_matches(
    user_matches: &BTreeMap<usize, usize>,
    correct_matches: &BTreeMap<usize, usize>,
) -> MatchGrade {
    let per_left: BTreeMap<usize, bool> = correct_matches
        .iter()
        .map(|(left, right)| (*left, user_matches.get(left) == Some(right)))
        .collect();
    let is_correct =
        per_left.values().all(|ok| *ok) && user_matches.len() == correct_matches.len();

    MatchGrade {
        is_correct,
        per_left,
    }
}

/// Required pairs the user did not supply exactly, ordered by left index.
#[must_use]
pub fn missing_connections(
    user_matches: &BTreeMap<usize, usize>,
    correct_matches: &BTreeMap<usize, usize>,
) -> Vec<Connection> {
    correct_matches
        .iter()
        .filter(|(left, right)| user_matches.get(*left) != Some(*right))
        .map(|(&left, &right)| Connection::new(left, right))
        .collect()
}
