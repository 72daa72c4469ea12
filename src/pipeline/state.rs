use std::fmt;

use serde::Serialize;

/// Lifecycle of one comparison request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ComparisonState {
    AwaitingImages,
    LandmarksRequested,
    RealignmentRequested,
    MetricsComputed,
    CommentaryRequested,
    Complete,
    Failed(&'static str),
}

impl ComparisonState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComparisonState::Complete | ComparisonState::Failed(_))
    }

    pub fn can_transition_to(&self, next: ComparisonState) -> bool {
        use ComparisonState::*;
        match (self, next) {
            (Complete, _) | (Failed(_), _) => false,
            (_, Failed(_)) => true,
            (AwaitingImages, LandmarksRequested) => true,
            // landmark-only comparisons skip detection
            (AwaitingImages, MetricsComputed) => true,
            (LandmarksRequested, RealignmentRequested) => true,
            (LandmarksRequested, MetricsComputed) => true,
            (RealignmentRequested, MetricsComputed) => true,
            (MetricsComputed, CommentaryRequested) => true,
            (MetricsComputed, Complete) => true,
            (CommentaryRequested, Complete) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ComparisonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonState::AwaitingImages => f.write_str("awaiting_images"),
            ComparisonState::LandmarksRequested => f.write_str("landmarks_requested"),
            ComparisonState::RealignmentRequested => f.write_str("realignment_requested"),
            ComparisonState::MetricsComputed => f.write_str("metrics_computed"),
            ComparisonState::CommentaryRequested => f.write_str("commentary_requested"),
            ComparisonState::Complete => f.write_str("complete"),
            ComparisonState::Failed(reason) => write!(f, "failed({reason})"),
        }
    }
}

/// Records the states one request walks through.
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: ComparisonState,
    history: Vec<ComparisonState>,
}

impl StateTracker {
    pub fn new() -> Self {
        StateTracker {
            current: ComparisonState::AwaitingImages,
            history: vec![ComparisonState::AwaitingImages],
        }
    }

    pub fn current(&self) -> ComparisonState {
        self.current
    }

    pub fn history(&self) -> &[ComparisonState] {
        &self.history
    }

    /// Moves to `next`; an illegal move is logged and ignored.
    pub fn advance(&mut self, next: ComparisonState) {
        if !self.current.can_transition_to(next) {
            tracing::warn!("ignoring comparison state change {} -> {}", self.current, next);
            return;
        }
        match next {
            ComparisonState::Failed(reason) => tracing::warn!("comparison {} -> failed: {reason}", self.current),
            _ => tracing::info!("comparison {} -> {}", self.current, next),
        }
        self.current = next;
        self.history.push(next);
    }

    pub fn into_history(self) -> Vec<ComparisonState> {
        self.history
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
