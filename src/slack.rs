//! Drag and resize tracking with elastic clamping ("slack").
//!
//! DESIGN
//! ======
//! While a gesture is in flight every pointer delta is folded into a
//! per-card [`DragTrackingState`]. Nothing touches the shared document until
//! release: the tracker only produces provisional positions or sizes for
//! rendering, and [`DragTrackingState::commit`] yields the final snapped
//! values for the card lifecycle to write.
//!
//! The part of a delta that clamping absorbs is kept as slack instead of
//! being dropped. A later delta in the opposite direction has to pay the
//! slack back before the card moves again, so the board edge feels like a
//! rubber band rather than a wall.
//!
//! Resizing pins the card origin. A delta that would grow the far edge off
//! the board is rejected outright for that axis and accrues no slack.
//! Shrinking is always accepted, and commit fits the snapped size back on
//! the board, so a card that starts out overhanging the edge still commits
//! inside it.

#[cfg(test)]
#[path = "slack_test.rs"]
mod tests;

use std::collections::HashMap;

use crate::consts::{BOARD_HEIGHT, BOARD_WIDTH};
use crate::content::SizeConstraints;
use crate::doc::{Card, CardId, Size};
use crate::grid::{fit_coordinate, fit_measure};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackingError {
    #[error("no gesture is being tracked for card {0}")]
    InvalidState(CardId),
    #[error("no gesture is being tracked")]
    NoGesture,
    #[error("card {0} is already being resized")]
    ResizeInProgress(CardId),
    #[error("card {0} is already being moved")]
    MoveInProgress(CardId),
}

impl crate::error::ErrorCode for TrackingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidState(_) | Self::NoGesture => "E_TRACKING_IDLE",
            Self::ResizeInProgress(_) => "E_TRACKING_RESIZING",
            Self::MoveInProgress(_) => "E_TRACKING_MOVING",
        }
    }
}

/// In-flight move of one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moving {
    /// Provisional left edge, always on the board.
    pub move_x: i32,
    /// Provisional top edge, always on the board.
    pub move_y: i32,
    /// Horizontal overshoot past an edge, paid back before `move_x` moves again.
    pub slack_x: i32,
    /// Vertical overshoot past an edge.
    pub slack_y: i32,
    /// Resolved width, used for the right-edge bound.
    pub width: i32,
    /// Resolved height, used for the bottom-edge bound.
    pub height: i32,
}

/// In-flight resize of one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resizing {
    /// Pinned left edge.
    pub x: i32,
    /// Pinned top edge.
    pub y: i32,
    /// Provisional width.
    pub resize_width: i32,
    /// Provisional height.
    pub resize_height: i32,
    /// Width overshoot past the type's limits.
    pub slack_width: i32,
    /// Height overshoot past the type's limits.
    pub slack_height: i32,
    /// Smallest width the content type allows.
    pub min_width: i32,
    /// Smallest height the content type allows.
    pub min_height: i32,
    /// Largest width the content type allows, never below `min_width`.
    pub max_width: i32,
    /// Largest height the content type allows, never below `min_height`.
    pub max_height: i32,
}

/// Tracking state for a single card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragTrackingState {
    /// No gesture in flight.
    #[default]
    Idle,
    /// The card is being dragged.
    Moving(Moving),
    /// The card is being resized from its far corner.
    Resizing(Resizing),
}

/// Provisional geometry for rendering. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisional {
    /// Unsnapped origin of a moving card.
    Position { x: i32, y: i32 },
    /// Unsnapped size of a resizing card.
    Size { width: i32, height: i32 },
}

/// Final snapped values produced on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// Snapped origin to write with a move.
    Move { x: i32, y: i32 },
    /// Snapped measures to write with a resize.
    Resize { width: i32, height: i32 },
}

// =============================================================================
// SINGLE-CARD TRACKING
// =============================================================================

impl DragTrackingState {
    /// Start moving `card`, whose resolved size is `size`.
    #[must_use]
    pub fn begin_move(card: &Card, size: Size) -> Self {
        Self::Moving(Moving {
            move_x: card.x,
            move_y: card.y,
            slack_x: 0,
            slack_y: 0,
            width: size.width,
            height: size.height,
        })
    }

    /// Start resizing `card` from `size` within `constraints`.
    #[must_use]
    pub fn begin_resize(card: &Card, size: Size, constraints: SizeConstraints) -> Self {
        Self::Resizing(Resizing {
            x: card.x,
            y: card.y,
            resize_width: size.width,
            resize_height: size.height,
            slack_width: 0,
            slack_height: 0,
            min_width: constraints.min_width,
            min_height: constraints.min_height,
            max_width: constraints.max_width.max(constraints.min_width),
            max_height: constraints.max_height.max(constraints.min_height),
        })
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Fold a raw pointer delta into the tracked geometry.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::InvalidState`] when nothing is being tracked.
    pub fn apply_delta(&mut self, id: CardId, dx: i32, dy: i32) -> Result<Provisional, TrackingError> {
        match self {
            Self::Idle => Err(TrackingError::InvalidState(id)),
            Self::Moving(m) => {
                if dx != 0 || dy != 0 {
                    (m.move_x, m.slack_x) = absorb(m.move_x, m.slack_x, dx, 0, BOARD_WIDTH - m.width);
                    (m.move_y, m.slack_y) = absorb(m.move_y, m.slack_y, dy, 0, BOARD_HEIGHT - m.height);
                }
                Ok(Provisional::Position { x: m.move_x, y: m.move_y })
            }
            Self::Resizing(r) => {
                if dx != 0 || dy != 0 {
                    (r.resize_width, r.slack_width) = absorb_pinned(
                        r.resize_width,
                        r.slack_width,
                        dx,
                        (r.min_width, r.max_width),
                        r.x,
                        BOARD_WIDTH,
                    );
                    (r.resize_height, r.slack_height) = absorb_pinned(
                        r.resize_height,
                        r.slack_height,
                        dy,
                        (r.min_height, r.max_height),
                        r.y,
                        BOARD_HEIGHT,
                    );
                }
                Ok(Provisional::Size { width: r.resize_width, height: r.resize_height })
            }
        }
    }

    /// Current provisional geometry, if a gesture is in flight.
    #[must_use]
    pub fn provisional(&self) -> Option<Provisional> {
        match self {
            Self::Idle => None,
            Self::Moving(m) => Some(Provisional::Position { x: m.move_x, y: m.move_y }),
            Self::Resizing(r) => Some(Provisional::Size { width: r.resize_width, height: r.resize_height }),
        }
    }

    /// Snap the tracked geometry for writing and reset to `Idle`.
    ///
    /// Snapped values stay on the board: a coordinate or measure that would
    /// land past the edge steps down to the largest grid value that fits.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::InvalidState`] when nothing is being tracked.
    pub fn commit(&mut self, id: CardId) -> Result<Commit, TrackingError> {
        let commit = match *self {
            Self::Idle => return Err(TrackingError::InvalidState(id)),
            Self::Moving(m) => Commit::Move {
                x: fit_coordinate(m.move_x, m.width, BOARD_WIDTH),
                y: fit_coordinate(m.move_y, m.height, BOARD_HEIGHT),
            },
            Self::Resizing(r) => Commit::Resize {
                width: fit_measure(r.resize_width, r.x, BOARD_WIDTH),
                height: fit_measure(r.resize_height, r.y, BOARD_HEIGHT),
            },
        };
        *self = Self::Idle;
        Ok(commit)
    }
}

/// Move one axis by `delta`, clamping to `[lo, hi]` and keeping the overshoot as slack.
fn absorb(value: i32, slack: i32, delta: i32, lo: i32, hi: i32) -> (i32, i32) {
    let unclamped = value + delta + slack;
    let clamped = unclamped.clamp(lo, hi.max(lo));
    (clamped, unclamped - clamped)
}

/// Resize one axis from a pinned origin.
///
/// Growth that would carry the far edge past `limit` is refused. Shrinking is
/// always accepted, so a card that starts off the edge can be brought back.
fn absorb_pinned(size: i32, slack: i32, delta: i32, (min, max): (i32, i32), origin: i32, limit: i32) -> (i32, i32) {
    let unclamped = size + delta + slack;
    let clamped = unclamped.clamp(min, max);
    if clamped > size && origin + clamped > limit {
        return (size, slack);
    }
    (clamped, unclamped - clamped)
}

// =============================================================================
// PER-GESTURE TRACKER
// =============================================================================

/// Tracking state for every card taking part in the current gesture.
#[derive(Debug, Default)]
pub struct BoundedSlackTracker {
    states: HashMap<CardId, DragTrackingState>,
}

impl BoundedSlackTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin moving `card`. A card that is already moving keeps its state.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::ResizeInProgress`] if the card is being resized.
    pub fn begin_move(&mut self, card: &Card, size: Size) -> Result<(), TrackingError> {
        match self.states.get(&card.id) {
            Some(DragTrackingState::Resizing(_)) => Err(TrackingError::ResizeInProgress(card.id)),
            Some(DragTrackingState::Moving(_)) => Ok(()),
            _ => {
                self.states.insert(card.id, DragTrackingState::begin_move(card, size));
                Ok(())
            }
        }
    }

    /// Begin resizing `card`. A card that is already resizing keeps its state.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::MoveInProgress`] if the card is being moved.
    pub fn begin_resize(&mut self, card: &Card, size: Size, constraints: SizeConstraints) -> Result<(), TrackingError> {
        match self.states.get(&card.id) {
            Some(DragTrackingState::Moving(_)) => Err(TrackingError::MoveInProgress(card.id)),
            Some(DragTrackingState::Resizing(_)) => Ok(()),
            _ => {
                self.states
                    .insert(card.id, DragTrackingState::begin_resize(card, size, constraints));
                Ok(())
            }
        }
    }

    /// Apply a delta to one tracked card.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::InvalidState`] if the card is not tracked.
    pub fn apply_delta(&mut self, id: CardId, dx: i32, dy: i32) -> Result<Provisional, TrackingError> {
        self.states
            .get_mut(&id)
            .ok_or(TrackingError::InvalidState(id))?
            .apply_delta(id, dx, dy)
    }

    /// Apply the same raw delta to every tracked card. Each card clamps
    /// against its own bounds with its own slack.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NoGesture`] if no card is tracked.
    pub fn apply_all(&mut self, dx: i32, dy: i32) -> Result<Vec<(CardId, Provisional)>, TrackingError> {
        if self.states.is_empty() {
            return Err(TrackingError::NoGesture);
        }
        self.states
            .iter_mut()
            .map(|(id, state)| state.apply_delta(*id, dx, dy).map(|p| (*id, p)))
            .collect()
    }

    #[must_use]
    pub fn state(&self, id: &CardId) -> DragTrackingState {
        self.states.get(id).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn provisional(&self, id: &CardId) -> Option<Provisional> {
        self.states.get(id).and_then(DragTrackingState::provisional)
    }

    /// Commit and forget every tracked card.
    #[must_use]
    pub fn commit_all(&mut self) -> Vec<(CardId, Commit)> {
        self.states
            .drain()
            .filter_map(|(id, mut state)| match state.commit(id) {
                Ok(commit) => Some((id, commit)),
                Err(_) => None,
            })
            .collect()
    }

    /// Stop tracking one card without committing, e.g. after a remote delete.
    pub fn forget(&mut self, id: &CardId) -> bool {
        self.states.remove(id).is_some()
    }

    /// Drop every tracked card without committing.
    pub fn abandon(&mut self) -> usize {
        let count = self.states.len();
        self.states.clear();
        count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Ids of every tracked card.
    pub fn ids(&self) -> impl Iterator<Item = &CardId> {
        self.states.keys()
    }
}
