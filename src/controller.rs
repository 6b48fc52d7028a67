//! Board controller: routes user input to selection, gestures and edits.
//!
//! DESIGN
//! ======
//! The controller owns everything local to one board session: the
//! selection, the gesture tracker and the presence runtime. The board
//! itself is never owned here; reads go through the document handle and
//! every edit goes through [`Cards`].
//!
//! Routing:
//! - primary click on the canvas clears the selection; on a card it selects
//!   just that card, or toggles it when a toggle modifier is held.
//! - double click on the canvas creates a text card and selects it; on a
//!   card it opens the card through the navigator.
//! - a drag that starts on a card in a multi-card selection moves the whole
//!   selection, each card tracked on its own; otherwise just that card.
//! - a resize freezes an auto-sized card at its rendered size first.
//! - Backspace deletes the selection, Escape abandons the gesture and
//!   clears the selection.
//!
//! Every selection change is broadcast through presence.
//!
//! ERROR HANDLING
//! ==============
//! Handlers that can fail return [`BoardError`] and log it with its error
//! code. Gesture misuse (deltas with no gesture, mixing move and resize) is
//! a programming error in the UI glue and is reported, never swallowed.
//!
//! TRADE-OFFS
//! ==========
//! Drops and pastes run on a cloned [`Importer`] so long asset writes do
//! not hold the controller. The cards they create are not selected.

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cards::Cards;
use crate::collab::{Collaborators, DocHandle, Repo};
use crate::config::PresenceConfig;
use crate::content::Context;
use crate::doc::{Board, CardId, DocumentId, ParticipantId, Size};
use crate::error::ErrorCode;
use crate::consts::{BOARD_HEIGHT, BOARD_WIDTH};
use crate::grid::{fit_measure, snap_measure_outward};
use crate::import::{ImportError, Importer};
use crate::input::{Button, DropItem, Key, Modifiers, Point, Selection, Target};
use crate::presence::{PresenceProtocol, RemoteSelectionMap};
use crate::slack::{BoundedSlackTracker, Commit, DragTrackingState, Provisional, TrackingError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    #[error("card not on board: {0}")]
    CardNotFound(CardId),
    #[error(transparent)]
    Import(#[from] ImportError),
}

impl ErrorCode for BoardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Tracking(e) => e.error_code(),
            Self::CardNotFound(_) => "E_CARD_NOT_FOUND",
            Self::Import(e) => e.error_code(),
        }
    }
}

/// Local state and input routing for one open board.
pub struct BoardController {
    handle: Arc<dyn DocHandle>,
    collaborators: Collaborators,
    cards: Cards,
    importer: Importer,
    presence: PresenceProtocol,
    changes: watch::Receiver<Board>,
    selection: Selection,
    trackers: BoundedSlackTracker,
    closed: bool,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl BoardController {
    /// Open `document_id` and start presence. Must be called inside a tokio runtime.
    #[must_use]
    pub fn open(repo: &dyn Repo, document_id: DocumentId, collaborators: Collaborators, config: PresenceConfig) -> Self {
        let handle = repo.open(document_id);
        let cards = Cards::new(
            handle.clone(),
            collaborators.content_types.clone(),
            collaborators.content.clone(),
        );
        let importer = Importer::new(cards.clone(), collaborators.assets.clone());
        let presence = PresenceProtocol::start(handle.clone(), config);
        let changes = handle.subscribe_changes();
        info!(%document_id, participant = %handle.participant(), "board opened");
        Self {
            handle,
            collaborators,
            cards,
            importer,
            presence,
            changes,
            selection: Selection::new(),
            trackers: BoundedSlackTracker::new(),
            closed: false,
        }
    }

    /// Say goodbye, stop presence timers, drop gesture state and release
    /// the document. Later calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let abandoned = self.trackers.abandon();
        self.presence.stop();
        self.handle.release();
        info!(document_id = %self.handle.document_id(), abandoned, "board closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn participant(&self) -> ParticipantId {
        self.handle.participant()
    }

    /// Latest board snapshot.
    #[must_use]
    pub fn board(&self) -> Board {
        self.handle.doc()
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// What every other participant has selected.
    #[must_use]
    pub fn remote_selection(&self) -> RemoteSelectionMap {
        self.presence.remote_selection()
    }

    /// Participants currently heartbeating on this board.
    #[must_use]
    pub fn present(&self) -> Vec<ParticipantId> {
        self.presence.present()
    }

    /// Provisional geometry of every card in the current gesture.
    #[must_use]
    pub fn overlay(&self) -> Vec<(CardId, Provisional)> {
        self.trackers
            .ids()
            .filter_map(|id| self.trackers.provisional(id).map(|p| (*id, p)))
            .collect()
    }

    /// Card operations bound to this board, for UI glue that edits directly.
    #[must_use]
    pub fn cards(&self) -> &Cards {
        &self.cards
    }

    /// A detached importer, for running drops off the input path.
    #[must_use]
    pub fn importer(&self) -> Importer {
        self.importer.clone()
    }

    // =========================================================================
    // DOCUMENT SYNC
    // =========================================================================

    /// Wait for the next document change and reconcile local state with it.
    /// Returns `false` once the document is gone.
    pub async fn changed(&mut self) -> bool {
        if self.changes.changed().await.is_err() {
            return false;
        }
        self.sync_document();
        true
    }

    /// Drop selected or tracked cards that no longer exist on the board.
    /// A pruned selection is broadcast.
    pub fn sync_document(&mut self) {
        let board = self.changes.borrow_and_update().clone();

        let stale: Vec<CardId> = self.trackers.ids().filter(|id| !board.contains(id)).copied().collect();
        for id in &stale {
            self.trackers.forget(id);
        }
        if self.selection.retain(|id| board.contains(id)) {
            debug!(remaining = self.selection.len(), "selection pruned after remote delete");
            self.broadcast_selection();
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "trackers pruned after remote delete");
        }
    }

    // =========================================================================
    // CLICKS
    // =========================================================================

    pub fn on_click(&mut self, target: Target, button: Button, modifiers: Modifiers) {
        if button != Button::Primary {
            return;
        }
        let before = self.selection.clone();
        match target {
            Target::Canvas => self.selection.clear(),
            Target::Card(id) if modifiers.toggles_selection() => self.selection.toggle(id),
            Target::Card(id) => self.selection.select_only(id),
        }
        if self.selection != before {
            self.broadcast_selection();
        }
    }

    /// On the canvas: create a text card at `at` and select it.
    /// On a card: open it. Returns the created card, if any.
    pub fn on_double_click(&mut self, target: Target, at: Point) -> Option<CardId> {
        match target {
            Target::Canvas => {
                let id = self.cards.create_card("text", &json!({ "text": "" }), at, None);
                self.selection.select_only(id);
                self.broadcast_selection();
                Some(id)
            }
            Target::Card(id) => {
                match self.handle.doc().card(&id) {
                    Some(card) => self.collaborators.navigator.open(&card.url),
                    None => warn!(card_id = %id, "open: card not on board"),
                }
                None
            }
        }
    }

    // =========================================================================
    // GESTURES
    // =========================================================================

    /// Apply a drag delta to the card under the pointer (and the rest of the
    /// selection when it is part of a multi-card selection).
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::CardNotFound`] if the drag starts on a card that
    /// is not on the board, and [`BoardError::Tracking`] if the card is being
    /// resized.
    pub fn on_drag(&mut self, id: CardId, dx: i32, dy: i32) -> Result<Vec<(CardId, Provisional)>, BoardError> {
        self.drag(id, dx, dy).inspect_err(|e| {
            warn!(card_id = %id, error = %e, code = e.error_code(), "drag rejected");
        })
    }

    fn drag(&mut self, id: CardId, dx: i32, dy: i32) -> Result<Vec<(CardId, Provisional)>, BoardError> {
        match self.trackers.state(&id) {
            DragTrackingState::Moving(_) => {}
            DragTrackingState::Resizing(_) => return Err(TrackingError::ResizeInProgress(id).into()),
            DragTrackingState::Idle => self.begin_move(id)?,
        }
        Ok(self.trackers.apply_all(dx, dy)?)
    }

    fn begin_move(&mut self, id: CardId) -> Result<(), BoardError> {
        self.discard_stale_gesture();
        let board = self.handle.doc();
        if !board.contains(&id) {
            return Err(BoardError::CardNotFound(id));
        }
        let group: Vec<CardId> = if self.selection.contains(&id) && self.selection.len() > 1 {
            self.selection.ids().to_vec()
        } else {
            vec![id]
        };
        for card in group.iter().filter_map(|g| board.card(g)) {
            let size = self.collaborators.measure.measure(card);
            self.trackers.begin_move(card, size)?;
        }
        debug!(card_id = %id, count = self.trackers.len(), "move started");
        Ok(())
    }

    /// Commit every card moved by the current drag.
    /// Returns how many cards were written.
    pub fn on_drag_stop(&mut self) -> usize {
        self.commit_gesture()
    }

    /// Apply a resize delta to `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::CardNotFound`] if the card is not on the board,
    /// and [`BoardError::Tracking`] if the card is being moved.
    pub fn on_resize(&mut self, id: CardId, dw: i32, dh: i32) -> Result<Provisional, BoardError> {
        self.resize(id, dw, dh).inspect_err(|e| {
            warn!(card_id = %id, error = %e, code = e.error_code(), "resize rejected");
        })
    }

    fn resize(&mut self, id: CardId, dw: i32, dh: i32) -> Result<Provisional, BoardError> {
        match self.trackers.state(&id) {
            DragTrackingState::Resizing(_) => {}
            DragTrackingState::Moving(_) => return Err(TrackingError::MoveInProgress(id).into()),
            DragTrackingState::Idle => self.begin_resize(id)?,
        }
        Ok(self.trackers.apply_delta(id, dw, dh)?)
    }

    fn begin_resize(&mut self, id: CardId) -> Result<(), BoardError> {
        self.discard_stale_gesture();
        let board = self.handle.doc();
        let card = board.card(&id).ok_or(BoardError::CardNotFound(id))?;

        // Auto-sized cards freeze at their rendered size, and any size that
        // hangs off the board is pulled back before the tracker sees it.
        let measured = self.collaborators.measure.measure(card);
        let auto_sized = card.width.is_none() || card.height.is_none();
        let natural = if auto_sized {
            Size::new(snap_measure_outward(measured.width), snap_measure_outward(measured.height))
        } else {
            measured
        };
        let size = fit_to_board(card.x, card.y, natural);
        if auto_sized || size != measured {
            self.cards.resize_card(id, size.width, size.height);
        }

        let constraints = self
            .collaborators
            .content_types
            .lookup(card.url.content_type(), Context::Board)
            .map(|t| t.constraints())
            .unwrap_or_default();
        self.trackers.begin_resize(card, size, constraints)?;
        debug!(card_id = %id, width = size.width, height = size.height, "resize started");
        Ok(())
    }

    /// Commit the current resize. Returns how many cards were written.
    pub fn on_resize_stop(&mut self) -> usize {
        self.commit_gesture()
    }

    /// Drop the in-flight gesture without writing anything.
    pub fn abandon_gesture(&mut self) -> usize {
        let count = self.trackers.abandon();
        if count > 0 {
            debug!(count, "gesture abandoned");
        }
        count
    }

    fn commit_gesture(&mut self) -> usize {
        let written = self
            .trackers
            .commit_all()
            .into_iter()
            .filter(|(id, commit)| match *commit {
                Commit::Move { x, y } => self.cards.move_card(*id, x, y),
                Commit::Resize { width, height } => self.cards.resize_card(*id, width, height),
            })
            .count();
        debug!(written, "gesture committed");
        written
    }

    /// A new gesture while trackers are still live means the UI missed a
    /// stop event; the old gesture is dropped.
    fn discard_stale_gesture(&mut self) {
        if !self.trackers.is_empty() {
            let count = self.trackers.abandon();
            warn!(count, "stale gesture discarded");
        }
    }

    // =========================================================================
    // KEYBOARD
    // =========================================================================

    /// Returns whether the key was handled.
    pub fn on_key_down(&mut self, key: &Key) -> bool {
        if key.is("Backspace") {
            return self.delete_selection();
        }
        if key.is("Escape") {
            let abandoned = self.abandon_gesture();
            let had_selection = !self.selection.is_empty();
            if had_selection {
                self.selection.clear();
                self.broadcast_selection();
            }
            return abandoned > 0 || had_selection;
        }
        false
    }

    fn delete_selection(&mut self) -> bool {
        if self.selection.is_empty() {
            return false;
        }
        let ids = self.selection.ids().to_vec();
        for id in &ids {
            self.trackers.forget(id);
        }
        self.cards.delete_cards(ids);
        self.selection.clear();
        self.broadcast_selection();
        true
    }

    // =========================================================================
    // DROP / PASTE
    // =========================================================================

    /// Import dropped items at `at`, fanning them out by index.
    pub async fn on_drop(&self, items: Vec<DropItem>, at: Point) -> Vec<CardId> {
        info!(count = items.len(), x = at.x, y = at.y, "drop");
        self.importer().import_all(items, at).await
    }

    /// Import one pasted item at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Import`] if the item could not be stored or read.
    pub async fn on_paste(&self, item: DropItem, at: Point) -> Result<CardId, BoardError> {
        self.importer().import(item, at).await.map_err(|e| {
            warn!(error = %e, code = e.error_code(), "paste failed");
            BoardError::from(e)
        })
    }

    fn broadcast_selection(&self) {
        self.presence.send_selection(self.selection.ids());
    }
}

impl Drop for BoardController {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pull a size that hangs off the board back to the largest grid measure
/// that fits from `(x, y)`. Sizes already on the board are left alone.
fn fit_to_board(x: i32, y: i32, size: Size) -> Size {
    let fit = |measure: i32, origin: i32, limit: i32| {
        if origin + measure > limit { fit_measure(measure, origin, limit) } else { measure }
    };
    Size::new(fit(size.width, x, BOARD_WIDTH), fit(size.height, y, BOARD_HEIGHT))
}
