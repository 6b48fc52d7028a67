//! Card lifecycle: create, link, move, resize and delete cards.
//!
//! DESIGN
//! ======
//! Every edit is one call to [`DocHandle::change`] with a mutator that
//! re-reads the card inside the mutation, so concurrent remote edits are
//! never overwritten with a stale snapshot. Snapshots are only used to
//! decide whether an edit is needed at all: a move or resize that snaps to
//! the stored values issues no mutation.
//!
//! ERROR HANDLING
//! ==============
//! Editing a card that is not (or no longer) on the board is a logged
//! no-op. Remote deletes race with local gestures and that is not an error.

#[cfg(test)]
#[path = "cards_test.rs"]
mod tests;

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collab::{ContentStore, DocHandle};
use crate::consts::{BOARD_HEIGHT, BOARD_WIDTH, FALLBACK_HEIGHT_UNITS, FALLBACK_WIDTH_UNITS};
use crate::content::{Context, ContentTypes};
use crate::doc::{Board, Card, CardId, ContentLink, Size};
use crate::grid::{fit_coordinate, fit_measure, grid_units, snap_coordinate, snap_measure};
use crate::input::Point;

/// Card operations on one open board.
#[derive(Clone)]
pub struct Cards {
    handle: Arc<dyn DocHandle>,
    content_types: Arc<dyn ContentTypes>,
    content: Arc<dyn ContentStore>,
}

impl Cards {
    #[must_use]
    pub fn new(handle: Arc<dyn DocHandle>, content_types: Arc<dyn ContentTypes>, content: Arc<dyn ContentStore>) -> Self {
        Self { handle, content_types, content }
    }

    // =========================================================================
    // CREATE
    // =========================================================================

    /// Create new content of `type_name` and place a card for it at `at`.
    pub fn create_card(&self, type_name: &str, attrs: &serde_json::Value, at: Point, size: Option<Size>) -> CardId {
        let content_id = self.content.initialize_content_doc(type_name, attrs);
        self.link_card(ContentLink::new(type_name, content_id), at, size)
    }

    /// Place a card for existing content at `at`.
    ///
    /// Without an explicit `size` the content type's preferred size is used;
    /// axes it leaves unset stay auto-sized. An explicit size is capped to
    /// the largest measure the board can hold. The position is snapped and
    /// then pulled in so the whole card stays on the board.
    pub fn link_card(&self, url: ContentLink, at: Point, size: Option<Size>) -> CardId {
        let (width, height) = match size {
            Some(size) => (
                Some(fit_measure(size.width, 0, BOARD_WIDTH)),
                Some(fit_measure(size.height, 0, BOARD_HEIGHT)),
            ),
            None => self
                .content_types
                .lookup(url.content_type(), Context::Board)
                .map(|t| t.default_size())
                .unwrap_or_default(),
        };
        let span_x = width.unwrap_or_else(|| grid_units(FALLBACK_WIDTH_UNITS));
        let span_y = height.unwrap_or_else(|| grid_units(FALLBACK_HEIGHT_UNITS));

        let card = Card {
            id: Uuid::new_v4(),
            url,
            x: fit_coordinate(at.x, span_x, BOARD_WIDTH),
            y: fit_coordinate(at.y, span_y, BOARD_HEIGHT),
            width,
            height,
        };
        let card_id = card.id;
        info!(%card_id, content = %card.url, x = card.x, y = card.y, "card linked");
        self.handle.change(Box::new(move |board: &mut Board| {
            board.cards.insert(card.id, card);
        }));
        card_id
    }

    // =========================================================================
    // DELETE
    // =========================================================================

    /// Remove every listed card in one mutation. Returns how many were on
    /// the board. Ids that are not on the board are ignored; if none are,
    /// no mutation is issued.
    pub fn delete_cards<I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = CardId>,
    {
        let board = self.handle.doc();
        let mut doomed: Vec<CardId> = ids.into_iter().filter(|id| board.contains(id)).collect();
        doomed.sort();
        doomed.dedup();
        if doomed.is_empty() {
            debug!("delete: no listed cards on board");
            return 0;
        }

        let count = doomed.len();
        info!(count, "cards deleted");
        self.handle.change(Box::new(move |board: &mut Board| {
            for id in &doomed {
                board.cards.remove(id);
            }
        }));
        count
    }

    // =========================================================================
    // MOVE / RESIZE
    // =========================================================================

    /// Snap and store a new position. Returns whether a mutation was issued.
    pub fn move_card(&self, id: CardId, x: i32, y: i32) -> bool {
        let (x, y) = (snap_coordinate(x), snap_coordinate(y));
        let Some(card) = self.handle.doc().cards.remove(&id) else {
            warn!(card_id = %id, "move: card not on board");
            return false;
        };
        if card.x == x && card.y == y {
            debug!(card_id = %id, x, y, "move: unchanged");
            return false;
        }

        debug!(card_id = %id, x, y, "card moved");
        self.handle.change(Box::new(move |board: &mut Board| {
            if let Some(card) = board.cards.get_mut(&id) {
                card.x = x;
                card.y = y;
            }
        }));
        true
    }

    /// Snap and store a new size. Returns whether a mutation was issued.
    pub fn resize_card(&self, id: CardId, width: i32, height: i32) -> bool {
        let (width, height) = (snap_measure(width), snap_measure(height));
        let Some(card) = self.handle.doc().cards.remove(&id) else {
            warn!(card_id = %id, "resize: card not on board");
            return false;
        };
        if card.width == Some(width) && card.height == Some(height) {
            debug!(card_id = %id, width, height, "resize: unchanged");
            return false;
        }

        debug!(card_id = %id, width, height, "card resized");
        self.handle.change(Box::new(move |board: &mut Board| {
            if let Some(card) = board.cards.get_mut(&id) {
                card.width = Some(width);
                card.height = Some(height);
            }
        }));
        true
    }

    // =========================================================================
    // BOARD METADATA
    // =========================================================================

    /// Returns whether a mutation was issued.
    pub fn set_title(&self, title: &str) -> bool {
        if self.handle.doc().title == title {
            return false;
        }
        let title = title.to_string();
        info!(%title, "board retitled");
        self.handle.change(Box::new(move |board: &mut Board| board.title = title));
        true
    }

    /// Returns whether a mutation was issued.
    pub fn set_background_color(&self, color: &str) -> bool {
        if self.handle.doc().background_color == color {
            return false;
        }
        let color = color.to_string();
        info!(%color, "board background changed");
        self.handle.change(Box::new(move |board: &mut Board| board.background_color = color));
        true
    }
}
