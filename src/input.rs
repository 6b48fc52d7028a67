//! Input vocabulary routed by the board controller, and the local selection.

#[cfg(test)]
#[path = "input_test.rs"]
mod tests;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::doc::CardId;

// =============================================================================
// POINTER AND KEYBOARD
// =============================================================================

/// A point in board units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal offset from the board's left edge.
    pub x: i32,
    /// Vertical offset from the board's top edge.
    pub y: i32,
}

impl Point {
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// This point shifted by `d` on both axes.
    #[must_use]
    pub fn offset(self, d: i32) -> Self {
        Self { x: self.x.saturating_add(d), y: self.y.saturating_add(d) }
    }
}

/// Mouse button that triggered a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left button; the only one that changes the selection.
    Primary,
    /// Middle button / wheel click.
    Middle,
    /// Right button; left to the UI for context menus.
    Secondary,
}

/// Modifier keys held during a pointer event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Shift key held.
    pub shift: bool,
    /// Control key held.
    pub ctrl: bool,
    /// Alt / Option key held. Does not toggle selection.
    pub alt: bool,
    /// Meta / Command key held.
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self { shift: false, ctrl: false, alt: false, meta: false };
    pub const SHIFT: Self = Self { shift: true, ctrl: false, alt: false, meta: false };

    /// Shift, ctrl and meta all toggle membership instead of replacing the selection.
    #[must_use]
    pub fn toggles_selection(self) -> bool {
        self.shift || self.ctrl || self.meta
    }
}

/// A key name as reported by the UI layer, e.g. `"Backspace"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.0 == name
    }
}

/// What a pointer event landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Empty board background.
    Canvas,
    /// A card, by id.
    Card(CardId),
}

// =============================================================================
// DROP AND PASTE
// =============================================================================

/// One item of a drop or paste.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropItem {
    /// A file on local disk; `media_type` is whatever the source declared.
    File { path: PathBuf, media_type: Option<String> },
    /// Raw bytes, e.g. clipboard image data.
    Bytes { bytes: Vec<u8>, media_type: Option<String> },
    /// Plain text.
    Text(String),
}

// =============================================================================
// SELECTION
// =============================================================================

/// Locally selected cards, in the order they were selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<CardId>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_only(&mut self, id: CardId) {
        self.ids.clear();
        self.ids.push(id);
    }

    /// Add `id` if absent, remove it if present.
    pub fn toggle(&mut self, id: CardId) {
        match self.ids.iter().position(|s| *s == id) {
            Some(index) => {
                self.ids.remove(index);
            }
            None => self.ids.push(id),
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Keep only ids matching `keep`. Returns whether anything was removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&CardId) -> bool) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| keep(id));
        self.ids.len() != before
    }

    #[must_use]
    pub fn contains(&self, id: &CardId) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn ids(&self) -> &[CardId] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
