//! Content types: size hints and resize constraints per kind of card content.
//!
//! DESIGN
//! ======
//! Content types are plain data resolved through the [`ContentTypes`] lookup
//! seam rather than a type hierarchy. Every hint is expressed in grid units;
//! [`ContentType::constraints`] and [`ContentType::default_size`] convert to
//! board units for the tracker and the card lifecycle.

#[cfg(test)]
#[path = "content_test.rs"]
mod tests;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::consts::{BOARD_HEIGHT, BOARD_WIDTH, DEFAULT_MIN_HEIGHT_UNITS, DEFAULT_MIN_WIDTH_UNITS};
use crate::grid::grid_units;

/// Where a piece of content is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    /// As a card on a board.
    Board,
    /// As the top-level document of the workspace.
    Workspace,
}

/// Size hints for one content type, in grid units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentType {
    pub type_name: String,
    pub name: String,
    pub contexts: Vec<Context>,
    pub default_width: Option<i32>,
    pub default_height: Option<i32>,
    pub min_width: Option<i32>,
    pub min_height: Option<i32>,
    pub max_width: Option<i32>,
    pub max_height: Option<i32>,
}

/// Resize limits in board units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeConstraints {
    pub min_width: i32,
    pub min_height: i32,
    pub max_width: i32,
    pub max_height: i32,
}

impl Default for SizeConstraints {
    fn default() -> Self {
        Self {
            min_width: grid_units(DEFAULT_MIN_WIDTH_UNITS),
            min_height: grid_units(DEFAULT_MIN_HEIGHT_UNITS),
            max_width: BOARD_WIDTH,
            max_height: BOARD_HEIGHT,
        }
    }
}

impl ContentType {
    /// A content type with no size preferences that renders on boards.
    #[must_use]
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            contexts: vec![Context::Board],
            default_width: None,
            default_height: None,
            min_width: None,
            min_height: None,
            max_width: None,
            max_height: None,
        }
    }

    #[must_use]
    pub fn with_default_size(mut self, width: Option<i32>, height: Option<i32>) -> Self {
        self.default_width = width;
        self.default_height = height;
        self
    }

    #[must_use]
    pub fn with_min_size(mut self, width: i32, height: i32) -> Self {
        self.min_width = Some(width);
        self.min_height = Some(height);
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, width: i32, height: i32) -> Self {
        self.max_width = Some(width);
        self.max_height = Some(height);
        self
    }

    #[must_use]
    pub fn with_contexts(mut self, contexts: &[Context]) -> Self {
        self.contexts = contexts.to_vec();
        self
    }

    /// Preferred initial size in board units. `None` leaves that axis auto-sized.
    #[must_use]
    pub fn default_size(&self) -> (Option<i32>, Option<i32>) {
        (self.default_width.map(grid_units), self.default_height.map(grid_units))
    }

    /// Resize limits in board units, falling back to crate defaults.
    #[must_use]
    pub fn constraints(&self) -> SizeConstraints {
        let fallback = SizeConstraints::default();
        let min_width = self.min_width.map_or(fallback.min_width, grid_units);
        let min_height = self.min_height.map_or(fallback.min_height, grid_units);
        SizeConstraints {
            min_width,
            min_height,
            max_width: self.max_width.map_or(fallback.max_width, grid_units).max(min_width),
            max_height: self.max_height.map_or(fallback.max_height, grid_units).max(min_height),
        }
    }
}

// =============================================================================
// LOOKUP SEAM
// =============================================================================

/// Registry of available content types.
pub trait ContentTypes: Send + Sync {
    /// Find a type usable in `context`.
    fn lookup(&self, type_name: &str, context: Context) -> Option<ContentType>;

    /// Every registered type, in name order.
    fn list(&self) -> Vec<ContentType>;
}

/// Map-backed registry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: BTreeMap<String, ContentType>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The types every board understands: text, image, url and nested boards.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            ContentType::new("text", "Note")
                .with_default_size(Some(15), None)
                .with_min_size(6, 2),
        );
        registry.register(
            ContentType::new("image", "Image")
                .with_default_size(Some(18), None)
                .with_min_size(4, 4),
        );
        registry.register(
            ContentType::new("url", "Link")
                .with_default_size(Some(12), Some(9))
                .with_min_size(8, 4),
        );
        registry.register(
            ContentType::new("board", "Board")
                .with_contexts(&[Context::Board, Context::Workspace])
                .with_default_size(Some(6), Some(5))
                .with_min_size(6, 5)
                .with_max_size(6, 5),
        );
        registry
    }

    /// Add or replace a type.
    pub fn register(&mut self, content_type: ContentType) {
        self.types.insert(content_type.type_name.clone(), content_type);
    }
}

impl ContentTypes for Registry {
    fn lookup(&self, type_name: &str, context: Context) -> Option<ContentType> {
        self.types
            .get(type_name)
            .filter(|t| t.contexts.contains(&context))
            .cloned()
    }

    fn list(&self) -> Vec<ContentType> {
        self.types.values().cloned().collect()
    }
}
