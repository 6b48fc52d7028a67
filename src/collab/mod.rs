//! Collaborator seams: everything the board core consumes but does not own.
//!
//! ARCHITECTURE
//! ============
//! The replication engine, content instantiation, binary asset storage,
//! navigation and card measurement are all traits. The core only ever talks
//! to them through these seams; [`memory`] provides in-process
//! implementations used by tests and the demo binary.
//!
//! DESIGN
//! ======
//! Document edits go through [`DocHandle::change`], an atomic "apply this
//! mutator to the current board" primitive. Callers must never read a
//! snapshot, edit it, and write it back. Change notifications arrive on a
//! `watch` channel (latest value wins), ephemeral messages on a `broadcast`
//! channel (best effort, lagging receivers lose messages).

pub mod memory;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::consts::{FALLBACK_HEIGHT_UNITS, FALLBACK_WIDTH_UNITS};
use crate::content::{Context, ContentTypes};
use crate::doc::{Board, Card, ContentLink, DocumentId, ParticipantId, Size};
use crate::grid::grid_units;

// =============================================================================
// SHARED DOCUMENT
// =============================================================================

/// A mutation applied atomically to the shared board.
pub type Mutator<'a> = Box<dyn FnOnce(&mut Board) + Send + 'a>;

/// An ephemeral message together with the participant who sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sender: ParticipantId,
    pub payload: serde_json::Value,
}

/// Handle to one open shared board document.
pub trait DocHandle: Send + Sync {
    fn document_id(&self) -> DocumentId;

    /// The participant this handle sends as.
    fn participant(&self) -> ParticipantId;

    /// Latest known board state.
    fn doc(&self) -> Board;

    /// Change notifications, including the ones caused by our own edits.
    fn subscribe_changes(&self) -> watch::Receiver<Board>;

    /// Ephemeral messages from every participant, including our own echoes.
    fn subscribe_messages(&self) -> broadcast::Receiver<Envelope>;

    /// Apply `mutator` atomically. Fire and forget.
    fn change(&self, mutator: Mutator<'_>);

    /// Broadcast an ephemeral, unpersisted payload. Best effort.
    fn message(&self, payload: serde_json::Value);

    /// Detach from the document. Later calls are ignored.
    fn release(&self);
}

/// Opens shared documents.
pub trait Repo: Send + Sync {
    fn open(&self, id: DocumentId) -> Arc<dyn DocHandle>;
}

// =============================================================================
// CONTENT AND ASSETS
// =============================================================================

/// Creates the backing document for a new piece of content.
pub trait ContentStore: Send + Sync {
    /// Returns the new content id.
    fn initialize_content_doc(&self, type_name: &str, attrs: &serde_json::Value) -> String;
}

/// Identifier of a stored binary asset.
pub type AssetId = String;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset rejected: {0}")]
    Rejected(String),
}

impl crate::error::ErrorCode for AssetError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_ASSET_IO",
            Self::Rejected(_) => "E_ASSET_REJECTED",
        }
    }
}

/// Binary asset storage for imported files.
#[async_trait::async_trait]
pub trait AssetStore: Send + Sync {
    /// Store the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an [`AssetError`] if the file cannot be read or stored.
    async fn write(&self, path: &Path) -> Result<AssetId, AssetError>;

    /// Store raw bytes of the given media type.
    ///
    /// # Errors
    ///
    /// Returns an [`AssetError`] if the bytes cannot be stored.
    async fn write_buffer(&self, bytes: Vec<u8>, media_type: &str) -> Result<AssetId, AssetError>;
}

// =============================================================================
// UI SEAMS
// =============================================================================

/// Opens a card's content, e.g. in a new view.
pub trait Navigator: Send + Sync {
    fn open(&self, link: &ContentLink);
}

/// Reports the rendered size of a card.
pub trait CardMeasure: Send + Sync {
    fn measure(&self, card: &Card) -> Size;
}

/// Measures cards from their stored size, falling back to the content
/// type's preferred size and then to a fixed default.
pub struct IntrinsicMeasure {
    content_types: Arc<dyn ContentTypes>,
}

impl IntrinsicMeasure {
    #[must_use]
    pub fn new(content_types: Arc<dyn ContentTypes>) -> Self {
        Self { content_types }
    }
}

impl CardMeasure for IntrinsicMeasure {
    fn measure(&self, card: &Card) -> Size {
        let (default_width, default_height) = self
            .content_types
            .lookup(card.url.content_type(), Context::Board)
            .map(|t| t.default_size())
            .unwrap_or_default();
        Size {
            width: card
                .width
                .or(default_width)
                .unwrap_or_else(|| grid_units(FALLBACK_WIDTH_UNITS)),
            height: card
                .height
                .or(default_height)
                .unwrap_or_else(|| grid_units(FALLBACK_HEIGHT_UNITS)),
        }
    }
}

// =============================================================================
// BUNDLE
// =============================================================================

/// Every non-document collaborator a board session needs.
#[derive(Clone)]
pub struct Collaborators {
    pub content_types: Arc<dyn ContentTypes>,
    pub content: Arc<dyn ContentStore>,
    pub assets: Arc<dyn AssetStore>,
    pub navigator: Arc<dyn Navigator>,
    pub measure: Arc<dyn CardMeasure>,
}
