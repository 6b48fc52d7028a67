//! Drop and paste import: turn files, bytes and text into cards.
//!
//! DESIGN
//! ======
//! Each item is classified by media type:
//! - image (declared `image/*`, or sniffed from the bytes) → bytes go to
//!   the asset store, then an `image` card references the asset,
//! - text that parses as an http(s) URL → `url` card,
//! - anything else → `text` card.
//!
//! Item `i` of a multi-item drop lands at `at + i * DROP_OFFSET` on both
//! axes (before snapping) so the cards fan out instead of stacking.
//!
//! ARCHITECTURE
//! ============
//! [`Importer`] only holds shared collaborator handles and is cheap to
//! clone. UI glue clones it out of the controller and spawns the import, so
//! input keeps flowing while bytes are read and stored.
//!
//! ERROR HANDLING
//! ==============
//! A failed asset write aborts that item: it is logged and no card is
//! created. Text that is not valid UTF-8 is logged and imported lossily as
//! a text card. Neither stops the remaining items.

#[cfg(test)]
#[path = "import_test.rs"]
mod tests;

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{error, info, warn};
use url::Url;

use crate::cards::Cards;
use crate::collab::{AssetError, AssetStore};
use crate::consts::DROP_OFFSET;
use crate::doc::CardId;
use crate::error::ErrorCode;
use crate::input::{DropItem, Point};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("asset write failed: {0}")]
    AssetWrite(#[from] AssetError),
    #[error("unparsable input: {0}")]
    Unparsable(String),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for ImportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AssetWrite(_) => "E_IMPORT_ASSET",
            Self::Unparsable(_) => "E_IMPORT_UNPARSABLE",
            Self::Io(_) => "E_IMPORT_IO",
        }
    }
}

/// How an imported item will be represented on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    Image,
    Url,
    Text,
}

/// Classify plain text: http(s) URLs become link cards, everything else notes.
#[must_use]
pub fn classify_text(text: &str) -> ImportKind {
    match Url::parse(text.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => ImportKind::Url,
        _ => ImportKind::Text,
    }
}

/// The image media type of `bytes`, either declared or sniffed.
#[must_use]
pub fn image_media_type(declared: Option<&str>, bytes: &[u8]) -> Option<String> {
    if let Some(declared) = declared {
        return declared.starts_with("image/").then(|| declared.to_string());
    }
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type().to_string())
}

// =============================================================================
// IMPORTER
// =============================================================================

/// Imports dropped or pasted items onto one board.
#[derive(Clone)]
pub struct Importer {
    cards: Cards,
    assets: Arc<dyn AssetStore>,
}

impl Importer {
    #[must_use]
    pub fn new(cards: Cards, assets: Arc<dyn AssetStore>) -> Self {
        Self { cards, assets }
    }

    /// Import every item, offsetting item `i` by `i * DROP_OFFSET`.
    /// Returns the ids of the cards created; failed items are logged and skipped.
    pub async fn import_all(&self, items: Vec<DropItem>, at: Point) -> Vec<CardId> {
        let total = items.len();
        let mut created = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            let step = i32::try_from(index).map_or(i32::MAX, |i| i.saturating_mul(DROP_OFFSET));
            match self.import(item, at.offset(step)).await {
                Ok(card_id) => created.push(card_id),
                Err(e) => error!(index, error = %e, code = e.error_code(), "import: item failed"),
            }
        }
        info!(total, created = created.len(), "import finished");
        created
    }

    /// Import one item at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::AssetWrite`] if an image could not be stored
    /// and [`ImportError::Io`] if a dropped file could not be read.
    pub async fn import(&self, item: DropItem, at: Point) -> Result<CardId, ImportError> {
        match item {
            DropItem::File { path, media_type } => self.import_file(&path, media_type.as_deref(), at).await,
            DropItem::Bytes { bytes, media_type } => self.import_bytes(bytes, media_type.as_deref(), at).await,
            DropItem::Text(text) => Ok(self.import_text(&text, at)),
        }
    }

    async fn import_file(&self, path: &Path, media_type: Option<&str>, at: Point) -> Result<CardId, ImportError> {
        if media_type.is_some_and(|m| m.starts_with("image/")) {
            let asset_id = self.assets.write(path).await?;
            return Ok(self.image_card(&asset_id, at));
        }
        let bytes = tokio::fs::read(path).await?;
        self.import_bytes(bytes, media_type, at).await
    }

    async fn import_bytes(&self, bytes: Vec<u8>, media_type: Option<&str>, at: Point) -> Result<CardId, ImportError> {
        if let Some(image_type) = image_media_type(media_type, &bytes) {
            let asset_id = self.assets.write_buffer(bytes, &image_type).await?;
            return Ok(self.image_card(&asset_id, at));
        }
        match String::from_utf8(bytes) {
            Ok(text) => Ok(self.import_text(&text, at)),
            Err(e) => {
                let err = ImportError::Unparsable(e.to_string());
                warn!(error = %err, code = err.error_code(), "import: falling back to lossy text");
                let text = String::from_utf8_lossy(e.as_bytes()).into_owned();
                Ok(self.text_card(&text, at))
            }
        }
    }

    fn import_text(&self, text: &str, at: Point) -> CardId {
        match classify_text(text) {
            ImportKind::Url => self.cards.create_card("url", &json!({ "url": text.trim() }), at, None),
            ImportKind::Image | ImportKind::Text => self.text_card(text, at),
        }
    }

    fn text_card(&self, text: &str, at: Point) -> CardId {
        self.cards.create_card("text", &json!({ "text": text }), at, None)
    }

    fn image_card(&self, asset_id: &str, at: Point) -> CardId {
        self.cards.create_card("image", &json!({ "hyperfileUrl": asset_id }), at, None)
    }
}
