//! In-process collaborators.
//!
//! DESIGN
//! ======
//! `MemoryNetwork` stands in for the replication engine: every participant
//! opening the same document id shares one `watch` channel holding the
//! board and one `broadcast` channel for ephemeral messages. Mutations are
//! applied under the watch lock, so each `change` is atomic and every
//! subscriber (including the author) observes the result.
//!
//! Handles count the mutations and messages they issue so tests can assert
//! that no-op operations never reach the document.

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AssetError, AssetId, AssetStore, ContentStore, DocHandle, Envelope, Mutator, Navigator, Repo};
use crate::doc::{Board, ContentLink, DocumentId, ParticipantId};

const MESSAGE_CHANNEL_CAPACITY: usize = 256;
const OCTET_STREAM: &str = "application/octet-stream";

// =============================================================================
// DOCUMENTS
// =============================================================================

struct SharedDoc {
    board: watch::Sender<Board>,
    messages: broadcast::Sender<Envelope>,
}

impl SharedDoc {
    fn new() -> Self {
        let (board, _) = watch::channel(Board::new());
        let (messages, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        Self { board, messages }
    }
}

/// Shared set of in-memory documents. Cloning shares the same documents.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    docs: Arc<Mutex<HashMap<DocumentId, Arc<SharedDoc>>>>,
}

impl MemoryNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A repo that opens documents on this network as `participant`.
    #[must_use]
    pub fn repo(&self, participant: ParticipantId) -> MemoryRepo {
        MemoryRepo { network: self.clone(), participant }
    }

    fn shared(&self, id: DocumentId) -> Arc<SharedDoc> {
        let mut docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
        docs.entry(id)
            .or_insert_with(|| {
                info!(%id, "memory: document created");
                Arc::new(SharedDoc::new())
            })
            .clone()
    }
}

/// Opens documents on a [`MemoryNetwork`] for one participant.
#[derive(Clone)]
pub struct MemoryRepo {
    network: MemoryNetwork,
    participant: ParticipantId,
}

impl MemoryRepo {
    /// Like [`Repo::open`], but keeps the concrete handle type.
    #[must_use]
    pub fn open_memory(&self, id: DocumentId) -> Arc<MemoryHandle> {
        Arc::new(MemoryHandle {
            id,
            participant: self.participant,
            shared: self.network.shared(id),
            released: AtomicBool::new(false),
            changes: AtomicUsize::new(0),
            messages: AtomicUsize::new(0),
        })
    }
}

impl Repo for MemoryRepo {
    fn open(&self, id: DocumentId) -> Arc<dyn DocHandle> {
        self.open_memory(id)
    }
}

/// One participant's handle on a shared in-memory document.
pub struct MemoryHandle {
    id: DocumentId,
    participant: ParticipantId,
    shared: Arc<SharedDoc>,
    released: AtomicBool,
    changes: AtomicUsize,
    messages: AtomicUsize,
}

impl MemoryHandle {
    /// Number of mutations issued through this handle.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.changes.load(Ordering::SeqCst)
    }

    /// Number of messages broadcast through this handle.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl DocHandle for MemoryHandle {
    fn document_id(&self) -> DocumentId {
        self.id
    }

    fn participant(&self) -> ParticipantId {
        self.participant
    }

    fn doc(&self) -> Board {
        self.shared.board.borrow().clone()
    }

    fn subscribe_changes(&self) -> watch::Receiver<Board> {
        self.shared.board.subscribe()
    }

    fn subscribe_messages(&self) -> broadcast::Receiver<Envelope> {
        self.shared.messages.subscribe()
    }

    fn change(&self, mutator: Mutator<'_>) {
        if self.is_released() {
            warn!(document_id = %self.id, "memory: change on released handle ignored");
            return;
        }
        self.changes.fetch_add(1, Ordering::SeqCst);
        self.shared.board.send_modify(move |board| mutator(board));
    }

    fn message(&self, payload: serde_json::Value) {
        if self.is_released() {
            warn!(document_id = %self.id, "memory: message on released handle ignored");
            return;
        }
        self.messages.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope { sender: self.participant, payload };
        if self.shared.messages.send(envelope).is_err() {
            debug!(document_id = %self.id, "memory: message dropped, no listeners");
        }
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            info!(document_id = %self.id, participant = %self.participant, "memory: handle released");
        }
    }
}

// =============================================================================
// CONTENT
// =============================================================================

/// Keeps content documents in a map: content id -> (type, attrs).
#[derive(Default)]
pub struct MemoryContentStore {
    docs: Mutex<HashMap<String, (String, serde_json::Value)>>,
}

impl MemoryContentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, content_id: &str) -> Option<(String, serde_json::Value)> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(content_id)
            .cloned()
    }
}

impl ContentStore for MemoryContentStore {
    fn initialize_content_doc(&self, type_name: &str, attrs: &serde_json::Value) -> String {
        let content_id = Uuid::new_v4().to_string();
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(content_id.clone(), (type_name.to_string(), attrs.clone()));
        debug!(%content_id, type_name, "memory: content initialized");
        content_id
    }
}

// =============================================================================
// ASSETS
// =============================================================================

/// A stored asset: media type and bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Keeps assets in a map keyed by asset id.
#[derive(Default)]
pub struct MemoryAssetStore {
    assets: Mutex<HashMap<AssetId, StoredAsset>>,
}

impl MemoryAssetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<StoredAsset> {
        self.assets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, bytes: Vec<u8>, media_type: &str) -> AssetId {
        let id = Uuid::new_v4().to_string();
        debug!(asset_id = %id, media_type, len = bytes.len(), "memory: asset stored");
        self.assets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), StoredAsset { media_type: media_type.to_string(), bytes });
        id
    }
}

#[async_trait::async_trait]
impl AssetStore for MemoryAssetStore {
    async fn write(&self, path: &Path) -> Result<AssetId, AssetError> {
        let bytes = tokio::fs::read(path).await?;
        let media_type = infer::get(&bytes).map_or(OCTET_STREAM, |kind| kind.mime_type());
        Ok(self.store(bytes, media_type))
    }

    async fn write_buffer(&self, bytes: Vec<u8>, media_type: &str) -> Result<AssetId, AssetError> {
        if bytes.is_empty() {
            return Err(AssetError::Rejected("empty buffer".into()));
        }
        Ok(self.store(bytes, media_type))
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// Records every link it is asked to open.
#[derive(Default)]
pub struct RecordingNavigator {
    opened: Mutex<Vec<ContentLink>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn opened(&self) -> Vec<ContentLink> {
        self.opened.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn open(&self, link: &ContentLink) {
        info!(%link, "navigate");
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(link.clone());
    }
}
