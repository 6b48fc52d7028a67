//! Document model: the shared board, its cards, and content links.
//!
//! A `Board` is owned jointly by every connected participant through the
//! shared-document collaborator (see [`crate::collab`]). This crate never
//! holds the authoritative copy; it reads snapshots and submits mutations.
//!
//! Serialization uses camelCase keys so the document stays readable by
//! peers that are not written in Rust.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::consts::{DEFAULT_BACKGROUND_COLOR, DEFAULT_BOARD_TITLE};

/// Unique identifier for a card on a board.
pub type CardId = Uuid;

/// Stable per-session identifier of a participant.
pub type ParticipantId = Uuid;

/// Identifier of a shared document.
pub type DocumentId = Uuid;

const CONTENT_LINK_SCHEME: &str = "content";

// =============================================================================
// CONTENT LINK
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContentLinkError {
    #[error("malformed content link: {0}")]
    Malformed(String),
    #[error("unsupported content link scheme: {0}")]
    Scheme(String),
    #[error("content link is missing a {0}")]
    Missing(&'static str),
}

impl crate::error::ErrorCode for ContentLinkError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_LINK_MALFORMED",
            Self::Scheme(_) => "E_LINK_SCHEME",
            Self::Missing(_) => "E_LINK_INCOMPLETE",
        }
    }
}

/// Opaque reference to a piece of content: its type plus its content id.
///
/// Rendered as `content://<type>/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentLink {
    content_type: String,
    content_id: String,
}

impl ContentLink {
    #[must_use]
    pub fn new(content_type: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self { content_type: content_type.into(), content_id: content_id.into() }
    }

    /// The content type name, e.g. `"text"` or `"image"`.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub fn content_id(&self) -> &str {
        &self.content_id
    }
}

impl fmt::Display for ContentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CONTENT_LINK_SCHEME}://{}/{}", self.content_type, self.content_id)
    }
}

impl FromStr for ContentLink {
    type Err = ContentLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|e| ContentLinkError::Malformed(e.to_string()))?;
        if url.scheme() != CONTENT_LINK_SCHEME {
            return Err(ContentLinkError::Scheme(url.scheme().to_string()));
        }
        let content_type = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(ContentLinkError::Missing("content type"))?;
        let content_id = url.path().trim_start_matches('/');
        if content_id.is_empty() {
            return Err(ContentLinkError::Missing("content id"));
        }
        Ok(Self::new(content_type, content_id))
    }
}

impl TryFrom<String> for ContentLink {
    type Error = ContentLinkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentLink> for String {
    fn from(link: ContentLink) -> Self {
        link.to_string()
    }
}

// =============================================================================
// CARD
// =============================================================================

/// A positioned, sized reference to one piece of content on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub url: ContentLink,
    /// Left edge; a grid multiple once committed.
    pub x: i32,
    /// Top edge; a grid multiple once committed.
    pub y: i32,
    /// `None` means "use the content's intrinsic width".
    pub width: Option<i32>,
    /// `None` means "use the content's intrinsic height".
    pub height: Option<i32>,
}

/// Width and height of a card as currently resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

// =============================================================================
// BOARD
// =============================================================================

/// The shared board document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub title: String,
    pub background_color: String,
    #[serde(default)]
    pub cards: HashMap<CardId, Card>,
}

impl Board {
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: DEFAULT_BOARD_TITLE.to_string(),
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            cards: HashMap::new(),
        }
    }

    #[must_use]
    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &CardId) -> bool {
        self.cards.contains_key(id)
    }

    /// Cards ordered by position (top to bottom, then left to right, then id).
    #[must_use]
    pub fn sorted_cards(&self) -> Vec<&Card> {
        let mut cards: Vec<&Card> = self.cards.values().collect();
        cards.sort_by(|a, b| (a.y, a.x, a.id).cmp(&(b.y, b.x, b.id)));
        cards
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
