//! Shared numeric constants for the board core.

use std::time::Duration;

// ── Geometry ────────────────────────────────────────────────────

/// Spacing of the snapping grid, in board units.
pub const GRID_SIZE: i32 = 20;

/// Fixed width of every board, in board units.
pub const BOARD_WIDTH: i32 = 3600;

/// Fixed height of every board, in board units.
pub const BOARD_HEIGHT: i32 = 1800;

/// Per-item offset (both axes) between cards created from one drop.
pub const DROP_OFFSET: i32 = GRID_SIZE * 2;

// ── Card sizing (grid units) ────────────────────────────────────

/// Smallest width a card may be resized to when its type sets no minimum.
pub const DEFAULT_MIN_WIDTH_UNITS: i32 = 3;

/// Smallest height a card may be resized to when its type sets no minimum.
pub const DEFAULT_MIN_HEIGHT_UNITS: i32 = 2;

/// Width assumed for an auto-sized card whose type has no preferred width.
pub const FALLBACK_WIDTH_UNITS: i32 = 12;

/// Height assumed for an auto-sized card whose type has no preferred height.
pub const FALLBACK_HEIGHT_UNITS: i32 = 8;

// ── Presence ────────────────────────────────────────────────────

/// Default period between outgoing heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Default silence after which a peer is considered departed.
///
/// Just over two heartbeat periods, so one dropped heartbeat is tolerated.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(11);

// ── Board defaults ──────────────────────────────────────────────

/// Title given to a board created on first open.
pub const DEFAULT_BOARD_TITLE: &str = "Untitled Board";

/// Background color given to a board created on first open.
pub const DEFAULT_BACKGROUND_COLOR: &str = "#f5f1e8";
