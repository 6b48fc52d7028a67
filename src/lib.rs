//! Core of a collaborative corkboard: cards pinned to a fixed-size shared
//! board, moved and resized on a snapping grid, with live presence.
//!
//! The crate owns local interaction state only. The board document itself
//! lives in a replication engine reached through [`collab::DocHandle`];
//! every edit is submitted as an atomic mutation and every participant,
//! including the author, observes the result through change notifications.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`controller`] | Input routing, selection and gesture lifecycle per open board |
//! | [`cards`] | Create, link, move, resize and delete cards |
//! | [`slack`] | Drag/resize tracking with elastic edge clamping |
//! | [`grid`] | Grid snapping arithmetic |
//! | [`presence`] | Heartbeats, peer timeouts and remote selections |
//! | [`import`] | Drop/paste classification and asset import |
//! | [`doc`] | Board, card and content link types |
//! | [`content`] | Content type size hints and the registry seam |
//! | [`collab`] | Collaborator traits and in-memory implementations |
//! | [`input`] | Pointer, keyboard and drop vocabulary; local selection |
//! | [`config`] | Environment-driven presence timing |
//! | [`consts`] | Geometry and timing constants |
//! | [`error`] | Shared error code trait |

pub mod cards;
pub mod collab;
pub mod config;
pub mod consts;
pub mod content;
pub mod controller;
pub mod doc;
pub mod error;
pub mod grid;
pub mod import;
pub mod input;
pub mod presence;
pub mod slack;
