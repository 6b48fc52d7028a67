//! Presence: who is online and what they have selected.
//!
//! DESIGN
//! ======
//! Presence rides on the document's ephemeral message channel and is never
//! persisted. Each participant sends:
//! - a heartbeat immediately on connect and then every heartbeat interval,
//! - its selection whenever the local selection changes (once, no retry),
//! - a departure notice once on disconnect (best effort).
//!
//! A heartbeat from a peer arms (or re-arms) that peer's deadline at
//! `now + peer_timeout` and marks the peer present. A selection from a peer
//! we have no entry for arms the same deadline without marking it present,
//! so a selection that arrives after its sender departed, or one whose
//! heartbeats never arrive, still times out. Reaching the deadline, or
//! receiving a departure notice, clears the peer. Selections are
//! last-write-wins in transport order.
//!
//! ARCHITECTURE
//! ============
//! [`Presence`] is the clock-driven state machine; it never sleeps. The
//! [`PresenceProtocol`] runtime owns one tokio task per session that
//! multiplexes the heartbeat ticker, inbound messages and the nearest peer
//! deadline with `select!`. Stopping the runtime aborts that task, which
//! cancels every timer together.
//!
//! TRADE-OFFS
//! ==========
//! Timeout-based departure is a soft signal. A peer that reconnects quickly
//! under the same id keeps its entry alive, and a peer whose heartbeats are
//! delayed past the timeout is briefly shown as gone until the next one.

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::collab::{DocHandle, Envelope};
use crate::config::PresenceConfig;
use crate::doc::{CardId, ParticipantId};

/// Participant -> card ids they report as selected.
pub type RemoteSelectionMap = HashMap<ParticipantId, Vec<CardId>>;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Payload of a presence message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMessage {
    pub contact: ParticipantId,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub heartbeat: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<Vec<CardId>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub departing: bool,
}

impl PresenceMessage {
    #[must_use]
    pub fn heartbeat(contact: ParticipantId) -> Self {
        Self { contact, heartbeat: true, selected: None, departing: false }
    }

    #[must_use]
    pub fn selection(contact: ParticipantId, selected: &[CardId]) -> Self {
        Self { contact, heartbeat: false, selected: Some(selected.to_vec()), departing: false }
    }

    #[must_use]
    pub fn departure(contact: ParticipantId) -> Self {
        Self { contact, heartbeat: false, selected: None, departing: true }
    }

    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!(self)
    }
}

/// What a received message did to the presence state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// First heartbeat from a peer we did not consider present.
    Arrived(ParticipantId),
    /// Heartbeat from a peer already present.
    Refreshed(ParticipantId),
    /// A peer's selection changed.
    Selected(ParticipantId),
    /// A peer said goodbye.
    Departed(ParticipantId),
}

// =============================================================================
// STATE MACHINE
// =============================================================================

#[derive(Debug, Clone)]
struct Peer {
    selected: Vec<CardId>,
    /// Armed when the entry is created, re-armed by heartbeats only.
    deadline: Instant,
    /// Set once a heartbeat has been seen.
    heartbeat: bool,
}

/// Presence state for one session, driven by explicit timestamps.
#[derive(Debug)]
pub struct Presence {
    me: ParticipantId,
    peer_timeout: std::time::Duration,
    peers: HashMap<ParticipantId, Peer>,
}

impl Presence {
    #[must_use]
    pub fn new(me: ParticipantId, peer_timeout: std::time::Duration) -> Self {
        Self { me, peer_timeout, peers: HashMap::new() }
    }

    #[must_use]
    pub fn me(&self) -> ParticipantId {
        self.me
    }

    /// Fold one inbound message into the state. Our own echoes are ignored.
    pub fn receive(&mut self, sender: ParticipantId, msg: &PresenceMessage, now: Instant) -> Vec<PresenceEvent> {
        if sender == self.me {
            return Vec::new();
        }
        if msg.departing {
            return match self.peers.remove(&sender) {
                Some(_) => vec![PresenceEvent::Departed(sender)],
                None => Vec::new(),
            };
        }

        let mut events = Vec::new();
        let deadline = now + self.peer_timeout;
        let peer = self.peers.entry(sender).or_insert_with(|| Peer {
            selected: Vec::new(),
            deadline,
            heartbeat: false,
        });
        if msg.heartbeat {
            let was_present = peer.heartbeat;
            peer.heartbeat = true;
            peer.deadline = deadline;
            events.push(if was_present {
                PresenceEvent::Refreshed(sender)
            } else {
                PresenceEvent::Arrived(sender)
            });
        }
        if let Some(selected) = &msg.selected {
            peer.selected.clone_from(selected);
            events.push(PresenceEvent::Selected(sender));
        }
        events
    }

    /// Clear every peer whose deadline is at or before `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<ParticipantId> {
        let expired: Vec<ParticipantId> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.peers.remove(id);
        }
        expired
    }

    /// The earliest peer deadline, if any peer is known.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.peers.values().map(|p| p.deadline).min()
    }

    /// Peers that have heartbeated and not yet timed out or departed.
    #[must_use]
    pub fn present(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self
            .peers
            .iter()
            .filter(|(_, p)| p.heartbeat)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn is_present(&self, id: &ParticipantId) -> bool {
        self.peers.get(id).is_some_and(|p| p.heartbeat)
    }

    /// What each known peer has selected.
    #[must_use]
    pub fn remote_selection(&self) -> RemoteSelectionMap {
        self.peers
            .iter()
            .map(|(id, peer)| (*id, peer.selected.clone()))
            .collect()
    }

    /// Forget every peer.
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}

// =============================================================================
// RUNTIME
// =============================================================================

/// Live presence for one open document.
pub struct PresenceProtocol {
    me: ParticipantId,
    handle: Arc<dyn DocHandle>,
    state: Arc<Mutex<Presence>>,
    task: Option<JoinHandle<()>>,
}

impl PresenceProtocol {
    /// Start heartbeating and listening on `handle`. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(handle: Arc<dyn DocHandle>, config: PresenceConfig) -> Self {
        let me = handle.participant();
        let state = Arc::new(Mutex::new(Presence::new(me, config.peer_timeout)));
        let messages = handle.subscribe_messages();
        let task = tokio::spawn(run(handle.clone(), messages, state.clone(), config));
        info!(
            participant = %me,
            document_id = %handle.document_id(),
            heartbeat_ms = config.heartbeat_interval.as_millis(),
            timeout_ms = config.peer_timeout.as_millis(),
            "presence started"
        );
        Self { me, handle, state, task: Some(task) }
    }

    /// Broadcast the local selection. Called on every selection change.
    pub fn send_selection(&self, selected: &[CardId]) {
        debug!(participant = %self.me, count = selected.len(), "presence: selection sent");
        self.handle.message(PresenceMessage::selection(self.me, selected).to_value());
    }

    #[must_use]
    pub fn remote_selection(&self) -> RemoteSelectionMap {
        self.lock().remote_selection()
    }

    #[must_use]
    pub fn present(&self) -> Vec<ParticipantId> {
        self.lock().present()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Say goodbye, cancel every timer and forget all peers.
    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();
        self.handle.message(PresenceMessage::departure(self.me).to_value());
        self.lock().clear();
        info!(participant = %self.me, "presence stopped");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Presence> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PresenceProtocol {
    /// Dropping without [`PresenceProtocol::stop`] leaves silently: timers
    /// are cancelled but no departure is sent, so peers time us out.
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    handle: Arc<dyn DocHandle>,
    mut messages: broadcast::Receiver<Envelope>,
    state: Arc<Mutex<Presence>>,
    config: PresenceConfig,
) {
    let me = handle.participant();
    let mut ticker = tokio::time::interval(config.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let deadline = state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_deadline();

        tokio::select! {
            _ = ticker.tick() => {
                handle.message(PresenceMessage::heartbeat(me).to_value());
            }
            received = messages.recv() => match received {
                Ok(envelope) => {
                    if envelope.sender == me {
                        continue;
                    }
                    match serde_json::from_value::<PresenceMessage>(envelope.payload) {
                        Ok(msg) => {
                            let events = state
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .receive(envelope.sender, &msg, Instant::now());
                            for event in events {
                                log_event(&event);
                            }
                        }
                        Err(e) => debug!(sender = %envelope.sender, error = %e, "presence: ignoring non-presence message"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(participant = %me, skipped, "presence: message stream lagged");
                }
                Err(RecvError::Closed) => {
                    info!(participant = %me, "presence: message stream closed");
                    break;
                }
            },
            () = sleep_until(deadline) => {
                let expired = state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .expire(Instant::now());
                for peer in expired {
                    info!(%peer, "presence: peer timed out");
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn log_event(event: &PresenceEvent) {
    match event {
        PresenceEvent::Arrived(peer) => info!(%peer, "presence: peer arrived"),
        PresenceEvent::Refreshed(peer) => debug!(%peer, "presence: heartbeat"),
        PresenceEvent::Selected(peer) => debug!(%peer, "presence: selection updated"),
        PresenceEvent::Departed(peer) => info!(%peer, "presence: peer departed"),
    }
}
