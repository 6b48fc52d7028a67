use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use uuid::Uuid;

use super::*;
use crate::collab::memory::{
    MemoryAssetStore, MemoryContentStore, MemoryHandle, MemoryNetwork, MemoryRepo, RecordingNavigator,
};
use crate::collab::{CardMeasure, IntrinsicMeasure};
use crate::content::Registry;
use crate::consts::{BOARD_HEIGHT, BOARD_WIDTH};
use crate::doc::{Card, ContentLink};
use crate::presence::PresenceMessage;

// =============================================================
// Helpers
// =============================================================

/// Repo that keeps the concrete handle it opened, for spying on changes.
struct CapturingRepo {
    inner: MemoryRepo,
    opened: Mutex<Option<Arc<MemoryHandle>>>,
}

impl Repo for CapturingRepo {
    fn open(&self, id: DocumentId) -> Arc<dyn DocHandle> {
        let handle = self.inner.open_memory(id);
        *self.opened.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle.clone());
        handle
    }
}

struct Session {
    controller: BoardController,
    handle: Arc<MemoryHandle>,
    navigator: Arc<RecordingNavigator>,
}

fn collaborators(navigator: Arc<RecordingNavigator>) -> Collaborators {
    let registry = Arc::new(Registry::builtin());
    Collaborators {
        content_types: registry.clone(),
        content: Arc::new(MemoryContentStore::new()),
        assets: Arc::new(MemoryAssetStore::new()),
        navigator,
        measure: Arc::new(IntrinsicMeasure::new(registry)),
    }
}

/// Renders every card at a fixed size, whatever its content.
struct FixedMeasure(Size);

impl CardMeasure for FixedMeasure {
    fn measure(&self, _card: &Card) -> Size {
        self.0
    }
}

fn open_session(network: &MemoryNetwork, doc: DocumentId, measure: Option<Arc<dyn CardMeasure>>) -> Session {
    let repo = CapturingRepo { inner: network.repo(Uuid::new_v4()), opened: Mutex::new(None) };
    let navigator = Arc::new(RecordingNavigator::new());
    let mut collaborators = collaborators(navigator.clone());
    if let Some(measure) = measure {
        collaborators.measure = measure;
    }
    let controller = BoardController::open(&repo, doc, collaborators, PresenceConfig::default());
    let handle = repo.opened.lock().unwrap().clone().unwrap();
    Session { controller, handle, navigator }
}

fn join(network: &MemoryNetwork, doc: DocumentId) -> Session {
    open_session(network, doc, None)
}

fn session() -> Session {
    join(&MemoryNetwork::new(), Uuid::new_v4())
}

fn measured_session(size: Size) -> Session {
    open_session(&MemoryNetwork::new(), Uuid::new_v4(), Some(Arc::new(FixedMeasure(size))))
}

fn text_card(s: &Session, x: i32, y: i32) -> CardId {
    s.controller
        .cards()
        .link_card(ContentLink::new("text", Uuid::new_v4().to_string()), Point::new(x, y), None)
}

fn card(s: &Session, id: &CardId) -> Card {
    s.controller.board().card(id).cloned().unwrap()
}

fn click(s: &mut Session, id: CardId, modifiers: Modifiers) {
    s.controller.on_click(Target::Card(id), Button::Primary, modifiers);
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// =============================================================
// Clicks and selection
// =============================================================

#[tokio::test]
async fn click_card_selects_only_that_card() {
    let mut s = session();
    let (a, b) = (text_card(&s, 0, 0), text_card(&s, 400, 0));
    click(&mut s, a, Modifiers::NONE);
    click(&mut s, b, Modifiers::NONE);
    assert_eq!(s.controller.selection().ids(), &[b]);
}

#[tokio::test]
async fn click_canvas_clears_selection() {
    let mut s = session();
    let a = text_card(&s, 0, 0);
    click(&mut s, a, Modifiers::NONE);
    s.controller.on_click(Target::Canvas, Button::Primary, Modifiers::NONE);
    assert!(s.controller.selection().is_empty());
}

#[tokio::test]
async fn modifier_click_toggles_membership() {
    let mut s = session();
    let (a, b) = (text_card(&s, 0, 0), text_card(&s, 400, 0));
    click(&mut s, a, Modifiers::NONE);
    click(&mut s, b, Modifiers::SHIFT);
    assert_eq!(s.controller.selection().len(), 2);
    click(&mut s, b, Modifiers::SHIFT);
    assert_eq!(s.controller.selection().ids(), &[a]);
}

#[tokio::test]
async fn secondary_click_is_ignored() {
    let mut s = session();
    let a = text_card(&s, 0, 0);
    click(&mut s, a, Modifiers::NONE);
    s.controller.on_click(Target::Canvas, Button::Secondary, Modifiers::NONE);
    assert_eq!(s.controller.selection().ids(), &[a]);
}

#[tokio::test]
async fn unchanged_selection_is_not_rebroadcast() {
    let mut s = session();
    let a = text_card(&s, 0, 0);
    settle().await;
    click(&mut s, a, Modifiers::NONE);
    let sent = s.handle.message_count();
    click(&mut s, a, Modifiers::NONE);
    assert_eq!(s.handle.message_count(), sent);
}

#[tokio::test(start_paused = true)]
async fn selection_reaches_other_participants() {
    let network = MemoryNetwork::new();
    let doc = Uuid::new_v4();
    let mut alice = join(&network, doc);
    let bob = join(&network, doc);
    let a = text_card(&alice, 0, 0);
    settle().await;

    click(&mut alice, a, Modifiers::NONE);
    settle().await;

    let remote = bob.controller.remote_selection();
    assert_eq!(remote.get(&alice.controller.participant()), Some(&vec![a]));
    assert_eq!(bob.controller.present(), vec![alice.controller.participant()]);
}

// =============================================================
// Double click
// =============================================================

#[tokio::test]
async fn double_click_canvas_creates_selected_text_card() {
    let mut s = session();
    let id = s.controller.on_double_click(Target::Canvas, Point::new(103, 57)).unwrap();
    let created = card(&s, &id);
    assert_eq!(created.url.content_type(), "text");
    assert_eq!((created.x, created.y), (100, 60));
    assert_eq!(s.controller.selection().ids(), &[id]);
}

#[tokio::test]
async fn double_click_card_opens_it() {
    let mut s = session();
    let id = text_card(&s, 0, 0);
    assert_eq!(s.controller.on_double_click(Target::Card(id), Point::new(5, 5)), None);
    assert_eq!(s.navigator.opened(), vec![card(&s, &id).url]);
}

// =============================================================
// Drag
// =============================================================

#[tokio::test]
async fn drag_moves_single_card_and_commits_snapped() {
    let mut s = session();
    let id = text_card(&s, 100, 100);
    let provisional = s.controller.on_drag(id, 33, 0).unwrap();
    assert_eq!(provisional, vec![(id, Provisional::Position { x: 133, y: 100 })]);
    assert_eq!(s.controller.overlay().len(), 1);

    assert_eq!(s.controller.on_drag_stop(), 1);
    let moved = card(&s, &id);
    assert_eq!((moved.x, moved.y), (140, 100));
    assert!(s.controller.overlay().is_empty());
}

#[tokio::test]
async fn drag_without_net_movement_writes_nothing() {
    let mut s = session();
    let id = text_card(&s, 100, 100);
    let before = s.handle.change_count();
    s.controller.on_drag(id, 7, 0).unwrap();
    s.controller.on_drag(id, -7, 0).unwrap();
    assert_eq!(s.controller.on_drag_stop(), 0);
    assert_eq!(s.handle.change_count(), before);
}

#[tokio::test]
async fn drag_on_multi_selection_moves_all() {
    let mut s = session();
    let (a, b, c) = (text_card(&s, 0, 0), text_card(&s, 400, 0), text_card(&s, 800, 0));
    click(&mut s, a, Modifiers::NONE);
    click(&mut s, b, Modifiers::SHIFT);

    let provisional = s.controller.on_drag(b, 40, 20).unwrap();
    assert_eq!(provisional.len(), 2);
    assert_eq!(s.controller.on_drag_stop(), 2);

    assert_eq!((card(&s, &a).x, card(&s, &a).y), (40, 20));
    assert_eq!((card(&s, &b).x, card(&s, &b).y), (440, 20));
    assert_eq!((card(&s, &c).x, card(&s, &c).y), (800, 0));
}

#[tokio::test]
async fn drag_outside_selection_moves_only_that_card() {
    let mut s = session();
    let (a, b, c) = (text_card(&s, 0, 0), text_card(&s, 400, 0), text_card(&s, 800, 0));
    click(&mut s, a, Modifiers::NONE);
    click(&mut s, b, Modifiers::SHIFT);

    s.controller.on_drag(c, 0, 40).unwrap();
    assert_eq!(s.controller.on_drag_stop(), 1);
    assert_eq!(card(&s, &c).y, 40);
    assert_eq!(card(&s, &a).y, 0);
}

#[tokio::test]
async fn group_members_clamp_independently() {
    let mut s = session();
    let (a, b) = (text_card(&s, 0, 100), text_card(&s, 400, 100));
    click(&mut s, a, Modifiers::NONE);
    click(&mut s, b, Modifiers::SHIFT);

    s.controller.on_drag(b, -200, 0).unwrap();
    s.controller.on_drag_stop();
    assert_eq!(card(&s, &a).x, 0);
    assert_eq!(card(&s, &b).x, 200);
}

#[tokio::test]
async fn drag_on_missing_card_is_reported() {
    let mut s = session();
    let err = s.controller.on_drag(Uuid::new_v4(), 10, 10).unwrap_err();
    assert_eq!(err.error_code(), "E_CARD_NOT_FOUND");
}

#[tokio::test]
async fn drag_during_resize_is_rejected() {
    let mut s = session();
    let id = text_card(&s, 0, 0);
    s.controller.on_resize(id, 20, 0).unwrap();
    let err = s.controller.on_drag(id, 10, 0).unwrap_err();
    assert!(matches!(err, BoardError::Tracking(TrackingError::ResizeInProgress(_))));
}

// =============================================================
// Resize
// =============================================================

#[tokio::test]
async fn resize_freezes_auto_size_then_commits() {
    let mut s = session();
    let id = text_card(&s, 100, 100);
    assert_eq!(card(&s, &id).height, None);
    let before = s.handle.change_count();

    let provisional = s.controller.on_resize(id, 40, 0).unwrap();
    assert_eq!(provisional, Provisional::Size { width: 341, height: 161 });
    assert_eq!(s.handle.change_count(), before + 1);
    assert_eq!(card(&s, &id).height, Some(161));

    assert_eq!(s.controller.on_resize_stop(), 1);
    let resized = card(&s, &id);
    assert_eq!((resized.width, resized.height), (Some(341), Some(161)));
}

#[tokio::test]
async fn resize_respects_type_minimum() {
    let mut s = session();
    let id = text_card(&s, 0, 0);
    let provisional = s.controller.on_resize(id, -1000, -1000).unwrap();
    assert_eq!(provisional, Provisional::Size { width: 121, height: 41 });
}

#[tokio::test]
async fn resize_never_crosses_board_edge() {
    let mut s = session();
    let id = s
        .controller
        .cards()
        .link_card(ContentLink::new("text", "edge"), Point::new(3200, 0), Some(Size::new(301, 161)));
    let provisional = s.controller.on_resize(id, 500, 0).unwrap();
    assert_eq!(provisional, Provisional::Size { width: 301, height: 161 });
}

#[tokio::test]
async fn resize_freeze_keeps_tall_content_on_board() {
    // Content renders 400 tall but the card sits 200 above the bottom edge.
    let mut s = measured_session(Size::new(301, 400));
    let id = text_card(&s, 100, 1600);
    assert_eq!((card(&s, &id).y, card(&s, &id).height), (1600, None));

    let provisional = s.controller.on_resize(id, 0, -20).unwrap();
    assert_eq!(provisional, Provisional::Size { width: 301, height: 161 });
    assert_eq!(card(&s, &id).height, Some(181));
    for _ in 0..4 {
        s.controller.on_resize(id, 0, -20).unwrap();
    }
    assert_eq!(s.controller.on_resize_stop(), 1);

    let resized = card(&s, &id);
    assert_eq!(resized.height, Some(81));
    assert!(resized.y + resized.height.unwrap_or(0) <= BOARD_HEIGHT);
}

#[tokio::test]
async fn resize_pulls_overhanging_card_back_on_board() {
    let mut s = session();
    let id = Uuid::new_v4();
    let oversized = Card {
        id,
        url: ContentLink::new("text", "legacy"),
        x: 3400,
        y: 1600,
        width: Some(401),
        height: Some(401),
    };
    s.handle.change(Box::new(move |board: &mut Board| {
        board.cards.insert(id, oversized);
    }));

    let provisional = s.controller.on_resize(id, -20, -20).unwrap();
    assert_eq!(provisional, Provisional::Size { width: 161, height: 161 });
    let fitted = card(&s, &id);
    assert_eq!((fitted.width, fitted.height), (Some(181), Some(181)));
    assert_eq!(s.controller.on_resize_stop(), 1);
    let committed = card(&s, &id);
    assert_eq!((committed.width, committed.height), (Some(161), Some(161)));
    assert!(committed.x + committed.width.unwrap_or(0) <= BOARD_WIDTH);
    assert!(committed.y + committed.height.unwrap_or(0) <= BOARD_HEIGHT);
}

// =============================================================
// Keyboard
// =============================================================

#[tokio::test]
async fn backspace_deletes_selection_once() {
    let mut s = session();
    let ids: Vec<CardId> = (0..3).map(|i| text_card(&s, i * 400, 0)).collect();
    click(&mut s, ids[0], Modifiers::NONE);
    click(&mut s, ids[1], Modifiers::SHIFT);
    click(&mut s, ids[2], Modifiers::SHIFT);
    let before = s.handle.change_count();

    assert!(s.controller.on_key_down(&Key::new("Backspace")));
    assert!(s.controller.board().is_empty());
    assert!(s.controller.selection().is_empty());
    assert_eq!(s.handle.change_count(), before + 1);

    assert!(!s.controller.on_key_down(&Key::new("Backspace")));
    assert_eq!(s.handle.change_count(), before + 1);
}

#[tokio::test]
async fn escape_abandons_gesture_and_clears_selection() {
    let mut s = session();
    let id = text_card(&s, 100, 100);
    click(&mut s, id, Modifiers::NONE);
    s.controller.on_drag(id, 200, 0).unwrap();
    let before = s.handle.change_count();

    assert!(s.controller.on_key_down(&Key::new("Escape")));
    assert!(s.controller.overlay().is_empty());
    assert!(s.controller.selection().is_empty());
    assert_eq!(s.controller.on_drag_stop(), 0);
    assert_eq!(s.handle.change_count(), before);
    assert_eq!(card(&s, &id).x, 100);
}

#[tokio::test]
async fn other_keys_are_not_handled() {
    let mut s = session();
    assert!(!s.controller.on_key_down(&Key::new("a")));
}

// =============================================================
// Drop / paste
// =============================================================

#[tokio::test]
async fn dropped_images_fan_out() {
    let s = session();
    let png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    let items = vec![
        DropItem::Bytes { bytes: png.clone(), media_type: Some("image/png".into()) },
        DropItem::Bytes { bytes: png, media_type: Some("image/png".into()) },
    ];
    let ids = s.controller.on_drop(items, Point::new(500, 500)).await;
    assert_eq!(ids.len(), 2);
    assert_eq!((card(&s, &ids[0]).x, card(&s, &ids[0]).y), (500, 500));
    assert_eq!((card(&s, &ids[1]).x, card(&s, &ids[1]).y), (540, 540));
}

#[tokio::test]
async fn pasted_url_creates_url_card() {
    let s = session();
    let id = s
        .controller
        .on_paste(DropItem::Text("https://example.com".into()), Point::new(0, 0))
        .await
        .unwrap();
    assert_eq!(card(&s, &id).url.content_type(), "url");
}

#[tokio::test]
async fn failed_paste_reports_import_error() {
    let s = session();
    let item = DropItem::Bytes { bytes: Vec::new(), media_type: Some("image/png".into()) };
    let err = s.controller.on_paste(item, Point::new(0, 0)).await.unwrap_err();
    assert_eq!(err.error_code(), "E_IMPORT_ASSET");
}

#[tokio::test]
async fn importer_runs_detached() {
    let s = session();
    let importer = s.controller.importer();
    let task = tokio::spawn(async move { importer.import_all(vec![DropItem::Text("note".into())], Point::new(0, 0)).await });
    let ids = task.await.unwrap();
    assert_eq!(ids.len(), 1);
    assert!(s.controller.board().contains(&ids[0]));
}

// =============================================================
// Document sync and teardown
// =============================================================

#[tokio::test]
async fn remote_delete_prunes_selection_and_trackers() {
    let network = MemoryNetwork::new();
    let doc = Uuid::new_v4();
    let mut alice = join(&network, doc);
    let bob = join(&network, doc);

    let (a, b) = (text_card(&alice, 0, 0), text_card(&alice, 400, 0));
    click(&mut alice, a, Modifiers::NONE);
    click(&mut alice, b, Modifiers::SHIFT);
    alice.controller.on_drag(a, 20, 0).unwrap();

    bob.controller.cards().delete_cards([a]);
    assert!(alice.controller.changed().await);

    assert_eq!(alice.controller.selection().ids(), &[b]);
    let tracked: Vec<CardId> = alice.controller.overlay().into_iter().map(|(id, _)| id).collect();
    assert_eq!(tracked, vec![b]);
}

#[tokio::test(start_paused = true)]
async fn close_announces_departure_and_releases() {
    let network = MemoryNetwork::new();
    let doc = Uuid::new_v4();
    let mut alice = join(&network, doc);
    let bob = join(&network, doc);
    settle().await;
    assert_eq!(bob.controller.present(), vec![alice.controller.participant()]);

    let mut inbox = bob.handle.subscribe_messages();
    alice.controller.close();
    assert!(alice.controller.is_closed());
    assert!(alice.handle.is_released());

    let envelope = inbox.recv().await.unwrap();
    let msg: PresenceMessage = serde_json::from_value(envelope.payload).unwrap();
    assert!(msg.departing);

    settle().await;
    assert!(bob.controller.present().is_empty());

    // Idempotent.
    alice.controller.close();
}
