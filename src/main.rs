use std::sync::Arc;
use std::time::Duration;

use corkboard::collab::memory::{MemoryAssetStore, MemoryContentStore, MemoryNetwork, RecordingNavigator};
use corkboard::collab::{Collaborators, IntrinsicMeasure};
use corkboard::config::PresenceConfig;
use corkboard::content::Registry;
use corkboard::controller::BoardController;
use corkboard::error::ErrorCode;
use corkboard::input::{Button, DropItem, Key, Modifiers, Point, Target};
use uuid::Uuid;

fn collaborators() -> Collaborators {
    let registry = Arc::new(Registry::builtin());
    Collaborators {
        content_types: registry.clone(),
        content: Arc::new(MemoryContentStore::new()),
        assets: Arc::new(MemoryAssetStore::new()),
        navigator: Arc::new(RecordingNavigator::new()),
        measure: Arc::new(IntrinsicMeasure::new(registry)),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = PresenceConfig::from_env();
    let network = MemoryNetwork::new();
    let board_id = Uuid::new_v4();
    let shared = collaborators();

    let mut alice = BoardController::open(&network.repo(Uuid::new_v4()), board_id, shared.clone(), config);
    let mut bob = BoardController::open(&network.repo(Uuid::new_v4()), board_id, shared, config);
    alice.cards().set_title("Sprint planning");

    // Alice adds a note and drags it toward the left edge.
    let Some(note) = alice.on_double_click(Target::Canvas, Point::new(103, 57)) else {
        tracing::error!("demo: note was not created");
        return;
    };
    for _ in 0..4 {
        if let Err(e) = alice.on_drag(note, -40, 15) {
            tracing::error!(error = %e, code = e.error_code(), "demo: drag failed");
            return;
        }
    }
    alice.on_drag_stop();

    // Bob pastes a link and drops two notes next to it.
    match bob.on_paste(DropItem::Text("https://example.com".into()), Point::new(600, 200)).await {
        Ok(card_id) => bob.on_click(Target::Card(card_id), Button::Primary, Modifiers::NONE),
        Err(e) => tracing::warn!(error = %e, code = e.error_code(), "demo: paste failed"),
    }
    let dropped = bob
        .on_drop(
            vec![DropItem::Text("first".into()), DropItem::Text("second".into())],
            Point::new(600, 600),
        )
        .await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    alice.sync_document();

    let board = alice.board();
    tracing::info!(title = %board.title, cards = board.len(), dropped = dropped.len(), "demo: board state");
    for card in board.sorted_cards() {
        tracing::info!(card_id = %card.id, content = %card.url, x = card.x, y = card.y, "demo: card");
    }
    for (peer, selected) in alice.remote_selection() {
        tracing::info!(%peer, selected = selected.len(), "demo: remote selection");
    }

    bob.on_key_down(&Key::new("Backspace"));
    bob.close();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tracing::info!(present = alice.present().len(), cards = alice.board().len(), "demo: after bob left");
    alice.close();
}
