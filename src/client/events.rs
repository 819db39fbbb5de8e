//! Outward events and the subscription interface UI consumers listen on.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use crate::models::{GameId, InventoryMap, Player, QuestionView, ScoreEntry};
use crate::protocol::ItemUsed;

use super::scheduler::NotificationItem;
use super::transport::CloseCode;

/// Everything a UI consumer can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The transport opened.
    Connected,
    /// The transport closed.
    Closed { code: CloseCode },
    /// The session is over for this player; leave the session view.
    SessionEnded { reason: Option<String> },
    /// Informational frame from the server.
    ServerNotice { message: String },
    /// Liveness acknowledgement.
    Pong,
    PlayersReplaced { players: Vec<Player> },
    PlayerJoined { player: Player },
    /// Navigate to the game view.
    GameStarted { game_id: GameId },
    QuestionChanged { question: QuestionView },
    RoundTick { remaining: u32 },
    RoundExpired { question_index: Option<usize> },
    ScoresUpdated { scores: Vec<ScoreEntry> },
    Chat { username: String, message: String },
    ItemsUpdated { items: InventoryMap },
    /// Raw item event, delivered whoever it concerns.
    ItemUsed(ItemUsed),
    /// Item event involving the local player.
    Notification(NotificationItem),
    /// Navigate to the results view.
    GameEnded { scores: Vec<ScoreEntry> },
}

impl SessionEvent {
    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Connected => "connected",
            SessionEvent::Closed { .. } => "closed",
            SessionEvent::SessionEnded { .. } => "session_ended",
            SessionEvent::ServerNotice { .. } => "server_notice",
            SessionEvent::Pong => "pong",
            SessionEvent::PlayersReplaced { .. } => "players_replaced",
            SessionEvent::PlayerJoined { .. } => "player_joined",
            SessionEvent::GameStarted { .. } => "game_started",
            SessionEvent::QuestionChanged { .. } => "question_changed",
            SessionEvent::RoundTick { .. } => "round_tick",
            SessionEvent::RoundExpired { .. } => "round_expired",
            SessionEvent::ScoresUpdated { .. } => "scores_updated",
            SessionEvent::Chat { .. } => "chat",
            SessionEvent::ItemsUpdated { .. } => "items_updated",
            SessionEvent::ItemUsed(_) => "item_used",
            SessionEvent::Notification(_) => "notification",
            SessionEvent::GameEnded { .. } => "game_ended",
        }
    }
}

/// Fan-out of [`SessionEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Open a subscription. Events published before this call are not seen.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn publish(&self, event: SessionEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            debug!(kind, "no subscribers for event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A consumer's handle on the event stream. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once the channel is gone.
    ///
    /// A subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, skipping events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, skipping events");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain every queued event.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
