//! Client-side view of the session.
//!
//! [`SessionStore`] is written only by the event router inside the session
//! task. Everyone else reads [`SessionSnapshot`]s published after each
//! reaction, so a consumer that subscribes late still sees the current
//! question and scores.

use std::collections::VecDeque;

use crate::models::{GameId, InventoryMap, ItemKind, Player, QuestionView, ScoreEntry};

use super::scheduler::{NotificationItem, RoundPhase};

/// Who this client is within the session. Kept until the session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub session_code: String,
    pub player_name: String,
    pub is_host: bool,
}

/// Which screen the session is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionView {
    /// Waiting for the host to start.
    #[default]
    Lobby,
    /// Answering questions.
    InGame,
    /// Final scores are in.
    Results,
    /// The session is over; the UI should leave it.
    Ended,
}

/// Local answer state for the current round.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerState {
    pub selected: Option<String>,
    pub submitted: bool,
}

/// A chat line as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub username: String,
    pub message: String,
}

/// Canonical client-side session state.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    identity: Option<SessionIdentity>,
    view: SessionView,
    players: Vec<Player>,
    scores: Vec<ScoreEntry>,
    final_scores: Option<Vec<ScoreEntry>>,
    inventory: InventoryMap,
    question: Option<QuestionView>,
    answer: AnswerState,
    game_id: Option<GameId>,
    chat: VecDeque<ChatLine>,
    chat_history: usize,
}

impl SessionStore {
    pub fn new(identity: SessionIdentity, chat_history: usize) -> Self {
        Self {
            identity: Some(identity),
            chat_history,
            ..Default::default()
        }
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    pub fn view(&self) -> SessionView {
        self.view
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn scores(&self) -> &[ScoreEntry] {
        &self.scores
    }

    /// Scores sorted high to low, for display.
    pub fn leaderboard(&self) -> Vec<ScoreEntry> {
        let mut ranked = self.scores.clone();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }

    pub fn final_scores(&self) -> Option<&[ScoreEntry]> {
        self.final_scores.as_deref()
    }

    pub fn inventory(&self) -> &InventoryMap {
        &self.inventory
    }

    pub fn question(&self) -> Option<&QuestionView> {
        self.question.as_ref()
    }

    pub fn answer(&self) -> &AnswerState {
        &self.answer
    }

    pub fn game_id(&self) -> Option<&GameId> {
        self.game_id.as_ref()
    }

    pub fn chat(&self) -> impl Iterator<Item = &ChatLine> {
        self.chat.iter()
    }

    /// Whether `name` is the local player.
    pub fn is_local_player(&self, name: &str) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|identity| identity.player_name == name)
    }

    /// Items held by the local player, looked up through the player list.
    pub fn local_items(&self) -> &[ItemKind] {
        self.players
            .iter()
            .find(|p| self.is_local_player(&p.name))
            .and_then(|p| self.inventory.get(&p.id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn replace_players(&mut self, players: Vec<Player>) {
        self.players = players;
    }

    /// Append unless a player with the same id is already present.
    pub(crate) fn add_player(&mut self, player: Player) -> bool {
        if self.players.iter().any(|p| p.id == player.id) {
            return false;
        }
        self.players.push(player);
        true
    }

    pub(crate) fn start_game(&mut self, game_id: GameId) {
        self.game_id = Some(game_id);
        self.view = SessionView::InGame;
    }

    /// Show a new question and forget the previous round's answer.
    pub(crate) fn set_question(&mut self, question: QuestionView) {
        self.question = Some(question);
        self.answer = AnswerState::default();
        self.view = SessionView::InGame;
    }

    pub(crate) fn replace_scores(&mut self, scores: Vec<ScoreEntry>) {
        self.scores = scores;
    }

    pub(crate) fn replace_inventory(&mut self, inventory: InventoryMap) {
        self.inventory = inventory;
    }

    pub(crate) fn push_chat(&mut self, username: String, message: String) {
        if self.chat_history == 0 {
            return;
        }
        while self.chat.len() >= self.chat_history {
            self.chat.pop_front();
        }
        self.chat.push_back(ChatLine { username, message });
    }

    pub(crate) fn mark_submitted(&mut self, choice: String) {
        self.answer = AnswerState {
            selected: Some(choice),
            submitted: true,
        };
    }

    pub(crate) fn end_game(&mut self, scores: Vec<ScoreEntry>) {
        self.scores = scores.clone();
        self.final_scores = Some(scores);
        self.view = SessionView::Results;
    }

    /// Forget everything about the session, identity included.
    pub(crate) fn clear(&mut self) {
        *self = Self {
            view: SessionView::Ended,
            chat_history: self.chat_history,
            ..Default::default()
        };
    }
}

/// Point-in-time view of the session for UI consumers.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub session: SessionStore,
    pub round: RoundPhase,
    pub notifications: Vec<NotificationItem>,
}

impl SessionSnapshot {
    /// Seconds left in the current round, if one has started.
    pub fn remaining(&self) -> Option<u32> {
        match self.round {
            RoundPhase::Running { remaining } => Some(remaining),
            RoundPhase::Expired => Some(0),
            RoundPhase::Idle => None,
        }
    }
}
