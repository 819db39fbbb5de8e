//! Inbound frame dispatch.
//!
//! Every decoded [`ServerMessage`] lands in exactly one arm below. Frames
//! that fail to decode, or carry a `type` we do not know, are logged and
//! dropped; nothing here can take the session task down.

use tracing::{debug, info, warn};

use crate::error::DecodeError;
use crate::models::Player;
use crate::protocol::{self, ItemUsed, ServerMessage};

use super::events::{EventBus, SessionEvent};
use super::state::SessionStore;

/// What the session task must do to its timers after a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A question arrived: restart the countdown.
    StartRound,
    /// The game is over: no more countdowns.
    StopRound,
    /// Queue a notification for the local player.
    Notify(String),
    /// The server ended the session.
    EndSession,
}

/// Single writer of the [`SessionStore`].
#[derive(Debug)]
pub struct EventRouter {
    store: SessionStore,
    events: EventBus,
}

impl EventRouter {
    pub fn new(store: SessionStore, events: EventBus) -> Self {
        Self { store, events }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Remember the local player's answer for this round.
    pub(crate) fn record_answer(&mut self, choice: String) {
        self.store.mark_submitted(choice);
    }

    /// End the session locally, as when the connection drops abnormally.
    pub(crate) fn end_session(&mut self, reason: String) {
        self.store.clear();
        self.events.publish(SessionEvent::SessionEnded {
            reason: Some(reason),
        });
    }

    /// Decode a raw text frame and route it.
    pub fn route_frame(&mut self, text: &str) -> Option<Directive> {
        match protocol::decode(text) {
            Ok(message) => self.route(message),
            Err(DecodeError::UnknownType(kind)) => {
                warn!(kind, "ignoring unrecognized frame type");
                None
            }
            Err(e) => {
                warn!(error = %e, frame = text, "dropping undecodable frame");
                None
            }
        }
    }

    /// Apply one message to the store and publish the matching event.
    pub fn route(&mut self, message: ServerMessage) -> Option<Directive> {
        match message {
            ServerMessage::Pong => {
                debug!("liveness acknowledged");
                self.events.publish(SessionEvent::Pong);
                None
            }
            ServerMessage::ConnectionEstablished { message } => {
                let message = message.unwrap_or_default();
                info!(%message, "server accepted connection");
                self.events.publish(SessionEvent::ServerNotice { message });
                None
            }
            ServerMessage::SessionEnded { message } => {
                info!(reason = ?message, "session ended by host");
                self.store.clear();
                self.events
                    .publish(SessionEvent::SessionEnded { reason: message });
                Some(Directive::EndSession)
            }
            ServerMessage::PlayerList { players } => {
                debug!(count = players.len(), "player list replaced");
                self.store.replace_players(players.clone());
                self.events
                    .publish(SessionEvent::PlayersReplaced { players });
                None
            }
            ServerMessage::PlayerJoined {
                player_id,
                username,
            } => {
                let player = Player {
                    id: player_id,
                    name: username,
                };
                if self.store.add_player(player.clone()) {
                    info!(id = %player.id, name = %player.name, "player joined");
                    self.events.publish(SessionEvent::PlayerJoined { player });
                } else {
                    debug!(id = %player.id, "duplicate player_joined ignored");
                }
                None
            }
            ServerMessage::GameStarted { game_id } => {
                info!(%game_id, "game started");
                self.store.start_game(game_id.clone());
                self.events.publish(SessionEvent::GameStarted { game_id });
                None
            }
            ServerMessage::QuestionBroadcast {
                question_index,
                question_data,
            } => {
                let question = question_data.into_view(question_index);
                if let Some(current) = self
                    .store
                    .question()
                    .filter(|current| question.index < current.index)
                {
                    warn!(
                        current = current.index,
                        received = question.index,
                        "question index went backwards"
                    );
                }
                debug!(index = question.index, "question received");
                self.store.set_question(question.clone());
                self.events
                    .publish(SessionEvent::QuestionChanged { question });
                Some(Directive::StartRound)
            }
            ServerMessage::UpdateScores { scores } => {
                self.store.replace_scores(scores.clone());
                self.events.publish(SessionEvent::ScoresUpdated { scores });
                None
            }
            ServerMessage::ChatMessage { username, message } => {
                self.store.push_chat(username.clone(), message.clone());
                self.events
                    .publish(SessionEvent::Chat { username, message });
                None
            }
            ServerMessage::PlayerItems { items } => {
                self.store.replace_inventory(items.clone());
                self.events.publish(SessionEvent::ItemsUpdated { items });
                None
            }
            ServerMessage::ItemUsed(used) => {
                let note = self.describe_item_use(&used);
                self.events.publish(SessionEvent::ItemUsed(used));
                note.map(Directive::Notify)
            }
            ServerMessage::GameEnded { scores } => {
                info!(players = scores.len(), "game ended");
                self.store.end_game(scores.clone());
                self.events.publish(SessionEvent::GameEnded { scores });
                Some(Directive::StopRound)
            }
            ServerMessage::Unknown => {
                warn!("ignoring unrecognized frame type");
                None
            }
        }
    }

    /// Notification text for an item event, if the local player is involved.
    fn describe_item_use(&self, used: &ItemUsed) -> Option<String> {
        let item = used.item_type;
        let target = used.target_username.as_deref();
        let target_is_local = target.is_some_and(|t| self.store.is_local_player(t));

        if self.store.is_local_player(&used.source_username) {
            return Some(match target {
                Some(target) if !target_is_local => format!("You used {item} on {target}"),
                _ => format!("You used {item}"),
            });
        }

        if target_is_local {
            return Some(format!("{} used {item} on you", used.source_username));
        }

        None
    }
}
