//! Protocol messages for client-server communication.
//!
//! All messages are JSON objects over WebSocket, discriminated by a `type`
//! field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;
use crate::models::{GameId, InventoryMap, ItemKind, Player, PlayerId, QuestionView, ScoreEntry};

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness heartbeat.
    Ping,

    /// Chat line broadcast to the whole session.
    ChatMessage { username: String, message: String },

    /// Answer for the current question, identified by choice text.
    #[serde(rename_all = "camelCase")]
    AnswerSubmission {
        question_index: usize,
        selected_answer: String,
        session_code: String,
    },

    /// Use an item from the sender's inventory.
    #[serde(rename_all = "camelCase")]
    ItemUse {
        session_code: String,
        user: String,
        item: ItemKind,
        target: Option<String>,
    },

    /// Ask the server to advance to the next question.
    NextQuestion,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to a liveness ping.
    Pong,

    /// Welcome frame sent right after the socket is accepted.
    ConnectionEstablished {
        #[serde(default)]
        message: Option<String>,
    },

    /// The host closed the session.
    SessionEnded {
        #[serde(default)]
        message: Option<String>,
    },

    /// Full list of players in the session.
    PlayerList { players: Vec<Player> },

    /// A single player joined.
    PlayerJoined { player_id: PlayerId, username: String },

    /// The host started the game.
    GameStarted { game_id: GameId },

    /// A new question for everyone.
    QuestionBroadcast {
        question_index: usize,
        question_data: QuestionData,
    },

    /// Current scores, in server order.
    UpdateScores { scores: Vec<ScoreEntry> },

    /// Chat line from any player.
    ChatMessage { username: String, message: String },

    /// Every player's inventory.
    PlayerItems { items: InventoryMap },

    /// Somebody used an item.
    ItemUsed(ItemUsed),

    /// Final scores.
    GameEnded { scores: Vec<ScoreEntry> },

    /// Any `type` outside this set.
    #[serde(other)]
    Unknown,
}

/// Question payload of a `question_broadcast` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionData {
    pub question_text: String,
    pub choices: Vec<ChoiceData>,
}

/// One answer choice. Any correctness flag the server adds is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceData {
    pub choice_text: String,
}

impl QuestionData {
    pub fn into_view(self, index: usize) -> QuestionView {
        QuestionView {
            index,
            prompt: self.question_text,
            choices: self.choices.into_iter().map(|c| c.choice_text).collect(),
        }
    }
}

/// Payload of an `item_used` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUsed {
    pub item_type: ItemKind,
    pub player_id: PlayerId,
    #[serde(default)]
    pub target_id: Option<PlayerId>,
    pub source_username: String,
    #[serde(default)]
    pub target_username: Option<String>,
}

/// Serialize an outbound message.
pub fn encode(message: &ClientMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

/// Decode an inbound frame, separating unknown types from malformed ones.
pub fn decode(text: &str) -> Result<ServerMessage, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_owned();

    match serde_json::from_value(value)? {
        ServerMessage::Unknown => Err(DecodeError::UnknownType(kind)),
        message => Ok(message),
    }
}
