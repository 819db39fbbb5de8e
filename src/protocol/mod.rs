//! Wire protocol spoken with the live-session backend.

mod messages;

pub use messages::{
    decode, encode, ChoiceData, ClientMessage, ItemUsed, QuestionData, ServerMessage,
};
