//! Domain types shared by the wire codec and the session store.

mod item;
mod player;
mod question;

use serde::{Deserialize, Deserializer};

pub use item::{InventoryMap, ItemKind, ParseItemKindError};
pub use player::{GameId, Player, PlayerId, ScoreEntry};
pub use question::QuestionView;

/// The backend emits database keys as integers in some frames and as strings
/// in others (JSON object keys are always strings). Both normalise to text.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}
