use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::PlayerId;

/// Items held by each player, replaced wholesale on every inventory push.
pub type InventoryMap = BTreeMap<PlayerId, Vec<ItemKind>>;

/// Consumable power-ups granted by the server every few rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    /// Offensive, costs the target 10 points.
    Cannon,
    /// Offensive, costs the target 15 points.
    Torpedo,
    /// Defensive, blocks hits on the user for the rest of the round.
    Shield,
}

impl ItemKind {
    pub const ALL: [ItemKind; 3] = [ItemKind::Cannon, ItemKind::Torpedo, ItemKind::Shield];

    /// Wire token for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Cannon => "CANNON",
            ItemKind::Torpedo => "TORPEDO",
            ItemKind::Shield => "SHIELD",
        }
    }

    /// Whether using the item needs another player as target.
    pub fn requires_target(self) -> bool {
        !matches!(self, ItemKind::Shield)
    }

    pub fn description(self) -> &'static str {
        match self {
            ItemKind::Cannon => "-10 points to a target",
            ItemKind::Torpedo => "-15 points to a target",
            ItemKind::Shield => "blocks attacks this round",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown item kind `{0}`")]
pub struct ParseItemKindError(pub String);

impl FromStr for ItemKind {
    type Err = ParseItemKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseItemKindError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_kind() {
        assert_eq!("cannon".parse::<ItemKind>(), Ok(ItemKind::Cannon));
        assert_eq!(" Shield ".parse::<ItemKind>(), Ok(ItemKind::Shield));
        assert!("rocket".parse::<ItemKind>().is_err());
    }

    #[test]
    fn test_only_shield_is_untargeted() {
        assert!(ItemKind::Cannon.requires_target());
        assert!(ItemKind::Torpedo.requires_target());
        assert!(!ItemKind::Shield.requires_target());
    }

    #[test]
    fn test_inventory_keys_accept_numeric_ids() {
        let json = r#"{"7": ["CANNON", "SHIELD"], "12": []}"#;
        let inventory: InventoryMap = serde_json::from_str(json).unwrap();
        assert_eq!(
            inventory.get(&PlayerId::new("7")),
            Some(&vec![ItemKind::Cannon, ItemKind::Shield])
        );
        assert_eq!(inventory.get(&PlayerId::new("12")), Some(&vec![]));
    }
}
