use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version written by this build. Older records are migrated up to it,
/// newer records are refused.
pub const CURRENT_VERSION: u32 = 3;

/// Board column. Closed set: anything else fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Inbox,
    Now,
    Next,
    Later,
    Done,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Inbox,
        Column::Now,
        Column::Next,
        Column::Later,
        Column::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Inbox => "inbox",
            Column::Now => "now",
            Column::Next => "next",
            Column::Later => "later",
            Column::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Someday,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Someday => "someday",
        }
    }
}

/// Duration bucket estimating how long a card takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Effort {
    #[serde(rename = "15m")]
    Minutes15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hours4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "3d")]
    Days3,
    #[serde(rename = "1w")]
    Week1,
}

impl Effort {
    /// Bucket assigned to cards migrated from records that predate effort.
    pub const MIGRATION_DEFAULT: Effort = Effort::Hour1;

    pub fn as_str(self) -> &'static str {
        match self {
            Effort::Minutes15 => "15m",
            Effort::Hour1 => "1h",
            Effort::Hours4 => "4h",
            Effort::Day1 => "1d",
            Effort::Days3 => "3d",
            Effort::Week1 => "1w",
        }
    }
}

impl Default for Effort {
    fn default() -> Self {
        Effort::MIGRATION_DEFAULT
    }
}

macro_rules! display_and_parse {
    ($ty:ty, $what:literal, [$($variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| format!("unknown {}: {}", $what, s))
            }
        }
    };
}

display_and_parse!(Column, "column", [
    Column::Inbox,
    Column::Now,
    Column::Next,
    Column::Later,
    Column::Done,
]);
display_and_parse!(Priority, "priority", [
    Priority::Critical,
    Priority::High,
    Priority::Medium,
    Priority::Low,
    Priority::Someday,
]);
display_and_parse!(Effort, "effort", [
    Effort::Minutes15,
    Effort::Hour1,
    Effort::Hours4,
    Effort::Day1,
    Effort::Days3,
    Effort::Week1,
]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub title: String,
    pub column: Column,
    pub priority: Priority,
    pub effort: Effort,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// New card with a freshly generated id and creation time.
    pub fn new(title: impl Into<String>, column: Column, priority: Priority, effort: Effort) -> Self {
        Self {
            id: new_card_id(),
            title: title.into(),
            column,
            priority,
            effort,
            created_at: now_millis(),
        }
    }
}

/// The versioned board value persisted locally and pushed to remotes.
///
/// Serialized shape: `{ "v": <int>, "cards": [...], "updatedAt": <millis>? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDocument {
    #[serde(rename = "v")]
    pub version: u32,
    #[serde(default)]
    pub cards: Vec<Card>,
    /// Recency stamp of the last local edit. Absent on records written before v3
    /// and on payloads from writers that never stamp.
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for BoardDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoardDocument {
    pub fn empty() -> Self {
        Self {
            version: CURRENT_VERSION,
            cards: Vec::new(),
            updated_at: None,
        }
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn card_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    /// Cards of one column in stored order.
    pub fn column_cards(&self, column: Column) -> Vec<&Card> {
        self.cards.iter().filter(|c| c.column == column).collect()
    }

    /// Cards of one column in render order: priority first, stored order within
    /// equal priority.
    pub fn render_order(&self, column: Column) -> Vec<&Card> {
        let mut cards = self.column_cards(column);
        cards.sort_by_key(|c| c.priority);
        cards
    }

    /// Append a card at the end of its column. Returns false when the id is taken.
    pub fn add_card(&mut self, card: Card) -> bool {
        if self.card(&card.id).is_some() {
            return false;
        }
        self.cards.push(card);
        true
    }

    pub fn remove_card(&mut self, id: &str) -> Option<Card> {
        let pos = self.cards.iter().position(|c| c.id == id)?;
        Some(self.cards.remove(pos))
    }

    /// Move a card to the end of another column.
    pub fn move_card(&mut self, id: &str, column: Column) -> bool {
        match self.remove_card(id) {
            Some(mut card) => {
                card.column = column;
                self.cards.push(card);
                true
            }
            None => false,
        }
    }

    /// First card id that appears more than once, if any.
    pub fn duplicate_id(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.cards
            .iter()
            .map(|c| c.id.as_str())
            .find(|id| !seen.insert(*id))
    }

    /// Stamp the document as edited now.
    pub fn touch(&mut self) {
        self.updated_at = Some(now_millis());
    }
}

/// Current time truncated to millisecond precision, so values survive a
/// serialize/deserialize cycle unchanged.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn new_card_id() -> String {
    format!("card-{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_serializes_camel_case() {
        let card = Card::new("Write report", Column::Now, Priority::High, Effort::Hours4);
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["column"], "now");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["effort"], "4h");
        assert!(json["createdAt"].is_i64());
    }

    #[test]
    fn test_unknown_column_rejected() {
        let raw = r#"{"id":"a","title":"t","column":"someday","priority":"low","effort":"1h","createdAt":0}"#;
        assert!(serde_json::from_str::<Card>(raw).is_err());
    }

    #[test]
    fn test_card_ids_unique() {
        let a = Card::new("a", Column::Inbox, Priority::Low, Effort::Hour1);
        let b = Card::new("b", Column::Inbox, Priority::Low, Effort::Hour1);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_add_card_refuses_duplicate_id() {
        let mut doc = BoardDocument::empty();
        let card = Card::new("a", Column::Inbox, Priority::Low, Effort::Hour1);
        assert!(doc.add_card(card.clone()));
        assert!(!doc.add_card(card));
        assert_eq!(doc.cards.len(), 1);
    }

    #[test]
    fn test_move_card_appends_to_target_column() {
        let mut doc = BoardDocument::empty();
        let a = Card::new("a", Column::Inbox, Priority::Low, Effort::Hour1);
        let b = Card::new("b", Column::Now, Priority::Low, Effort::Hour1);
        let a_id = a.id.clone();
        doc.add_card(a);
        doc.add_card(b);

        assert!(doc.move_card(&a_id, Column::Now));
        let now: Vec<_> = doc.column_cards(Column::Now).iter().map(|c| c.title.clone()).collect();
        assert_eq!(now, vec!["b", "a"]);
        assert!(!doc.move_card("missing", Column::Done));
    }

    #[test]
    fn test_render_order_by_priority_then_stored() {
        let mut doc = BoardDocument::empty();
        doc.add_card(Card::new("low", Column::Next, Priority::Low, Effort::Hour1));
        doc.add_card(Card::new("crit", Column::Next, Priority::Critical, Effort::Hour1));
        doc.add_card(Card::new("low2", Column::Next, Priority::Low, Effort::Hour1));

        let titles: Vec<_> = doc.render_order(Column::Next).iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["crit", "low", "low2"]);
    }

    #[test]
    fn test_duplicate_id_detection() {
        let mut doc = BoardDocument::empty();
        let card = Card::new("a", Column::Inbox, Priority::Low, Effort::Hour1);
        doc.cards.push(card.clone());
        doc.cards.push(card.clone());
        assert_eq!(doc.duplicate_id(), Some(card.id.as_str()));
    }

    #[test]
    fn test_parse_enums_case_insensitive() {
        assert_eq!("Later".parse::<Column>().unwrap(), Column::Later);
        assert_eq!("SOMEDAY".parse::<Priority>().unwrap(), Priority::Someday);
        assert_eq!("1d".parse::<Effort>().unwrap(), Effort::Day1);
        assert!("backlog".parse::<Column>().is_err());
    }

    #[test]
    fn test_updated_at_omitted_when_absent() {
        let json = serde_json::to_value(BoardDocument::empty()).unwrap();
        assert_eq!(json["v"], CURRENT_VERSION);
        assert!(json.get("updatedAt").is_none());
    }
}
