//! Core data types for the mirrored news corpus.
//!
//! `Item` is decoded only by consumers that need individual fields (the
//! event-log manager stores bodies verbatim as opaque bytes — see `hn-store`).

use serde::{Deserialize, Serialize};

/// Upstream item identifier. Monotonically allocated starting at 1; dense.
pub type ItemID = i64;

/// Short opaque upstream user identifier.
pub type UserID = String;

/// An upstream item record.
///
/// Most fields are optional because upstream items vary by `type` (story,
/// comment, job, poll, pollopt). `time` is carried as Unix seconds both on
/// the wire and in this struct; conversion to a calendar type is a read-path
/// concern outside the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemID,
    #[serde(rename = "type")]
    pub item_type: String,
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<UserID>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ItemID>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kids: Option<Vec<ItemID>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<ItemID>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descendants: Option<i64>,
}

/// A fetched item body, not yet persisted.
///
/// `data` is the raw response body, stored verbatim. The JSON literal `null`
/// is a valid, non-error `data` — it represents a deleted or never-existed ID.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub rx_time: chrono::DateTime<chrono::Utc>,
    pub id: ItemID,
    pub data: Vec<u8>,
}

/// An ordered top-stories snapshot plus its reception time.
#[derive(Debug, Clone)]
pub struct TopStoriesUpdate {
    pub rx_time: chrono::DateTime<chrono::Utc>,
    pub data: Vec<u8>,
}

/// Ordered sequence of item IDs, as decoded from a top-stories snapshot.
pub type TopStories = Vec<ItemID>;

/// An assertion about an item's existence or capture state.
///
/// `present=false` — upstream claims this ID exists (discovered via push or
/// max-item). `present=true` — we now hold a captured response for this ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSighting {
    pub id: ItemID,
    pub present: bool,
}

impl ItemSighting {
    pub fn seen(id: ItemID) -> Self {
        ItemSighting { id, present: false }
    }

    pub fn captured(id: ItemID) -> Self {
        ItemSighting { id, present: true }
    }
}

/// Extension point for the `profiles` field of the `updates` SSE frame.
///
/// No component currently consumes this — see the profiles open question in
/// the design notes. Kept as a typed placeholder rather than discarding the
/// field silently, so a future profile-capture path has somewhere to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSighting {
    pub id: UserID,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_deserializes_with_most_fields_absent() {
        let raw = r#"{"id":1,"type":"story","time":1000000000}"#;
        let item: Item = serde_json::from_str(raw).unwrap();
        assert_eq!(item.id, 1);
        assert_eq!(item.item_type, "story");
        assert!(item.by.is_none());
        assert!(item.kids.is_none());
    }

    #[test]
    fn item_round_trips_populated_fields() {
        let item = Item {
            id: 42,
            item_type: "comment".to_owned(),
            time: 1_700_000_000,
            by: Some("pg".to_owned()),
            text: Some("hello".to_owned()),
            dead: None,
            deleted: None,
            parent: Some(41),
            kids: Some(vec![43, 44]),
            url: None,
            score: None,
            title: None,
            parts: None,
            descendants: None,
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn sighting_constructors_set_present_correctly() {
        assert!(!ItemSighting::seen(5).present);
        assert!(ItemSighting::captured(5).present);
    }
}
