//! Per-actor activity counter aggregate
//!
//! One document per actor. Relationship-relevant counters (`pending`,
//! `accepted`, `blocked`) are mutated only via `$inc` inside the same
//! transaction as the relationship row mutation. The follow feature owns
//! `following`/`followers` in the same aggregate; this core never touches them.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for activity counters
pub const ACTIVITY_COLLECTION: &str = "activity_counters";

/// Relationship-relevant counter fields, used to build `$inc` paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField {
    Pending,
    Accepted,
    Blocked,
}

impl CounterField {
    /// Storage field name within the counters document
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Blocked => "blocked",
        }
    }
}

/// Activity counters document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ActivityCountersDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Actor this aggregate belongs to
    pub actor_id: String,

    /// Sent connection requests still pending
    #[serde(default)]
    pub pending: i64,

    /// Accepted connections
    #[serde(default)]
    pub accepted: i64,

    /// Blocks imposed by this actor
    #[serde(default)]
    pub blocked: i64,

    /// Owned by the follow feature, never mutated here
    #[serde(default)]
    pub following: i64,

    /// Owned by the follow feature, never mutated here
    #[serde(default)]
    pub followers: i64,
}

impl ActivityCountersDoc {
    /// Read a relationship-relevant counter by field
    pub fn get(&self, field: CounterField) -> i64 {
        match field {
            CounterField::Pending => self.pending,
            CounterField::Accepted => self.accepted,
            CounterField::Blocked => self.blocked,
        }
    }
}

impl IntoIndexes for ActivityCountersDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One aggregate per actor
            (
                doc! { "actor_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("actor_id_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ActivityCountersDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_field_names_match_schema() {
        // $inc paths must line up with the serialized field names
        let doc = bson::to_document(&ActivityCountersDoc::default()).unwrap();
        for field in [
            CounterField::Pending,
            CounterField::Accepted,
            CounterField::Blocked,
        ] {
            assert!(doc.contains_key(field.as_str()), "missing {:?}", field);
        }
    }
}
