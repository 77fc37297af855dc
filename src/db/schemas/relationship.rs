//! Relationship document schema
//!
//! One row per unordered actor pair, created by the initiating actor. The
//! canonical `pair_key` carries the unique index that is the authoritative
//! guard against duplicate rows for a pair, regardless of creation order.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for relationships
pub const RELATIONSHIP_COLLECTION: &str = "relationships";

/// Connection state of a relationship row. "Unfriend" is modeled as row
/// deletion and is never stored.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    #[default]
    Pending,
    Accepted,
}

impl ConnectionStatus {
    /// Wire/storage name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

/// Block state of a relationship row
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BlockStatus {
    #[default]
    UnBlocked,
    Blocked,
}

impl BlockStatus {
    /// Wire/storage name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnBlocked => "unBlocked",
            Self::Blocked => "blocked",
        }
    }
}

/// Audit trail of the most recent state-changing action. Needed to validate
/// future transitions (only the blocker may unblock).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RelationshipHistory {
    /// Block status recorded by the last action
    pub last_block_status: BlockStatus,

    /// Actor who performed the last accept/block/unblock action
    pub actor_who_acted: String,

    /// When the last action happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acted_at: Option<DateTime>,
}

impl RelationshipHistory {
    /// Record an action by `actor` leaving the row at `block_status`
    pub fn record(actor: &str, block_status: BlockStatus) -> Self {
        Self {
            last_block_status: block_status,
            actor_who_acted: actor.to_string(),
            acted_at: Some(DateTime::now()),
        }
    }
}

/// Relationship document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RelationshipDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Opaque immutable identifier exposed at the API boundary
    pub relationship_id: String,

    /// Actor who created the request
    pub initiator_id: String,

    /// Actor the request was sent to
    pub recipient_id: String,

    /// Canonical unordered pair key (min:max of the two actor ids)
    pub pair_key: String,

    /// Connection state
    #[serde(default)]
    pub status: ConnectionStatus,

    /// Block state
    #[serde(default)]
    pub block_status: BlockStatus,

    /// Audit trail of the last state-changing action
    #[serde(default)]
    pub history: RelationshipHistory,
}

/// Canonical key for an unordered actor pair
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}:{}", a, b)
    } else {
        format!("{}:{}", b, a)
    }
}

impl RelationshipDoc {
    /// Create a new pending relationship from initiator to recipient
    pub fn new(initiator_id: String, recipient_id: String, block_status: BlockStatus) -> Self {
        let key = pair_key(&initiator_id, &recipient_id);
        let history = RelationshipHistory::record(&initiator_id, block_status);

        Self {
            _id: None,
            metadata: Metadata::new(),
            relationship_id: Uuid::new_v4().to_string(),
            initiator_id,
            recipient_id,
            pair_key: key,
            status: ConnectionStatus::Pending,
            block_status,
            history,
        }
    }

    /// Whether the given actor is a party to this relationship
    pub fn involves(&self, actor_id: &str) -> bool {
        self.initiator_id == actor_id || self.recipient_id == actor_id
    }

    /// The counterpart of the given actor, if they are a party
    pub fn other_party(&self, actor_id: &str) -> Option<&str> {
        if self.initiator_id == actor_id {
            Some(&self.recipient_id)
        } else if self.recipient_id == actor_id {
            Some(&self.initiator_id)
        } else {
            None
        }
    }
}

impl IntoIndexes for RelationshipDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on the canonical pair key: the authoritative guard
            // against concurrent duplicate creation
            (
                doc! { "pair_key": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("pair_key_unique".to_string())
                        .build(),
                ),
            ),
            // Unique index on the API identifier
            (
                doc! { "relationship_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("relationship_id_unique".to_string())
                        .build(),
                ),
            ),
            // Per-actor lookups in either direction
            (
                doc! { "initiator_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("initiator_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "recipient_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("recipient_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for RelationshipDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(pair_key("alice", "bob"), pair_key("bob", "alice"));
        assert_eq!(pair_key("alice", "bob"), "alice:bob");
    }

    #[test]
    fn test_new_row_is_pending_with_seeded_history() {
        let row = RelationshipDoc::new("alice".into(), "bob".into(), BlockStatus::Blocked);
        assert_eq!(row.status, ConnectionStatus::Pending);
        assert_eq!(row.block_status, BlockStatus::Blocked);
        assert_eq!(row.history.actor_who_acted, "alice");
        assert_eq!(row.history.last_block_status, BlockStatus::Blocked);
        assert!(row.history.acted_at.is_some());
    }

    #[test]
    fn test_party_helpers() {
        let row = RelationshipDoc::new("alice".into(), "bob".into(), BlockStatus::UnBlocked);
        assert!(row.involves("alice"));
        assert!(row.involves("bob"));
        assert!(!row.involves("carol"));
        assert_eq!(row.other_party("alice"), Some("bob"));
        assert_eq!(row.other_party("carol"), None);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(BlockStatus::UnBlocked).unwrap(),
            "unBlocked"
        );
        assert_eq!(
            serde_json::to_value(ConnectionStatus::Pending).unwrap(),
            "pending"
        );
    }
}
