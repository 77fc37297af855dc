//! Database schemas for Koinonia
//!
//! MongoDB document structures for relationships and activity counters.

mod activity;
mod metadata;
mod relationship;

pub use activity::{ActivityCountersDoc, CounterField, ACTIVITY_COLLECTION};
pub use metadata::Metadata;
pub use relationship::{
    pair_key, BlockStatus, ConnectionStatus, RelationshipDoc, RelationshipHistory,
    RELATIONSHIP_COLLECTION,
};
