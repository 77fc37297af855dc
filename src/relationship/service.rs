//! Relationship service
//!
//! Orchestrates creation, transition, and deletion of relationship rows and
//! keeps the per-actor activity counters consistent with them. Every
//! state-changing operation runs the row mutation and the counter `$inc`s in
//! one client-session transaction; a failure anywhere aborts the whole thing.

use bson::{doc, DateTime, Document};
use mongodb::ClientSession;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::db::schemas::{
    pair_key, ActivityCountersDoc, BlockStatus, ConnectionStatus, RelationshipDoc,
    RelationshipHistory, ACTIVITY_COLLECTION, RELATIONSHIP_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::config::Args;
use crate::relationship::transition::{
    resolve_block_transition, resolve_status_transition, DeltaTarget, RequestedStatus, RowEffect,
    TransitionPlan, UpdateDimension,
};
use crate::types::{KoinoniaError, Result};

/// Pre-mutation view of a relationship row, returned for caller auditing
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipSnapshot {
    pub relationship_id: String,
    pub initiator_id: String,
    pub recipient_id: String,
    pub status: ConnectionStatus,
    pub block_status: BlockStatus,
    pub history: RelationshipHistory,
}

impl From<&RelationshipDoc> for RelationshipSnapshot {
    fn from(row: &RelationshipDoc) -> Self {
        Self {
            relationship_id: row.relationship_id.clone(),
            initiator_id: row.initiator_id.clone(),
            recipient_id: row.recipient_id.clone(),
            status: row.status,
            block_status: row.block_status,
            history: row.history.clone(),
        }
    }
}

/// Optional filters for relationship reads
#[derive(Debug, Clone, Default)]
pub struct RelationshipFilter {
    pub status: Option<ConnectionStatus>,
    pub block_status: Option<BlockStatus>,
}

impl RelationshipFilter {
    fn to_document(&self, actor_id: &str) -> Document {
        let mut filter = doc! {
            "$or": [
                { "initiator_id": actor_id },
                { "recipient_id": actor_id },
            ]
        };
        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }
        if let Some(block_status) = self.block_status {
            filter.insert("block_status", block_status.as_str());
        }
        filter
    }
}

/// Skip/limit paging for listings (1-based page numbers)
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u64,
    pub per_page: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Page {
    /// Build a page from caller-supplied values, clamping the size to the
    /// configured bounds
    pub fn from_request(args: &Args, page: Option<u64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: args.clamp_page_size(per_page),
        }
    }

    fn skip(&self) -> u64 {
        self.page.saturating_sub(1) * self.per_page.max(0) as u64
    }
}

/// Relationship lifecycle service. Constructed once at process start and
/// passed explicitly to request handlers.
#[derive(Clone)]
pub struct RelationshipService {
    client: MongoClient,
    relationships: MongoCollection<RelationshipDoc>,
    counters: MongoCollection<ActivityCountersDoc>,
}

impl RelationshipService {
    /// Create the service, binding both collections and applying indexes
    pub async fn new(client: MongoClient) -> Result<Self> {
        let relationships = client.collection(RELATIONSHIP_COLLECTION).await?;
        let counters = client.collection(ACTIVITY_COLLECTION).await?;

        Ok(Self {
            client,
            relationships,
            counters,
        })
    }

    /// Create a pending relationship from initiator to recipient.
    ///
    /// The canonical pair-key unique index is the authoritative duplicate
    /// guard; the pre-check only exists to give a friendly error before the
    /// insert is attempted.
    pub async fn create(
        &self,
        initiator_id: &str,
        recipient_id: &str,
        block_status: BlockStatus,
    ) -> Result<String> {
        if initiator_id == recipient_id {
            return Err(KoinoniaError::BadRequest(
                "cannot create a connection with yourself".to_string(),
            ));
        }

        let key = pair_key(initiator_id, recipient_id);
        if self
            .relationships
            .find_one(doc! { "pair_key": &key })
            .await?
            .is_some()
        {
            return Err(KoinoniaError::Conflict(
                "a connection already exists between these users".to_string(),
            ));
        }

        let row = RelationshipDoc::new(
            initiator_id.to_string(),
            recipient_id.to_string(),
            block_status,
        );
        let relationship_id = row.relationship_id.clone();

        let mut session = self.client.start_session().await?;
        session
            .start_transaction()
            .await
            .map_err(|e| KoinoniaError::Database(format!("Failed to start transaction: {}", e)))?;

        let result = self.create_in_session(&mut session, row, block_status).await;

        match result {
            Ok(()) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|e| KoinoniaError::Database(format!("Commit failed: {}", e)))?;
                info!(
                    initiator = initiator_id,
                    recipient = recipient_id,
                    "relationship created"
                );
                Ok(relationship_id)
            }
            Err(e) => {
                let _ = session.abort_transaction().await;
                Err(e)
            }
        }
    }

    async fn create_in_session(
        &self,
        session: &mut ClientSession,
        row: RelationshipDoc,
        block_status: BlockStatus,
    ) -> Result<()> {
        let initiator_id = row.initiator_id.clone();

        // Duplicate-key from the unique pair_key index maps to Conflict
        self.relationships
            .insert_one_with_session(row, session)
            .await
            .map_err(|e| match e {
                KoinoniaError::Conflict(_) => KoinoniaError::Conflict(
                    "a connection already exists between these users".to_string(),
                ),
                other => other,
            })?;

        // Status is always pending at creation, so pending is always seeded;
        // a blocked creation additionally counts as a block by the initiator
        let mut inc = doc! { "pending": 1_i64 };
        if block_status == BlockStatus::Blocked {
            inc.insert("blocked", 1_i64);
        }

        self.counters
            .upsert_one_with_session(
                doc! { "actor_id": &initiator_id },
                doc! { "$inc": inc, "$set": { "metadata.updated_at": DateTime::now() } },
                session,
            )
            .await?;

        Ok(())
    }

    /// Apply a state transition to a relationship row.
    ///
    /// Exactly one dimension may change per call. Runs inside a single
    /// transaction: resolve the transition, run its validation predicate,
    /// conditionally mutate the row matching on its current state (zero
    /// matched means a concurrent writer got there first), and apply the
    /// counter deltas. Returns the pre-mutation snapshot.
    pub async fn update(
        &self,
        relationship_id: &str,
        acting_actor_id: &str,
        new_status: Option<RequestedStatus>,
        new_block_status: Option<BlockStatus>,
    ) -> Result<RelationshipSnapshot> {
        let dimension = UpdateDimension::from_request(new_status, new_block_status)?;

        // No requested change at all is a no-op success
        if dimension == UpdateDimension::NoChange {
            let row = self.find_by_id(relationship_id).await?;
            return Ok(RelationshipSnapshot::from(&row));
        }

        let mut session = self.client.start_session().await?;
        session
            .start_transaction()
            .await
            .map_err(|e| KoinoniaError::Database(format!("Failed to start transaction: {}", e)))?;

        let result = self
            .update_in_session(&mut session, relationship_id, acting_actor_id, dimension)
            .await;

        match result {
            Ok(snapshot) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|e| KoinoniaError::Database(format!("Commit failed: {}", e)))?;
                Ok(snapshot)
            }
            Err(e) => {
                let _ = session.abort_transaction().await;
                Err(e)
            }
        }
    }

    async fn update_in_session(
        &self,
        session: &mut ClientSession,
        relationship_id: &str,
        acting_actor_id: &str,
        dimension: UpdateDimension,
    ) -> Result<RelationshipSnapshot> {
        let row = self
            .relationships
            .find_one_with_session(doc! { "relationship_id": relationship_id }, session)
            .await?
            .ok_or_else(|| KoinoniaError::NotFound("relationship not found".to_string()))?;

        let snapshot = RelationshipSnapshot::from(&row);

        let plan = match dimension {
            UpdateDimension::Status(requested) => resolve_status_transition(row.status, requested)?,
            UpdateDimension::Block(requested) => {
                resolve_block_transition(row.block_status, requested, row.status)?
            }
            UpdateDimension::NoChange => return Ok(snapshot),
        };

        plan.validate(acting_actor_id, &row)?;

        debug!(
            relationship = relationship_id,
            actor = acting_actor_id,
            kind = ?plan.kind,
            "applying relationship transition"
        );

        self.apply_row_effect(session, &row, acting_actor_id, &plan)
            .await?;
        self.apply_counter_deltas(session, &row, acting_actor_id, &plan)
            .await?;

        Ok(snapshot)
    }

    /// Conditionally mutate or delete the row, matching on its current state.
    /// A concurrent transition makes the condition match nothing.
    async fn apply_row_effect(
        &self,
        session: &mut ClientSession,
        row: &RelationshipDoc,
        acting_actor_id: &str,
        plan: &TransitionPlan,
    ) -> Result<()> {
        let condition = doc! {
            "relationship_id": &row.relationship_id,
            "status": row.status.as_str(),
            "block_status": row.block_status.as_str(),
        };

        match &plan.effect {
            RowEffect::Update {
                status,
                block_status,
            } => {
                let effective_block = block_status.unwrap_or(row.block_status);
                let history = RelationshipHistory::record(acting_actor_id, effective_block);

                let mut set = doc! {
                    "history": bson::to_bson(&history)?,
                    "metadata.updated_at": DateTime::now(),
                };
                if let Some(status) = status {
                    set.insert("status", status.as_str());
                }
                if let Some(block_status) = block_status {
                    set.insert("block_status", block_status.as_str());
                }

                let result = self
                    .relationships
                    .update_one_with_session(condition, doc! { "$set": set }, session)
                    .await?;

                if result.matched_count == 0 {
                    return Err(KoinoniaError::NotFound(
                        "relationship was modified concurrently".to_string(),
                    ));
                }
            }
            RowEffect::Delete => {
                let result = self
                    .relationships
                    .delete_one_with_session(condition, session)
                    .await?;

                if result.deleted_count == 0 {
                    return Err(KoinoniaError::NotFound(
                        "relationship was modified concurrently".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Apply the plan's counter deltas, one atomic `$inc` per touched actor
    async fn apply_counter_deltas(
        &self,
        session: &mut ClientSession,
        row: &RelationshipDoc,
        acting_actor_id: &str,
        plan: &TransitionPlan,
    ) -> Result<()> {
        let mut per_actor: HashMap<String, Document> = HashMap::new();

        for delta in &plan.deltas {
            let actors: Vec<&str> = match delta.target {
                DeltaTarget::Initiator => vec![&row.initiator_id],
                DeltaTarget::BothActors => vec![&row.initiator_id, &row.recipient_id],
                DeltaTarget::ActingActor => vec![acting_actor_id],
            };

            for actor in actors {
                let inc = per_actor.entry(actor.to_string()).or_default();
                let field = delta.field.as_str();
                let current = inc.get_i64(field).unwrap_or(0);
                inc.insert(field, current + delta.delta);
            }
        }

        for (actor_id, inc) in per_actor {
            self.counters
                .upsert_one_with_session(
                    doc! { "actor_id": &actor_id },
                    doc! { "$inc": inc, "$set": { "metadata.updated_at": DateTime::now() } },
                    session,
                )
                .await?;
        }

        Ok(())
    }

    /// Unconditional deletion with no counter adjustment. Administrative
    /// cleanup path; counter symmetry is the caller's responsibility here.
    pub async fn delete(&self, relationship_id: &str) -> Result<()> {
        let result = self
            .relationships
            .delete_one(doc! { "relationship_id": relationship_id })
            .await?;

        if result.deleted_count == 0 {
            return Err(KoinoniaError::NotFound(
                "relationship not found".to_string(),
            ));
        }

        info!(relationship = relationship_id, "relationship deleted");
        Ok(())
    }

    /// Count relationships touching the actor, with optional state filters
    pub async fn count(&self, actor_id: &str, filter: &RelationshipFilter) -> Result<u64> {
        self.relationships.count(filter.to_document(actor_id)).await
    }

    /// List relationships touching the actor, with optional state filters
    /// and skip/limit paging
    pub async fn list(
        &self,
        actor_id: &str,
        filter: &RelationshipFilter,
        page: Page,
    ) -> Result<Vec<RelationshipSnapshot>> {
        let rows = self
            .relationships
            .find_many(
                filter.to_document(actor_id),
                Some(page.skip()),
                Some(page.per_page),
            )
            .await?;

        Ok(rows.iter().map(RelationshipSnapshot::from).collect())
    }

    /// Fetch the relationship between two actors regardless of which of them
    /// initiated it
    pub async fn find_between(&self, a: &str, b: &str) -> Result<Option<RelationshipDoc>> {
        self.relationships
            .find_one(doc! { "pair_key": pair_key(a, b) })
            .await
    }

    async fn find_by_id(&self, relationship_id: &str) -> Result<RelationshipDoc> {
        self.relationships
            .find_one(doc! { "relationship_id": relationship_id })
            .await?
            .ok_or_else(|| KoinoniaError::NotFound("relationship not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_document_shape() {
        let filter = RelationshipFilter {
            status: Some(ConnectionStatus::Accepted),
            block_status: None,
        };
        let doc = filter.to_document("alice");
        assert_eq!(doc.get_str("status").unwrap(), "accepted");
        assert!(doc.get_array("$or").unwrap().len() == 2);
        assert!(!doc.contains_key("block_status"));
    }

    #[test]
    fn test_page_skip_is_one_based() {
        assert_eq!(Page::default().skip(), 0);
        assert_eq!(
            Page {
                page: 3,
                per_page: 20
            }
            .skip(),
            40
        );
        // page 0 is treated as the first page
        assert_eq!(
            Page {
                page: 0,
                per_page: 20
            }
            .skip(),
            0
        );
    }

    #[test]
    fn test_page_from_request_clamps_to_config() {
        use clap::Parser;
        let args = Args::parse_from(["koinonia"]);

        let page = Page::from_request(&args, Some(3), Some(10_000));
        assert_eq!(page.page, 3);
        assert_eq!(page.per_page, args.page_size_max);

        let page = Page::from_request(&args, None, None);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, args.page_size_default);

        // page 0 normalizes to the first page
        assert_eq!(Page::from_request(&args, Some(0), None).page, 1);
    }

    #[test]
    fn test_snapshot_from_row() {
        let row = RelationshipDoc::new("alice".into(), "bob".into(), BlockStatus::UnBlocked);
        let snapshot = RelationshipSnapshot::from(&row);
        assert_eq!(snapshot.relationship_id, row.relationship_id);
        assert_eq!(snapshot.status, ConnectionStatus::Pending);
        assert_eq!(snapshot.history.actor_who_acted, "alice");
    }
}
