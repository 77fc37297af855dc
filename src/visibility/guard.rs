//! Per-resource visibility guard
//!
//! Bridges an inbound request for one resource type (address, education,
//! experience, ...) to the visibility resolver: load the target document(s),
//! work out the owning actor, resolve the owner's visibility setting, and
//! either hand the data to the downstream handler or reject with Forbidden.

use bson::{doc, oid::ObjectId, Document};
use futures_util::TryStreamExt;
use mongodb::Collection;
use std::sync::Arc;
use tracing::debug;

use crate::db::MongoClient;
use crate::types::{KoinoniaError, Result};
use crate::visibility::resolver::{
    ActorRole, Decision, ResourceKind, VisibilityResolver, VisibilitySetting,
};

/// Read-only port for fetching an actor's visibility setting; the setting is
/// owned by profile management outside this crate
#[async_trait::async_trait]
pub trait VisibilitySource: Send + Sync {
    async fn visibility_of(&self, actor_id: &str) -> Result<VisibilitySetting>;
}

/// How the guarded collection is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupBy {
    /// A single document fetched by its primary id
    PrimaryId,
    /// All of an owner's documents, for list endpoints; the requested id is
    /// the owning actor's id
    OwnerActor,
}

/// Data the guard attaches for the downstream handler on Allow
#[derive(Debug, Clone)]
pub enum GuardedData {
    One(Document),
    Many(Vec<Document>),
}

/// An authorized resource: the owner that was resolved plus the loaded data
#[derive(Debug, Clone)]
pub struct GuardedResource {
    pub owner_actor_id: String,
    pub data: GuardedData,
}

/// Visibility guard for one resource collection
#[derive(Clone)]
pub struct ResourceGuard {
    collection: Collection<Document>,
    kind: ResourceKind,
    lookup_by: LookupBy,
    resolver: VisibilityResolver,
    profiles: Arc<dyn VisibilitySource>,
}

impl ResourceGuard {
    pub fn new(
        client: &MongoClient,
        collection_name: &str,
        kind: ResourceKind,
        lookup_by: LookupBy,
        resolver: VisibilityResolver,
        profiles: Arc<dyn VisibilitySource>,
    ) -> Self {
        Self {
            collection: client.raw_collection(collection_name),
            kind,
            lookup_by,
            resolver,
            profiles,
        }
    }

    /// Load the requested resource and decide whether the viewer may see it.
    /// `NotFound` when the resource does not exist, `Forbidden` carrying the
    /// resolver's reason when it is denied.
    pub async fn authorize(
        &self,
        viewer_id: &str,
        viewer_role: ActorRole,
        resource_id: &str,
    ) -> Result<GuardedResource> {
        let (owner_actor_id, data) = match self.lookup_by {
            LookupBy::PrimaryId => {
                let document = self.load_by_primary_id(resource_id).await?;
                let owner = extract_owner_actor_id(&document, viewer_id).ok_or_else(|| {
                    KoinoniaError::Internal(
                        "resource document has no recognizable owner field".to_string(),
                    )
                })?;
                (owner, GuardedData::One(document))
            }
            LookupBy::OwnerActor => {
                let documents = self.load_by_owner(resource_id).await?;
                (resource_id.to_string(), GuardedData::Many(documents))
            }
        };

        let setting = self.profiles.visibility_of(&owner_actor_id).await?;

        match self
            .resolver
            .resolve(viewer_id, viewer_role, &owner_actor_id, setting, self.kind)
            .await?
        {
            Decision::Allow => {
                debug!(
                    viewer = viewer_id,
                    owner = %owner_actor_id,
                    kind = ?self.kind,
                    "resource access allowed"
                );
                Ok(GuardedResource {
                    owner_actor_id,
                    data,
                })
            }
            Decision::Deny { reason } => Err(KoinoniaError::Forbidden(reason)),
        }
    }

    async fn load_by_primary_id(&self, resource_id: &str) -> Result<Document> {
        // Native ObjectId primary keys and legacy string ids both occur
        let filter = match ObjectId::parse_str(resource_id) {
            Ok(oid) => doc! { "_id": oid },
            Err(_) => doc! { "id": resource_id },
        };

        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.collection
            .find_one(full_filter)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Find failed: {}", e)))?
            .ok_or_else(|| KoinoniaError::NotFound("resource not found".to_string()))
    }

    async fn load_by_owner(&self, owner_actor_id: &str) -> Result<Vec<Document>> {
        let filter = doc! {
            "$or": [
                { "userId": owner_actor_id },
                { "initiatorId": owner_actor_id },
                { "recipientId": owner_actor_id },
            ],
            "metadata.is_deleted": { "$ne": true },
        };

        let documents: Vec<Document> = self
            .collection
            .find(filter)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Find failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| KoinoniaError::Database(format!("Cursor failed: {}", e)))?;

        if documents.is_empty() {
            return Err(KoinoniaError::NotFound("resource not found".to_string()));
        }

        Ok(documents)
    }
}

/// Extract the owning actor id from a resource document, supporting the
/// legacy field names still present in older collections. For relationship
/// rows the owner is the counterpart of the viewer when the viewer is a
/// party, otherwise the initiator.
pub fn extract_owner_actor_id(document: &Document, viewer_id: &str) -> Option<String> {
    if let Ok(user_id) = document.get_str("userId") {
        return Some(user_id.to_string());
    }

    if let (Ok(initiator), Ok(recipient)) = (
        document.get_str("initiatorId"),
        document.get_str("recipientId"),
    ) {
        let owner = if viewer_id == initiator {
            recipient
        } else {
            initiator
        };
        return Some(owner.to_string());
    }

    if let Ok(owner_id) = document.get_str("ownerId") {
        return Some(owner_id.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_extraction_prefers_user_id() {
        let document = doc! { "userId": "alice", "ownerId": "bob" };
        assert_eq!(
            extract_owner_actor_id(&document, "viewer"),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_owner_extraction_relationship_pair() {
        let document = doc! { "initiatorId": "alice", "recipientId": "bob" };
        // viewer is a party: owner is the counterpart
        assert_eq!(
            extract_owner_actor_id(&document, "alice"),
            Some("bob".to_string())
        );
        assert_eq!(
            extract_owner_actor_id(&document, "bob"),
            Some("alice".to_string())
        );
        // viewer is a stranger: owner defaults to the initiator
        assert_eq!(
            extract_owner_actor_id(&document, "carol"),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_owner_extraction_falls_back_to_owner_id() {
        let document = doc! { "ownerId": "carol" };
        assert_eq!(
            extract_owner_actor_id(&document, "viewer"),
            Some("carol".to_string())
        );
    }

    #[test]
    fn test_owner_extraction_missing_fields() {
        let document = doc! { "title": "untitled" };
        assert_eq!(extract_owner_actor_id(&document, "viewer"), None);
    }
}
