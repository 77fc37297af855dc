//! MongoDB client and collection wrapper
//!
//! Typed collections with schema-declared indexes, soft-delete-aware reads,
//! and client-session helpers for multi-document transactions.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{IndexOptions, UpdateModifications},
    results::{DeleteResult, UpdateResult},
    Client, ClientSession, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::KoinoniaError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, KoinoniaError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        // Verify connection with timeout
        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| KoinoniaError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, KoinoniaError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get an untyped collection (no schema indexes applied)
    pub fn raw_collection(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.db_name).collection(name)
    }

    /// Start a client session for transactional work
    pub async fn start_session(&self) -> Result<ClientSession, KoinoniaError> {
        self.client
            .start_session()
            .await
            .map_err(|e| KoinoniaError::Database(format!("Failed to start session: {}", e)))
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, KoinoniaError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        // Apply indexes
        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), KoinoniaError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, KoinoniaError> {
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(KoinoniaError::from)?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| KoinoniaError::Database("Failed to get inserted ID".into()))
    }

    /// Insert a document inside an open session
    pub async fn insert_one_with_session(
        &self,
        mut item: T,
        session: &mut ClientSession,
    ) -> Result<ObjectId, KoinoniaError> {
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let result = self
            .inner
            .insert_one(item)
            .session(session)
            .await
            .map_err(KoinoniaError::from)?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| KoinoniaError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, KoinoniaError> {
        // Add is_deleted check
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.inner
            .find_one(full_filter)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Find failed: {}", e)))
    }

    /// Find one document by filter inside an open session
    pub async fn find_one_with_session(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<Option<T>, KoinoniaError> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.inner
            .find_one(full_filter)
            .session(session)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Find failed: {}", e)))
    }

    /// Find many documents by filter, with optional skip/limit paging
    pub async fn find_many(
        &self,
        filter: Document,
        skip: Option<u64>,
        limit: Option<i64>,
    ) -> Result<Vec<T>, KoinoniaError> {
        use futures_util::StreamExt;

        // Add is_deleted check
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let mut find = self.inner.find(full_filter);
        if let Some(skip) = skip {
            find = find.skip(skip);
        }
        if let Some(limit) = limit {
            find = find.limit(limit);
        }

        let cursor = find
            .await
            .map_err(|e| KoinoniaError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Count documents matching the filter
    pub async fn count(&self, filter: Document) -> Result<u64, KoinoniaError> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.inner
            .count_documents(full_filter)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Count failed: {}", e)))
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, KoinoniaError> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| KoinoniaError::Database(format!("Update failed: {}", e)))
    }

    /// Update one document inside an open session
    pub async fn update_one_with_session(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        session: &mut ClientSession,
    ) -> Result<UpdateResult, KoinoniaError> {
        self.inner
            .update_one(filter, update.into())
            .session(session)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Update failed: {}", e)))
    }

    /// Upsert one document inside an open session
    pub async fn upsert_one_with_session(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        session: &mut ClientSession,
    ) -> Result<UpdateResult, KoinoniaError> {
        self.inner
            .update_one(filter, update.into())
            .upsert(true)
            .session(session)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Upsert failed: {}", e)))
    }

    /// Hard-delete one document
    pub async fn delete_one(&self, filter: Document) -> Result<DeleteResult, KoinoniaError> {
        self.inner
            .delete_one(filter)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Delete failed: {}", e)))
    }

    /// Hard-delete one document inside an open session
    pub async fn delete_one_with_session(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<DeleteResult, KoinoniaError> {
        self.inner
            .delete_one(filter)
            .session(session)
            .await
            .map_err(|e| KoinoniaError::Database(format!("Delete failed: {}", e)))
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    // Integration tests require a running MongoDB replica set (transactions
    // are unavailable on standalone servers); exercised via the service tests.
}
