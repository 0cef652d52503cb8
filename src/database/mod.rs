//! Access to the document store that holds the schema.

use mongodb::bson::Document;

use crate::{error::DatabaseError, schema::IndexSpec};

pub type DatabaseResult<T> = Result<T, DatabaseError>;

pub mod memory;
pub mod mongo;

/// Size information about a single collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionStats {
    pub name: String,
    pub count: i64,
    pub total_size_bytes: i64,
}

impl CollectionStats {
    /// Average size of a document, including its share of the indexes.
    pub fn avg_size_bytes(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            self.total_size_bytes / self.count
        }
    }
}

/// This trait abstracts over the type of database.
///
/// The implementation could talk to an actual MongoDB server or keep everything in memory.
#[allow(async_fn_in_trait)]
pub trait Database {
    /// Check that the database answers.
    async fn ping(&self) -> DatabaseResult<()>;

    /// Get the names of all collections in the database.
    async fn collection_names(&self) -> DatabaseResult<Vec<String>>;

    /// Create a collection with the given *name*.
    ///
    /// If the collection already exists, it is a no-op. Returns whether the collection
    /// was actually created.
    async fn create_collection_if_not_exists(&mut self, name: &str) -> DatabaseResult<bool>;

    /// Create an index on the given collection and return its name.
    ///
    /// The collection is created if it does not exist. Creating an index identical to an
    /// existing one is a no-op; an existing index with the same name but different
    /// options is an error.
    async fn create_index(&mut self, collection: &str, index: &IndexSpec)
        -> DatabaseResult<String>;

    /// Get the indexes of the given collection.
    ///
    /// The default index on `_id` is not included. If the collection does not exist,
    /// the list is empty.
    async fn list_indexes(&self, collection: &str) -> DatabaseResult<Vec<IndexSpec>>;

    /// Insert a document in the given collection.
    ///
    /// If the document collides with another one on a unique index, a duplicate key error
    /// is returned.
    async fn insert_document(&mut self, collection: &str, document: Document)
        -> DatabaseResult<()>;

    /// Get the number of documents and the size of the given collection.
    async fn collection_stats(&self, collection: &str) -> DatabaseResult<CollectionStats>;
}
