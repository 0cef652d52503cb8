//! A database that lives in memory.
//!
//! It follows the rules MongoDB applies to indexes closely enough to preview what
//! applying a schema does and to test the logic built on top of [`Database`].

use std::collections::BTreeMap;

use anyhow::anyhow;
use log::debug;
use mongodb::bson::{self, Bson, Document};

use crate::{
    error::{DatabaseError, DUPLICATE_KEY_CODE, INDEX_OPTIONS_CONFLICT_CODE},
    schema::IndexSpec,
};

use super::{CollectionStats, Database, DatabaseResult};

#[derive(Default)]
pub struct MemoryDatabase {
    collections: BTreeMap<String, MemoryCollection>,
}

#[derive(Default)]
struct MemoryCollection {
    indexes: Vec<IndexSpec>,
    documents: Vec<Document>,
}

impl MemoryDatabase {
    pub fn new() -> MemoryDatabase {
        MemoryDatabase::default()
    }
}

impl MemoryCollection {
    /// Find a document that has the same values as *document* for all fields of *index*.
    fn find_collision(&self, index: &IndexSpec, document: &Document) -> Option<&Document> {
        let key = index_key(index, document);
        self.documents
            .iter()
            .find(|other| index_key(index, other) == key)
    }

    /// Find two stored documents that collide on *index*.
    fn has_collisions(&self, index: &IndexSpec) -> bool {
        self.documents.iter().enumerate().any(|(i, document)| {
            let key = index_key(index, document);
            self.documents[i + 1..]
                .iter()
                .any(|other| index_key(index, other) == key)
        })
    }
}

/// The values a document has for the fields of an index.
///
/// Missing fields are indexed as `null`, so two documents that both lack a field
/// collide on a unique index.
fn index_key(index: &IndexSpec, document: &Document) -> Vec<Bson> {
    index
        .fields
        .iter()
        .map(|f| document.get(&f.name).cloned().unwrap_or(Bson::Null))
        .collect()
}

impl Database for MemoryDatabase {
    async fn ping(&self) -> DatabaseResult<()> {
        Ok(())
    }

    async fn collection_names(&self) -> DatabaseResult<Vec<String>> {
        Ok(self.collections.keys().cloned().collect())
    }

    async fn create_collection_if_not_exists(&mut self, name: &str) -> DatabaseResult<bool> {
        if self.collections.contains_key(name) {
            return Ok(false);
        }
        self.collections
            .insert(name.to_string(), MemoryCollection::default());
        Ok(true)
    }

    async fn create_index(
        &mut self,
        collection: &str,
        index: &IndexSpec,
    ) -> DatabaseResult<String> {
        let name = index.default_name();
        let coll = self.collections.entry(collection.to_string()).or_default();

        if let Some(existing) = coll.indexes.iter().find(|i| i.default_name() == name) {
            if existing == index {
                debug!("Index {name} already exists on {collection}");
                return Ok(name);
            }
            return Err(DatabaseError::index_conflict(
                format!("cannot create index {name} on {collection}"),
                anyhow!(
                    "code {INDEX_OPTIONS_CONFLICT_CODE}: an index with the same name \
                     but different options already exists"
                ),
            ));
        }

        if index.unique && coll.has_collisions(index) {
            return Err(DatabaseError::duplicate_key(
                format!("cannot create index {name} on {collection}"),
                anyhow!("code {DUPLICATE_KEY_CODE}: existing documents violate the index"),
            ));
        }

        coll.indexes.push(index.clone());
        Ok(name)
    }

    async fn list_indexes(&self, collection: &str) -> DatabaseResult<Vec<IndexSpec>> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default())
    }

    async fn insert_document(
        &mut self,
        collection: &str,
        document: Document,
    ) -> DatabaseResult<()> {
        let coll = self.collections.entry(collection.to_string()).or_default();

        for index in coll.indexes.iter().filter(|i| i.unique) {
            if let Some(other) = coll.find_collision(index, &document) {
                return Err(DatabaseError::duplicate_key(
                    format!("cannot insert document in {collection}"),
                    anyhow!(
                        "code {DUPLICATE_KEY_CODE}: duplicate key on index {} with {other}",
                        index.default_name()
                    ),
                ));
            }
        }

        coll.documents.push(document);
        Ok(())
    }

    async fn collection_stats(&self, collection: &str) -> DatabaseResult<CollectionStats> {
        let coll = self.collections.get(collection).ok_or_else(|| {
            DatabaseError::new(
                format!("cannot get stats of {collection}"),
                anyhow!("collection does not exist"),
            )
        })?;

        let mut total_size_bytes = 0;
        for document in &coll.documents {
            let bytes = bson::to_vec(document).map_err(|e| {
                DatabaseError::new(format!("cannot get stats of {collection}"), e.into())
            })?;
            total_size_bytes += bytes.len() as i64;
        }

        Ok(CollectionStats {
            name: collection.to_string(),
            count: coll.documents.len() as i64,
            total_size_bytes,
        })
    }
}
