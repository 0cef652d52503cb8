//! Apply a schema to a database and check that a database matches a schema.

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::{
    database::Database,
    schema::{IndexSpec, Schema, SchemaVersion},
};

/// An index of a given collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionIndex {
    pub collection: String,
    pub index: IndexSpec,
}

/// An index that exists with the expected keys but different uniqueness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMismatch {
    pub collection: String,
    pub expected: IndexSpec,
    pub found: IndexSpec,
}

#[derive(Clone, Debug)]
pub struct ApplyReport {
    pub version: SchemaVersion,
    pub applied_at: DateTime<Utc>,
    pub created_collections: Vec<String>,
    pub existing_collections: Vec<String>,
    pub created_indexes: Vec<CollectionIndex>,
    pub existing_indexes: Vec<CollectionIndex>,
}

#[derive(Clone, Debug)]
pub struct VerifyReport {
    pub version: SchemaVersion,
    pub checked_collections: usize,
    pub checked_indexes: usize,
    pub missing_collections: Vec<String>,
    pub missing_indexes: Vec<CollectionIndex>,
    pub mismatched_indexes: Vec<IndexMismatch>,
    /// Indexes found on the declared collections that the schema does not declare.
    pub extra_indexes: Vec<CollectionIndex>,
}

impl CollectionIndex {
    fn new(collection: &str, index: &IndexSpec) -> CollectionIndex {
        CollectionIndex {
            collection: collection.to_string(),
            index: index.clone(),
        }
    }
}

impl VerifyReport {
    /// Check if every declared collection and index is present as declared.
    ///
    /// Extra indexes do not make a database invalid.
    pub fn is_ok(&self) -> bool {
        self.missing_collections.is_empty()
            && self.missing_indexes.is_empty()
            && self.mismatched_indexes.is_empty()
    }
}

/// Create the collections of the schema, then their indexes.
///
/// Collections and indexes that already exist are left untouched, so applying the
/// same schema twice is harmless.
pub async fn apply_schema<D: Database>(
    database: &mut D,
    schema: &Schema,
) -> anyhow::Result<ApplyReport> {
    info!("Applying schema {}", schema.version);

    let mut report = ApplyReport {
        version: schema.version,
        applied_at: Utc::now(),
        created_collections: vec![],
        existing_collections: vec![],
        created_indexes: vec![],
        existing_indexes: vec![],
    };

    for collection in &schema.collections {
        let created = database
            .create_collection_if_not_exists(&collection.name)
            .await
            .with_context(|| format!("cannot apply schema {}", schema.version))?;

        if created {
            info!("Created collection {}", collection.name);
            report.created_collections.push(collection.name.clone());
        } else {
            debug!("Collection {} already exists", collection.name);
            report.existing_collections.push(collection.name.clone());
        }

        let existing_indexes = database
            .list_indexes(&collection.name)
            .await
            .with_context(|| format!("cannot apply schema {}", schema.version))?;

        for index in &collection.indexes {
            if existing_indexes.contains(index) {
                debug!("Index {index} already exists on {}", collection.name);
                report
                    .existing_indexes
                    .push(CollectionIndex::new(&collection.name, index));
                continue;
            }

            let name = database
                .create_index(&collection.name, index)
                .await
                .with_context(|| format!("cannot apply schema {}", schema.version))?;
            info!("Created index {name} on {}", collection.name);
            report
                .created_indexes
                .push(CollectionIndex::new(&collection.name, index));
        }
    }

    Ok(report)
}

/// Compare the collections and indexes in the database with the schema.
pub async fn verify_schema<D: Database>(
    database: &D,
    schema: &Schema,
) -> anyhow::Result<VerifyReport> {
    info!("Verifying schema {}", schema.version);

    let mut report = VerifyReport {
        version: schema.version,
        checked_collections: schema.collections.len(),
        checked_indexes: schema.index_count(),
        missing_collections: vec![],
        missing_indexes: vec![],
        mismatched_indexes: vec![],
        extra_indexes: vec![],
    };

    let collection_names = database
        .collection_names()
        .await
        .with_context(|| format!("cannot verify schema {}", schema.version))?;

    for collection in &schema.collections {
        if !collection_names.contains(&collection.name) {
            warn!("Collection {} is missing", collection.name);
            report.missing_collections.push(collection.name.clone());
            report.missing_indexes.extend(
                collection
                    .indexes
                    .iter()
                    .map(|i| CollectionIndex::new(&collection.name, i)),
            );
            continue;
        }

        let found_indexes = database
            .list_indexes(&collection.name)
            .await
            .with_context(|| format!("cannot verify schema {}", schema.version))?;

        for expected in &collection.indexes {
            if found_indexes.contains(expected) {
                continue;
            }
            match found_indexes.iter().find(|f| f.same_keys(expected)) {
                Some(found) => {
                    warn!(
                        "Index {expected} on {} is declared as {found}",
                        collection.name
                    );
                    report.mismatched_indexes.push(IndexMismatch {
                        collection: collection.name.clone(),
                        expected: expected.clone(),
                        found: found.clone(),
                    });
                }
                None => {
                    warn!("Index {expected} on {} is missing", collection.name);
                    report
                        .missing_indexes
                        .push(CollectionIndex::new(&collection.name, expected));
                }
            }
        }

        report.extra_indexes.extend(
            found_indexes
                .iter()
                .filter(|f| !collection.indexes.iter().any(|e| e.same_keys(f)))
                .map(|f| CollectionIndex::new(&collection.name, f)),
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryDatabase;
    use mongodb::bson::doc;

    const ALL_VERSIONS: [SchemaVersion; 3] =
        [SchemaVersion::V1, SchemaVersion::V2, SchemaVersion::V3];

    #[tokio::test]
    async fn test_apply_creates_everything() {
        for version in ALL_VERSIONS {
            let schema = Schema::for_version(version);
            let mut database = MemoryDatabase::new();

            let report = apply_schema(&mut database, &schema).await.unwrap();
            assert_eq!(report.created_collections.len(), schema.collections.len());
            assert_eq!(report.created_indexes.len(), schema.index_count());
            assert!(report.existing_collections.is_empty());
            assert!(report.existing_indexes.is_empty());

            let mut names = database.collection_names().await.unwrap();
            names.sort();
            let mut expected: Vec<_> = schema
                .collections
                .iter()
                .map(|c| c.name.clone())
                .collect();
            expected.sort();
            assert_eq!(names, expected);
        }
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let schema = Schema::for_version(SchemaVersion::V2);
        let mut database = MemoryDatabase::new();

        apply_schema(&mut database, &schema).await.unwrap();
        let report = apply_schema(&mut database, &schema).await.unwrap();

        assert!(report.created_collections.is_empty());
        assert!(report.created_indexes.is_empty());
        assert_eq!(report.existing_collections.len(), 3);
        assert_eq!(report.existing_indexes.len(), 7);
    }

    #[tokio::test]
    async fn test_apply_fails_on_conflicting_index() {
        let schema = Schema::for_version(SchemaVersion::V2);
        let mut database = MemoryDatabase::new();
        database
            .create_index("users", &IndexSpec::ascending(&["tg_username"], true))
            .await
            .unwrap();

        assert!(apply_schema(&mut database, &schema).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_after_apply() {
        for version in ALL_VERSIONS {
            let schema = Schema::for_version(version);
            let mut database = MemoryDatabase::new();
            apply_schema(&mut database, &schema).await.unwrap();

            let report = verify_schema(&database, &schema).await.unwrap();
            assert!(report.is_ok(), "{version}: {report:?}");
            assert!(report.extra_indexes.is_empty());
            assert_eq!(report.checked_indexes, schema.index_count());
        }
    }

    #[tokio::test]
    async fn test_verify_empty_database() {
        let schema = Schema::for_version(SchemaVersion::V3);
        let database = MemoryDatabase::new();

        let report = verify_schema(&database, &schema).await.unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.missing_collections, vec!["users", "messages"]);
        assert_eq!(report.missing_indexes.len(), 3);
    }

    #[tokio::test]
    async fn test_verify_detects_mismatch_and_extra() {
        let schema = Schema::for_version(SchemaVersion::V3);
        let mut database = MemoryDatabase::new();
        database
            .create_index("users", &IndexSpec::ascending(&["tg_user_id"], true))
            .await
            .unwrap();
        database
            .create_index("users", &IndexSpec::ascending(&["tg_username"], true))
            .await
            .unwrap();
        database
            .create_index("users", &IndexSpec::ascending(&["created_at"], false))
            .await
            .unwrap();
        database
            .create_collection_if_not_exists("messages")
            .await
            .unwrap();

        let report = verify_schema(&database, &schema).await.unwrap();
        assert!(!report.is_ok());
        assert!(report.missing_collections.is_empty());
        assert_eq!(
            report.mismatched_indexes,
            vec![IndexMismatch {
                collection: "users".to_string(),
                expected: IndexSpec::ascending(&["tg_username"], false),
                found: IndexSpec::ascending(&["tg_username"], true),
            }]
        );
        assert_eq!(
            report.missing_indexes,
            vec![CollectionIndex::new(
                "messages",
                &IndexSpec::ascending(&["tg_chat_id", "tg_user_id"], false)
            )]
        );
        assert_eq!(
            report.extra_indexes,
            vec![CollectionIndex::new(
                "users",
                &IndexSpec::ascending(&["created_at"], false)
            )]
        );
    }

    #[tokio::test]
    async fn test_unique_constraints_after_apply() {
        let mut database = MemoryDatabase::new();
        apply_schema(&mut database, &Schema::for_version(SchemaVersion::V1))
            .await
            .unwrap();

        database
            .insert_document("event", doc! { "tg_chat_id": 1_i64, "user_id": 7_i64 })
            .await
            .unwrap();
        database
            .insert_document("event", doc! { "tg_chat_id": 2_i64, "user_id": 7_i64 })
            .await
            .unwrap();
        assert!(database
            .insert_document("event", doc! { "tg_chat_id": 1_i64, "user_id": 7_i64 })
            .await
            .unwrap_err()
            .is_duplicate_key());

        // Usernames are unique in the first variant only.
        database
            .insert_document("user_in_chat", doc! { "tg_user_id": 1_i64, "tg_username": "bob" })
            .await
            .unwrap();
        assert!(database
            .insert_document("user_in_chat", doc! { "tg_user_id": 2_i64, "tg_username": "bob" })
            .await
            .unwrap_err()
            .is_duplicate_key());

        let mut database = MemoryDatabase::new();
        apply_schema(&mut database, &Schema::for_version(SchemaVersion::V3))
            .await
            .unwrap();
        database
            .insert_document("users", doc! { "tg_user_id": 1_i64, "tg_username": "bob" })
            .await
            .unwrap();
        database
            .insert_document("users", doc! { "tg_user_id": 2_i64, "tg_username": "bob" })
            .await
            .unwrap();
        assert!(database
            .insert_document("users", doc! { "tg_user_id": 1_i64, "tg_username": "alice" })
            .await
            .unwrap_err()
            .is_duplicate_key());
    }
}
