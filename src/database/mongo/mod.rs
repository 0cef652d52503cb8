//! The implementation of the schema storage using MongoDB.

use std::time::Duration;

use anyhow::anyhow;
use futures::TryStreamExt;
use log::{debug, info};
use mongodb::{
    bson::{doc, Document},
    error::{Error, ErrorKind, WriteFailure},
    options::ClientOptions,
    Client,
};

use crate::{
    config::StorageSettings,
    error::{
        DatabaseError, DatabaseErrorKind, DUPLICATE_KEY_CODE, INDEX_KEY_SPECS_CONFLICT_CODE,
        INDEX_OPTIONS_CONFLICT_CODE,
    },
    schema::IndexSpec,
};

use super::{CollectionStats, Database, DatabaseResult};

mod index;

const APP_NAME: &str = "tg_schema";
const NAMESPACE_NOT_FOUND_CODE: i32 = 26;
const NAMESPACE_EXISTS_CODE: i32 = 48;

pub struct MongoDatabase {
    database: mongodb::Database,
}

impl MongoDatabase {
    pub async fn connect(settings: &StorageSettings) -> DatabaseResult<MongoDatabase> {
        let mut options = ClientOptions::parse(&settings.mongo_db_url)
            .await
            .map_err(|e| map_error("cannot parse MongoDB URL", e))?;

        let timeout = Duration::from_secs(settings.timeout_secs);
        options.app_name = Some(APP_NAME.to_string());
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client =
            Client::with_options(options).map_err(|e| map_error("cannot create client", e))?;

        info!("Using database {}", settings.database);
        Ok(MongoDatabase {
            database: client.database(&settings.database),
        })
    }
}

impl Database for MongoDatabase {
    async fn ping(&self) -> DatabaseResult<()> {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| map_error("cannot ping database", e))?;
        Ok(())
    }

    async fn collection_names(&self) -> DatabaseResult<Vec<String>> {
        self.database
            .list_collection_names(None)
            .await
            .map_err(|e| map_error("cannot list collections", e))
    }

    async fn create_collection_if_not_exists(&mut self, name: &str) -> DatabaseResult<bool> {
        if self.collection_names().await?.iter().any(|c| c == name) {
            return Ok(false);
        }

        match self.database.create_collection(name, None).await {
            Ok(()) => Ok(true),
            // Someone else created it in the meantime.
            Err(e) if error_code(&e) == Some(NAMESPACE_EXISTS_CODE) => Ok(false),
            Err(e) => Err(map_error(format!("cannot create collection {name}"), e)),
        }
    }

    async fn create_index(
        &mut self,
        collection: &str,
        index: &IndexSpec,
    ) -> DatabaseResult<String> {
        let model = index::to_index_model(index);
        debug!("Creating index {:?} on {collection}", model.keys);

        let result = self
            .database
            .collection::<Document>(collection)
            .create_index(model, None)
            .await
            .map_err(|e| {
                map_error(
                    format!("cannot create index {} on {collection}", index.default_name()),
                    e,
                )
            })?;

        Ok(result.index_name)
    }

    async fn list_indexes(&self, collection: &str) -> DatabaseResult<Vec<IndexSpec>> {
        let message = format!("cannot list indexes of {collection}");

        let cursor = match self
            .database
            .collection::<Document>(collection)
            .list_indexes(None)
            .await
        {
            Ok(cursor) => cursor,
            Err(e) if error_code(&e) == Some(NAMESPACE_NOT_FOUND_CODE) => return Ok(vec![]),
            Err(e) => return Err(map_error(message, e)),
        };

        let models: Vec<_> = cursor
            .try_collect()
            .await
            .map_err(|e| map_error(&message, e))?;

        let mut indexes = vec![];
        for model in models {
            if index::index_name(&model) == Some(index::ID_INDEX_NAME) {
                continue;
            }
            match index::from_index_model(&model) {
                Some(index) => indexes.push(index),
                None => debug!("Skipping special index {:?} on {collection}", model.keys),
            }
        }
        Ok(indexes)
    }

    async fn insert_document(
        &mut self,
        collection: &str,
        document: Document,
    ) -> DatabaseResult<()> {
        self.database
            .collection::<Document>(collection)
            .insert_one(document, None)
            .await
            .map_err(|e| map_error(format!("cannot insert document in {collection}"), e))?;
        Ok(())
    }

    async fn collection_stats(&self, collection: &str) -> DatabaseResult<CollectionStats> {
        let message = format!("cannot get stats of {collection}");

        let document = self
            .database
            .run_command(doc! { "collStats": collection }, None)
            .await
            .map_err(|e| map_error(&message, e))?;

        let get_number = |key: &str| {
            document
                .get(key)
                .and_then(index::bson_as_i64)
                .ok_or_else(|| DatabaseError::new(&message, anyhow!("missing `{key}` in stats")))
        };

        Ok(CollectionStats {
            name: collection.to_string(),
            count: get_number("count")?,
            total_size_bytes: get_number("totalSize")?,
        })
    }
}

fn error_code(e: &Error) -> Option<i32> {
    match e.kind.as_ref() {
        ErrorKind::Command(command_error) => Some(command_error.code),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => Some(write_error.code),
        _ => None,
    }
}

fn map_error<T: AsRef<str>>(message: T, e: Error) -> DatabaseError {
    let kind = match error_code(&e) {
        Some(DUPLICATE_KEY_CODE) => DatabaseErrorKind::DuplicateKey,
        Some(INDEX_OPTIONS_CONFLICT_CODE) | Some(INDEX_KEY_SPECS_CONFLICT_CODE) => {
            DatabaseErrorKind::IndexConflict
        }
        _ => match e.kind.as_ref() {
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. } => DatabaseErrorKind::Connection,
            _ => DatabaseErrorKind::Other,
        },
    };
    DatabaseError::with_kind(message, kind, e.into())
}

/// These tests need a running MongoDB server, whose URL is read from
/// `FUN_TEST_MONGO_DB_URL`. Run them with `cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::{Schema, SchemaVersion},
        setup::{apply_schema, verify_schema},
    };

    async fn test_database(name: &str) -> MongoDatabase {
        let settings = StorageSettings {
            mongo_db_url: std::env::var("FUN_TEST_MONGO_DB_URL")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            database: format!("tg_schema_test_{name}"),
            timeout_secs: 5,
        };
        let database = MongoDatabase::connect(&settings).await.unwrap();
        database.database.drop(None).await.unwrap();
        database
    }

    #[tokio::test]
    #[ignore = "needs a running MongoDB server"]
    async fn test_apply_and_verify() {
        for version in [SchemaVersion::V1, SchemaVersion::V2, SchemaVersion::V3] {
            let mut database = test_database(&version.to_string()).await;
            let schema = Schema::for_version(version);

            let report = apply_schema(&mut database, &schema).await.unwrap();
            assert_eq!(report.created_indexes.len(), schema.index_count());

            let report = verify_schema(&database, &schema).await.unwrap();
            assert!(report.is_ok(), "{version}: {report:?}");

            let report = apply_schema(&mut database, &schema).await.unwrap();
            assert!(report.created_collections.is_empty());
            assert!(report.created_indexes.is_empty());

            database.database.drop(None).await.unwrap();
        }
    }

    #[tokio::test]
    #[ignore = "needs a running MongoDB server"]
    async fn test_unique_members() {
        let mut database = test_database("members").await;
        apply_schema(&mut database, &Schema::for_version(SchemaVersion::V2))
            .await
            .unwrap();

        database
            .insert_document("members", doc! { "tg_chat_id": 1_i64, "tg_user_id": 2_i64 })
            .await
            .unwrap();
        let e = database
            .insert_document("members", doc! { "tg_chat_id": 1_i64, "tg_user_id": 2_i64 })
            .await
            .unwrap_err();
        assert!(e.is_duplicate_key());

        database
            .insert_document("users", doc! { "tg_id": 1_i64, "tg_username": "same" })
            .await
            .unwrap();
        database
            .insert_document("users", doc! { "tg_id": 2_i64, "tg_username": "same" })
            .await
            .unwrap();

        database.database.drop(None).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs a running MongoDB server"]
    async fn test_conflicting_index() {
        let mut database = test_database("conflict").await;
        database
            .create_index("users", &IndexSpec::ascending(&["tg_username"], true))
            .await
            .unwrap();

        let e = database
            .create_index("users", &IndexSpec::ascending(&["tg_username"], false))
            .await
            .unwrap_err();
        assert_eq!(e.kind(), DatabaseErrorKind::IndexConflict);

        database.database.drop(None).await.unwrap();
    }
}
