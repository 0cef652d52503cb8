use thiserror::Error;

/// Server error code for a write rejected by a unique index.
pub const DUPLICATE_KEY_CODE: i32 = 11000;
/// Server error code for an index with an existing name but different options.
pub const INDEX_OPTIONS_CONFLICT_CODE: i32 = 85;
/// Server error code for an index with an existing name but different keys.
pub const INDEX_KEY_SPECS_CONFLICT_CODE: i32 = 86;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    DuplicateKey,
    IndexConflict,
    Connection,
    Other,
}

#[derive(Error, Debug)]
#[error("{message}: {cause}")]
pub struct DatabaseError {
    message: String,
    kind: DatabaseErrorKind,
    cause: anyhow::Error,
}

impl DatabaseError {
    pub fn new<T: AsRef<str>>(message: T, cause: anyhow::Error) -> Self {
        DatabaseError::with_kind(message, DatabaseErrorKind::Other, cause)
    }

    pub fn with_kind<T: AsRef<str>>(
        message: T,
        kind: DatabaseErrorKind,
        cause: anyhow::Error,
    ) -> Self {
        DatabaseError {
            message: message.as_ref().to_string(),
            kind,
            cause,
        }
    }

    pub fn duplicate_key<T: AsRef<str>>(message: T, cause: anyhow::Error) -> Self {
        DatabaseError::with_kind(message, DatabaseErrorKind::DuplicateKey, cause)
    }

    pub fn index_conflict<T: AsRef<str>>(message: T, cause: anyhow::Error) -> Self {
        DatabaseError::with_kind(message, DatabaseErrorKind::IndexConflict, cause)
    }

    pub fn kind(&self) -> DatabaseErrorKind {
        self.kind
    }

    pub fn is_duplicate_key(&self) -> bool {
        self.kind == DatabaseErrorKind::DuplicateKey
    }
}
