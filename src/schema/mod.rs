//! Declarative description of the collections and indexes of each schema variant.

use std::fmt;

use clap::ValueEnum;

mod versions;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum SchemaVersion {
    /// `event` and `user_in_chat` collections.
    V1,
    /// `users`, `messages` and `members` keyed by `tg_id`.
    V2,
    /// `users` and `messages` keyed by `tg_user_id`.
    V3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexField {
    pub name: String,
    pub order: SortOrder,
}

/// An index over an ordered list of fields.
///
/// Two indexes are the same index if they have the same fields, in the same order and
/// with the same sort direction, and agree on uniqueness.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    pub fields: Vec<IndexField>,
    pub unique: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub indexes: Vec<IndexSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    pub version: SchemaVersion,
    pub collections: Vec<CollectionSpec>,
}

impl SortOrder {
    pub fn as_i32(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }

    /// Interpret the value stored for a key in an index key document.
    ///
    /// Servers may return the direction as any numeric type. Anything that is not
    /// a plain direction (e.g. `"text"` or `"2dsphere"`) yields `None`.
    pub fn from_number(value: f64) -> Option<SortOrder> {
        if value == 1.0 {
            Some(SortOrder::Ascending)
        } else if value == -1.0 {
            Some(SortOrder::Descending)
        } else {
            None
        }
    }
}

impl IndexField {
    pub fn new(name: &str, order: SortOrder) -> IndexField {
        IndexField {
            name: name.to_string(),
            order,
        }
    }

    pub fn ascending(name: &str) -> IndexField {
        IndexField::new(name, SortOrder::Ascending)
    }
}

impl IndexSpec {
    pub fn new(fields: Vec<IndexField>, unique: bool) -> IndexSpec {
        IndexSpec { fields, unique }
    }

    /// An index with all the given fields in ascending order.
    pub fn ascending(field_names: &[&str], unique: bool) -> IndexSpec {
        let fields = field_names
            .iter()
            .map(|name| IndexField::ascending(name))
            .collect();
        IndexSpec::new(fields, unique)
    }

    /// The name MongoDB gives to the index when none is provided, e.g.
    /// `tg_chat_id_1_tg_user_id_1`.
    pub fn default_name(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}_{}", f.name, f.order.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Check if both indexes cover the same fields in the same order, ignoring uniqueness.
    pub fn same_keys(&self, other: &IndexSpec) -> bool {
        self.fields == other.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

impl CollectionSpec {
    pub fn new(name: &str, indexes: Vec<IndexSpec>) -> CollectionSpec {
        CollectionSpec {
            name: name.to_string(),
            indexes,
        }
    }
}

impl Schema {
    /// Get the declarations of the given schema variant.
    pub fn for_version(version: SchemaVersion) -> Schema {
        let collections = match version {
            SchemaVersion::V1 => versions::v1(),
            SchemaVersion::V2 => versions::v2(),
            SchemaVersion::V3 => versions::v3(),
        };
        Schema {
            version,
            collections,
        }
    }

    pub fn index_count(&self) -> usize {
        self.collections.iter().map(|c| c.indexes.len()).sum()
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchemaVersion::V1 => write!(f, "v1"),
            SchemaVersion::V2 => write!(f, "v2"),
            SchemaVersion::V3 => write!(f, "v3"),
        }
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fields = self
            .fields
            .iter()
            .map(|field| match field.order {
                SortOrder::Ascending => field.name.clone(),
                SortOrder::Descending => format!("-{}", field.name),
            })
            .collect::<Vec<_>>()
            .join(", ");
        if self.unique {
            write!(f, "({fields}) unique")
        } else {
            write!(f, "({fields})")
        }
    }
}
