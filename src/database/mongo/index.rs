//! Conversion between index declarations and the driver's index models.

use mongodb::{
    bson::{Bson, Document},
    options::IndexOptions,
    IndexModel,
};

use crate::schema::{IndexField, IndexSpec, SortOrder};

/// The name of the index MongoDB creates on `_id` for every collection.
pub const ID_INDEX_NAME: &str = "_id_";

pub fn to_index_model(index: &IndexSpec) -> IndexModel {
    let mut keys = Document::new();
    for field in &index.fields {
        keys.insert(field.name.clone(), field.order.as_i32());
    }

    let options = IndexOptions::builder()
        .name(index.default_name())
        .unique(index.unique)
        .build();

    IndexModel::builder().keys(keys).options(options).build()
}

/// Convert an index read from the server.
///
/// Returns `None` for indexes that are not made of plain ascending/descending keys,
/// such as text or geospatial indexes.
pub fn from_index_model(model: &IndexModel) -> Option<IndexSpec> {
    let fields = model
        .keys
        .iter()
        .map(|(name, value)| {
            let order = bson_as_f64(value).and_then(SortOrder::from_number)?;
            Some(IndexField::new(name, order))
        })
        .collect::<Option<Vec<_>>>()?;

    let unique = model
        .options
        .as_ref()
        .and_then(|o| o.unique)
        .unwrap_or(false);

    Some(IndexSpec::new(fields, unique))
}

pub fn index_name(model: &IndexModel) -> Option<&str> {
    model.options.as_ref().and_then(|o| o.name.as_deref())
}

pub fn bson_as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

pub fn bson_as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    }
}
