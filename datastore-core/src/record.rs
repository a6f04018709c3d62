//! Records and the traits for viewing them as typed models.
//!
//! The store keeps every record as a raw JSON object ([`Record`]). Application code that
//! prefers concrete types implements [`Model`] and converts through [`ModelExt`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, from_value, to_value};

use crate::{
    error::{DataStoreError, DataStoreResult},
    id::RecordId,
};

/// A single record as held by the store: a JSON object.
pub type Record = Map<String, Value>;

/// A typed view over the records of one resource.
///
/// # Example
///
/// ```ignore
/// use datastore::record::Model;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Post {
///     pub id: i64,
///     pub author: String,
/// }
///
/// impl Model for Post {
///     fn resource_name() -> &'static str {
///         "post"
///     }
/// }
/// ```
pub trait Model: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns the name of the resource this model belongs to.
    ///
    /// The resource must be registered with the store before the model is used.
    fn resource_name() -> &'static str;
}

/// Conversion helpers between models and raw JSON records.
///
/// Automatically implemented for every [`Model`].
pub trait ModelExt: Model {
    /// Converts this model into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_json(&self) -> DataStoreResult<Value>;

    /// Creates a model from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_json(value: Value) -> DataStoreResult<Self>;

    /// Creates a model from a stored record.
    fn from_record(record: Record) -> DataStoreResult<Self> {
        Self::from_json(Value::Object(record))
    }
}

impl<M: Model> ModelExt for M {
    fn to_json(&self) -> DataStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DataStoreResult<Self> {
        Ok(from_value(value)?)
    }
}

/// Reads the identifier of `record` from its `id_attribute` field.
pub fn record_id(record: &Record, id_attribute: &str) -> Option<RecordId> {
    record.get(id_attribute).and_then(RecordId::from_value)
}

/// Splits a backend response into records, requiring each to carry an identifier.
///
/// A single object is treated as a one-element batch. The whole batch is rejected if
/// any element is not an object or lacks the identifier.
pub fn into_records(value: Value, id_attribute: &str) -> DataStoreResult<Vec<(RecordId, Record)>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => return Err(missing_id_error()),
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => record_id(&record, id_attribute)
                .map(|id| (id, record))
                .ok_or_else(missing_id_error),
            _ => Err(missing_id_error()),
        })
        .collect()
}

fn missing_id_error() -> DataStoreError {
    DataStoreError::illegal_argument("attrs: Must contain the property specified by `idAttribute`!")
}

/// Recursively merges `source` into `target`.
///
/// Nested objects are merged key by key; every other value in `source` replaces the
/// value in `target`.
pub fn deep_mix_in(target: &mut Record, source: &Record) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_mix_in(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn deep_mix_in_merges_nested_objects() {
        let mut target = object(json!({ "id": 1, "profile": { "name": "John", "age": 30 }, "tags": [1] }));
        let source = object(json!({ "profile": { "age": 31 }, "tags": [2, 3], "email": "j@x.io" }));

        deep_mix_in(&mut target, &source);

        assert_eq!(
            Value::Object(target),
            json!({ "id": 1, "profile": { "name": "John", "age": 31 }, "tags": [2, 3], "email": "j@x.io" })
        );
    }

    #[test]
    fn into_records_rejects_batch_missing_ids() {
        let response = json!([{ "id": 1 }, { "author": "Sally" }]);
        let err = into_records(response, "id").unwrap_err();

        assert!(matches!(err, DataStoreError::IllegalArgument(_)));
    }

    #[test]
    fn into_records_accepts_single_object() {
        let records = into_records(json!({ "_key": "a", "v": 1 }), "_key").unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, RecordId::from("a"));
    }

    #[test]
    fn model_round_trips_through_record() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Post {
            id: i64,
            author: String,
        }

        impl Model for Post {
            fn resource_name() -> &'static str {
                "post"
            }
        }

        let post = Post::from_record(object(json!({ "id": 5, "author": "John" }))).unwrap();
        assert_eq!(post, Post { id: 5, author: "John".into() });
        assert_eq!(post.to_json().unwrap(), json!({ "id": 5, "author": "John" }));
    }
}
