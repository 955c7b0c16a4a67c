use super::models::{ArrayValue, Document, MapValue, Value, ValueType};
use super::query::ExecutableQuery;
use super::snapshot::DocumentSnapshot;
use super::FirestoreError;
use crate::core::{encode_path_segment, parse_error_response};
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::ser::Error as SerError;
use serde::Serialize;
use serde_json::map::Map;
use serde_json::Value as SerdeValue;
use std::collections::HashMap;
use tracing::instrument;
use url::form_urlencoded;

// Helper to convert Firestore's value map to a standard serde_json::Value
pub(crate) fn convert_fields_to_serde_map(fields: &HashMap<String, Value>) -> Map<String, SerdeValue> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), convert_value_to_serde_value(value)))
        .collect()
}

pub(crate) fn convert_value_to_serde_value(value: &Value) -> SerdeValue {
    use serde_json::json;
    match &value.value_type {
        ValueType::StringValue(s) => SerdeValue::String(s.clone()),
        // Integers outside i64 cannot come from Firestore; keep the raw text if one does.
        ValueType::IntegerValue(s) => s
            .parse::<i64>()
            .map(|i| SerdeValue::Number(i.into()))
            .unwrap_or_else(|_| SerdeValue::String(s.clone())),
        ValueType::DoubleValue(d) => serde_json::Number::from_f64(*d)
            .map(SerdeValue::Number)
            .unwrap_or_else(|| SerdeValue::String(d.to_string())),
        ValueType::BooleanValue(b) => SerdeValue::Bool(*b),
        ValueType::MapValue(map_value) => {
            SerdeValue::Object(convert_fields_to_serde_map(&map_value.fields))
        }
        ValueType::ArrayValue(array_value) => SerdeValue::Array(
            array_value
                .values
                .iter()
                .map(convert_value_to_serde_value)
                .collect(),
        ),
        ValueType::NullValue(_) => SerdeValue::Null,
        ValueType::TimestampValue(s) => SerdeValue::String(s.clone()),
        ValueType::GeoPointValue(gp) => {
            json!({ "latitude": gp.latitude, "longitude": gp.longitude })
        }
        ValueType::BytesValue(s) => SerdeValue::String(s.clone()),
        ValueType::ReferenceValue(s) => SerdeValue::String(s.clone()),
    }
}

// Helper to convert a serializable Rust value to Firestore's value map
pub(crate) fn convert_serializable_to_fields<T: Serialize>(
    value: &T,
) -> Result<HashMap<String, Value>, FirestoreError> {
    let serde_value = serde_json::to_value(value)?;
    if let SerdeValue::Object(map) = serde_value {
        let mut fields = HashMap::new();
        for (k, v) in map {
            fields.insert(k, convert_serde_value_to_firestore_value(v)?);
        }
        Ok(fields)
    } else {
        Err(FirestoreError::SerializationError(SerError::custom(
            "Can only set objects as documents",
        )))
    }
}

pub(crate) fn convert_serde_value_to_firestore_value(
    value: SerdeValue,
) -> Result<Value, FirestoreError> {
    let value_type = match value {
        SerdeValue::Null => ValueType::NullValue(()),
        SerdeValue::Bool(b) => ValueType::BooleanValue(b),
        SerdeValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                ValueType::IntegerValue(i.to_string())
            } else if let Some(f) = n.as_f64() {
                ValueType::DoubleValue(f)
            } else {
                return Err(FirestoreError::SerializationError(SerError::custom(format!(
                    "Unsupported number type: {}",
                    n
                ))));
            }
        }
        SerdeValue::String(s) => ValueType::StringValue(s),
        SerdeValue::Array(a) => {
            let values = a
                .into_iter()
                .map(convert_serde_value_to_firestore_value)
                .collect::<Result<Vec<_>, _>>()?;
            ValueType::ArrayValue(ArrayValue { values })
        }
        SerdeValue::Object(o) => {
            let mut fields = HashMap::new();
            for (k, v) in o {
                fields.insert(k, convert_serde_value_to_firestore_value(v)?);
            }
            ValueType::MapValue(MapValue { fields })
        }
    };
    Ok(Value { value_type })
}

/// Quotes a single field name for use in a field path when it is not a plain identifier.
pub(crate) fn quote_field_name(name: &str) -> String {
    let mut chars = name.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Field paths touched by a merge write: every leaf of `fields`, descending into
/// non-empty maps so sibling keys of nested objects survive the write.
pub(crate) fn merge_field_paths(fields: &HashMap<String, Value>) -> Vec<String> {
    let mut paths = Vec::new();
    collect_field_paths(fields, None, &mut paths);
    paths.sort();
    paths
}

fn collect_field_paths(fields: &HashMap<String, Value>, prefix: Option<&str>, out: &mut Vec<String>) {
    for (key, value) in fields {
        let path = match prefix {
            Some(p) => format!("{}.{}", p, quote_field_name(key)),
            None => quote_field_name(key),
        };
        match &value.value_type {
            ValueType::MapValue(map) if !map.fields.is_empty() => {
                collect_field_paths(&map.fields, Some(&path), out)
            }
            _ => out.push(path),
        }
    }
}

#[derive(Clone)]
pub struct DocumentReference<'a> {
    pub(crate) client: &'a ClientWithMiddleware,
    pub(crate) path: String,
    pub(crate) id: String,
}

impl<'a> DocumentReference<'a> {
    /// The document's id within its collection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Reads the document. A missing document yields a snapshot whose `exists()` is `false`.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn get(&self) -> Result<DocumentSnapshot, FirestoreError> {
        let response = self.client.get(&self.path).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(DocumentSnapshot::missing(self.id.clone()));
        }

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Get document failed").await,
            ));
        }

        let doc: Document = response.json().await?;
        Ok(DocumentSnapshot::from_document(doc))
    }

    /// Writes `value` into the document, keeping any existing field that `value` does not name.
    #[instrument(skip(self, value), fields(id = %self.id))]
    pub async fn set_merge<T: Serialize>(&self, value: &T) -> Result<(), FirestoreError> {
        let fields = convert_serializable_to_fields(value)?;
        let paths = merge_field_paths(&fields);

        // A patch without a mask replaces the whole document, so an empty merge only
        // has to make sure the document exists.
        if paths.is_empty() {
            if self.get().await?.exists() {
                return Ok(());
            }
            return self.patch(&self.path, fields, "Merge document failed").await;
        }

        let mut url = self.path.clone();
        for (i, field) in paths.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str("updateMask.fieldPaths=");
            url.extend(form_urlencoded::byte_serialize(field.as_bytes()));
        }

        self.patch(&url, fields, "Merge document failed").await
    }

    async fn patch(
        &self,
        url: &str,
        fields: HashMap<String, Value>,
        failure: &str,
    ) -> Result<(), FirestoreError> {
        let body = serde_json::to_vec(&serde_json::json!({ "fields": fields }))?;

        let response = self
            .client
            .patch(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, failure).await,
            ));
        }

        Ok(())
    }

    /// Deletes the document. Deleting a document that does not exist succeeds.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn delete(&self) -> Result<(), FirestoreError> {
        let response = self.client.delete(&self.path).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Delete document failed").await,
            ));
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct CollectionReference<'a> {
    pub(crate) client: &'a ClientWithMiddleware,
    /// URL of the `documents` root the collection lives under.
    pub(crate) parent: String,
    pub(crate) id: String,
}

impl<'a> CollectionReference<'a> {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn path(&self) -> String {
        format!("{}/{}", self.parent, encode_path_segment(&self.id))
    }

    pub fn doc(&self, document_id: &str) -> DocumentReference<'a> {
        DocumentReference {
            client: self.client,
            path: format!("{}/{}", self.path(), encode_path_segment(document_id)),
            id: document_id.to_string(),
        }
    }

    /// Adds a new document with a server-generated id.
    #[instrument(skip(self, value), fields(collection = %self.id))]
    pub async fn add<T: Serialize>(&self, value: &T) -> Result<DocumentReference<'a>, FirestoreError> {
        let fields = convert_serializable_to_fields(value)?;
        let body = serde_json::to_vec(&serde_json::json!({ "fields": fields }))?;

        let response = self
            .client
            .post(self.path())
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FirestoreError::ApiError(
                parse_error_response(response, "Add document failed").await,
            ));
        }

        let doc: Document = response.json().await?;
        let id = doc.name.rsplit('/').next().unwrap_or_default();
        Ok(self.doc(id))
    }

    /// Starts a query over this collection.
    pub fn query(&self) -> ExecutableQuery<'a> {
        ExecutableQuery::new(self.client, self.parent.clone(), &self.id)
    }
}
