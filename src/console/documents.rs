//! Document listing and mutation.
//!
//! Listing translates a [`QuerySpec`] into one filtered, ordered, limited read plus an
//! independent count of everything the filter matches. The free-text search runs after
//! the read, over the fetched page only: it narrows a page, it does not search the
//! collection, and `total` ignores it.

use super::connection::ConnectionManager;
use super::error::ConsoleError;
use crate::firestore::models::{Direction, FieldOperator};
use serde::{Deserialize, Serialize};
use serde_json::map::Map;
use serde_json::{Number, Value as SerdeValue};
use tracing::{info, warn};

/// Page size used when a caller does not pick one.
pub const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilterSpec {
    pub field: String,
    pub operator: FieldOperator,
    /// For list operators a string is split on commas; an array is used as-is.
    pub value: SerdeValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub field: String,
    pub direction: Direction,
}

/// Inputs of one document listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub database_id: Option<String>,
    pub collection_id: String,
    pub filter: Option<FieldFilterSpec>,
    pub order_by: Option<OrderSpec>,
    pub limit: u32,
    /// Id of the document to start after.
    pub cursor: Option<String>,
    pub search: Option<String>,
}

impl QuerySpec {
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            database_id: None,
            collection_id: collection_id.into(),
            filter: None,
            order_by: None,
            limit: DEFAULT_LIMIT,
            cursor: None,
            search: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub data: Map<String, SerdeValue>,
}

/// One page of a document listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub documents: Vec<DocumentRecord>,
    /// Documents matching the filter across the whole collection, search not applied.
    pub total: u64,
    pub has_more: bool,
    /// Id of the last fetched document, before the search pass.
    pub next_cursor: Option<String>,
    pub database: String,
    pub fell_back_to_default: bool,
    /// `false` when a cursor was given but its document no longer exists, in which case
    /// the page starts from the beginning.
    pub cursor_applied: bool,
}

/// Result of a write or delete.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWrite {
    pub id: String,
    pub database: String,
    pub fell_back_to_default: bool,
}

/// Lists one page of documents.
pub async fn list(manager: &ConnectionManager, spec: &QuerySpec) -> Result<Page, ConsoleError> {
    let collection_id = require_collection(&spec.collection_id)?;
    if spec.limit == 0 {
        return Err(ConsoleError::query("limit must be greater than zero"));
    }
    let limit = i32::try_from(spec.limit)
        .map_err(|_| ConsoleError::query(format!("limit {} is too large", spec.limit)))?;

    let resolution = manager.handle(spec.database_id.as_deref()).await?;
    let collection = resolution.handle.collection(collection_id);

    let mut query = collection.query();
    if let Some(filter) = &spec.filter {
        if filter.field.trim().is_empty() {
            return Err(ConsoleError::query("filter field must not be empty"));
        }
        query = query.where_filter(&filter.field, filter.operator, filter_operand(filter))?;
    }
    if let Some(order) = &spec.order_by {
        query = query.order_by(&order.field, order.direction);
    }
    query = query.limit(limit);

    let mut cursor_applied = false;
    if let Some(cursor_id) = spec.cursor.as_deref().filter(|c| !c.is_empty()) {
        reject_dot_segment(cursor_id)?;
        let cursor = collection.doc(cursor_id).get().await?;
        if cursor.exists() {
            query = query.start_after(&cursor)?;
            cursor_applied = true;
        } else {
            warn!(collection = %collection_id, cursor = %cursor_id, "cursor document not found, listing from the start");
        }
    }

    let (total, snapshot) = futures::try_join!(query.count(), query.get())?;

    let fetched: Vec<DocumentRecord> = snapshot
        .into_iter()
        .map(|doc| DocumentRecord {
            id: doc.id().to_string(),
            data: doc.data().unwrap_or_default(),
        })
        .collect();

    let fetched_len = fetched.len();
    let next_cursor = fetched.last().map(|doc| doc.id.clone());
    let has_more = fetched_len == spec.limit as usize && (fetched_len as u64) < total;

    let documents = match spec.search.as_deref().filter(|s| !s.is_empty()) {
        Some(term) => apply_search(fetched, term),
        None => fetched,
    };

    info!(
        collection = %collection_id,
        database = %resolution.database_id(),
        fetched = fetched_len,
        returned = documents.len(),
        total,
        "listed documents"
    );

    Ok(Page {
        documents,
        total,
        has_more,
        next_cursor,
        database: resolution.database_id().to_string(),
        fell_back_to_default: resolution.fell_back_to_default,
        cursor_applied,
    })
}

/// Keeps the records whose id or any top-level string, number or boolean field contains
/// `term`, ignoring case.
pub fn apply_search(records: Vec<DocumentRecord>, term: &str) -> Vec<DocumentRecord> {
    let needle = term.to_lowercase();
    records
        .into_iter()
        .filter(|record| matches_search(record, &needle))
        .collect()
}

fn matches_search(record: &DocumentRecord, needle: &str) -> bool {
    if record.id.to_lowercase().contains(needle) {
        return true;
    }
    record.data.values().any(|value| match value {
        SerdeValue::String(s) => s.to_lowercase().contains(needle),
        SerdeValue::Number(n) => number_text(n).contains(needle),
        SerdeValue::Bool(b) => b.to_string().contains(needle),
        _ => false,
    })
}

/// Renders a number the way the console displays it: whole doubles without a trailing
/// `.0`, so `1.0` reads as `1`.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 1e21 => {
            if f == 0.0 {
                "0".to_string()
            } else {
                format!("{:.0}", f)
            }
        }
        _ => n.to_string(),
    }
}

fn filter_operand(filter: &FieldFilterSpec) -> SerdeValue {
    if !filter.operator.takes_list() {
        return filter.value.clone();
    }
    match &filter.value {
        SerdeValue::String(s) => SerdeValue::Array(
            s.split(',')
                .map(|part| SerdeValue::String(part.to_string()))
                .collect(),
        ),
        SerdeValue::Array(_) => filter.value.clone(),
        other => SerdeValue::Array(vec![other.clone()]),
    }
}

fn require_collection(collection_id: &str) -> Result<&str, ConsoleError> {
    let trimmed = collection_id.trim();
    if trimmed.is_empty() {
        return Err(ConsoleError::query("Collection ID is required"));
    }
    reject_dot_segment(trimmed)?;
    Ok(trimmed)
}

// Firestore never issues `.` or `..` as ids, and in a URL path they would address a
// parent resource instead of the document.
fn reject_dot_segment(id: &str) -> Result<(), ConsoleError> {
    if id == "." || id == ".." {
        return Err(ConsoleError::query(format!("invalid document path segment '{}'", id)));
    }
    Ok(())
}

/// Fetches a single document, `None` if it does not exist.
pub async fn get(
    manager: &ConnectionManager,
    database_id: Option<&str>,
    collection_id: &str,
    id: &str,
) -> Result<Option<DocumentRecord>, ConsoleError> {
    let collection_id = require_collection(collection_id)?;
    reject_dot_segment(id)?;
    let resolution = manager.handle(database_id).await?;
    let snapshot = resolution.handle.collection(collection_id).doc(id).get().await?;

    Ok(snapshot.data().map(|data| DocumentRecord {
        id: snapshot.id().to_string(),
        data,
    }))
}

/// Writes `data` into the collection.
///
/// With a non-blank `id` the write merges into that document: fields in `data` are added
/// or replaced, every other stored field is kept. Without one the store assigns an id to
/// a new document.
pub async fn upsert(
    manager: &ConnectionManager,
    database_id: Option<&str>,
    collection_id: &str,
    id: Option<&str>,
    data: &SerdeValue,
) -> Result<DocumentWrite, ConsoleError> {
    let collection_id = require_collection(collection_id)?;
    if !data.is_object() {
        return Err(ConsoleError::query("document data must be a JSON object"));
    }

    let resolution = manager.handle(database_id).await?;
    let collection = resolution.handle.collection(collection_id);

    let id = match id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            reject_dot_segment(id)?;
            collection.doc(id).set_merge(data).await?;
            id.to_string()
        }
        None => collection.add(data).await?.id().to_string(),
    };

    info!(collection = %collection_id, database = %resolution.database_id(), id = %id, "wrote document");
    Ok(DocumentWrite {
        id,
        database: resolution.database_id().to_string(),
        fell_back_to_default: resolution.fell_back_to_default,
    })
}

/// Deletes a document. Deleting an id that does not exist succeeds.
pub async fn delete(
    manager: &ConnectionManager,
    database_id: Option<&str>,
    collection_id: &str,
    id: &str,
) -> Result<DocumentWrite, ConsoleError> {
    let collection_id = require_collection(collection_id)?;
    reject_dot_segment(id)?;
    let resolution = manager.handle(database_id).await?;
    resolution.handle.collection(collection_id).doc(id).delete().await?;

    info!(collection = %collection_id, database = %resolution.database_id(), id = %id, "deleted document");
    Ok(DocumentWrite {
        id: id.to_string(),
        database: resolution.database_id().to_string(),
        fell_back_to_default: resolution.fell_back_to_default,
    })
}

/// Collection ids of one database.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionListing {
    pub collections: Vec<String>,
    pub database: String,
    pub fell_back_to_default: bool,
}

pub async fn list_collections(
    manager: &ConnectionManager,
    database_id: Option<&str>,
) -> Result<CollectionListing, ConsoleError> {
    let resolution = manager.handle(database_id).await?;
    let collections = resolution.handle.list_collection_ids().await?;

    Ok(CollectionListing {
        collections,
        database: resolution.database_id().to_string(),
        fell_back_to_default: resolution.fell_back_to_default,
    })
}
