use super::models::{Document, Value, ValueType};
use super::reference::convert_fields_to_serde_map;
use serde_json::map::Map;
use serde_json::Value as SerdeValue;

/// A snapshot of a document in Firestore.
///
/// It contains data read from a document in your Firestore database.
/// The data can be extracted with `.data()`.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub(crate) id: String,
    pub(crate) document: Option<Document>,
}

impl DocumentSnapshot {
    pub(crate) fn from_document(document: Document) -> Self {
        let id = document.name.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            id,
            document: Some(document),
        }
    }

    pub(crate) fn missing(id: String) -> Self {
        Self {
            id,
            document: None,
        }
    }

    /// The ID of the document.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The full resource name (`projects/.../documents/{collection}/{id}`).
    /// Returns `None` if the document does not exist.
    pub fn name(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.name.as_str())
    }

    /// Returns `true` if the document exists.
    pub fn exists(&self) -> bool {
        self.document.is_some()
    }

    /// All fields of the document as a JSON object. Returns `None` if the document does not exist.
    pub fn data(&self) -> Option<Map<String, SerdeValue>> {
        self.document
            .as_ref()
            .map(|doc| convert_fields_to_serde_map(&doc.fields))
    }

    /// Retrieves the raw Firestore value at a dotted field path (e.g. "address.city").
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        let doc = self.document.as_ref()?;
        let mut segments = path.split('.');
        let mut current = doc.fields.get(segments.next()?)?;
        for segment in segments {
            match &current.value_type {
                ValueType::MapValue(map) => current = map.fields.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

/// A `QuerySnapshot` contains zero or more `DocumentSnapshot` objects.
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshot {
    pub(crate) documents: Vec<DocumentSnapshot>,
    pub(crate) read_time: Option<String>,
}

impl QuerySnapshot {
    /// The documents in this snapshot.
    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    /// The number of documents in the snapshot.
    pub fn size(&self) -> usize {
        self.documents.len()
    }

    /// The time this snapshot was read.
    pub fn read_time(&self) -> Option<&str> {
        self.read_time.as_deref()
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}
