//! Content references, materialized records, and index batches.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one content item at its current version.
///
/// Produced by the content store reader and consumed once per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentRef {
    /// The content object's identifier.
    pub id: i64,
    /// The version that is currently published for this object.
    pub version: i64,
}

impl ContentRef {
    pub fn new(id: i64, version: i64) -> Self {
        Self { id, version }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "content #{} v{}", self.id, self.version)
    }
}

/// A single translated field value of a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentField {
    /// Field definition identifier (e.g. `title`, `body`).
    pub identifier: String,
    /// Language the value is written in (e.g. `eng-GB`).
    pub language_code: String,
    /// Plain-text value used for indexing.
    pub value: String,
}

impl ContentField {
    pub fn new(
        identifier: impl Into<String>,
        language_code: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            language_code: language_code.into(),
            value: value.into(),
        }
    }
}

/// Fully materialized content item at a specific version.
///
/// Records are owned by the orchestrator for the duration of one pass and
/// dropped once their batch has been handed to the index writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Reference this record was resolved from.
    pub content_ref: ContentRef,
    /// The content type (class) of the item.
    pub content_type_id: i64,
    /// Globally unique remote identifier.
    pub remote_id: String,
    /// Display name of the item.
    pub name: String,
    /// Main language of the item.
    pub main_language_code: String,
    /// Section the item belongs to.
    pub section_id: i64,
    /// Owner user of the item.
    pub owner_id: i64,
    /// When the item was first published.
    pub published: DateTime<Utc>,
    /// When this version was last modified.
    pub modified: DateTime<Utc>,
    /// Field values of this version, one entry per field and language.
    pub fields: Vec<ContentField>,
}

impl ContentRecord {
    /// Create a record with no fields and epoch timestamps.
    pub fn new(content_ref: ContentRef, content_type_id: i64, name: impl Into<String>) -> Self {
        Self {
            content_ref,
            content_type_id,
            remote_id: String::new(),
            name: name.into(),
            main_language_code: String::new(),
            section_id: 0,
            owner_id: 0,
            published: DateTime::<Utc>::UNIX_EPOCH,
            modified: DateTime::<Utc>::UNIX_EPOCH,
            fields: Vec::new(),
        }
    }

    /// Identifier of the index entry for this record.
    ///
    /// The index holds one entry per content item, so the id alone is used;
    /// re-indexing a newer version replaces the older entry.
    pub fn document_id(&self) -> String {
        self.content_ref.id.to_string()
    }

    /// Add a field value.
    pub fn with_field(mut self, field: ContentField) -> Self {
        self.fields.push(field);
        self
    }
}

/// Ordered group of records submitted to the index writer in one call.
///
/// Order follows the listing order of the content store so batches are
/// reproducible; writers must not depend on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexBatch {
    records: Vec<ContentRecord>,
}

impl IndexBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: ContentRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ContentRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentRecord> {
        self.records.iter()
    }

    /// Take the records out, leaving an empty batch with the same capacity.
    pub fn take(&mut self) -> IndexBatch {
        let capacity = self.records.capacity();
        IndexBatch {
            records: std::mem::replace(&mut self.records, Vec::with_capacity(capacity)),
        }
    }
}

impl From<Vec<ContentRecord>> for IndexBatch {
    fn from(records: Vec<ContentRecord>) -> Self {
        Self { records }
    }
}

impl IntoIterator for IndexBatch {
    type Item = ContentRecord;
    type IntoIter = std::vec::IntoIter<ContentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a IndexBatch {
    type Item = &'a ContentRecord;
    type IntoIter = std::slice::Iter<'a, ContentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_ref_display() {
        assert_eq!(ContentRef::new(42, 3).to_string(), "content #42 v3");
    }

    #[test]
    fn test_document_id_ignores_version() {
        let v1 = ContentRecord::new(ContentRef::new(7, 1), 2, "Home");
        let v2 = ContentRecord::new(ContentRef::new(7, 2), 2, "Home");

        assert_eq!(v1.document_id(), "7");
        assert_eq!(v1.document_id(), v2.document_id());
    }

    #[test]
    fn test_batch_take_preserves_order() {
        let mut batch = IndexBatch::with_capacity(2);
        batch.push(ContentRecord::new(ContentRef::new(3, 1), 1, "c"));
        batch.push(ContentRecord::new(ContentRef::new(1, 1), 1, "a"));

        let taken = batch.take();

        assert!(batch.is_empty());
        let ids: Vec<i64> = taken.iter().map(|r| r.content_ref.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_record_serializes_fields() {
        let record = ContentRecord::new(ContentRef::new(1, 1), 16, "Folder")
            .with_field(ContentField::new("title", "eng-GB", "Folder"));

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["content_ref"]["id"], 1);
        assert_eq!(json["fields"][0]["language_code"], "eng-GB");
    }
}
