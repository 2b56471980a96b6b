//! Content store backed by the relational system of record.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, instrument};

use crate::errors::ContentStoreError;
use crate::interfaces::{ContentLoader, ContentRefStream, ContentStoreReader};
use reindexer_shared::{ContentField, ContentRecord, ContentRef};

/// Listing and loading run concurrently during a pass; keep a few
/// connections around for the loader.
const MAX_CONNECTIONS: u32 = 8;

/// `ezcontentobject.status` of published objects.
const STATUS_PUBLISHED: i64 = 1;

const LIST_REFS_SQL: &str = r#"
    SELECT id, current_version
    FROM ezcontentobject
    WHERE status = ?
    ORDER BY id
"#;

const LOAD_CONTENT_SQL: &str = r#"
    SELECT
        o.id,
        v.version,
        o.contentclass_id,
        o.remote_id,
        o.name,
        o.initial_language_code,
        o.section_id,
        o.owner_id,
        o.published,
        v.modified
    FROM ezcontentobject o
    INNER JOIN ezcontentobject_version v ON v.contentobject_id = o.id
    WHERE o.id = ? AND v.version = ?
"#;

const LOAD_FIELDS_SQL: &str = r#"
    SELECT field_identifier, language_code, data_text
    FROM ezcontentobject_attribute
    WHERE contentobject_id = ? AND version = ?
    ORDER BY field_identifier, language_code
"#;

#[derive(Debug, sqlx::FromRow)]
struct ContentRow {
    id: i64,
    version: i64,
    contentclass_id: i64,
    remote_id: String,
    name: String,
    initial_language_code: String,
    section_id: i64,
    owner_id: i64,
    published: i64,
    modified: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct FieldRow {
    field_identifier: String,
    language_code: String,
    data_text: String,
}

impl From<FieldRow> for ContentField {
    fn from(row: FieldRow) -> Self {
        ContentField::new(row.field_identifier, row.language_code, row.data_text)
    }
}

fn timestamp(
    content_ref: ContentRef,
    column: &str,
    secs: i64,
) -> Result<DateTime<Utc>, ContentStoreError> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
        ContentStoreError::load(content_ref, format!("{} timestamp out of range: {}", column, secs))
    })
}

impl ContentRow {
    fn into_record(self, fields: Vec<FieldRow>) -> Result<ContentRecord, ContentStoreError> {
        let content_ref = ContentRef::new(self.id, self.version);
        Ok(ContentRecord {
            content_ref,
            content_type_id: self.contentclass_id,
            remote_id: self.remote_id,
            name: self.name,
            main_language_code: self.initial_language_code,
            section_id: self.section_id,
            owner_id: self.owner_id,
            published: timestamp(content_ref, "published", self.published)?,
            modified: timestamp(content_ref, "modified", self.modified)?,
            fields: fields.into_iter().map(ContentField::from).collect(),
        })
    }
}

/// Reads content refs and records from the content tables.
///
/// The store only ever reads; connections opened through [`connect`] are
/// read-only.
///
/// [`connect`]: SqlContentStore::connect
#[derive(Debug, Clone)]
pub struct SqlContentStore {
    pool: SqlitePool,
}

impl SqlContentStore {
    /// Wrap an existing connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a read-only pool on the database at `url` (e.g. `sqlite://content.db`).
    ///
    /// # Returns
    ///
    /// * `Ok(SqlContentStore)` - A store with a verified connection
    /// * `Err(ContentStoreError::Unavailable)` - If the URL is invalid or the database cannot be opened
    pub async fn connect(url: &str) -> Result<Self, ContentStoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| ContentStoreError::unavailable(format!("Invalid database URL: {}", e)))?
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| ContentStoreError::unavailable(e.to_string()))?;

        info!(url = %url, "Connected to content store");
        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl ContentStoreReader for SqlContentStore {
    fn list_all_content_refs(&self) -> ContentRefStream<'_> {
        sqlx::query_as::<_, (i64, i64)>(LIST_REFS_SQL)
            .bind(STATUS_PUBLISHED)
            .fetch(&self.pool)
            .map(|row| {
                row.map(|(id, version)| ContentRef::new(id, version))
                    .map_err(|e| ContentStoreError::unavailable(e.to_string()))
            })
            .boxed()
    }
}

#[async_trait]
impl ContentLoader for SqlContentStore {
    #[instrument(skip(self), fields(content_id = content_ref.id, version = content_ref.version))]
    async fn load(&self, content_ref: ContentRef) -> Result<ContentRecord, ContentStoreError> {
        let load_err = |e: sqlx::Error| ContentStoreError::load(content_ref, e.to_string());

        // Both reads share one transaction so the fields match the version row.
        let mut tx = self.pool.begin().await.map_err(load_err)?;

        let row = sqlx::query_as::<_, ContentRow>(LOAD_CONTENT_SQL)
            .bind(content_ref.id)
            .bind(content_ref.version)
            .fetch_optional(&mut *tx)
            .await
            .map_err(load_err)?;

        let Some(row) = row else {
            debug!("Content vanished since listing");
            return Err(ContentStoreError::not_found(content_ref));
        };

        let fields = sqlx::query_as::<_, FieldRow>(LOAD_FIELDS_SQL)
            .bind(content_ref.id)
            .bind(content_ref.version)
            .fetch_all(&mut *tx)
            .await
            .map_err(load_err)?;

        tx.commit().await.map_err(load_err)?;

        row.into_record(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    const SCHEMA: &str = include_str!("schema.sql");

    async fn setup() -> SqlContentStore {
        // In-memory databases are per connection, so limit the pool to one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::raw_sql(SCHEMA).execute(&pool).await.unwrap();
        SqlContentStore::new(pool)
    }

    async fn insert_object(store: &SqlContentStore, id: i64, version: i64, status: i64) {
        sqlx::query(
            r#"
                INSERT INTO ezcontentobject
                    (id, contentclass_id, current_version, remote_id, name,
                     initial_language_code, section_id, owner_id, published, modified, status)
                VALUES (?, 1, ?, ?, ?, 'eng-GB', 1, 14, 1400000000, 1400000500, ?)
            "#,
        )
        .bind(id)
        .bind(version)
        .bind(format!("remote-{}", id))
        .bind(format!("Content {}", id))
        .bind(status)
        .execute(store.pool())
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO ezcontentobject_version (contentobject_id, version, status, modified) VALUES (?, ?, 1, 1400000500)",
        )
        .bind(id)
        .bind(version)
        .execute(store.pool())
        .await
        .unwrap();
    }

    async fn insert_field(store: &SqlContentStore, id: i64, version: i64, identifier: &str, language: &str, value: &str) {
        sqlx::query(
            "INSERT INTO ezcontentobject_attribute (contentobject_id, version, field_identifier, language_code, data_text) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(version)
        .bind(identifier)
        .bind(language)
        .bind(value)
        .execute(store.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_list_published_refs_in_id_order() {
        let store = setup().await;
        insert_object(&store, 3, 2, STATUS_PUBLISHED).await;
        insert_object(&store, 1, 1, STATUS_PUBLISHED).await;
        insert_object(&store, 2, 1, 0).await;

        let refs: Vec<ContentRef> = store.list_all_content_refs().try_collect().await.unwrap();

        assert_eq!(refs, vec![ContentRef::new(1, 1), ContentRef::new(3, 2)]);
    }

    #[tokio::test]
    async fn test_list_empty_store() {
        let store = setup().await;

        let refs: Vec<ContentRef> = store.list_all_content_refs().try_collect().await.unwrap();

        assert!(refs.is_empty());
    }

    #[tokio::test]
    async fn test_listing_is_restartable() {
        let store = setup().await;
        insert_object(&store, 1, 1, STATUS_PUBLISHED).await;

        let first: Vec<ContentRef> = store.list_all_content_refs().try_collect().await.unwrap();
        let second: Vec<ContentRef> = store.list_all_content_refs().try_collect().await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_list_on_closed_pool_is_unavailable() {
        let store = setup().await;
        store.close().await;

        let result: Result<Vec<ContentRef>, _> = store.list_all_content_refs().try_collect().await;

        assert!(matches!(result, Err(ContentStoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_connect_missing_database_is_unavailable() {
        let result = SqlContentStore::connect("sqlite:///nonexistent-dir/content.db").await;

        assert!(matches!(result, Err(ContentStoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_load_materializes_record() {
        let store = setup().await;
        insert_object(&store, 1, 2, STATUS_PUBLISHED).await;
        insert_field(&store, 1, 2, "title", "eng-GB", "Hello").await;
        insert_field(&store, 1, 2, "body", "ger-DE", "Hallo Welt").await;
        insert_field(&store, 1, 1, "title", "eng-GB", "Old title").await;

        let record = store.load(ContentRef::new(1, 2)).await.unwrap();

        assert_eq!(record.content_ref, ContentRef::new(1, 2));
        assert_eq!(record.name, "Content 1");
        assert_eq!(record.remote_id, "remote-1");
        assert_eq!(record.main_language_code, "eng-GB");
        assert_eq!(record.owner_id, 14);
        assert_eq!(record.published.timestamp(), 1400000000);
        assert_eq!(record.modified.timestamp(), 1400000500);
        assert_eq!(
            record.fields,
            vec![
                ContentField::new("body", "ger-DE", "Hallo Welt"),
                ContentField::new("title", "eng-GB", "Hello"),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let store = setup().await;
        insert_object(&store, 4, 1, STATUS_PUBLISHED).await;

        let first = store.load(ContentRef::new(4, 1)).await.unwrap();
        let second = store.load(ContentRef::new(4, 1)).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_load_missing_content_is_not_found() {
        let store = setup().await;
        insert_object(&store, 1, 1, STATUS_PUBLISHED).await;

        let missing_object = store.load(ContentRef::new(2, 1)).await;
        let missing_version = store.load(ContentRef::new(1, 5)).await;

        assert!(matches!(missing_object, Err(ContentStoreError::ContentNotFound(r)) if r == ContentRef::new(2, 1)));
        assert!(matches!(missing_version, Err(ContentStoreError::ContentNotFound(_))));
    }

    #[tokio::test]
    async fn test_load_failure_is_fatal_load_error() {
        let store = setup().await;
        insert_object(&store, 1, 1, STATUS_PUBLISHED).await;
        sqlx::query("DROP TABLE ezcontentobject_attribute")
            .execute(store.pool())
            .await
            .unwrap();

        let result = store.load(ContentRef::new(1, 1)).await;

        assert!(matches!(
            result,
            Err(ContentStoreError::Load { content_ref, .. }) if content_ref == ContentRef::new(1, 1)
        ));
    }
}
