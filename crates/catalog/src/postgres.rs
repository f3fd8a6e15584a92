//! PostgreSQL catalog.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::{debug, info};

use crate::catalog::DatasetCatalog;
use crate::error::{CatalogError, CatalogResult};
use crate::records::{join_path, normalize_group_path, parse_shape, DatasetRecord, FileRecord};

/// Catalog backed by the `files` and `datasets` tables.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Create a new catalog connection from database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> CatalogResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| CatalogError::Database(format!("Connection failed: {}", e)))?;

        info!(max_connections, "Connected to catalog database");
        Ok(Self { pool })
    }

    /// Create the catalog schema if it does not exist yet.
    pub async fn migrate(&self) -> CatalogResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| CatalogError::Database(format!("Migration failed: {}", e)))?;
            }
        }

        info!("Catalog schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl DatasetCatalog for PgCatalog {
    async fn lookup_file(&self, file_name: &str) -> CatalogResult<FileRecord> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT file_id, file_name, storage_path FROM files \
             WHERE file_name = $1 ORDER BY file_id ASC LIMIT 1",
        )
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(format!("Query failed: {}", e)))?;

        row.map(FileRecord::from)
            .ok_or_else(|| CatalogError::FileNotFound(file_name.to_string()))
    }

    async fn list_datasets(&self, file_id: i64) -> CatalogResult<Vec<DatasetRecord>> {
        let rows = sqlx::query_as::<_, DatasetRow>(
            "SELECT file_id, name, parent_path, shape, dtype FROM datasets \
             WHERE file_id = $1",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Database(format!("Query failed: {}", e)))?;

        let records = into_sorted_records(file_id, rows)?;
        debug!(file_id, count = records.len(), "Listed datasets");
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[derive(FromRow)]
struct FileRow {
    file_id: i64,
    file_name: String,
    storage_path: String,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        FileRecord {
            file_id: row.file_id,
            file_name: row.file_name,
            storage_path: row.storage_path,
        }
    }
}

#[derive(FromRow)]
struct DatasetRow {
    file_id: i64,
    name: String,
    parent_path: Option<String>,
    shape: Option<String>,
    dtype: Option<String>,
}

impl DatasetRow {
    fn into_record(self) -> CatalogResult<DatasetRecord> {
        let parent_path = normalize_group_path(self.parent_path.as_deref().unwrap_or("/"));
        let shape = parse_shape(&join_path(&parent_path, &self.name), self.shape.as_deref())?;

        Ok(DatasetRecord {
            file_id: self.file_id,
            name: self.name,
            parent_path,
            shape,
            dtype: self.dtype.unwrap_or_default(),
        })
    }
}

/// Normalize rows and sort them by `(parent_path, name)`.
///
/// Rows whose group paths differ only in spelling ("FS" and "/FS/") name the
/// same dataset once normalized and are rejected.
fn into_sorted_records(file_id: i64, rows: Vec<DatasetRow>) -> CatalogResult<Vec<DatasetRecord>> {
    let mut records = rows
        .into_iter()
        .map(DatasetRow::into_record)
        .collect::<CatalogResult<Vec<_>>>()?;

    records.sort_by(|a, b| {
        (a.parent_path.as_str(), a.name.as_str()).cmp(&(b.parent_path.as_str(), b.name.as_str()))
    });

    if let Some(pair) = records
        .windows(2)
        .find(|pair| pair[0].parent_path == pair[1].parent_path && pair[0].name == pair[1].name)
    {
        return Err(CatalogError::DuplicateDataset {
            file_id,
            path: pair[0].full_path(),
        });
    }

    Ok(records)
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    file_id BIGSERIAL PRIMARY KEY,
    file_name TEXT NOT NULL,
    storage_path TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_file_name ON files(file_name);

CREATE TABLE IF NOT EXISTS datasets (
    file_id BIGINT NOT NULL REFERENCES files(file_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    parent_path TEXT NOT NULL DEFAULT '/',
    shape TEXT,
    dtype TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_datasets_unique_path
    ON datasets(file_id, parent_path, name);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_row_normalizes_and_parses() {
        let row = DatasetRow {
            file_id: 3,
            name: "precipRate".to_string(),
            parent_path: Some("FS/SLV/".to_string()),
            shape: Some("(100, 50, 5)".to_string()),
            dtype: Some("float32".to_string()),
        };

        let record = row.into_record().unwrap();
        assert_eq!(record.parent_path, "/FS/SLV");
        assert_eq!(record.shape, vec![100, 50, 5]);
        assert_eq!(record.full_path(), "/FS/SLV/precipRate");
    }

    #[test]
    fn test_dataset_row_invalid_shape_fails() {
        let row = DatasetRow {
            file_id: 3,
            name: "bad".to_string(),
            parent_path: None,
            shape: Some("(100, ?)".to_string()),
            dtype: None,
        };

        match row.into_record() {
            Err(CatalogError::InvalidShape { dataset, shape }) => {
                assert_eq!(dataset, "/bad");
                assert_eq!(shape, "(100, ?)");
            }
            other => panic!("expected InvalidShape, got {:?}", other),
        }
    }

    fn row(parent_path: &str, name: &str) -> DatasetRow {
        DatasetRow {
            file_id: 7,
            name: name.to_string(),
            parent_path: Some(parent_path.to_string()),
            shape: Some("(100, 50)".to_string()),
            dtype: Some("float32".to_string()),
        }
    }

    #[test]
    fn test_rows_sorted_after_normalization() {
        let rows = vec![
            row("/FS/SLV", "precipRate"),
            row("FS/", "Longitude"),
            row("/FS", "Latitude"),
        ];
        let records = into_sorted_records(7, rows).unwrap();

        let paths: Vec<String> = records.iter().map(DatasetRecord::full_path).collect();
        assert_eq!(paths, vec!["/FS/Latitude", "/FS/Longitude", "/FS/SLV/precipRate"]);
    }

    #[test]
    fn test_rows_colliding_after_normalization_are_rejected() {
        let rows = vec![
            row("FS", "Latitude"),
            row("/FS/SLV", "precipRate"),
            row("/FS", "Latitude"),
        ];

        match into_sorted_records(7, rows) {
            Err(CatalogError::DuplicateDataset { file_id, path }) => {
                assert_eq!(file_id, 7);
                assert_eq!(path, "/FS/Latitude");
            }
            other => panic!("expected DuplicateDataset, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_statements_are_idempotent() {
        for statement in SCHEMA_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            assert!(statement.contains("IF NOT EXISTS"), "{statement}");
        }
    }
}
