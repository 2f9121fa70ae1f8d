//! Object reference repository: reads and rewrites the URL columns of
//! `patients.avatar_url` and `patient_files.file_url`.

use async_trait::async_trait;
use medvault_core::{AppError, ObjectReference, ReferenceCollection};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Row type shared by both collections (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct ObjectReferenceRow {
    pub id: Uuid,
    pub url: String,
    pub file_type: Option<String>,
}

impl ObjectReferenceRow {
    pub fn into_reference(self, collection: ReferenceCollection) -> ObjectReference {
        ObjectReference {
            collection,
            record_id: self.id,
            url: self.url,
            recorded_file_type: self.file_type,
        }
    }
}

#[async_trait]
pub trait ObjectReferenceRepository: Send + Sync {
    /// Every non-empty reference of a collection, ordered by row id.
    /// `limit` of `None` means all rows.
    async fn list_references(
        &self,
        collection: ReferenceCollection,
        limit: Option<i64>,
    ) -> Result<Vec<ObjectReference>, AppError>;

    /// Compare-and-set: write `replacement` only if the column still holds
    /// `expected`. Returns whether a row was updated.
    async fn replace_reference(
        &self,
        collection: ReferenceCollection,
        record_id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, AppError>;
}

fn select_sql(collection: ReferenceCollection) -> &'static str {
    match collection {
        ReferenceCollection::PatientAvatar => {
            r#"
            SELECT id, avatar_url AS url, NULL::text AS file_type
            FROM patients
            WHERE avatar_url IS NOT NULL AND avatar_url <> ''
            ORDER BY id
            LIMIT $1
            "#
        }
        ReferenceCollection::FileAttachment => {
            r#"
            SELECT id, file_url AS url, file_type
            FROM patient_files
            WHERE file_url IS NOT NULL AND file_url <> ''
            ORDER BY id
            LIMIT $1
            "#
        }
    }
}

fn update_sql(collection: ReferenceCollection) -> &'static str {
    match collection {
        ReferenceCollection::PatientAvatar => {
            "UPDATE patients SET avatar_url = $1 WHERE id = $2 AND avatar_url = $3"
        }
        ReferenceCollection::FileAttachment => {
            "UPDATE patient_files SET file_url = $1 WHERE id = $2 AND file_url = $3"
        }
    }
}

#[derive(Clone)]
pub struct PgObjectReferenceRepository {
    pool: PgPool,
}

impl PgObjectReferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObjectReferenceRepository for PgObjectReferenceRepository {
    #[tracing::instrument(skip(self), fields(db.collection = %collection))]
    async fn list_references(
        &self,
        collection: ReferenceCollection,
        limit: Option<i64>,
    ) -> Result<Vec<ObjectReference>, AppError> {
        // LIMIT NULL returns every row.
        let rows = sqlx::query_as::<Postgres, ObjectReferenceRow>(select_sql(collection))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_reference(collection))
            .collect())
    }

    #[tracing::instrument(skip(self, expected, replacement), fields(db.collection = %collection))]
    async fn replace_reference(
        &self,
        collection: ReferenceCollection,
        record_id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(update_sql(collection))
            .bind(replacement)
            .bind(record_id)
            .bind(expected)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_are_single_row_compare_and_set() {
        for collection in ReferenceCollection::ALL {
            let sql = update_sql(collection);
            assert!(sql.contains("WHERE id = $2"));
            assert!(sql.contains("= $3"));
        }
    }

    #[test]
    fn selects_skip_empty_references() {
        assert!(select_sql(ReferenceCollection::PatientAvatar).contains("avatar_url <> ''"));
        assert!(select_sql(ReferenceCollection::FileAttachment).contains("file_url <> ''"));
    }

    #[test]
    fn row_keeps_recorded_file_type() {
        let row = ObjectReferenceRow {
            id: Uuid::nil(),
            url: "uploads/a".to_string(),
            file_type: Some("image/png".to_string()),
        };
        let reference = row.into_reference(ReferenceCollection::FileAttachment);
        assert_eq!(reference.recorded_file_type.as_deref(), Some("image/png"));
        assert_eq!(reference.collection, ReferenceCollection::FileAttachment);
    }
}
