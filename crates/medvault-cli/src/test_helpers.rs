//! In-memory reference repository for unit tests.

use async_trait::async_trait;
use medvault_core::{AppError, ObjectReference, ReferenceCollection};
use medvault_db::ObjectReferenceRepository;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryReferenceRepository {
    rows: Mutex<Vec<ObjectReference>>,
    writes: AtomicUsize,
}

impl InMemoryReferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        collection: ReferenceCollection,
        url: &str,
        recorded_file_type: Option<&str>,
    ) -> Uuid {
        let record_id = Uuid::new_v4();
        self.rows.lock().unwrap().push(ObjectReference {
            collection,
            record_id,
            url: url.to_string(),
            recorded_file_type: recorded_file_type.map(str::to_string),
        });
        record_id
    }

    pub fn url_of(&self, record_id: Uuid) -> String {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.record_id == record_id)
            .map(|row| row.url.clone())
            .unwrap()
    }

    /// Simulates a collaborator editing the row behind the tool's back.
    pub fn overwrite(&self, record_id: Uuid, url: &str) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.record_id == record_id) {
            row.url = url.to_string();
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectReferenceRepository for InMemoryReferenceRepository {
    async fn list_references(
        &self,
        collection: ReferenceCollection,
        limit: Option<i64>,
    ) -> Result<Vec<ObjectReference>, AppError> {
        let rows = self.rows.lock().unwrap();
        let matching = rows
            .iter()
            .filter(|row| row.collection == collection && !row.url.is_empty())
            .cloned();
        Ok(match limit {
            Some(limit) => matching.take(limit.max(0) as usize).collect(),
            None => matching.collect(),
        })
    }

    async fn replace_reference(
        &self,
        collection: ReferenceCollection,
        record_id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.iter_mut().find(|row| {
            row.collection == collection && row.record_id == record_id && row.url == expected
        });
        match row {
            Some(row) => {
                row.url = replacement.to_string();
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
