//! Read-only survey of where every referenced object lives.

use medvault_core::{ObjectReference, ReferenceCollection};
use medvault_db::ObjectReferenceRepository;
use medvault_storage::{normalize, ObjectStorage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::truncate_string;

pub const DEFAULT_MAX_CHECKS: usize = 500;

/// Result of asking one backend about one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum BackendProbe {
    Present,
    Absent,
    NotConfigured,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Both,
    S3Only,
    PlatformOnly,
    /// Absent from every backend that could be checked.
    Missing,
    /// A probe failed, or no backend is configured.
    Unverified,
}

impl Display for Presence {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Presence::Both => f.write_str("both"),
            Presence::S3Only => f.write_str("s3_only"),
            Presence::PlatformOnly => f.write_str("platform_only"),
            Presence::Missing => f.write_str("missing"),
            Presence::Unverified => f.write_str("unverified"),
        }
    }
}

pub fn classify(s3: &BackendProbe, platform: &BackendProbe) -> Presence {
    use BackendProbe::*;
    match (s3, platform) {
        (Present, Present) => Presence::Both,
        (Present, _) => Presence::S3Only,
        (_, Present) => Presence::PlatformOnly,
        (Failed(_), _) | (_, Failed(_)) | (NotConfigured, NotConfigured) => Presence::Unverified,
        _ => Presence::Missing,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Finding {
    Unrecognized,
    Checked {
        address: String,
        presence: Presence,
        s3: BackendProbe,
        platform: BackendProbe,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEntry {
    pub collection: ReferenceCollection,
    pub record_id: uuid::Uuid,
    pub url: String,
    pub finding: Finding,
}

#[derive(Debug, Default, Serialize)]
pub struct DiagnosticReport {
    pub entries: Vec<DiagnosticEntry>,
    pub unrecognized: usize,
    pub counts: BTreeMap<Presence, usize>,
    pub truncated: bool,
}

impl DiagnosticReport {
    pub fn count(&self, presence: Presence) -> usize {
        self.counts.get(&presence).copied().unwrap_or(0)
    }
}

pub struct Diagnoser<'a> {
    s3: Option<Arc<dyn ObjectStorage>>,
    platform: Option<Arc<dyn ObjectStorage>>,
    repo: &'a dyn ObjectReferenceRepository,
    max_checks: usize,
}

impl<'a> Diagnoser<'a> {
    /// `None` for a backend means it is not configured; it is skipped, not an error.
    pub fn new(
        s3: Option<Arc<dyn ObjectStorage>>,
        platform: Option<Arc<dyn ObjectStorage>>,
        repo: &'a dyn ObjectReferenceRepository,
        max_checks: usize,
    ) -> Self {
        Self {
            s3,
            platform,
            repo,
            max_checks,
        }
    }

    pub async fn run(&self) -> DiagnosticReport {
        let mut report = DiagnosticReport::default();
        for presence in [
            Presence::Both,
            Presence::S3Only,
            Presence::PlatformOnly,
            Presence::Missing,
            Presence::Unverified,
        ] {
            report.counts.insert(presence, 0);
        }

        for collection in ReferenceCollection::ALL {
            let remaining = self.max_checks.saturating_sub(report.entries.len());
            if remaining == 0 {
                report.truncated = true;
                break;
            }

            // One extra row tells whether the limit cut the scan short.
            // A budget beyond i64 lists without a limit.
            let limit = i64::try_from(remaining)
                .ok()
                .and_then(|n| n.checked_add(1));
            let references = match self.repo.list_references(collection, limit).await
            {
                Ok(references) => references,
                Err(e) => {
                    println!("Failed to list {}: {}", collection, e);
                    continue;
                }
            };
            if references.len() > remaining {
                report.truncated = true;
            }

            for reference in references.into_iter().take(remaining) {
                let entry = self.check(reference).await;
                match &entry.finding {
                    Finding::Unrecognized => report.unrecognized += 1,
                    Finding::Checked { presence, .. } => {
                        *report.counts.entry(*presence).or_insert(0) += 1
                    }
                }
                report.entries.push(entry);
            }
        }

        report
    }

    async fn check(&self, reference: ObjectReference) -> DiagnosticEntry {
        let finding = match normalize(&reference.url) {
            Err(_) => Finding::Unrecognized,
            Ok(address) => {
                let s3 = probe(self.s3.as_deref(), address.key()).await;
                let platform = probe(self.platform.as_deref(), address.key()).await;
                Finding::Checked {
                    address: address.into_string(),
                    presence: classify(&s3, &platform),
                    s3,
                    platform,
                }
            }
        };
        DiagnosticEntry {
            collection: reference.collection,
            record_id: reference.record_id,
            url: reference.url,
            finding,
        }
    }
}

async fn probe(storage: Option<&dyn ObjectStorage>, key: &str) -> BackendProbe {
    let Some(storage) = storage else {
        return BackendProbe::NotConfigured;
    };
    match storage.exists(key).await {
        Ok(true) => BackendProbe::Present,
        Ok(false) => BackendProbe::Absent,
        Err(e) => {
            tracing::warn!(error = %e, backend = %storage.backend_type(), key = %key, "Existence probe failed");
            BackendProbe::Failed(e.to_string())
        }
    }
}

fn describe_probe(probe: &BackendProbe) -> String {
    match probe {
        BackendProbe::Present => "found".to_string(),
        BackendProbe::Absent => "absent".to_string(),
        BackendProbe::NotConfigured => "not configured".to_string(),
        BackendProbe::Failed(e) => format!("check failed ({})", e),
    }
}

pub fn print_table(report: &DiagnosticReport) {
    for entry in &report.entries {
        let url = truncate_string(&entry.url, 70);
        match &entry.finding {
            Finding::Unrecognized => {
                println!("[{}] {} unrecognized format: {}", entry.collection, entry.record_id, url)
            }
            Finding::Checked {
                presence,
                s3,
                platform,
                ..
            } => {
                let label = match (presence, s3, platform) {
                    (Presence::Missing, BackendProbe::Absent, BackendProbe::Absent) => {
                        "missing in both".to_string()
                    }
                    _ => presence.to_string(),
                };
                println!(
                    "[{}] {} {}: {} (s3: {}, platform: {})",
                    entry.collection,
                    entry.record_id,
                    label,
                    url,
                    describe_probe(s3),
                    describe_probe(platform)
                );
            }
        }
    }

    println!();
    println!("Diagnostic summary ({} references checked):", report.entries.len());
    for (presence, count) in &report.counts {
        println!("  {:<14} {:>5}", presence.to_string(), count);
    }
    println!("  {:<14} {:>5}", "unrecognized", report.unrecognized);
    if report.truncated {
        println!("  (stopped at the max-checks limit; raise --max-checks to see more)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::InMemoryReferenceRepository;
    use medvault_storage::{InMemoryStorage, StorageBackend};

    #[test]
    fn classification_table() {
        use BackendProbe::*;
        assert_eq!(classify(&Present, &Present), Presence::Both);
        assert_eq!(classify(&Present, &Absent), Presence::S3Only);
        assert_eq!(classify(&NotConfigured, &Present), Presence::PlatformOnly);
        assert_eq!(classify(&Absent, &Absent), Presence::Missing);
        assert_eq!(classify(&Absent, &NotConfigured), Presence::Missing);
        assert_eq!(classify(&NotConfigured, &NotConfigured), Presence::Unverified);
        assert_eq!(classify(&Failed("timeout".into()), &Absent), Presence::Unverified);
    }

    #[tokio::test]
    async fn reports_objects_missing_everywhere() {
        let s3 = Arc::new(InMemoryStorage::new(StorageBackend::S3, "patient-files"));
        let platform = Arc::new(InMemoryStorage::new(StorageBackend::Platform, "patient-files"));
        s3.insert("uploads/both", &b"x"[..], None);
        platform.insert("uploads/both", &b"x"[..], None);
        platform.insert("uploads/old", &b"x"[..], None);

        let repo = InMemoryReferenceRepository::new();
        repo.add(ReferenceCollection::PatientAvatar, "/api/objects/uploads/both", None);
        repo.add(ReferenceCollection::PatientAvatar, "uploads/old", None);
        repo.add(ReferenceCollection::FileAttachment, "/api/objects/uploads/lost", None);
        repo.add(ReferenceCollection::FileAttachment, "ftp://legacy/file", None);

        let report = Diagnoser::new(Some(s3), Some(platform), &repo, DEFAULT_MAX_CHECKS)
            .run()
            .await;

        assert_eq!(report.entries.len(), 4);
        assert_eq!(report.count(Presence::Both), 1);
        assert_eq!(report.count(Presence::PlatformOnly), 1);
        assert_eq!(report.count(Presence::Missing), 1);
        assert_eq!(report.unrecognized, 1);
        assert!(!report.truncated);
    }

    #[tokio::test]
    async fn huge_check_budget_still_checks_every_reference() {
        let s3 = Arc::new(InMemoryStorage::new(StorageBackend::S3, "patient-files"));
        s3.insert("uploads/kept", &b"x"[..], None);

        let repo = InMemoryReferenceRepository::new();
        repo.add(ReferenceCollection::PatientAvatar, "uploads/kept", None);

        for max_checks in [usize::MAX, i64::MAX as usize] {
            let report = Diagnoser::new(Some(s3.clone() as Arc<dyn ObjectStorage>), None, &repo, max_checks)
                .run()
                .await;
            assert_eq!(report.entries.len(), 1);
            assert_eq!(report.count(Presence::S3Only), 1);
            assert!(!report.truncated);
        }
    }

    #[tokio::test]
    async fn tolerates_unconfigured_and_failing_backends() {
        let s3 = Arc::new(InMemoryStorage::new(StorageBackend::S3, "patient-files"));
        s3.fail_probes(true);

        let repo = InMemoryReferenceRepository::new();
        repo.add(ReferenceCollection::PatientAvatar, "uploads/a", None);

        let report = Diagnoser::new(Some(s3), None, &repo, DEFAULT_MAX_CHECKS)
            .run()
            .await;

        assert_eq!(report.count(Presence::Unverified), 1);
        match &report.entries[0].finding {
            Finding::Checked { platform, .. } => assert_eq!(platform, &BackendProbe::NotConfigured),
            other => panic!("unexpected finding: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stops_at_max_checks() {
        let s3 = Arc::new(InMemoryStorage::new(StorageBackend::S3, "patient-files"));
        let repo = InMemoryReferenceRepository::new();
        for i in 0..3 {
            repo.add(ReferenceCollection::PatientAvatar, &format!("uploads/{}", i), None);
        }
        repo.add(ReferenceCollection::FileAttachment, "uploads/f", None);

        let report = Diagnoser::new(Some(s3), None, &repo, 2).run().await;

        assert_eq!(report.entries.len(), 2);
        assert!(report.truncated);
    }
}
