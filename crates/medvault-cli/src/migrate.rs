//! Migration pass: copy objects from a source backend to a target backend and
//! repoint each reference at the copy.
//!
//! A reference is only rewritten after its upload succeeded, and only if the
//! row still holds the value that was read. The source object is never touched.

use medvault_core::constants::DEFAULT_CONTENT_TYPE;
use medvault_core::{ObjectReference, ReferenceCollection, StorageBackend};
use medvault_db::ObjectReferenceRepository;
use medvault_storage::keys::allocate_upload_key;
use medvault_storage::{normalize, CanonicalAddress, ObjectStorage, StorageError};
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::truncate_string;

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationOptions {
    pub dry_run: bool,
    /// Maximum references per collection that need work. Rows skipped as
    /// already migrated, missing or unrecognized do not count, so re-running with
    /// the same limit moves on to the next batch.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unrecognized,
    AlreadyOnTarget,
    MissingOnSource,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SkipReason::Unrecognized => f.write_str("unrecognized format"),
            SkipReason::AlreadyOnTarget => f.write_str("already on target"),
            SkipReason::MissingOnSource => f.write_str("missing on source"),
        }
    }
}

/// Where the content type of a migrated object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTypeSource {
    Download,
    Listing,
    Recorded,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated {
        to: CanonicalAddress,
        content_type: String,
        content_type_source: ContentTypeSource,
    },
    WouldMigrate,
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    /// In dry-run mode: references that would be copied.
    pub migrated: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize)]
pub struct MigrationReport {
    pub from: StorageBackend,
    pub to: StorageBackend,
    pub dry_run: bool,
    pub summaries: Vec<(ReferenceCollection, CollectionSummary)>,
}

impl MigrationReport {
    pub fn summary(&self, collection: ReferenceCollection) -> Option<&CollectionSummary> {
        self.summaries
            .iter()
            .find(|(c, _)| *c == collection)
            .map(|(_, s)| s)
    }
}

/// Treat blank and generic binary types as "unknown".
fn meaningful(content_type: Option<&str>) -> Option<&str> {
    content_type
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && !ct.eq_ignore_ascii_case(DEFAULT_CONTENT_TYPE))
}

/// Content type recovery chain: download metadata, then backend listing
/// metadata, then the type recorded in the database, then the default.
pub fn choose_content_type(
    from_download: Option<&str>,
    from_listing: Option<&str>,
    recorded: Option<&str>,
) -> (String, ContentTypeSource) {
    if let Some(ct) = meaningful(from_download) {
        return (ct.to_string(), ContentTypeSource::Download);
    }
    if let Some(ct) = meaningful(from_listing) {
        return (ct.to_string(), ContentTypeSource::Listing);
    }
    // File attachments sometimes record a bare extension instead of a MIME type.
    if let Some(ct) = meaningful(recorded).filter(|ct| ct.contains('/')) {
        return (ct.to_string(), ContentTypeSource::Recorded);
    }
    (DEFAULT_CONTENT_TYPE.to_string(), ContentTypeSource::Default)
}

pub struct Migrator<'a> {
    source: Arc<dyn ObjectStorage>,
    target: Arc<dyn ObjectStorage>,
    repo: &'a dyn ObjectReferenceRepository,
    options: MigrationOptions,
}

impl<'a> Migrator<'a> {
    pub fn new(
        source: Arc<dyn ObjectStorage>,
        target: Arc<dyn ObjectStorage>,
        repo: &'a dyn ObjectReferenceRepository,
        options: MigrationOptions,
    ) -> Self {
        Self {
            source,
            target,
            repo,
            options,
        }
    }

    /// Migrate both collections, one reference at a time.
    pub async fn run(&self) -> MigrationReport {
        let mut report = MigrationReport {
            from: self.source.backend_type(),
            to: self.target.backend_type(),
            dry_run: self.options.dry_run,
            summaries: Vec::new(),
        };

        for collection in ReferenceCollection::ALL {
            println!("Migrating {}...", collection);
            let mut summary = CollectionSummary::default();

            let references = match self.repo.list_references(collection, None).await {
                Ok(references) => references,
                Err(e) => {
                    tracing::error!(error = %e, collection = %collection, "Failed to list references");
                    summary.errors += 1;
                    report.summaries.push((collection, summary));
                    continue;
                }
            };

            let mut budget = self.options.limit;
            for reference in &references {
                if budget == Some(0) {
                    println!("  limit reached, stopping {}", collection);
                    break;
                }
                let outcome = self.migrate_reference(reference).await;
                if !matches!(outcome, MigrationOutcome::Skipped(_)) {
                    budget = budget.map(|left| left - 1);
                }
                let label = truncate_string(&reference.url, 80);
                match &outcome {
                    MigrationOutcome::Migrated {
                        to,
                        content_type,
                        content_type_source,
                    } => {
                        println!(
                            "  migrated {}: {} -> {} ({}, from {:?})",
                            reference.record_id, label, to, content_type, content_type_source
                        );
                        summary.migrated += 1;
                    }
                    MigrationOutcome::WouldMigrate => {
                        println!("  would migrate {}: {}", reference.record_id, label);
                        summary.migrated += 1;
                    }
                    MigrationOutcome::Skipped(reason) => {
                        println!("  skipped {} ({}): {}", reference.record_id, reason, label);
                        summary.skipped += 1;
                    }
                    MigrationOutcome::Failed(message) => {
                        println!("  error {}: {}: {}", reference.record_id, label, message);
                        summary.errors += 1;
                    }
                }
            }

            report.summaries.push((collection, summary));
        }

        report
    }

    /// Copy one referenced object and repoint the reference.
    pub async fn migrate_reference(&self, reference: &ObjectReference) -> MigrationOutcome {
        let address = match normalize(&reference.url) {
            Ok(address) => address,
            Err(_) => return MigrationOutcome::Skipped(SkipReason::Unrecognized),
        };

        match self.target.exists(address.key()).await {
            Ok(true) => return MigrationOutcome::Skipped(SkipReason::AlreadyOnTarget),
            Ok(false) => {}
            Err(e) => return MigrationOutcome::Failed(format!("target check failed: {}", e)),
        }

        let handle = match self.source.resolve_address(address.as_str()).await {
            Ok(handle) => handle,
            Err(e) if e.is_not_found() => {
                return MigrationOutcome::Skipped(SkipReason::MissingOnSource)
            }
            Err(e) => return MigrationOutcome::Failed(format!("resolve failed: {}", e)),
        };

        if self.options.dry_run {
            return MigrationOutcome::WouldMigrate;
        }

        let (data, metadata) = match self.source.download(&handle).await {
            Ok(downloaded) => downloaded,
            Err(StorageError::NotFound(_)) => {
                return MigrationOutcome::Skipped(SkipReason::MissingOnSource)
            }
            Err(e) => return MigrationOutcome::Failed(format!("download failed: {}", e)),
        };

        let listing_type = if meaningful(metadata.content_type.as_deref()).is_none() {
            self.source
                .recover_content_type(&handle)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, key = %handle.key, "Listing metadata unavailable");
                    None
                })
        } else {
            None
        };
        let (content_type, content_type_source) = choose_content_type(
            metadata.content_type.as_deref(),
            listing_type.as_deref(),
            reference.recorded_file_type.as_deref(),
        );

        let new_key = allocate_upload_key();
        if let Err(e) = self
            .target
            .upload_with_key(&new_key, data, &content_type)
            .await
        {
            return MigrationOutcome::Failed(format!("upload failed: {}", e));
        }

        let new_address = match CanonicalAddress::from_key(&new_key) {
            Ok(address) => address,
            Err(e) => return MigrationOutcome::Failed(e.to_string()),
        };

        match self
            .repo
            .replace_reference(
                reference.collection,
                reference.record_id,
                &reference.url,
                new_address.as_str(),
            )
            .await
        {
            Ok(true) => {
                tracing::info!(
                    collection = %reference.collection,
                    record_id = %reference.record_id,
                    from = %address,
                    to = %new_address,
                    "Reference migrated"
                );
                MigrationOutcome::Migrated {
                    to: new_address,
                    content_type,
                    content_type_source,
                }
            }
            Ok(false) => MigrationOutcome::Failed(format!(
                "reference changed concurrently; copy left at {}",
                new_key
            )),
            Err(e) => MigrationOutcome::Failed(format!(
                "reference update failed: {}; copy left at {}",
                e, new_key
            )),
        }
    }
}

pub fn print_summary(report: &MigrationReport) {
    println!();
    println!(
        "Migration summary ({} -> {}){}:",
        report.from,
        report.to,
        if report.dry_run { " (dry run, nothing copied)" } else { "" }
    );
    for (collection, summary) in &report.summaries {
        println!(
            "  {:<17} {} {:>5}  skipped {:>5}  errors {:>5}",
            collection.label(),
            if report.dry_run { "to migrate" } else { "migrated  " },
            summary.migrated,
            summary.skipped,
            summary.errors
        );
    }
}
