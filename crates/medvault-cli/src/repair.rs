//! Repair pass: rewrite every stored reference into its canonical form.

use medvault_core::{AppError, ObjectReference, ReferenceCollection};
use medvault_db::ObjectReferenceRepository;
use medvault_storage::{normalize, CanonicalAddress};
use serde::Serialize;
use uuid::Uuid;

use crate::truncate_string;

#[derive(Debug, Clone, Serialize)]
pub struct ProposedChange {
    pub collection: ReferenceCollection,
    pub record_id: Uuid,
    pub from: String,
    pub to: CanonicalAddress,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairSummary {
    pub scanned: usize,
    pub already_canonical: usize,
    /// Proposed in dry-run mode, written otherwise.
    pub changed: usize,
    pub unrecognized: usize,
    pub errors: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct RepairReport {
    pub dry_run: bool,
    pub changes: Vec<ProposedChange>,
    pub unrecognized: Vec<ObjectReference>,
    pub summaries: Vec<(ReferenceCollection, RepairSummary)>,
}

/// Scan both collections and rewrite non-canonical references.
/// Nothing is written when `dry_run` is set.
pub async fn run_repair(repo: &dyn ObjectReferenceRepository, dry_run: bool) -> RepairReport {
    let mut report = RepairReport {
        dry_run,
        ..RepairReport::default()
    };

    for collection in ReferenceCollection::ALL {
        println!("Scanning {}...", collection);
        let mut summary = RepairSummary::default();

        let references = match repo.list_references(collection, None).await {
            Ok(references) => references,
            Err(e) => {
                tracing::error!(error = %e, collection = %collection, "Failed to list references");
                summary.errors += 1;
                report.summaries.push((collection, summary));
                continue;
            }
        };

        for reference in references {
            summary.scanned += 1;
            match repair_reference(repo, &reference, dry_run).await {
                Ok(RepairOutcome::Canonical) => summary.already_canonical += 1,
                Ok(RepairOutcome::Changed(change)) => {
                    println!(
                        "  {} {}: {} -> {}",
                        if dry_run { "would rewrite" } else { "rewrote" },
                        change.record_id,
                        truncate_string(&change.from, 80),
                        change.to
                    );
                    summary.changed += 1;
                    report.changes.push(change);
                }
                Ok(RepairOutcome::Unrecognized) => {
                    println!(
                        "  unrecognized format {}: {}",
                        reference.record_id,
                        truncate_string(&reference.url, 80)
                    );
                    summary.unrecognized += 1;
                    report.unrecognized.push(reference);
                }
                Err(e) => {
                    println!("  error {}: {}", reference.record_id, e);
                    summary.errors += 1;
                }
            }
        }

        report.summaries.push((collection, summary));
    }

    report
}

enum RepairOutcome {
    Canonical,
    Changed(ProposedChange),
    Unrecognized,
}

async fn repair_reference(
    repo: &dyn ObjectReferenceRepository,
    reference: &ObjectReference,
    dry_run: bool,
) -> Result<RepairOutcome, AppError> {
    let canonical = match normalize(&reference.url) {
        Ok(address) => address,
        Err(_) => return Ok(RepairOutcome::Unrecognized),
    };
    if canonical.as_str() == reference.url {
        return Ok(RepairOutcome::Canonical);
    }

    let change = ProposedChange {
        collection: reference.collection,
        record_id: reference.record_id,
        from: reference.url.clone(),
        to: canonical,
    };
    if dry_run {
        return Ok(RepairOutcome::Changed(change));
    }

    let updated = repo
        .replace_reference(
            reference.collection,
            reference.record_id,
            &reference.url,
            change.to.as_str(),
        )
        .await?;
    if !updated {
        return Err(AppError::Internal(
            "reference changed concurrently; left untouched".to_string(),
        ));
    }
    tracing::info!(
        collection = %reference.collection,
        record_id = %reference.record_id,
        to = %change.to,
        "Reference rewritten"
    );
    Ok(RepairOutcome::Changed(change))
}

pub fn print_summary(report: &RepairReport) {
    println!();
    println!(
        "Repair summary{}:",
        if report.dry_run { " (dry run, nothing written)" } else { "" }
    );
    for (collection, summary) in &report.summaries {
        println!(
            "  {:<17} scanned {:>5}  canonical {:>5}  {} {:>5}  unrecognized {:>5}  errors {:>5}",
            collection.label(),
            summary.scanned,
            summary.already_canonical,
            if report.dry_run { "to rewrite" } else { "rewritten " },
            summary.changed,
            summary.unrecognized,
            summary.errors
        );
    }
}
