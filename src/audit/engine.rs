use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use crate::changeset::{timestamps_match, ChangeEntry, ChangeSet, ChangeSetMerger, ItemId};
use crate::error::Result;
use crate::ledger::{AuditRecord, LedgerSink};
use crate::package::PackageArtifact;
use crate::source::ChangeFeed;
use crate::store::{headers, http_date_to_iso8601, ObjectStat, ObjectStore};
use super::report::AuditReport;
use super::status::AuditStatus;

/// Cross-checks source timestamps, local packages, and destination objects.
///
/// Checks run in a fixed order and the first failing one decides the status:
/// package presence, package freshness, destination presence, destination
/// timestamp, destination checksum.
pub struct AuditEngine<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    container: String,
    aip_dir: PathBuf,
}

impl<'a, S: ObjectStore + ?Sized> AuditEngine<'a, S> {
    pub fn new(store: &'a S, container: impl Into<String>, aip_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            container: container.into(),
            aip_dir: aip_dir.into(),
        }
    }

    /// Re-derive the change set from the source, then audit it.
    pub async fn run<F: ChangeFeed + ?Sized>(
        &self,
        feed: &F,
        changed_since: Option<&str>,
        ledger: &mut impl LedgerSink<AuditRecord>,
    ) -> Result<AuditReport> {
        let set = ChangeSetMerger::discover(feed, changed_since).await?;
        self.audit_all(&set, ledger).await
    }

    /// One record per item, OK included. Only ledger write failures are errors.
    pub async fn audit_all(
        &self,
        set: &ChangeSet,
        ledger: &mut impl LedgerSink<AuditRecord>,
    ) -> Result<AuditReport> {
        let mut report = AuditReport::new();
        for (id, entry) in set {
            let record = self.audit_item(id, entry).await;
            ledger.record(&record)?;
            report.add(record);
        }
        info!(
            total = report.total(),
            ok = report.ok_count(),
            findings = report.total() - report.ok_count(),
            "audit complete"
        );
        Ok(report)
    }

    pub async fn audit_item(&self, id: &ItemId, entry: &ChangeEntry) -> AuditRecord {
        let artifact = PackageArtifact::new(&self.aip_dir, id);
        let changed = entry.changed.as_str();
        info!(id = %id, object = %artifact.name(), path = %artifact.path().display(), "audit");

        if !artifact.exists() {
            error!(id = %id, path = %artifact.path().display(), "missing AIP");
            return AuditRecord::source_only(id.as_str(), changed, AuditStatus::AipMissing);
        }

        match artifact.modified() {
            Ok(mtime) if mtime < entry.changed.instant() => {
                error!(
                    id = %id,
                    aip_mtime = %mtime.to_rfc3339(),
                    source_changed = %changed,
                    "filesystem date older than source date"
                );
                return AuditRecord::source_only(id.as_str(), changed, AuditStatus::AipStale);
            }
            Ok(_) => {}
            Err(e) => {
                error!(id = %id, path = %artifact.path().display(), error = %e, "cannot read AIP modification time");
                return AuditRecord::source_only(id.as_str(), changed, AuditStatus::AipMissing);
            }
        }

        let stat = match self.lookup(id, &artifact).await {
            Some(stat) => stat,
            None => return AuditRecord::source_only(id.as_str(), changed, AuditStatus::SwiftMissing),
        };

        let status = self.check_properties(id, entry, &artifact, &stat);
        if status.is_ok() {
            info!(id = %id, object = %artifact.name(), "audit success");
        }

        AuditRecord {
            source_id: id.to_string(),
            source_changed_at: changed.to_string(),
            destination_object_id: stat.object.clone(),
            destination_last_modified: normalize_last_modified(id, stat.header(headers::LAST_MODIFIED)),
            destination_meta_changed: stat.header(headers::LAST_MOD_TIMESTAMP).unwrap_or_default().to_string(),
            destination_size_bytes: stat.header(headers::CONTENT_LENGTH).unwrap_or_default().to_string(),
            status,
        }
    }

    /// The destination object's metadata, or `None` when it cannot be found.
    async fn lookup(&self, id: &ItemId, artifact: &PackageArtifact) -> Option<ObjectStat> {
        let name = artifact.name();
        let stats = match self.store.stat(&self.container, std::slice::from_ref(&name)).await {
            Ok(stats) => stats,
            Err(e) => {
                error!(id = %id, object = %name, error = %e, "connection error");
                return None;
            }
        };

        let Some(stat) = stats.into_iter().next() else {
            error!(id = %id, object = %name, "not present in destination");
            return None;
        };

        debug!(?stat, "stat");
        if !stat.success {
            error!(id = %id, object = %name, error = ?stat.error, "preservation error");
            return None;
        }
        Some(stat)
    }

    fn check_properties(
        &self,
        id: &ItemId,
        entry: &ChangeEntry,
        artifact: &PackageArtifact,
        stat: &ObjectStat,
    ) -> AuditStatus {
        let stored_changed = stat.header(headers::LAST_MOD_TIMESTAMP);
        let timestamp_ok = stored_changed.is_some_and(|stored| timestamps_match(&entry.changed, stored));
        if !timestamp_ok {
            error!(
                id = %id,
                expected = %entry.changed,
                actual = stored_changed.unwrap_or("<none>"),
                "mismatched modification timestamp"
            );
            return AuditStatus::SwiftTimestampMismatch;
        }

        let Some(stored_sha256) = stat.header(headers::SHA256SUM) else {
            return AuditStatus::Ok;
        };

        match artifact.checksums() {
            Ok(local) if local.sha256 == stored_sha256 => AuditStatus::Ok,
            Ok(local) => {
                error!(id = %id, expected = %local.sha256, actual = %stored_sha256, "mismatched checksum");
                AuditStatus::SwiftChecksumMismatch
            }
            Err(e) => {
                error!(id = %id, path = %artifact.path().display(), error = %e, "cannot digest AIP");
                AuditStatus::SwiftChecksumMismatch
            }
        }
    }
}

fn normalize_last_modified(id: &ItemId, value: Option<&str>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    http_date_to_iso8601(value).unwrap_or_else(|| {
        warn!(id = %id, value, "unrecognized last-modified format; writing as received");
        value.to_string()
    })
}
