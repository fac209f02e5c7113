use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use crate::changeset::{ChangeSet, ItemId};
use crate::config::ProjectMetadata;
use crate::error::{AipDriftError, Result};
use crate::ledger::{LedgerSink, UploadRecord};
use crate::package::{segmented_etag, Checksums, PackageArtifact};
use crate::store::{headers, Headers, ObjectStore, UploadAction, UploadEvent, UploadObject};

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub container: String,
    /// Written to the `uploaded_by` ledger column.
    pub uploaded_by: String,
    pub metadata: ProjectMetadata,
    /// Must match the store's segment size so segmented tags can be recomputed.
    pub segment_size: Option<u64>,
}

#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<UploadRecord>,
    /// Items with no local package, usually because the build failed.
    pub skipped: Vec<ItemId>,
    pub containers_created: Vec<String>,
    pub segments: usize,
}

impl UploadReport {
    pub fn uploaded_count(&self) -> usize {
        self.uploaded.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

struct Prepared {
    id: ItemId,
    path: PathBuf,
    /// Fixity digest sent as object metadata.
    sha256: String,
}

pub struct IntegrityUploader<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    options: UploadOptions,
}

impl<'a, S: ObjectStore + ?Sized> IntegrityUploader<'a, S> {
    pub fn new(store: &'a S, options: UploadOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Digest, upload, and verify every package in `set`, recording each
    /// verified upload in `ledger`. Any failed transfer or digest mismatch
    /// stops the run.
    pub async fn upload_all(
        &self,
        set: &ChangeSet,
        aip_dir: &Path,
        ledger: &mut impl LedgerSink<UploadRecord>,
    ) -> Result<UploadReport> {
        let mut report = UploadReport::default();
        let mut prepared: HashMap<String, Prepared> = HashMap::new();
        let mut batch = Vec::with_capacity(set.len());

        for (id, entry) in set {
            let artifact = PackageArtifact::new(aip_dir, id);
            if !artifact.exists() {
                warn!(id = %id, path = %artifact.path().display(), "no package to upload");
                report.skipped.push(id.clone());
                continue;
            }

            info!(id = %id, path = %artifact.path().display(), "adding to upload");
            let checksums = artifact.checksums()?;

            let mut object_headers: Headers = self.options.metadata.headers();
            object_headers.insert(headers::SHA256SUM.to_string(), checksums.sha256.clone());
            object_headers.insert(headers::LAST_MOD_TIMESTAMP.to_string(), entry.changed.as_str().to_string());
            object_headers.insert(headers::CONTENT_TYPE.to_string(), entry.content_type.clone());

            batch.push(UploadObject {
                path: artifact.path().to_path_buf(),
                object_name: artifact.name(),
                headers: object_headers,
            });
            prepared.insert(
                artifact.name(),
                Prepared {
                    id: id.clone(),
                    path: artifact.path().to_path_buf(),
                    sha256: checksums.sha256,
                },
            );
        }

        if batch.is_empty() {
            info!("nothing to upload");
            return Ok(report);
        }

        let events = self.store.upload(&self.options.container, batch).await?;
        for event in &events {
            self.handle_event(event, &prepared, &mut report, ledger)?;
        }

        Ok(report)
    }

    fn handle_event(
        &self,
        event: &UploadEvent,
        prepared: &HashMap<String, Prepared>,
        report: &mut UploadReport,
        ledger: &mut impl LedgerSink<UploadRecord>,
    ) -> Result<()> {
        debug!(?event, "upload event");

        if !event.success {
            error!(object = %event.object, error = ?event.error, "transfer failed");
            let segment_index = match &event.action {
                UploadAction::UploadSegment { index, .. } => Some(*index),
                _ => None,
            };
            return Err(AipDriftError::Transfer {
                object: event.object.clone(),
                segment_index,
                message: event.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        match &event.action {
            UploadAction::CreateContainer => {
                info!(container = %event.object, "container created");
                report.containers_created.push(event.object.clone());
            }
            UploadAction::UploadSegment { index, for_object } => {
                debug!(object = %for_object, index, "segment uploaded");
                report.segments += 1;
            }
            UploadAction::UploadObject { segmented } => {
                info!(object = %event.object, segmented, "uploaded");
                let Some(item) = prepared.get(&event.object) else {
                    warn!(object = %event.object, "store reported an object that was not submitted");
                    return Ok(());
                };

                // Digest what is on disk now; the package may have changed during the transfer
                let local = Checksums::compute_file(&item.path)?;
                let expected = self.expected_etag(item, &local, *segmented)?;
                let actual = event.etag().unwrap_or_default();
                if actual != expected {
                    error!(id = %item.id, path = %item.path.display(), %expected, %actual, "checksum failure");
                    return Err(AipDriftError::Integrity {
                        id: item.id.to_string(),
                        path: item.path.display().to_string(),
                        expected,
                        actual: actual.to_string(),
                    });
                }

                if local.sha256 != item.sha256 {
                    error!(id = %item.id, path = %item.path.display(), "package changed after its metadata was sent");
                    return Err(AipDriftError::Integrity {
                        id: item.id.to_string(),
                        path: item.path.display().to_string(),
                        expected: item.sha256.clone(),
                        actual: local.sha256,
                    });
                }

                let record = UploadRecord {
                    id: event.object.clone(),
                    md5: local.md5,
                    sha256: local.sha256,
                    uploaded_by: self.options.uploaded_by.clone(),
                    last_modified_at_destination: event.header(headers::LAST_MODIFIED).unwrap_or_default().to_string(),
                    container_name: self.options.container.clone(),
                    notes: if *segmented { "segmented".to_string() } else { String::new() },
                };
                ledger.record(&record)?;
                report.uploaded.push(record);
            }
        }
        Ok(())
    }

    fn expected_etag(&self, item: &Prepared, local: &Checksums, segmented: bool) -> Result<String> {
        if !segmented {
            return Ok(local.md5.clone());
        }
        match self.options.segment_size {
            Some(size) => segmented_etag(&item.path, size),
            None => Err(AipDriftError::Config(format!(
                "store segmented {} but no segment size is configured",
                item.path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ChangeTimestamp;
    use crate::error::Result;
    use crate::package::md5_hex;
    use crate::store::{collect_headers, ObjectStat};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedStore {
        events: Mutex<Option<Vec<UploadEvent>>>,
        submitted: Mutex<Vec<UploadObject>>,
        /// Content written over each submitted file while it is "in flight".
        rewrite_with: Option<Vec<u8>>,
    }

    impl ScriptedStore {
        fn new(events: Vec<UploadEvent>) -> Self {
            Self {
                events: Mutex::new(Some(events)),
                submitted: Mutex::new(Vec::new()),
                rewrite_with: None,
            }
        }

        fn rewriting(mut self, content: &[u8]) -> Self {
            self.rewrite_with = Some(content.to_vec());
            self
        }
    }

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        async fn upload(&self, _container: &str, objects: Vec<UploadObject>) -> Result<Vec<UploadEvent>> {
            if let Some(content) = &self.rewrite_with {
                for object in &objects {
                    std::fs::write(&object.path, content).unwrap();
                }
            }
            self.submitted.lock().unwrap().extend(objects);
            Ok(self.events.lock().unwrap().take().unwrap_or_default())
        }

        async fn stat(&self, _container: &str, _names: &[String]) -> Result<Vec<ObjectStat>> {
            Ok(Vec::new())
        }
    }

    fn event(action: UploadAction, object: &str, success: bool, etag: &str) -> UploadEvent {
        UploadEvent {
            action,
            success,
            error: if success { None } else { Some("503 Service Unavailable".into()) },
            object: object.into(),
            path: None,
            headers: collect_headers([("ETag", etag), ("Last-Modified", "Wed, 29 May 2024 22:29:37 GMT")]),
        }
    }

    fn setup(content: &[u8]) -> (TempDir, ChangeSet) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("aip_1.zip"), content).unwrap();
        let mut set = ChangeSet::new();
        set.insert(ItemId::from(1), ChangeTimestamp::parse("2024-01-01T01:01:01+00:00").unwrap());
        (dir, set)
    }

    fn options() -> UploadOptions {
        UploadOptions {
            container: "cwrc_test".into(),
            uploaded_by: "preserver".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_verified_upload_is_recorded() {
        let (dir, set) = setup(b"package");
        let store = ScriptedStore::new(vec![event(
            UploadAction::UploadObject { segmented: false },
            "aip_1.zip",
            true,
            &format!("\"{}\"", md5_hex(b"package")),
        )]);

        let uploader = IntegrityUploader::new(&store, options());
        let mut ledger: Vec<UploadRecord> = Vec::new();
        let report = uploader.upload_all(&set, dir.path(), &mut ledger).await.unwrap();

        assert_eq!(report.uploaded_count(), 1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].id, "aip_1.zip");
        assert_eq!(ledger[0].md5, md5_hex(b"package"));
        assert_eq!(ledger[0].last_modified_at_destination, "Wed, 29 May 2024 22:29:37 GMT");
        assert_eq!(ledger[0].uploaded_by, "preserver");

        let submitted = store.submitted.lock().unwrap();
        let sent = &submitted[0].headers;
        assert_eq!(sent[headers::LAST_MOD_TIMESTAMP], "2024-01-01T01:01:01+00:00");
        assert_eq!(sent[headers::SHA256SUM], Checksums::compute_bytes(b"package").sha256);
        assert_eq!(sent[headers::CONTENT_TYPE], "application/zip");
        assert!(sent.contains_key(headers::PROJECT_ID));
    }

    #[tokio::test]
    async fn test_etag_mismatch_is_fatal() {
        let (dir, set) = setup(b"package");
        let store = ScriptedStore::new(vec![event(
            UploadAction::UploadObject { segmented: false },
            "aip_1.zip",
            true,
            "00000000000000000000000000000000",
        )]);

        let uploader = IntegrityUploader::new(&store, options());
        let mut ledger: Vec<UploadRecord> = Vec::new();
        let err = uploader.upload_all(&set, dir.path(), &mut ledger).await.unwrap_err();

        assert!(matches!(err, AipDriftError::Integrity { .. }));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_package_rewritten_during_transfer_is_fatal() {
        let (dir, set) = setup(b"package");
        let store = ScriptedStore::new(vec![event(
            UploadAction::UploadObject { segmented: false },
            "aip_1.zip",
            true,
            &md5_hex(b"package"),
        )])
        .rewriting(b"repackaged");

        let uploader = IntegrityUploader::new(&store, options());
        let mut ledger: Vec<UploadRecord> = Vec::new();
        let err = uploader.upload_all(&set, dir.path(), &mut ledger).await.unwrap_err();

        match err {
            AipDriftError::Integrity { expected, actual, .. } => {
                assert_eq!(expected, md5_hex(b"repackaged"));
                assert_eq!(actual, md5_hex(b"package"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_sha256_metadata_must_match_uploaded_file() {
        let (dir, set) = setup(b"package");
        let store = ScriptedStore::new(vec![event(
            UploadAction::UploadObject { segmented: false },
            "aip_1.zip",
            true,
            &md5_hex(b"repackaged"),
        )])
        .rewriting(b"repackaged");

        let uploader = IntegrityUploader::new(&store, options());
        let mut ledger: Vec<UploadRecord> = Vec::new();
        let err = uploader.upload_all(&set, dir.path(), &mut ledger).await.unwrap_err();

        match err {
            AipDriftError::Integrity { expected, actual, .. } => {
                assert_eq!(expected, Checksums::compute_bytes(b"package").sha256);
                assert_eq!(actual, Checksums::compute_bytes(b"repackaged").sha256);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_failed_segment_reports_index() {
        let (dir, set) = setup(b"package");
        let store = ScriptedStore::new(vec![event(
            UploadAction::UploadSegment { index: 3, for_object: "aip_1.zip".into() },
            "aip_1.zip/00000003",
            false,
            "",
        )]);

        let uploader = IntegrityUploader::new(&store, options());
        let mut ledger: Vec<UploadRecord> = Vec::new();
        let err = uploader.upload_all(&set, dir.path(), &mut ledger).await.unwrap_err();

        match err {
            AipDriftError::Transfer { segment_index, .. } => assert_eq!(segment_index, Some(3)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_segmented_object_verified_against_manifest_tag() {
        let (dir, set) = setup(b"0123456789");
        let expected = segmented_etag(dir.path().join("aip_1.zip"), 4).unwrap();
        let store = ScriptedStore::new(vec![
            event(UploadAction::UploadSegment { index: 0, for_object: "aip_1.zip".into() }, "aip_1.zip/00000000", true, ""),
            event(UploadAction::UploadSegment { index: 1, for_object: "aip_1.zip".into() }, "aip_1.zip/00000001", true, ""),
            event(UploadAction::UploadSegment { index: 2, for_object: "aip_1.zip".into() }, "aip_1.zip/00000002", true, ""),
            event(UploadAction::UploadObject { segmented: true }, "aip_1.zip", true, &format!("\"{}\"", expected)),
        ]);

        let uploader = IntegrityUploader::new(&store, UploadOptions { segment_size: Some(4), ..options() });
        let mut ledger: Vec<UploadRecord> = Vec::new();
        let report = uploader.upload_all(&set, dir.path(), &mut ledger).await.unwrap();

        assert_eq!(report.segments, 3);
        assert_eq!(ledger[0].notes, "segmented");
    }

    #[tokio::test]
    async fn test_missing_package_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut set = ChangeSet::new();
        set.insert(ItemId::from(7), ChangeTimestamp::parse("2024-01-01").unwrap());
        let store = ScriptedStore::new(Vec::new());

        let uploader = IntegrityUploader::new(&store, options());
        let mut ledger: Vec<UploadRecord> = Vec::new();
        let report = uploader.upload_all(&set, dir.path(), &mut ledger).await.unwrap();

        assert_eq!(report.skipped, vec![ItemId::from(7)]);
        assert!(store.submitted.lock().unwrap().is_empty());
    }
}
