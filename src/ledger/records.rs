use serde::Serialize;
use crate::audit::AuditStatus;
use super::writer::LedgerRow;

/// One verified upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRecord {
    pub id: String,
    #[serde(rename = "md5sum")]
    pub md5: String,
    #[serde(rename = "sha256sum")]
    pub sha256: String,
    pub uploaded_by: String,
    #[serde(rename = "last_updated_at")]
    pub last_modified_at_destination: String,
    pub container_name: String,
    pub notes: String,
}

impl LedgerRow for UploadRecord {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "md5sum",
        "sha256sum",
        "uploaded_by",
        "last_updated_at",
        "container_name",
        "notes",
    ];
}

/// One audited item. Destination columns stay empty when the audit stopped
/// before the store was consulted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    #[serde(rename = "drupal_id")]
    pub source_id: String,
    #[serde(rename = "drupal_changed")]
    pub source_changed_at: String,
    #[serde(rename = "swift_id")]
    pub destination_object_id: String,
    #[serde(rename = "swift_timestamp")]
    pub destination_last_modified: String,
    #[serde(rename = "swift_meta_changed")]
    pub destination_meta_changed: String,
    #[serde(rename = "swift_bytes")]
    pub destination_size_bytes: String,
    pub status: AuditStatus,
}

impl AuditRecord {
    pub fn source_only(source_id: impl Into<String>, source_changed_at: impl Into<String>, status: AuditStatus) -> Self {
        Self {
            source_id: source_id.into(),
            source_changed_at: source_changed_at.into(),
            destination_object_id: String::new(),
            destination_last_modified: String::new(),
            destination_meta_changed: String::new(),
            destination_size_bytes: String::new(),
            status,
        }
    }
}

impl LedgerRow for AuditRecord {
    const HEADERS: &'static [&'static str] = &[
        "drupal_id",
        "drupal_changed",
        "swift_id",
        "swift_timestamp",
        "swift_meta_changed",
        "swift_bytes",
        "status",
    ];
}
