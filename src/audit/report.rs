use std::collections::BTreeMap;
use serde::Serialize;
use tabled::Tabled;
use crate::ledger::AuditRecord;
use super::status::AuditStatus;

#[derive(Debug, Clone, Tabled)]
pub struct AuditTableRow {
    #[tabled(rename = "Item")]
    pub item: String,
    #[tabled(rename = "Changed")]
    pub changed: String,
    #[tabled(rename = "Object")]
    pub object: String,
    #[tabled(rename = "Stored")]
    pub stored: String,
    #[tabled(rename = "Bytes")]
    pub bytes: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

impl From<&AuditRecord> for AuditTableRow {
    fn from(record: &AuditRecord) -> Self {
        let dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };

        AuditTableRow {
            item: record.source_id.clone(),
            changed: record.source_changed_at.clone(),
            object: dash(&record.destination_object_id),
            stored: dash(&record.destination_last_modified),
            bytes: dash(&record.destination_size_bytes),
            status: format!("{} {}", record.status.symbol(), record.status.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: &'static str,
    pub code: &'static str,
    pub count: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct AuditReport {
    pub records: Vec<AuditRecord>,
}

impl AuditReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: AuditRecord) {
        self.records.push(record);
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn count(&self, status: AuditStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn ok_count(&self) -> usize {
        self.count(AuditStatus::Ok)
    }

    pub fn has_findings(&self) -> bool {
        self.records.iter().any(|r| !r.status.is_ok())
    }

    pub fn findings(&self) -> Vec<&AuditRecord> {
        self.records.iter().filter(|r| !r.status.is_ok()).collect()
    }

    pub fn by_status(&self) -> BTreeMap<AuditStatus, Vec<&AuditRecord>> {
        let mut grouped: BTreeMap<AuditStatus, Vec<&AuditRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped.entry(record.status).or_default().push(record);
        }
        grouped
    }

    pub fn summary(&self) -> Vec<StatusCount> {
        AuditStatus::ALL
            .iter()
            .map(|s| StatusCount {
                status: s.as_str(),
                code: s.code(),
                count: self.count(*s),
            })
            .filter(|c| c.count > 0)
            .collect()
    }

    pub fn table_rows(&self) -> Vec<AuditTableRow> {
        self.findings().into_iter().map(AuditTableRow::from).collect()
    }
}
