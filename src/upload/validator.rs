use serde::Serialize;
use tracing::{debug, error, info};
use crate::changeset::{timestamps_match, ChangeSet, ItemId};
use crate::package::PackageArtifact;
use crate::store::{headers, ObjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    PreservationError,
    TimestampMismatch,
    NotPresent,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::PreservationError => "preservation error",
            FindingKind::TimestampMismatch => "mismatched modification timestamp",
            FindingKind::NotPresent => "not present in destination",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFinding {
    pub id: ItemId,
    pub object: String,
    pub kind: FindingKind,
    pub detail: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub checked: usize,
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings.iter().filter(|f| f.kind == kind).count()
    }
}

/// Post-upload check that every object in the change set exists in the
/// store and carries the source timestamp. Findings are logged, never raised.
pub struct UploadValidator<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    container: String,
}

impl<'a, S: ObjectStore + ?Sized> UploadValidator<'a, S> {
    pub fn new(store: &'a S, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    pub async fn validate(&self, set: &ChangeSet) -> ValidationReport {
        let mut report = ValidationReport::default();

        for (id, entry) in set {
            let object = PackageArtifact::object_name(id);
            info!(id = %id, object = %object, "validating");
            report.checked += 1;

            let stats = match self.store.stat(&self.container, std::slice::from_ref(&object)).await {
                Ok(stats) => stats,
                Err(e) => {
                    error!(id = %id, object = %object, error = %e, "preservation error");
                    report.findings.push(finding(id, &object, FindingKind::PreservationError, e.to_string()));
                    continue;
                }
            };

            if stats.is_empty() {
                error!(id = %id, object = %object, "not present in destination");
                report.findings.push(finding(id, &object, FindingKind::NotPresent, String::new()));
                continue;
            }

            for stat in &stats {
                debug!(?stat, "stat");
                if !stat.success {
                    let detail = stat.error.clone().unwrap_or_default();
                    error!(id = %id, object = %object, error = %detail, "preservation error");
                    report.findings.push(finding(id, &object, FindingKind::PreservationError, detail));
                    break;
                }

                let stored = stat.header(headers::LAST_MOD_TIMESTAMP).unwrap_or_default();
                if !timestamps_match(&entry.changed, stored) {
                    error!(
                        id = %id,
                        object = %object,
                        expected = %entry.changed,
                        actual = %stored,
                        "mismatched modification timestamp"
                    );
                    report.findings.push(finding(
                        id,
                        &object,
                        FindingKind::TimestampMismatch,
                        format!("{} : {}", entry.changed, stored),
                    ));
                    break;
                }
            }
        }

        report
    }
}

fn finding(id: &ItemId, object: &str, kind: FindingKind, detail: String) -> ValidationFinding {
    ValidationFinding {
        id: id.clone(),
        object: object.to_string(),
        kind,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ChangeTimestamp;
    use crate::error::{AipDriftError, Result};
    use crate::store::{collect_headers, ObjectStat, UploadEvent, UploadObject};
    use async_trait::async_trait;

    enum Reply {
        Found(&'static str),
        Failed,
        Empty,
        Broken,
    }

    struct StatStore(Reply);

    #[async_trait]
    impl ObjectStore for StatStore {
        async fn upload(&self, _container: &str, _objects: Vec<UploadObject>) -> Result<Vec<UploadEvent>> {
            Ok(Vec::new())
        }

        async fn stat(&self, _container: &str, names: &[String]) -> Result<Vec<ObjectStat>> {
            match self.0 {
                Reply::Found(ts) => Ok(vec![ObjectStat::found(
                    names[0].clone(),
                    collect_headers([("X-Object-Meta-Last-Mod-Timestamp", ts)]),
                )]),
                Reply::Failed => Ok(vec![ObjectStat::failed(names[0].clone(), "Object not found")]),
                Reply::Empty => Ok(Vec::new()),
                Reply::Broken => Err(AipDriftError::Config("connection refused".into())),
            }
        }
    }

    fn one_item() -> ChangeSet {
        let mut set = ChangeSet::new();
        set.insert(ItemId::from(1), ChangeTimestamp::parse("2024-01-01T01:01:01+00:00").unwrap());
        set
    }

    #[tokio::test]
    async fn test_validation_passes() {
        let store = StatStore(Reply::Found("2024-01-01T01:01:01+00:00"));
        let report = UploadValidator::new(&store, "c").validate(&one_item()).await;
        assert!(report.is_clean());
        assert_eq!(report.checked, 1);
    }

    #[tokio::test]
    async fn test_validation_date_mismatch() {
        let store = StatStore(Reply::Found("2023-01-01T01:01:01+00:00"));
        let report = UploadValidator::new(&store, "c").validate(&one_item()).await;
        assert_eq!(report.count(FindingKind::TimestampMismatch), 1);
    }

    #[tokio::test]
    async fn test_validation_missing_object() {
        let store = StatStore(Reply::Failed);
        let report = UploadValidator::new(&store, "c").validate(&one_item()).await;
        assert_eq!(report.findings[0].kind, FindingKind::PreservationError);
        assert_eq!(report.findings[0].detail, "Object not found");
    }

    #[tokio::test]
    async fn test_validation_empty_stat() {
        let store = StatStore(Reply::Empty);
        let report = UploadValidator::new(&store, "c").validate(&one_item()).await;
        assert_eq!(report.count(FindingKind::NotPresent), 1);
    }

    #[tokio::test]
    async fn test_validation_stat_error_is_not_fatal() {
        let store = StatStore(Reply::Broken);
        let report = UploadValidator::new(&store, "c").validate(&one_item()).await;
        assert_eq!(report.count(FindingKind::PreservationError), 1);
    }
}
