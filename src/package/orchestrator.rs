use tracing::{info, warn};
use crate::changeset::{ChangeSet, ItemId};
use super::builder::{BuildOutcome, PackageBuilder};

#[derive(Debug, Default)]
pub struct BuildReport {
    pub built: Vec<ItemId>,
    pub failures: Vec<BuildFailure>,
}

#[derive(Debug, Clone)]
pub struct BuildFailure {
    pub id: ItemId,
    pub reason: String,
}

impl BuildReport {
    pub fn total(&self) -> usize {
        self.built.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Invokes the builder once per item. A failed build is recorded and the
/// batch keeps going; the missing package shows up later in the audit.
pub struct PackageOrchestrator<'a, B: PackageBuilder + ?Sized> {
    builder: &'a B,
}

impl<'a, B: PackageBuilder + ?Sized> PackageOrchestrator<'a, B> {
    pub fn new(builder: &'a B) -> Self {
        Self { builder }
    }

    pub async fn build_all(&self, changes: &ChangeSet) -> BuildReport {
        let mut report = BuildReport::default();

        for id in changes.ids() {
            info!(id = %id, "generating AIP");
            match self.builder.build(id).await {
                BuildOutcome::Success => report.built.push(id.clone()),
                BuildOutcome::Failure(reason) => {
                    warn!(id = %id, %reason, "AIP generation failed");
                    report.failures.push(BuildFailure {
                        id: id.clone(),
                        reason,
                    });
                }
            }
        }

        info!(built = report.built.len(), failed = report.failures.len(), "AIP generation complete");
        report
    }
}
