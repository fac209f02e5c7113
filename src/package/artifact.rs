use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use crate::changeset::ItemId;
use crate::error::Result;
use super::checksum::Checksums;

/// The archival package for one item: `{aip_dir}/aip_{id}.zip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageArtifact {
    id: ItemId,
    path: PathBuf,
}

impl PackageArtifact {
    pub fn new(aip_dir: impl AsRef<Path>, id: &ItemId) -> Self {
        Self {
            id: id.clone(),
            path: aip_dir.as_ref().join(Self::object_name(id)),
        }
    }

    /// Object name shared by the local file and the destination object.
    pub fn object_name(id: &ItemId) -> String {
        format!("aip_{}.zip", id)
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        Self::object_name(&self.id)
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn modified(&self) -> Result<DateTime<Utc>> {
        let mtime = fs::metadata(&self.path)?.modified()?;
        Ok(DateTime::<Utc>::from(mtime))
    }

    pub fn checksums(&self) -> Result<Checksums> {
        Checksums::compute_file(&self.path)
    }
}
