pub mod error;
pub mod source;
pub mod changeset;
pub mod package;
pub mod store;
pub mod upload;
pub mod audit;
pub mod ledger;
pub mod config;

pub use error::{AipDriftError, Result, StoreError};
pub use source::{SourceSession, ChangeFeed, ChangeFeedReader, FeedPage, RawEntry, ResourceKind};
pub use changeset::{ChangeSet, ChangeEntry, ChangeSetMerger, ChangeTimestamp, ItemId, Promotion, SubItemMergeStats, timestamps_match};
pub use package::{PackageArtifact, PackageBuilder, ConsoleBuilder, BuildOutcome, BuildReport, BuildFailure, PackageOrchestrator, Checksums};
pub use store::{ObjectStore, SwiftStore, ObjectStat, UploadAction, UploadEvent, UploadObject};
pub use upload::{IntegrityUploader, UploadOptions, UploadReport, UploadValidator, ValidationReport, ValidationFinding, FindingKind};
pub use audit::{AuditEngine, AuditReport, AuditStatus, AuditTableRow};
pub use ledger::{AuditRecord, UploadRecord, LedgerWriter, LedgerSink, SharedLedger};
pub use config::{ProjectMetadata, SourceCredentials, StoreCredentials};
