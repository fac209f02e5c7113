mod artifact;
mod builder;
mod checksum;
mod orchestrator;

pub use artifact::PackageArtifact;
pub use builder::{BuildOutcome, ConsoleBuilder, PackageBuilder, DEFAULT_SETTINGS};
pub use checksum::{md5_hex, segmented_etag, Checksums, CHUNK_SIZE};
pub use orchestrator::{BuildFailure, BuildReport, PackageOrchestrator};
