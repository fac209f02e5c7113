mod uploader;
mod validator;

pub use uploader::{IntegrityUploader, UploadOptions, UploadReport};
pub use validator::{FindingKind, UploadValidator, ValidationFinding, ValidationReport};
