mod records;
mod writer;

pub use records::{AuditRecord, UploadRecord};
pub use writer::{LedgerRow, LedgerSink, LedgerWriter, SharedLedger};
