mod engine;
mod report;
mod status;

pub use engine::AuditEngine;
pub use report::{AuditReport, AuditTableRow, StatusCount};
pub use status::AuditStatus;
