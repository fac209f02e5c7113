use serde::{Serialize, Serializer};

/// Outcome of auditing one item, in check order. The code is the literal
/// written to the ledger's `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuditStatus {
    Ok,
    AipMissing,
    AipStale,
    SwiftMissing,
    SwiftTimestampMismatch,
    SwiftChecksumMismatch,
}

impl AuditStatus {
    pub const ALL: [AuditStatus; 6] = [
        AuditStatus::Ok,
        AuditStatus::AipMissing,
        AuditStatus::AipStale,
        AuditStatus::SwiftMissing,
        AuditStatus::SwiftTimestampMismatch,
        AuditStatus::SwiftChecksumMismatch,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            AuditStatus::Ok => "",
            AuditStatus::AipMissing => "xm",
            AuditStatus::AipStale => "xd",
            AuditStatus::SwiftMissing => "sm",
            AuditStatus::SwiftTimestampMismatch => "st",
            AuditStatus::SwiftChecksumMismatch => "sw",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Ok => "ok",
            AuditStatus::AipMissing => "aip_missing",
            AuditStatus::AipStale => "aip_stale",
            AuditStatus::SwiftMissing => "swift_missing",
            AuditStatus::SwiftTimestampMismatch => "swift_timestamp_mismatch",
            AuditStatus::SwiftChecksumMismatch => "swift_checksum_mismatch",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            AuditStatus::Ok => "✓",
            AuditStatus::AipMissing | AuditStatus::SwiftMissing => "✗",
            AuditStatus::AipStale | AuditStatus::SwiftTimestampMismatch => "⚠",
            AuditStatus::SwiftChecksumMismatch => "!",
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == AuditStatus::Ok
    }
}

impl Serialize for AuditStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.code())
    }
}
