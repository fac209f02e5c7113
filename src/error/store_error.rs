use std::fmt;

#[derive(Debug, Clone)]
pub enum StoreError {
    AuthenticationFailed {
        reason: String,
    },

    ContainerNotFound {
        container: String,
    },

    ObjectNotFound {
        container: String,
        object: String,
    },

    AccessDenied {
        resource: String,
    },

    ChecksumRejected {
        object: String,
    },

    QuotaExceeded {
        message: String,
    },

    ConnectionFailed {
        reason: String,
    },

    Unknown {
        status: Option<u16>,
        message: String,
    },
}

impl StoreError {
    pub fn suggestion(&self) -> String {
        match self {
            StoreError::AuthenticationFailed { .. } => {
                "Try:\n  \
                 • Check OS_AUTH_URL, OS_USERNAME and OS_PASSWORD\n  \
                 • Or set OS_STORAGE_URL and OS_AUTH_TOKEN for a pre-issued token".to_string()
            }

            StoreError::ContainerNotFound { container } => {
                format!(
                    "Verify the container exists:\n  \
                     • Run: swift stat {container}\n  \
                     • Check for typos in --container"
                )
            }

            StoreError::ObjectNotFound { container, object } => {
                format!(
                    "The object has not been preserved yet:\n  \
                     • Run: swift stat {container} {object}\n  \
                     • Re-run preserve for the item"
                )
            }

            StoreError::AccessDenied { resource } => {
                format!(
                    "Request access to {resource}:\n  \
                     • Check the account's container ACLs\n  \
                     • Contact the storage administrator"
                )
            }

            StoreError::ChecksumRejected { .. } => {
                "The store rejected the upload body:\n  \
                 • The local package may have changed during transfer\n  \
                 • Rebuild the package and retry".to_string()
            }

            StoreError::QuotaExceeded { .. } => {
                "Storage quota exceeded:\n  \
                 • Remove obsolete objects\n  \
                 • Request a quota increase".to_string()
            }

            StoreError::ConnectionFailed { .. } => {
                "Connection failed:\n  \
                 • Check your network connection\n  \
                 • Verify the storage URL\n  \
                 • Try again in a few moments".to_string()
            }

            StoreError::Unknown { .. } => {
                "An unexpected error occurred:\n  \
                 • Check the error message for details\n  \
                 • Verify your object store configuration".to_string()
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::AuthenticationFailed { .. } => "AUTH_FAILED",
            StoreError::ContainerNotFound { .. } => "CONTAINER_NOT_FOUND",
            StoreError::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            StoreError::AccessDenied { .. } => "ACCESS_DENIED",
            StoreError::ChecksumRejected { .. } => "CHECKSUM_REJECTED",
            StoreError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            StoreError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            StoreError::Unknown { .. } => "UNKNOWN",
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AuthenticationFailed { reason } => {
                write!(f, "Authentication failed: {reason}")
            }

            StoreError::ContainerNotFound { container } => {
                write!(f, "Container not found: {container}")
            }

            StoreError::ObjectNotFound { container, object } => {
                write!(f, "Object not found: {container}/{object}")
            }

            StoreError::AccessDenied { resource } => {
                write!(f, "Access denied to {resource}")
            }

            StoreError::ChecksumRejected { object } => {
                write!(f, "Upload body rejected for {object} (etag mismatch)")
            }

            StoreError::QuotaExceeded { message } => {
                write!(f, "Quota exceeded: {message}")
            }

            StoreError::ConnectionFailed { reason } => {
                write!(f, "Connection failed: {reason}")
            }

            StoreError::Unknown { status, message } => {
                if let Some(s) = status {
                    write!(f, "Store error [{s}]: {message}")
                } else {
                    write!(f, "Store error: {message}")
                }
            }
        }
    }
}

impl std::error::Error for StoreError {}
