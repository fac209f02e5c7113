use super::store_error::StoreError;

/// Map a non-success object store response to a [`StoreError`].
pub fn parse_store_status(status: u16, body: &str, context: ErrorContext) -> StoreError {
    let container = context.container.clone().unwrap_or_default();

    match status {
        401 => StoreError::AuthenticationFailed {
            reason: non_empty(body, "token rejected"),
        },

        403 => StoreError::AccessDenied {
            resource: context.resource(),
        },

        404 => match context.object {
            Some(object) => StoreError::ObjectNotFound { container, object },
            None => StoreError::ContainerNotFound { container },
        },

        // Swift answers 422 when the body does not match the supplied ETag
        422 => StoreError::ChecksumRejected {
            object: context.object.unwrap_or_default(),
        },

        413 | 507 => StoreError::QuotaExceeded {
            message: non_empty(body, "insufficient storage"),
        },

        502..=504 => StoreError::ConnectionFailed {
            reason: format!("gateway returned {}", status),
        },

        _ => StoreError::Unknown {
            status: Some(status),
            message: non_empty(body, "no response body"),
        },
    }
}

fn non_empty(body: &str, fallback: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub operation: Option<String>,
    pub container: Option<String>,
    pub object: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        self.operation = Some(op.into());
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_object(mut self, container: impl Into<String>, object: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self.object = Some(object.into());
        self
    }

    fn resource(&self) -> String {
        match (&self.container, &self.object) {
            (Some(c), Some(o)) => format!("{}/{}", c, o),
            (Some(c), None) => c.clone(),
            _ => "<account>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_404_with_object_is_object_not_found() {
        let ctx = ErrorContext::new().with_object("cwrc_test", "aip_1.zip");
        let err = parse_store_status(404, "", ctx);
        assert!(matches!(err, StoreError::ObjectNotFound { ref object, .. } if object == "aip_1.zip"));
    }

    #[test]
    fn test_404_without_object_is_container_not_found() {
        let ctx = ErrorContext::new().with_container("cwrc_test");
        let err = parse_store_status(404, "", ctx);
        assert!(matches!(err, StoreError::ContainerNotFound { .. }));
    }

    #[test]
    fn test_422_is_checksum_rejected() {
        let ctx = ErrorContext::new().with_object("c", "aip_2.zip");
        let err = parse_store_status(422, "Unprocessable Entity", ctx);
        assert_eq!(err.error_code(), "CHECKSUM_REJECTED");
    }

    #[test]
    fn test_unknown_keeps_status_and_body() {
        let err = parse_store_status(418, " teapot ", ErrorContext::new());
        match err {
            StoreError::Unknown { status, message } => {
                assert_eq!(status, Some(418));
                assert_eq!(message, "teapot");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_access_denied_resource() {
        let ctx = ErrorContext::new().with_operation("stat").with_object("c", "o");
        let err = parse_store_status(403, "", ctx);
        assert_eq!(err.to_string(), "Access denied to c/o");
    }
}
