//! Response status checks shared by the source session calls.

use crate::error::{AipDriftError, Result};

/// Returns the response unchanged on success, otherwise an
/// [`AipDriftError::Api`] carrying the status, URL, and body text.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        return Err(AipDriftError::Api {
            status,
            url,
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}
