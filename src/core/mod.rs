pub mod credentials;
pub mod middleware;

use serde::Deserialize;
use std::fmt;
use url::form_urlencoded;

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorResponse {
    pub error: FirebaseErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
}

/// A failed call to a Google API, reduced to what callers need to classify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    /// HTTP status code of the response.
    pub code: u16,
    /// Canonical gRPC-style status (e.g. `INVALID_ARGUMENT`), when the body carried one.
    pub status: Option<String>,
    pub message: String,
}

impl ApiFailure {
    /// Returns `true` when the request itself was rejected (bad filter, missing index,
    /// malformed path) rather than the backend being unavailable.
    pub fn is_rejected_request(&self) -> bool {
        self.code == 400
            || matches!(
                self.status.as_deref(),
                Some("INVALID_ARGUMENT") | Some("FAILED_PRECONDITION")
            )
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)
    }
}

/// Percent-encodes an id for use as one URL path segment.
///
/// `/` is escaped, so the id cannot add path segments. A bare `.` or `..` passes through
/// unchanged; callers that accept those from users must reject them first.
pub(crate) fn encode_path_segment(segment: &str) -> String {
    form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> ApiFailure {
    let code = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<FirebaseErrorResponse>(&text) {
        Ok(error_resp) => ApiFailure {
            code: error_resp.error.code,
            status: error_resp.error.status,
            message: error_resp.error.message,
        },
        Err(_) => ApiFailure {
            code,
            status: None,
            message: format!("{}: {}", default_msg, text),
        },
    }
}
