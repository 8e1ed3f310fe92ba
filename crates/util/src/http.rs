//! # HTTP Utilities
//!
//! Helpers for turning backend responses into messages a user can act on.

/// Return a user-friendly error message for common HTTP status codes.
///
/// # Arguments
/// * `status_code` - The HTTP status code
///
/// # Returns
/// `Some(error_message)` for known status codes, `None` for others
///
/// # Example
/// ```rust
/// use qeapp_util::http::status_error_message;
///
/// let not_found = status_error_message(404).unwrap();
/// assert!(not_found.contains("Not found"));
///
/// let server = status_error_message(500).unwrap();
/// assert!(server.contains("daemon"));
///
/// assert!(status_error_message(418).is_none());
/// ```
pub fn status_error_message(status_code: u16) -> Option<String> {
    match status_code {
        404 => Some("Not found (404). Hint: the job may have been deleted or never submitted".into()),
        422 => Some("Unprocessable request (422). Hint: the backend rejected the request payload".into()),
        500 => Some("Backend error (500). Hint: check that the AiiDA profile is loaded and the daemon is running".into()),
        502..=504 => Some(format!(
            "Backend unreachable ({status_code}). Hint: check that the backend server is running"
        )),
        _ => None,
    }
}
