//! Lazily created HTTP session shared by the network backends.

use crate::error::BackendError;
use reqwest::{Client, Response, StatusCode};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Owns a pooled [`Client`] that is built on first use, reused by later
/// calls and dropped by [`HttpSession::close`].
pub struct HttpSession {
    timeout: Duration,
    client: Mutex<Option<Client>>,
}

impl HttpSession {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Client>> {
        self.client.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the session client, creating it if needed.
    pub fn client(&self) -> Result<Client, BackendError> {
        let mut slot = self.slot();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        debug!("Opening HTTP session (timeout {:?})", self.timeout);
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| BackendError::unavailable(format!("Failed to build HTTP client: {}", e)))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drop the client. Returns true if a session was open.
    pub fn close(&self) -> bool {
        let closed = self.slot().take().is_some();
        if closed {
            debug!("Closed HTTP session");
        }
        closed
    }

    pub fn is_open(&self) -> bool {
        self.slot().is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Read the body of a provider response, mapping error statuses to the
/// backend error taxonomy.
pub async fn read_body(response: Response, provider: &str) -> Result<String, BackendError> {
    let status = response.status();
    let body = response.text().await.map_err(BackendError::from)?;
    debug!("{} response ({}): {}", provider, status, preview(&body));

    if status.is_success() {
        return Ok(body);
    }

    let message = format!("{} API error ({}): {}", provider, status, preview(&body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackendError::unavailable(message)),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            Err(BackendError::timeout(message))
        }
        _ => Err(BackendError::protocol(message)),
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_is_lazy_and_closable() {
        let session = HttpSession::new(Duration::from_secs(5));
        assert!(!session.is_open());
        assert!(!session.close());

        session.client().unwrap();
        assert!(session.is_open());
        session.client().unwrap();

        assert!(session.close());
        assert!(!session.close());
        assert!(!session.is_open());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(600);
        assert_eq!(preview(&long).chars().count(), 500);
        assert_eq!(preview("short"), "short");
    }
}
