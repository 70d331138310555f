//! Where prescriptions come from.
//!
//! The clinic backend owns prescriptions; the reminder core only reads
//! them. Fetch failures are not fatal: `ReminderService::sync` keeps
//! working from the last snapshot it stored.

use std::time::Duration;

use thiserror::Error;

use crate::models::Prescription;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Cannot reach prescription service at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Prescription service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid prescription payload: {0}")]
    Decode(String),
}

/// Supplies the active prescription list.
pub trait PrescriptionSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<Prescription>, SourceError>;
}

/// REST client for `GET {base_url}/prescriptions`.
///
/// Uses the blocking client; call it from `spawn_blocking` inside tokio.
pub struct RestPrescriptionSource {
    base_url: String,
    client: reqwest::blocking::Client,
    bearer_token: Option<String>,
    timeout_secs: u64,
}

impl RestPrescriptionSource {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SourceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            bearer_token: None,
            timeout_secs,
        })
    }

    /// Token obtained by the host application's login flow.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/prescriptions", self.base_url)
    }
}

impl PrescriptionSource for RestPrescriptionSource {
    fn fetch(&self) -> Result<Vec<Prescription>, SourceError> {
        let url = self.endpoint();
        let mut request = self.client.get(&url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                SourceError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                SourceError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                SourceError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SourceError::Status { status: status.as_u16(), body });
        }

        let prescriptions: Vec<Prescription> =
            response.json().map_err(|e| SourceError::Decode(e.to_string()))?;
        tracing::debug!(count = prescriptions.len(), "Fetched prescriptions");
        Ok(prescriptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_object_safe() {
        fn _assert_source(_: &dyn PrescriptionSource) {}
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let source = RestPrescriptionSource::new("http://clinic.local/api/", 5).unwrap();
        assert_eq!(source.endpoint(), "http://clinic.local/api/prescriptions");
    }

    #[test]
    fn unreachable_service_is_an_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let source = RestPrescriptionSource::new("http://127.0.0.1:9", 2).unwrap();
        assert!(source.fetch().is_err());
    }

    #[test]
    fn status_error_message() {
        let err = SourceError::Status { status: 503, body: "maintenance".into() };
        assert_eq!(err.to_string(), "Prescription service returned 503: maintenance");
    }
}
