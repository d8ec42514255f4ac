//! HTTP transport for liveness probes.

use std::time::Duration;

use reqwest::redirect::Policy;

// Per-attempt bound; a redirect chain gets this budget per hop, not in total.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The two facts the redirect loop needs from a response.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub location: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("connection failed: {0}")]
    Connection(String),
}

/// One GET with auto-redirect disabled; the check loop follows `Location`
/// itself. Swapped for a scripted double in tests.
pub trait HttpTransport {
    async fn get(&self, url: &str) -> Result<ProbeResponse, TransportError>;
}

/// Production transport over a single reqwest client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Certificate errors are tolerated: a self-signed target still counts
    /// as alive.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(crate::USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<ProbeResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connection(e.to_string())
            } else {
                TransportError::Http(e)
            }
        })?;

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            location,
        })
    }
}
