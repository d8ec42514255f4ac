//! Liveness checks with per-hop redirect re-validation.
//!
//! Auto-following at the transport level would let an attacker-controlled
//! 3xx response point the probe at an internal host. The loop here follows
//! `Location` manually and re-runs full validation before every hop.

pub mod transport;

use tracing::debug;

use crate::validate::addr::{DnsResolver, TokioDnsResolver};
use crate::validate::{UrlValidator, ValidationConfig};
use transport::{HttpTransport, ProbeResponse, ReqwestTransport, TransportError};

/// Hop budget per check; a chain longer than this is judged by the status
/// of the last hop that was actually fetched.
const MAX_REDIRECTS: u32 = 5;

pub struct Pinger<T = ReqwestTransport, R = TokioDnsResolver> {
    transport: T,
    validator: UrlValidator<R>,
}

impl Pinger {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self::with_parts(ReqwestTransport::new()?, TokioDnsResolver))
    }
}

impl<T: HttpTransport, R: DnsResolver> Pinger<T, R> {
    /// The probe side always refuses private targets, whatever the
    /// caller-facing validation default is.
    pub fn with_parts(transport: T, resolver: R) -> Self {
        Self {
            transport,
            validator: UrlValidator::with_resolver(
                ValidationConfig {
                    reject_local_hosts: true,
                },
                resolver,
            ),
        }
    }

    /// Whether `url` responds to a GET with a non-error status, following at
    /// most [`MAX_REDIRECTS`] hops. Every failure mode is a `false` verdict;
    /// nothing escapes.
    pub async fn check(&self, url: &str) -> bool {
        let original_url = url;
        let mut current = url.to_string();
        let mut hops_left = MAX_REDIRECTS;

        let last = loop {
            debug!(url = %current, original_url, "checking url");

            if !self.validator.is_valid(&current).await {
                debug!(url = %current, original_url, "url is not valid");
                return false;
            }

            debug!(url = %current, "doing a call");
            let response = match self.transport.get(&current).await {
                Ok(r) => r,
                Err(e) => {
                    debug!(url = %current, error = %e, "GET call failed");
                    return false;
                }
            };

            hops_left -= 1;

            match redirect_target(&response) {
                Some(next) if hops_left > 0 => {
                    debug!(url = %current, new_url = %next, original_url, "redirect detected");
                    current = next;
                }
                _ => break response,
            }
        };

        let online = (200..400).contains(&last.status);
        if online {
            debug!(url = %current, status = last.status, "url response success");
        } else {
            debug!(url = %current, status = last.status, "url response failure");
        }

        online
    }
}

/// A usable redirect target: present and non-empty after trimming.
fn redirect_target(response: &ProbeResponse) -> Option<String> {
    response
        .location
        .as_deref()
        .map(str::trim)
        .filter(|loc| !loc.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::net::IpAddr;
    use std::sync::Mutex;

    use super::*;

    /// Responses handed out in request order, like a scripted adapter.
    struct ScriptedTransport(Mutex<VecDeque<Result<ProbeResponse, TransportError>>>);

    impl ScriptedTransport {
        fn new(responses: Vec<Result<ProbeResponse, TransportError>>) -> Self {
            Self(Mutex::new(responses.into()))
        }

        fn remaining(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    impl HttpTransport for &ScriptedTransport {
        async fn get(&self, _url: &str) -> Result<ProbeResponse, TransportError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left")
        }
    }

    /// `localhost` resolves to loopback, everything else to a public address.
    struct TestDns;

    impl DnsResolver for TestDns {
        async fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
            Ok(if host == "localhost." {
                vec!["127.0.0.1".parse().unwrap()]
            } else {
                vec!["142.250.74.35".parse().unwrap()]
            })
        }
    }

    fn status(code: u16) -> Result<ProbeResponse, TransportError> {
        Ok(ProbeResponse {
            status: code,
            location: None,
        })
    }

    fn redirect(code: u16, to: &str) -> Result<ProbeResponse, TransportError> {
        Ok(ProbeResponse {
            status: code,
            location: Some(to.to_string()),
        })
    }

    fn pinger(transport: &ScriptedTransport) -> Pinger<&ScriptedTransport, TestDns> {
        Pinger::with_parts(transport, TestDns)
    }

    #[tokio::test]
    async fn online_url_is_reported_alive() {
        let transport = ScriptedTransport::new(vec![status(200)]);
        assert!(pinger(&transport).check("http://somevalidurl.com").await);
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn not_found_is_reported_dead() {
        let transport = ScriptedTransport::new(vec![status(404)]);
        assert!(!pinger(&transport).check("http://somenonexistingurl.com").await);
    }

    #[tokio::test]
    async fn server_error_is_reported_dead() {
        let transport = ScriptedTransport::new(vec![status(500)]);
        assert!(!pinger(&transport).check("https://somenonexistingurl.com").await);
    }

    #[tokio::test]
    async fn redirect_to_localhost_is_blocked() {
        let transport = ScriptedTransport::new(vec![redirect(301, "http://localhost")]);
        assert!(
            !pinger(&transport).check("http://somerogueurl.com").await,
            "redirect into private space must not be followed"
        );
        assert_eq!(transport.remaining(), 0, "exactly one request, none to the target");
    }

    #[tokio::test]
    async fn redirect_to_private_ip_is_blocked() {
        let transport = ScriptedTransport::new(vec![redirect(302, "http://169.254.169.254/latest")]);
        assert!(!pinger(&transport).check("http://somerogueurl.com").await);
    }

    #[tokio::test]
    async fn redirect_to_public_host_is_followed() {
        let transport = ScriptedTransport::new(vec![
            redirect(301, "http://google.pl"),
            status(200),
        ]);
        assert!(pinger(&transport).check("http://redirectme.com/test").await);
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn redirect_chain_ending_not_found_is_dead() {
        let transport = ScriptedTransport::new(vec![
            redirect(302, "http://a.example"),
            redirect(302, "http://b.example"),
            status(404),
        ]);
        assert!(!pinger(&transport).check("http://redirectme.com").await);
    }

    #[tokio::test]
    async fn exhausted_hop_budget_is_judged_by_last_status() {
        let transport = ScriptedTransport::new(vec![
            redirect(301, "http://hop1.example"),
            redirect(301, "http://hop2.example"),
            redirect(301, "http://hop3.example"),
            redirect(301, "http://hop4.example"),
            redirect(301, "http://hop5.example"),
            status(200),
        ]);
        assert!(
            pinger(&transport).check("http://redirectme.com").await,
            "the fifth response is a 301, which is a non-error status"
        );
        assert_eq!(transport.remaining(), 1, "budget allows five requests");
    }

    #[tokio::test]
    async fn transport_failure_is_reported_dead() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Connection(
            "connection refused".into(),
        ))]);
        assert!(!pinger(&transport).check("http://somevalidurl.com").await);
    }

    #[tokio::test]
    async fn invalid_url_issues_no_request() {
        let transport = ScriptedTransport::new(vec![]);
        assert!(!pinger(&transport).check("ftp://example.com").await);
        assert!(!pinger(&transport).check("not a url").await);
    }

    #[tokio::test]
    async fn private_start_url_issues_no_request() {
        let transport = ScriptedTransport::new(vec![]);
        assert!(!pinger(&transport).check("http://127.0.0.1/secret").await);
        assert!(!pinger(&transport).check("http://localhost/secret").await);
    }

    #[tokio::test]
    async fn blank_location_is_not_a_redirect() {
        let transport = ScriptedTransport::new(vec![Ok(ProbeResponse {
            status: 301,
            location: Some("   ".into()),
        })]);
        assert!(
            pinger(&transport).check("http://somevalidurl.com").await,
            "no usable target, so the 301 itself is the verdict"
        );
    }
}
