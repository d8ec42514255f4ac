//! URL validation: decomposition, protocol allow-list, private-host rejection.

pub mod addr;

use std::net::IpAddr;

use tracing::{debug, warn};

use addr::{DnsResolver, TokioDnsResolver};

const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

/// Why a string could not be decomposed into usable URL components.
#[derive(Debug, thiserror::Error)]
pub enum UrlError {
    #[error("url is empty")]
    Empty,

    #[error("url does not parse: {0}")]
    Parse(#[from] url::ParseError),

    #[error("url does not contain a hostname")]
    MissingHost,
}

/// Cleaned scheme and host of a parsed URL. [`UrlComponents::decompose`] is
/// the only constructor, so an instance always carries both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlComponents {
    scheme: String,
    host: String,
}

impl UrlComponents {
    fn decompose(raw: &str) -> Result<Self, UrlError> {
        if raw.is_empty() {
            return Err(UrlError::Empty);
        }

        let parsed = url::Url::parse(raw)?;

        // The parser keeps [ ] around IPv6 literals; the classifier wants
        // the bare address.
        let host = match parsed.host_str() {
            Some(h) if !h.is_empty() => h.trim_matches(['[', ']']).to_string(),
            _ => return Err(UrlError::MissingHost),
        };

        Ok(Self {
            scheme: parsed.scheme().to_string(),
            host,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Validation knobs, fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationConfig {
    /// Treat hosts resolving to private/loopback/reserved ranges as invalid.
    pub reject_local_hosts: bool,
}

pub struct UrlValidator<R = TokioDnsResolver> {
    config: ValidationConfig,
    resolver: R,
}

impl UrlValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self::with_resolver(config, TokioDnsResolver)
    }
}

impl<R: DnsResolver> UrlValidator<R> {
    pub fn with_resolver(config: ValidationConfig, resolver: R) -> Self {
        Self { config, resolver }
    }

    /// Whether `url` is a well-formed http(s) URL that the current config
    /// allows to be contacted. Never fails: every error collapses to `false`.
    pub async fn is_valid(&self, url: &str) -> bool {
        let components = match UrlComponents::decompose(url) {
            Ok(c) => c,
            Err(e) => {
                debug!(url, error = %e, "url failed to decompose");
                return false;
            }
        };

        if !ALLOWED_SCHEMES.contains(&components.scheme()) {
            debug!(url, scheme = components.scheme(), "protocol not allowed");
            return false;
        }

        if self.config.reject_local_hosts && self.is_local(components.host()).await {
            warn!(url, host = components.host(), "url targets private/reserved address space");
            return false;
        }

        true
    }

    /// Whether `host` (a literal IP or a hostname) lands in private/reserved
    /// address space. A name that does not resolve counts as not local.
    pub async fn is_local(&self, host: &str) -> bool {
        let addrs = if let Ok(ip) = host.parse::<IpAddr>() {
            vec![ip]
        } else {
            // Trailing dot marks the name fully qualified so the resolver
            // skips its search-suffix list.
            match self.resolver.resolve(&format!("{host}.")).await {
                Ok(addrs) => addrs,
                Err(e) => {
                    debug!(host, error = %e, "resolution failed, treating host as public");
                    return false;
                }
            }
        };

        addrs.into_iter().any(addr::is_private_or_reserved)
    }
}
