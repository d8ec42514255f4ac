//! Address-space classification and DNS resolution for the validator.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const DNS_LOOKUP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Forward DNS lookup behind a trait so tests can script resolution
/// instead of hitting a real resolver.
pub trait DnsResolver {
    async fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// Production resolver using tokio's async DNS lookup.
pub struct TokioDnsResolver;

impl DnsResolver for TokioDnsResolver {
    async fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::time::timeout(DNS_LOOKUP_TIMEOUT, tokio::net::lookup_host((host, 0)))
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "DNS lookup timed out")
            })??;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// Whether `ip` falls in private, loopback, link-local, or otherwise
/// IANA-reserved space — anything a liveness probe must not contact.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || in_zero_net(v4)
                || in_cgn_range(v4)
                || in_class_e(v4)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || in_v6_link_local(&v6)
                || in_v6_unique_local(&v6)
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_or_reserved(IpAddr::V4(v4)))
        }
    }
}

// 0.0.0.0/8, "this network"
fn in_zero_net(v4: Ipv4Addr) -> bool {
    v4.octets()[0] == 0
}

// 100.64.0.0/10, carrier-grade NAT (RFC 6598)
fn in_cgn_range(v4: Ipv4Addr) -> bool {
    let octets = v4.octets();
    octets[0] == 100 && (64..=127).contains(&octets[1])
}

// 240.0.0.0/4, reserved; subsumes the broadcast address
fn in_class_e(v4: Ipv4Addr) -> bool {
    v4.octets()[0] >= 240
}

fn in_v6_link_local(v6: &Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xffc0) == 0xfe80
}

fn in_v6_unique_local(v6: &Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xfe00) == 0xfc00
}
