//! Client IP extraction from HTTP headers and the socket remote address
//!
//! Sources are read in a fixed order and every valid address is kept:
//! - `X-Real-IP` (single value set by a fronting proxy)
//! - `X-Forwarded-For` (comma-separated proxy chain, left to right)
//! - the transport remote address (`host:port`)

use axum::http::HeaderMap;
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

const REAL_IP_HEADER: &str = "x-real-ip";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Where an address was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpSource {
    RealIp,
    ForwardedFor,
    RemoteAddr,
}

impl IpSource {
    pub fn label(self) -> &'static str {
        match self {
            IpSource::RealIp => "real ip",
            IpSource::ForwardedFor => "forwarded for",
            IpSource::RemoteAddr => "ip from remote addr",
        }
    }
}

impl fmt::Display for IpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpFinding {
    pub source: IpSource,
    pub address: IpAddr,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IpResolutionError {
    #[error("no valid ip found")]
    NoValidIp,
}

/// Collect all valid client addresses from a request
///
/// # Arguments
/// * `headers` - HTTP request headers
/// * `remote_addr` - The transport remote address, as `host:port`
///
/// # Returns
/// Findings ordered real ip, forwarded for (chain order), remote addr.
/// Fails when no source yields a valid address.
pub fn resolve(
    headers: &HeaderMap,
    remote_addr: &str,
) -> Result<Vec<IpFinding>, IpResolutionError> {
    let mut findings = Vec::new();

    if let Some(address) = header_str(headers, REAL_IP_HEADER).and_then(parse_ip) {
        findings.push(IpFinding {
            source: IpSource::RealIp,
            address,
        });
    }

    if let Some(chain) = header_str(headers, FORWARDED_FOR_HEADER) {
        findings.extend(chain.split(',').filter_map(parse_ip).map(|address| IpFinding {
            source: IpSource::ForwardedFor,
            address,
        }));
    }

    if let Some(address) = split_host_port(remote_addr).and_then(parse_ip) {
        findings.push(IpFinding {
            source: IpSource::RemoteAddr,
            address,
        });
    }

    if findings.is_empty() {
        return Err(IpResolutionError::NoValidIp);
    }

    Ok(findings)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse::<IpAddr>().ok()
}

/// Split `host:port` or `[host]:port` and return the host part.
/// The port must be present but is not validated as a number.
fn split_host_port(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        after.strip_prefix(':')?;
        return Some(host);
    }

    let (host, port) = addr.rsplit_once(':')?;
    // An unbracketed host may not contain another colon (bare IPv6 without port)
    if host.contains(':') || port.contains(':') {
        return None;
    }
    Some(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn finding(source: IpSource, address: &str) -> IpFinding {
        IpFinding {
            source,
            address: ip(address),
        }
    }

    #[test]
    fn test_remote_addr_only() {
        let headers = HeaderMap::new();

        let result = resolve(&headers, "192.168.1.1:52314").unwrap();
        assert_eq!(result, vec![finding(IpSource::RemoteAddr, "192.168.1.1")]);
    }

    #[test]
    fn test_full_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.5"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.9, not-an-ip, 10.0.0.1"),
        );

        let result = resolve(&headers, "127.0.0.1:12345").unwrap();
        assert_eq!(
            result,
            vec![
                finding(IpSource::RealIp, "203.0.113.5"),
                finding(IpSource::ForwardedFor, "198.51.100.9"),
                finding(IpSource::ForwardedFor, "10.0.0.1"),
                finding(IpSource::RemoteAddr, "127.0.0.1"),
            ]
        );
    }

    #[test]
    fn test_invalid_forwarded_tokens_are_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("garbage,,2001:db8::1, 999.1.1.1 ,198.51.100.1"),
        );

        let result = resolve(&headers, "not an address").unwrap();
        assert_eq!(
            result,
            vec![
                finding(IpSource::ForwardedFor, "2001:db8::1"),
                finding(IpSource::ForwardedFor, "198.51.100.1"),
            ]
        );
    }

    #[test]
    fn test_invalid_real_ip_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("localhost"));

        let result = resolve(&headers, "10.1.2.3:80").unwrap();
        assert_eq!(result, vec![finding(IpSource::RemoteAddr, "10.1.2.3")]);
    }

    #[test]
    fn test_ipv6_remote_addr() {
        let headers = HeaderMap::new();

        let result = resolve(&headers, "[2001:db8::5]:443").unwrap();
        assert_eq!(result, vec![finding(IpSource::RemoteAddr, "2001:db8::5")]);
    }

    #[test]
    fn test_no_valid_ip() {
        let headers = HeaderMap::new();

        assert_eq!(
            resolve(&headers, "unparsable"),
            Err(IpResolutionError::NoValidIp)
        );
    }

    #[test]
    fn test_remote_addr_without_port_is_rejected() {
        let headers = HeaderMap::new();

        assert!(resolve(&headers, "10.0.0.1").is_err());
        assert!(resolve(&headers, "2001:db8::1").is_err());
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("1.2.3.4:80"), Some("1.2.3.4"));
        assert_eq!(split_host_port("[::1]:8080"), Some("::1"));
        assert_eq!(split_host_port("example.com:80"), Some("example.com"));
        assert_eq!(split_host_port("[::1]"), None);
        assert_eq!(split_host_port("::1"), None);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(IpSource::RealIp.to_string(), "real ip");
        assert_eq!(IpSource::ForwardedFor.to_string(), "forwarded for");
        assert_eq!(IpSource::RemoteAddr.to_string(), "ip from remote addr");
    }
}
