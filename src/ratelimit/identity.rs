//! Client identity derivation from request headers.
//!
//! The identifier is taken from reverse-proxy headers in this order:
//!
//! 1. the first comma-separated value of `x-forwarded-for`
//! 2. `x-real-ip`
//! 3. the loopback literal `127.0.0.1`
//!
//! Header values are used verbatim (trimmed) and are not parsed as IP
//! addresses. Any client that can reach the service without going through
//! a proxy that overwrites these headers can choose its own identity, so
//! this is a best-effort key and not an authentication mechanism.

use std::collections::HashMap;

/// Header carrying the proxy chain, client first.
pub const FORWARDED_FOR: &str = "x-forwarded-for";
/// Header carrying the client address as seen by the proxy.
pub const REAL_IP: &str = "x-real-ip";
/// Identifier used when neither header is present.
pub const LOOPBACK: &str = "127.0.0.1";

/// Anything a client identifier can be derived from.
pub trait RequestContext {
    /// Look up a header by its lowercase name.
    fn header(&self, name: &str) -> Option<&str>;
}

impl RequestContext for http::HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

impl RequestContext for tonic::metadata::MetadataMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

impl RequestContext for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Derive the client identifier for a request.
///
/// Empty header values are treated as absent.
pub fn client_identifier<C: RequestContext + ?Sized>(ctx: &C) -> String {
    if let Some(forwarded) = ctx.header(FORWARDED_FOR) {
        if let Some(first) = forwarded.split(',').next().map(str::trim) {
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = ctx.header(REAL_IP).map(str::trim) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    LOOPBACK.to_string()
}
