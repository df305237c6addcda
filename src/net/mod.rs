//! Network layer: allow-list gate, secure fetch wrapper, postgres targets.
//!
//! The crate never opens a socket. The embedder supplies a raw transport
//! callback and the gate wraps it so that every request, including every
//! redirect hop, is checked against the configuration first.

pub mod gate;
pub mod postgres;

pub use gate::{secure_fetch, secure_fetch_fn, validate_config, FetchOptions};
pub use postgres::{resolve_postgres_target, PostgresEntry, PostgresTarget};

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub const DEFAULT_MAX_REDIRECTS: usize = 20;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// HTTP methods the gate can admit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
}

impl HttpMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            "PATCH" => Some(Self::Patch),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response handed back by the raw transport.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub url: String,
}

/// The raw transport: url, method, headers, body.
pub type FetchFn = Arc<
    dyn Fn(
            String,
            String,
            HashMap<String, String>,
            Option<String>,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, String>> + Send>>
        + Send
        + Sync,
>;

/// Optional override predicate: `{method, url}` in, verdict out. When
/// configured its answer is authoritative and the allow-list is skipped.
pub type AllowPredicate = Arc<
    dyn Fn(String, String) -> Pin<Box<dyn Future<Output = Result<bool, String>> + Send>>
        + Send
        + Sync,
>;

/// Gate configuration.
#[derive(Clone, Default)]
pub struct NetworkConfig {
    /// Full-origin prefixes, optionally with a path prefix.
    pub allowed_url_prefixes: Vec<String>,
    /// None means the default {GET, HEAD}.
    pub allowed_methods: Option<Vec<HttpMethod>>,
    pub dangerously_allow_full_internet_access: bool,
    pub max_redirects: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub max_response_size: Option<usize>,
    pub is_allowed: Option<AllowPredicate>,
    pub allowed_postgres_hosts: Vec<PostgresEntry>,
}

impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("allowed_url_prefixes", &self.allowed_url_prefixes)
            .field("allowed_methods", &self.allowed_methods)
            .field(
                "dangerously_allow_full_internet_access",
                &self.dangerously_allow_full_internet_access,
            )
            .field("max_redirects", &self.max_redirects)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_response_size", &self.max_response_size)
            .field("is_allowed", &self.is_allowed.as_ref().map(|_| "<predicate>"))
            .field("allowed_postgres_hosts", &self.allowed_postgres_hosts.len())
            .finish()
    }
}

/// Errors the gate can produce. curl translates these to its numeric
/// exit codes; other callers surface the message.
#[derive(Debug, Clone)]
pub enum NetError {
    AccessDenied { url: String },
    MethodNotAllowed { method: String, allowed: Vec<String> },
    RedirectNotAllowed { url: String },
    TooManyRedirects { max: usize },
    ResponseTooLarge { limit: usize },
    Timeout { ms: u64 },
    Transport { message: String },
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessDenied { url } => {
                write!(f, "Network access denied: URL not in allow-list: {}", url)
            }
            Self::MethodNotAllowed { method, allowed } => write!(
                f,
                "HTTP method '{}' not allowed. Allowed methods: {}",
                method,
                allowed.join(", ")
            ),
            Self::RedirectNotAllowed { url } => {
                write!(f, "Redirect target not in allow-list: {}", url)
            }
            Self::TooManyRedirects { max } => write!(f, "Too many redirects (max: {})", max),
            Self::ResponseTooLarge { limit } => {
                write!(f, "Response exceeds maximum size of {} bytes", limit)
            }
            Self::Timeout { ms } => write!(f, "Request timed out after {} ms", ms),
            Self::Transport { message } => write!(f, "Fetch error: {}", message),
        }
    }
}

impl std::error::Error for NetError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_round_trip() {
        for name in ["GET", "HEAD", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"] {
            let m = HttpMethod::parse(name).unwrap();
            assert_eq!(m.as_str(), name);
        }
        assert_eq!(HttpMethod::parse("get"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("TRACE"), None);
    }

    #[test]
    fn test_error_display() {
        let e = NetError::AccessDenied { url: "https://evil.com/".into() };
        assert!(e.to_string().contains("Network access denied"));
        let e = NetError::MethodNotAllowed {
            method: "POST".into(),
            allowed: vec!["GET".into(), "HEAD".into()],
        };
        assert!(e.to_string().contains("GET, HEAD"));
        let e = NetError::Timeout { ms: 30_000 };
        assert!(e.to_string().contains("30000"));
    }

    #[test]
    fn test_config_defaults() {
        let c = NetworkConfig::default();
        assert!(c.allowed_url_prefixes.is_empty());
        assert!(c.allowed_methods.is_none());
        assert!(!c.dangerously_allow_full_internet_access);
        assert!(c.is_allowed.is_none());
    }
}
