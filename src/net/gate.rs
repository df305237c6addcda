//! The allow-list gate and the secure fetch wrapper.
//!
//! Admission algorithm, applied to the initial request and again to every
//! redirect hop:
//!
//! 1. `dangerously_allow_full_internet_access` admits everything.
//! 2. A configured `is_allowed` predicate is authoritative.
//! 3. Otherwise the URL must be absolute http(s) and its normalized
//!    `origin + path` must start with an allow-list entry.
//! 4. The method must be in `allowed_methods` (default GET, HEAD).

use std::collections::HashMap;
use std::time::Duration;

use super::{
    FetchFn, HttpMethod, HttpResponse, NetError, NetworkConfig, DEFAULT_MAX_REDIRECTS,
    DEFAULT_MAX_RESPONSE_SIZE, DEFAULT_TIMEOUT_MS,
};

const REDIRECT_CODES: &[u16] = &[301, 302, 303, 307, 308];
const BODYLESS_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS"];

struct UrlParts {
    origin: String,
    pathname: String,
}

/// Split an absolute http(s) URL into origin and path, eliding default
/// ports and dropping query/fragment.
fn split_url(url: &str) -> Option<UrlParts> {
    let scheme_end = url.find("://")?;
    let scheme = &url[..scheme_end];
    let rest = &url[scheme_end + 3..];
    let (mut authority, pathname) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, "/"),
    };
    if authority.is_empty() {
        return None;
    }
    // Default ports are elided so ":443" and no port compare equal.
    let default_port = match scheme {
        "http" => ":80",
        "https" => ":443",
        _ => "",
    };
    if !default_port.is_empty() {
        if let Some(stripped) = authority.strip_suffix(default_port) {
            authority = stripped;
        }
    }
    let pathname = pathname.split(['?', '#']).next().unwrap_or("/");
    Some(UrlParts {
        origin: format!("{}://{}", scheme, authority),
        pathname: pathname.to_string(),
    })
}

/// Match a URL against one allow-list entry: exact origin, path prefix.
fn matches_entry(url: &str, entry: &str) -> bool {
    let (u, e) = match (split_url(url), split_url(entry)) {
        (Some(u), Some(e)) => (u, e),
        _ => return false,
    };
    if u.origin != e.origin {
        return false;
    }
    if e.pathname == "/" || e.pathname.is_empty() {
        return true;
    }
    u.pathname.starts_with(&e.pathname)
}

fn url_in_allow_list(url: &str, prefixes: &[String]) -> bool {
    !prefixes.is_empty() && prefixes.iter().any(|entry| matches_entry(url, entry))
}

fn is_http_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Validate the configuration; returns one message per bad entry.
pub fn validate_config(config: &NetworkConfig) -> Vec<String> {
    let mut errors = Vec::new();
    for entry in &config.allowed_url_prefixes {
        if !is_http_scheme(entry) {
            errors.push(format!(
                "Only http and https URLs are allowed in allow-list: \"{}\"",
                entry
            ));
            continue;
        }
        if split_url(entry).is_none() {
            errors.push(format!(
                "Allow-list entry must include a hostname: \"{}\"",
                entry
            ));
            continue;
        }
        if entry.contains('?') || entry.contains('#') {
            errors.push(format!(
                "Query strings and fragments are ignored in allow-list entries: \"{}\"",
                entry
            ));
        }
    }
    errors
}

async fn check_request(config: &NetworkConfig, url: &str, method: &str) -> Result<(), NetError> {
    if config.dangerously_allow_full_internet_access {
        return Ok(());
    }
    if let Some(predicate) = &config.is_allowed {
        // The predicate replaces the prefix list, not the method gate.
        let verdict = predicate(method.to_string(), url.to_string())
            .await
            .map_err(|message| NetError::Transport { message })?;
        if !verdict {
            return Err(NetError::AccessDenied { url: url.to_string() });
        }
        return check_method(config, method);
    }
    if !is_http_scheme(url) || !url_in_allow_list(url, &config.allowed_url_prefixes) {
        return Err(NetError::AccessDenied { url: url.to_string() });
    }
    check_method(config, method)?;
    Ok(())
}

fn check_method(config: &NetworkConfig, method: &str) -> Result<(), NetError> {
    let allowed: Vec<String> = config
        .allowed_methods
        .clone()
        .unwrap_or_else(|| vec![HttpMethod::Get, HttpMethod::Head])
        .iter()
        .map(|m| m.as_str().to_string())
        .collect();
    let upper = method.to_uppercase();
    if allowed.iter().any(|m| *m == upper) {
        Ok(())
    } else {
        Err(NetError::MethodNotAllowed { method: upper, allowed })
    }
}

/// Resolve a `Location` header value against the URL that produced it.
fn resolve_redirect(base: &str, location: &str) -> String {
    if is_http_scheme(location) {
        return location.to_string();
    }
    let origin = match split_url(base) {
        Some(parts) => parts.origin,
        None => return location.to_string(),
    };
    if location.starts_with('/') {
        return format!("{}{}", origin, location);
    }
    let parts = split_url(base).map(|p| p.pathname).unwrap_or_else(|| "/".to_string());
    let dir = match parts.rfind('/') {
        Some(pos) => &parts[..pos],
        None => "",
    };
    format!("{}{}/{}", origin, dir, location)
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub body: Option<String>,
    pub follow_redirects: Option<bool>,
}

/// Fetch through the gate: admission check, redirect re-checks, response
/// size cap, and an overall deadline covering every hop.
pub async fn secure_fetch(
    config: &NetworkConfig,
    transport: &FetchFn,
    url: &str,
    options: FetchOptions,
) -> Result<HttpResponse, NetError> {
    let timeout_ms = config.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
    match tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        fetch_with_redirects(config, transport, url, options),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(NetError::Timeout { ms: timeout_ms }),
    }
}

async fn fetch_with_redirects(
    config: &NetworkConfig,
    transport: &FetchFn,
    url: &str,
    options: FetchOptions,
) -> Result<HttpResponse, NetError> {
    let method = options.method.as_deref().unwrap_or("GET").to_uppercase();
    let max_redirects = config.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS);
    let max_size = config.max_response_size.unwrap_or(DEFAULT_MAX_RESPONSE_SIZE);
    let follow = options.follow_redirects.unwrap_or(true);

    check_request(config, url, &method).await?;

    let mut current = url.to_string();
    let mut hops = 0usize;
    loop {
        let headers = options.headers.clone().unwrap_or_default();
        let body = if BODYLESS_METHODS.contains(&method.as_str()) {
            None
        } else {
            options.body.clone()
        };
        let response = transport(current.clone(), method.clone(), headers, body)
            .await
            .map_err(|message| NetError::Transport { message })?;

        if follow && REDIRECT_CODES.contains(&response.status) {
            if let Some(location) = response
                .headers
                .get("location")
                .or_else(|| response.headers.get("Location"))
            {
                let next = resolve_redirect(&current, location);
                hops += 1;
                if hops > max_redirects {
                    return Err(NetError::TooManyRedirects { max: max_redirects });
                }
                // Each hop faces the gate again.
                if let Err(err) = check_request(config, &next, &method).await {
                    return Err(match err {
                        NetError::AccessDenied { url } => NetError::RedirectNotAllowed { url },
                        other => other,
                    });
                }
                current = next;
                continue;
            }
        }

        if response.body.len() > max_size {
            return Err(NetError::ResponseTooLarge { limit: max_size });
        }
        return Ok(response);
    }
}

/// Wrap a raw transport into a transport that enforces the gate. The
/// result has the same shape, so commands cannot tell them apart.
pub fn secure_fetch_fn(config: NetworkConfig, transport: FetchFn) -> FetchFn {
    use std::sync::Arc;
    Arc::new(move |url, method, headers, body| {
        let config = config.clone();
        let transport = transport.clone();
        Box::pin(async move {
            let options = FetchOptions {
                method: Some(method),
                headers: Some(headers),
                body,
                follow_redirects: Some(true),
            };
            secure_fetch(&config, &transport, &url, options)
                .await
                .map_err(|e| e.to_string())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn transport_returning(responses: Vec<HttpResponse>) -> FetchFn {
        let calls = Arc::new(AtomicUsize::new(0));
        Arc::new(move |url, _method, _headers, _body| {
            let responses = responses.clone();
            let calls = calls.clone();
            Box::pin(async move {
                let i = calls.fetch_add(1, Ordering::SeqCst);
                let mut r = responses
                    .get(i.min(responses.len() - 1))
                    .cloned()
                    .unwrap_or_default();
                r.url = url;
                Ok(r)
            })
        })
    }

    fn ok_response(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            status_text: "OK".into(),
            body: body.into(),
            ..Default::default()
        }
    }

    fn redirect_to(location: &str) -> HttpResponse {
        let mut headers = HashMap::new();
        headers.insert("location".to_string(), location.to_string());
        HttpResponse { status: 302, status_text: "Found".into(), headers, ..Default::default() }
    }

    fn config_allowing(prefixes: &[&str]) -> NetworkConfig {
        NetworkConfig {
            allowed_url_prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_split_url_elides_default_ports() {
        assert_eq!(split_url("https://h.com:443/a").unwrap().origin, "https://h.com");
        assert_eq!(split_url("http://h.com:80/a").unwrap().origin, "http://h.com");
        assert_eq!(split_url("http://h.com:8080/a").unwrap().origin, "http://h.com:8080");
    }

    #[test]
    fn test_matches_entry() {
        assert!(matches_entry("https://api.example.com/v1/x", "https://api.example.com"));
        assert!(matches_entry("https://api.example.com/v1/x", "https://api.example.com/v1"));
        assert!(!matches_entry("https://api.example.com/v2", "https://api.example.com/v1"));
        assert!(!matches_entry("https://other.com/v1", "https://api.example.com"));
        assert!(!matches_entry("ftp://api.example.com/v1", "https://api.example.com"));
    }

    #[test]
    fn test_validate_config() {
        let mut c = NetworkConfig::default();
        c.allowed_url_prefixes = vec!["https://ok.com".into(), "gopher://bad".into(), "https://q.com?x=1".into()];
        let errors = validate_config(&c);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("http and https"));
        assert!(errors[1].contains("Query strings"));
    }

    #[tokio::test]
    async fn test_fetch_allowed() {
        let config = config_allowing(&["https://api.example.com"]);
        let transport = transport_returning(vec![ok_response("hello")]);
        let r = secure_fetch(&config, &transport, "https://api.example.com/data", FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(r.body, "hello");
    }

    #[tokio::test]
    async fn test_fetch_denied() {
        let config = config_allowing(&["https://api.example.com"]);
        let transport = transport_returning(vec![ok_response("x")]);
        let err = secure_fetch(&config, &transport, "https://evil.com/", FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_method_gate() {
        let config = config_allowing(&["https://api.example.com"]);
        let transport = transport_returning(vec![ok_response("x")]);
        let err = secure_fetch(
            &config,
            &transport,
            "https://api.example.com/",
            FetchOptions { method: Some("POST".into()), ..Default::default() },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NetError::MethodNotAllowed { .. }));

        let mut config = config_allowing(&["https://api.example.com"]);
        config.allowed_methods = Some(vec![HttpMethod::Get, HttpMethod::Post]);
        secure_fetch(
            &config,
            &transport,
            "https://api.example.com/",
            FetchOptions { method: Some("POST".into()), ..Default::default() },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_redirect_followed_when_allowed() {
        let config = config_allowing(&["https://api.example.com"]);
        let transport = transport_returning(vec![
            redirect_to("https://api.example.com/next"),
            ok_response("after redirect"),
        ]);
        let r = secure_fetch(&config, &transport, "https://api.example.com/", FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(r.body, "after redirect");
    }

    #[tokio::test]
    async fn test_redirect_to_denied_origin() {
        let config = config_allowing(&["https://api.example.com"]);
        let transport = transport_returning(vec![redirect_to("https://evil.com/steal")]);
        let err = secure_fetch(&config, &transport, "https://api.example.com/", FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::RedirectNotAllowed { .. }));
    }

    #[tokio::test]
    async fn test_redirect_relative_location() {
        let config = config_allowing(&["https://api.example.com"]);
        let transport = transport_returning(vec![redirect_to("/moved"), ok_response("done")]);
        let r = secure_fetch(&config, &transport, "https://api.example.com/old", FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(r.url, "https://api.example.com/moved");
    }

    #[tokio::test]
    async fn test_too_many_redirects() {
        let mut config = config_allowing(&["https://api.example.com"]);
        config.max_redirects = Some(3);
        let transport = transport_returning(vec![redirect_to("https://api.example.com/loop")]);
        let err = secure_fetch(&config, &transport, "https://api.example.com/", FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::TooManyRedirects { max: 3 }));
    }

    #[tokio::test]
    async fn test_response_size_cap() {
        let mut config = config_allowing(&["https://api.example.com"]);
        config.max_response_size = Some(4);
        let transport = transport_returning(vec![ok_response("too large")]);
        let err = secure_fetch(&config, &transport, "https://api.example.com/", FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::ResponseTooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn test_full_access_bypasses_everything() {
        let config = NetworkConfig {
            dangerously_allow_full_internet_access: true,
            ..Default::default()
        };
        let transport = transport_returning(vec![ok_response("open")]);
        let r = secure_fetch(
            &config,
            &transport,
            "https://anywhere.example/",
            FetchOptions { method: Some("DELETE".into()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(r.body, "open");
    }

    #[tokio::test]
    async fn test_predicate_is_authoritative() {
        let mut config = config_allowing(&[]);
        config.is_allowed = Some(Arc::new(|method, url| {
            Box::pin(async move { Ok(method == "GET" && url.contains("good")) })
        }));
        let transport = transport_returning(vec![ok_response("via predicate")]);
        let r = secure_fetch(&config, &transport, "https://good.example/", FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(r.body, "via predicate");
        let err = secure_fetch(&config, &transport, "https://bad.example/", FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut config = config_allowing(&["https://api.example.com"]);
        config.timeout_ms = Some(20);
        let transport: FetchFn = Arc::new(|_url, _m, _h, _b| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(HttpResponse::default())
            })
        });
        let err = secure_fetch(&config, &transport, "https://api.example.com/", FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::Timeout { ms: 20 }));
    }
}
