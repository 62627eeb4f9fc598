//! Cookie jar persisted in the preferences store.
//!
//! The reissue endpoint authenticates with a session cookie, so cookies have
//! to survive restarts. Cookies are kept in memory for request matching and
//! written through the persist queue under the `Cookies` key as a set of
//! serialized `Set-Cookie` strings.

use cookie::time::{Duration, OffsetDateTime};
use cookie::Cookie;
use reqwest::header::HeaderValue;
use reqwest::Url;
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

use crate::storage::{PersistQueue, PreferenceKey};
use crate::traits::Preferences;

/// Serialized cookies, one `Set-Cookie` string each.
pub const COOKIES: PreferenceKey<BTreeSet<String>> = PreferenceKey::new("Cookies");

/// Cookie store shared by every HTTP client of a session.
#[derive(Debug)]
pub struct PreferencesCookieJar {
    cookies: RwLock<Vec<Cookie<'static>>>,
    queue: PersistQueue,
}

impl PreferencesCookieJar {
    /// Restore the jar from a preferences snapshot. Expired and unparsable
    /// entries are dropped.
    pub fn restore(prefs: &Preferences, queue: PersistQueue) -> Self {
        let now = OffsetDateTime::now_utc();
        let cookies: Vec<_> = COOKIES
            .read(prefs)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| match Cookie::parse(raw) {
                Ok(cookie) => Some(cookie),
                Err(e) => {
                    tracing::warn!("Dropping stored cookie that does not parse: {}", e);
                    None
                }
            })
            .filter(|cookie| !is_expired(cookie, now))
            .collect();

        tracing::debug!("Restored {} cookies", cookies.len());
        Self {
            cookies: RwLock::new(cookies),
            queue,
        }
    }

    /// Merge `Set-Cookie` values received from `url`.
    ///
    /// A cookie replaces a stored one with the same name, domain and path.
    /// Expired cookies and `Max-Age=0` remove the stored cookie.
    pub fn save_from_response<'a>(&self, url: &Url, set_cookies: impl IntoIterator<Item = &'a str>) {
        let now = OffsetDateTime::now_utc();
        let mut changed = false;
        let mut cookies = self
            .cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        for raw in set_cookies {
            let Some(cookie) = normalize(raw, url, now) else {
                continue;
            };
            cookies.retain(|stored| !same_cookie(stored, &cookie));
            if !is_expired(&cookie, now) {
                cookies.push(cookie);
            }
            changed = true;
        }

        if changed {
            cookies.retain(|cookie| !is_expired(cookie, now));
            let stored: BTreeSet<String> = cookies.iter().map(|c| c.to_string()).collect();
            drop(cookies);
            self.queue.enqueue(COOKIES, Some(&stored));
        }
    }

    /// Cookies to send with a request to `url`.
    pub fn load_for_request(&self, url: &Url) -> Vec<Cookie<'static>> {
        let now = OffsetDateTime::now_utc();
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|cookie| !is_expired(cookie, now) && matches_url(cookie, url))
            .cloned()
            .collect()
    }

    /// Serialized form of every cookie currently held.
    pub fn stored(&self) -> BTreeSet<String> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    /// Drop every cookie, in memory and on disk.
    pub fn clear(&self) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.queue.enqueue(COOKIES, None);
    }
}

impl reqwest::cookie::CookieStore for PreferencesCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let values = cookie_headers.filter_map(|value| value.to_str().ok());
        self.save_from_response(url, values);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .load_for_request(url)
            .iter()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

/// Parse a `Set-Cookie` value, fill in the defaults taken from the request
/// URL, and turn `Max-Age` into an absolute expiry.
fn normalize(raw: &str, url: &Url, now: OffsetDateTime) -> Option<Cookie<'static>> {
    let mut cookie = match Cookie::parse(raw.to_string()) {
        Ok(cookie) => cookie,
        Err(e) => {
            tracing::warn!("Ignoring malformed Set-Cookie from {}: {}", url, e);
            return None;
        }
    };

    let host = url.host_str()?.to_ascii_lowercase();
    let domain = cookie
        .domain()
        .map(|d| d.trim_start_matches('.').to_ascii_lowercase());
    match domain {
        Some(domain) if domain_matches(&host, &domain) => cookie.set_domain(domain),
        Some(domain) => {
            tracing::warn!("Rejecting cookie for {} set by {}", domain, host);
            return None;
        }
        None => cookie.set_domain(host),
    }
    if cookie.path().is_none() {
        cookie.set_path(default_path(url));
    }
    if let Some(max_age) = cookie.max_age() {
        cookie.set_expires(now + max_age);
        cookie.set_max_age(None::<Duration>);
    }
    Some(cookie)
}

/// Directory of the request path, per RFC 6265 section 5.1.4.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// RFC 6265 section 5.1.3 domain matching.
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn same_cookie(a: &Cookie<'_>, b: &Cookie<'_>) -> bool {
    a.name() == b.name() && a.domain() == b.domain() && a.path() == b.path()
}

fn is_expired(cookie: &Cookie<'_>, now: OffsetDateTime) -> bool {
    if cookie.max_age().is_some_and(|age| age.is_zero() || age.is_negative()) {
        return true;
    }
    cookie.expires_datetime().is_some_and(|at| at <= now)
}

fn matches_url(cookie: &Cookie<'_>, url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if cookie.secure() == Some(true) && url.scheme() != "https" {
        return false;
    }

    let host = host.to_ascii_lowercase();
    let domain_ok = cookie
        .domain()
        .map_or(true, |domain| domain_matches(&host, domain.trim_start_matches('.')));

    let path = cookie.path().unwrap_or("/");
    let request_path = url.path();
    let path_ok = request_path == path
        || (request_path.starts_with(path)
            && (path.ends_with('/') || request_path[path.len()..].starts_with('/')));

    domain_ok && path_ok
}
