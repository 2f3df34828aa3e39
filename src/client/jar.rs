//! Cookie storage of the trigger client.

use log::warn;
use reqwest::{
    cookie::{CookieStore, Jar},
    header::HeaderValue,
};
use std::{borrow::Cow, iter};
use url::Url;

/// A [`Jar`] that checks the `Domain` attribute of every cookie against the
/// public suffix list. A cookie scoped to `co.uk` is dropped, so it never
/// reaches a sibling of the host that set it.
#[derive(Debug, Default)]
pub(crate) struct SessionJar {
    inner: Jar,
}

impl SessionJar {
    /// Stores a cookie as if `url` had answered with it in `Set-Cookie`.
    pub(crate) fn add_cookie_str(&self, cookie: &str, url: &Url) {
        match HeaderValue::from_str(cookie) {
            Ok(header) => self.set_cookies(&mut iter::once(&header), url),
            Err(err) => warn!("ignoring malformed cookie for {url}: {err}"),
        }
    }
}

impl CookieStore for SessionJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let accepted: Vec<HeaderValue> = cookie_headers
            .filter_map(|header| {
                let set_cookie = header.to_str().ok()?;
                match scoped(set_cookie, url) {
                    Some(cookie) => HeaderValue::from_str(&cookie).ok(),
                    None => {
                        warn!("rejecting a cookie from {url} scoped to a public suffix");
                        None
                    }
                }
            })
            .collect();
        self.inner.set_cookies(&mut accepted.iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.inner.cookies(url)
    }
}

fn is_domain_attribute(attribute: &str) -> bool {
    attribute
        .split_once('=')
        .is_some_and(|(key, _)| key.trim().eq_ignore_ascii_case("domain"))
}

/// The `Domain` attribute of a `Set-Cookie` value, lowercased and without
/// its leading dot.
fn domain_attribute(set_cookie: &str) -> Option<String> {
    set_cookie
        .split(';')
        .skip(1)
        .find(|attribute| is_domain_attribute(attribute))
        .and_then(|attribute| attribute.split_once('='))
        .map(|(_, value)| value.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|domain| !domain.is_empty())
}

/// The cookie to store for `url`, or `None` when it must be rejected.
///
/// A public suffix is only accepted as a domain when it is the host itself,
/// and the cookie then becomes host-only.
fn scoped<'a>(set_cookie: &'a str, url: &Url) -> Option<Cow<'a, str>> {
    let Some(domain) = domain_attribute(set_cookie) else {
        return Some(Cow::Borrowed(set_cookie));
    };
    if psl::suffix_str(&domain) != Some(domain.as_str()) {
        return Some(Cow::Borrowed(set_cookie));
    }
    match url.host_str() {
        Some(host) if host.eq_ignore_ascii_case(&domain) => {
            let host_only: Vec<&str> = set_cookie
                .split(';')
                .enumerate()
                .filter(|(idx, attribute)| *idx == 0 || !is_domain_attribute(attribute))
                .map(|(_, attribute)| attribute)
                .collect();
            Some(Cow::Owned(host_only.join(";")))
        }
        _ => None,
    }
}

#[cfg(test)]
fn header(jar: &SessionJar, url: &str) -> Option<String> {
    let url = Url::parse(url).unwrap();
    jar.cookies(&url)
        .map(|value| value.to_str().unwrap().to_string())
}

#[test]
fn domain_attribute_values() {
    assert_eq!(
        domain_attribute("session=abc; Path=/; Domain=.Ubuntu.com; Secure").as_deref(),
        Some("ubuntu.com")
    );
    assert_eq!(domain_attribute("session=abc; domain = co.uk").as_deref(), Some("co.uk"));
    assert_eq!(domain_attribute("session=abc; Path=/"), None);
    assert_eq!(domain_attribute("domain=co.uk"), None);
    assert_eq!(domain_attribute("session=abc; Domain="), None);
}

#[test]
fn suffix_wide_cookies_are_rejected() {
    let jar = SessionJar::default();
    let url = Url::parse("https://a.co.uk/").unwrap();
    jar.add_cookie_str("tracker=1; Domain=co.uk; Path=/", &url);
    assert_eq!(header(&jar, "https://b.co.uk/"), None);
    assert_eq!(header(&jar, "https://a.co.uk/"), None);

    let url = Url::parse("https://autopkgtest.ubuntu.com/").unwrap();
    jar.add_cookie_str("tracker=1; Domain=com; Path=/", &url);
    assert_eq!(header(&jar, "https://launchpad.com/"), None);
}

#[test]
fn registrable_domain_cookies_are_shared() {
    let jar = SessionJar::default();
    let url = Url::parse("https://a.example.co.uk/").unwrap();
    jar.add_cookie_str("session=1; Domain=example.co.uk; Path=/", &url);
    assert_eq!(header(&jar, "https://b.example.co.uk/").as_deref(), Some("session=1"));
    assert_eq!(header(&jar, "https://b.co.uk/"), None);
}

#[test]
fn suffix_host_keeps_its_own_cookie() {
    let jar = SessionJar::default();
    let url = Url::parse("https://co.uk/").unwrap();
    jar.add_cookie_str("site=1; Domain=co.uk; Path=/", &url);
    assert_eq!(header(&jar, "https://co.uk/").as_deref(), Some("site=1"));
    assert_eq!(header(&jar, "https://a.co.uk/"), None);
}
