use anyhow::bail;
use std::path::Path;

use crate::constants;

/// A cookie handed to the trigger client at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub value: String,
    /// Without a domain the cookie is host-only for the client's base url.
    pub domain: Option<String>,
    #[allow(missing_docs)]
    pub path: String,
    #[allow(missing_docs)]
    pub secure: bool,
    #[allow(missing_docs)]
    pub http_only: bool,
}

impl SessionCookie {
    /// The `session` cookie of autopkgtest.ubuntu.com.
    #[must_use]
    pub fn session(value: &str) -> Self {
        Self {
            name: constants::SESSION_COOKIE_NAME.into(),
            value: value.into(),
            domain: Some(constants::SESSION_COOKIE_DOMAIN.into()),
            path: "/".into(),
            secure: true,
            http_only: true,
        }
    }

    /// Reads a session value from a plain text file, as copied out of a
    /// browser after logging in.
    pub fn load_from_file(path: &Path, domain: Option<&str>) -> anyhow::Result<Vec<Self>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("failed to read file: {err}"))?;
        let value = contents.trim();
        if value.is_empty() {
            bail!("cookie file is empty");
        }
        let mut cookie = Self::session(value);
        if let Some(domain) = domain {
            cookie.domain = Some(domain.into());
        }
        Ok(vec![cookie])
    }

    /// Renders the cookie the way a `Set-Cookie` header would carry it.
    #[must_use]
    pub fn to_set_cookie_string(&self) -> String {
        let mut cookie = format!("{}={}; Path={}", self.name, self.value, self.path);
        if let Some(domain) = &self.domain {
            cookie.push_str(&format!("; Domain={domain}"));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie
    }
}

#[test]
fn session_cookie_header() {
    let cookie = SessionCookie::session("abc123");
    assert_eq!(
        cookie.to_set_cookie_string(),
        "session=abc123; Path=/; Domain=autopkgtest.ubuntu.com; Secure; HttpOnly"
    );
}

#[test]
fn load_cookie_file() {
    let dir = std::env::temp_dir().join(format!("autopkgtest-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let path = dir.join("cookies");
    std::fs::write(&path, "  s3cr3t-value\n").unwrap();
    let cookies = SessionCookie::load_from_file(&path, None).unwrap();
    assert_eq!(cookies, [SessionCookie::session("s3cr3t-value")]);

    let cookies = SessionCookie::load_from_file(&path, Some("autopkgtest.staging.ubuntu.com")).unwrap();
    assert_eq!(cookies[0].domain.as_deref(), Some("autopkgtest.staging.ubuntu.com"));

    std::fs::write(&path, "\n\t\n").unwrap();
    let err = SessionCookie::load_from_file(&path, None).unwrap_err();
    assert_eq!(err.to_string(), "cookie file is empty");

    let err = SessionCookie::load_from_file(&dir.join("missing"), None).unwrap_err();
    assert!(err.to_string().starts_with("failed to read file"));

    std::fs::remove_dir_all(&dir).unwrap();
}
