//! Classification of the free-form page `request.cgi` answers with.
//!
//! The service has no API for submissions, so the outcome is read off the
//! rendered page: either a plain-text listing or a definition list, e.g.
//!
//! ```text
//! Test request submitted.
//!
//! UUID
//!     ae232d9f-08bd-4e36-90b7-7e3811776a64
//! ```

use log::debug;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::{constants::markers, Error, Result, TriggerResult};

/// What a submission page says happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerResponse {
    /// The run was queued.
    Submitted(TriggerResult),
    /// The page claims success but no UUID could be read from it.
    MalformedSuccess,
    /// An equivalent run is already queued or running.
    AlreadyRunning,
    /// The request was rejected with an explanation.
    InvalidRequest(String),
    /// The session is missing or expired.
    AuthenticationRequired,
    /// None of the above.
    Unexpected,
}

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    field_regex(
        "UUID",
        r"([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})",
    )
});
static RESULT_URL: LazyLock<Regex> = LazyLock::new(|| link_regex("Result url"));
static HISTORY_URL: LazyLock<Regex> = LazyLock::new(|| link_regex("Result history"));
static PACKAGE: LazyLock<Regex> = LazyLock::new(|| field_regex("package", r"([^<\s]+)"));
static RELEASE: LazyLock<Regex> = LazyLock::new(|| field_regex("release", r"([^<\s]+)"));
static ARCH: LazyLock<Regex> = LazyLock::new(|| field_regex("arch", r"([^<\s]+)"));
static REQUESTER: LazyLock<Regex> = LazyLock::new(|| field_regex("requester", r"([^<\s]+)"));
static TRIGGERS: LazyLock<Regex> =
    LazyLock::new(|| field_regex("triggers", r"(.+?)(?:\n|</dd>|\z)"));
static INVALID_REQUEST_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    let marker = regex::escape(markers::INVALID_REQUEST);
    Regex::new(&format!(r"{marker}:\s*([^<\n]+)")).expect("the regex should be valid")
});

/// A value following its label, either on the next line of plain text or in
/// the `<dd>` following a `<dt>`.
fn field_regex(label: &str, value: &str) -> Regex {
    let label = regex::escape(label);
    Regex::new(&format!(
        r"(?:\b{label}[ \t]*\r?\n\s*|<dt>\s*{label}\s*</dt>\s*<dd>\s*){value}"
    ))
    .expect("the regex should be valid")
}

/// Same as [`field_regex`] but tolerates an anchor around the value.
fn link_regex(label: &str) -> Regex {
    let label = regex::escape(label);
    Regex::new(&format!(
        r"(?:\b{label}[ \t]*\r?\n\s*|<dt>\s*{label}\s*</dt>\s*<dd>\s*(?:<a[^>]*>)?)([^<\s]+)"
    ))
    .expect("the regex should be valid")
}

fn capture(regex: &Regex, body: &str) -> Option<String> {
    let value = regex.captures(body)?.get(1)?.as_str().trim();
    match value.is_empty() {
        true => None,
        false => Some(value.to_string()),
    }
}

impl TriggerResponse {
    /// Classifies a submission page. The order of the checks matters: a
    /// rejection page links to the login page in its navigation, so it must
    /// be recognized before the login check.
    #[must_use]
    pub fn classify(body: &str, final_url: &Url) -> Self {
        let response = if body.contains(markers::SUBMITTED) {
            Self::parse_submitted(body)
        } else if body.contains(markers::INVALID_REQUEST) {
            if body.contains(markers::ALREADY_RUNNING) {
                Self::AlreadyRunning
            } else {
                let message = capture(&INVALID_REQUEST_MESSAGE, body)
                    .unwrap_or_else(|| "details not available".into());
                Self::InvalidRequest(message)
            }
        } else if final_url.path().contains(markers::LOGIN_PATH)
            || (body.contains(markers::LOGIN) && !body.contains(markers::LOGOUT))
        {
            Self::AuthenticationRequired
        } else {
            Self::Unexpected
        };
        debug!("classified response from {final_url} as {response:?}");
        response
    }

    fn parse_submitted(body: &str) -> Self {
        let Some(uuid) = capture(&UUID, body) else {
            return Self::MalformedSuccess;
        };
        Self::Submitted(TriggerResult {
            uuid,
            result_url: capture(&RESULT_URL, body),
            history_url: capture(&HISTORY_URL, body),
            package: capture(&PACKAGE, body),
            release: capture(&RELEASE, body),
            arch: capture(&ARCH, body),
            requester: capture(&REQUESTER, body),
            triggers: capture(&TRIGGERS, body),
        })
    }

    /// Turns everything but a successful submission into its [`Error`].
    pub fn into_result(self) -> Result<TriggerResult> {
        match self {
            Self::Submitted(result) => Ok(result),
            Self::MalformedSuccess => Err(Error::MalformedSuccessResponse),
            Self::AlreadyRunning => Err(Error::AlreadyRunning),
            Self::InvalidRequest(message) => Err(Error::InvalidRequest { message }),
            Self::AuthenticationRequired => Err(Error::AuthenticationRequired),
            Self::Unexpected => Err(Error::UnexpectedResponse),
        }
    }
}

#[cfg(test)]
fn request_url() -> Url {
    Url::parse("https://autopkgtest.ubuntu.com/request.cgi?release=noble&package=ovn").unwrap()
}

#[cfg(test)]
const SUBMITTED_PLAIN: &str = "Logout testuser

Test request submitted.

Result history
    https://autopkgtest.ubuntu.com/packages/ovn/noble/amd64
Result url
    https://autopkgtest.ubuntu.com/run/ae232d9f-08bd-4e36-90b7-7e3811776a64
UUID
    ae232d9f-08bd-4e36-90b7-7e3811776a64
arch
    amd64
package
    ovn
release
    noble
requester
    testuser
triggers
    ['migration-reference/0']";

#[test]
fn submitted_plain_text() {
    let TriggerResponse::Submitted(result) =
        TriggerResponse::classify(SUBMITTED_PLAIN, &request_url())
    else {
        panic!("expected a submitted response");
    };
    assert_eq!(
        result,
        TriggerResult {
            uuid: "ae232d9f-08bd-4e36-90b7-7e3811776a64".into(),
            result_url: Some(
                "https://autopkgtest.ubuntu.com/run/ae232d9f-08bd-4e36-90b7-7e3811776a64".into()
            ),
            history_url: Some("https://autopkgtest.ubuntu.com/packages/ovn/noble/amd64".into()),
            package: Some("ovn".into()),
            release: Some("noble".into()),
            arch: Some("amd64".into()),
            requester: Some("testuser".into()),
            triggers: Some("['migration-reference/0']".into()),
        }
    );
}

#[test]
fn submitted_definition_list() {
    let body = r#"<p><a href="/logout">Logout testuser</a></p>
<p>Test request submitted.</p>
<dl>
<dt>Result history</dt>
<dd><a href="https://autopkgtest.ubuntu.com/packages/ovn/noble/arm64">https://autopkgtest.ubuntu.com/packages/ovn/noble/arm64</a></dd>
<dt>Result url</dt>
<dd><a href="https://autopkgtest.ubuntu.com/run/0b6f5c3e-8d1a-4c2b-9e7f-1a2b3c4d5e6f">https://autopkgtest.ubuntu.com/run/0b6f5c3e-8d1a-4c2b-9e7f-1a2b3c4d5e6f</a></dd>
<dt>UUID</dt>
<dd>0b6f5c3e-8d1a-4c2b-9e7f-1a2b3c4d5e6f</dd>
<dt>arch</dt>
<dd>arm64</dd>
<dt>package</dt>
<dd>ovn</dd>
<dt>release</dt>
<dd>noble</dd>
<dt>requester</dt>
<dd>testuser</dd>
<dt>triggers</dt>
<dd>['ovn/24.03.2-0ubuntu0.24.04.1', 'openssl/3.0.13-0ubuntu3.5']</dd>
</dl>"#;
    let result = TriggerResponse::classify(body, &request_url())
        .into_result()
        .unwrap();
    assert_eq!(result.uuid, "0b6f5c3e-8d1a-4c2b-9e7f-1a2b3c4d5e6f");
    assert_eq!(
        result.result_url.as_deref(),
        Some("https://autopkgtest.ubuntu.com/run/0b6f5c3e-8d1a-4c2b-9e7f-1a2b3c4d5e6f")
    );
    assert_eq!(result.arch.as_deref(), Some("arm64"));
    assert_eq!(
        result.triggers.as_deref(),
        Some("['ovn/24.03.2-0ubuntu0.24.04.1', 'openssl/3.0.13-0ubuntu3.5']")
    );
}

#[test]
fn submitted_without_uuid() {
    let body = "Logout testuser\n\nTest request submitted.\n\nUUID\n    not-a-uuid\n";
    let response = TriggerResponse::classify(body, &request_url());
    assert_eq!(response, TriggerResponse::MalformedSuccess);
    assert!(matches!(
        response.into_result(),
        Err(Error::MalformedSuccessResponse)
    ));
}

#[test]
fn already_running() {
    let body = "Logout testuser

You submitted an invalid request:

Test already running:

release: noble

pkg: ovn

arch: amd64

triggers: migration-reference/0";
    let response = TriggerResponse::classify(body, &request_url());
    assert_eq!(response, TriggerResponse::AlreadyRunning);
}

#[test]
fn invalid_request_beats_login_check() {
    // the navigation of a rejection page mentions the login page
    let body = r#"<head>
<meta charset="utf-8">
<title>Autopkgtest Test Request</title>
</head>
<body>
<nav><a href="/login">login</a></nav>
<p>You submitted an invalid request: openssl/3.5.4-1ubuntu1 is not published in noble</p>
</body>"#;
    let err = TriggerResponse::classify(body, &request_url())
        .into_result()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid request: openssl/3.5.4-1ubuntu1 is not published in noble"
    );
}

#[test]
fn authentication_required() {
    let body = "<html><body>Please login to continue</body></html>";
    let response = TriggerResponse::classify(body, &request_url());
    assert_eq!(response, TriggerResponse::AuthenticationRequired);

    // a redirect to the login page counts even if the page says nothing
    let login = Url::parse("https://autopkgtest.ubuntu.com/login?next=/request.cgi").unwrap();
    let response = TriggerResponse::classify("<html></html>", &login);
    assert_eq!(response, TriggerResponse::AuthenticationRequired);

    // logged in users see both words
    let body = "<a href=\"/logout\">Logout testuser</a> ... login ...";
    assert_eq!(
        TriggerResponse::classify(body, &request_url()),
        TriggerResponse::Unexpected
    );
}

#[test]
fn classification_is_stable() {
    for body in [SUBMITTED_PLAIN, "You submitted an invalid request: nope", "", "login"] {
        let first = TriggerResponse::classify(body, &request_url());
        for _ in 0..3 {
            assert_eq!(TriggerResponse::classify(body, &request_url()), first);
        }
    }
}
