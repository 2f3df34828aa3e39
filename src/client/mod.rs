//! Authenticated access to the request and status pages.

mod jar;
mod response;
mod status;

pub use response::TriggerResponse;

use jar::SessionJar;
use log::{debug, info, warn};
use reqwest::{blocking::Client, cookie::CookieStore, redirect};
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use url::Url;

use crate::{
    constants, structs::query_value, Error, FetchAutopkgtest, LinkResponse, Result,
    SessionCookie, TestStatus, TriggerResult,
};

/// `base` with `segments` appended as percent-encoded path segments.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::InvalidUrl(format!("{base} cannot be a base url")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Configures a [`TriggerClient`].
///
/// ```
/// use autopkgtest_cli::{SessionCookie, TriggerClient};
///
/// let client = TriggerClient::builder()
///     .base_url("https://autopkgtest.ubuntu.com")
///     .cookies([SessionCookie::session("value-from-the-browser")])
///     .build()
///     .unwrap();
/// assert_eq!(client.cookies().as_deref(), Some("session=value-from-the-browser"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TriggerClientBuilder {
    base_url: Option<String>,
    cookies: Vec<SessionCookie>,
}

impl TriggerClientBuilder {
    /// Talks to another instance than
    /// [`AUTOPKGTEST_HOST_URL`][constants::AUTOPKGTEST_HOST_URL].
    #[must_use]
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').into());
        self
    }

    /// Session cookies to seed the jar with, as obtained after logging in.
    #[must_use]
    pub fn cookies(mut self, cookies: impl IntoIterator<Item = SessionCookie>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// Builds the client. Cookies are stored against the base url, so a
    /// cookie whose domain does not cover it, or that is scoped to a public
    /// suffix, is dropped by the jar.
    pub fn build(self) -> Result<TriggerClient> {
        let base_url = match &self.base_url {
            Some(url) => Url::parse(url)?,
            None => Url::parse(&constants::AUTOPKGTEST_HOST_URL)?,
        };
        let jar = Arc::new(SessionJar::default());
        for cookie in &self.cookies {
            debug!("seeding cookie '{}' for {base_url}", cookie.name);
            jar.add_cookie_str(&cookie.to_set_cookie_string(), &base_url);
        }
        let http = crate::http_client_builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(redirect::Policy::limited(10))
            .build()?;
        Ok(TriggerClient {
            base_url,
            http,
            jar,
        })
    }
}

/// What became of one submitted request link.
#[derive(Debug)]
pub enum Submission {
    /// The service accepted the request.
    Submitted(TriggerResult),
    /// An equivalent run was already in flight and was found.
    Recovered(TriggerResult),
    /// An equivalent run was already in flight but could not be found.
    Untracked {
        #[allow(missing_docs)]
        package: String,
        #[allow(missing_docs)]
        release: String,
        #[allow(missing_docs)]
        arch: String,
        /// Why the lookup failed.
        error: Error,
    },
}

impl Submission {
    /// The run to follow, if one is known.
    #[must_use]
    pub fn run(&self) -> Option<&TriggerResult> {
        match self {
            Self::Submitted(run) | Self::Recovered(run) => Some(run),
            Self::Untracked { .. } => None,
        }
    }
}

/// Submits test requests and follows the runs they start.
#[derive(Debug, Clone)]
pub struct TriggerClient {
    base_url: Url,
    http: Client,
    jar: Arc<SessionJar>,
}

impl FetchAutopkgtest for TriggerClient {
    fn http_client(&self) -> &Client {
        &self.http
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl TriggerClient {
    #[allow(missing_docs)]
    #[must_use]
    pub fn builder() -> TriggerClientBuilder {
        TriggerClientBuilder::default()
    }

    /// Unauthenticated client for the default instance.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// The `Cookie` header the client would send to its base url.
    #[must_use]
    pub fn cookies(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        header.to_str().ok().map(String::from)
    }

    /// Requests a test run through a `request.cgi` url.
    pub fn trigger_test(&self, url: &str) -> Result<TriggerResult> {
        let page = self.fetch_page(url)?;
        let result = TriggerResponse::classify(&page.body, &page.url).into_result()?;
        info!("submitted test run {}", result.uuid);
        Ok(result)
    }

    /// Submits every link in order, one request at a time.
    ///
    /// A request that is already running is looked up before moving on to
    /// the next link. Any other failure, such as an invalid request or a
    /// missing login, aborts the remaining links.
    pub fn submit_links(&self, links: &LinkResponse) -> Result<Vec<Submission>> {
        let total = links.urls.len();
        let mut submissions = Vec::with_capacity(total);
        for (idx, url) in links.urls.iter().enumerate() {
            match total {
                1 => info!("triggering test..."),
                _ => info!("[{}/{total}] triggering test...", idx + 1),
            }
            let submission = match self.trigger_test(url.as_str()) {
                Ok(result) => Submission::Submitted(result),
                Err(Error::AlreadyRunning) => self.recover(url)?,
                Err(err) => return Err(err),
            };
            submissions.push(submission);
        }
        Ok(submissions)
    }

    fn recover(&self, url: &Url) -> Result<Submission> {
        let package = query_value(url, "package").unwrap_or_default();
        let release = query_value(url, "release").unwrap_or_default();
        let arch = query_value(url, "arch").unwrap_or_else(|| "all".into());
        warn!("test already running for {package}/{release}/{arch}");
        info!("looking for the uuid of the running test...");
        match self.find_running_test(&package, &release, &arch) {
            Ok(uuid) => {
                let run =
                    TriggerResult::recovered(&self.base_url, &uuid, &package, &release, &arch)?;
                Ok(Submission::Recovered(run))
            }
            Err(error) => {
                warn!("could not find the running test: {error}");
                Ok(Submission::Untracked {
                    package,
                    release,
                    arch,
                    error,
                })
            }
        }
    }

    /// Reads the state of a run from `<base>/run/<uuid>`.
    pub fn get_test_status(&self, uuid: &str) -> Result<TestStatus> {
        let url = endpoint(&self.base_url, &["run", uuid])?;
        let page = self.fetch_page(url.as_str())?;
        let status = status::parse_test_status(&page.body, uuid, url.as_str());
        debug!("run {uuid} is {}", status.state);
        Ok(status)
    }

    /// Finds the run that blocked a submission with "Test already running".
    ///
    /// Candidates are read from the package page first and from the
    /// `/running` page second. A candidate is only accepted if its own page
    /// says it is queued or running.
    pub fn find_running_test(&self, package: &str, release: &str, arch: &str) -> Result<String> {
        let url = endpoint(&self.base_url, &["packages", package])?;
        let page = self.fetch_page(url.as_str())?;
        for uuid in status::running_candidates(&page.body, release, arch) {
            if self.is_in_flight(&uuid) {
                return Ok(uuid);
            }
        }

        debug!("no running test for {package} on its page, trying the running page");
        let url = endpoint(&self.base_url, &["running"])?;
        match self.fetch_page(url.as_str()) {
            Ok(page) if page.body.contains(package) => {
                for uuid in status::linked_runs(&page.body) {
                    if self.is_in_flight(&uuid) {
                        return Ok(uuid);
                    }
                }
            }
            Ok(_) => debug!("{package} is not on the running page"),
            Err(err) => debug!("could not fetch the running page: {err}"),
        }
        Err(Error::NotFound {
            package: package.into(),
            release: release.into(),
            arch: arch.into(),
        })
    }

    fn is_in_flight(&self, uuid: &str) -> bool {
        match self.get_test_status(uuid) {
            Ok(status) => status.state.is_in_flight(),
            Err(err) => {
                debug!("skipping candidate {uuid}: {err}");
                false
            }
        }
    }

    /// Polls a run until it finishes or `timeout` has passed. The first poll
    /// happens right away, later ones every `poll_interval`.
    ///
    /// Once the deadline is reached the run page is fetched one last time.
    /// A failure of that fetch is returned as is; otherwise the call fails
    /// with [`Error::Timeout`] and the last state seen while polling.
    pub fn wait_for_completion(
        &self,
        uuid: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TestStatus> {
        let deadline = Instant::now() + timeout;
        let last_status = loop {
            let status = self.get_test_status(uuid)?;
            if status.state.is_terminal() {
                return Ok(status);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break status.state;
            }
            debug!("run {uuid} is {}, checking again in {poll_interval:?}", status.state);
            thread::sleep(poll_interval.min(remaining));
            if Instant::now() >= deadline {
                break status.state;
            }
        };

        let status = self.get_test_status(uuid)?;
        debug!("run {uuid} is {} at the deadline", status.state);
        warn!("run {uuid} did not finish within {timeout:?}");
        Err(Error::Timeout {
            timeout,
            last_status,
        })
    }
}

#[test]
fn endpoint_segments() {
    let base = Url::parse("https://autopkgtest.ubuntu.com").unwrap();
    let url = endpoint(&base, &["packages", "libc++"]).unwrap();
    assert_eq!(url.as_str(), "https://autopkgtest.ubuntu.com/packages/libc++");

    let base = Url::parse("http://127.0.0.1:8080/staging/").unwrap();
    let url = endpoint(&base, &["run", "some id"]).unwrap();
    assert_eq!(url.as_str(), "http://127.0.0.1:8080/staging/run/some%20id");

    let base = Url::parse("mailto:someone@example.com").unwrap();
    assert!(matches!(
        endpoint(&base, &["run"]),
        Err(Error::InvalidUrl(_))
    ));
}

#[test]
fn seeded_cookies_are_host_scoped() {
    let cookie = SessionCookie {
        domain: None,
        secure: false,
        ..SessionCookie::session("test-session-id")
    };
    let client = TriggerClient::builder()
        .base_url("http://autopkgtest.example.com/")
        .cookies([cookie])
        .build()
        .unwrap();
    assert_eq!(client.cookies().as_deref(), Some("session=test-session-id"));

    let other = Url::parse("http://example.org/").unwrap();
    assert!(client.jar.cookies(&other).is_none());
}

#[test]
fn public_suffix_cookies_are_dropped() {
    let cookie = SessionCookie {
        domain: Some("co.uk".into()),
        secure: false,
        ..SessionCookie::session("test-session-id")
    };
    let client = TriggerClient::builder()
        .base_url("http://autopkgtest.example.co.uk")
        .cookies([cookie])
        .build()
        .unwrap();
    assert_eq!(client.cookies(), None);

    let sibling = Url::parse("http://tracker.co.uk/").unwrap();
    assert!(client.jar.cookies(&sibling).is_none());
}

#[test]
fn no_cookies_without_login() {
    let client = TriggerClient::builder()
        .base_url("http://autopkgtest.example.com")
        .build()
        .unwrap();
    assert_eq!(client.cookies(), None);
}

#[test]
fn secure_session_cookie() {
    let client = TriggerClient::builder()
        .base_url(constants::DEFAULT_HOST_URL)
        .cookies([SessionCookie::session("test-session-id")])
        .build()
        .unwrap();
    assert_eq!(client.cookies().as_deref(), Some("session=test-session-id"));
}

#[test]
#[ignore = "require internet connection"]
fn fetch_live_status() {
    let client = TriggerClient::new().unwrap();
    let status = client
        .get_test_status("00000000-0000-0000-0000-000000000000")
        .unwrap();
    println!("{status:?}");
}
