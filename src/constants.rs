//! Useful constants shared across the program

use std::sync::LazyLock;

/// Public instance of the autopkgtest web service.
pub const DEFAULT_HOST_URL: &str = "https://autopkgtest.ubuntu.com";

/// Host of the autopkgtest web service, overridable with the
/// `AUTOPKGTEST_HOST_URL` environment variable.
///
/// ```
/// if std::env::var("AUTOPKGTEST_HOST_URL").is_err() {
///     assert_eq!(
///         *autopkgtest_cli::constants::AUTOPKGTEST_HOST_URL,
///         "https://autopkgtest.ubuntu.com"
///     );
/// }
/// ```
///
pub static AUTOPKGTEST_HOST_URL: LazyLock<String> = LazyLock::new(|| {
    std::env::var("AUTOPKGTEST_HOST_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| DEFAULT_HOST_URL.into())
});

/// Endpoint that accepts test requests; links are always generated against
/// the public instance.
pub const REQUEST_URL: &str = "https://autopkgtest.ubuntu.com/request.cgi";

/// Trigger used when neither explicit triggers nor a version are requested.
pub const DEFAULT_TRIGGER: &str = "migration-reference/0";

/// Release codenames used to recognize the results matrix.
/// The set is open-ended: releases missing here still parse as long as
/// the page mentions at least one of them.
pub const KNOWN_RELEASES: [&str; 10] = [
    "xenial", "bionic", "focal", "jammy", "mantic", "noble", "oracular", "plucky", "questing",
    "resolute",
];

/// Architectures tested on [autopkgtest.ubuntu.com](https://autopkgtest.ubuntu.com).
///
/// ```
/// assert_eq!(autopkgtest_cli::constants::KNOWN_ARCHITECTURES, [
///     "amd64", "arm64", "armhf", "i386", "ppc64el", "riscv64", "s390x",
/// ]);
/// ```
///
pub const KNOWN_ARCHITECTURES: [&str; 7] = [
    "amd64", "arm64", "armhf", "i386", "ppc64el", "riscv64", "s390x",
];

/// Name of the session cookie issued after a Launchpad login.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Domain the session cookie is scoped to.
pub const SESSION_COOKIE_DOMAIN: &str = "autopkgtest.ubuntu.com";

/// Page markers the service renders as plain text. None of them is a stable
/// contract, so they are kept here rather than inside the parsers.
pub mod markers {
    /// Shown after a successful submission.
    pub const SUBMITTED: &str = "Test request submitted";
    /// Prefix of every rejected submission.
    pub const INVALID_REQUEST: &str = "You submitted an invalid request";
    /// Rejection reason when an equivalent run is in flight.
    pub const ALREADY_RUNNING: &str = "Test already running";
    /// Present on pages that ask the user to log in.
    pub const LOGIN: &str = "login";
    /// Present on every page served to an authenticated user.
    pub const LOGOUT: &str = "Logout";
    /// Path segment of the login redirect target.
    pub const LOGIN_PATH: &str = "/login";
    /// Label next to each running test on a package page.
    pub const RUNNING_FOR: &str = "Running for:";
    /// Header cell carrying the UUID of a running test.
    pub const UUID_HEADER: &str = "<th>UUID:</th>";
    /// Rendered on run pages of tests that are executing.
    pub const IN_PROGRESS: &str = "In progress";
    /// Rendered on run pages of tests that wait for a worker.
    pub const QUEUED: &str = "Queued";
}

/// User agent header that we send along to the service for identifying this app.
///
/// ```
/// assert!(
///     autopkgtest_cli::constants::APP_USER_AGENT.starts_with("autopkgtest-cli/")
/// );
/// ```
///
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
