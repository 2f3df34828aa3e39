//! A throwaway autopkgtest web service for the blocking clients to talk to.

#![allow(dead_code)]

use axum::Router;
use tokio::{net::TcpListener, runtime::Runtime};

/// Serves a router on a random local port for as long as it is alive.
pub struct MockService {
    base_url: String,
    _runtime: Runtime,
}

impl MockService {
    pub fn start(router: Router) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        runtime.spawn(async move { axum::serve(listener, router).await.unwrap() });
        Self {
            base_url: format!("http://{addr}"),
            _runtime: runtime,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

pub const UUID: &str = "ae232d9f-08bd-4e36-90b7-7e3811776a64";

pub const RUNNING_UUID: &str = "12345678-1234-1234-1234-123456789abc";

pub const MATRIX: &str = r#"<!DOCTYPE html>
<html>
<body>
<nav><a href="/login">login</a></nav>
<table class="table">
  <tr><th></th><th>jammy</th><th>noble</th></tr>
  <tr>
    <th>amd64</th>
    <td class="pass"><a href="/packages/o/ovn/jammy/amd64">✔ pass</a></td>
    <td class="fail"><a href="/packages/o/ovn/noble/amd64">✖ fail</a></td>
  </tr>
  <tr>
    <th>s390x</th>
    <td class="neutral"><a href="/packages/o/ovn/jammy/s390x">😐 neutral</a></td>
    <td class="tmpfail"><a href="/packages/o/ovn/noble/s390x">⚠ tmpfail</a></td>
  </tr>
</table>
</body>
</html>"#;

pub const SUBMITTED: &str = "Logout testuser

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

pub const ALREADY_RUNNING: &str = "<p>Logout testuser</p>
<p>You submitted an invalid request:</p>
<p>Test already running:</p>
<p>release: noble</p><p>pkg: ovn</p><p>arch: amd64</p>";

pub const NOT_PUBLISHED: &str = r#"<nav><a href="/logout">Logout testuser</a></nav>
<p>You submitted an invalid request: openssl/3.5.4-1ubuntu1 is not published in noble</p>"#;

pub const LOGIN_PAGE: &str = "<html><body><h1>Please log in</h1></body></html>";

pub const IN_PROGRESS: &str = "<h2>Run 12345678</h2>\n<p>In progress</p>";

pub const QUEUED: &str = "<h2>Run 12345678</h2>\n<p>Queued</p>";

pub const PASSED: &str = "| Result | ✔ pass |\n| Duration | 15m 32s |";

pub const RUNNING_PACKAGE_PAGE: &str = r#"<h1>ovn</h1>
<h2>Running tests</h2>
<table class="table-condensed">
<tr><th>UUID:</th><td>12345678-1234-1234-1234-123456789abc</td></tr>
<tr><th>Release:</th>
    <td>noble</td></tr>
<tr><th>Architecture:</th>
    <td>amd64</td></tr>
<tr><th>Running for:</th><td>0h 12m</td></tr>
</table>
"#;

pub fn trigger_url(service: &MockService) -> String {
    service.url("/request.cgi?release=noble&package=ovn&trigger=migration-reference%2F0&arch=amd64")
}
