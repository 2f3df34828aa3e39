mod common;

use autopkgtest_cli::{Error, LinkResponse, SessionCookie, Submission, TestState, TriggerClient};
use axum::{
    extract::Query,
    http::{header, HeaderMap},
    response::{Html, Redirect},
    routing::get,
    Router,
};
use common::{MockService, RUNNING_UUID, UUID};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use url::Url;

fn client(service: &MockService) -> TriggerClient {
    TriggerClient::builder()
        .base_url(service.base_url())
        .build()
        .unwrap()
}

fn plain_session_cookie(value: &str) -> SessionCookie {
    SessionCookie {
        domain: None,
        secure: false,
        ..SessionCookie::session(value)
    }
}

/// Answers `/run/<uuid>` with `pages` in turn, repeating the last one.
fn run_pages(pages: &'static [&'static str]) -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().route(
        "/run/:uuid",
        get(move || {
            let counter = Arc::clone(&counter);
            async move {
                let hit = counter.fetch_add(1, Ordering::SeqCst);
                Html(pages[hit.min(pages.len() - 1)])
            }
        }),
    );
    (router, hits)
}

/// One request link per architecture, pointing at the mock service.
fn links(service: &MockService, archs: &[&str]) -> LinkResponse {
    let urls = archs
        .iter()
        .map(|arch| {
            let path = format!(
                "/request.cgi?release=noble&package=ovn&trigger=migration-reference%2F0&arch={arch}"
            );
            Url::parse(&service.url(&path)).unwrap()
        })
        .collect();
    LinkResponse {
        urls,
        message: String::new(),
    }
}

/// Accepts amd64, reports arm64 as already running and rejects the rest.
fn request_cgi(router: Router, hits: &Arc<AtomicUsize>) -> Router {
    let hits = Arc::clone(hits);
    router.route(
        "/request.cgi",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                match params.get("arch").map(String::as_str) {
                    Some("amd64") => Html(common::SUBMITTED),
                    Some("arm64") => Html(common::ALREADY_RUNNING),
                    _ => Html(common::NOT_PUBLISHED),
                }
            }
        }),
    )
}

#[test]
fn trigger_submitted() {
    let service = MockService::start(
        Router::new().route("/request.cgi", get(|| async { Html(common::SUBMITTED) })),
    );
    let result = client(&service)
        .trigger_test(&common::trigger_url(&service))
        .unwrap();
    assert_eq!(result.uuid, UUID);
    assert_eq!(result.package.as_deref(), Some("ovn"));
    assert_eq!(result.release.as_deref(), Some("noble"));
    assert_eq!(result.arch.as_deref(), Some("amd64"));
    assert_eq!(result.requester.as_deref(), Some("testuser"));
    assert_eq!(
        result.result_url.as_deref(),
        Some("https://autopkgtest.ubuntu.com/run/ae232d9f-08bd-4e36-90b7-7e3811776a64")
    );
}

#[test]
fn trigger_already_running() {
    let service = MockService::start(
        Router::new().route("/request.cgi", get(|| async { Html(common::ALREADY_RUNNING) })),
    );
    let err = client(&service)
        .trigger_test(&common::trigger_url(&service))
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyRunning), "{err}");
}

#[test]
fn trigger_invalid_request() {
    let service = MockService::start(
        Router::new().route("/request.cgi", get(|| async { Html(common::NOT_PUBLISHED) })),
    );
    let err = client(&service)
        .trigger_test(&common::trigger_url(&service))
        .unwrap_err();
    let Error::InvalidRequest { message } = err else {
        panic!("expected an invalid request, got {err}");
    };
    assert_eq!(message, "openssl/3.5.4-1ubuntu1 is not published in noble");
}

#[test]
fn trigger_redirected_to_login() {
    let service = MockService::start(
        Router::new()
            .route("/request.cgi", get(|| async { Redirect::to("/login") }))
            .route("/login", get(|| async { Html(common::LOGIN_PAGE) })),
    );
    let err = client(&service)
        .trigger_test(&common::trigger_url(&service))
        .unwrap_err();
    assert!(matches!(err, Error::AuthenticationRequired), "{err}");
}

#[test]
fn trigger_sends_session_cookie() {
    let service = MockService::start(Router::new().route(
        "/request.cgi",
        get(|headers: HeaderMap| async move {
            let cookie = headers
                .get(header::COOKIE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            match cookie.contains("session=test-session-id") {
                true => Html(common::SUBMITTED),
                false => Html(common::LOGIN_PAGE),
            }
        }),
    ));
    let url = common::trigger_url(&service);

    let err = client(&service).trigger_test(&url).unwrap_err();
    assert!(matches!(err, Error::UnexpectedResponse), "{err}");

    let authenticated = TriggerClient::builder()
        .base_url(service.base_url())
        .cookies([plain_session_cookie("test-session-id")])
        .build()
        .unwrap();
    assert_eq!(
        authenticated.cookies().as_deref(),
        Some("session=test-session-id")
    );
    assert_eq!(authenticated.trigger_test(&url).unwrap().uuid, UUID);
}

#[test]
fn test_status_pages() {
    for (page, state, duration) in [
        (common::IN_PROGRESS, TestState::Running, None),
        (common::QUEUED, TestState::Queued, None),
        (common::PASSED, TestState::Pass, Some("15m 32s")),
        ("| Result | ✖ fail |", TestState::Fail, None),
        ("| Result | ⚠ tmpfail |", TestState::TmpFail, None),
        ("| Result | 😐 neutral |", TestState::Neutral, None),
        (
            "<th>Result</th><td><span class=\"fail\">✖ fail</span></td>",
            TestState::Fail,
            None,
        ),
        ("<html></html>", TestState::Unknown, None),
    ] {
        let service = MockService::start(
            Router::new().route("/run/:uuid", get(move || async move { Html(page) })),
        );
        let status = client(&service).get_test_status(RUNNING_UUID).unwrap();
        assert_eq!(status.state, state, "{page}");
        assert_eq!(status.duration.as_deref(), duration);
        assert_eq!(status.uuid, RUNNING_UUID);
        assert_eq!(status.log_url, service.url(&format!("/run/{RUNNING_UUID}")));
    }
}

#[test]
fn wait_until_passed() {
    let (router, hits) = run_pages(&[common::IN_PROGRESS, common::IN_PROGRESS, common::PASSED]);
    let service = MockService::start(router);
    let interval = Duration::from_millis(100);

    let start = Instant::now();
    let status = client(&service)
        .wait_for_completion(RUNNING_UUID, interval, Duration::from_secs(10))
        .unwrap();
    assert_eq!(status.state, TestState::Pass);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(start.elapsed() < 3 * interval + Duration::from_secs(1));
}

#[test]
fn wait_times_out() {
    let (router, hits) = run_pages(&[common::IN_PROGRESS]);
    let service = MockService::start(router);

    let err = client(&service)
        .wait_for_completion(
            RUNNING_UUID,
            Duration::from_millis(50),
            Duration::from_millis(120),
        )
        .unwrap_err();
    let Error::Timeout {
        timeout,
        last_status,
    } = err
    else {
        panic!("expected a timeout, got {err}");
    };
    assert_eq!(timeout, Duration::from_millis(120));
    assert_eq!(last_status, TestState::Running);
    assert!(hits.load(Ordering::SeqCst) >= 2);
}

#[test]
fn wait_times_out_even_if_finished_at_the_deadline() {
    let (router, hits) = run_pages(&[common::IN_PROGRESS, common::PASSED]);
    let service = MockService::start(router);

    let err = client(&service)
        .wait_for_completion(
            RUNNING_UUID,
            Duration::from_millis(500),
            Duration::from_millis(50),
        )
        .unwrap_err();
    let Error::Timeout { last_status, .. } = err else {
        panic!("expected a timeout, got {err}");
    };
    assert_eq!(last_status, TestState::Running);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn wait_reports_unreachable_service() {
    let client = TriggerClient::builder()
        .base_url("http://127.0.0.1:9")
        .build()
        .unwrap();
    let err = client
        .wait_for_completion(RUNNING_UUID, Duration::from_millis(10), Duration::from_secs(1))
        .unwrap_err();
    assert!(matches!(err, Error::Network(_)), "{err}");
}

#[test]
fn find_running_test_on_package_page() {
    let (router, _) = run_pages(&[common::IN_PROGRESS]);
    let service = MockService::start(router.route(
        "/packages/ovn",
        get(|| async { Html(common::RUNNING_PACKAGE_PAGE) }),
    ));
    let uuid = client(&service)
        .find_running_test("ovn", "noble", "amd64")
        .unwrap();
    assert_eq!(uuid, RUNNING_UUID);
}

#[test]
fn find_running_test_on_running_page() {
    let (router, _) = run_pages(&[common::QUEUED]);
    let service = MockService::start(
        router
            .route("/packages/ovn", get(|| async { Html("<h1>ovn</h1>") }))
            .route(
                "/running",
                get(|| async {
                    Html(format!(
                        r#"<h2>ovn</h2><a href="/run/{RUNNING_UUID}">log</a>"#
                    ))
                }),
            ),
    );
    let uuid = client(&service)
        .find_running_test("ovn", "noble", "amd64")
        .unwrap();
    assert_eq!(uuid, RUNNING_UUID);
}

#[test]
fn running_test_not_found() {
    // the candidate on the package page already finished
    let (router, _) = run_pages(&[common::PASSED]);
    let service = MockService::start(
        router
            .route(
                "/packages/ovn",
                get(|| async { Html(common::RUNNING_PACKAGE_PAGE) }),
            )
            .route("/running", get(|| async { Html("<h1>Running tests</h1>") })),
    );
    let err = client(&service)
        .find_running_test("ovn", "noble", "amd64")
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "{err}");
    assert_eq!(
        err.to_string(),
        "no running test found for ovn/noble/amd64"
    );
}

#[test]
fn submit_links_recovers_running_tests() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (router, _) = run_pages(&[common::IN_PROGRESS]);
    let package_page = common::RUNNING_PACKAGE_PAGE.replace("amd64", "arm64");
    let router = router.route("/packages/ovn", get(move || async move { Html(package_page) }));
    let service = MockService::start(request_cgi(router, &hits));

    let submissions = client(&service)
        .submit_links(&links(&service, &["amd64", "arm64"]))
        .unwrap();
    assert_eq!(submissions.len(), 2);
    let Submission::Submitted(submitted) = &submissions[0] else {
        panic!("expected a submitted run, got {:?}", submissions[0]);
    };
    assert_eq!(submitted.uuid, UUID);
    let Submission::Recovered(recovered) = &submissions[1] else {
        panic!("expected a recovered run, got {:?}", submissions[1]);
    };
    assert_eq!(recovered.uuid, RUNNING_UUID);
    assert_eq!(recovered.release.as_deref(), Some("noble"));
    assert_eq!(recovered.arch.as_deref(), Some("arm64"));
    assert_eq!(
        recovered.result_url.as_deref(),
        Some(service.url(&format!("/run/{RUNNING_UUID}")).as_str())
    );
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn submit_links_continue_after_lost_run() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new().route("/packages/ovn", get(|| async { Html("<h1>ovn</h1>") }));
    let service = MockService::start(request_cgi(router, &hits));

    let submissions = client(&service)
        .submit_links(&links(&service, &["arm64", "amd64"]))
        .unwrap();
    assert_eq!(submissions.len(), 2);
    let Submission::Untracked { arch, error, .. } = &submissions[0] else {
        panic!("expected a lost run, got {:?}", submissions[0]);
    };
    assert_eq!(arch, "arm64");
    assert!(matches!(error, Error::NotFound { .. }), "{error}");
    assert!(submissions[0].run().is_none());
    assert_eq!(submissions[1].run().map(|run| run.uuid.as_str()), Some(UUID));
}

#[test]
fn submit_links_stop_at_invalid_request() {
    let hits = Arc::new(AtomicUsize::new(0));
    let service = MockService::start(request_cgi(Router::new(), &hits));

    let err = client(&service)
        .submit_links(&links(&service, &["amd64", "s390x", "arm64"]))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest { .. }), "{err}");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn submit_links_stop_at_login() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let service = MockService::start(
        Router::new()
            .route(
                "/request.cgi",
                get(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Redirect::to("/login")
                    }
                }),
            )
            .route("/login", get(|| async { Html(common::LOGIN_PAGE) })),
    );

    let err = client(&service)
        .submit_links(&links(&service, &["amd64", "arm64"]))
        .unwrap_err();
    assert!(matches!(err, Error::AuthenticationRequired), "{err}");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
