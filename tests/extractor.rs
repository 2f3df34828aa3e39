mod common;

use autopkgtest_cli::{Error, Filter, ResultExtractor};
use axum::{response::Html, routing::get, Router};
use common::MockService;

fn service() -> MockService {
    MockService::start(Router::new().route("/packages/ovn", get(|| async { Html(common::MATRIX) })))
}

#[test]
fn fetch_package_results() {
    let service = service();
    let extractor = ResultExtractor::with_base_url(service.base_url()).unwrap();
    let results = extractor.fetch_package_results("ovn", None).unwrap();
    assert_eq!(results.tests().len(), 4);
    let errors: Vec<_> = results
        .errors()
        .iter()
        .map(|t| format!("{}/{}={}", t.release, t.architecture, t.status))
        .collect();
    assert_eq!(errors, ["noble/amd64=✖ fail", "noble/s390x=⚠ tmpfail"]);
    assert_eq!(
        results.errors()[0].detail_url,
        Some(service.url("/packages/o/ovn/noble/amd64"))
    );
}

#[test]
fn fetch_filtered_results() {
    let service = service();
    let extractor = ResultExtractor::with_base_url(service.base_url()).unwrap();
    let filter = Filter::new(Some("jammy".into()), None);
    let results = extractor
        .fetch_package_results("ovn", filter.as_ref())
        .unwrap();
    assert_eq!(results.tests().len(), 2);
    assert!(results.errors().is_empty());
    assert_eq!(results.report_errors(), "No errors found for package: ovn");
}

#[test]
fn unknown_package() {
    let service = service();
    let extractor = ResultExtractor::with_base_url(service.base_url()).unwrap();
    let err = extractor
        .fetch_package_results("no-such-package", None)
        .unwrap_err();
    assert!(matches!(err, Error::UpstreamStatus { code: 404 }), "{err}");
}

#[test]
fn unreachable_service() {
    // nothing listens on the discard port
    let extractor = ResultExtractor::with_base_url("http://127.0.0.1:9").unwrap();
    let err = extractor.fetch_package_results("ovn", None).unwrap_err();
    assert!(matches!(err, Error::Network(_)), "{err}");
}
