//! Recovers the release × architecture results matrix of a package from
//! its page, e.g. <https://autopkgtest.ubuntu.com/packages/ovn>.
//!
//! The matrix is the first `table.table` that mentions both a known release
//! and a known architecture. Its header row starts with an empty corner cell
//! followed by one cell per release; every body row starts with the
//! architecture followed by one cell per release. Cells are aligned by
//! column index, so the corner cell stays in the release list and column `j`
//! of a body row belongs to header cell `j`.

use log::debug;
use reqwest::{blocking::Client, StatusCode};
use scraper::{ElementRef, Html};
use url::Url;

use crate::{
    client::endpoint,
    constants,
    soup::{SoupFind, SoupText, TryAttr},
    Error, FetchAutopkgtest, Filter, PackageResults, Result, TestResult,
};

/// Fetches and parses package result pages.
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    base_url: Url,
    client: Client,
}

impl FetchAutopkgtest for ResultExtractor {
    fn http_client(&self) -> &Client {
        &self.client
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl ResultExtractor {
    /// Extractor for the instance named by
    /// [`AUTOPKGTEST_HOST_URL`][constants::AUTOPKGTEST_HOST_URL].
    pub fn new() -> Result<Self> {
        Self::with_base_url(&constants::AUTOPKGTEST_HOST_URL)
    }

    /// Extractor for another instance, e.g. a staging deployment.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            client: crate::http_client_builder().build()?,
        })
    }

    /// Fetches `<base>/packages/<package>` and parses its results matrix.
    /// Anything but `200 OK` is an error, including `404` for unknown packages.
    pub fn fetch_package_results(
        &self,
        package: &str,
        filter: Option<&Filter>,
    ) -> Result<PackageResults> {
        let url = endpoint(self.base_url(), &["packages", package])?;
        let page = self.fetch_page(url.as_str())?;
        if page.status != StatusCode::OK {
            return Err(Error::UpstreamStatus {
                code: page.status.as_u16(),
            });
        }
        Ok(self.parse_html(&page.body, package, filter))
    }

    /// Parses a package page. A page without a results matrix yields no
    /// results rather than an error.
    #[must_use]
    pub fn parse_html(&self, body: &str, package: &str, filter: Option<&Filter>) -> PackageResults {
        let doc = Html::parse_document(body);
        let mut tests = match find_matrix_table(&doc) {
            Some(table) => self.parse_matrix(table, package),
            None => {
                debug!("no results matrix found for package '{package}'");
                vec![]
            }
        };
        if let Some(filter) = filter {
            tests.retain(|test| filter.matches(test));
        }
        PackageResults::new(package, tests)
    }

    fn parse_matrix(&self, table: ElementRef<'_>, package: &str) -> Vec<TestResult> {
        let rows = table_rows(table);
        let Some(header) = rows
            .iter()
            .position(|row| !row.children_named(&["th"]).is_empty())
        else {
            return vec![];
        };
        let releases: Vec<String> = rows[header]
            .children_named(&["td", "th"])
            .iter()
            .map(|cell| cell.normalized_text())
            .collect();
        debug!("release header: {releases:?}");

        let mut tests = Vec::new();
        for row in &rows[header + 1..] {
            let cells = row.children_named(&["td", "th"]);
            let Some((arch, cells)) = cells.split_first() else {
                continue;
            };
            let arch = arch.normalized_text();
            if arch.is_empty() {
                continue;
            }
            // column 0 holds the architecture, so the first cell is column 1
            for (column, cell) in cells.iter().enumerate().map(|(idx, c)| (idx + 1, c)) {
                let Some(release) = releases.get(column) else {
                    break;
                };
                let status = cell.normalized_text();
                if release.is_empty() || status.is_empty() {
                    continue;
                }
                tests.push(TestResult {
                    package: package.into(),
                    release: release.clone(),
                    architecture: arch.clone(),
                    status,
                    detail_url: self.detail_url(*cell),
                    ..Default::default()
                });
            }
        }
        tests
    }

    fn detail_url(&self, cell: ElementRef<'_>) -> Option<String> {
        let href = cell.find("a[href]").ok()?.try_attr("href").ok()?;
        match self.base_url.join(href.trim()) {
            Ok(url) => Some(url.into()),
            Err(err) => {
                debug!("ignoring unresolvable link '{href}': {err}");
                None
            }
        }
    }
}

fn find_matrix_table(doc: &Html) -> Option<ElementRef<'_>> {
    doc.find_all("table").into_iter().find(|table| {
        if !table.has_class_token("table") {
            return false;
        }
        let text: String = table.text().collect();
        let has_release = constants::KNOWN_RELEASES.iter().any(|x| text.contains(x));
        let has_arch = constants::KNOWN_ARCHITECTURES.iter().any(|x| text.contains(x));
        has_release && has_arch
    })
}

/// Rows of `table` itself, without descending into nested tables.
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children_named(&["thead", "tbody", "tfoot", "tr"]) {
        match child.value().name() {
            "tr" => rows.push(child),
            _ => rows.extend(child.children_named(&["tr"])),
        }
    }
    rows
}

#[cfg(test)]
const MATRIX_WITH_ERRORS: &str = r#"
<!DOCTYPE html>
<html>
<head><title>autopkgtest results for ovn</title></head>
<body>
<h1>Package: ovn</h1>
<table class="table" style="width: auto">
  <tbody>
  <tr>
    <th></th>
    <th>focal</th><th>jammy</th><th>noble</th>
  </tr>
  <tr>
    <th>amd64</th>
    <td class="pass"><a href="/packages/o/ovn/focal/amd64">pass</a></td>
    <td class="pass"><a href="/packages/o/ovn/jammy/amd64">pass</a></td>
    <td class="fail"><a href="/packages/o/ovn/noble/amd64">fail</a></td>
  </tr>
  <tr>
    <th>arm64</th>
    <td class="pass"><a href="/packages/o/ovn/focal/arm64">pass</a></td>
    <td class="regression">
      <a href="/packages/o/ovn/jammy/arm64">regression</a>
    </td>
    <td class="pass"><a href="/packages/o/ovn/noble/arm64">pass</a></td>
  </tr>
  </tbody>
</table>
</body>
</html>
"#;

#[cfg(test)]
fn extractor() -> ResultExtractor {
    ResultExtractor::with_base_url(constants::DEFAULT_HOST_URL).unwrap()
}

#[test]
fn parse_matrix_with_errors() {
    let results = extractor().parse_html(MATRIX_WITH_ERRORS, "ovn", None);
    assert_eq!(results.package(), "ovn");
    let cells: Vec<_> = results
        .tests()
        .iter()
        .map(|t| format!("{}/{}={}", t.release, t.architecture, t.status))
        .collect();
    assert_eq!(
        cells,
        [
            "focal/amd64=pass",
            "jammy/amd64=pass",
            "noble/amd64=fail",
            "focal/arm64=pass",
            "jammy/arm64=regression",
            "noble/arm64=pass",
        ]
    );
    let errors = results.errors();
    assert_eq!(errors.len(), 2);
    assert_eq!(
        (errors[0].release.as_str(), errors[0].architecture.as_str()),
        ("noble", "amd64")
    );
    assert_eq!(errors[1].status, "regression");
    assert_eq!(
        errors[1].detail_url.as_deref(),
        Some("https://autopkgtest.ubuntu.com/packages/o/ovn/jammy/arm64")
    );
}

#[test]
fn parse_with_filters() {
    let filter = Filter::new(Some("JAMMY".into()), Some("arm64".into()));
    let results = extractor().parse_html(MATRIX_WITH_ERRORS, "ovn", filter.as_ref());
    assert_eq!(results.tests().len(), 1);
    assert_eq!(results.tests()[0].status, "regression");
    assert_eq!(results.errors(), results.tests());

    let filter = Filter::new(Some("noble".into()), None);
    let results = extractor().parse_html(MATRIX_WITH_ERRORS, "ovn", filter.as_ref());
    assert_eq!(results.tests().len(), 2);
    assert!(results.tests().iter().all(|t| t.release == "noble"));
    assert_eq!(results.errors().len(), 1);
}

#[test]
fn parse_without_matrix() {
    for body in [
        "",
        "<html><body><h1>No results found</h1></body></html>",
        // a table without the `table` class is not the matrix
        "<table><tr><th></th><th>noble</th></tr><tr><th>amd64</th><td>fail</td></tr></table>",
        // neither is one that mentions no architecture
        r#"<table class="table"><tr><th></th><th>noble</th></tr><tr><th>x</th><td>fail</td></tr></table>"#,
    ] {
        let results = extractor().parse_html(body, "empty-pkg", None);
        assert_eq!(results.package(), "empty-pkg");
        assert!(results.tests().is_empty(), "{body}");
    }
}

#[test]
fn parse_header_only() {
    let body = r#"<table class="table table-striped">
        <thead><tr><th></th><th>noble</th><th>amd64 notes</th></tr></thead>
    </table>"#;
    let results = extractor().parse_html(body, "pkg", None);
    assert!(results.tests().is_empty());
}

#[test]
fn parse_ragged_rows() {
    let body = r#"<table class="table">
      <tr><th></th><th>jammy</th><th>noble</th></tr>
      <tr><th>amd64</th><td>✔ pass</td><td>⚠
          tmpfail</td><td>extra</td><td>more</td></tr>
      <tr><th> </th><td>fail</td></tr>
      <tr><th>s390x</th><td></td><td>😐 neutral</td></tr>
    </table>"#;
    let results = extractor().parse_html(body, "pkg", None);
    let cells: Vec<_> = results
        .tests()
        .iter()
        .map(|t| format!("{}/{}={}", t.release, t.architecture, t.status))
        .collect();
    assert_eq!(
        cells,
        ["jammy/amd64=✔ pass", "noble/amd64=⚠ tmpfail", "noble/s390x=😐 neutral"]
    );
    assert_eq!(results.errors().len(), 1);
    assert_eq!(results.tests()[0].detail_url, None);
}

#[test]
fn relative_links_resolve_against_base() {
    let body = r#"<table class="table">
      <tr><th></th><th>noble</th></tr>
      <tr><th>riscv64</th><td><a href="ovn/noble/riscv64">fail</a></td></tr>
    </table>"#;
    let results = extractor().parse_html(body, "ovn", None);
    assert_eq!(
        results.tests()[0].detail_url.as_deref(),
        Some("https://autopkgtest.ubuntu.com/ovn/noble/riscv64")
    );
}

#[test]
#[ignore = "require internet connection"]
fn fetch_live_results() {
    let results = ResultExtractor::new()
        .unwrap()
        .fetch_package_results("hello", None)
        .unwrap();
    println!("{}", results.report_errors());
    assert!(!results.tests().is_empty());
}
