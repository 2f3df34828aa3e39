use colored::{ColoredString, Colorize};
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::fmt::Write;

#[cfg(test)]
use insta::assert_snapshot;

use crate::{ShowTestStatus, StatusIcon};

#[skip_serializing_none]
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
/// A single cell of the results matrix, can be serialized to a JSON entry
pub struct TestResult {
    /// Source package the test belongs to.
    pub package: String,
    /// Release codename, e.g. `noble`.
    pub release: String,
    /// Architecture, e.g. `amd64`.
    pub architecture: String,
    /// Display text of the cell with whitespace collapsed, e.g. `✔ pass`.
    pub status: String,
    /// How long the run took, if the page says so.
    pub duration: Option<String>,
    /// What triggered the run, if the page says so.
    pub trigger: Option<String>,
    /// Absolute link to the detailed history of this cell.
    pub detail_url: Option<String>,
}

impl TestResult {
    /// Whether the status counts as a failure worth reporting.
    /// Anything mentioning `pass`, and plain or decorated `neutral`, is fine.
    #[must_use]
    pub fn is_error(&self) -> bool {
        let status = self.status.trim().to_lowercase();
        let passing = status == "pass"
            || status == "✔ pass"
            || status == "neutral"
            || status == "😐 neutral"
            || status == "😐neutral"
            || status.contains("pass");
        !passing
    }
}

impl ShowTestStatus for TestResult {
    fn format_as_vec(&self) -> Vec<ColoredString> {
        let icon = StatusIcon::from_matrix_status(&self.status);
        let mut row = vec![
            format!("{} {}", ColoredString::from(&icon), self.status).into(),
            self.release.as_str().into(),
            self.architecture.as_str().into(),
        ];
        if let Some(duration) = &self.duration {
            row.push(duration.as_str().into());
        }
        row.push(self.detail_url.as_deref().unwrap_or_default().dimmed());
        row
    }
}

/// Optional release/architecture restriction applied after parsing.
/// Matching is case-insensitive; a missing or empty field matches anything.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Only keep results for this release.
    pub release: Option<String>,
    /// Only keep results for this architecture.
    pub architecture: Option<String>,
}

impl Filter {
    /// Returns [`None`] when no field would restrict anything.
    #[must_use]
    pub fn new(release: Option<String>, architecture: Option<String>) -> Option<Self> {
        let non_empty = |x: Option<String>| x.filter(|x| !x.trim().is_empty());
        match (non_empty(release), non_empty(architecture)) {
            (None, None) => None,
            (release, architecture) => Some(Self {
                release,
                architecture,
            }),
        }
    }

    /// Whether `test` survives the filter.
    #[must_use]
    pub fn matches(&self, test: &TestResult) -> bool {
        let field_matches = |wanted: &Option<String>, actual: &str| match wanted.as_deref() {
            None | Some("") => true,
            Some(wanted) => wanted.to_lowercase() == actual.to_lowercase(),
        };
        field_matches(&self.release, &test.release)
            && field_matches(&self.architecture, &test.architecture)
    }
}

#[derive(Serialize, Debug, Default, Clone)]
/// All results scraped for one package, with the failing ones singled out
pub struct PackageResults {
    package: String,
    tests: Vec<TestResult>,
    errors: Vec<TestResult>,
}

impl PackageResults {
    /// Collects `tests` and derives the error list from them, keeping order.
    #[must_use]
    pub fn new(package: &str, tests: Vec<TestResult>) -> Self {
        let errors = tests.iter().filter(|t| t.is_error()).cloned().collect();
        Self {
            package: package.into(),
            tests,
            errors,
        }
    }

    /// Name of the source package.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Every result, in matrix order (row by row).
    #[must_use]
    pub fn tests(&self) -> &[TestResult] {
        &self.tests
    }

    /// The failing subset of [`Self::tests`].
    #[must_use]
    pub fn errors(&self) -> &[TestResult] {
        &self.errors
    }

    /// Renders the errors as a plain-text report, one block per error.
    #[must_use]
    pub fn report_errors(&self) -> String {
        if self.errors.is_empty() {
            return format!("No errors found for package: {}", self.package);
        }
        let mut report = format!(
            "Found {} errors for package: {}",
            self.errors.len(),
            self.package
        );
        for (idx, error) in self.errors.iter().enumerate() {
            let fields = [
                ("Release", Some(error.release.as_str())),
                ("Architecture", Some(error.architecture.as_str())),
                ("Duration", error.duration.as_deref()),
                ("Trigger", error.trigger.as_deref()),
                ("Details", error.detail_url.as_deref()),
            ];
            let _ = write!(report, "\n\nError {}:\n  Status: {}", idx + 1, error.status);
            for (key, value) in fields {
                match value {
                    Some(value) if !value.is_empty() => {
                        let _ = write!(report, "\n  {key}: {value}");
                    }
                    _ => {}
                }
            }
        }
        report
    }
}

#[cfg(test)]
fn result(status: &str, release: &str, architecture: &str) -> TestResult {
    TestResult {
        package: "test-pkg".into(),
        release: release.into(),
        architecture: architecture.into(),
        status: status.into(),
        ..Default::default()
    }
}

#[test]
fn passing_statuses() {
    for status in ["pass", "PASS", "✔ pass", "neutral", "😐 neutral", " pass ", "pass (flaky)"] {
        assert!(!result(status, "noble", "amd64").is_error(), "{status}");
    }
    for status in ["fail", "✖ fail", "regression", "tmpfail", "no test results", "neutral-ish"] {
        assert!(result(status, "noble", "amd64").is_error(), "{status}");
    }
}

#[test]
fn filter_is_case_insensitive() {
    let filter = Filter::new(Some("Noble".into()), None).unwrap();
    assert!(filter.matches(&result("pass", "noble", "amd64")));
    assert!(filter.matches(&result("pass", "NOBLE", "arm64")));
    assert!(!filter.matches(&result("pass", "jammy", "amd64")));

    let filter = Filter::new(Some("jammy".into()), Some("ARM64".into())).unwrap();
    assert!(filter.matches(&result("pass", "jammy", "arm64")));
    assert!(!filter.matches(&result("pass", "jammy", "amd64")));

    assert_eq!(Filter::new(Some(" ".into()), None), None);
}

#[test]
fn errors_keep_order() {
    let results = PackageResults::new(
        "test-pkg",
        vec![
            result("fail", "focal", "amd64"),
            result("pass", "jammy", "amd64"),
            result("regression", "noble", "arm64"),
            result("😐 neutral", "noble", "amd64"),
        ],
    );
    let statuses: Vec<_> = results.errors().iter().map(|e| e.status.as_str()).collect();
    assert_eq!(statuses, ["fail", "regression"]);
    assert_eq!(results.tests().len(), 4);
}

#[test]
fn report_errors() {
    let mut fail = result("FAIL", "noble", "amd64");
    fail.duration = Some("15m".into());
    let mut regression = result("REGRESSION", "jammy", "arm64");
    regression.detail_url = Some("https://autopkgtest.ubuntu.com/packages/t/test-pkg".into());
    let results = PackageResults::new("test-pkg", vec![fail, regression]);
    assert_snapshot!(results.report_errors(), @r"
    Found 2 errors for package: test-pkg

    Error 1:
      Status: FAIL
      Release: noble
      Architecture: amd64
      Duration: 15m

    Error 2:
      Status: REGRESSION
      Release: jammy
      Architecture: arm64
      Details: https://autopkgtest.ubuntu.com/packages/t/test-pkg
    ");
}

#[test]
fn report_without_errors() {
    let results = PackageResults::new("test-pkg", vec![result("pass", "noble", "amd64")]);
    assert_snapshot!(results.report_errors(), @"No errors found for package: test-pkg");
}
