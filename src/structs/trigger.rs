use colored::{ColoredString, Colorize};
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::fmt::Display;
use url::Url;

use crate::{client::endpoint, Result, ShowTestStatus, StatusIcon};

#[skip_serializing_none]
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
/// A test run accepted by the service
pub struct TriggerResult {
    /// Identifier of the run, lowercase 8-4-4-4-12 hex.
    pub uuid: String,
    /// Page of the run itself.
    pub result_url: Option<String>,
    /// History of the package/release/arch combination.
    pub history_url: Option<String>,
    #[allow(missing_docs)]
    pub package: Option<String>,
    #[allow(missing_docs)]
    pub release: Option<String>,
    #[allow(missing_docs)]
    pub arch: Option<String>,
    /// Launchpad user that requested the run.
    pub requester: Option<String>,
    /// Triggers as echoed by the service, e.g. `['migration-reference/0']`.
    pub triggers: Option<String>,
}

impl TriggerResult {
    /// Describes an already running test that was found instead of submitted.
    pub fn recovered(
        base_url: &Url,
        uuid: &str,
        package: &str,
        release: &str,
        arch: &str,
    ) -> Result<Self> {
        let result_url = endpoint(base_url, &["run", uuid])?;
        let history_url = endpoint(base_url, &["packages", package, release, arch])?;
        Ok(Self {
            uuid: uuid.into(),
            result_url: Some(result_url.into()),
            history_url: Some(history_url.into()),
            package: Some(package.into()),
            release: Some(release.into()),
            arch: Some(arch.into()),
            ..Default::default()
        })
    }
}

/// Lifecycle of a test run as shown on its `/run/<uuid>` page.
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum TestState {
    Queued,
    Running,
    Pass,
    Fail,
    Neutral,
    TmpFail,
    #[default]
    Unknown,
}

impl TestState {
    /// Whether the run is finished; `unknown` is not.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TestState::Pass | TestState::Fail | TestState::Neutral | TestState::TmpFail
        )
    }

    /// Whether the run still waits for or occupies a worker.
    #[must_use]
    pub fn is_in_flight(self) -> bool {
        matches!(self, TestState::Queued | TestState::Running)
    }
}

impl Display for TestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TestState::Queued => "queued",
            TestState::Running => "running",
            TestState::Pass => "pass",
            TestState::Fail => "fail",
            TestState::Neutral => "neutral",
            TestState::TmpFail => "tmpfail",
            TestState::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[skip_serializing_none]
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
/// Status of a single run, can be serialized to a JSON entry
pub struct TestStatus {
    #[allow(missing_docs)]
    pub uuid: String,
    /// Where the run currently is in its lifecycle.
    pub state: TestState,
    #[allow(missing_docs)]
    pub start_time: Option<String>,
    /// Wall time of a finished run, e.g. `15m 32s`.
    pub duration: Option<String>,
    /// Page with the logs of this run.
    pub log_url: String,
}

impl ShowTestStatus for TestStatus {
    fn format_as_vec(&self) -> Vec<ColoredString> {
        let icon = StatusIcon::from(self.state);
        let state = self.state.to_string().to_uppercase().bold();
        let mut row = vec![format!("{} {state}", ColoredString::from(&icon)).into()];
        if let Some(duration) = &self.duration {
            row.push(format!("(Duration: {duration})").into());
        }
        row.push(self.log_url.as_str().dimmed());
        row
    }
}

#[test]
fn terminal_states() {
    let terminal: Vec<_> = [
        TestState::Queued,
        TestState::Running,
        TestState::Pass,
        TestState::Fail,
        TestState::Neutral,
        TestState::TmpFail,
        TestState::Unknown,
    ]
    .into_iter()
    .filter(|state| state.is_terminal())
    .map(|state| state.to_string())
    .collect();
    assert_eq!(terminal, ["pass", "fail", "neutral", "tmpfail"]);
    assert_eq!(serde_json::to_string(&TestState::TmpFail).unwrap(), r#""tmpfail""#);
}

#[test]
fn recovered_result_links() {
    let base = Url::parse("https://autopkgtest.ubuntu.com").unwrap();
    let uuid = "12345678-1234-1234-1234-123456789abc";
    let result = TriggerResult::recovered(&base, uuid, "ovn", "noble", "amd64").unwrap();
    assert_eq!(
        result.result_url.as_deref(),
        Some("https://autopkgtest.ubuntu.com/run/12345678-1234-1234-1234-123456789abc")
    );
    assert_eq!(
        result.history_url.as_deref(),
        Some("https://autopkgtest.ubuntu.com/packages/ovn/noble/amd64")
    );
    assert_eq!(result.requester, None);
}
