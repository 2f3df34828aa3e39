use colored::{ColoredString, Colorize};
use serde_with::SerializeDisplay;

use crate::TestState;

#[derive(SerializeDisplay, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum StatusIcon {
    Passed,
    Failed,
    Neutral,
    Waiting,
    #[default]
    Warning,
}

impl StatusIcon {
    /// Picks an icon for a status as it is displayed in the results matrix,
    /// e.g. `✔ pass`, `regression` or `😐 neutral`.
    pub(crate) fn from_matrix_status(status: &str) -> Self {
        let status = status.to_lowercase();
        match status.as_str() {
            x if x.contains("tmpfail") => StatusIcon::Warning,
            x if x.contains("fail") || x.contains("regression") => StatusIcon::Failed,
            x if x.contains("pass") => StatusIcon::Passed,
            x if x.contains("neutral") => StatusIcon::Neutral,
            x if x.contains("running") || x.contains("queued") => StatusIcon::Waiting,
            _ => StatusIcon::Warning,
        }
    }
}

impl From<TestState> for StatusIcon {
    fn from(state: TestState) -> Self {
        match state {
            TestState::Pass => StatusIcon::Passed,
            TestState::Fail => StatusIcon::Failed,
            TestState::Neutral => StatusIcon::Neutral,
            TestState::Queued | TestState::Running => StatusIcon::Waiting,
            TestState::TmpFail | TestState::Unknown => StatusIcon::Warning,
        }
    }
}

impl From<&StatusIcon> for ColoredString {
    fn from(icon: &StatusIcon) -> Self {
        match icon {
            StatusIcon::Passed => "✔".green(),
            StatusIcon::Failed => "✖".red(),
            StatusIcon::Neutral => "○".normal(),
            StatusIcon::Waiting => "⧖".yellow(),
            StatusIcon::Warning => "⚠".yellow(),
        }
    }
}

impl std::fmt::Display for StatusIcon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = ColoredString::from(self).normal();
        write!(f, "{icon}")
    }
}

#[test]
fn serialize_icons() {
    let success_icon = serde_json::to_string(&StatusIcon::Passed).unwrap();
    assert_eq!(success_icon, r#""✔""#);
    let waiting_icon = serde_json::to_string(&StatusIcon::from(TestState::Queued)).unwrap();
    assert_eq!(waiting_icon, r#""⧖""#);
}

#[test]
fn icons_for_matrix_statuses() {
    for (status, icon) in [
        ("pass", StatusIcon::Passed),
        ("✔ pass", StatusIcon::Passed),
        ("regression", StatusIcon::Failed),
        ("✖ fail", StatusIcon::Failed),
        ("⚠ tmpfail", StatusIcon::Warning),
        ("😐 neutral", StatusIcon::Neutral),
        ("running", StatusIcon::Waiting),
        ("no test results", StatusIcon::Warning),
    ] {
        assert_eq!(StatusIcon::from_matrix_status(status), icon, "{status}");
    }
}
