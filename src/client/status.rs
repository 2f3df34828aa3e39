//! Readers for the `/run/<uuid>`, `/packages/<package>` and `/running`
//! pages. These pages are rendered for humans, so every reader works on the
//! raw text and tolerates both the pipe-table and the HTML rendering.

use log::debug;
use regex::Regex;
use std::{collections::HashSet, sync::LazyLock};

use crate::{constants::markers, TestState, TestStatus};

const UUID_PATTERN: &str = "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

static RESULT_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\|\s*Result\s*\|([^|]*)\||<th>\s*Result\s*</th>\s*<td[^>]*>((?s:.*?))</td>")
        .expect("the regex should be valid")
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("<[^>]*>").expect("the regex should be valid"));
static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration(?::|\s*\|)\s*([^|\n<]+)").expect("the regex should be valid")
});
static UUID_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("<td>({UUID_PATTERN})</td>")).expect("the regex should be valid")
});
static RUN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("/run/({UUID_PATTERN})")).expect("the regex should be valid")
});

/// Lines searched above a `Running for:` label for its UUID.
const UUID_WINDOW: usize = 20;
/// Lines around a UUID searched for its release and architecture, both
/// bounds included.
const CONTEXT_ABOVE: usize = 50;
const CONTEXT_BELOW: usize = 10;

/// Reads the state of a run off its page.
pub(crate) fn parse_test_status(body: &str, uuid: &str, log_url: &str) -> TestStatus {
    let state = match RESULT_ROW.captures(body) {
        Some(row) => {
            let value = row.get(1).or_else(|| row.get(2)).map_or("", |m| m.as_str());
            let value = TAG.replace_all(value, "").to_lowercase();
            // tmpfail contains fail, so the order matters
            if value.contains("tmpfail") {
                TestState::TmpFail
            } else if value.contains("fail") {
                TestState::Fail
            } else if value.contains("pass") {
                TestState::Pass
            } else if value.contains("neutral") {
                TestState::Neutral
            } else {
                debug!("unrecognized result '{}' for run {uuid}", value.trim());
                TestState::Unknown
            }
        }
        None if body.contains(markers::IN_PROGRESS) => TestState::Running,
        None if body.contains(markers::QUEUED) => TestState::Queued,
        None => TestState::Unknown,
    };
    let duration = DURATION
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|d| !d.is_empty());
    TestStatus {
        uuid: uuid.into(),
        state,
        start_time: None,
        duration,
        log_url: log_url.into(),
    }
}

/// UUIDs of the tests a package page lists as running for `release` and
/// `arch`, in page order.
pub(crate) fn running_candidates(body: &str, release: &str, arch: &str) -> Vec<String> {
    let lines: Vec<&str> = body.split('\n').collect();
    let release_cell = header_cell_regex("Release", release);
    let arch_cell = header_cell_regex("Architecture", arch);

    let mut candidates = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !line.contains(markers::RUNNING_FOR) {
            continue;
        }
        let Some((uuid, uuid_line)) = uuid_above(&lines, idx) else {
            continue;
        };
        let start = uuid_line.saturating_sub(CONTEXT_ABOVE);
        let end = (uuid_line + CONTEXT_BELOW).min(lines.len() - 1);
        let context = lines[start..=end].join("\n");
        if release_cell.is_match(&context) && arch_cell.is_match(&context) {
            debug!("candidate running test {uuid} at line {uuid_line}");
            if !candidates.contains(&uuid) {
                candidates.push(uuid);
            }
        }
    }
    candidates
}

/// The closest `UUID:` header cell above line `idx`, with the line its value
/// was read from.
fn uuid_above(lines: &[&str], idx: usize) -> Option<(String, usize)> {
    let lowest = idx.saturating_sub(UUID_WINDOW);
    (lowest..idx).rev().find_map(|header| {
        if !lines[header].contains(markers::UUID_HEADER) {
            return None;
        }
        [header, header + 1]
            .into_iter()
            .filter(|&line| line < lines.len())
            .find_map(|line| {
                let uuid = UUID_CELL.captures(lines[line])?.get(1)?.as_str();
                Some((uuid.to_string(), line))
            })
    })
}

fn header_cell_regex(label: &str, value: &str) -> Regex {
    Regex::new(&format!(
        r"<th>{label}:</th>\s*<td>{}</td>",
        regex::escape(value)
    ))
    .expect("the regex should be valid")
}

/// Every run linked from the `/running` page, without duplicates.
pub(crate) fn linked_runs(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    RUN_LINK
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|uuid| seen.insert(uuid.clone()))
        .collect()
}

#[cfg(test)]
const LOG_URL: &str = "https://autopkgtest.ubuntu.com/run/12345678-1234-1234-1234-123456789abc";

#[cfg(test)]
const RUNNING_PACKAGE_PAGE: &str = r#"<h2>Running tests</h2>
<table class="table-condensed">
<tr><th>UUID:</th>
<td>87654321-4321-4321-4321-cba987654321</td></tr>
<tr><th>Release:</th><td>jammy</td></tr>
<tr><th>Architecture:</th><td>arm64</td></tr>
<tr><th>Running for:</th><td>1h 02m</td></tr>
</table>
<hr>
<table class="table-condensed">
<tr><th>UUID:</th><td>12345678-1234-1234-1234-123456789abc</td></tr>
<tr><th>Release:</th>
    <td>noble</td></tr>
<tr><th>Architecture:</th>
    <td>amd64</td></tr>
<tr><th>Running for:</th><td>0h 12m</td></tr>
</table>
"#;

#[test]
fn result_row_verdicts() {
    for (body, state) in [
        ("| Result | ⚠ tmpfail |", TestState::TmpFail),
        ("| Result | ✖ fail |", TestState::Fail),
        ("| result |✔ pass|", TestState::Pass),
        ("| Result | 😐neutral |", TestState::Neutral),
        ("<tr><th>Result</th> <td>✖ fail</td></tr>", TestState::Fail),
        (
            "<tr><th>Result</th><td class=\"result\"><span class=\"pass\">✔ pass</span></td></tr>",
            TestState::Pass,
        ),
        ("<th>Result</th>\n<td>\n  <b>⚠ tmpfail</b>\n</td>", TestState::TmpFail),
        ("| Result | skipped |", TestState::Unknown),
        // navigation mentioning pass or fail is not a verdict
        ("<a href=\"/fail\">fail</a> In progress", TestState::Running),
        ("Queued tests: 3", TestState::Queued),
        ("<html></html>", TestState::Unknown),
    ] {
        let status = parse_test_status(body, "12345678-1234-1234-1234-123456789abc", LOG_URL);
        assert_eq!(status.state, state, "{body}");
        assert_eq!(status.log_url, LOG_URL);
    }
}

#[test]
fn result_and_duration() {
    let body = "| Result | ✔ pass |\n| Duration | 15m 32s |\n| Testbed | lxd |";
    let status = parse_test_status(body, "12345678-1234-1234-1234-123456789abc", LOG_URL);
    assert_eq!(status.state, TestState::Pass);
    assert_eq!(status.duration.as_deref(), Some("15m 32s"));

    let status = parse_test_status("In progress\nDuration: 1h 20m 25s\n", "x", LOG_URL);
    assert_eq!(status.state, TestState::Running);
    assert_eq!(status.duration.as_deref(), Some("1h 20m 25s"));

    let status = parse_test_status("| Result | ✖ fail |", "x", LOG_URL);
    assert_eq!(status.duration, None);
}

#[test]
fn running_candidates_match_release_and_arch() {
    assert_eq!(
        running_candidates(RUNNING_PACKAGE_PAGE, "noble", "amd64"),
        ["12345678-1234-1234-1234-123456789abc"]
    );
    // nearby blocks share context, the run page has the final word
    assert_eq!(
        running_candidates(RUNNING_PACKAGE_PAGE, "jammy", "arm64"),
        [
            "87654321-4321-4321-4321-cba987654321",
            "12345678-1234-1234-1234-123456789abc"
        ]
    );
    assert!(running_candidates(RUNNING_PACKAGE_PAGE, "noble", "s390x").is_empty());
    assert!(running_candidates("", "noble", "amd64").is_empty());
}

#[test]
fn running_context_ends_ten_lines_below_the_uuid() {
    let page = |filler: usize| {
        let mut lines = vec!["<tr><th>UUID:</th><td>12345678-1234-1234-1234-123456789abc</td></tr>"];
        lines.extend(std::iter::repeat("<tr><td></td></tr>").take(filler));
        lines.push("<tr><th>Release:</th><td>noble</td></tr><tr><th>Architecture:</th><td>amd64</td></tr>");
        lines.push("<tr><th>Running for:</th><td>0h 01m</td></tr>");
        lines.join("\n")
    };
    assert_eq!(
        running_candidates(&page(9), "noble", "amd64"),
        ["12345678-1234-1234-1234-123456789abc"]
    );
    assert!(running_candidates(&page(10), "noble", "amd64").is_empty());
}

#[test]
fn running_candidates_escape_values() {
    // a value with regex metacharacters only matches itself
    assert!(running_candidates(RUNNING_PACKAGE_PAGE, "n.ble", "amd64").is_empty());
}

#[test]
fn linked_runs_are_deduplicated() {
    let body = r#"<a href="/run/12345678-1234-1234-1234-123456789abc">log</a>
<a href="/run/87654321-4321-4321-4321-cba987654321">log</a>
<a href="https://autopkgtest.ubuntu.com/run/12345678-1234-1234-1234-123456789abc">again</a>
<a href="/run/not-a-uuid">broken</a>"#;
    assert_eq!(
        linked_runs(body),
        [
            "12345678-1234-1234-1234-123456789abc",
            "87654321-4321-4321-4321-cba987654321"
        ]
    );
}
