#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

mod args;
mod client;
mod error;
mod extractor;
mod queries;
mod structs;

pub mod constants;
pub mod soup;

pub use args::AutopkgtestCli;
pub use client::{Submission, TriggerClient, TriggerClientBuilder, TriggerResponse};
pub use error::{Error, Result};
pub use extractor::ResultExtractor;
pub use structs::{
    Filter, LinkRequest, LinkResponse, PackageResults, SessionCookie, TestResult, TestState,
    TestStatus, TriggerResult,
};

use structs::StatusIcon;

use colored::{ColoredString, Colorize};
use comfy_table::Table;
use log::debug;
use reqwest::{blocking::Client, StatusCode};
use std::time::Duration;
use url::Url;

trait ShowTestStatus {
    fn format_as_vec(&self) -> Vec<ColoredString>;
}

/// A page as returned by the service, after following redirects.
struct Page {
    url: Url,
    status: StatusCode,
    body: String,
}

trait FetchAutopkgtest {
    fn http_client(&self) -> &Client;

    fn base_url(&self) -> &Url;

    fn fetch_page(&self, url: &str) -> Result<Page> {
        debug!("fetching {url}");
        let response = self.http_client().get(url).send()?;
        let url = response.url().clone();
        let status = response.status();
        let body = response.text()?;
        debug!("{url} answered with {status} ({} bytes)", body.len());
        Ok(Page { url, status, body })
    }
}

/// Common settings of every client talking to the service.
fn http_client_builder() -> reqwest::blocking::ClientBuilder {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(constants::APP_USER_AGENT)
}

fn format_table<T: ShowTestStatus>(short: bool, entries: &[T]) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::NOTHING);
    for entry in entries {
        table.add_row(entry.format_as_vec());
        if short {
            break;
        }
    }
    for (idx, column) in table.column_iter_mut().enumerate() {
        if idx == 0 {
            column.set_padding((0, 1));
        }
    }
    table.trim_fmt()
}

fn log_format(
    w: &mut dyn std::io::Write,
    _now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let level = record.level();
    let color = match level {
        log::Level::Error => "red",
        log::Level::Warn => "yellow",
        _ => "",
    };
    let level = format!("{level}:").to_lowercase().color(color).bold();
    write!(w, "{} {}", level, &record.args())
}
