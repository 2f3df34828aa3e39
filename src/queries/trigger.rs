//! A module that submits test requests and optionally follows the runs
//! until they finish.

use colored::Colorize;
use log::{error, info, warn};
use std::slice;
use url::Url;

use crate::{
    args::TriggerArgs, client::endpoint, constants, format_table, Error, FetchAutopkgtest,
    SessionCookie, Submission, TestState, TriggerClient, TriggerResult,
};

fn print_login_steps(urls: &[Url]) {
    let host = &*constants::AUTOPKGTEST_HOST_URL;
    eprintln!();
    eprintln!("{}", "Authentication required!".bold());
    eprintln!();
    eprintln!("Please authenticate in your browser:");
    eprintln!("  1. Visit: {host}/login");
    eprintln!("  2. Log in with your Launchpad credentials");
    eprintln!("  3. Save the value of the 'session' cookie to a file");
    eprintln!("  4. Retry with: --credentials <FILE>");
    eprintln!();
    eprintln!("Alternatively, open the links in your browser:");
    for url in urls {
        eprintln!("  {}", url.as_str().dimmed());
    }
}

fn print_run(result: &TriggerResult) {
    let fields = [
        ("UUID", Some(result.uuid.as_str())),
        ("Package", result.package.as_deref()),
        ("Release", result.release.as_deref()),
        ("Arch", result.arch.as_deref()),
        ("Requester", result.requester.as_deref()),
        ("Triggers", result.triggers.as_deref()),
        ("Results", result.result_url.as_deref()),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            println!("  {:<10} {value}", format!("{key}:"));
        }
    }
    println!();
}

impl TriggerArgs {
    /// Reads the session cookie from `--credentials`. A broken file is not
    /// fatal; the requests then go out unauthenticated.
    fn load_cookies(&self) -> Vec<SessionCookie> {
        let Some(path) = &self.credentials else {
            return vec![];
        };
        let domain = Url::parse(&constants::AUTOPKGTEST_HOST_URL)
            .ok()
            .and_then(|url| url.host_str().map(String::from));
        match SessionCookie::load_from_file(path, domain.as_deref()) {
            Ok(cookies) => {
                info!("loaded {} cookie(s) from {}", cookies.len(), path.display());
                cookies
            }
            Err(err) => {
                warn!("failed to load cookies from {}: {err}", path.display());
                warn!("will attempt to trigger without authentication (may fail)");
                vec![]
            }
        }
    }

    /// Submits one request per architecture, in order. Stops at the first
    /// request that can never succeed as is.
    pub(crate) fn trigger_and_print(&self) -> anyhow::Result<bool> {
        let request = self.link.to_request();
        let links = request.generate_links()?;
        let client = TriggerClient::builder()
            .cookies(self.load_cookies())
            .build()?;

        let submissions = match client.submit_links(&links) {
            Ok(submissions) => submissions,
            Err(Error::AuthenticationRequired) => {
                print_login_steps(&links.urls);
                return Ok(false);
            }
            Err(err @ Error::InvalidRequest { .. }) => {
                error!("{err}");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        let mut runs = Vec::new();
        for submission in submissions {
            match submission {
                Submission::Submitted(run) => {
                    println!("{} Test triggered successfully!", "✔".green());
                    print_run(&run);
                    runs.push(run);
                }
                Submission::Recovered(run) => {
                    println!("{} Found running test!", "⧖".yellow());
                    print_run(&run);
                    runs.push(run);
                }
                Submission::Untracked {
                    package,
                    release,
                    arch,
                    ..
                } => {
                    let segments = ["packages", package.as_str(), release.as_str(), arch.as_str()];
                    let history = endpoint(client.base_url(), &segments)?;
                    warn!("check its status manually at: {history}");
                }
            }
        }

        if runs.is_empty() {
            error!("no tests were triggered");
            return Ok(false);
        }
        if !self.wait {
            println!("Tests triggered. Check status and logs at:");
            for run in &runs {
                let url = endpoint(client.base_url(), &["packages", request.package.as_str()])?;
                println!(
                    "  • {} ({}/{}) {}",
                    request.package,
                    run.release.as_deref().unwrap_or(&request.suite),
                    run.arch.as_deref().unwrap_or("all"),
                    url.as_str().dimmed()
                );
            }
            eprintln!();
            info!("use --wait to follow the runs until they finish");
            return Ok(true);
        }
        self.wait_and_print(&client, &runs)
    }

    fn wait_and_print(&self, client: &TriggerClient, runs: &[TriggerResult]) -> anyhow::Result<bool> {
        info!(
            "waiting for test completion (timeout: {:?}, poll interval: {:?})",
            self.timeout, self.poll_interval
        );
        let mut success = true;
        for run in runs {
            let package = run.package.as_deref().unwrap_or(&self.link.package);
            let packages_url = endpoint(client.base_url(), &["packages", package])?;
            println!();
            println!(
                "Monitoring {} [{}/{}]",
                package.bold(),
                run.release.as_deref().unwrap_or(&self.link.suite),
                run.arch.as_deref().unwrap_or("all")
            );
            println!("{}", format!("UUID: {}", run.uuid).dimmed());
            println!("{}", format!("Live logs: {packages_url}").dimmed());

            match client.wait_for_completion(&run.uuid, self.poll_interval, self.timeout) {
                Ok(status) => {
                    println!("{}", format_table(false, slice::from_ref(&status)));
                    if !matches!(status.state, TestState::Pass | TestState::Neutral) {
                        success = false;
                    }
                }
                Err(err @ Error::Timeout { .. }) => {
                    warn!("{err}, the test is still running");
                    warn!("check its status at: {packages_url}");
                    success = false;
                }
                Err(err) => {
                    error!("could not monitor run {}: {err}", run.uuid);
                    success = false;
                }
            }
        }
        println!();
        match success {
            true => info!("all tests completed successfully"),
            false => error!("one or more tests failed or timed out"),
        }
        Ok(success)
    }
}
