//! A module that reports the failing cells of package results matrices,
//! e.g. from <https://autopkgtest.ubuntu.com/packages/ovn>.

use colored::Colorize;
use indexmap::IndexMap;
use log::error;

use crate::{args::CheckArgs, format_table, Filter, ResultExtractor};

impl CheckArgs {
    fn filter(&self) -> Option<Filter> {
        Filter::new(self.release.clone(), self.arch.clone())
    }

    fn describe_filter(&self) -> Option<String> {
        let filter = self.filter()?;
        let fields = [
            ("release", filter.release.as_deref()),
            ("arch", filter.architecture.as_deref()),
        ];
        let described: Vec<_> = fields
            .iter()
            .filter_map(|(key, value)| value.map(|value| format!("{key}={value}")))
            .collect();
        Some(described.join(" "))
    }

    /// Fetches the results of every package and prints their errors, or the
    /// whole matrix with `--all`. Returns `false` if anything failed.
    pub(crate) fn fetch_and_print(&self) -> anyhow::Result<bool> {
        let extractor = ResultExtractor::new()?;
        let filter = self.filter();
        let mut status = true;
        let mut all_results = IndexMap::new();
        for (idx, package) in self.packages.iter().enumerate() {
            if !self.json {
                if idx > 0 {
                    println!(); // vertical whitespace
                }
                println!("Autopkgtest results for {}", package.bold());
                if let Some(filter) = self.describe_filter() {
                    println!("{}", format!("Filters: {filter}").dimmed());
                }
            }
            let results = match extractor.fetch_package_results(package, filter.as_ref()) {
                Ok(results) => results,
                Err(err) => {
                    error!("could not fetch results for '{package}': {err}");
                    status = false;
                    continue;
                }
            };
            if !results.errors().is_empty() {
                status = false;
            }
            if self.json {
                all_results.insert(package.as_str(), results);
                continue; // print later
            }
            if self.all && !results.tests().is_empty() {
                println!("{}", format_table(false, results.tests()));
                println!();
            }
            println!("{}", results.report_errors());
        }
        if self.json {
            println!("{}", serde_json::to_string_pretty(&all_results)?);
        }
        Ok(status)
    }
}

#[test]
fn describe_filters() {
    let args = CheckArgs {
        packages: vec!["ovn".into()],
        release: Some("noble".into()),
        arch: Some(String::new()),
        ..Default::default()
    };
    assert_eq!(args.describe_filter().as_deref(), Some("release=noble"));

    let args = CheckArgs {
        arch: Some("s390x".into()),
        ..args
    };
    assert_eq!(
        args.describe_filter().as_deref(),
        Some("release=noble arch=s390x")
    );

    let args = CheckArgs::default();
    assert_eq!(args.describe_filter(), None);
}
