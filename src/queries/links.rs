//! A module that prints `request.cgi` links for manual submission.

use colored::Colorize;

use crate::args::LinkArgs;

impl LinkArgs {
    pub(crate) fn generate_and_print(&self) -> anyhow::Result<bool> {
        let request = self.to_request();
        let response = request.generate_links()?;
        println!("{request}");
        println!();
        println!("{response}");
        eprintln!();
        eprintln!(
            "{}",
            "Open the url(s) in a browser logged into Launchpad with upload rights.".dimmed()
        );
        Ok(true)
    }
}
