use clap::{arg, command, value_parser, Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use flexi_logger::Logger;
use log::{debug, warn};
use regex::Regex;
use std::{path::PathBuf, sync::LazyLock, time::Duration};

use crate::{constants, log_format, LinkRequest};

#[derive(Parser, Debug, Default)]
#[command(author, version, verbatim_doc_comment)]
#[allow(rustdoc::bare_urls, clippy::doc_markdown)]
#[deny(missing_docs)]
///
/// Check and trigger autopkgtest runs on autopkgtest.ubuntu.com
///
/// Examples:
///   autopkgtest-cli check ovn
///   autopkgtest-cli check ovn --release noble --arch amd64
///   autopkgtest-cli generate-trigger-link -p ovn -s noble --arch amd64,arm64
///   autopkgtest-cli trigger -p ovn -s noble --credentials ~/.autopkgtest-cookie --wait
///
/// Requests only go through for Launchpad users allowed to upload the
/// package. Log in at https://autopkgtest.ubuntu.com/login and save the
/// value of the `session` cookie to a file to use `trigger`.
///
/// Set AUTOPKGTEST_HOST_URL to talk to another instance.
///
pub struct AutopkgtestCli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Print more debugging information
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print generated completions for a given shell
    #[arg(long = "shell-completion", exclusive = true, value_parser = value_parser!(Shell))]
    shell: Option<Shell>,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Report failing tests in the results matrix of packages
    Check(CheckArgs),
    /// Print request.cgi links to open in a logged in browser
    GenerateTriggerLink(LinkArgs),
    /// Submit test requests with a stored session cookie
    Trigger(TriggerArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct CheckArgs {
    #[arg(id = "PACKAGES", required = true)]
    pub(crate) packages: Vec<String>,

    /// Only consider results for this release, e.g. noble
    #[arg(short, long)]
    pub(crate) release: Option<String>,

    /// Only consider results for this architecture, e.g. amd64
    #[arg(short, long)]
    pub(crate) arch: Option<String>,

    /// Print every result, not only the failing ones
    #[arg(long)]
    pub(crate) all: bool,

    /// Output json
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct LinkArgs {
    /// Source package to test
    #[arg(short, long)]
    pub(crate) package: String,

    /// Release to test in, e.g. noble
    #[arg(short, long)]
    pub(crate) suite: String,

    /// Version of the package that triggers the run
    #[arg(long)]
    pub(crate) version: Option<String>,

    /// Comma separated architectures, one request each [default: all]
    #[arg(short, long = "arch", value_delimiter = ',', value_parser = trimmed)]
    pub(crate) architectures: Vec<String>,

    /// Comma separated triggers, e.g. systemd/259-1ubuntu3 (overrides --version)
    #[arg(short, long = "trigger", value_delimiter = ',', value_parser = trimmed)]
    pub(crate) triggers: Vec<String>,

    /// PPA to test against, as owner/name
    #[arg(long)]
    pub(crate) ppa: Option<String>,

    /// Install every package from the proposed pocket
    #[arg(long)]
    pub(crate) all_proposed: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct TriggerArgs {
    #[command(flatten)]
    pub(crate) link: LinkArgs,

    /// File holding the value of the `session` cookie
    #[arg(long, value_name = "FILE")]
    pub(crate) credentials: Option<PathBuf>,

    /// Wait for the runs to finish and report their verdict
    #[arg(long)]
    pub(crate) wait: bool,

    /// How long to wait, e.g. 2h, 1h30m or 90 (seconds)
    #[arg(long, default_value = "2h", value_parser = parse_duration)]
    pub(crate) timeout: Duration,

    /// How often to poll while waiting
    #[arg(long, default_value = "60s", value_parser = parse_duration)]
    pub(crate) poll_interval: Duration,
}

#[allow(clippy::unnecessary_wraps)]
fn trimmed(value: &str) -> Result<String, String> {
    Ok(value.trim().into())
}

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s?)?$").expect("the regex should be valid")
});

fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let invalid = || format!("invalid duration '{value}', expected e.g. 2h, 1h30m, 45s or 90");
    let captures = match DURATION.captures(value) {
        Some(captures) if !value.is_empty() => captures,
        _ => return Err(invalid()),
    };
    let mut seconds: u64 = 0;
    for (idx, factor) in [(1, 3600), (2, 60), (3, 1)] {
        if let Some(number) = captures.get(idx) {
            let number: u64 = number.as_str().parse().map_err(|_| invalid())?;
            seconds = number
                .checked_mul(factor)
                .and_then(|x| x.checked_add(seconds))
                .ok_or_else(invalid)?;
        }
    }
    Ok(Duration::from_secs(seconds))
}

impl LinkArgs {
    /// The request the flags describe, with empty list entries dropped.
    pub(crate) fn to_request(&self) -> LinkRequest {
        let non_empty = |values: &[String]| -> Vec<String> {
            values.iter().filter(|x| !x.is_empty()).cloned().collect()
        };
        let architectures = non_empty(&self.architectures);
        for arch in &architectures {
            if !constants::KNOWN_ARCHITECTURES.contains(&arch.as_str()) {
                warn!(
                    "unknown --arch '{arch}', {}: {:?}",
                    "consider specifying one of the following known architectures",
                    constants::KNOWN_ARCHITECTURES
                );
            }
        }
        LinkRequest {
            package: self.package.trim().into(),
            suite: self.suite.trim().into(),
            version: self.version.clone().filter(|x| !x.trim().is_empty()),
            triggers: non_empty(&self.triggers),
            architectures,
            ppa: self.ppa.clone().filter(|x| !x.trim().is_empty()),
            all_proposed: self.all_proposed,
        }
    }
}

impl AutopkgtestCli {
    /// Parses the command line flags and prints shell completions if asked for.
    pub(crate) fn parse_and_complete() -> anyhow::Result<Self> {
        let args = Self::parse();
        if let Some(shell) = args.shell {
            let mut cmd = Self::command();
            let bin_name = cmd.get_name().to_string();
            let mut buf = Vec::new();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut buf);
            let completion_text = String::from_utf8(buf)?;
            print!(
                "{}",
                match shell {
                    // hack to provide arch completions for zsh
                    Shell::Zsh => {
                        let arch_options =
                            format!("ARCH:({})", constants::KNOWN_ARCHITECTURES.join(" "));
                        completion_text.replace("ARCH:_default", &arch_options)
                    }
                    _ => completion_text,
                }
            );
            std::process::exit(0);
        }
        Ok(args)
    }

    /// Sets the log level, then runs the subcommand.
    pub(crate) fn run(self) -> anyhow::Result<bool> {
        let log_level = match self.verbose {
            false => log::LevelFilter::Info,
            true => log::LevelFilter::Trace,
        };
        Logger::with(log_level).format(log_format).start()?;
        debug!("{self:?}");
        match self.command {
            Some(Command::Check(args)) => args.fetch_and_print(),
            Some(Command::GenerateTriggerLink(args)) => args.generate_and_print(),
            Some(Command::Trigger(args)) => args.trigger_and_print(),
            None => {
                Self::command().print_help()?;
                Ok(false)
            }
        }
    }

    /// Runs the program and provides an exit code (with possible errors).
    pub fn execute() -> anyhow::Result<bool> {
        Self::parse_and_complete()?.run()
    }
}

#[test]
fn split_and_trim_lists() {
    let args = AutopkgtestCli::parse_from([
        "autopkgtest-cli",
        "generate-trigger-link",
        "-p",
        "myapp",
        "-s",
        "noble",
        "--arch",
        "amd64, arm64,",
        "--trigger",
        "systemd/259-1ubuntu3 , dhcpcd/1:10.3.0-7",
    ]);
    let Some(Command::GenerateTriggerLink(link)) = args.command else {
        panic!("expected generate-trigger-link");
    };
    let request = link.to_request();
    assert_eq!(request.architectures, ["amd64", "arm64"]);
    assert_eq!(
        request.triggers,
        ["systemd/259-1ubuntu3", "dhcpcd/1:10.3.0-7"]
    );
    assert_eq!(request.version, None);
    assert!(!request.all_proposed);
}

#[test]
fn trigger_defaults() {
    let args = AutopkgtestCli::parse_from([
        "autopkgtest-cli",
        "trigger",
        "--package",
        "ovn",
        "--suite",
        "noble",
        "--ppa",
        "user/my-ppa",
        "--all-proposed",
        "-v",
    ]);
    assert!(args.verbose);
    let Some(Command::Trigger(trigger)) = args.command else {
        panic!("expected trigger");
    };
    assert_eq!(trigger.timeout, Duration::from_secs(2 * 3600));
    assert_eq!(trigger.poll_interval, Duration::from_secs(60));
    assert!(!trigger.wait);
    assert_eq!(trigger.credentials, None);
    let request = trigger.link.to_request();
    assert_eq!(request.ppa.as_deref(), Some("user/my-ppa"));
    assert!(request.all_proposed);
    assert!(request.architectures.is_empty());
}

#[test]
fn durations() {
    for (input, seconds) in [
        ("2h", 7200),
        ("1h30m", 5400),
        ("45s", 45),
        ("90", 90),
        ("1h2m3s", 3723),
        ("10m", 600),
    ] {
        assert_eq!(parse_duration(input), Ok(Duration::from_secs(seconds)), "{input}");
    }
    for input in ["", "h", "1d", "-5", "1.5h", "30s1m"] {
        assert!(parse_duration(input).is_err(), "{input}");
    }
}

#[test]
fn check_requires_packages() {
    assert!(AutopkgtestCli::try_parse_from(["autopkgtest-cli", "check"]).is_err());
    let args = AutopkgtestCli::try_parse_from(["autopkgtest-cli", "check", "ovn", "--all"]).unwrap();
    let Some(Command::Check(check)) = args.command else {
        panic!("expected check");
    };
    assert_eq!(check.packages, ["ovn"]);
    assert!(check.all && !check.json);
}
