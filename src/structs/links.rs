//! Building `request.cgi` links that ask the service to schedule a test.
//!
//! The links are pure data: opening one in a browser session that is logged
//! into Launchpad (with upload rights for the package) submits the request,
//! and [`TriggerClient::trigger_test`][crate::TriggerClient::trigger_test]
//! does the same with a stored session cookie.

use std::fmt::Display;
use url::Url;

#[cfg(test)]
use insta::assert_snapshot;

use crate::{constants, Error, Result};

/// What to test, and against which releases, architectures and archives.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    /// Source package to test (required).
    pub package: String,
    /// Release codename, e.g. `noble` (required).
    pub suite: String,
    /// Version of the package that triggers the run.
    pub version: Option<String>,
    /// Explicit triggers such as `systemd/259-1ubuntu3`; override `version`.
    pub triggers: Vec<String>,
    /// One link is generated per architecture; empty means all of them.
    pub architectures: Vec<String>,
    /// Archive to test against, as `owner/name`.
    pub ppa: Option<String>,
    /// Install everything from the proposed pocket.
    pub all_proposed: bool,
}

/// Links generated for a [`LinkRequest`].
#[derive(Debug, Clone)]
pub struct LinkResponse {
    /// One url per requested architecture, in request order.
    pub urls: Vec<Url>,
    /// Human readable summary.
    pub message: String,
}

impl LinkRequest {
    /// The `trigger` parameter: explicit triggers joined by a space, else
    /// `<package>/<version>`, else the migration reference.
    #[must_use]
    pub fn trigger(&self) -> String {
        match (self.triggers.as_slice(), self.version.as_deref()) {
            (triggers, _) if !triggers.is_empty() => triggers.join(" "),
            (_, Some(version)) if !version.is_empty() => format!("{}/{version}", self.package),
            _ => constants::DEFAULT_TRIGGER.into(),
        }
    }

    /// Builds one request url per architecture, or a single url for all
    /// architectures when none is given.
    pub fn generate_links(&self) -> Result<LinkResponse> {
        if self.package.is_empty() {
            return Err(Error::Validation("package name is required".into()));
        }
        if self.suite.is_empty() {
            return Err(Error::Validation("suite (release) is required".into()));
        }
        let trigger = self.trigger();
        if self.architectures.is_empty() {
            let url = self.build_url(&trigger, None)?;
            return Ok(LinkResponse {
                urls: vec![url],
                message: format!(
                    "Generated trigger URL for package '{}' on {} (all architectures)",
                    self.package, self.suite
                ),
            });
        }
        let urls = self
            .architectures
            .iter()
            .map(|arch| self.build_url(&trigger, Some(arch)))
            .collect::<Result<Vec<_>>>()?;
        let message = format!(
            "Generated {} trigger URL(s) for package '{}' on {} ({})",
            urls.len(),
            self.package,
            self.suite,
            self.architectures.join(", ")
        );
        Ok(LinkResponse { urls, message })
    }

    fn build_url(&self, trigger: &str, arch: Option<&str>) -> Result<Url> {
        let mut params = vec![
            ("release", self.suite.as_str()),
            ("package", self.package.as_str()),
            ("trigger", trigger),
        ];
        if let Some(arch) = arch.filter(|x| !x.is_empty()) {
            params.push(("arch", arch));
        }
        if let Some(ppa) = self.ppa.as_deref().filter(|x| !x.is_empty()) {
            params.push(("ppa", ppa));
        }
        if self.all_proposed {
            params.push(("all-proposed", "1"));
        }
        Ok(Url::parse_with_params(constants::REQUEST_URL, params)?)
    }
}

impl Display for LinkRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Package:\t{}", self.package)?;
        write!(f, "Suite:\t{}", self.suite)?;
        if let Some(version) = self.version.as_deref().filter(|x| !x.is_empty()) {
            write!(f, "\nVersion:\t{version}")?;
        }
        if !self.triggers.is_empty() {
            write!(f, "\nTrigger(s):\t{}", self.triggers.join(", "))?;
        }
        match self.architectures.is_empty() {
            true => write!(f, "\nArch(s):\tall")?,
            false => write!(f, "\nArch(s):\t{}", self.architectures.join(", "))?,
        }
        if let Some(ppa) = self.ppa.as_deref().filter(|x| !x.is_empty()) {
            write!(f, "\nPPA:\t{ppa}")?;
        }
        if self.all_proposed {
            write!(f, "\nAll-Proposed:\tyes")?;
        }
        Ok(())
    }
}

/// The first value of the query parameter `key` of a request url.
pub(crate) fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

impl Display for LinkResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}\n", self.message)?;
        match self.urls.as_slice() {
            [url] => write!(f, "Trigger URL:\n{url}"),
            urls => {
                write!(f, "Trigger URLs:")?;
                for (idx, url) in urls.iter().enumerate() {
                    write!(f, "\n{}. {url}", idx + 1)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
fn request(package: &str, suite: &str) -> LinkRequest {
    LinkRequest {
        package: package.into(),
        suite: suite.into(),
        ..Default::default()
    }
}

#[test]
fn requires_package_and_suite() {
    let err = request("", "noble").generate_links().unwrap_err();
    assert_eq!(err.to_string(), "package name is required");
    let err = request("testpkg", "").generate_links().unwrap_err();
    assert_eq!(err.to_string(), "suite (release) is required");
}

#[test]
fn default_trigger() {
    let response = request("testpkg", "noble").generate_links().unwrap();
    assert_eq!(response.urls.len(), 1);
    let url = response.urls[0].as_str();
    assert!(url.starts_with("https://autopkgtest.ubuntu.com/request.cgi?"));
    assert!(url.contains("package=testpkg"), "{url}");
    assert!(url.contains("release=noble"), "{url}");
    assert!(url.contains("trigger=migration-reference%2F0"), "{url}");
    assert_eq!(query_value(&response.urls[0], "arch"), None);
}

#[test]
fn version_trigger() {
    let response = LinkRequest {
        version: Some("1.2.3-1".into()),
        ..request("testpkg", "jammy")
    }
    .generate_links()
    .unwrap();
    let url = &response.urls[0];
    assert!(url.as_str().contains("trigger=testpkg%2F1.2.3-1"), "{url}");
    assert_eq!(query_value(url, "trigger").unwrap(), "testpkg/1.2.3-1");
}

#[test]
fn explicit_triggers_win_over_version() {
    let req = LinkRequest {
        version: Some("1.2.3-1".into()),
        triggers: vec!["systemd/259-1ubuntu3".into(), "dhcpcd/1:10.3.0-7".into()],
        ..request("myapp", "noble")
    };
    let response = req.generate_links().unwrap();
    let url = &response.urls[0];
    assert_eq!(
        query_value(url, "trigger").unwrap(),
        "systemd/259-1ubuntu3 dhcpcd/1:10.3.0-7"
    );
    assert!(url
        .as_str()
        .contains("trigger=systemd%2F259-1ubuntu3+dhcpcd%2F1%3A10.3.0-7"));
}

#[test]
fn one_link_per_architecture() {
    let req = LinkRequest {
        architectures: vec!["amd64".into(), "arm64".into(), "s390x".into()],
        ..request("testpkg", "noble")
    };
    let response = req.generate_links().unwrap();
    let archs: Vec<_> = response
        .urls
        .iter()
        .map(|url| query_value(url, "arch").unwrap())
        .collect();
    assert_eq!(archs, ["amd64", "arm64", "s390x"]);
    assert_snapshot!(
        response.message,
        @"Generated 3 trigger URL(s) for package 'testpkg' on noble (amd64, arm64, s390x)"
    );
}

#[test]
fn ppa_and_all_proposed() {
    let req = LinkRequest {
        ppa: Some("user/my-ppa".into()),
        all_proposed: true,
        architectures: vec!["amd64".into()],
        ..request("testpkg", "noble")
    };
    let response = req.generate_links().unwrap();
    assert_eq!(
        response.urls[0].as_str(),
        "https://autopkgtest.ubuntu.com/request.cgi?release=noble&package=testpkg\
         &trigger=migration-reference%2F0&arch=amd64&ppa=user%2Fmy-ppa&all-proposed=1"
    );
    // encoding is byte-stable for the same input
    assert_eq!(req.generate_links().unwrap().urls, response.urls);
}

#[test]
fn format_request_and_response() {
    let req = LinkRequest {
        version: Some("24.03.2-0ubuntu0.24.04.1".into()),
        architectures: vec!["amd64".into(), "arm64".into()],
        ppa: Some("user/ovn-fixes".into()),
        ..request("ovn", "noble")
    };
    assert_snapshot!(req.to_string(), @r"
    Package:	ovn
    Suite:	noble
    Version:	24.03.2-0ubuntu0.24.04.1
    Arch(s):	amd64, arm64
    PPA:	user/ovn-fixes
    ");
    let response = request("ovn", "noble").generate_links().unwrap();
    assert_snapshot!(response.to_string(), @r"
    Generated trigger URL for package 'ovn' on noble (all architectures)

    Trigger URL:
    https://autopkgtest.ubuntu.com/request.cgi?release=noble&package=ovn&trigger=migration-reference%2F0
    ");
}
