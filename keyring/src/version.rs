//! Cluster software version detection

use crate::command::{display_command, CommandRunner};
use crate::error::{KeyringError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Major/minor/patch of the installed cluster software
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ClusterVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Releases before 0.95 default the admin keyring to a non-root auid
    /// that older daemons reject.
    pub fn needs_admin_uid_override(&self) -> bool {
        self.major == 0 && self.minor < 95
    }

    /// Parse `ceph --version` output or a bare version string.
    ///
    /// Accepts `ceph version 0.94.5 (hash)`, `12.2.13-123-gabcdef`, `0.80`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let token = match text.find("version") {
            Some(_) => tokens
                .by_ref()
                .skip_while(|t| *t != "version")
                .nth(1),
            None => tokens.next(),
        }
        .ok_or_else(|| KeyringError::Version(text.trim().to_string()))?;

        if let Ok(version) = semver::Version::parse(token) {
            return Ok(Self::from(version));
        }

        Self::parse_lenient(token)
    }

    fn parse_lenient(token: &str) -> Result<Self> {
        let numeric: String = token
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        let mut parts = numeric.split('.').filter(|p| !p.is_empty());
        let mut next = || -> Option<u64> { parts.next().and_then(|p| p.parse().ok()) };

        let major = next();
        let minor = next();
        match (major, minor) {
            (Some(major), Some(minor)) => Ok(Self::new(major, minor, next().unwrap_or(0))),
            _ => Err(KeyringError::Version(token.to_string())),
        }
    }

    /// Ask the cluster CLI for its version
    pub fn detect(runner: &dyn CommandRunner, ceph_binary: &Path) -> Result<Self> {
        let argv = vec![
            ceph_binary.to_string_lossy().into_owned(),
            "--version".to_string(),
        ];
        let output = runner.run(&argv)?;

        if !output.success() {
            return Err(KeyringError::Process(format!(
                "'{}' exited with {}: {}",
                display_command(&argv),
                output.retcode,
                output.stderr.trim()
            )));
        }

        let version = Self::parse(&output.stdout)?;
        debug!("Detected cluster version {}", version);
        Ok(version)
    }
}

impl From<semver::Version> for ClusterVersion {
    fn from(version: semver::Version) -> Self {
        Self::new(version.major, version.minor, version.patch)
    }
}

impl FromStr for ClusterVersion {
    type Err = KeyringError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ClusterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;

    struct FixedOutput(CommandOutput);

    impl CommandRunner for FixedOutput {
        fn run(&self, _argv: &[String]) -> Result<CommandOutput> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_parse_ceph_version_output() {
        let v = ClusterVersion::parse(
            "ceph version 0.94.5 (9764da52395923e0b32908d83a9f7304401fee43)\n",
        )
        .unwrap();
        assert_eq!(v, ClusterVersion::new(0, 94, 5));

        let v = ClusterVersion::parse(
            "ceph version 14.2.22 (ca74598065096e6fcbd8433c8779a2be0c889351) nautilus (stable)",
        )
        .unwrap();
        assert_eq!(v, ClusterVersion::new(14, 2, 22));
    }

    #[test]
    fn test_parse_bare_and_development_versions() {
        assert_eq!("0.80".parse::<ClusterVersion>().unwrap(), ClusterVersion::new(0, 80, 0));
        assert_eq!(
            "12.2.13-123-gabcdef0".parse::<ClusterVersion>().unwrap(),
            ClusterVersion::new(12, 2, 13)
        );
        assert_eq!(
            ClusterVersion::parse("ceph version 0.87-rc1").unwrap(),
            ClusterVersion::new(0, 87, 0)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ClusterVersion::parse("").is_err());
        assert!(ClusterVersion::parse("ceph version").is_err());
        assert!(ClusterVersion::parse("nautilus").is_err());
        assert!(ClusterVersion::parse("14").is_err());
    }

    #[test]
    fn test_admin_uid_override_window() {
        assert!(ClusterVersion::new(0, 94, 9).needs_admin_uid_override());
        assert!(ClusterVersion::new(0, 80, 0).needs_admin_uid_override());
        assert!(!ClusterVersion::new(0, 95, 0).needs_admin_uid_override());
        assert!(!ClusterVersion::new(1, 0, 0).needs_admin_uid_override());
        assert!(!ClusterVersion::new(10, 2, 0).needs_admin_uid_override());
    }

    #[test]
    fn test_detect() {
        let runner = FixedOutput(CommandOutput {
            retcode: 0,
            stdout: "ceph version 0.94.10 (b1e0532418e4631af01acbc0cedd426f1905f4af)\n".into(),
            stderr: String::new(),
        });
        let v = ClusterVersion::detect(&runner, Path::new("/usr/bin/ceph")).unwrap();
        assert_eq!(v, ClusterVersion::new(0, 94, 10));

        let failing = FixedOutput(CommandOutput {
            retcode: 1,
            stdout: String::new(),
            stderr: "not installed".into(),
        });
        assert!(ClusterVersion::detect(&failing, Path::new("/usr/bin/ceph")).is_err());
    }
}
