#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated keyring roots plus a config file pointing at them
pub struct Fixture {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Extra TOML appended to the generated config
    pub fn with_config(extra: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config_path = dir.path().join("config.toml");

        let config = format!(
            "cluster_name = \"test\"\n{extra}\n[paths]\netc_dir = \"{}\"\nlib_dir = \"{}\"\n",
            dir.path().join("etc/ceph").display(),
            dir.path().join("var/lib/ceph").display(),
        );
        fs::write(&config_path, config).expect("write config");

        Self { dir, config_path }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn admin_keyring(&self) -> PathBuf {
        self.root().join("etc/ceph/test.client.admin.keyring")
    }

    pub fn bootstrap_keyring(&self, role: &str) -> PathBuf {
        self.root()
            .join(format!("var/lib/ceph/bootstrap-{role}/test.keyring"))
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("ceph-keyring").expect("binary");
        cmd.arg("--config").arg(&self.config_path);
        cmd
    }
}
