//! Keyring manager - locates, generates, persists and removes keyrings
//!
//! A keyring is either absent or present on disk. Every mutating operation
//! checks presence first and leaves an existing keyring untouched.
//!
//! Presence is checked and acted upon without locking. Two processes racing
//! on the same role and cluster can both observe an absent keyring.

use crate::command::{display_masked, find_tool, CommandRunner, LocalCommandRunner};
use crate::config::{Config, AUTHTOOL_NAME, CEPH_CLI_NAME};
use crate::error::{KeyringError, Result};
use crate::format;
use crate::layout::PathLayout;
use crate::roles::Role;
use crate::version::ClusterVersion;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// File name of the generated keyring inside a staging directory
const STAGED_KEYRING_NAME: &str = "keyring";

/// One keyring operation's inputs. The path is derived on demand so the
/// filesystem stays the only source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringRecord {
    pub role: Role,
    pub cluster_name: String,
    /// Base64 key to embed instead of generating one
    pub secret: Option<String>,
}

impl KeyringRecord {
    pub fn new(role: Role, cluster_name: &str, secret: Option<&str>) -> Self {
        Self {
            role,
            cluster_name: cluster_name.to_string(),
            secret: secret
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }

    pub fn resolved_path(&self, layout: &PathLayout) -> PathBuf {
        layout.resolve(self.role, &self.cluster_name)
    }
}

/// Result of a write operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    AlreadyPresent,
}

/// Result of a remove operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    AlreadyAbsent,
}

/// Presence of one role's keyring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyringStatus {
    pub role: Role,
    pub principal: &'static str,
    pub path: PathBuf,
    pub present: bool,
}

/// Manages keyrings on the local host
pub struct KeyringManager<R: CommandRunner = LocalCommandRunner> {
    layout: PathLayout,
    authtool: PathBuf,
    version: Option<ClusterVersion>,
    runner: R,
}

impl KeyringManager<LocalCommandRunner> {
    /// Build a manager that runs the local ceph-authtool.
    ///
    /// A missing tool is not fatal here; operations that need it fail when
    /// they try to run it.
    pub fn from_config(config: &Config, version: Option<ClusterVersion>) -> Self {
        let authtool = match &config.tools.authtool {
            Some(path) => path.clone(),
            None => find_tool(None, AUTHTOOL_NAME).unwrap_or_else(|e| {
                debug!("{}", e);
                PathBuf::from(AUTHTOOL_NAME)
            }),
        };

        Self::new(config.paths.clone(), authtool, version, LocalCommandRunner)
    }
}

impl<R: CommandRunner> KeyringManager<R> {
    pub fn new(
        layout: PathLayout,
        authtool: PathBuf,
        version: Option<ClusterVersion>,
        runner: R,
    ) -> Self {
        debug!("Key generation tool: {:?}", authtool);
        Self {
            layout,
            authtool,
            version,
            runner,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Principal name embedded in the role's keyring
    pub fn identity(&self, role: Role) -> &'static str {
        role.definition().principal_name
    }

    /// Path of the role's keyring for `cluster_name`
    pub fn path_resolve(&self, role: Role, cluster_name: &str) -> PathBuf {
        KeyringRecord::new(role, cluster_name, None).resolved_path(&self.layout)
    }

    /// True iff a regular file exists at the resolved path
    pub fn is_present(&self, role: Role, cluster_name: &str) -> bool {
        self.path_resolve(role, cluster_name).is_file()
    }

    /// Presence of every role's keyring
    pub fn status(&self, cluster_name: &str) -> Vec<KeyringStatus> {
        Role::ALL
            .into_iter()
            .map(|role| {
                let path = self.path_resolve(role, cluster_name);
                KeyringStatus {
                    role,
                    principal: self.identity(role),
                    present: path.is_file(),
                    path,
                }
            })
            .collect()
    }

    /// Command line that generates the role's keyring at its resolved path
    pub fn build_generation_args(
        &self,
        role: Role,
        cluster_name: &str,
        secret: Option<&str>,
    ) -> Vec<String> {
        let record = KeyringRecord::new(role, cluster_name, secret);
        self.generation_args(&record, &record.resolved_path(&self.layout))
    }

    fn generation_args(&self, record: &KeyringRecord, output: &Path) -> Vec<String> {
        let definition = record.role.definition();

        let mut args = vec![
            self.authtool.to_string_lossy().into_owned(),
            "-n".to_string(),
            definition.principal_name.to_string(),
            "--create-keyring".to_string(),
            output.to_string_lossy().into_owned(),
        ];

        match &record.secret {
            Some(secret) => {
                args.push("--add-key".to_string());
                args.push(secret.clone());
            }
            None => args.push("--gen-key".to_string()),
        }

        args.extend(self.extra_args(record.role));

        for (subsystem, grant) in definition.capabilities {
            args.push("--cap".to_string());
            args.push(subsystem.to_string());
            args.push(grant.to_string());
        }

        args
    }

    /// Role-specific flags. Old clusters give the admin key a non-root auid
    /// that legacy daemons refuse.
    fn extra_args(&self, role: Role) -> Vec<String> {
        match (role, self.version) {
            (Role::Admin, Some(version)) if version.needs_admin_uid_override() => {
                vec!["--set-uid=0".to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// Return the role's keyring content, generating a fresh keyring in a
    /// staging directory when none exists.
    ///
    /// An existing keyring is returned unchanged and the tool is not run.
    /// A generated keyring is not placed at the resolved path.
    pub fn create(&self, role: Role, cluster_name: &str, secret: Option<&str>) -> Result<String> {
        let record = KeyringRecord::new(role, cluster_name, secret);
        let path = record.resolved_path(&self.layout);

        if path.is_file() {
            debug!("Keyring {:?} already present, returning it", path);
            return Ok(format::read_keyring(&path)?);
        }

        let staging = self.staging_dir()?;
        let staged_path = staging.path().join(STAGED_KEYRING_NAME);
        if staged_path.to_str().is_none() {
            return Err(KeyringError::Config(format!(
                "staging path {:?} is not valid UTF-8",
                staged_path
            )));
        }

        let args = self.generation_args(&record, &staged_path);
        self.run_authtool(&args)?;

        let content = format::read_keyring(&staged_path).map_err(|e| {
            KeyringError::Process(format!(
                "'{}' exited 0 but wrote no keyring at {:?}: {}",
                display_masked(&args),
                staged_path,
                e
            ))
        })?;
        info!("Generated {} keyring for cluster {}", role, cluster_name);
        Ok(content)
    }

    /// Persist caller-supplied keyring content at the resolved path
    pub fn write_content(
        &self,
        role: Role,
        cluster_name: &str,
        content: &str,
    ) -> Result<WriteOutcome> {
        let path = self.path_resolve(role, cluster_name);

        if path.is_file() {
            warn!("Keyring {:?} already present, not overwriting", path);
            return Ok(WriteOutcome::AlreadyPresent);
        }

        ensure_parent_dir(&path)?;

        match format::write_keyring(&path, content) {
            Ok(()) => {
                info!("Wrote {} keyring to {:?}", role, path);
                Ok(WriteOutcome::Written)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!("Keyring {:?} appeared concurrently, not overwriting", path);
                Ok(WriteOutcome::AlreadyPresent)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Generate the role's keyring from a known secret directly at the
    /// resolved path
    pub fn write_secret(
        &self,
        role: Role,
        cluster_name: &str,
        secret: Option<&str>,
    ) -> Result<WriteOutcome> {
        let record = KeyringRecord::new(role, cluster_name, secret);
        let path = record.resolved_path(&self.layout);

        if path.is_file() {
            warn!("Keyring {:?} already present, not overwriting", path);
            return Ok(WriteOutcome::AlreadyPresent);
        }

        if record.secret.is_none() {
            return Err(KeyringError::InvalidSecret);
        }

        ensure_parent_dir(&path)?;

        let args = self.generation_args(&record, &path);
        self.run_authtool(&args)?;

        info!("Wrote {} keyring to {:?}", role, path);
        Ok(WriteOutcome::Written)
    }

    /// Delete the role's keyring
    pub fn remove(&self, role: Role, cluster_name: &str) -> Result<RemoveOutcome> {
        let path = self.path_resolve(role, cluster_name);

        if !path.is_file() {
            debug!("Keyring {:?} absent, nothing to remove", path);
            return Ok(RemoveOutcome::AlreadyAbsent);
        }

        info!("Removing: {:?}", path);
        let result = fs::remove_file(&path);
        removal_outcome(path, result)
    }

    fn staging_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ceph-keyring-");

        let dir = match &self.layout.staging_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        debug!("Staging keyring in {:?}", dir.path());
        Ok(dir)
    }

    fn run_authtool(&self, args: &[String]) -> Result<()> {
        let command = display_masked(args);
        debug!("Running {}", command);

        let output = self.runner.run(args)?;
        if !output.success() {
            return Err(KeyringError::Generation {
                command,
                retcode: output.retcode,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(())
    }
}

/// Resolve the cluster version: pinned in config, else asked of the ceph CLI.
/// Detection failures are logged and yield None.
pub fn resolve_cluster_version(
    config: &Config,
    runner: &dyn CommandRunner,
) -> Result<Option<ClusterVersion>> {
    if let Some(version) = config.pinned_version()? {
        return Ok(Some(version));
    }

    let detected = find_tool(config.tools.ceph.as_deref(), CEPH_CLI_NAME)
        .and_then(|ceph| ClusterVersion::detect(runner, &ceph));

    match detected {
        Ok(version) => Ok(Some(version)),
        Err(e) => {
            warn!("Could not detect cluster version: {}", e);
            Ok(None)
        }
    }
}

/// A keyring that vanished before the unlink counts as already absent
fn removal_outcome(path: PathBuf, result: io::Result<()>) -> Result<RemoveOutcome> {
    match result {
        Ok(()) => Ok(RemoveOutcome::Removed),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RemoveOutcome::AlreadyAbsent),
        Err(source) => Err(KeyringError::Deletion { path, source }),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.is_dir() {
            debug!("Creating {:?}", parent);
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
