//! ceph-keyring - create, persist and remove Ceph keyrings
//!
//! Thin command-line front end over the keyring manager. Results go to
//! stdout, logs to stderr.

use anyhow::{Context, Result};
use ceph_keyring::command::display_masked;
use ceph_keyring::format;
use ceph_keyring::manager::resolve_cluster_version;
use ceph_keyring::{
    Config, KeyringManager, LocalCommandRunner, PathLayout, RemoveOutcome, Role,
    WriteOutcome,
};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ceph-keyring")]
#[command(author, version, about = "Manage Ceph admin and bootstrap keyrings", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Cluster name (overrides config)
    #[arg(long, value_name = "NAME")]
    cluster: Option<String>,

    /// Directory holding the admin keyring (overrides config)
    #[arg(long, value_name = "DIR")]
    etc_dir: Option<PathBuf>,

    /// Directory holding bootstrap keyrings (overrides config)
    #[arg(long, value_name = "DIR")]
    lib_dir: Option<PathBuf>,

    /// Path to ceph-authtool (overrides config)
    #[arg(long, value_name = "PATH")]
    authtool: Option<PathBuf>,

    /// Cluster version, skips detection (e.g. 0.94.5)
    #[arg(long, value_name = "VERSION")]
    cluster_version: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the keyring path of a role
    Path {
        #[arg(value_enum)]
        role: Role,
    },

    /// Report whether a role's keyring exists (exit status 1 when absent)
    Present {
        #[arg(value_enum)]
        role: Role,
    },

    /// Print the ceph-authtool command line for a role
    Args {
        #[arg(value_enum)]
        role: Role,

        /// Embed this base64 secret instead of generating one
        #[arg(long)]
        secret: Option<String>,
    },

    /// Print a role's keyring, generating one if it does not exist
    Create {
        #[arg(value_enum)]
        role: Role,

        /// Embed this base64 secret instead of generating one
        #[arg(long)]
        secret: Option<String>,

        /// Also persist the generated keyring at its path
        #[arg(long)]
        write: bool,
    },

    /// Persist keyring content read from a file
    Write {
        #[arg(value_enum)]
        role: Role,

        /// Keyring file to read, "-" for stdin
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Persist a keyring built from a known secret
    WriteSecret {
        #[arg(value_enum)]
        role: Role,

        /// Base64 secret
        secret: String,
    },

    /// Delete a role's keyring
    Remove {
        #[arg(value_enum)]
        role: Role,
    },

    /// Summarize a role's keyring without printing its key
    Show {
        #[arg(value_enum)]
        role: Role,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which keyrings exist
    Status {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show current configuration
    Config {
        /// Also write the effective configuration to FILE
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
}

impl Commands {
    /// Commands whose authtool arguments depend on the cluster version
    fn needs_version(&self) -> bool {
        matches!(
            self,
            Commands::Args { role: Role::Admin, .. }
                | Commands::Create { role: Role::Admin, .. }
                | Commands::WriteSecret { role: Role::Admin, .. }
        )
    }

    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Create { write: true, .. }
                | Commands::Write { .. }
                | Commands::WriteSecret { .. }
                | Commands::Remove { .. }
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = load_config(&cli)?;
    let cluster = config.cluster_name.clone();

    let version = if cli.command.needs_version() {
        resolve_cluster_version(&config, &LocalCommandRunner)?
    } else {
        None
    };
    if let Some(version) = version {
        info!("Cluster version {}", version);
    }

    if cli.command.mutates() {
        warn_if_unprivileged(&config);
    }

    let manager = KeyringManager::from_config(&config, version);

    match cli.command {
        Commands::Path { role } => {
            println!("{}", manager.path_resolve(role, &cluster).display());
        }

        Commands::Present { role } => {
            if manager.is_present(role, &cluster) {
                println!("present");
            } else {
                println!("absent");
                std::process::exit(1);
            }
        }

        Commands::Args { role, secret } => {
            let args = manager.build_generation_args(role, &cluster, secret.as_deref());
            println!("{}", display_masked(&args));
        }

        Commands::Create {
            role,
            secret,
            write,
        } => {
            let content = manager
                .create(role, &cluster, secret.as_deref())
                .with_context(|| format!("create {} keyring", role))?;
            if write {
                match manager.write_content(role, &cluster, &content)? {
                    WriteOutcome::Written => info!("Persisted {} keyring", role),
                    WriteOutcome::AlreadyPresent => info!("{} keyring already persisted", role),
                }
            }
            print!("{}", content);
        }

        Commands::Write { role, file } => {
            let content = read_input(&file)?;
            let outcome = manager
                .write_content(role, &cluster, &content)
                .with_context(|| format!("write {} keyring", role))?;
            report_write(role, outcome);
        }

        Commands::WriteSecret { role, secret } => {
            let outcome = manager
                .write_secret(role, &cluster, Some(&secret))
                .with_context(|| format!("write {} keyring", role))?;
            report_write(role, outcome);
        }

        Commands::Remove { role } => {
            match manager
                .remove(role, &cluster)
                .with_context(|| format!("remove {} keyring", role))?
            {
                RemoveOutcome::Removed => println!("removed"),
                RemoveOutcome::AlreadyAbsent => println!("absent"),
            }
        }

        Commands::Show { role, json } => {
            let path = manager.path_resolve(role, &cluster);
            let content = format::read_keyring(&path)
                .with_context(|| format!("read {}", path.display()))?;
            let entries = format::parse(&content);

            if json {
                let summary: Vec<_> = entries
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "principal": entry.principal,
                            "fingerprint": entry.fingerprint(),
                            "caps": entry.caps,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Path: {}", path.display());
                for entry in entries {
                    println!("[{}]", entry.principal);
                    if let Some(fingerprint) = entry.fingerprint() {
                        println!("  key sha256: {}", fingerprint);
                    }
                    for (subsystem, grant) in &entry.caps {
                        println!("  caps {}: {}", subsystem, grant);
                    }
                }
            }
        }

        Commands::Status { json } => {
            let status = manager.status(&cluster);
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                for entry in status {
                    println!(
                        "{:<6} {:<21} {:<8} {}",
                        entry.role.as_str(),
                        entry.principal,
                        if entry.present { "present" } else { "absent" },
                        entry.path.display()
                    );
                }
            }
        }

        Commands::Config { save } => {
            if let Some(path) = save {
                config
                    .save(&path)
                    .with_context(|| format!("save configuration to {}", path.display()))?;
                info!("Configuration saved to {:?}", path);
            }
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Load the config file and apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("load configuration")?;

    if let Some(cluster) = &cli.cluster {
        config.cluster_name = cluster.clone();
    }
    if let Some(dir) = &cli.etc_dir {
        config.paths.etc_dir = dir.clone();
    }
    if let Some(dir) = &cli.lib_dir {
        config.paths.lib_dir = dir.clone();
    }
    if let Some(path) = &cli.authtool {
        config.tools.authtool = Some(path.clone());
    }
    if let Some(version) = &cli.cluster_version {
        config.cluster_version = Some(version.clone());
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn read_input(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("read keyring from stdin")?;
        Ok(content)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("read {}", file.display()))
    }
}

fn report_write(role: Role, outcome: WriteOutcome) {
    match outcome {
        WriteOutcome::Written => println!("written"),
        WriteOutcome::AlreadyPresent => {
            info!("{} keyring already present, left unchanged", role);
            println!("present");
        }
    }
}

fn warn_if_unprivileged(config: &Config) {
    #[cfg(unix)]
    {
        let system_paths = config.paths.etc_dir == PathLayout::default().etc_dir
            || config.paths.lib_dir == PathLayout::default().lib_dir;
        if system_paths && !nix::unistd::Uid::effective().is_root() {
            warn!("Not running as root; writing under system keyring directories will likely fail");
        }
    }

    #[cfg(not(unix))]
    let _ = config;
}
