//! Role registry: the fixed keyring policy for each cluster identity
//!
//! Every role maps to a path template, the principal embedded in its
//! keyring and the capabilities that principal is granted. The table is
//! compiled in and never changes at runtime.

use crate::error::{KeyringError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder for the cluster name in a path template
pub const CLUSTER_PLACEHOLDER: &str = "{cluster}";

/// Placeholder for the configuration root (`/etc/ceph`)
pub const ETC_PLACEHOLDER: &str = "{etc}";

/// Placeholder for the daemon state root (`/var/lib/ceph`)
pub const LIB_PLACEHOLDER: &str = "{lib}";

/// Cluster identity a keyring belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Mon,
    Osd,
    Mds,
    Rgw,
}

/// Immutable keyring policy for one role
#[derive(Debug, PartialEq, Eq)]
pub struct RoleDefinition {
    pub role: Role,
    pub path_template: &'static str,
    pub principal_name: &'static str,
    /// `(subsystem, grant)` pairs, one per subsystem
    pub capabilities: &'static [(&'static str, &'static str)],
}

static REGISTRY: [RoleDefinition; 5] = [
    RoleDefinition {
        role: Role::Admin,
        path_template: "{etc}/{cluster}.client.admin.keyring",
        principal_name: "client.admin",
        capabilities: &[("mon", "allow *"), ("osd", "allow *"), ("mds", "allow *")],
    },
    RoleDefinition {
        role: Role::Mon,
        path_template: "{lib}/bootstrap-mon/{cluster}.keyring",
        principal_name: "mon.",
        capabilities: &[("mon", "allow *")],
    },
    RoleDefinition {
        role: Role::Osd,
        path_template: "{lib}/bootstrap-osd/{cluster}.keyring",
        principal_name: "client.bootstrap-osd",
        capabilities: &[("mon", "allow profile bootstrap-osd")],
    },
    RoleDefinition {
        role: Role::Mds,
        path_template: "{lib}/bootstrap-mds/{cluster}.keyring",
        principal_name: "client.bootstrap-mds",
        capabilities: &[("mon", "allow profile bootstrap-mds")],
    },
    RoleDefinition {
        role: Role::Rgw,
        path_template: "{lib}/bootstrap-rgw/{cluster}.keyring",
        principal_name: "client.bootstrap-rgw",
        capabilities: &[("mon", "allow profile bootstrap-rgw")],
    },
];

impl Role {
    pub const ALL: [Role; 5] = [Role::Admin, Role::Mon, Role::Osd, Role::Mds, Role::Rgw];

    /// Identifier used on the command line and in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Mon => "mon",
            Role::Osd => "osd",
            Role::Mds => "mds",
            Role::Rgw => "rgw",
        }
    }

    /// Registry entry for this role
    pub fn definition(&self) -> &'static RoleDefinition {
        match self {
            Role::Admin => &REGISTRY[0],
            Role::Mon => &REGISTRY[1],
            Role::Osd => &REGISTRY[2],
            Role::Mds => &REGISTRY[3],
            Role::Rgw => &REGISTRY[4],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = KeyringError;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| KeyringError::UnknownRole(s.to_string()))
    }
}

/// Look up the policy for a role identifier
pub fn lookup(role: &str) -> Result<&'static RoleDefinition> {
    role.parse::<Role>().map(|role| role.definition())
}
