//! Filesystem roots substituted into role path templates

use crate::roles::{Role, CLUSTER_PLACEHOLDER, ETC_PLACEHOLDER, LIB_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ETC_DIR: &str = "/etc/ceph";
pub const DEFAULT_LIB_DIR: &str = "/var/lib/ceph";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathLayout {
    /// Root for the admin keyring
    pub etc_dir: PathBuf,

    /// Root for bootstrap keyrings
    pub lib_dir: PathBuf,

    /// Parent for staging directories used while generating keys
    /// (None = system temp dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for PathLayout {
    fn default() -> Self {
        Self {
            etc_dir: PathBuf::from(DEFAULT_ETC_DIR),
            lib_dir: PathBuf::from(DEFAULT_LIB_DIR),
            staging_dir: None,
        }
    }
}

impl PathLayout {
    /// Layout with both roots under a single directory, mostly for tests and chroots
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            etc_dir: root.join("etc/ceph"),
            lib_dir: root.join("var/lib/ceph"),
            staging_dir: None,
        }
    }

    /// Resolve the keyring path of `role` for `cluster_name`.
    ///
    /// The cluster name is substituted verbatim; callers are responsible
    /// for passing a name that is valid in a file name.
    pub fn resolve(&self, role: Role, cluster_name: &str) -> PathBuf {
        let template = role.definition().path_template;
        let substituted = template
            .replace(ETC_PLACEHOLDER, &self.etc_dir.to_string_lossy())
            .replace(LIB_PLACEHOLDER, &self.lib_dir.to_string_lossy())
            .replace(CLUSTER_PLACEHOLDER, cluster_name);
        PathBuf::from(substituted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let layout = PathLayout::default();
        assert_eq!(
            layout.resolve(Role::Admin, "ceph"),
            PathBuf::from("/etc/ceph/ceph.client.admin.keyring")
        );
        assert_eq!(
            layout.resolve(Role::Mon, "ceph"),
            PathBuf::from("/var/lib/ceph/bootstrap-mon/ceph.keyring")
        );
        assert_eq!(
            layout.resolve(Role::Osd, "ceph"),
            PathBuf::from("/var/lib/ceph/bootstrap-osd/ceph.keyring")
        );
        assert_eq!(
            layout.resolve(Role::Mds, "ceph"),
            PathBuf::from("/var/lib/ceph/bootstrap-mds/ceph.keyring")
        );
        assert_eq!(
            layout.resolve(Role::Rgw, "ceph"),
            PathBuf::from("/var/lib/ceph/bootstrap-rgw/ceph.keyring")
        );
    }

    #[test]
    fn test_resolve_is_deterministic_and_names_cluster() {
        let layout = PathLayout::default();
        for role in Role::ALL {
            for cluster in ["ceph", "backup", "site-b"] {
                let first = layout.resolve(role, cluster);
                assert_eq!(first, layout.resolve(role, cluster));
                assert!(first.to_string_lossy().contains(cluster));
                assert!(first.is_absolute());
            }
        }
    }

    #[test]
    fn test_rooted_layout() {
        let layout = PathLayout::rooted_at(Path::new("/srv/chroot"));
        assert_eq!(
            layout.resolve(Role::Admin, "prod"),
            PathBuf::from("/srv/chroot/etc/ceph/prod.client.admin.keyring")
        );
        assert_eq!(
            layout.resolve(Role::Rgw, "prod"),
            PathBuf::from("/srv/chroot/var/lib/ceph/bootstrap-rgw/prod.keyring")
        );
    }
}
