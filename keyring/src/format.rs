//! Keyring text format
//!
//! ```text
//! [client.admin]
//! 	key = AQBx...==
//! 	caps mon = "allow *"
//! ```
//!
//! Section headers start at column zero, every other line is indented by a
//! single tab. This matches what `ceph-authtool` writes and reads back.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// File mode for keyrings we write ourselves
#[cfg(unix)]
const KEYRING_FILE_MODE: u32 = 0o600;

/// Normalize caller-supplied keyring content.
///
/// Lines are trimmed, blank lines dropped, headers kept as-is and every
/// other line indented with exactly one tab.
pub fn serialize_content(content: &str) -> String {
    let mut output = String::with_capacity(content.len());

    for line in content.split('\n') {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if !stripped.starts_with('[') {
            output.push('\t');
        }
        output.push_str(stripped);
        output.push('\n');
    }

    output
}

/// Read a keyring file verbatim
pub fn read_keyring(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

/// Serialize `content` into a new file at `path`.
///
/// Fails with `AlreadyExists` rather than truncating an existing file.
pub fn write_keyring(path: &Path, content: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(KEYRING_FILE_MODE);
    }

    let mut file = options.open(path)?;
    file.write_all(serialize_content(content).as_bytes())?;
    file.sync_all()?;

    debug!("Wrote keyring {:?}", path);
    Ok(())
}

/// One `[principal]` section of a keyring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyringEntry {
    pub principal: String,

    #[serde(skip)]
    pub key: Option<String>,

    /// Capability grants by subsystem
    pub caps: BTreeMap<String, String>,

    /// Any other `name = value` lines (e.g. `auid`)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl KeyringEntry {
    /// SHA-256 of the base64 key, hex encoded. Safe to print.
    pub fn fingerprint(&self) -> Option<String> {
        self.key.as_ref().map(|key| {
            let mut hasher = Sha256::new();
            hasher.update(key.as_bytes());
            hex::encode(hasher.finalize())
        })
    }
}

/// Parse keyring text into its sections.
///
/// Lines outside any section and lines without `=` are skipped.
pub fn parse(content: &str) -> Vec<KeyringEntry> {
    let mut entries: Vec<KeyringEntry> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let principal = header.trim_end_matches(']').trim();
            entries.push(KeyringEntry {
                principal: principal.to_string(),
                ..Default::default()
            });
            continue;
        }

        let Some(entry) = entries.last_mut() else {
            debug!("Ignoring keyring line outside of a section");
            continue;
        };

        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let value = unquote(value.trim());

        if name == "key" {
            entry.key = Some(value.to_string());
        } else if let Some(subsystem) = name.strip_prefix("caps") {
            entry
                .caps
                .insert(subsystem.trim().to_string(), value.to_string());
        } else {
            entry.attributes.insert(name.to_string(), value.to_string());
        }
    }

    entries
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_trims_and_indents() {
        let input = "[client.admin]\n  key = ABC \n\n caps mon = \"allow *\"\n";
        assert_eq!(
            serialize_content(input),
            "[client.admin]\n\tkey = ABC\n\tcaps mon = \"allow *\"\n"
        );
    }

    #[test]
    fn test_serialize_handles_crlf_and_tabs() {
        let input = "\t[mon.]\r\n\t\tkey = XYZ==\r\n\r\n\tcaps mon = \"allow *\"";
        assert_eq!(
            serialize_content(input),
            "[mon.]\n\tkey = XYZ==\n\tcaps mon = \"allow *\"\n"
        );
    }

    #[test]
    fn test_serialize_empty_content() {
        assert_eq!(serialize_content(""), "");
        assert_eq!(serialize_content("\n  \n\t\n"), "");
    }

    #[test]
    fn test_write_keyring_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ceph.keyring");

        write_keyring(&path, "[mon.]\nkey = FIRST\n").unwrap();
        let err = write_keyring(&path, "[mon.]\nkey = SECOND\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        assert_eq!(read_keyring(&path).unwrap(), "[mon.]\n\tkey = FIRST\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_keyring_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ceph.keyring");
        write_keyring(&path, "[mon.]\nkey = K\n").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_parse_authtool_output() {
        let content = "[client.admin]\n\tkey = AQBx9VJg==\n\tauid = 0\n\tcaps mds = \"allow *\"\n\tcaps mon = \"allow *\"\n\tcaps osd = \"allow *\"\n";
        let entries = parse(content);
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.principal, "client.admin");
        assert_eq!(entry.key.as_deref(), Some("AQBx9VJg=="));
        assert_eq!(entry.caps.len(), 3);
        assert_eq!(entry.caps["mon"], "allow *");
        assert_eq!(entry.attributes["auid"], "0");
    }

    #[test]
    fn test_parse_multiple_sections_and_unquoted_caps() {
        let content = "[mon.]\nkey = A==\ncaps mon = allow *\n[client.bootstrap-osd]\nkey = B==\n";
        let entries = parse(content);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].caps["mon"], "allow *");
        assert_eq!(entries[1].principal, "client.bootstrap-osd");
        assert!(entries[1].caps.is_empty());
    }

    #[test]
    fn test_fingerprint_hides_key() {
        let entry = KeyringEntry {
            principal: "mon.".into(),
            key: Some("AQAAsecret==".into()),
            ..Default::default()
        };
        let fingerprint = entry.fingerprint().unwrap();
        assert_eq!(fingerprint.len(), 64);
        assert!(!fingerprint.contains("AQAAsecret"));
        assert_eq!(KeyringEntry::default().fingerprint(), None);
    }
}
