//! Republishing the CRL to the location read by the OpenVPN server.
//!
//! The server drops privileges after start-up and reads `crl.pem` on every
//! new connection, so the published copy must be owned by the unprivileged
//! user (`nobody:nogroup` on Debian-style installs).

use std::path::{Path, PathBuf};

use crate::error::PkiError;

/// Owner applied to the published CRL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlOwner {
    pub user: String,
    pub group: String,
}

impl Default for CrlOwner {
    fn default() -> Self {
        Self {
            user: "nobody".to_string(),
            group: "nogroup".to_string(),
        }
    }
}

/// Copy a freshly generated CRL over the published one.
///
/// The new file is staged next to the destination, given its ownership,
/// then renamed over the old copy so the server never sees a missing or
/// half-written CRL.
pub fn publish(source: &Path, dest: &Path, owner: Option<&CrlOwner>) -> Result<(), PkiError> {
    let fail = |reason: String| PkiError::CrlPublish {
        path: dest.to_path_buf(),
        reason,
    };

    let staged = staging_path(dest);
    std::fs::copy(source, &staged)
        .map_err(|e| fail(format!("copy from {}: {e}", source.display())))?;

    if let Some(owner) = owner {
        if let Err(e) = apply_owner(&staged, owner) {
            let _ = std::fs::remove_file(&staged);
            return Err(fail(e));
        }
    }

    if let Err(e) = std::fs::rename(&staged, dest) {
        let _ = std::fs::remove_file(&staged);
        return Err(fail(format!("install: {e}")));
    }

    tracing::info!(path = %dest.display(), "CRL published");
    Ok(())
}

fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "crl.pem".into());
    name.push(".tmp");
    dest.with_file_name(name)
}

#[cfg(unix)]
fn apply_owner(path: &Path, owner: &CrlOwner) -> Result<(), String> {
    use nix::unistd::{chown, Group, User};

    let user = User::from_name(&owner.user)
        .map_err(|e| format!("lookup user {}: {e}", owner.user))?
        .ok_or_else(|| format!("unknown user {}", owner.user))?;
    let group = Group::from_name(&owner.group)
        .map_err(|e| format!("lookup group {}: {e}", owner.group))?
        .ok_or_else(|| format!("unknown group {}", owner.group))?;

    chown(path, Some(user.uid), Some(group.gid))
        .map_err(|e| format!("chown {}:{}: {e}", owner.user, owner.group))
}

#[cfg(not(unix))]
fn apply_owner(_path: &Path, owner: &CrlOwner) -> Result<(), String> {
    tracing::warn!(user = %owner.user, group = %owner.group, "CRL ownership is not supported on this platform");
    Ok(())
}
