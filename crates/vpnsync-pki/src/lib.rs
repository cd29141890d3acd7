//! vpnsync PKI: the easy-rsa side of the reconciliation.
//!
//! Reads the authority's `index.txt`, drives `easyrsa` to issue and revoke
//! client certificates, republishes the CRL consumed by the running OpenVPN
//! server, and renders inline `.ovpn` client profiles from the issued
//! material.

pub mod audit;
pub mod crl;
pub mod easyrsa;
pub mod error;
pub mod index;
pub mod layout;
pub mod render;

pub use audit::AuditLog;
pub use crl::CrlOwner;
pub use easyrsa::{CertificateAuthority, EasyRsa, CERT_VALIDITY_DAYS};
pub use error::{AuthorityStep, PkiError};
pub use index::{is_reserved_name, CertState, CertificateRecord, IndexSnapshot, IndexWatcher};
pub use layout::PkiLayout;
pub use render::ConfigRenderer;

/// Validate a certificate name before it reaches the filesystem or easy-rsa.
///
/// Names become file names under `issued/` and `private/` and are passed to
/// `easyrsa` as a positional argument.
pub fn validate_name(name: &str) -> Result<(), PkiError> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name.starts_with('-') {
        "name starts with '-'"
    } else if name.contains(['/', '\\']) {
        "name contains a path separator"
    } else if name.chars().any(char::is_whitespace) {
        "name contains whitespace"
    } else if name == "." || name == ".." {
        "name is a relative path component"
    } else if index::is_reserved_name(name) {
        "name is reserved for the server"
    } else {
        return Ok(());
    };
    Err(PkiError::InvalidName {
        name: name.to_string(),
        reason,
    })
}
