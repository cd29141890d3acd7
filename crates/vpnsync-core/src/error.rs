//! Reconciliation error types.

use vpnsync_pki::PkiError;

use crate::recipient::RecipientError;

/// Failure to read the authorized identities.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("membership lookup failed: {0}")]
    Lookup(String),
}

/// Failure in the upload/notify/remove pipeline for one identity.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("presigning {key} failed: {reason}")]
    Presign { key: String, reason: String },

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("removal of {key} failed: {reason}")]
    Remove { key: String, reason: String },

    #[error(transparent)]
    Recipient(#[from] RecipientError),
}

/// Errors that abort a whole cycle before any action is taken.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("cannot read certificate index: {0}")]
    Index(#[source] PkiError),

    #[error(transparent)]
    Membership(#[from] MembershipError),
}
