//! PKI domain error types.

use std::fmt;
use std::path::PathBuf;

/// One externally visible step of the certificate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityStep {
    BuildClient,
    Revoke,
    GenCrl,
    PublishCrl,
}

impl fmt::Display for AuthorityStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BuildClient => "build-client-full",
            Self::Revoke => "revoke",
            Self::GenCrl => "gen-crl",
            Self::PublishCrl => "publish-crl",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PkiError {
    #[error("easyrsa {step} failed for {name}: {reason}")]
    Command {
        step: AuthorityStep,
        name: String,
        reason: String,
    },

    #[error("could not publish CRL to {}: {reason}", path.display())]
    CrlPublish { path: PathBuf, reason: String },

    #[error("missing {material} for {name}: {}", path.display())]
    MissingMaterial {
        material: &'static str,
        name: String,
        path: PathBuf,
    },

    #[error("invalid certificate name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("cannot read index {}: {source}", path.display())]
    Index {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PkiError {
    /// The step that failed, for authority errors.
    pub fn step(&self) -> Option<AuthorityStep> {
        match self {
            Self::Command { step, .. } => Some(*step),
            Self::CrlPublish { .. } => Some(AuthorityStep::PublishCrl),
            _ => None,
        }
    }

    /// True when the CA state may have changed but the server still holds
    /// an old CRL. `gen-crl` only runs after a successful revoke or as a
    /// refresh, so its failure counts too.
    pub fn leaves_crl_stale(&self) -> bool {
        matches!(
            self,
            Self::CrlPublish { .. }
                | Self::Command {
                    step: AuthorityStep::GenCrl,
                    ..
                }
        )
    }
}
