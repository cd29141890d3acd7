//! Certificate issuance and revocation through the `easyrsa` script.
//!
//! Every operation spawns `easyrsa --batch ...` in the easy-rsa directory
//! and waits for it. Output is captured and logged at debug level; a
//! non-zero exit is a hard failure for the identity being processed.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::crl::{self, CrlOwner};
use crate::error::{AuthorityStep, PkiError};
use crate::layout::PkiLayout;

/// Validity of issued client certificates and of regenerated CRLs.
pub const CERT_VALIDITY_DAYS: u32 = 3650;

/// Label for CRL steps that are not tied to one certificate.
const CRL_SUBJECT: &str = "crl";

/// Longest stderr excerpt carried in an error message.
const STDERR_EXCERPT_CHARS: usize = 512;

/// Issues and revokes client certificates.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Issue a passphrase-less client certificate for `name`.
    async fn create(&self, name: &str) -> Result<(), PkiError>;

    /// Revoke `name`, regenerate the CRL and publish it to the server.
    async fn revoke(&self, name: &str) -> Result<(), PkiError>;

    /// Regenerate the CRL and publish it to the server without revoking
    /// anything.
    async fn refresh_crl(&self) -> Result<(), PkiError>;
}

/// Production authority backed by an easy-rsa 3 installation.
#[derive(Debug, Clone)]
pub struct EasyRsa {
    layout: PkiLayout,
    program: PathBuf,
    crl_owner: Option<CrlOwner>,
}

impl EasyRsa {
    pub fn new(layout: PkiLayout) -> Self {
        let program = layout.easyrsa_program();
        Self {
            layout,
            program,
            crl_owner: Some(CrlOwner::default()),
        }
    }

    /// Override the script location (defaults to `<easy-rsa>/easyrsa`).
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Ownership applied to the published CRL; `None` leaves it as created.
    pub fn with_crl_owner(mut self, owner: Option<CrlOwner>) -> Self {
        self.crl_owner = owner;
        self
    }

    pub fn layout(&self) -> &PkiLayout {
        &self.layout
    }

    async fn run<I, S>(&self, step: AuthorityStep, name: &str, args: I) -> Result<(), PkiError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let fail = |reason: String| PkiError::Command {
            step,
            name: name.to_string(),
            reason,
        };

        let output = Command::new(&self.program)
            .arg("--batch")
            .args(args)
            .current_dir(&self.layout.easy_rsa_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| fail(format!("cannot run {}: {e}", self.program.display())))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(
            %step,
            name,
            status = %output.status,
            stdout = %stdout.trim(),
            stderr = %stderr.trim(),
            "easyrsa finished"
        );

        if output.status.success() {
            Ok(())
        } else {
            Err(fail(format!(
                "{}: {}",
                output.status,
                excerpt(stderr.trim())
            )))
        }
    }

    /// `gen-crl` followed by publishing the result. `name` only labels errors.
    async fn regenerate_crl(&self, name: &str) -> Result<(), PkiError> {
        let days = format!("--days={CERT_VALIDITY_DAYS}");
        self.run(AuthorityStep::GenCrl, name, [days.as_str(), "gen-crl"])
            .await?;
        self.publish()
    }

    fn publish(&self) -> Result<(), PkiError> {
        crl::publish(
            &self.layout.generated_crl_path(),
            &self.layout.published_crl_path(),
            self.crl_owner.as_ref(),
        )
    }
}

#[async_trait]
impl CertificateAuthority for EasyRsa {
    async fn create(&self, name: &str) -> Result<(), PkiError> {
        crate::validate_name(name)?;
        let days = format!("--days={CERT_VALIDITY_DAYS}");
        self.run(
            AuthorityStep::BuildClient,
            name,
            [days.as_str(), "build-client-full", name, "nopass"],
        )
        .await?;
        tracing::info!(name, "Client certificate issued");
        Ok(())
    }

    async fn revoke(&self, name: &str) -> Result<(), PkiError> {
        crate::validate_name(name)?;
        self.run(AuthorityStep::Revoke, name, ["revoke", name]).await?;

        self.regenerate_crl(name).await?;
        tracing::info!(name, "Client certificate revoked");
        Ok(())
    }

    async fn refresh_crl(&self) -> Result<(), PkiError> {
        self.regenerate_crl(CRL_SUBJECT).await?;
        tracing::info!("CRL regenerated and published");
        Ok(())
    }
}

fn excerpt(text: &str) -> &str {
    if text.is_empty() {
        return "no output";
    }
    match text.char_indices().nth(STDERR_EXCERPT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
