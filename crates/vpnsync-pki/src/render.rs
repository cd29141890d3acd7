//! Inline `.ovpn` client profile rendering.
//!
//! A profile is the server's common client options followed by the CA
//! certificate, the user's certificate and key, and the tls-crypt key, each
//! embedded in its own tag. Profiles are written to
//! `<client-config-dir>/<name>.ovpn`.

use std::path::{Path, PathBuf};

use crate::error::PkiError;
use crate::layout::PkiLayout;

/// Built-in profile template.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/client.ovpn.tmpl");

const PROFILE_EXTENSION: &str = "ovpn";

/// The five materials substituted into a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMaterials {
    pub client_common: String,
    pub ca: String,
    pub cert: String,
    pub key: String,
    pub tls_crypt: String,
}

impl ClientMaterials {
    /// Substitute the materials into `template` in a single pass.
    ///
    /// Substituted text is never scanned again, so a placeholder appearing
    /// inside a material stays literal. Unknown `{{...}}` sequences are
    /// copied unchanged.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + self.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let material = tail
                .find("}}")
                .and_then(|end| self.material(&tail[2..end]).map(|m| (m, end + 2)));
            match material {
                Some((text, consumed)) => {
                    out.push_str(text);
                    rest = &tail[consumed..];
                }
                None => {
                    out.push_str("{{");
                    rest = &tail[2..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn material(&self, placeholder: &str) -> Option<&str> {
        match placeholder {
            "client_common" => Some(&self.client_common),
            "ca" => Some(&self.ca),
            "cert" => Some(&self.cert),
            "key" => Some(&self.key),
            "tls_crypt" => Some(&self.tls_crypt),
            _ => None,
        }
    }

    fn len(&self) -> usize {
        self.client_common.len()
            + self.ca.len()
            + self.cert.len()
            + self.key.len()
            + self.tls_crypt.len()
    }
}

/// Drop trailing lines that are empty or whitespace-only.
pub fn trim_trailing_blank_lines(content: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let keep = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |last| last + 1);
    lines[..keep].join("\n")
}

/// Keep the PEM section of a file.
///
/// Lines before the first `-----` delimiter are discarded (easy-rsa puts a
/// human-readable dump of the certificate there). From the delimiter on,
/// every non-blank line is kept in order.
pub fn extract_pem(content: &str) -> String {
    content
        .split('\n')
        .skip_while(|line| !line.starts_with("-----"))
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders and removes per-identity client profiles.
#[derive(Debug, Clone)]
pub struct ConfigRenderer {
    layout: PkiLayout,
    template: String,
    output_dir: PathBuf,
}

impl ConfigRenderer {
    /// Renderer using the built-in template and `<easy-rsa>/client_configs`.
    pub fn new(layout: PkiLayout) -> Self {
        let output_dir = layout.default_client_config_dir();
        Self {
            layout,
            template: DEFAULT_TEMPLATE.to_string(),
            output_dir,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{name}.{PROFILE_EXTENSION}"))
    }

    /// Read every material needed for `name`'s profile.
    pub fn load_materials(&self, name: &str) -> Result<ClientMaterials, PkiError> {
        Ok(ClientMaterials {
            client_common: read_material(
                "client options",
                name,
                &self.layout.client_common_path(),
                trim_trailing_blank_lines,
            )?,
            ca: read_material(
                "CA certificate",
                name,
                &self.layout.ca_cert_path(),
                trim_trailing_blank_lines,
            )?,
            cert: read_material(
                "client certificate",
                name,
                &self.layout.issued_cert_path(name),
                extract_pem,
            )?,
            key: read_material(
                "private key",
                name,
                &self.layout.private_key_path(name),
                extract_pem,
            )?,
            tls_crypt: read_material(
                "tls-crypt key",
                name,
                &self.layout.tls_crypt_key_path(),
                trim_trailing_blank_lines,
            )?,
        })
    }

    /// Render `name`'s profile and return its path.
    ///
    /// The profile is written under a temporary name and renamed into place,
    /// so a failure never leaves a partial profile at the final path.
    pub fn render(&self, name: &str) -> Result<PathBuf, PkiError> {
        crate::validate_name(name)?;
        let materials = self.load_materials(name)?;
        let rendered = materials.render(&self.template);

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_path(name);
        let staged = path.with_extension(format!("{PROFILE_EXTENSION}.tmp"));
        if let Err(e) = write_private(&staged, rendered.as_bytes()) {
            let _ = std::fs::remove_file(&staged);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&staged, &path) {
            let _ = std::fs::remove_file(&staged);
            return Err(e.into());
        }

        tracing::debug!(name, path = %path.display(), "Client profile rendered");
        Ok(path)
    }

    /// Delete `name`'s profile. Returns whether a file was removed.
    pub fn remove(&self, name: &str) -> Result<bool, PkiError> {
        crate::validate_name(name)?;
        let path = self.output_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(name, path = %path.display(), "Client profile removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn read_material(
    material: &'static str,
    name: &str,
    path: &Path,
    extract: fn(&str) -> String,
) -> Result<String, PkiError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(extract(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PkiError::MissingMaterial {
            material,
            name: name.to_string(),
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Profiles embed a private key, so keep them owner-readable only.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
