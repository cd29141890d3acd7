//! TOML settings file.
//!
//! ```toml
//! [aws]
//! region = "eu-central-1"
//! s3-bucket-name = "vpn-profiles"
//! vpn-group = "vpn-users"
//!
//! [openvpn]
//! easy-rsa-path = "/etc/openvpn/server/easy-rsa"
//!
//! [settings]
//! request-interval = 300
//! sender-mail = "vpn@example.com"
//! domain = "example.com"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use vpnsync_core::SyncOptions;
use vpnsync_pki::{CrlOwner, PkiLayout};

const DEFAULT_REGION: &str = "eu-central-1";
const DEFAULT_EASY_RSA_PATH: &str = "/etc/openvpn/server/easy-rsa";
const DEFAULT_KEY_DIRECTORY: &str = "pki";
const DEFAULT_SERVER_PATH: &str = "/etc/openvpn/server";
const DEFAULT_REQUEST_INTERVAL_SECS: u64 = 300;
const DEFAULT_URL_EXPIRATION_HOURS: u64 = 3;

/// Presigned URLs cannot outlive a week.
const MAX_URL_EXPIRATION_HOURS: u64 = 7 * 24;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub aws: AwsSettings,
    pub openvpn: OpenVpnSettings,
    #[serde(rename = "settings")]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AwsSettings {
    /// Named credentials profile; the default chain is used when unset.
    pub profile: Option<String>,
    pub region: String,
    pub s3_bucket_name: Option<String>,
    pub vpn_group: Option<String>,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            profile: None,
            region: DEFAULT_REGION.to_string(),
            s3_bucket_name: None,
            vpn_group: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct OpenVpnSettings {
    pub easy_rsa_path: PathBuf,
    pub key_directory: String,
    pub server_path: PathBuf,
    /// Defaults to `<easy-rsa-path>/client_configs`.
    pub client_config_dir: Option<PathBuf>,
    /// Profile template file; the built-in template is used when unset.
    pub template: Option<PathBuf>,
    /// Empty string leaves the published CRL owned by the current user.
    pub crl_owner: String,
    pub crl_group: String,
}

impl Default for OpenVpnSettings {
    fn default() -> Self {
        let owner = CrlOwner::default();
        Self {
            easy_rsa_path: PathBuf::from(DEFAULT_EASY_RSA_PATH),
            key_directory: DEFAULT_KEY_DIRECTORY.to_string(),
            server_path: PathBuf::from(DEFAULT_SERVER_PATH),
            client_config_dir: None,
            template: None,
            crl_owner: owner.user,
            crl_group: owner.group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SyncSettings {
    /// Seconds between cycles.
    pub request_interval: u64,
    pub dry_run: bool,
    pub s3_upload: bool,
    pub send_mail: bool,
    pub sender_mail: Option<String>,
    pub domain: Option<String>,
    pub url_expiration_hours: u64,
    pub audit_log: Option<PathBuf>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            request_interval: DEFAULT_REQUEST_INTERVAL_SECS,
            dry_run: false,
            s3_upload: true,
            send_mail: true,
            sender_mail: None,
            domain: None,
            url_expiration_hours: DEFAULT_URL_EXPIRATION_HOURS,
            audit_log: None,
        }
    }
}

impl Settings {
    /// Read, parse and validate the settings file at `path`.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !has_value(&self.aws.vpn_group) {
            return Err(SettingsError::Missing("aws.vpn-group"));
        }
        if self.sync.request_interval == 0 {
            return Err(SettingsError::Invalid {
                key: "settings.request-interval",
                reason: "must be at least 1 second".into(),
            });
        }
        if self.sync.s3_upload {
            if !has_value(&self.aws.s3_bucket_name) {
                return Err(SettingsError::Missing("aws.s3-bucket-name"));
            }
            if !(1..=MAX_URL_EXPIRATION_HOURS).contains(&self.sync.url_expiration_hours) {
                return Err(SettingsError::Invalid {
                    key: "settings.url-expiration-hours",
                    reason: format!("must be between 1 and {MAX_URL_EXPIRATION_HOURS}"),
                });
            }
        }
        if self.sync.send_mail {
            if !self.sync.s3_upload {
                return Err(SettingsError::Invalid {
                    key: "settings.send-mail",
                    reason: "requires settings.s3-upload, the mail carries the download link"
                        .into(),
                });
            }
            if !has_value(&self.sync.sender_mail) {
                return Err(SettingsError::Missing("settings.sender-mail"));
            }
            if !has_value(&self.sync.domain) {
                return Err(SettingsError::Missing("settings.domain"));
            }
        }
        if self.openvpn.crl_owner.is_empty() != self.openvpn.crl_group.is_empty() {
            return Err(SettingsError::Invalid {
                key: "openvpn.crl-owner",
                reason: "crl-owner and crl-group must both be set or both be empty".into(),
            });
        }
        Ok(())
    }

    pub fn layout(&self) -> PkiLayout {
        PkiLayout::new(
            &self.openvpn.easy_rsa_path,
            &self.openvpn.key_directory,
            &self.openvpn.server_path,
        )
    }

    pub fn crl_owner(&self) -> Option<CrlOwner> {
        if self.openvpn.crl_owner.is_empty() {
            return None;
        }
        Some(CrlOwner {
            user: self.openvpn.crl_owner.clone(),
            group: self.openvpn.crl_group.clone(),
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            dry_run: self.sync.dry_run,
            upload: self.sync.s3_upload,
            notify: self.sync.send_mail,
        }
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.sync.request_interval)
    }

    pub fn url_expiration(&self) -> Duration {
        Duration::from_secs(self.sync.url_expiration_hours * 3600)
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[aws]
profile = "ops"
region = "eu-west-1"
s3-bucket-name = "vpn-profiles"
vpn-group = "vpn-users"

[openvpn]
easy-rsa-path = "/srv/easy-rsa"
key-directory = "keys"
server-path = "/srv/openvpn"
template = "/srv/client.ovpn.tmpl"

[settings]
request-interval = 60
send-mail = true
sender-mail = "vpn@example.com"
domain = "example.com"
url-expiration-hours = 12
audit-log = "/var/log/vpnsync/audit.log"
"#;

    fn parse(content: &str) -> Result<Settings, SettingsError> {
        Settings::parse(content, Path::new("config.toml"))
    }

    #[test]
    fn full_file_parses() {
        let settings = parse(FULL).unwrap();
        assert_eq!(settings.aws.profile.as_deref(), Some("ops"));
        assert_eq!(settings.aws.region, "eu-west-1");
        assert_eq!(settings.request_interval(), Duration::from_secs(60));
        assert_eq!(settings.url_expiration(), Duration::from_secs(12 * 3600));
        assert_eq!(
            settings.layout().index_path(),
            PathBuf::from("/srv/easy-rsa/keys/index.txt")
        );
        assert_eq!(
            settings.sync.audit_log,
            Some(PathBuf::from("/var/log/vpnsync/audit.log"))
        );
        assert!(settings.sync_options().notify);
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let settings = parse(
            r#"
[aws]
vpn-group = "vpn-users"

[settings]
s3-upload = false
send-mail = false
"#,
        )
        .unwrap();
        assert_eq!(settings.aws.region, "eu-central-1");
        assert_eq!(settings.openvpn.easy_rsa_path, PathBuf::from(DEFAULT_EASY_RSA_PATH));
        assert_eq!(settings.openvpn.key_directory, "pki");
        assert_eq!(settings.request_interval(), Duration::from_secs(300));
        assert_eq!(settings.sync.url_expiration_hours, 3);
        assert_eq!(settings.crl_owner(), Some(CrlOwner::default()));
        assert!(!settings.sync.dry_run);
    }

    #[test]
    fn vpn_group_is_required() {
        let err = parse("[settings]\ns3-upload = false\nsend-mail = false\n").unwrap_err();
        assert!(matches!(err, SettingsError::Missing("aws.vpn-group")));
    }

    #[test]
    fn upload_requires_bucket() {
        let err = parse("[aws]\nvpn-group = \"g\"\n[settings]\nsend-mail = false\n").unwrap_err();
        assert!(matches!(err, SettingsError::Missing("aws.s3-bucket-name")));
    }

    #[test]
    fn mail_requires_upload() {
        let err = parse(
            "[aws]\nvpn-group = \"g\"\n[settings]\ns3-upload = false\nsender-mail = \"a@b.c\"\ndomain = \"b.c\"\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                key: "settings.send-mail",
                ..
            }
        ));
    }

    #[test]
    fn mail_requires_sender_and_domain() {
        let base = "[aws]\nvpn-group = \"g\"\ns3-bucket-name = \"b\"\n[settings]\n";
        let err = parse(base).unwrap_err();
        assert!(matches!(err, SettingsError::Missing("settings.sender-mail")));

        let err = parse(&format!("{base}sender-mail = \"vpn@example.com\"\n")).unwrap_err();
        assert!(matches!(err, SettingsError::Missing("settings.domain")));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = parse(
            "[aws]\nvpn-group = \"g\"\n[settings]\nrequest-interval = 0\ns3-upload = false\nsend-mail = false\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                key: "settings.request-interval",
                ..
            }
        ));
    }

    #[test]
    fn presign_lifetime_is_bounded() {
        let err = parse(
            "[aws]\nvpn-group = \"g\"\ns3-bucket-name = \"b\"\n[settings]\nsend-mail = false\nurl-expiration-hours = 200\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                key: "settings.url-expiration-hours",
                ..
            }
        ));
    }

    #[test]
    fn empty_crl_owner_disables_chown() {
        let settings = parse(
            "[aws]\nvpn-group = \"g\"\n[openvpn]\ncrl-owner = \"\"\ncrl-group = \"\"\n[settings]\ns3-upload = false\nsend-mail = false\n",
        )
        .unwrap();
        assert_eq!(settings.crl_owner(), None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse("[aws]\nvpn-group = \"g\"\nbucket = \"typo\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }
}
