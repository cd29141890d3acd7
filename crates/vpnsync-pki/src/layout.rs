//! Filesystem layout of an easy-rsa PKI next to an OpenVPN server.

use std::path::{Path, PathBuf};

const INDEX_FILENAME: &str = "index.txt";
const CA_CERT_FILENAME: &str = "ca.crt";
const CRL_FILENAME: &str = "crl.pem";
const CLIENT_COMMON_FILENAME: &str = "client-common.txt";
const TLS_CRYPT_FILENAME: &str = "tc.key";
const CLIENT_CONFIGS_DIR: &str = "client_configs";
const EASYRSA_PROGRAM: &str = "easyrsa";

/// Where the authority keeps its state and where the server reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkiLayout {
    /// easy-rsa working directory (contains the `easyrsa` script).
    pub easy_rsa_dir: PathBuf,
    /// PKI directory inside `easy_rsa_dir` (usually `pki`).
    pub key_dir: PathBuf,
    /// OpenVPN server directory.
    pub server_dir: PathBuf,
}

impl PkiLayout {
    pub fn new(easy_rsa_dir: impl Into<PathBuf>, key_directory: &str, server_dir: impl Into<PathBuf>) -> Self {
        let easy_rsa_dir = easy_rsa_dir.into();
        let key_dir = easy_rsa_dir.join(key_directory);
        Self {
            easy_rsa_dir,
            key_dir,
            server_dir: server_dir.into(),
        }
    }

    pub fn easyrsa_program(&self) -> PathBuf {
        self.easy_rsa_dir.join(EASYRSA_PROGRAM)
    }

    pub fn index_path(&self) -> PathBuf {
        self.key_dir.join(INDEX_FILENAME)
    }

    pub fn ca_cert_path(&self) -> PathBuf {
        self.key_dir.join(CA_CERT_FILENAME)
    }

    pub fn issued_cert_path(&self, name: &str) -> PathBuf {
        self.key_dir.join("issued").join(format!("{name}.crt"))
    }

    pub fn private_key_path(&self, name: &str) -> PathBuf {
        self.key_dir.join("private").join(format!("{name}.key"))
    }

    /// CRL as written by `easyrsa gen-crl`.
    pub fn generated_crl_path(&self) -> PathBuf {
        self.key_dir.join(CRL_FILENAME)
    }

    /// CRL as read by the running OpenVPN server (`crl-verify`).
    pub fn published_crl_path(&self) -> PathBuf {
        self.server_dir.join(CRL_FILENAME)
    }

    pub fn client_common_path(&self) -> PathBuf {
        self.server_dir.join(CLIENT_COMMON_FILENAME)
    }

    pub fn tls_crypt_key_path(&self) -> PathBuf {
        self.server_dir.join(TLS_CRYPT_FILENAME)
    }

    pub fn default_client_config_dir(&self) -> PathBuf {
        self.easy_rsa_dir.join(CLIENT_CONFIGS_DIR)
    }

    pub fn easy_rsa_dir(&self) -> &Path {
        &self.easy_rsa_dir
    }
}
