//! Distribution of rendered client profiles.

use std::path::Path;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::membership::MembershipRecord;

/// Object storage key for an identity's profile: `<environment>/<name>.ovpn`.
pub fn object_key(environment: &str, name: &str) -> String {
    format!("{environment}/{name}.ovpn")
}

/// Email sent to a member when a new profile is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new_profile(environment: &str, url: &str, valid_hours: u64) -> Self {
        Self {
            subject: format!("Your VPN access to {environment}"),
            body: format!(
                "Download your configuration file for your personal VPN access to {environment}:\n\
                 {url}\n\
                 \n\
                 This link expires in {valid_hours} hour(s).\n\
                 \n\
                 Security warning: this file contains your private key. Do not forward it,\n\
                 do not store it in shared folders, and delete the downloaded copy once it\n\
                 has been imported into your VPN client.\n"
            ),
        }
    }
}

/// Upload, notify and removal steps for rendered profiles.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Upload the profile at `path` for `name` and return a time-limited
    /// download URL.
    async fn upload(&self, name: &str, path: &Path) -> Result<String, DeliveryError>;

    /// Tell `member` where to download their profile.
    async fn notify(&self, member: &MembershipRecord, url: &str) -> Result<(), DeliveryError>;

    /// Remove the uploaded profile for `name`.
    async fn remove(&self, name: &str) -> Result<(), DeliveryError>;
}
