//! AWS adapters for vpnsync.
//!
//! [`IamGroupMembership`] reads the authorized identities from an IAM group;
//! [`S3SesDelivery`] stores rendered profiles in S3, hands out presigned
//! download links and announces them through SES.

pub mod delivery;
pub mod iam;

pub use delivery::{DeliveryConfig, MailConfig, S3SesDelivery};
pub use iam::IamGroupMembership;

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Load the shared SDK configuration for `region`, optionally from a named
/// credentials profile.
pub async fn load_sdk_config(region: &str, profile: Option<&str>) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
    if let Some(profile) = profile {
        tracing::debug!(profile, "Using named AWS profile");
        loader = loader.profile_name(profile);
    }
    loader.load().await
}
