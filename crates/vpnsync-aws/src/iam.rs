//! IAM group membership source.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::Client;
use vpnsync_core::{MembershipError, MembershipRecord, MembershipSource};

pub struct IamGroupMembership {
    client: Client,
    group: String,
}

impl IamGroupMembership {
    pub fn new(config: &SdkConfig, group: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            group: group.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }
}

#[async_trait]
impl MembershipSource for IamGroupMembership {
    async fn members(&self) -> Result<Vec<MembershipRecord>, MembershipError> {
        let mut members = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .client
                .get_group()
                .group_name(&self.group)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| {
                    MembershipError::Lookup(format!(
                        "get-group {}: {}",
                        self.group,
                        DisplayErrorContext(&e)
                    ))
                })?;

            members.extend(
                page.users()
                    .iter()
                    .map(|user| MembershipRecord::from_account(user.user_name())),
            );

            match page.marker() {
                Some(next) if page.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        tracing::debug!(group = %self.group, count = members.len(), "Fetched group members");
        Ok(members)
    }
}
