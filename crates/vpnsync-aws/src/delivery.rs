//! S3 profile storage and SES notification.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use vpnsync_core::{
    derive_email, object_key, Delivery, DeliveryError, MembershipRecord, Notification,
};

const PROFILE_CONTENT_TYPE: &str = "application/x-openvpn-profile";
const CHARSET: &str = "UTF-8";

/// Sender and recipient domain for notification mails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub sender: String,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Environment name; prefixes object keys and appears in mails.
    pub environment: String,
    pub bucket: String,
    /// Lifetime of presigned download links.
    pub url_expiration: Duration,
    /// `None` when notifications are disabled.
    pub mail: Option<MailConfig>,
}

impl DeliveryConfig {
    fn valid_hours(&self) -> u64 {
        self.url_expiration.as_secs() / 3600
    }
}

pub struct S3SesDelivery {
    s3: aws_sdk_s3::Client,
    ses: aws_sdk_sesv2::Client,
    config: DeliveryConfig,
}

impl S3SesDelivery {
    pub fn new(sdk: &SdkConfig, config: DeliveryConfig) -> Self {
        Self {
            s3: aws_sdk_s3::Client::new(sdk),
            ses: aws_sdk_sesv2::Client::new(sdk),
            config,
        }
    }

    fn key(&self, name: &str) -> String {
        object_key(&self.config.environment, name)
    }

    async fn presign(&self, key: &str) -> Result<String, DeliveryError> {
        let fail = |reason: String| DeliveryError::Presign {
            key: key.to_string(),
            reason,
        };
        let presigning =
            PresigningConfig::expires_in(self.config.url_expiration).map_err(|e| fail(e.to_string()))?;
        let request = self
            .s3
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| fail(aws_sdk_s3::error::DisplayErrorContext(&e).to_string()))?;
        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl Delivery for S3SesDelivery {
    async fn upload(&self, name: &str, path: &Path) -> Result<String, DeliveryError> {
        let key = self.key(name);
        let fail = |reason: String| DeliveryError::Upload {
            key: key.clone(),
            reason,
        };

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| fail(format!("{}: {e}", path.display())))?;
        self.s3
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .content_type(PROFILE_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| fail(aws_sdk_s3::error::DisplayErrorContext(&e).to_string()))?;
        tracing::info!(name, bucket = %self.config.bucket, key = %key, "Profile uploaded");

        self.presign(&key).await
    }

    async fn notify(&self, member: &MembershipRecord, url: &str) -> Result<(), DeliveryError> {
        let Some(mail) = &self.config.mail else {
            return Err(DeliveryError::Notify("mail is not configured".into()));
        };
        let recipient = derive_email(&member.account_id, &mail.domain)?;
        let notification =
            Notification::new_profile(&self.config.environment, url, self.config.valid_hours());

        self.ses
            .send_email()
            .from_email_address(&mail.sender)
            .destination(Destination::builder().to_addresses(&recipient).build())
            .content(email_content(notification)?)
            .send()
            .await
            .map_err(|e| {
                DeliveryError::Notify(format!(
                    "{recipient}: {}",
                    aws_sdk_sesv2::error::DisplayErrorContext(&e)
                ))
            })?;
        tracing::info!(account = %member.account_id, recipient = %recipient, "Profile link mailed");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), DeliveryError> {
        let key = self.key(name);
        self.s3
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| DeliveryError::Remove {
                key: key.clone(),
                reason: aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
            })?;
        tracing::info!(name, key = %key, "Uploaded profile removed");
        Ok(())
    }
}

fn text(data: String) -> Result<Content, DeliveryError> {
    Content::builder()
        .data(data)
        .charset(CHARSET)
        .build()
        .map_err(|e| DeliveryError::Notify(e.to_string()))
}

fn email_content(notification: Notification) -> Result<EmailContent, DeliveryError> {
    let message = Message::builder()
        .subject(text(notification.subject)?)
        .body(Body::builder().text(text(notification.body)?).build())
        .build();
    Ok(EmailContent::builder().simple(message).build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mail: Option<MailConfig>) -> DeliveryConfig {
        DeliveryConfig {
            environment: "staging".into(),
            bucket: "vpn-profiles".into(),
            url_expiration: Duration::from_secs(3 * 3600),
            mail,
        }
    }

    #[test]
    fn link_lifetime_is_reported_in_hours() {
        assert_eq!(config(None).valid_hours(), 3);
    }

    #[test]
    fn email_carries_subject_and_link() {
        let content = email_content(Notification::new_profile(
            "staging",
            "https://vpn-profiles.s3.test/staging/janedoe.ovpn?X-Amz-Signature=abc",
            3,
        ))
        .unwrap();

        let message = content.simple().unwrap();
        assert_eq!(
            message.subject().map(|s| s.data()),
            Some("Your VPN access to staging")
        );
        let body = message.body().and_then(|b| b.text()).unwrap();
        assert!(body.data().contains("X-Amz-Signature=abc"));
        assert_eq!(body.charset(), Some(CHARSET));
    }

    #[tokio::test]
    async fn notify_without_mail_config_fails_before_sending() {
        let sdk = SdkConfig::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new("eu-central-1"))
            .build();
        let delivery = S3SesDelivery::new(&sdk, config(None));

        let err = delivery
            .notify(&MembershipRecord::from_account("jane.doe"), "https://x")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Notify(_)));
    }

    #[tokio::test]
    async fn unmatched_account_is_a_recipient_error() {
        let sdk = SdkConfig::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new("eu-central-1"))
            .build();
        let delivery = S3SesDelivery::new(
            &sdk,
            config(Some(MailConfig {
                sender: "vpn@example.com".into(),
                domain: "example.com".into(),
            })),
        );

        let err = delivery
            .notify(&MembershipRecord::from_account("admin"), "https://x")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Recipient(_)));
    }
}
