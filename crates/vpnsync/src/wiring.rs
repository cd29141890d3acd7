//! Assembles the reconciler from settings.

use anyhow::Context;
use vpnsync_core::Reconciler;
use vpnsync_pki::{ConfigRenderer, EasyRsa, IndexWatcher};

use crate::settings::Settings;

/// Everything that only needs the local filesystem.
fn local_parts(settings: &Settings) -> anyhow::Result<(EasyRsa, ConfigRenderer, IndexWatcher)> {
    let layout = settings.layout();
    let authority = EasyRsa::new(layout.clone()).with_crl_owner(settings.crl_owner());

    let mut renderer = ConfigRenderer::new(layout.clone());
    if let Some(template) = &settings.openvpn.template {
        let content = std::fs::read_to_string(template)
            .with_context(|| format!("reading profile template {}", template.display()))?;
        renderer = renderer.with_template(content);
    }
    if let Some(dir) = &settings.openvpn.client_config_dir {
        renderer = renderer.with_output_dir(dir);
    }

    Ok((authority, renderer, IndexWatcher::new(layout.index_path())))
}

#[cfg(feature = "aws")]
pub async fn build_reconciler(settings: &Settings, environment: &str) -> anyhow::Result<Reconciler> {
    use vpnsync_aws::{DeliveryConfig, IamGroupMembership, MailConfig, S3SesDelivery};
    use vpnsync_core::Collaborators;
    use vpnsync_pki::AuditLog;

    let (authority, renderer, inventory) = local_parts(settings)?;

    let sdk = vpnsync_aws::load_sdk_config(&settings.aws.region, settings.aws.profile.as_deref()).await;
    let group = settings
        .aws
        .vpn_group
        .clone()
        .context("aws.vpn-group is not set")?;

    let mail = if settings.sync.send_mail {
        Some(MailConfig {
            sender: settings.sync.sender_mail.clone().unwrap_or_default(),
            domain: settings.sync.domain.clone().unwrap_or_default(),
        })
    } else {
        None
    };
    let delivery = S3SesDelivery::new(
        &sdk,
        DeliveryConfig {
            environment: environment.to_string(),
            bucket: settings.aws.s3_bucket_name.clone().unwrap_or_default(),
            url_expiration: settings.url_expiration(),
            mail,
        },
    );

    Ok(Reconciler::new(
        Collaborators {
            membership: Box::new(IamGroupMembership::new(&sdk, group)),
            inventory: Box::new(inventory),
            authority: Box::new(authority),
            renderer,
            delivery: Box::new(delivery),
            audit: AuditLog::new(settings.sync.audit_log.clone()),
        },
        settings.sync_options(),
    ))
}

#[cfg(not(feature = "aws"))]
pub async fn build_reconciler(settings: &Settings, _environment: &str) -> anyhow::Result<Reconciler> {
    local_parts(settings)?;
    anyhow::bail!("vpnsync was built without the `aws` feature; no membership source is available")
}
