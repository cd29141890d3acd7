//! One reconciliation cycle: read both sides, diff, act per identity.

use std::collections::{BTreeMap, BTreeSet};

use vpnsync_pki::{is_reserved_name, AuditLog, CertificateAuthority, ConfigRenderer};

use crate::delivery::Delivery;
use crate::error::SyncError;
use crate::inventory::CertificateInventory;
use crate::membership::{MembershipRecord, MembershipSource};
use crate::plan::ReconciliationPlan;
use crate::report::{CycleReport, Operation};

/// Name used in the report for failures that belong to no identity.
const CRL_SUBJECT: &str = "crl.pem";

/// Toggles for side effects of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Compute and log the plan but change nothing.
    pub dry_run: bool,
    /// Upload rendered profiles and delete them on revocation.
    pub upload: bool,
    /// Email the download link after upload. Requires `upload`.
    pub notify: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            upload: true,
            notify: true,
        }
    }
}

/// Everything a [`Reconciler`] talks to.
pub struct Collaborators {
    pub membership: Box<dyn MembershipSource>,
    pub inventory: Box<dyn CertificateInventory>,
    pub authority: Box<dyn CertificateAuthority>,
    pub renderer: ConfigRenderer,
    pub delivery: Box<dyn Delivery>,
    pub audit: AuditLog,
}

pub struct Reconciler {
    membership: Box<dyn MembershipSource>,
    inventory: Box<dyn CertificateInventory>,
    authority: Box<dyn CertificateAuthority>,
    renderer: ConfigRenderer,
    delivery: Box<dyn Delivery>,
    audit: AuditLog,
    options: SyncOptions,
    /// Set when a revocation reached the CA but the server CRL was not
    /// replaced. Starts set, since a failure before the last restart is
    /// not remembered. Cleared by the next successful refresh.
    crl_stale: bool,
}

impl Reconciler {
    pub fn new(collaborators: Collaborators, mut options: SyncOptions) -> Self {
        if options.notify && !options.upload {
            tracing::warn!("Notifications need uploads; disabling notifications");
            options.notify = false;
        }
        let Collaborators {
            membership,
            inventory,
            authority,
            renderer,
            delivery,
            audit,
        } = collaborators;
        Self {
            membership,
            inventory,
            authority,
            renderer,
            delivery,
            audit,
            options,
            crl_stale: true,
        }
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    pub fn crl_stale(&self) -> bool {
        self.crl_stale
    }

    /// Run one cycle.
    ///
    /// Returns `Err` only when either side could not be read; nothing is
    /// changed in that case. Per-identity failures end up in the report.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SyncError> {
        let certificates = self.inventory.valid_names().map_err(SyncError::Index)?;
        let members = index_members(self.membership.members().await?);

        let member_names: BTreeSet<String> = members.keys().cloned().collect();
        let plan = ReconciliationPlan::compute(&member_names, &certificates);
        let mut report = CycleReport::new(plan.clone());

        if self.crl_stale && !self.options.dry_run {
            self.refresh_crl(&mut report).await;
        }

        if plan.is_empty() {
            tracing::debug!(
                members = member_names.len(),
                certificates = certificates.len(),
                "Certificates match membership"
            );
            return Ok(report);
        }

        tracing::info!(
            create = plan.to_create.len(),
            delete = plan.to_delete.len(),
            dry_run = self.options.dry_run,
            "Applying reconciliation plan"
        );

        for name in &plan.to_create {
            if let Some(member) = members.get(name) {
                self.create_identity(member, &mut report).await;
            }
        }
        for name in &plan.to_delete {
            self.delete_identity(name, &mut report).await;
        }

        if !self.options.dry_run {
            self.inventory.invalidate();
        }

        tracing::info!(
            created = report.created.len(),
            delivered = report.delivered.len(),
            revoked = report.revoked.len(),
            failures = report.failures.len(),
            "Cycle finished"
        );
        Ok(report)
    }

    async fn create_identity(&self, member: &MembershipRecord, report: &mut CycleReport) {
        let name = member.normalized_name.as_str();
        let account = member.account_id.as_str();
        tracing::info!(name, account, "Adding new user");

        if self.options.dry_run {
            tracing::info!(name, "Dry run, not issuing certificate");
            report.dry_run.push(name.to_string());
            return;
        }

        if let Err(e) = self.authority.create(name).await {
            report.fail(name, Operation::Create, e);
            return;
        }
        report.created.push(name.to_string());
        self.audit
            .record("cert_issued", &[("name", name), ("account", account)]);

        let profile = match self.renderer.render(name) {
            Ok(path) => path,
            Err(e) => {
                report.fail(name, Operation::Render, e);
                return;
            }
        };

        if !self.options.upload {
            tracing::info!(name, path = %profile.display(), "Profile rendered, upload disabled");
            return;
        }

        let url = match self.delivery.upload(name, &profile).await {
            Ok(url) => url,
            Err(e) => {
                report.fail(name, Operation::Upload, e);
                return;
            }
        };

        if self.options.notify {
            if let Err(e) = self.delivery.notify(member, &url).await {
                report.fail(name, Operation::Notify, e);
                return;
            }
        }

        report.delivered.push(name.to_string());
        self.audit.record("config_delivered", &[("name", name)]);
        tracing::info!(name, "Added new user successfully");
    }

    async fn delete_identity(&mut self, name: &str, report: &mut CycleReport) {
        tracing::info!(name, "Deleting existing user");

        if self.options.dry_run {
            tracing::info!(name, "Dry run, not revoking certificate");
            report.dry_run.push(name.to_string());
            return;
        }

        match self.authority.revoke(name).await {
            Ok(()) => self.crl_stale = false,
            Err(e) => {
                if e.leaves_crl_stale() {
                    self.crl_stale = true;
                    self.audit.record("cert_revoked", &[("name", name), ("crl", "stale")]);
                }
                report.fail(name, Operation::Revoke, e);
                return;
            }
        }
        self.audit.record("cert_revoked", &[("name", name)]);

        let mut complete = true;
        if let Err(e) = self.renderer.remove(name) {
            report.fail(name, Operation::RemoveProfile, e);
            complete = false;
        }
        if self.options.upload {
            if let Err(e) = self.delivery.remove(name).await {
                report.fail(name, Operation::RemoveUpload, e);
                complete = false;
            }
        }

        report.revoked.push(name.to_string());
        if complete {
            tracing::info!(name, "Deleted user successfully");
        }
    }

    async fn refresh_crl(&mut self, report: &mut CycleReport) {
        tracing::info!("Regenerating and publishing CRL");
        match self.authority.refresh_crl().await {
            Ok(()) => {
                self.crl_stale = false;
                self.audit.record("crl_published", &[]);
            }
            Err(e) => report.fail(CRL_SUBJECT, Operation::RefreshCrl, e),
        }
    }
}

/// Key members by normalized name. When two accounts collapse onto the
/// same name the first one wins. Reserved names are never managed.
fn index_members(members: Vec<MembershipRecord>) -> BTreeMap<String, MembershipRecord> {
    let mut indexed: BTreeMap<String, MembershipRecord> = BTreeMap::new();
    for member in members {
        if is_reserved_name(&member.normalized_name) {
            tracing::warn!(
                name = %member.normalized_name,
                account = %member.account_id,
                "Account maps to a reserved certificate name, ignoring"
            );
            continue;
        }
        if let Some(existing) = indexed.get(&member.normalized_name) {
            tracing::warn!(
                name = %member.normalized_name,
                kept = %existing.account_id,
                ignored = %member.account_id,
                "Accounts normalize to the same certificate name"
            );
            continue;
        }
        indexed.insert(member.normalized_name.clone(), member);
    }
    indexed
}
