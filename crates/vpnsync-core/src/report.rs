//! Per-cycle outcome summary.

use std::fmt;

use serde::Serialize;

use crate::plan::ReconciliationPlan;

/// Per-identity operation that can fail independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Render,
    Upload,
    Notify,
    Revoke,
    RemoveProfile,
    RemoveUpload,
    RefreshCrl,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Render => "render",
            Self::Upload => "upload",
            Self::Notify => "notify",
            Self::Revoke => "revoke",
            Self::RemoveProfile => "remove_profile",
            Self::RemoveUpload => "remove_upload",
            Self::RefreshCrl => "refresh_crl",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub name: String,
    pub operation: Operation,
    pub error: String,
}

/// What a cycle planned and what actually happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub plan: ReconciliationPlan,
    /// Certificates issued this cycle.
    pub created: Vec<String>,
    /// Profiles uploaded and, if enabled, announced.
    pub delivered: Vec<String>,
    /// Certificates fully revoked this cycle.
    pub revoked: Vec<String>,
    /// Identities left untouched because of dry-run mode.
    pub dry_run: Vec<String>,
    pub failures: Vec<Failure>,
}

impl CycleReport {
    pub fn new(plan: ReconciliationPlan) -> Self {
        Self {
            plan,
            ..Self::default()
        }
    }

    pub fn fail(&mut self, name: &str, operation: Operation, error: impl fmt::Display) {
        let error = error.to_string();
        tracing::error!(name, %operation, error = %error, "Reconciliation step failed");
        self.failures.push(Failure {
            name: name.to_string(),
            operation,
            error,
        });
    }

    pub fn failed(&self, name: &str) -> bool {
        self.failures.iter().any(|f| f.name == name)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
