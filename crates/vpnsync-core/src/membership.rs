//! Authorized identities and the source that supplies them.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MembershipError;

/// Characters stripped from account names to form certificate names.
const NAME_SEPARATORS: [char; 1] = ['.'];

/// Normalize an account name into the certificate naming convention.
///
/// `john.doe` becomes `johndoe`. Comparison stays case-sensitive.
pub fn normalize_name(account_id: &str) -> String {
    account_id.replace(NAME_SEPARATORS, "")
}

/// One member of the directory group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipRecord {
    pub account_id: String,
    pub normalized_name: String,
}

impl MembershipRecord {
    pub fn from_account(account_id: impl Into<String>) -> Self {
        let account_id = account_id.into();
        let normalized_name = normalize_name(&account_id);
        Self {
            account_id,
            normalized_name,
        }
    }
}

/// Supplies the current set of authorized identities.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn members(&self) -> Result<Vec<MembershipRecord>, MembershipError>;
}
