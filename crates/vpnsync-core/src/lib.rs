//! vpnsync core: membership-driven certificate reconciliation.
//!
//! Each cycle reads the valid certificates from the authority's index and
//! the authorized identities from the membership source, diffs the two, and
//! issues or revokes certificates to close the gap. Newly issued profiles
//! are handed to the delivery pipeline.

pub mod delivery;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod membership;
pub mod plan;
pub mod recipient;
pub mod report;
pub mod runner;

#[cfg(test)]
mod testing;

pub use delivery::{object_key, Delivery, Notification};
pub use engine::{Collaborators, Reconciler, SyncOptions};
pub use error::{DeliveryError, MembershipError, SyncError};
pub use inventory::CertificateInventory;
pub use membership::{normalize_name, MembershipRecord, MembershipSource};
pub use plan::ReconciliationPlan;
pub use recipient::{derive_email, RecipientError};
pub use report::{CycleReport, Failure, Operation};
pub use runner::run_loop;
