//! Source of the currently valid certificate names.

use std::collections::BTreeSet;

use vpnsync_pki::{IndexWatcher, PkiError};

/// Reads the live certificate names from the authority.
pub trait CertificateInventory: Send + Sync {
    fn valid_names(&mut self) -> Result<BTreeSet<String>, PkiError>;

    /// Called after the authority was changed so the next read is fresh.
    fn invalidate(&mut self) {}
}

impl CertificateInventory for IndexWatcher {
    fn valid_names(&mut self) -> Result<BTreeSet<String>, PkiError> {
        Ok(self.refresh()?.names())
    }

    fn invalidate(&mut self) {
        IndexWatcher::invalidate(self);
    }
}
