use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use vendora_core::AggregateId;

/// Vendor identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(pub AggregateId);

impl VendorId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for VendorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Name-resolution boundary consumed by the receiving core.
///
/// Returns `None` for unknown vendors; callers decide the fallback label.
pub trait VendorDirectory: Send + Sync {
    fn vendor_name(&self, vendor_id: &VendorId) -> Option<String>;
}

impl<D> VendorDirectory for Arc<D>
where
    D: VendorDirectory + ?Sized,
{
    fn vendor_name(&self, vendor_id: &VendorId) -> Option<String> {
        (**self).vendor_name(vendor_id)
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryVendorDirectory {
    names: RwLock<HashMap<VendorId, String>>,
}

impl InMemoryVendorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, vendor_id: VendorId, name: impl Into<String>) {
        if let Ok(mut names) = self.names.write() {
            names.insert(vendor_id, name.into());
        }
    }
}

impl VendorDirectory for InMemoryVendorDirectory {
    fn vendor_name(&self, vendor_id: &VendorId) -> Option<String> {
        let names = self.names.read().ok()?;
        names.get(vendor_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_vendor_and_misses_unknown() {
        let directory = InMemoryVendorDirectory::new();
        let known = VendorId::new(AggregateId::new());
        let unknown = VendorId::new(AggregateId::new());

        directory.register(known, "Acme Components");

        assert_eq!(
            directory.vendor_name(&known).as_deref(),
            Some("Acme Components")
        );
        assert_eq!(directory.vendor_name(&unknown), None);
    }
}
