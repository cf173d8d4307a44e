//! `vendora-vendors` — vendor directory collaborator boundary.
//!
//! Vendor records (contacts, addresses) are managed elsewhere; this core only
//! needs to resolve a vendor reference to a display name when labeling
//! invoices and listings.

pub mod directory;

pub use directory::{InMemoryVendorDirectory, VendorDirectory, VendorId};
