//! Storefront collections for distributor departments

pub mod category;
pub mod collections;

pub use category::{CategoryMap, CategoryRef, CategoryResolver, DEPARTMENTS};
pub use collections::{CollectionProvisioner, ProvisionSummary};
