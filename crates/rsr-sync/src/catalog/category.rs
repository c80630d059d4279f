//! Department code to collection resolution
//!
//! The distributor tags every product with a numeric department. Each
//! department maps to one storefront collection through the category map
//! file written by `rsr-sync collections`. The map is loaded once per run;
//! codes it does not cover resolve to [`CategoryRef::Uncategorized`].

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// One distributor department
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Department {
    pub code: u32,
    pub title: &'static str,
    pub handle: &'static str,
}

const fn dept(code: u32, title: &'static str, handle: &'static str) -> Department {
    Department {
        code,
        title,
        handle,
    }
}

/// Distributor departments. 31 is a second code for optical accessories and
/// shares department 9's collection.
pub const DEPARTMENTS: [Department; 43] = [
    dept(1, "Handguns", "handguns"),
    dept(2, "Used Handguns", "used-handguns"),
    dept(3, "Used Long Guns", "used-long-guns"),
    dept(4, "Tasers", "tasers"),
    dept(5, "Long Guns", "long-guns"),
    dept(6, "NFA Products", "nfa-products"),
    dept(7, "Black Powder", "black-powder"),
    dept(8, "Optics", "optics"),
    dept(9, "Optical Accessories", "optical-accessories"),
    dept(10, "Magazines", "magazines"),
    dept(11, "Grips, Pads, Stocks, Bipods", "grips-pads-stocks-bipods"),
    dept(12, "Soft Gun Cases, Packs, Bags", "soft-gun-cases-packs-bags"),
    dept(13, "Misc. Accessories", "misc-accessories"),
    dept(14, "Holsters & Pouches", "holsters-pouches"),
    dept(15, "Reloading Equipment", "reloading-equipment"),
    dept(16, "Black Powder Accessories", "black-powder-accessories"),
    dept(17, "Closeout Accessories", "closeout-accessories"),
    dept(18, "Ammunition", "ammunition"),
    dept(19, "Survival & Camping Supplies", "survival-camping-supplies"),
    dept(20, "Lights, Lasers & Batteries", "lights-lasers-batteries"),
    dept(21, "Cleaning Equipment", "cleaning-equipment"),
    dept(22, "Airguns", "airguns"),
    dept(23, "Knives & Tools", "knives-tools"),
    dept(24, "High Capacity Magazines", "high-capacity-magazines"),
    dept(25, "Safes & Security", "safes-security"),
    dept(26, "Safety & Protection", "safety-protection"),
    dept(27, "Non-Lethal Defense", "non-lethal-defense"),
    dept(28, "Binoculars", "binoculars"),
    dept(29, "Spotting Scopes", "spotting-scopes"),
    dept(30, "Sights", "sights"),
    dept(31, "Optical Accessories", "optical-accessories"),
    dept(32, "Barrels & Choke Tubes", "barrels-choke-tubes"),
    dept(33, "Clothing", "clothing"),
    dept(34, "Parts", "parts"),
    dept(35, "Slings & Swivels", "slings-swivels"),
    dept(36, "Electronics", "electronics"),
    dept(37, "Unused", "unused"),
    dept(38, "Books, Software & DVD's", "books-software-dvds"),
    dept(39, "Targets", "targets"),
    dept(40, "Hard Gun Cases", "hard-gun-cases"),
    dept(41, "Upper Receivers & Conversion Kits", "upper-receivers-conversion-kits"),
    dept(42, "SBR Barrels & Upper Receivers", "sbr-barrels-upper-receivers"),
    dept(
        43,
        "Upper Receivers & Conversion Kits - High Capacity",
        "upper-receivers-conversion-kits-high-capacity",
    ),
];

/// Normalize a feed department code: `"05"` and `"5"` are the same department.
pub fn normalize_code(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|code| *code > 0)
}

/// Look up a department by feed code
pub fn department(raw: &str) -> Option<&'static Department> {
    let code = normalize_code(raw)?;
    DEPARTMENTS.iter().find(|d| d.code == code)
}

/// Department collections, deduplicated by handle, in table order
pub fn unique_collections() -> Vec<&'static Department> {
    let mut seen = std::collections::HashSet::new();
    DEPARTMENTS
        .iter()
        .filter(|d| seen.insert(d.handle))
        .collect()
}

/// One entry of the category map file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub title: String,
    pub handle: String,
    pub gid: String,
}

/// Contents of the category map file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMap {
    pub entries: Vec<CategoryEntry>,
}

impl CategoryMap {
    /// Load the map from a JSON array of `{title, handle, gid}`
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_if_present(path)?.ok_or_else(|| {
            SyncError::config(format!(
                "Category map {} does not exist. Run `rsr-sync collections` first",
                path.display()
            ))
        })
    }

    /// Like [`CategoryMap::load`], but a missing file is `Ok(None)`.
    ///
    /// A file that exists but cannot be read or parsed is always an error.
    pub fn load_if_present(path: &Path) -> Result<Option<Self>> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::config(format!(
                    "Cannot read category map {}: {e}",
                    path.display()
                )))
            },
        };
        let map: CategoryMap = serde_json::from_str(&raw).map_err(|e| {
            SyncError::config(format!("Invalid category map {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), entries = map.entries.len(), "Loaded category map");
        Ok(Some(map))
    }

    /// Write the map as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Result of resolving a department code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryRef {
    Collection(String),
    Uncategorized,
}

impl CategoryRef {
    pub fn gid(&self) -> Option<&str> {
        match self {
            Self::Collection(gid) => Some(gid),
            Self::Uncategorized => None,
        }
    }
}

/// Department code lookup built from a [`CategoryMap`]
#[derive(Debug, Clone, Default)]
pub struct CategoryResolver {
    by_code: HashMap<u32, String>,
}

impl CategoryResolver {
    pub fn new(map: &CategoryMap) -> Self {
        let by_handle: HashMap<&str, &str> = map
            .entries
            .iter()
            .map(|e| (e.handle.as_str(), e.gid.as_str()))
            .collect();
        let by_title: HashMap<&str, &str> = map
            .entries
            .iter()
            .map(|e| (e.title.as_str(), e.gid.as_str()))
            .collect();

        let by_code = DEPARTMENTS
            .iter()
            .filter_map(|d| {
                by_handle
                    .get(d.handle)
                    .or_else(|| by_title.get(d.title))
                    .map(|gid| (d.code, gid.to_string()))
            })
            .collect();

        Self { by_code }
    }

    /// Resolve a raw feed department code. Never fails.
    pub fn resolve(&self, raw: &str) -> CategoryRef {
        normalize_code(raw)
            .and_then(|code| self.by_code.get(&code))
            .map(|gid| CategoryRef::Collection(gid.clone()))
            .unwrap_or(CategoryRef::Uncategorized)
    }

    /// Departments with no collection in the map
    pub fn missing_departments(&self) -> Vec<&'static Department> {
        DEPARTMENTS
            .iter()
            .filter(|d| !self.by_code.contains_key(&d.code))
            .collect()
    }

    /// Check the map covers every department. Gaps are warned about, or
    /// rejected when `strict`.
    pub fn validate(&self, strict: bool) -> Result<()> {
        let missing = self.missing_departments();
        if missing.is_empty() {
            return Ok(());
        }

        let codes = missing
            .iter()
            .map(|d| format!("{} ({})", d.code, d.title))
            .collect::<Vec<_>>()
            .join(", ");

        if strict {
            return Err(SyncError::config(format!(
                "Category map has no collection for departments: {codes}"
            )));
        }
        warn!(
            missing = missing.len(),
            "Category map has no collection for departments {codes}; those products will be uncategorized"
        );
        Ok(())
    }
}
