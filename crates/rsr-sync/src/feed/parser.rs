//! Distributor inventory file parser
//!
//! The feed is a headerless, semicolon-delimited text file with 78 fixed
//! columns. Lines may end in `\r\n`; the file normally ends with a newline,
//! which leaves a trailing blank line that is skipped.

use crate::error::{Result, SyncError};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Column delimiter
pub const DELIMITER: char = ';';

/// Feed columns, in file order
pub const COLUMNS: [&str; 78] = [
    "RSR Stock Number",
    "UPC Code",
    "Product Description",
    "Department Number",
    "Manufacturer Id",
    "Retail Price",
    "RSR Pricing",
    "Product Weight",
    "Inventory Quantity",
    "Model",
    "Full Manufacturer Name",
    "Manufacturer Part Number",
    "Allocated/Closeout/Deleted",
    "Expanded Product Description",
    "Image Name",
    "AK",
    "AL",
    "AR",
    "AZ",
    "CA",
    "CO",
    "CT",
    "DC",
    "DE",
    "FL",
    "GA",
    "HI",
    "IA",
    "ID",
    "IL",
    "IN",
    "KS",
    "KY",
    "LA",
    "MA",
    "MD",
    "ME",
    "MI",
    "MN",
    "MO",
    "MS",
    "MT",
    "NC",
    "ND",
    "NE",
    "NH",
    "NJ",
    "NM",
    "NV",
    "NY",
    "OH",
    "OK",
    "OR",
    "PA",
    "RI",
    "SC",
    "SD",
    "TN",
    "TX",
    "UT",
    "VA",
    "VT",
    "WA",
    "WI",
    "WV",
    "WY",
    "Ground Shipments Only",
    "Adult Signature Required",
    "Blocked from Drop Ship",
    "Date Entered",
    "Retail MAP",
    "Image Disclaimer",
    "Shipping Length",
    "Shipping Width",
    "Shipping Height",
    "Prop 65",
    "Vendor Approval Required",
    "Reserved for Future Use",
];

pub const SKU: usize = 0;
pub const UPC: usize = 1;
pub const DESCRIPTION: usize = 2;
pub const DEPARTMENT: usize = 3;
pub const MANUFACTURER_ID: usize = 4;
pub const RETAIL_PRICE: usize = 5;
pub const RSR_PRICING: usize = 6;
pub const WEIGHT: usize = 7;
pub const QUANTITY: usize = 8;
pub const MODEL: usize = 9;
pub const MANUFACTURER_NAME: usize = 10;
pub const MANUFACTURER_PART: usize = 11;
pub const ALLOCATED: usize = 12;
pub const EXPANDED_DESCRIPTION: usize = 13;
pub const IMAGE_NAME: usize = 14;
/// First and last per-state restriction column (AK..WY)
pub const STATE_COLUMNS: std::ops::RangeInclusive<usize> = 15..=65;
pub const GROUND_ONLY: usize = 66;
pub const ADULT_SIGNATURE: usize = 67;
pub const BLOCKED_FROM_DROP_SHIP: usize = 68;
pub const DATE_ENTERED: usize = 69;
pub const RETAIL_MAP: usize = 70;
pub const IMAGE_DISCLAIMER: usize = 71;
pub const SHIPPING_LENGTH: usize = 72;
pub const SHIPPING_WIDTH: usize = 73;
pub const SHIPPING_HEIGHT: usize = 74;
pub const PROP_65: usize = 75;
pub const VENDOR_APPROVAL: usize = 76;

/// One feed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRecord {
    values: Vec<String>,
}

impl FeedRecord {
    /// Build a record from raw column values. Short rows are padded with empty
    /// strings and extra columns are dropped.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values
            .into_iter()
            .take(COLUMNS.len())
            .map(|v| v.into().trim().to_string())
            .collect();
        values.resize(COLUMNS.len(), String::new());
        Self { values }
    }

    /// Value of column `index`
    pub fn get(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }

    /// Value of the column named `name`
    pub fn field(&self, name: &str) -> Option<&str> {
        COLUMNS
            .iter()
            .position(|c| *c == name)
            .map(|index| self.get(index))
    }

    /// Column name to value mapping
    pub fn to_map(&self) -> HashMap<&'static str, &str> {
        COLUMNS
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (*name, value.as_str()))
            .collect()
    }

    pub fn sku(&self) -> &str {
        self.get(SKU)
    }

    pub fn upc(&self) -> &str {
        self.get(UPC)
    }

    pub fn description(&self) -> &str {
        self.get(DESCRIPTION)
    }

    pub fn expanded_description(&self) -> &str {
        self.get(EXPANDED_DESCRIPTION)
    }

    pub fn department(&self) -> &str {
        self.get(DEPARTMENT)
    }

    pub fn manufacturer(&self) -> &str {
        self.get(MANUFACTURER_NAME)
    }

    pub fn retail_price(&self) -> &str {
        self.get(RETAIL_PRICE)
    }

    pub fn image_name(&self) -> &str {
        self.get(IMAGE_NAME)
    }

    /// Inventory quantity; anything that is not an integer counts as 0.
    pub fn quantity(&self) -> i64 {
        self.get(QUANTITY).parse().unwrap_or(0)
    }

    /// States the product may not ship to
    pub fn restricted_states(&self) -> Vec<&'static str> {
        STATE_COLUMNS
            .filter(|&index| self.get(index).eq_ignore_ascii_case("Y"))
            .map(|index| COLUMNS[index])
            .collect()
    }
}

/// Parsed feed, in file order, with unique SKUs
#[derive(Debug, Clone, Default)]
pub struct Feed {
    records: Vec<FeedRecord>,
    index: HashMap<String, usize>,
    pub duplicates: usize,
    pub skipped: usize,
}

impl Feed {
    /// Build a feed from records, dropping empty and duplicate SKUs.
    /// The first occurrence of a SKU wins.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = FeedRecord>,
    {
        let mut feed = Feed::default();
        for record in records {
            feed.push(record);
        }
        feed
    }

    fn push(&mut self, record: FeedRecord) {
        if record.sku().is_empty() {
            self.skipped += 1;
            return;
        }
        if self.index.contains_key(record.sku()) {
            warn!(sku = %record.sku(), "Duplicate SKU in feed, keeping first occurrence");
            self.duplicates += 1;
            return;
        }
        self.index.insert(record.sku().to_string(), self.records.len());
        self.records.push(record);
    }

    pub fn get(&self, sku: &str) -> Option<&FeedRecord> {
        self.index.get(sku).map(|&i| &self.records[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a feed from any reader
pub fn parse_feed<R: Read>(reader: R) -> Result<Feed> {
    let mut reader = BufReader::new(reader);
    let mut feed = Feed::default();
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| SyncError::Feed(format!("Failed to read line {}: {e}", line_no + 1)))?;
        if read == 0 {
            break;
        }
        line_no += 1;

        // The distributor exports Latin-1 in places; keep going on bad bytes.
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }

        let record = FeedRecord::from_values(line.split(DELIMITER));
        if record.sku().is_empty() {
            debug!(line = line_no, "Skipping feed line without stock number");
        }
        feed.push(record);
    }

    info!(
        records = feed.len(),
        duplicates = feed.duplicates,
        skipped = feed.skipped,
        "Parsed inventory feed"
    );
    Ok(feed)
}

/// Parse the feed file at `path`
pub fn parse_feed_file(path: &Path) -> Result<Feed> {
    let file = std::fs::File::open(path)
        .map_err(|e| SyncError::Feed(format!("Cannot open {}: {e}", path.display())))?;
    parse_feed(file)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn line(sku: &str, quantity: &str, department: &str) -> String {
        let mut cols = vec![String::new(); COLUMNS.len()];
        cols[SKU] = sku.into();
        cols[QUANTITY] = quantity.into();
        cols[DEPARTMENT] = department.into();
        cols[DESCRIPTION] = format!("Product {sku}");
        cols.join(";")
    }

    #[test]
    fn test_column_layout() {
        assert_eq!(COLUMNS.len(), 78);
        assert_eq!(COLUMNS[IMAGE_NAME], "Image Name");
        assert_eq!(COLUMNS[*STATE_COLUMNS.start()], "AK");
        assert_eq!(COLUMNS[*STATE_COLUMNS.end()], "WY");
        assert_eq!(COLUMNS[GROUND_ONLY], "Ground Shipments Only");
        assert_eq!(COLUMNS[VENDOR_APPROVAL], "Vendor Approval Required");
    }

    #[test]
    fn test_parse_handles_crlf_and_trailing_newline() {
        let input = format!("{}\r\n{}\r\n", line("A1", "5", "05"), line("A2", "3", "99"));
        let feed = parse_feed(input.as_bytes()).unwrap();

        assert_eq!(feed.len(), 2);
        let a1 = feed.get("A1").unwrap();
        assert_eq!(a1.quantity(), 5);
        assert_eq!(a1.department(), "05");
        assert_eq!(feed.get("A2").unwrap().field("Department Number"), Some("99"));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let feed = parse_feed("B1;012345678905;Short row\n".as_bytes()).unwrap();
        let record = feed.get("B1").unwrap();

        assert_eq!(record.upc(), "012345678905");
        assert_eq!(record.image_name(), "");
        assert_eq!(record.quantity(), 0);
        assert_eq!(record.to_map().len(), 78);
    }

    #[test]
    fn test_duplicates_and_blank_skus_are_dropped() {
        let input = [
            line("A1", "5", "01"),
            line("A1", "9", "01"),
            line("", "1", "01"),
            String::new(),
            line("A2", "x", "01"),
        ]
        .join("\n");
        let feed = parse_feed(input.as_bytes()).unwrap();

        assert_eq!(feed.len(), 2);
        assert_eq!(feed.duplicates, 1);
        assert_eq!(feed.skipped, 1);
        assert_eq!(feed.get("A1").unwrap().quantity(), 5);
        assert_eq!(feed.get("A2").unwrap().quantity(), 0);
        let order: Vec<&str> = feed.iter().map(|r| r.sku()).collect();
        assert_eq!(order, vec!["A1", "A2"]);
    }

    #[test]
    fn test_restricted_states() {
        let mut cols = vec![String::new(); COLUMNS.len()];
        cols[SKU] = "C1".into();
        cols[19] = "Y".into();
        cols[49] = "Y".into();
        let record = FeedRecord::from_values(cols);

        assert_eq!(record.restricted_states(), vec!["CA", "NY"]);
    }

    #[test]
    fn test_missing_file_is_feed_error() {
        let err = parse_feed_file(Path::new("/nonexistent/feed.txt")).unwrap_err();
        assert!(matches!(err, SyncError::Feed(_)));
    }
}
