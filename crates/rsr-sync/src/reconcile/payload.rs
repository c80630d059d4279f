//! Bulk payload lines
//!
//! Creation lines are `productSet` variables, one product per line. Quantity
//! lines carry an absolute target, so re-applying the same line is a no-op.

use crate::catalog::CategoryRef;
use crate::config::ReconcileConfig;
use crate::feed::FeedRecord;
use crate::reconcile::snapshot::PlatformInventoryEntry;
use crate::shopify::types::QuantityUpdateLine;
use serde_json::{json, Map, Value};

/// Option name and value used for single-variant products
pub const DEFAULT_OPTION: &str = "n/a";

/// Fill the image URL template for `record`.
///
/// `{image}` is the feed's image name and `{sku}` the stock number. Records
/// without an image name use the distributor's `{sku}_1.jpg` convention.
pub fn image_url(template: &str, record: &FeedRecord) -> String {
    let image = match record.image_name() {
        "" => format!("{}_1.jpg", record.sku()),
        name => name.to_string(),
    };
    template
        .replace("{image}", &image)
        .replace("{sku}", record.sku())
}

fn price(record: &FeedRecord) -> String {
    [record.retail_price(), record.get(crate::feed::parser::RSR_PRICING)]
        .into_iter()
        .find_map(|p| p.parse::<f64>().ok().filter(|v| *v > 0.0))
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "0.00".to_string())
}

/// `productSet` variables creating the product for `record`
pub fn build_create_line(
    record: &FeedRecord,
    category: &CategoryRef,
    config: &ReconcileConfig,
) -> Value {
    let title = match record.description() {
        "" => record.sku(),
        description => description,
    };
    let description_html = match record.expanded_description() {
        "" => record.description(),
        expanded => expanded,
    };

    let collections: Vec<&str> = category
        .gid()
        .or(config.uncategorized_gid.as_deref())
        .into_iter()
        .collect();

    let mut variant = Map::new();
    variant.insert(
        "optionValues".into(),
        json!([{ "optionName": DEFAULT_OPTION, "name": DEFAULT_OPTION }]),
    );
    variant.insert("price".into(), json!(price(record)));
    variant.insert("sku".into(), json!(record.sku()));
    if !record.upc().is_empty() {
        variant.insert("barcode".into(), json!(record.upc()));
    }
    let mut inventory_item = Map::new();
    inventory_item.insert("tracked".into(), json!(true));
    if let Some(weight) = record
        .get(crate::feed::parser::WEIGHT)
        .parse::<f64>()
        .ok()
        .filter(|w| *w > 0.0)
    {
        inventory_item.insert(
            "measurement".into(),
            json!({ "weight": { "value": weight, "unit": "OUNCES" } }),
        );
    }
    variant.insert("inventoryItem".into(), Value::Object(inventory_item));

    let mut input = Map::new();
    input.insert("title".into(), json!(title));
    input.insert("descriptionHtml".into(), json!(description_html));
    if !record.manufacturer().is_empty() {
        input.insert("vendor".into(), json!(record.manufacturer()));
    }
    input.insert("status".into(), json!("ACTIVE"));
    input.insert("collections".into(), json!(collections));
    input.insert(
        "productOptions".into(),
        json!([{ "name": DEFAULT_OPTION, "position": 1, "values": [{ "name": DEFAULT_OPTION }] }]),
    );
    input.insert("variants".into(), json!([Value::Object(variant)]));
    input.insert(
        "files".into(),
        json!([{
            "originalSource": image_url(&config.image_url_template, record),
            "alt": format!("{title} product image"),
            "contentType": "IMAGE",
        }]),
    );

    json!({ "input": Value::Object(input) })
}

/// Absolute quantity line bringing `entry` to the feed's quantity
pub fn build_quantity_update_line(
    entry: &PlatformInventoryEntry,
    record: &FeedRecord,
    location_id: &str,
) -> QuantityUpdateLine {
    QuantityUpdateLine {
        inventory_item_id: entry.inventory_item_id.clone(),
        location_id: location_id.to_string(),
        quantity: record.quantity(),
    }
}

/// Split `items` into batches of at most `size`
pub fn batches<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_IMAGE_URL_TEMPLATE;
    use crate::feed::parser::*;
    use std::collections::HashMap;

    fn config() -> ReconcileConfig {
        ReconcileConfig {
            category_map_path: "collections.json".into(),
            category_strict: false,
            uncategorized_gid: None,
            image_url_template: DEFAULT_IMAGE_URL_TEMPLATE.to_string(),
        }
    }

    fn record() -> FeedRecord {
        let mut cols = vec![String::new(); 78];
        cols[SKU] = "GLPI1750203".into();
        cols[UPC] = "764503022616".into();
        cols[DESCRIPTION] = "GLOCK 17 9MM".into();
        cols[DEPARTMENT] = "01".into();
        cols[RETAIL_PRICE] = "749.99".into();
        cols[WEIGHT] = "32".into();
        cols[QUANTITY] = "12".into();
        cols[MANUFACTURER_NAME] = "Glock Inc".into();
        cols[IMAGE_NAME] = "GLPI1750203_1.jpg".into();
        FeedRecord::from_values(cols)
    }

    #[test]
    fn test_create_line_shape() {
        let line = build_create_line(
            &record(),
            &CategoryRef::Collection("gid://shopify/Collection/1".into()),
            &config(),
        );
        let input = &line["input"];

        assert_eq!(input["title"], "GLOCK 17 9MM");
        assert_eq!(input["descriptionHtml"], "GLOCK 17 9MM");
        assert_eq!(input["vendor"], "Glock Inc");
        assert_eq!(input["status"], "ACTIVE");
        assert_eq!(input["collections"], json!(["gid://shopify/Collection/1"]));
        assert_eq!(input["variants"][0]["sku"], "GLPI1750203");
        assert_eq!(input["variants"][0]["price"], "749.99");
        assert_eq!(input["variants"][0]["barcode"], "764503022616");
        assert_eq!(input["variants"][0]["inventoryItem"]["measurement"]["weight"]["unit"], "OUNCES");
        assert_eq!(
            input["files"][0]["originalSource"],
            "https://img.rsrgroup.com/pimages/GLPI1750203_1.jpg"
        );
    }

    #[test]
    fn test_uncategorized_uses_fallback_collection() {
        let mut config = config();
        let line = build_create_line(&record(), &CategoryRef::Uncategorized, &config);
        assert_eq!(line["input"]["collections"], json!([]));

        config.uncategorized_gid = Some("gid://shopify/Collection/999".into());
        let line = build_create_line(&record(), &CategoryRef::Uncategorized, &config);
        assert_eq!(line["input"]["collections"], json!(["gid://shopify/Collection/999"]));
    }

    #[test]
    fn test_image_url_fallback_and_placeholders() {
        let mut cols = vec![String::new(); 78];
        cols[SKU] = "AB123".into();
        let bare = FeedRecord::from_values(cols);

        assert_eq!(
            image_url(DEFAULT_IMAGE_URL_TEMPLATE, &bare),
            "https://img.rsrgroup.com/pimages/AB123_1.jpg"
        );
        assert_eq!(
            image_url("https://cdn.example.com/{sku}/{image}", &bare),
            "https://cdn.example.com/AB123/AB123_1.jpg"
        );
    }

    #[test]
    fn test_quantity_line_is_absolute_and_idempotent() {
        let entry = PlatformInventoryEntry {
            sku: "GLPI1750203".into(),
            quantity: 5,
            product_id: None,
            inventory_item_id: "gid://shopify/InventoryItem/1".into(),
            media_ids: Vec::new(),
        };
        let line = build_quantity_update_line(&entry, &record(), "gid://shopify/Location/7");
        assert_eq!(line.quantity, 12);
        assert_eq!(line.location_id, "gid://shopify/Location/7");

        let mut levels: HashMap<String, i64> = HashMap::from([(entry.inventory_item_id.clone(), 5)]);
        let mut apply = |line: &QuantityUpdateLine| {
            levels.insert(line.inventory_item_id.clone(), line.quantity);
        };
        apply(&line);
        apply(&line);
        assert_eq!(levels[&entry.inventory_item_id], 12);
    }

    #[test]
    fn test_batches() {
        let items: Vec<u32> = (0..350).collect();
        let sizes: Vec<usize> = batches(&items, 150).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![150, 150, 50]);
        assert_eq!(batches(&items, 0).count(), 350);
    }

    #[test]
    fn test_price_falls_back_to_dealer_price() {
        let mut cols = vec![String::new(); 78];
        cols[SKU] = "X1".into();
        cols[RSR_PRICING] = "10.5".into();
        assert_eq!(price(&FeedRecord::from_values(cols)), "10.50");
    }
}
