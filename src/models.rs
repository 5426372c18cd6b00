use serde::{Deserialize, Serialize};

/// Column order of the persisted product table.
pub const CSV_FIELDS: [&str; 10] = [
    "no",
    "title",
    "sku",
    "category",
    "original_price",
    "discount_price",
    "description",
    "image_url",
    "url",
    "additional_images",
];

/// JSON-serialized empty image list.
pub const EMPTY_IMAGE_LIST: &str = "[]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub no: u32,
    pub title: String,
    pub sku: String,
    pub category: String,
    pub original_price: Option<f64>,
    pub discount_price: Option<f64>,
    pub description: String,
    pub image_url: String,
    pub url: String,
    pub additional_images: String,
}

impl ProductRecord {
    pub fn new() -> Self {
        Self {
            no: 0,
            title: String::new(),
            sku: String::new(),
            category: String::new(),
            original_price: None,
            discount_price: None,
            description: String::new(),
            image_url: String::new(),
            url: String::new(),
            additional_images: EMPTY_IMAGE_LIST.to_string(),
        }
    }
}

impl Default for ProductRecord {
    fn default() -> Self {
        Self::new()
    }
}
