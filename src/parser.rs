//! Extraction of product records from a catalog page.
//!
//! The catalog endpoint answers with a JSON envelope whose `products_html`
//! field holds the rendered product grid. Missing markup never aborts a
//! record: absent nodes become empty fields.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, error};

use crate::models::ProductRecord;

#[derive(Debug, Deserialize)]
struct CatalogEnvelope {
    #[serde(default)]
    products_html: String,
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {}: {}", css, e))
}

pub(crate) fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Strips the currency symbol and thousands separators before parsing.
pub fn parse_price(text: &str) -> Option<f64> {
    text.replace('€', "").replace(',', "").trim().parse::<f64>().ok()
}

pub struct ProductExtractor {
    product: Selector,
    category: Selector,
    title: Selector,
    sku: Selector,
    price_container: Selector,
    price_single: Selector,
    price_nested: Selector,
    description: Selector,
    image: Selector,
    link: Selector,
}

impl ProductExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            product: selector("div.product")?,
            category: selector("p.product__subtitle")?,
            title: selector("h3.product__title")?,
            sku: selector("small.product__sku")?,
            price_container: selector("div.product__price")?,
            price_single: selector("p.product__price")?,
            price_nested: selector("p")?,
            description: selector("p.product__text")?,
            image: selector("img")?,
            link: selector("a.product_main__link")?,
        })
    }

    /// Parses a raw catalog response. A malformed envelope yields no records.
    /// `no` is numbered from 1 in page order and `additional_images` is left
    /// as an empty list; both are filled in later.
    pub fn extract(&self, body: &str) -> Vec<ProductRecord> {
        let envelope: CatalogEnvelope = match serde_json::from_str(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("Error parsing JSON: {}", e);
                return Vec::new();
            }
        };

        let fragment = Html::parse_fragment(&envelope.products_html);
        let products: Vec<ProductRecord> = fragment
            .select(&self.product)
            .enumerate()
            .map(|(idx, node)| self.extract_product(node, idx as u32 + 1))
            .collect();

        debug!("Extracted {} products from catalog page", products.len());
        products
    }

    fn extract_product(&self, node: ElementRef, no: u32) -> ProductRecord {
        let mut product = ProductRecord::new();
        product.no = no;
        product.category = self.child_text(node, &self.category);
        product.title = self.child_text(node, &self.title);
        product.sku = self.child_text(node, &self.sku);
        product.description = self.child_text(node, &self.description);

        let (original, discount) = self.extract_prices(node);
        product.original_price = original;
        product.discount_price = discount;

        product.image_url = node
            .select(&self.image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .unwrap_or_default()
            .to_string();

        product.url = node
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default()
            .to_string();

        product
    }

    fn child_text(&self, node: ElementRef, selector: &Selector) -> String {
        node.select(selector).next().map(element_text).unwrap_or_default()
    }

    /// Returns `(original_price, discount_price)`.
    fn extract_prices(&self, node: ElementRef) -> (Option<f64>, Option<f64>) {
        if let Some(container) = node.select(&self.price_container).next() {
            return self.extract_discounted(container);
        }

        if let Some(single) = node.select(&self.price_single).next() {
            // Only the paragraph's own text; nested tags hold VAT notes etc.
            let own_text = single
                .children()
                .find_map(|child| child.value().as_text().map(|t| t.to_string()));
            return (own_text.as_deref().and_then(parse_price), None);
        }

        (None, None)
    }

    // Discount is the container's leading text, the original price sits in a
    // nested paragraph. Both parse or neither is kept.
    fn extract_discounted(&self, container: ElementRef) -> (Option<f64>, Option<f64>) {
        let Some(original_node) = container.select(&self.price_nested).next() else {
            return (None, None);
        };

        let discount = container
            .children()
            .next()
            .and_then(|child| child.value().as_text().map(|t| t.to_string()))
            .as_deref()
            .and_then(parse_price);
        let original = parse_price(&element_text(original_node));

        match (original, discount) {
            (Some(original), Some(discount)) => (Some(original), Some(discount)),
            _ => (None, None),
        }
    }
}
