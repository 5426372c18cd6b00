//! Page-by-page catalog crawl.
//!
//! Each page is fetched, archived, parsed, filtered against every sku seen so
//! far and appended to the product table before the next page is requested.
//! The crawl ends on an empty page, on a page with nothing new, or on the
//! first error. The spreadsheet export runs afterwards in every case.

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::archive::ResponseArchive;
use crate::config::ScraperConfig;
use crate::csv_writer::CsvStore;
use crate::excel_writer::convert_to_excel;
use crate::models::ProductRecord;
use crate::parser::ProductExtractor;
use crate::scraper::{CatalogSource, DetailFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The page held no products.
    EmptyPage,
    /// Every product on the page was already stored.
    NoNewProducts,
    /// The catalog request failed.
    RequestFailed,
    /// Any other error, such as failing to archive or persist a page.
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages whose new products were appended.
    pub pages_scraped: u32,
    pub new_products: u32,
    pub stop_reason: StopReason,
}

pub struct Crawler<'a, S, D> {
    source: &'a S,
    details: &'a D,
    extractor: ProductExtractor,
    store: CsvStore,
    archive: ResponseArchive,
    page_delay: Duration,
}

impl<'a, S, D> Crawler<'a, S, D>
where
    S: CatalogSource + Sync,
    D: DetailFetcher + Sync,
{
    pub fn new(config: &ScraperConfig, source: &'a S, details: &'a D) -> Result<Self> {
        Ok(Self {
            source,
            details,
            extractor: ProductExtractor::new()?,
            store: CsvStore::new(&config.csv_path),
            archive: ResponseArchive::new(&config.responses_dir),
            page_delay: config.page_delay(),
        })
    }

    /// Crawls until a stop condition is hit. Errors are logged and end the
    /// crawl; they are never returned.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary {
            pages_scraped: 0,
            new_products: 0,
            stop_reason: StopReason::Unexpected,
        };

        match self.crawl_pages(&mut summary).await {
            Ok(reason) => summary.stop_reason = reason,
            Err(e) => {
                error!("An unexpected error occurred: {:#}", e);
                summary.stop_reason = StopReason::Unexpected;
            }
        }

        info!(
            "Scraping completed. Total new products added: {}",
            summary.new_products
        );
        summary
    }

    async fn crawl_pages(&self, summary: &mut RunSummary) -> Result<StopReason> {
        let mut seen = self.store.load_skus()?;
        info!("Found {} existing products", seen.len());

        let mut page = 1;
        loop {
            let body = match self.source.fetch_page(page).await {
                Ok(body) => body,
                Err(e) => {
                    error!("Request error occurred: {:#}", e);
                    return Ok(StopReason::RequestFailed);
                }
            };

            self.archive.save(&body, page)?;

            let products = self.fetch_products(&body).await;
            if products.is_empty() {
                info!("Page {} has no products. Stopping scraper.", page);
                return Ok(StopReason::EmptyPage);
            }

            let found = products.len();
            let mut new_products = filter_new(products, &mut seen);
            if new_products.is_empty() {
                info!("No new products found. Stopping scraper.");
                return Ok(StopReason::NoNewProducts);
            }

            renumber(&mut new_products, summary.new_products);
            self.store.write_products(&new_products)?;
            summary.new_products += new_products.len() as u32;
            summary.pages_scraped += 1;

            info!(
                "Scraped page {}, found {} products, {} new products",
                page,
                found,
                new_products.len()
            );
            page += 1;

            tokio::time::sleep(self.page_delay).await;
        }
    }

    async fn fetch_products(&self, body: &str) -> Vec<ProductRecord> {
        let mut products = self.extractor.extract(body);
        for product in products.iter_mut().filter(|p| !p.url.is_empty()) {
            product.additional_images = self.details.additional_images(&product.url).await;
        }
        products
    }

    pub async fn run_and_export(&self, xlsx_path: &Path) -> RunSummary {
        let summary = self.run().await;
        if let Err(e) = convert_to_excel(&self.store, xlsx_path) {
            error!("Excel export failed: {:#}", e);
        }
        summary
    }
}

/// Keeps products whose sku has not been seen, marking each as seen so
/// duplicates within the same page are dropped too.
pub fn filter_new(products: Vec<ProductRecord>, seen: &mut HashSet<String>) -> Vec<ProductRecord> {
    products
        .into_iter()
        .filter(|product| seen.insert(product.sku.clone()))
        .collect()
}

/// Numbers products contiguously after the `already_added` products of this run.
pub fn renumber(products: &mut [ProductRecord], already_added: u32) {
    for (offset, product) in products.iter_mut().enumerate() {
        product.no = already_added + offset as u32 + 1;
    }
}
