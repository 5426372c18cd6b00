mod archive;
mod config;
mod crawler;
mod csv_writer;
mod excel_writer;
mod models;
mod parser;
mod scraper;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{ScraperConfig, CONFIG_FILE};
use crate::crawler::Crawler;
use crate::csv_writer::CsvStore;
use crate::excel_writer::convert_to_excel;
use crate::scraper::CarsonScraper;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Carson catalog scraper");

    let config = ScraperConfig::load_or_default(CONFIG_FILE);

    let scraper = match CarsonScraper::new(&config) {
        Ok(scraper) => scraper,
        Err(e) => {
            error!("Failed to set up HTTP client: {:#}", e);
            export_only(&config);
            return;
        }
    };

    let crawler = match Crawler::new(&config, &scraper, &scraper) {
        Ok(crawler) => crawler,
        Err(e) => {
            error!("Failed to set up product extractor: {:#}", e);
            export_only(&config);
            return;
        }
    };

    let summary = crawler.run_and_export(&config.xlsx_path).await;
    info!(
        "Finished after {} page(s): {} new products, stopped with {:?}",
        summary.pages_scraped, summary.new_products, summary.stop_reason
    );
}

fn export_only(config: &ScraperConfig) {
    let store = CsvStore::new(&config.csv_path);
    if let Err(e) = convert_to_excel(&store, &config.xlsx_path) {
        error!("Excel export failed: {:#}", e);
    }
}
