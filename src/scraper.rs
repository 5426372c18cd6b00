use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use scraper::Html;
use tracing::{debug, error, instrument};

use crate::config::ScraperConfig;
use crate::models::EMPTY_IMAGE_LIST;
use crate::parser::selector;

/// Source of raw catalog pages.
#[async_trait]
pub trait CatalogSource {
    async fn fetch_page(&self, page: u32) -> Result<String>;
}

/// Looks up the gallery images of a single product.
#[async_trait]
pub trait DetailFetcher {
    /// Returns a JSON list of image URLs, `"[]"` on any failure.
    async fn additional_images(&self, path: &str) -> String;
}

pub struct CarsonScraper {
    client: Client,
    catalog_url: String,
    origin: Url,
    catalog_headers: HeaderMap,
}

impl CarsonScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            catalog_url: config.catalog_url.clone(),
            origin: Url::parse(&config.origin)
                .with_context(|| format!("Invalid origin {}", config.origin))?,
            catalog_headers: catalog_headers(config)?,
        })
    }

    async fn fetch_detail_images(&self, path: &str) -> Result<Vec<String>> {
        let url = self
            .origin
            .join(path)
            .with_context(|| format!("Cannot resolve {} against {}", path, self.origin))?;
        debug!("Fetching product details from {}", url);

        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_detail_images(&body)
    }
}

fn catalog_headers(config: &ScraperConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language).context("Invalid accept-language")?,
    );
    headers.insert(
        header::REFERER,
        HeaderValue::from_str(&config.referer).context("Invalid referer")?,
    );
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua"),
        HeaderValue::from_static(r#""Not(A:Brand";v="99", "Google Chrome";v="133", "Chromium";v="133""#),
    );
    headers.insert(HeaderName::from_static("sec-ch-ua-mobile"), HeaderValue::from_static("?0"));
    headers.insert(
        HeaderName::from_static("sec-ch-ua-platform"),
        HeaderValue::from_static(r#""Windows""#),
    );
    headers.insert(
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    Ok(headers)
}

/// Collects the non-empty `src` of every image in the detail gallery.
pub fn parse_detail_images(html: &str) -> Result<Vec<String>> {
    let gallery = selector("div.product_detail__stack img")?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&gallery)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| !src.is_empty())
        .map(str::to_string)
        .collect())
}

#[async_trait]
impl CatalogSource for CarsonScraper {
    #[instrument(skip(self))]
    async fn fetch_page(&self, page: u32) -> Result<String> {
        let page_param = page.to_string();
        let response = self
            .client
            .get(&self.catalog_url)
            .query(&[("lp", page_param.as_str()), ("ajax", "true")])
            .headers(self.catalog_headers.clone())
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}

#[async_trait]
impl DetailFetcher for CarsonScraper {
    async fn additional_images(&self, path: &str) -> String {
        match self.fetch_detail_images(path).await {
            Ok(urls) => serde_json::to_string(&urls).unwrap_or_else(|_| EMPTY_IMAGE_LIST.to_string()),
            Err(e) => {
                error!("Error getting product details for {}: {:#}", path, e);
                EMPTY_IMAGE_LIST.to_string()
            }
        }
    }
}
