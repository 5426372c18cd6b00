use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{ProductRecord, CSV_FIELDS};

#[derive(Debug, Deserialize)]
struct SkuRow {
    sku: String,
}

/// Append-only product table on disk.
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Creates the table with only a header row when it does not exist yet.
    pub fn write_header(&self) -> Result<()> {
        if self.exists() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        writer.write_record(CSV_FIELDS)?;
        writer.flush()?;
        info!("Created product table {}", self.path.display());
        Ok(())
    }

    /// Reads the sku of every persisted row, initializing the table first
    /// when it is missing.
    pub fn load_skus(&self) -> Result<HashSet<String>> {
        self.write_header()?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut skus = HashSet::new();
        for row in reader.deserialize::<SkuRow>() {
            let row = row?;
            skus.insert(row.sku);
        }
        Ok(skus)
    }

    /// Reads the header and every row as raw text, leaving typing to the caller.
    pub fn read_records(&self) -> Result<(StringRecord, Vec<StringRecord>)> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let headers = reader.headers()?.clone();
        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?);
        }
        Ok((headers, records))
    }

    #[cfg(test)]
    pub fn read_products(&self) -> Result<Vec<ProductRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut products = Vec::new();
        for row in reader.deserialize::<ProductRecord>() {
            products.push(row?);
        }
        Ok(products)
    }

    /// Appends rows and closes the file again before returning.
    pub fn write_products(&self, products: &[ProductRecord]) -> Result<()> {
        self.write_header()?;

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {} for appending", self.path.display()))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        for product in products {
            writer.serialize(product)?;
        }
        writer.flush()?;
        Ok(())
    }
}
