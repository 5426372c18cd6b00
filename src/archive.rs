use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Keeps every raw catalog response on disk for replay.
pub struct ResponseArchive {
    dir: PathBuf,
}

impl ResponseArchive {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn save(&self, body: &str, page: u32) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let (path, mut file) = self.create_unique(page, &timestamp)?;
        file.write_all(body.as_bytes())?;

        info!("Saved raw HTML response to {}", path.display());
        Ok(path)
    }

    // Two runs within the same second would share a name; existing files are
    // left alone and a counter is appended instead.
    fn create_unique(&self, page: u32, timestamp: &str) -> Result<(PathBuf, File)> {
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => format!("carson_page_{}_{}.html", page, timestamp),
                n => format!("carson_page_{}_{}_{}.html", page, timestamp, n),
            };
            let path = self.dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()))
                }
            }
        }
    }
}
