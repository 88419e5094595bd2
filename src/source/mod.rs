//! Image sources
//!
//! Reads or downloads image bytes and decodes them into an `ImageDescriptor`.
//! Image files can also be passed to the engine untouched.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Builder;
use tracing::{debug, info};

use crate::vision::ImageDescriptor;

/// Where the image to recognize comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Local file, read by the engine
    File(PathBuf),
    /// Remote image, fetched and decoded here
    Url(String),
}

/// Limits applied to image downloads
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Largest accepted response body
    pub max_bytes: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Download `url` (blocking)
pub fn fetch_bytes(url: &str, options: &FetchOptions) -> Result<Vec<u8>> {
    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    rt.block_on(fetch_bytes_async(url, options))
}

/// Download `url`
pub async fn fetch_bytes_async(url: &str, options: &FetchOptions) -> Result<Vec<u8>> {
    info!("Downloading image from {}", url);

    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send download request")?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    if let Some(length) = response.content_length() {
        if length > options.max_bytes {
            anyhow::bail!(
                "Image is {} bytes, larger than the {} byte limit",
                length,
                options.max_bytes
            );
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Error reading download stream")?;
        if (bytes.len() + chunk.len()) as u64 > options.max_bytes {
            anyhow::bail!("Image exceeds the {} byte limit", options.max_bytes);
        }
        bytes.extend_from_slice(&chunk);
    }

    debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes)
}

/// Decode PNG/JPEG/GIF/... bytes
pub fn decode(bytes: &[u8]) -> Result<ImageDescriptor> {
    let image = image::load_from_memory(bytes).context("Failed to decode image")?;
    debug!("Decoded {}x{} {:?} image", image.width(), image.height(), image.color());
    Ok(ImageDescriptor::from_dynamic(&image)?)
}

/// Download and decode the image at `url`
pub fn fetch_image(url: &str, options: &FetchOptions) -> Result<ImageDescriptor> {
    let bytes = fetch_bytes(url, options)?;
    decode(&bytes)
}
