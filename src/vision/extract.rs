//! Text extraction through a ready engine instance

use std::fmt;
use std::path::Path;
use tracing::debug;

use super::pixel_buffer::{self, ImageDescriptor, PixelBuffer};
use crate::engine::{Engine, EngineError, EngineResult};

/// Recognized text with every newline removed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognizedText(String);

impl RecognizedText {
    /// Wrap a copy of the engine's UTF-8 output
    pub fn from_engine_bytes(mut bytes: Vec<u8>) -> Self {
        bytes.retain(|&b| b != b'\n');
        match String::from_utf8(bytes) {
            Ok(text) => Self(text),
            Err(e) => Self(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RecognizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecognizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Let the engine read and recognize the image file itself
pub fn extract_from_path(engine: &mut Engine, path: &Path) -> EngineResult<RecognizedText> {
    let instance = engine.instance_mut()?;

    if !path.is_file() {
        return Err(EngineError::InvalidArgument(format!(
            "{:?} is not a readable file",
            path
        )));
    }

    debug!("Running TessBaseAPIProcessPages on {:?}", path);
    let raw = instance.process_pages(path)?;
    Ok(RecognizedText::from_engine_bytes(raw))
}

/// Set a prepared pixel buffer as the engine image and recognize it
pub fn extract_from_buffer(
    engine: &mut Engine,
    buffer: &PixelBuffer,
) -> EngineResult<RecognizedText> {
    let instance = engine.instance_mut()?;

    debug!(
        "TessBaseAPISetImage {}x{} ({} bytes per line)",
        buffer.width(),
        buffer.height(),
        buffer.bytes_per_line()
    );
    instance.set_image(
        buffer.data(),
        buffer.width(),
        buffer.height(),
        buffer.bytes_per_pixel(),
        buffer.bytes_per_line(),
    )?;

    let raw = instance.utf8_text()?;
    Ok(RecognizedText::from_engine_bytes(raw))
}

/// Build the pixel buffer for `image` and recognize it
pub fn extract_from_image(
    engine: &mut Engine,
    image: &ImageDescriptor,
    min_width: u32,
) -> EngineResult<RecognizedText> {
    engine.instance_mut()?;
    let buffer = pixel_buffer::build(image, min_width)?;
    extract_from_buffer(engine, &buffer)
}
