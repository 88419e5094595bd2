//! Vision/OCR Layer
//!
//! Turns images into text through the Tesseract engine:
//! - image files are handed to the engine, which reads them itself
//! - decoded images are upscaled if narrow, packed into an RGBA pixel buffer
//!   and set as the engine image

pub mod extract;
pub mod pixel_buffer;

pub use extract::{extract_from_buffer, extract_from_image, extract_from_path, RecognizedText};
pub use pixel_buffer::{
    ImageDescriptor, PixelBuffer, BYTES_PER_PIXEL, DEFAULT_MIN_WIDTH, MAX_WIDTH,
};

use std::path::Path;
use std::time::Instant;
use tracing::debug;

use crate::engine::{Engine, EngineResult};

/// Configuration for the vision pipeline
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Images narrower than this are upscaled before recognition
    pub min_width: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            min_width: DEFAULT_MIN_WIDTH,
        }
    }
}

/// Result of one recognition
#[derive(Debug, Clone)]
pub struct VisionResult {
    pub text: RecognizedText,
    pub processing_time_ms: u64,
}

/// A ready engine plus the settings used to feed it
pub struct VisionPipeline {
    engine: Engine,
    config: VisionConfig,
}

impl VisionPipeline {
    pub fn new(engine: Engine, config: VisionConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Recognize an image file
    pub fn process_file(&mut self, path: &Path) -> EngineResult<VisionResult> {
        let start = Instant::now();
        let text = extract_from_path(&mut self.engine, path)?;
        Ok(finish(text, start))
    }

    /// Recognize a decoded image
    pub fn process_image(&mut self, image: &ImageDescriptor) -> EngineResult<VisionResult> {
        let start = Instant::now();
        let text = extract_from_image(&mut self.engine, image, self.config.min_width)?;
        Ok(finish(text, start))
    }

    /// Release the engine instance now instead of at drop
    pub fn shutdown(mut self) {
        self.engine.destroy_instance();
    }
}

fn finish(text: RecognizedText, start: Instant) -> VisionResult {
    let elapsed = start.elapsed();
    debug!("Recognition complete in {:?}: {} chars", elapsed, text.as_str().chars().count());
    VisionResult {
        text,
        processing_time_ms: elapsed.as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeLibrary;
    use crate::engine::{EngineError, EngineState};

    fn pipeline(library: &FakeLibrary, min_width: u32) -> VisionPipeline {
        let mut engine = Engine::new();
        engine.load_with(Box::new(library.clone())).unwrap();
        engine.check_version().unwrap();
        engine.create_instance("eng", Path::new("/tessdata")).unwrap();
        VisionPipeline::new(engine, VisionConfig { min_width })
    }

    #[test]
    fn test_default_min_width() {
        assert_eq!(VisionConfig::default().min_width, 150);
    }

    #[test]
    fn test_process_image_uses_min_width() {
        let library = FakeLibrary::new("4.1.1").with_text(b"OK\n");
        let mut pipeline = pipeline(&library, 300);
        let image = ImageDescriptor::new(100, 20, 1, vec![0; 2000]).unwrap();

        let result = pipeline.process_image(&image).unwrap();

        assert_eq!(result.text.as_str(), "OK");
        assert_eq!(library.images(), vec![(300, 60, 4, 1200, 72000)]);
    }

    #[test]
    fn test_process_invalid_image_keeps_engine_ready() {
        let library = FakeLibrary::new("4.1.1");
        let mut pipeline = pipeline(&library, 0);
        let image = ImageDescriptor::new(10, 10, 3, vec![0; 300]).unwrap();

        let err = pipeline.process_image(&image).unwrap_err();
        assert!(matches!(err, EngineError::InvalidImage(_)));
        assert_eq!(pipeline.engine().state(), EngineState::InstanceReady);
    }

    #[test]
    fn test_shutdown_releases_instance() {
        let library = FakeLibrary::new("4.1.1");
        let pipeline = pipeline(&library, 150);
        pipeline.shutdown();
        assert_eq!(library.live_instances(), 0);
        assert_eq!(library.deletes(), 1);
    }
}
