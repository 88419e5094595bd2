//! tesseract-capi - Tesseract OCR through its C API
//!
//! Loads `libtesseract` at runtime, checks that its version ships the C API,
//! and recognizes text from image files or from decoded images marshaled
//! into RGBA pixel buffers.

pub mod config;
pub mod engine;
pub mod source;
pub mod vision;

pub use engine::{Engine, EngineError, EngineOptions, EngineState, EngineVersion};
pub use source::{FetchOptions, ImageSource};
pub use vision::{ImageDescriptor, PixelBuffer, RecognizedText, VisionConfig, VisionPipeline};
