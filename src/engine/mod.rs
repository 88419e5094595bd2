//! Engine Layer
//!
//! Owns the native Tesseract library and the single `TessBaseAPI` instance
//! created from it. The lifecycle is strictly forward:
//!
//! `Unloaded -> Loaded -> VersionChecked -> InstanceReady -> Destroyed`
//!
//! A failure inside any step releases whatever was acquired and leaves the
//! engine `Destroyed`. Dropping an [`Engine`] always releases the instance.

pub mod error;
pub mod ffi;
pub mod library;
pub mod version;

#[cfg(test)]
pub(crate) mod fake;

pub use error::{EngineError, EngineResult};
pub use ffi::NativeLibrary;
pub use library::{default_system_dirs, locate, LibraryPattern, LibrarySearch};
pub use version::{EngineVersion, MIN_SUPPORTED_VERSION};

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A loaded OCR library able to report its version and create instances
pub trait OcrLibrary {
    /// Version string as reported by the library
    fn version(&self) -> EngineResult<String>;

    /// Allocate and initialize an instance. An instance that fails to
    /// initialize must be released before the error is returned.
    fn create_instance(
        &self,
        language: &str,
        tessdata: &Path,
        version: &EngineVersion,
    ) -> EngineResult<Box<dyn OcrInstance>>;
}

/// One initialized engine instance. Released when dropped.
pub trait OcrInstance {
    /// Recognize the image file at `path` and return the raw UTF-8 text
    fn process_pages(&mut self, path: &Path) -> EngineResult<Vec<u8>>;

    /// Hand a pixel buffer to the engine
    fn set_image(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        bytes_per_line: u32,
    ) -> EngineResult<()>;

    /// Recognize the current image and return the raw UTF-8 text
    fn utf8_text(&mut self) -> EngineResult<Vec<u8>>;
}

/// Lifecycle state of an [`Engine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unloaded,
    Loaded,
    VersionChecked,
    InstanceReady,
    Destroyed,
}

/// Everything needed to go from nothing to a ready instance
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub search: LibrarySearch,
    /// Language pack code, e.g. "eng" or "chi_sim+eng"
    pub language: String,
    pub tessdata: PathBuf,
}

/// Tesseract engine handle manager
pub struct Engine {
    // Declared before `library` so it is dropped first
    instance: Option<Box<dyn OcrInstance>>,
    library: Option<Box<dyn OcrLibrary>>,
    version: Option<EngineVersion>,
    state: EngineState,
}

impl Engine {
    /// Create an engine with nothing loaded
    pub fn new() -> Self {
        Self {
            instance: None,
            library: None,
            version: None,
            state: EngineState::Unloaded,
        }
    }

    /// Locate, load, version-check and initialize in one call
    pub fn open(options: &EngineOptions) -> EngineResult<Self> {
        let path = options.search.locate()?;

        let mut engine = Self::new();
        engine.load(&path)?;
        engine.check_version()?;
        engine.create_instance(&options.language, &options.tessdata)?;
        Ok(engine)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Negotiated version, available from `VersionChecked` on
    pub fn version(&self) -> Option<&EngineVersion> {
        self.version.as_ref()
    }

    /// Load the native library at `path`
    pub fn load(&mut self, path: &Path) -> EngineResult<()> {
        self.expect_state(EngineState::Unloaded)?;
        info!("Loading Tesseract library from {:?}", path);

        match NativeLibrary::open(path) {
            Ok(library) => self.attach(Box::new(library)),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Use an already loaded library
    pub fn load_with(&mut self, library: Box<dyn OcrLibrary>) -> EngineResult<()> {
        self.expect_state(EngineState::Unloaded)?;
        self.attach(library)
    }

    fn attach(&mut self, library: Box<dyn OcrLibrary>) -> EngineResult<()> {
        self.library = Some(library);
        self.state = EngineState::Loaded;
        Ok(())
    }

    /// Read the library version and refuse anything older than 3.02
    pub fn check_version(&mut self) -> EngineResult<&EngineVersion> {
        self.expect_state(EngineState::Loaded)?;

        let reported = match self.library.as_ref() {
            Some(library) => library.version(),
            None => return Err(self.invalid_state(EngineState::Loaded)),
        };

        let version = match reported.and_then(|raw| EngineVersion::parse(&raw)) {
            Ok(version) => version,
            Err(e) => return Err(self.fail(e)),
        };

        if let Err(e) = version.ensure_supported() {
            warn!(
                "Found tesseract-ocr library version {}, the C API is present only from {:.2}",
                version, MIN_SUPPORTED_VERSION
            );
            return Err(self.fail(e));
        }

        info!("Tesseract version {} (using {})", version.raw(), version.trimmed());
        self.state = EngineState::VersionChecked;
        Ok(&*self.version.insert(version))
    }

    /// Allocate the engine instance and initialize it with a language pack
    pub fn create_instance(&mut self, language: &str, tessdata: &Path) -> EngineResult<()> {
        self.expect_state(EngineState::VersionChecked)?;

        let created = match (self.library.as_ref(), self.version.as_ref()) {
            (Some(library), Some(version)) => library.create_instance(language, tessdata, version),
            _ => return Err(self.invalid_state(EngineState::VersionChecked)),
        };

        match created {
            Ok(instance) => {
                info!("Tesseract initialized (language '{}', tessdata {:?})", language, tessdata);
                self.instance = Some(instance);
                self.state = EngineState::InstanceReady;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Release the instance and the library. Calling it again is a no-op.
    pub fn destroy_instance(&mut self) {
        if self.state == EngineState::Destroyed {
            debug!("Engine already destroyed");
            return;
        }
        if self.release() {
            info!("Tesseract instance destroyed");
        } else {
            debug!("Engine closed before an instance was created");
        }
    }

    /// The ready instance, or `InvalidState`
    pub(crate) fn instance_mut(&mut self) -> EngineResult<&mut (dyn OcrInstance + 'static)> {
        let actual = self.state;
        match self.instance.as_deref_mut() {
            Some(instance) if actual == EngineState::InstanceReady => Ok(instance),
            _ => Err(EngineError::InvalidState {
                expected: EngineState::InstanceReady,
                actual,
            }),
        }
    }

    fn expect_state(&self, expected: EngineState) -> EngineResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_state(expected))
        }
    }

    fn invalid_state(&self, expected: EngineState) -> EngineError {
        EngineError::InvalidState {
            expected,
            actual: self.state,
        }
    }

    /// Tear down after a failed step and pass the error through
    fn fail(&mut self, err: EngineError) -> EngineError {
        debug!("Engine setup failed in state {:?}: {}", self.state, err);
        self.release();
        err
    }

    /// Drop everything held; true when a live instance was deleted
    fn release(&mut self) -> bool {
        let had_instance = self.instance.take().is_some();
        self.library = None;
        self.state = EngineState::Destroyed;
        had_instance
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.destroy_instance();
    }
}
