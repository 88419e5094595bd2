//! In-process stand-in for `libtesseract`, recording the calls it receives

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::error::{EngineError, EngineResult};
use super::version::EngineVersion;
use super::{OcrInstance, OcrLibrary};

#[derive(Debug, Default)]
pub(crate) struct FakeLog {
    pub creates: usize,
    pub deletes: usize,
    pub processed: Vec<PathBuf>,
    /// (width, height, bytes_per_pixel, bytes_per_line, data length)
    pub images: Vec<(u32, u32, u32, u32, usize)>,
}

#[derive(Clone)]
pub(crate) struct FakeLibrary {
    version: String,
    init_status: i32,
    text: Vec<u8>,
    log: Rc<RefCell<FakeLog>>,
}

impl FakeLibrary {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            init_status: 0,
            text: b"Hello\nWorld\n".to_vec(),
            log: Rc::default(),
        }
    }

    pub fn with_init_status(mut self, status: i32) -> Self {
        self.init_status = status;
        self
    }

    pub fn with_text(mut self, text: &[u8]) -> Self {
        self.text = text.to_vec();
        self
    }

    pub fn creates(&self) -> usize {
        self.log.borrow().creates
    }

    pub fn deletes(&self) -> usize {
        self.log.borrow().deletes
    }

    pub fn live_instances(&self) -> usize {
        let log = self.log.borrow();
        log.creates - log.deletes
    }

    pub fn processed(&self) -> Vec<PathBuf> {
        self.log.borrow().processed.clone()
    }

    pub fn images(&self) -> Vec<(u32, u32, u32, u32, usize)> {
        self.log.borrow().images.clone()
    }
}

impl OcrLibrary for FakeLibrary {
    fn version(&self) -> EngineResult<String> {
        Ok(self.version.clone())
    }

    fn create_instance(
        &self,
        language: &str,
        tessdata: &Path,
        _version: &EngineVersion,
    ) -> EngineResult<Box<dyn OcrInstance>> {
        self.log.borrow_mut().creates += 1;
        let instance = FakeInstance {
            text: self.text.clone(),
            has_image: false,
            log: Rc::clone(&self.log),
        };

        if self.init_status != 0 {
            return Err(EngineError::Initialization {
                language: language.to_string(),
                tessdata: tessdata.to_path_buf(),
            });
        }
        Ok(Box::new(instance))
    }
}

struct FakeInstance {
    text: Vec<u8>,
    has_image: bool,
    log: Rc<RefCell<FakeLog>>,
}

impl OcrInstance for FakeInstance {
    fn process_pages(&mut self, path: &Path) -> EngineResult<Vec<u8>> {
        self.log.borrow_mut().processed.push(path.to_path_buf());
        Ok(self.text.clone())
    }

    fn set_image(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        bytes_per_line: u32,
    ) -> EngineResult<()> {
        self.log
            .borrow_mut()
            .images
            .push((width, height, bytes_per_pixel, bytes_per_line, data.len()));
        self.has_image = true;
        Ok(())
    }

    fn utf8_text(&mut self) -> EngineResult<Vec<u8>> {
        if !self.has_image {
            return Err(EngineError::RecognitionFailed("no image set".into()));
        }
        Ok(self.text.clone())
    }
}

impl Drop for FakeInstance {
    fn drop(&mut self) {
        self.log.borrow_mut().deletes += 1;
    }
}
