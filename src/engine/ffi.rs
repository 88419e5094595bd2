//! Runtime bindings to the Tesseract C API (`capi.h`)
//!
//! Symbols are resolved with `libloading` instead of linked, so one binary
//! works against whichever `libtesseract` the machine has installed.

use libc::{c_char, c_int, c_uchar};
use libloading::{Library, Symbol};
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::{EngineError, EngineResult};
use super::version::EngineVersion;
use super::{OcrInstance, OcrLibrary};

/// Opaque `TessBaseAPI`
#[repr(C)]
pub struct TessBaseAPI {
    _opaque: [u8; 0],
}

/// Opaque `TessResultRenderer`
#[repr(C)]
pub struct TessResultRenderer {
    _opaque: [u8; 0],
}

type TessVersionFn = unsafe extern "C" fn() -> *const c_char;
type TessBaseApiCreateFn = unsafe extern "C" fn() -> *mut TessBaseAPI;
type TessBaseApiInit3Fn =
    unsafe extern "C" fn(*mut TessBaseAPI, *const c_char, *const c_char) -> c_int;
type TessBaseApiDeleteFn = unsafe extern "C" fn(*mut TessBaseAPI);
type TessBaseApiSetImageFn =
    unsafe extern "C" fn(*mut TessBaseAPI, *const c_uchar, c_int, c_int, c_int, c_int);
type TessBaseApiGetUtf8TextFn = unsafe extern "C" fn(*mut TessBaseAPI) -> *mut c_char;
type TessDeleteTextFn = unsafe extern "C" fn(*mut c_char);

/// 3.02: recognized text is returned directly
type TessBaseApiProcessPagesLegacyFn =
    unsafe extern "C" fn(*mut TessBaseAPI, *const c_char, *const c_char, c_int) -> *mut c_char;
/// 3.03+: BOOL result, text goes to the renderer (or stays in the API)
type TessBaseApiProcessPagesFn = unsafe extern "C" fn(
    *mut TessBaseAPI,
    *const c_char,
    *const c_char,
    c_int,
    *mut TessResultRenderer,
) -> c_int;

const PROCESS_PAGES: &[u8] = b"TessBaseAPIProcessPages\0";

/// Function pointers copied out of the library; valid while it stays loaded
#[derive(Clone, Copy)]
struct TessApi {
    version: TessVersionFn,
    create: TessBaseApiCreateFn,
    init3: TessBaseApiInit3Fn,
    delete: TessBaseApiDeleteFn,
    set_image: TessBaseApiSetImageFn,
    get_utf8_text: TessBaseApiGetUtf8TextFn,
    delete_text: TessDeleteTextFn,
}

impl TessApi {
    unsafe fn resolve(lib: &Library) -> Result<Self, libloading::Error> {
        // Signature differs by version; only check presence here
        lib.get::<unsafe extern "C" fn()>(PROCESS_PAGES)?;

        Ok(Self {
            version: *lib.get::<TessVersionFn>(b"TessVersion\0")?,
            create: *lib.get::<TessBaseApiCreateFn>(b"TessBaseAPICreate\0")?,
            init3: *lib.get::<TessBaseApiInit3Fn>(b"TessBaseAPIInit3\0")?,
            delete: *lib.get::<TessBaseApiDeleteFn>(b"TessBaseAPIDelete\0")?,
            set_image: *lib.get::<TessBaseApiSetImageFn>(b"TessBaseAPISetImage\0")?,
            get_utf8_text: *lib.get::<TessBaseApiGetUtf8TextFn>(b"TessBaseAPIGetUTF8Text\0")?,
            delete_text: *lib.get::<TessDeleteTextFn>(b"TessDeleteText\0")?,
        })
    }
}

/// A loaded `libtesseract`
pub struct NativeLibrary {
    lib: Arc<Library>,
    api: TessApi,
    path: PathBuf,
}

impl NativeLibrary {
    /// Load the library at `path` and resolve every symbol the wrapper uses
    pub fn open(path: &Path) -> EngineResult<Self> {
        let load_error = |e: libloading::Error| EngineError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        // SAFETY: loading runs the library's initializers; libtesseract has
        // no initializer side effects beyond its own globals.
        let lib = unsafe { Library::new(path) }.map_err(load_error)?;
        let api = unsafe { TessApi::resolve(&lib) }.map_err(load_error)?;

        debug!("Resolved Tesseract C API symbols from {:?}", path);

        Ok(Self {
            lib: Arc::new(lib),
            api,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OcrLibrary for NativeLibrary {
    fn version(&self) -> EngineResult<String> {
        // SAFETY: TessVersion returns a pointer to a static string
        let raw = unsafe { (self.api.version)() };
        if raw.is_null() {
            return Ok(String::new());
        }
        let version = unsafe { CStr::from_ptr(raw) };
        Ok(version.to_string_lossy().into_owned())
    }

    fn create_instance(
        &self,
        language: &str,
        tessdata: &Path,
        version: &EngineVersion,
    ) -> EngineResult<Box<dyn OcrInstance>> {
        let language_c = CString::new(language)
            .map_err(|_| EngineError::InvalidArgument(format!("language {:?}", language)))?;
        let tessdata_c = path_to_cstring(tessdata)?;

        let init_error = || EngineError::Initialization {
            language: language.to_string(),
            tessdata: tessdata.to_path_buf(),
        };

        let handle = unsafe { (self.api.create)() };
        let handle = NonNull::new(handle).ok_or_else(init_error)?;

        // Owned from here on so every early return deletes the handle
        let instance = NativeInstance {
            handle,
            api: self.api,
            lib: Arc::clone(&self.lib),
            legacy_process_pages: version.has_legacy_process_pages(),
        };

        let rc = unsafe {
            (self.api.init3)(
                instance.handle.as_ptr(),
                tessdata_c.as_ptr(),
                language_c.as_ptr(),
            )
        };
        if rc != 0 {
            warn!("TessBaseAPIInit3 returned {}", rc);
            return Err(init_error());
        }

        Ok(Box::new(instance))
    }
}

/// Owned `TessBaseAPI*`; deleted on drop
pub struct NativeInstance {
    handle: NonNull<TessBaseAPI>,
    api: TessApi,
    lib: Arc<Library>,
    legacy_process_pages: bool,
}

impl NativeInstance {
    /// Copy a text buffer owned by the engine, then hand it back
    unsafe fn take_text(&self, text: *mut c_char, what: &str) -> EngineResult<Vec<u8>> {
        if text.is_null() {
            return Err(EngineError::RecognitionFailed(format!("{} returned no text", what)));
        }
        let bytes = CStr::from_ptr(text).to_bytes().to_vec();
        (self.api.delete_text)(text);
        Ok(bytes)
    }
}

impl OcrInstance for NativeInstance {
    fn process_pages(&mut self, path: &Path) -> EngineResult<Vec<u8>> {
        let filename = path_to_cstring(path)?;
        let symbol_error = |e: libloading::Error| EngineError::RecognitionFailed(e.to_string());

        if self.legacy_process_pages {
            unsafe {
                let process: Symbol<TessBaseApiProcessPagesLegacyFn> =
                    self.lib.get(PROCESS_PAGES).map_err(symbol_error)?;
                let text = process(self.handle.as_ptr(), filename.as_ptr(), ptr::null(), 0);
                self.take_text(text, "TessBaseAPIProcessPages")
            }
        } else {
            let ok = unsafe {
                let process: Symbol<TessBaseApiProcessPagesFn> =
                    self.lib.get(PROCESS_PAGES).map_err(symbol_error)?;
                process(
                    self.handle.as_ptr(),
                    filename.as_ptr(),
                    ptr::null(),
                    0,
                    ptr::null_mut(),
                )
            };
            if ok == 0 {
                return Err(EngineError::RecognitionFailed(format!(
                    "TessBaseAPIProcessPages failed for {:?}",
                    path
                )));
            }
            self.utf8_text()
        }
    }

    fn set_image(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        bytes_per_line: u32,
    ) -> EngineResult<()> {
        let to_int = |v: u32, what: &str| {
            c_int::try_from(v).map_err(|_| {
                EngineError::InvalidImage(format!("{} {} exceeds C int range", what, v))
            })
        };
        let width_c = to_int(width, "width")?;
        let height_c = to_int(height, "height")?;
        let bpp_c = to_int(bytes_per_pixel, "bytes per pixel")?;
        let bpl_c = to_int(bytes_per_line, "bytes per line")?;

        if data.len() != bytes_per_line as usize * height as usize {
            return Err(EngineError::InvalidImage(format!(
                "buffer holds {} bytes, expected {}",
                data.len(),
                bytes_per_line as usize * height as usize
            )));
        }

        // SAFETY: the engine copies the pixels into its own image before returning
        unsafe {
            (self.api.set_image)(
                self.handle.as_ptr(),
                data.as_ptr(),
                width_c,
                height_c,
                bpp_c,
                bpl_c,
            );
        }
        Ok(())
    }

    fn utf8_text(&mut self) -> EngineResult<Vec<u8>> {
        unsafe {
            let text = (self.api.get_utf8_text)(self.handle.as_ptr());
            self.take_text(text, "TessBaseAPIGetUTF8Text")
        }
    }
}

impl Drop for NativeInstance {
    fn drop(&mut self) {
        debug!("TessBaseAPIDelete");
        unsafe { (self.api.delete)(self.handle.as_ptr()) };
    }
}

fn path_to_cstring(path: &Path) -> EngineResult<CString> {
    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes().to_vec()
    };
    #[cfg(not(unix))]
    let bytes = path
        .to_str()
        .ok_or_else(|| EngineError::InvalidArgument(format!("path {:?} is not UTF-8", path)))?
        .as_bytes()
        .to_vec();

    CString::new(bytes)
        .map_err(|_| EngineError::InvalidArgument(format!("path {:?} contains a NUL byte", path)))
}
