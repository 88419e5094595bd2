//! Shared library discovery
//!
//! Search directories are passed in explicitly. Nothing here reads or writes
//! `LD_LIBRARY_PATH` / `DYLD_LIBRARY_PATH`.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::{EngineError, EngineResult};

/// Platform naming convention for shared libraries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryPattern {
    /// `libNAME.so`, `libNAME.so.3`, `libNAME.so.5.3.0`
    Elf,
    /// `libNAME.dylib`, `libNAME.3.dylib`
    MachO,
    /// `NAME.dll`, `NAME41.dll`, `libNAME-5.dll`
    Pe,
}

impl LibraryPattern {
    /// Convention of the platform this binary was built for
    pub fn native() -> Self {
        if cfg!(target_os = "windows") {
            LibraryPattern::Pe
        } else if cfg!(target_os = "macos") {
            LibraryPattern::MachO
        } else {
            LibraryPattern::Elf
        }
    }

    /// Unversioned file name, e.g. `libtesseract.so`
    pub fn file_name(&self, name: &str) -> String {
        match self {
            LibraryPattern::Elf => format!("lib{}.so", name),
            LibraryPattern::MachO => format!("lib{}.dylib", name),
            LibraryPattern::Pe => format!("{}.dll", name),
        }
    }

    /// Whether `file_name` is a (possibly versioned) build of library `name`
    pub fn matches(&self, file_name: &str, name: &str) -> bool {
        match self {
            LibraryPattern::Elf => {
                let base = format!("lib{}.so", name);
                file_name == base || file_name.starts_with(&format!("{}.", base))
            }
            LibraryPattern::MachO => {
                let prefix = format!("lib{}", name);
                match file_name.strip_prefix(&prefix) {
                    Some(rest) => {
                        rest == ".dylib" || (rest.starts_with('.') && rest.ends_with(".dylib"))
                    }
                    None => false,
                }
            }
            LibraryPattern::Pe => {
                let lower = file_name.to_ascii_lowercase();
                let name = name.to_ascii_lowercase();
                let stem = lower.strip_suffix(".dll");
                match stem {
                    Some(stem) => {
                        let stem = stem.strip_prefix("lib").unwrap_or(stem);
                        stem.strip_prefix(name.as_str())
                            .map(|rest| {
                                rest.chars()
                                    .all(|c| c.is_ascii_digit() || c == '-' || c == '.')
                            })
                            .unwrap_or(false)
                    }
                    None => false,
                }
            }
        }
    }
}

/// Directories the platform's loader conventionally searches
pub fn default_system_dirs() -> Vec<PathBuf> {
    let dirs: &[&str] = if cfg!(target_os = "windows") {
        &["C:\\Program Files\\Tesseract-OCR"]
    } else if cfg!(target_os = "macos") {
        &["/opt/homebrew/lib", "/usr/local/lib", "/opt/local/lib", "/usr/lib"]
    } else {
        &[
            "/usr/local/lib",
            "/usr/lib",
            "/usr/lib64",
            "/usr/lib/x86_64-linux-gnu",
            "/usr/lib/aarch64-linux-gnu",
            "/lib",
        ]
    };
    dirs.iter().map(PathBuf::from).collect()
}

/// Where and how to look for the engine library
#[derive(Debug, Clone)]
pub struct LibrarySearch {
    pub name: String,
    /// Searched first, in order
    pub extra_paths: Vec<PathBuf>,
    /// Searched after `extra_paths`
    pub system_paths: Vec<PathBuf>,
    pub pattern: LibraryPattern,
}

impl LibrarySearch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra_paths: Vec::new(),
            system_paths: default_system_dirs(),
            pattern: LibraryPattern::native(),
        }
    }

    pub fn with_extra_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.extra_paths.extend(paths);
        self
    }

    pub fn with_system_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.system_paths = paths;
        self
    }

    pub fn with_pattern(mut self, pattern: LibraryPattern) -> Self {
        self.pattern = pattern;
        self
    }

    fn dirs(&self) -> impl Iterator<Item = &PathBuf> {
        self.extra_paths.iter().chain(self.system_paths.iter())
    }

    /// Resolve the library file: exact name in every directory first, then a
    /// scan for versioned file names.
    pub fn locate(&self) -> EngineResult<PathBuf> {
        let exact = self.pattern.file_name(&self.name);

        for dir in self.dirs() {
            let candidate = dir.join(&exact);
            if candidate.is_file() {
                info!("Library found: {:?}", candidate);
                return Ok(candidate);
            }
        }

        for dir in self.dirs() {
            if let Some(found) = scan_dir(dir, &self.name, self.pattern) {
                info!("Library found by pattern: {:?}", found);
                return Ok(found);
            }
        }

        Err(EngineError::LibraryNotFound {
            name: self.name.clone(),
            searched: self.dirs().cloned().collect(),
        })
    }
}

/// Locate `library_name`, consulting `extra_search_paths` before the system
/// directories
pub fn locate(library_name: &str, extra_search_paths: &[PathBuf]) -> EngineResult<PathBuf> {
    LibrarySearch::new(library_name)
        .with_extra_paths(extra_search_paths.iter().cloned())
        .locate()
}

fn scan_dir(dir: &Path, name: &str, pattern: LibraryPattern) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping {:?}: {}", dir, e);
            return None;
        }
    };

    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|f| pattern.matches(f, name))
                .unwrap_or(false)
        })
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    // Shortest name is the least specific symlink (libx.so.5 before libx.so.5.3.0)
    matches.sort_by(|a, b| {
        let a_len = a.as_os_str().len();
        let b_len = b.as_os_str().len();
        a_len.cmp(&b_len).then_with(|| a.cmp(b))
    });
    matches.into_iter().next()
}
