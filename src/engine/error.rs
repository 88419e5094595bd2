//! Error kinds for the engine lifecycle and extraction calls

use std::path::PathBuf;
use thiserror::Error;

use super::EngineState;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("library '{name}' not found (searched: {})", display_paths(.searched))]
    LibraryNotFound { name: String, searched: Vec<PathBuf> },

    #[error("failed to load {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("found tesseract version {found}, the C API requires {minimum} or later")]
    UnsupportedVersion { found: String, minimum: String },

    #[error("could not initialize tesseract (language '{language}', tessdata {tessdata:?})")]
    Initialization { language: String, tessdata: PathBuf },

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("operation requires state {expected:?}, engine is {actual:?}")]
    InvalidState {
        expected: EngineState,
        actual: EngineState,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("recognition failed: {0}")]
    RecognitionFailed(String),
}

impl EngineError {
    /// Process exit code for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::LibraryNotFound { .. } => 3,
            EngineError::Load { .. } => 4,
            EngineError::UnsupportedVersion { .. } => 5,
            EngineError::Initialization { .. } => 6,
            _ => 1,
        }
    }

    /// Setup failures that end the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::LibraryNotFound { .. }
                | EngineError::Load { .. }
                | EngineError::UnsupportedVersion { .. }
                | EngineError::Initialization { .. }
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_for_setup_errors() {
        let errors = [
            EngineError::LibraryNotFound {
                name: "tesseract".into(),
                searched: vec![],
            },
            EngineError::Load {
                path: PathBuf::from("/lib/libtesseract.so"),
                reason: "bad ELF".into(),
            },
            EngineError::UnsupportedVersion {
                found: "3.01".into(),
                minimum: "3.02".into(),
            },
            EngineError::Initialization {
                language: "eng".into(),
                tessdata: PathBuf::from("/tessdata"),
            },
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert!(errors.iter().all(|e| e.is_fatal()));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 4);
        assert!(!codes.contains(&0));
        assert!(!codes.contains(&1));
        assert!(!codes.contains(&2));
    }

    #[test]
    fn test_input_errors_are_not_fatal() {
        let err = EngineError::InvalidImage("zero width".into());
        assert!(!err.is_fatal());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_not_found_lists_searched_dirs() {
        let err = EngineError::LibraryNotFound {
            name: "tesseract".into(),
            searched: vec![PathBuf::from("/opt/a"), PathBuf::from("/opt/b")],
        };
        let msg = err.to_string();
        assert!(msg.contains("/opt/a, /opt/b"));
    }
}
