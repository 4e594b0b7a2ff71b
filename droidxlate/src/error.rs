//! All error types for the droidxlate crate.
//!
//! Every stage of a run reports through [`Error`]. Apart from
//! [`Error::Config`], errors are scoped to one module, file, batch or item and
//! are accumulated into the run report instead of aborting the run.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("scan error at {}: {message}", path.display())]
    Scan { path: PathBuf, message: String },

    #[error("no resource files found under {}", .0.display())]
    NoResourcesFound(PathBuf),

    #[error("parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("backend error: {message}")]
    Backend { message: String, retryable: bool },

    #[error("validation error for `{id}`: {reason}")]
    Validation { id: String, reason: String },

    #[error("merge error in {}: {message}", path.display())]
    Merge { path: PathBuf, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used in reports and exit-status decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Scan,
    NoResourcesFound,
    Parse,
    Backend,
    Validation,
    Merge,
    Config,
    Io,
}

impl Error {
    /// Creates a new parse error for the given file.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new merge error for the given file.
    pub fn merge(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Merge {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a backend error that the orchestrator may retry.
    pub fn backend_retryable(message: impl Into<String>) -> Self {
        Error::Backend {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a backend error that must not be retried (auth, budget, bad request).
    pub fn backend_fatal(message: impl Into<String>) -> Self {
        Error::Backend {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Scan { .. } => ErrorKind::Scan,
            Error::NoResourcesFound(_) => ErrorKind::NoResourcesFound,
            Error::Parse { .. } | Error::Xml(_) | Error::Json(_) => ErrorKind::Parse,
            Error::Backend { .. } => ErrorKind::Backend,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Merge { .. } => ErrorKind::Merge,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Only configuration problems stop a whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Backend { retryable, .. } => *retryable,
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Path the error refers to, when it has one.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Error::Scan { path, .. }
            | Error::Parse { path, .. }
            | Error::Merge { path, .. }
            | Error::NoResourcesFound(path) => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_parse_error_display() {
        let error = Error::parse("app/src/main/res/values/strings.xml", "unexpected EOF");
        assert_eq!(
            error.to_string(),
            "parse error in app/src/main/res/values/strings.xml: unexpected EOF"
        );
        assert_eq!(error.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_no_resources_found_display() {
        let error = Error::NoResourcesFound(PathBuf::from("/tmp/project"));
        assert!(error.to_string().contains("/tmp/project"));
        assert!(!error.is_fatal());
    }

    #[test]
    fn test_backend_retryable_flags() {
        assert!(Error::backend_retryable("HTTP 429").is_retryable());
        assert!(!Error::backend_fatal("HTTP 401").is_retryable());
        assert_eq!(Error::backend_fatal("x").kind(), ErrorKind::Backend);
    }

    #[test]
    fn test_only_config_is_fatal() {
        let errors = vec![
            Error::Scan {
                path: PathBuf::from("res/values-zz1"),
                message: "bad qualifier".to_string(),
            },
            Error::merge("strings.xml", "duplicate key"),
            Error::Validation {
                id: "greeting".to_string(),
                reason: "missing %1$s".to_string(),
            },
            Error::Io(io::Error::new(io::ErrorKind::NotFound, "gone")),
        ];
        for error in errors {
            assert!(!error.is_fatal(), "{error} should not be fatal");
        }
        assert!(Error::Config("no API key".to_string()).is_fatal());
    }

    #[test]
    fn test_error_path() {
        let error = Error::merge("values-es/strings.xml", "boom");
        assert_eq!(
            error.path().map(|p| p.to_string_lossy().to_string()),
            Some("values-es/strings.xml".to_string())
        );
        assert!(Error::Config("x".into()).path().is_none());
    }
}
