use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the paging core.
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("book file not found: {path:?}")]
    FileNotFound { path: PathBuf },

    #[error("book file {path:?} is not readable: {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed reading {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a page number: {input:?}")]
    InvalidLineNumberInput { input: String },

    #[error("line {line} is not valid {encoding}")]
    Decode { line: usize, encoding: &'static str },

    #[error("no book loaded")]
    NoBookLoaded,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ReaderError>;

impl ReaderError {
    /// Message suitable for showing in the text pane instead of a page.
    pub fn user_message(&self) -> String {
        match self {
            ReaderError::InvalidLineNumberInput { .. } => "please enter a number".to_string(),
            other => other.to_string(),
        }
    }

    /// Builds the error for a failed open, separating a missing file from other failures.
    pub(crate) fn from_open(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ReaderError::FileNotFound { path }
        } else {
            ReaderError::FileUnreadable { path, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn open_errors_distinguish_missing_files() {
        let missing = ReaderError::from_open(
            PathBuf::from("/nope.txt"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(missing, ReaderError::FileNotFound { .. }));

        let denied = ReaderError::from_open(
            PathBuf::from("/secret.txt"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(denied, ReaderError::FileUnreadable { .. }));
    }

    #[test]
    fn invalid_input_has_friendly_message() {
        let err = ReaderError::InvalidLineNumberInput {
            input: "abc".into(),
        };
        assert_eq!(err.user_message(), "please enter a number");
        assert_eq!(err.to_string(), "not a page number: \"abc\"");
    }
}
