//! Custom error types and result handling for mex operations.
//!
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//! Every variant except [`Error::UnsupportedArchiveFormat`] is fatal to the operation that
//! raised it; the tree walk treats an unsupported format as "this file is a plain leaf".
//!
use std::path::PathBuf;

/// Type alias for Results with mex errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all mex operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library (stat, read, write, mkdir)
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Regular expression parsing errors
    #[error(transparent)]
    Regex(#[from] regex::Error),
    /// ZIP file operation errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    ExportConfigBuilder(#[from] crate::export::ExportConfigBuilderError),
    #[error(transparent)]
    MexConfigBuilder(#[from] crate::mex::MexConfigBuilderError),
    /// The file extension does not map to any archive family
    #[error("Unsupported archive format: {0:?}")]
    UnsupportedArchiveFormat(PathBuf),
    /// None of the tools of the required family could be found on the search path
    #[error("Required tool not installed (tried: {})", .0.join(", "))]
    ToolNotInstalled(Vec<String>),
    /// The external archive tool ran but reported failure
    #[error("{tool} failed on {path:?}:\n{output}")]
    ToolExecutionFailed {
        tool: String,
        path: PathBuf,
        output: String,
    },
    /// The tree contained no image-bearing directory
    #[error("No volumes found in {0:?}")]
    NoVolumesFound(PathBuf),
    /// A volume index pattern without exactly one capture group
    #[error("Invalid volume pattern: {0}")]
    InvalidPattern(String),
    /// A naming template that cannot be rendered
    #[error("Invalid template: {0}")]
    Template(String),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Whether this error is the non-fatal "not an archive" signal.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Error::UnsupportedArchiveFormat(_))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
