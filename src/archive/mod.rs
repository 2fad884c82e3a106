//! Archive module provides the contract for expanding and producing archives.
//!
//! The tree walker and the export pipeline never touch archive formats directly.
//! They talk to an [`Archiver`], which either expands a recognized archive into a
//! fresh temporary directory or packs a directory into a `.cbz`. Two backends are
//! provided: [`tool::ToolArchiver`] drives external programs found on the search
//! path, [`zip::NativeZip`] handles the zip family in-process.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::allocator::TempDirAllocator;
use crate::error::Result;
use crate::path_utils::lower_ext;

pub mod tool;
pub mod zip;

/// Extension (without the dot) of every archive produced by compression.
pub const ARCHIVE_EXTENSION: &str = "cbz";

/// Groups archive extensions by the kind of tool able to expand them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFamily {
    /// `.rar`, `.cbr`
    Rar,
    /// `.zip`, `.cbz`, `.7z`
    Zip,
}

impl ArchiveFamily {
    /// Maps a file extension (case-insensitive) to its family.
    pub fn from_path(path: &Path) -> Option<Self> {
        match lower_ext(path).as_str() {
            ".rar" | ".cbr" => Some(ArchiveFamily::Rar),
            ".zip" | ".cbz" | ".7z" => Some(ArchiveFamily::Zip),
            _ => None,
        }
    }

    /// External tools able to handle this family, in order of preference.
    pub fn tool_names(self) -> &'static [&'static str] {
        match self {
            ArchiveFamily::Rar => &["unrar"],
            ArchiveFamily::Zip => &["7za", "7z"],
        }
    }
}

/// Selects the [`Archiver`] implementation used for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArchiveBackend {
    /// External `unrar` / `7za` / `7z` processes.
    #[default]
    Tools,
    /// In-process zip codec; `.rar`, `.cbr` and `.7z` are left unexpanded.
    NativeZip,
}

impl ArchiveBackend {
    pub fn archiver(self) -> Box<dyn Archiver> {
        match self {
            ArchiveBackend::Tools => Box::new(tool::ToolArchiver),
            ArchiveBackend::NativeZip => Box::new(zip::NativeZip),
        }
    }
}

/// Common interface for archive backends.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Expands the archive at `path` into a directory obtained from `allocator`
    /// and returns that directory.
    ///
    /// # Errors
    /// * [`Error::UnsupportedArchiveFormat`](crate::error::Error::UnsupportedArchiveFormat) -
    ///   the extension is not handled; callers treat the file as a plain file
    /// * [`Error::ToolNotInstalled`](crate::error::Error::ToolNotInstalled)
    /// * [`Error::ToolExecutionFailed`](crate::error::Error::ToolExecutionFailed)
    async fn decompress(&self, path: &Path, allocator: &TempDirAllocator) -> Result<PathBuf>;

    /// Packs every entry of `source_dir` into an archive at `path`, appending
    /// the `.cbz` extension when missing. Returns the final archive path.
    async fn compress(&self, path: &Path, source_dir: &Path) -> Result<PathBuf>;
}

/// Appends `.cbz` to `path` unless it already ends with it.
pub fn with_archive_ext(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == ARCHIVE_EXTENSION) {
        return path.to_path_buf();
    }

    // Not `set_extension`: volume names like "vol_1.5" must keep their dot.
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ARCHIVE_EXTENSION);
    PathBuf::from(name)
}
