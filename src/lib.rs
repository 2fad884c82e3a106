//! mex - Multi-volume book normalization library
//!
//! This crate takes a book (comic, manga, any image-based series) scattered over
//! nested directories and archives, works out which directories are volumes and
//! which number each one should carry, and writes the result in a consistent,
//! template-named layout, optionally packed as CBZ archives.
//!
//! The pipeline has three stages:
//!
//! 1. [`walker::walk`] mirrors the input into a [`walker::Node`] tree, expanding
//!    archives into temporary directories owned by a [`TempDirAllocator`].
//! 2. [`parser::VolumeParser`] finds image directories, numbers them and resolves
//!    numbering conflicts into a [`parser::Book`].
//! 3. [`export::export_book`] renders the book with a pool of workers.
//!
//! [`MexConfig`] runs all three:
//!
//! ```rust,no_run
//! use mex::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> mex::error::Result<()> {
//!     let config = MexConfig::builder()
//!         .source_path("./downloads/My Series")
//!         .target_path("./library")
//!         .export(
//!             ExportConfig::builder()
//!                 .compress_volumes(true)
//!                 .volume_template("Volume {{Index}}")
//!                 .build()?,
//!         )
//!         .build()?;
//!
//!     config.process().await?;
//!     Ok(())
//! }
//! ```

pub mod allocator;
pub mod archive;
pub mod error;
pub mod export;
pub mod mex;
pub mod parser;
pub mod path_utils;
pub mod template;
pub mod walker;

pub use allocator::TempDirAllocator;
pub use mex::{MexConfig, MexConfigBuilder};

/// Prelude module for convenient imports.
///
/// Re-exports the most commonly used types so a single `use mex::prelude::*;`
/// covers typical usage.
pub mod prelude {
    pub use super::{MexConfig, MexConfigBuilder, TempDirAllocator, error};
    pub use crate::archive::{ArchiveBackend, Archiver, tool::ToolArchiver, zip::NativeZip};
    pub use crate::export::{ExportConfig, ExportConfigBuilder, export_book};
    pub use crate::parser::{Book, Page, Volume, VolumeParser};
    pub use crate::template::NameTemplate;
    pub use crate::walker::{Node, walk};
    pub use std::path::{Path, PathBuf};
}
