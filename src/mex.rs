//! Run configuration and the end-to-end processing entry point.

use std::path::PathBuf;

use log::info;

use crate::allocator::TempDirAllocator;
use crate::archive::ArchiveBackend;
use crate::error::{Error, Result};
use crate::export::{ExportConfig, export_book};
use crate::parser::{DEFAULT_VOLUME_PATTERNS, VolumeParser};
use crate::walker::walk;

/// A complete normalization run, built declaratively using the builder pattern.
///
/// The run walks `source_path` (expanding archives on the way), resolves the
/// volumes it finds into a book and exports that book under `target_path`.
///
/// ```rust,no_run
/// # use mex::prelude::*;
/// # #[tokio::main]
/// # async fn main() -> mex::error::Result<()> {
/// let config = MexConfig::builder()
///     .source_path("./downloads/Some Series.cbz")
///     .target_path("./library")
///     .export(ExportConfig::builder().compress_book(true).build()?)
///     .build()?;
///
/// let output = config.process().await?;
/// println!("wrote {}", output.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MexConfig {
    /// Directory or archive holding the book.
    pub source_path: PathBuf,

    /// Directory receiving the output. Defaults to the current directory.
    #[builder(default)]
    pub target_path: Option<PathBuf>,

    /// Output layout and naming.
    #[builder(default)]
    pub export: ExportConfig,

    /// Ordered volume index patterns, one capture group each.
    #[builder(default = "DEFAULT_VOLUME_PATTERNS.clone()")]
    pub volume_patterns: Vec<String>,

    /// Which archiver expands inputs and packs outputs.
    #[builder(default)]
    pub archive_backend: ArchiveBackend,
}

impl MexConfig {
    pub fn builder() -> MexConfigBuilder {
        MexConfigBuilder::default()
    }

    /// Checks the paths before any work is done.
    pub fn preflight_check(&self) -> Result<&Self> {
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::Other("Source path is required".to_string()));
        }
        if !self.source_path.exists() {
            return Err(Error::InvalidPath(
                self.source_path.clone(),
                "Source path does not exist.".to_string(),
            ));
        }
        if let Some(target) = &self.target_path {
            if target.exists() && !target.is_dir() {
                return Err(Error::InvalidPath(
                    target.clone(),
                    "Target path is not a directory.".to_string(),
                ));
            }
        }
        Ok(self)
    }

    /// Runs the whole pipeline and returns the path of the exported book.
    ///
    /// Every temporary directory created along the way is removed before this
    /// returns, whether the run succeeded or not.
    pub async fn process(&self) -> Result<PathBuf> {
        self.preflight_check()?;

        let allocator = TempDirAllocator::new();
        let result = self.process_with(&allocator).await;
        allocator.cleanup();

        result
    }

    /// Runs the pipeline with a caller-owned allocator. The caller is
    /// responsible for cleaning it up.
    pub async fn process_with(&self, allocator: &TempDirAllocator) -> Result<PathBuf> {
        let target = match &self.target_path {
            Some(path) => path.clone(),
            None => std::env::current_dir()?,
        };
        let parser = VolumeParser::new(&self.volume_patterns)?;
        let archiver = self.archive_backend.archiver();

        info!("scanning {}", self.source_path.display());
        let root = walk(&self.source_path, allocator, archiver.as_ref()).await?;
        let book = parser.parse_book(&root).await?;

        export_book(&book, &self.export, &target, allocator, archiver.as_ref()).await
    }
}

impl MexConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(patterns) = &self.volume_patterns {
            VolumeParser::new(patterns).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}
