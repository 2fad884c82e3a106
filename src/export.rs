//! Rendering a resolved [`Book`] to disk.
//!
//! Volumes are handed to a fixed number of workers through one bounded queue.
//! Each worker renders its volumes one after another; when a worker fails it
//! records the error in a shared slot and stops, while the remaining workers keep
//! draining the queue. The pipeline returns once every worker is done and reports
//! whatever error the slot holds at that point (the last one written wins).

use std::path::{Path, PathBuf};

use futures::future::join_all;
use log::{debug, error, info};
use tokio::fs;
use tokio::sync::Mutex;

use crate::allocator::TempDirAllocator;
use crate::archive::Archiver;
use crate::error::{Error, Result};
use crate::parser::{Book, Volume};
use crate::path_utils::sanitize_filename;
use crate::template::NameTemplate;

pub const DEFAULT_PAGE_TEMPLATE: &str = "page_{{Index}}{{Ext}}";
pub const DEFAULT_VOLUME_TEMPLATE: &str = "vol_{{Index}}";
pub const DEFAULT_BOOK_TEMPLATE: &str = "{{Name}}";
pub const DEFAULT_WORKERS: usize = 4;

/// How a book is laid out on disk.
///
/// ```rust
/// # use mex::export::ExportConfig;
/// let config = ExportConfig::builder()
///     .compress_book(true)
///     .volume_template("Volume {{Index}}")
///     .workers(2usize)
///     .build()
///     .expect("Invalid configuration");
/// assert!(config.compress_volumes);
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExportConfig {
    /// Pack the whole book into `<output>/<book>.cbz`.
    #[builder(default = "false")]
    pub compress_book: bool,

    /// Pack each volume into `<book>/<volume>.cbz` instead of a directory.
    #[builder(default = "true")]
    pub compress_volumes: bool,

    /// Page file name; `Index` is one-based.
    #[builder(default = "DEFAULT_PAGE_TEMPLATE.to_string()")]
    pub page_template: String,

    /// Volume directory or archive name; `Index` is the zero-based volume index.
    #[builder(default = "DEFAULT_VOLUME_TEMPLATE.to_string()")]
    pub volume_template: String,

    /// Book directory or archive name; `Name` is the input name without extension.
    #[builder(default = "DEFAULT_BOOK_TEMPLATE.to_string()")]
    pub book_template: String,

    /// Number of volumes exported concurrently.
    #[builder(default = "DEFAULT_WORKERS")]
    pub workers: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compress_book: false,
            compress_volumes: true,
            page_template: DEFAULT_PAGE_TEMPLATE.to_string(),
            volume_template: DEFAULT_VOLUME_TEMPLATE.to_string(),
            book_template: DEFAULT_BOOK_TEMPLATE.to_string(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ExportConfig {
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::default()
    }
}

impl ExportConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(0) = self.workers {
            return Err("workers must be at least 1".to_string());
        }

        for template in [
            &self.page_template,
            &self.volume_template,
            &self.book_template,
        ]
        .into_iter()
        .flatten()
        {
            NameTemplate::parse(template).map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}

struct Templates {
    page: NameTemplate,
    volume: NameTemplate,
    book: NameTemplate,
}

impl Templates {
    fn parse(config: &ExportConfig) -> Result<Self> {
        Ok(Self {
            page: NameTemplate::parse(&config.page_template)?,
            volume: NameTemplate::parse(&config.volume_template)?,
            book: NameTemplate::parse(&config.book_template)?,
        })
    }
}

/// Everything a worker needs besides the volume itself.
struct VolumeJob<'a> {
    book_dir: &'a Path,
    volume_count: usize,
    compress: bool,
    templates: &'a Templates,
    allocator: &'a TempDirAllocator,
    archiver: &'a dyn Archiver,
}

impl VolumeJob<'_> {
    async fn export(&self, volume: &Volume<'_>) -> Result<()> {
        let name = self.templates.volume.render(
            Path::new(&volume.name()),
            volume.index,
            self.volume_count.saturating_sub(1),
        );

        let target_dir = if self.compress {
            self.allocator.temp_dir()?
        } else {
            let dir = self.book_dir.join(&name);
            fs::create_dir_all(&dir).await?;
            dir
        };

        // Pages are numbered from 1, so the count is the highest index rendered.
        let page_count = volume.pages.len();
        for page in &volume.pages {
            let page_name =
                self.templates
                    .page
                    .render(Path::new(&page.node.name), page.index + 1, page_count);
            fs::copy(&page.node.path, target_dir.join(page_name)).await?;
        }

        if self.compress {
            self.archiver
                .compress(&self.book_dir.join(&name), &target_dir)
                .await?;
        }

        debug!("exported volume {} as {}", volume.index, name);
        Ok(())
    }
}

/// Renders `book` under `output_dir` and returns the path of the produced book
/// directory or archive.
///
/// With `compress_book` the volumes are staged in a temporary directory and
/// packed into `<output_dir>/<book>.cbz`; otherwise they land in
/// `<output_dir>/<book>/`.
pub async fn export_book(
    book: &Book<'_>,
    config: &ExportConfig,
    output_dir: &Path,
    allocator: &TempDirAllocator,
    archiver: &dyn Archiver,
) -> Result<PathBuf> {
    if config.workers == 0 {
        return Err(Error::Other("workers must be at least 1".to_string()));
    }
    if book.volumes.is_empty() {
        return Err(Error::NoVolumesFound(book.node.path.clone()));
    }

    let templates = Templates::parse(config)?;
    let book_name = sanitize_filename(&templates.book.render(Path::new(&book.name()), 0, 0));

    fs::create_dir_all(output_dir).await?;
    let book_dir = if config.compress_book {
        allocator.temp_dir()?
    } else {
        let dir = output_dir.join(&book_name);
        fs::create_dir_all(&dir).await?;
        dir
    };

    info!(
        "exporting {} volumes of '{}' with {} workers",
        book.volumes.len(),
        book_name,
        config.workers
    );

    let job = VolumeJob {
        book_dir: &book_dir,
        volume_count: book.volume_count,
        compress: config.compress_volumes,
        templates: &templates,
        allocator,
        archiver,
    };
    let failure: Mutex<Option<Error>> = Mutex::new(None);
    let (sender, receiver) = async_channel::bounded::<&Volume<'_>>(config.workers);

    let workers: Vec<_> = (0..config.workers)
        .map(|worker| {
            let receiver = receiver.clone();
            let job = &job;
            let failure = &failure;
            async move {
                while let Ok(volume) = receiver.recv().await {
                    if let Err(e) = job.export(volume).await {
                        error!("worker {} failed on volume {}: {}", worker, volume.index, e);
                        *failure.lock().await = Some(e);
                        break;
                    }
                }
            }
        })
        .collect();
    // Only workers may hold receivers, so the queue closes once they all stop.
    drop(receiver);

    let producer = async move {
        for volume in book.volumes.values() {
            if sender.send(volume).await.is_err() {
                break;
            }
        }
    };

    futures::join!(producer, join_all(workers));

    if let Some(e) = failure.into_inner() {
        return Err(e);
    }

    if config.compress_book {
        return archiver
            .compress(&output_dir.join(&book_name), &book_dir)
            .await;
    }

    Ok(book_dir)
}
