//! mex - normalize multi-volume book archives

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use log::{error, info};

use mex::archive::ArchiveBackend;
use mex::export::{
    DEFAULT_BOOK_TEMPLATE, DEFAULT_PAGE_TEMPLATE, DEFAULT_VOLUME_TEMPLATE, DEFAULT_WORKERS,
    ExportConfig,
};
use mex::{MexConfig, error::Result};

#[derive(Parser, Debug)]
#[command(name = "mex")]
#[command(version, about = "Normalize multi-volume book archives", long_about = None)]
#[command(override_usage = "mex <input_path> [<output_dir>]")]
#[command(after_help = "Templates:
  {{Index}} - index of current volume or page
  {{Name}}  - original filename and extension
  {{Ext}}   - original extension only")]
struct Cli {
    /// Directory or archive to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Output directory (defaults to the current directory)
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Compress book as a cbz archive
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true"
    )]
    zip_book: bool,

    /// Compress volumes as cbz archives
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    zip_volume: bool,

    /// Page name template
    #[arg(long, default_value = DEFAULT_PAGE_TEMPLATE)]
    label_page: String,

    /// Volume name template
    #[arg(long, default_value = DEFAULT_VOLUME_TEMPLATE)]
    label_volume: String,

    /// Book name template
    #[arg(long, default_value = DEFAULT_BOOK_TEMPLATE)]
    label_book: String,

    /// Number of simultaneous workers
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Handle zip archives in-process instead of calling 7z
    #[arg(long)]
    native_zip: bool,
}

impl Cli {
    fn into_config(self) -> Result<MexConfig> {
        let export = ExportConfig::builder()
            .compress_book(self.zip_book)
            .compress_volumes(self.zip_volume)
            .page_template(self.label_page)
            .volume_template(self.label_volume)
            .book_template(self.label_book)
            .workers(self.workers)
            .build()?;

        let mut builder = MexConfig::builder();
        builder
            .source_path(self.input_path)
            .export(export)
            .archive_backend(if self.native_zip {
                ArchiveBackend::NativeZip
            } else {
                ArchiveBackend::Tools
            });
        if let Some(output_dir) = self.output_dir {
            builder.target_path(output_dir);
        }

        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // clap reports usage errors on stderr and exits with status 2
    let cli = Cli::parse();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match config.process().await {
        Ok(output) => {
            info!("done: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
