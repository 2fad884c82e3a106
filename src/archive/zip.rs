//! In-process archive backend for the zip family.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use ::zip::write::SimpleFileOptions;
use ::zip::{CompressionMethod, ZipArchive, ZipWriter};
use async_trait::async_trait;
use log::{debug, info};
use memmap2::MmapOptions;
use tokio::task::spawn_blocking;

use crate::allocator::TempDirAllocator;
use crate::archive::{Archiver, with_archive_ext};
use crate::error::{Error, Result};
use crate::path_utils::lower_ext;

/// In-process archiver for `.zip` and `.cbz` files.
///
/// Mirrors the external zip-family tool: extraction recreates the archive's
/// directory structure, compression stores every entry of the source directory
/// (recursively) relative to that directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeZip;

#[async_trait]
impl Archiver for NativeZip {
    async fn decompress(&self, path: &Path, allocator: &TempDirAllocator) -> Result<PathBuf> {
        match lower_ext(path).as_str() {
            ".zip" | ".cbz" => {}
            _ => return Err(Error::UnsupportedArchiveFormat(path.to_path_buf())),
        }

        let content_dir = allocator.temp_dir()?;
        info!("decompressing {}...", path.display());

        let archive_path = path.to_path_buf();
        let target = content_dir.clone();
        spawn_blocking(move || -> Result<()> {
            let file = File::open(&archive_path)?;
            let mut archive = ZipArchive::new(file)?;
            archive.extract(&target)?;
            Ok(())
        })
        .await??;

        Ok(content_dir)
    }

    async fn compress(&self, path: &Path, source_dir: &Path) -> Result<PathBuf> {
        let archive_path = with_archive_ext(path);
        info!("compressing {}...", archive_path.display());

        let output = archive_path.clone();
        let source = source_dir.to_path_buf();
        spawn_blocking(move || write_archive(&output, &source)).await??;

        Ok(archive_path)
    }
}

/// A file or directory to store, with its name inside the archive.
struct Entry {
    path: PathBuf,
    name: String,
    is_dir: bool,
}

fn collect_entries(dir: &Path, prefix: &str, entries: &mut Vec<Entry>) -> Result<()> {
    let mut children = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    children.sort_by_key(|child| child.file_name());

    for child in children {
        let name = format!("{}{}", prefix, child.file_name().to_string_lossy());
        let is_dir = child.file_type()?.is_dir();
        entries.push(Entry {
            path: child.path(),
            name: name.clone(),
            is_dir,
        });
        if is_dir {
            collect_entries(&child.path(), &format!("{}/", name), entries)?;
        }
    }

    Ok(())
}

fn write_archive(archive_path: &Path, source_dir: &Path) -> Result<()> {
    let mut entries = Vec::new();
    collect_entries(source_dir, "", &mut entries)?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);

    let mut zip = ZipWriter::new(File::create(archive_path)?);
    for entry in entries {
        if entry.is_dir {
            zip.add_directory(format!("{}/", entry.name), options)?;
            continue;
        }

        debug!("storing {} in {}", entry.name, archive_path.display());
        zip.start_file(entry.name, options)?;

        let file = File::open(&entry.path)?;
        // Zero-length files cannot be mapped.
        if file.metadata()?.len() > 0 {
            let mmap = unsafe { MmapOptions::new().map(&file)? };
            zip.write_all(&mmap[..])?;
        }
    }
    zip.finish()?;

    Ok(())
}
