//! External-tool archive backend.
//!
//! Uses `unrar` for the rar family and `7za`/`7z` for the zip family, whichever is
//! found first on the search path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::info;
use tokio::process::Command;

use crate::allocator::TempDirAllocator;
use crate::archive::{ArchiveFamily, Archiver, with_archive_ext};
use crate::error::{Error, Result};

/// Archiver backed by external programs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolArchiver;

/// Resolves the first tool of `names` available on the search path.
pub fn find_tool(names: &[&str]) -> Result<PathBuf> {
    names
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| Error::ToolNotInstalled(names.iter().map(|n| n.to_string()).collect()))
}

/// Runs `tool` with `args`, optionally inside `cwd`, and turns a non-zero exit into
/// [`Error::ToolExecutionFailed`] carrying the combined output.
async fn run_tool(
    tool: &Path,
    args: Vec<OsString>,
    cwd: Option<&Path>,
    subject: &Path,
) -> Result<()> {
    let mut command = Command::new(tool);
    command.args(&args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command.output().await?;
    if output.status.success() {
        return Ok(());
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    Err(Error::ToolExecutionFailed {
        tool: tool.display().to_string(),
        path: subject.to_path_buf(),
        output: combined,
    })
}

#[async_trait]
impl Archiver for ToolArchiver {
    async fn decompress(&self, path: &Path, allocator: &TempDirAllocator) -> Result<PathBuf> {
        let family = ArchiveFamily::from_path(path)
            .ok_or_else(|| Error::UnsupportedArchiveFormat(path.to_path_buf()))?;
        let tool = find_tool(family.tool_names())?;

        // The tool runs inside the output directory, so it needs an absolute archive path.
        let archive_path = std::path::absolute(path)?;
        let content_dir = allocator.temp_dir()?;

        info!("decompressing {}...", path.display());
        run_tool(
            &tool,
            vec!["x".into(), archive_path.into_os_string()],
            Some(&content_dir),
            path,
        )
        .await?;

        Ok(content_dir)
    }

    async fn compress(&self, path: &Path, source_dir: &Path) -> Result<PathBuf> {
        let archive_path = with_archive_ext(path);
        let tool = find_tool(ArchiveFamily::Zip.tool_names())?;

        info!("compressing {}...", archive_path.display());
        run_tool(
            &tool,
            vec![
                "a".into(),
                archive_path.clone().into_os_string(),
                source_dir.join("*").into_os_string(),
            ],
            None,
            &archive_path,
        )
        .await?;

        Ok(archive_path)
    }
}
