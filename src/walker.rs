//! Filesystem tree walking with transparent archive expansion.
//!
//! [`walk`] mirrors a directory hierarchy into an owned [`Node`] tree. Any file an
//! [`Archiver`] recognizes is expanded into a temporary directory and replaced by
//! the tree of that directory, renamed after the archive file, so a `Series.cbz`
//! looks exactly like a directory called `Series.cbz` to later stages.

use std::path::{Path, PathBuf};

use futures::FutureExt;
use futures::future::BoxFuture;
use log::debug;
use tokio::fs;

use crate::allocator::TempDirAllocator;
use crate::archive::Archiver;
use crate::error::Result;
use crate::path_utils::get_file_name_lossy;

/// A directory or file in the walked tree.
///
/// Directories own their children in the order the filesystem listed them; that
/// order is not guaranteed to be sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub children: Vec<Node>,
}

impl Node {
    /// Returns the direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }
}

fn node_name(path: &Path) -> String {
    match path.file_name() {
        Some(_) => get_file_name_lossy(path),
        // "." or "..": name the node after the directory it resolves to
        None => std::path::absolute(path)
            .ok()
            .and_then(|abs| abs.canonicalize().ok())
            .map(|abs| get_file_name_lossy(&abs))
            .unwrap_or_else(|| get_file_name_lossy(path)),
    }
}

/// Builds the node tree rooted at `path`.
///
/// Archives are expanded through `archiver` into directories obtained from
/// `allocator`; the returned tree references those directories, so the allocator
/// must not be cleaned up while the tree is in use. A file the archiver does not
/// recognize becomes an ordinary leaf. Any other error aborts the walk.
pub fn walk<'a>(
    path: &'a Path,
    allocator: &'a TempDirAllocator,
    archiver: &'a dyn Archiver,
) -> BoxFuture<'a, Result<Node>> {
    async move {
        let metadata = fs::metadata(path).await?;
        let mut node = Node {
            name: node_name(path),
            path: path.to_path_buf(),
            is_dir: metadata.is_dir(),
            children: Vec::new(),
        };

        if node.is_dir {
            let mut entries = fs::read_dir(path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let child_path = entry.path();
                node.children.push(walk(&child_path, allocator, archiver).await?);
            }
            return Ok(node);
        }

        match archiver.decompress(path, allocator).await {
            Ok(content_dir) => {
                let mut expanded = walk(&content_dir, allocator, archiver).await?;
                debug!("expanded {} into {}", path.display(), content_dir.display());
                expanded.name = node.name;
                Ok(expanded)
            }
            Err(e) if e.is_unsupported_format() => Ok(node),
            Err(e) => Err(e),
        }
    }
    .boxed()
}
