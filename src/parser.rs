//! Volume detection and numbering conflict resolution.
//!
//! This module turns a walked [`Node`] tree into a [`Book`]: every directory that
//! directly holds page images becomes a [`Volume`], numbered by the first volume
//! pattern that matches its name. Volumes that collide on a number are ranked,
//! the loser is kept aside as an orphan and renumbered after the scan, so no
//! content is silently lost.
//!
//! Pages, volumes and the book borrow from the tree; nothing is copied.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use lazy_static::lazy_static;
use log::{debug, info, warn};
use rayon::prelude::*;
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};
use crate::path_utils::{is_image_path, strip_ext};
use crate::walker::Node;

/// Read buffer used while hashing pages.
const HASH_BUFFER_SIZE: usize = 64 * 1024;

lazy_static! {
    /// Volume index patterns shipped with the crate, tried top to bottom.
    /// Each holds exactly one capture group around the number.
    pub static ref DEFAULT_VOLUME_PATTERNS: Vec<String> = include_str!("volume_patterns.txt")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
}

/// A single image of a volume.
#[derive(Debug, Clone)]
pub struct Page<'a> {
    pub node: &'a Node,
    /// Zero-based position within the volume, in file name order.
    pub index: usize,
}

/// An ordered run of pages found in one directory.
#[derive(Debug, Clone)]
pub struct Volume<'a> {
    pub node: &'a Node,
    pub pages: Vec<Page<'a>>,
    pub index: usize,
    avg_size: u64,
    hash: [u8; 32],
}

impl<'a> Volume<'a> {
    /// Builds a volume from its directory and image leaves, sorting pages by
    /// file name and measuring their content.
    pub async fn build(node: &'a Node, mut images: Vec<&'a Node>) -> Result<Volume<'a>> {
        images.par_sort_by(|a, b| a.name.cmp(&b.name));

        let pages: Vec<Page<'a>> = images
            .into_iter()
            .enumerate()
            .map(|(index, node)| Page { node, index })
            .collect();

        let mut hasher = Sha256::new();
        let mut total_size: u64 = 0;
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

        for page in &pages {
            let mut file = fs::File::open(&page.node.path).await?;
            loop {
                let read = file.read(&mut buffer).await?;
                if read == 0 {
                    break;
                }
                hasher.update(&buffer[..read]);
                total_size += read as u64;
            }
        }

        let avg_size = if pages.is_empty() {
            0
        } else {
            total_size / pages.len() as u64
        };

        Ok(Volume {
            node,
            pages,
            index: 0,
            avg_size,
            hash: hasher.finalize().into(),
        })
    }

    /// Directory name without its extension, as used for naming output.
    pub fn name(&self) -> String {
        strip_ext(Path::new(&self.node.name))
    }

    /// Average page size in bytes (integer division).
    pub fn avg_size(&self) -> u64 {
        self.avg_size
    }

    /// SHA-256 of all page bytes, concatenated in page order.
    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Ranks two volumes competing for the same index: more pages first, then
    /// larger average page size, then the larger content hash. `Equal` means
    /// the two are duplicates.
    pub fn compare(&self, other: &Volume<'_>) -> Ordering {
        self.pages
            .len()
            .cmp(&other.pages.len())
            .then(self.avg_size.cmp(&other.avg_size))
            .then(self.hash.cmp(&other.hash))
    }
}

/// The resolved set of volumes found under one root.
#[derive(Debug)]
pub struct Book<'a> {
    pub node: &'a Node,
    /// Accepted volumes keyed by their index.
    pub volumes: HashMap<usize, Volume<'a>>,
    /// Highest accepted index plus one.
    pub volume_count: usize,
    orphans: Vec<Volume<'a>>,
}

impl<'a> Book<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self {
            node,
            volumes: HashMap::new(),
            volume_count: 0,
            orphans: Vec::new(),
        }
    }

    /// Root name without its extension.
    pub fn name(&self) -> String {
        strip_ext(Path::new(&self.node.name))
    }

    /// Accepted volumes in index order.
    pub fn sorted_volumes(&self) -> Vec<&Volume<'a>> {
        let mut volumes: Vec<&Volume<'a>> = self.volumes.values().collect();
        volumes.sort_by_key(|volume| volume.index);
        volumes
    }

    /// Volumes waiting to be renumbered.
    pub fn orphans(&self) -> &[Volume<'a>] {
        &self.orphans
    }

    /// Inserts an indexed volume, resolving a collision with the current occupant
    /// of its index. The loser becomes an orphan; an exact duplicate is dropped.
    pub fn add_volume(&mut self, volume: Volume<'a>) {
        let ranking = self
            .volumes
            .get(&volume.index)
            .map(|current| current.compare(&volume));

        match ranking {
            None => {
                self.insert(volume);
            }
            Some(Ordering::Greater) => {
                warn!(
                    "volume {} in {:?} loses index to an existing volume",
                    volume.index, volume.node.path
                );
                self.add_orphan(volume);
            }
            Some(Ordering::Less) => {
                if let Some(displaced) = self.insert(volume) {
                    warn!(
                        "volume {} in {:?} displaced by a stronger candidate",
                        displaced.index, displaced.node.path
                    );
                    self.add_orphan(displaced);
                }
            }
            Some(Ordering::Equal) => {
                warn!("discarding duplicate volume {:?}", volume.node.path);
            }
        }
    }

    /// Queues a volume for renumbering unless an identical orphan is already queued.
    pub fn add_orphan(&mut self, volume: Volume<'a>) {
        if self
            .orphans
            .iter()
            .any(|orphan| orphan.compare(&volume) == Ordering::Equal)
        {
            warn!("discarding duplicate volume {:?}", volume.node.path);
            return;
        }
        self.orphans.push(volume);
    }

    /// Gives every orphan a fresh index past the current count, in directory
    /// name order.
    pub fn adopt_orphans(&mut self) {
        let mut orphans = std::mem::take(&mut self.orphans);
        orphans.sort_by(|a, b| a.node.name.cmp(&b.node.name));

        for mut orphan in orphans {
            orphan.index = self.volume_count;
            debug!("assigning index {} to {:?}", orphan.index, orphan.node.path);
            self.add_volume(orphan);
        }
    }

    fn insert(&mut self, volume: Volume<'a>) -> Option<Volume<'a>> {
        if volume.index >= self.volume_count {
            self.volume_count = volume.index + 1;
        }
        self.volumes.insert(volume.index, volume)
    }
}

/// Finds volumes in a node tree using an ordered list of index patterns.
#[derive(Debug, Clone)]
pub struct VolumeParser {
    patterns: Vec<Regex>,
}

impl VolumeParser {
    /// Compiles `patterns`; each must contain exactly one capture group.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let regex = Regex::new(pattern.as_ref())?;
                if regex.captures_len() != 2 {
                    return Err(Error::InvalidPattern(format!(
                        "'{}' must have exactly one capture group",
                        pattern.as_ref()
                    )));
                }
                Ok(regex)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Parser using [`DEFAULT_VOLUME_PATTERNS`].
    pub fn with_default_patterns() -> Result<Self> {
        Self::new(DEFAULT_VOLUME_PATTERNS.iter())
    }

    /// Extracts a volume index from a directory base name. The first pattern
    /// whose capture parses as a 32-bit signed integer wins; larger numbers
    /// count as unparseable so the index plus one never overflows.
    pub fn parse_volume_index(&self, name: &str) -> Option<usize> {
        self.patterns.iter().find_map(|pattern| {
            pattern
                .captures(name)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<i32>().ok())
                .and_then(|index| usize::try_from(index).ok())
        })
    }

    /// Scans the tree under `root` and resolves it into a book.
    ///
    /// # Errors
    /// * [`Error::NoVolumesFound`] - no directory under `root` holds an image
    /// * [`Error::Io`] - a page could not be read
    pub async fn parse_book<'a>(&self, root: &'a Node) -> Result<Book<'a>> {
        let mut candidates = Vec::new();
        collect_candidates(root, &mut candidates);

        let mut book = Book::new(root);
        for (dir, images) in candidates {
            let mut volume = Volume::build(dir, images).await?;
            match self.parse_volume_index(&dir.name) {
                Some(index) => {
                    volume.index = index;
                    book.add_volume(volume);
                }
                None => {
                    debug!("no index in {:?}, queued as orphan", dir.name);
                    book.add_orphan(volume);
                }
            }
        }

        book.adopt_orphans();

        if book.volumes.is_empty() {
            return Err(Error::NoVolumesFound(root.path.clone()));
        }

        info!(
            "found {} volumes in {}",
            book.volumes.len(),
            root.path.display()
        );
        Ok(book)
    }
}

/// Collects image-bearing directories, children before parents.
fn collect_candidates<'a>(node: &'a Node, out: &mut Vec<(&'a Node, Vec<&'a Node>)>) {
    if !node.is_dir {
        return;
    }

    let mut images = Vec::new();
    for child in &node.children {
        if child.is_dir {
            collect_candidates(child, out);
        } else if is_image_path(Path::new(&child.name)) {
            images.push(child);
        }
    }

    if !images.is_empty() {
        out.push((node, images));
    }
}
