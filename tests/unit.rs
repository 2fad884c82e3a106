//! Unit tests for the walker, the volume parser and the archive backends.
//!
//! Exercises each stage on small trees written to disk, without running an export.

use mex::error::{Error, Result};
use mex::archive::tool::find_tool;
use mex::prelude::*;
use sha2::{Digest, Sha256};

mod common;
use common::{create_zip, setup_test_dirs, write_file, write_pages};

async fn walk_tree(path: &Path, allocator: &TempDirAllocator) -> Result<Node> {
    walk(path, allocator, &NativeZip).await
}

fn content_hash(chunks: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

#[tokio::test]
async fn test_walk_keeps_unknown_files_as_leaves() -> Result<()> {
    let test_dirs = setup_test_dirs("walk_leaves").await;
    write_file(&test_dirs.source_dir.join("notes.txt"), b"hello").await?;
    write_pages(&test_dirs.source_dir.join("vol_1"), 2, 10, 1).await?;

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;

    assert!(root.is_dir);
    assert_eq!(root.name, "source");
    let notes = root.child("notes.txt").expect("leaf missing");
    assert!(!notes.is_dir);
    assert!(notes.children.is_empty());
    assert_eq!(root.child("vol_1").unwrap().children.len(), 2);
    // Nothing was expanded.
    assert!(allocator.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_walk_expands_archives_under_their_own_name() -> Result<()> {
    let test_dirs = setup_test_dirs("walk_archive").await;
    let archive = test_dirs.source_dir.join("Series v2.cbz");
    create_zip(
        &archive,
        &[("inner/001.jpg", b"page one"), ("inner/002.jpg", b"page two")],
    );

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;

    let expanded = root.child("Series v2.cbz").expect("archive node missing");
    assert!(expanded.is_dir);
    assert_ne!(expanded.path, archive);
    let inner = expanded.child("inner").expect("archive contents missing");
    assert_eq!(inner.children.len(), 2);
    assert_eq!(allocator.len(), 1);

    allocator.cleanup();
    assert!(!expanded.path.exists());
    Ok(())
}

#[tokio::test]
async fn test_walk_expands_nested_archives() -> Result<()> {
    let test_dirs = setup_test_dirs("walk_nested").await;

    let inner_zip = test_dirs.test_dir.join("vol_3.zip");
    create_zip(&inner_zip, &[("001.png", b"nested page")]);
    let inner_bytes = std::fs::read(&inner_zip)?;
    let outer = test_dirs.source_dir.join("Book.zip");
    create_zip(&outer, &[("vol_3.zip", &inner_bytes)]);

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&outer, &allocator).await?;

    assert_eq!(root.name, "Book.zip");
    let volume = root.child("vol_3.zip").expect("nested archive missing");
    assert!(volume.is_dir);
    assert_eq!(volume.children[0].name, "001.png");
    assert_eq!(allocator.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unrecognized_extension_is_unsupported() -> Result<()> {
    let test_dirs = setup_test_dirs("unsupported").await;
    let file = test_dirs.source_dir.join("readme.txt");
    write_file(&file, b"text").await?;

    let allocator = TempDirAllocator::new();
    let result = ToolArchiver.decompress(&file, &allocator).await;
    assert!(matches!(result, Err(Error::UnsupportedArchiveFormat(_))));

    let result = NativeZip.decompress(&file, &allocator).await;
    assert!(matches!(result, Err(Error::UnsupportedArchiveFormat(_))));
    assert!(allocator.is_empty());
    Ok(())
}

#[test]
fn test_missing_tool_reports_searched_names() {
    match find_tool(&["mex-no-such-tool", "mex-no-such-tool-either"]) {
        Err(Error::ToolNotInstalled(names)) => {
            assert_eq!(names, vec!["mex-no-such-tool", "mex-no-such-tool-either"]);
        }
        other => panic!("expected ToolNotInstalled, got {:?}", other),
    }
}

#[tokio::test]
async fn test_native_zip_round_trips_directory() -> Result<()> {
    let test_dirs = setup_test_dirs("native_zip").await;
    write_file(&test_dirs.source_dir.join("a.jpg"), b"aaa").await?;
    write_file(&test_dirs.source_dir.join("sub/b.jpg"), b"bbb").await?;
    write_file(&test_dirs.source_dir.join("empty.jpg"), b"").await?;

    let archive = NativeZip
        .compress(&test_dirs.target_dir.join("packed"), &test_dirs.source_dir)
        .await?;
    assert_eq!(archive, test_dirs.target_dir.join("packed.cbz"));

    let names = common::zip_entry_names(&archive);
    assert_eq!(names, vec!["a.jpg", "empty.jpg", "sub/", "sub/b.jpg"]);
    assert_eq!(common::read_zip_entry(&archive, "sub/b.jpg"), b"bbb");
    Ok(())
}

#[tokio::test]
async fn test_allocator_cleanup_removes_directories() -> Result<()> {
    let allocator = TempDirAllocator::new();
    let first = allocator.temp_dir()?;
    let second = allocator.temp_dir()?;
    assert_ne!(first, second);
    assert!(first.is_dir() && second.is_dir());
    assert!(
        first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("mex_")
    );

    allocator.cleanup();
    assert!(allocator.is_empty());
    assert!(!first.exists());
    assert!(!second.exists());
    Ok(())
}

#[tokio::test]
async fn test_allocator_drop_removes_directories() -> Result<()> {
    let path = {
        let allocator = TempDirAllocator::new();
        allocator.temp_dir()?
    };
    assert!(!path.exists());
    Ok(())
}

#[test]
fn test_volume_index_patterns() -> Result<()> {
    let parser = VolumeParser::with_default_patterns()?;

    assert_eq!(parser.parse_volume_index("vol_01"), Some(1));
    assert_eq!(parser.parse_volume_index("Volume 12"), Some(12));
    assert_eq!(parser.parse_volume_index("Series v03 (Digital)"), Some(3));
    assert_eq!(parser.parse_volume_index("Vol. 4"), Some(4));
    assert_eq!(parser.parse_volume_index("Chapter 7"), Some(7));
    assert_eq!(parser.parse_volume_index("05"), Some(5));
    assert_eq!(parser.parse_volume_index("Extras"), None);

    let custom = VolumeParser::new([r"^Part-(\d+)$", r"(\d+)"])?;
    assert_eq!(custom.parse_volume_index("Part-9"), Some(9));
    assert_eq!(custom.parse_volume_index("Side 2"), Some(2));
    Ok(())
}

#[test]
fn test_out_of_range_index_falls_through() -> Result<()> {
    let parser = VolumeParser::with_default_patterns()?;

    assert_eq!(parser.parse_volume_index("vol_2147483647"), Some(2147483647));
    assert_eq!(parser.parse_volume_index("vol_2147483648"), None);
    assert_eq!(parser.parse_volume_index("vol_18446744073709551615"), None);

    let custom = VolumeParser::new([r"^v(\d+)", r"#(\d+)"])?;
    assert_eq!(custom.parse_volume_index("v99999999999 #4"), Some(4));
    Ok(())
}

#[tokio::test]
async fn test_huge_index_becomes_orphan() -> Result<()> {
    let test_dirs = setup_test_dirs("huge_index").await;
    write_pages(&test_dirs.source_dir.join("vol_1"), 1, 4, 1).await?;
    write_pages(
        &test_dirs.source_dir.join("vol_18446744073709551615"),
        1,
        4,
        2,
    )
    .await?;

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;
    let book = VolumeParser::with_default_patterns()?.parse_book(&root).await?;

    assert_eq!(book.volume_count, 3);
    assert_eq!(book.volumes[&1].node.name, "vol_1");
    assert_eq!(book.volumes[&2].node.name, "vol_18446744073709551615");
    Ok(())
}

#[test]
fn test_volume_patterns_need_one_capture_group() {
    assert!(matches!(
        VolumeParser::new([r"vol\d+"]),
        Err(Error::InvalidPattern(_))
    ));
    assert!(matches!(
        VolumeParser::new([r"(v)(\d+)"]),
        Err(Error::InvalidPattern(_))
    ));
    assert!(matches!(VolumeParser::new([r"(\d+"]), Err(Error::Regex(_))));
}

#[tokio::test]
async fn test_pages_sorted_by_name() -> Result<()> {
    let test_dirs = setup_test_dirs("page_order").await;
    let dir = test_dirs.source_dir.join("vol_1");
    for name in ["c.png", "a.jpg", "B.webp", "b.gif", "ComicInfo.xml"] {
        write_file(&dir.join(name), name.as_bytes()).await?;
    }

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;
    let book = VolumeParser::with_default_patterns()?.parse_book(&root).await?;

    let volume = &book.volumes[&1];
    let names: Vec<&str> = volume.pages.iter().map(|p| p.node.name.as_str()).collect();
    assert_eq!(names, vec!["B.webp", "a.jpg", "b.gif", "c.png"]);
    let indices: Vec<usize> = volume.pages.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_hash_breaks_ties_between_equal_volumes() -> Result<()> {
    let test_dirs = setup_test_dirs("hash_tie").await;
    let first = test_dirs.source_dir.join("a").join("vol_1");
    let second = test_dirs.source_dir.join("b").join("vol_1");
    write_file(&first.join("001.jpg"), &[1u8; 100]).await?;
    write_file(&first.join("002.jpg"), &[2u8; 100]).await?;
    write_file(&second.join("001.jpg"), &[3u8; 100]).await?;
    write_file(&second.join("002.jpg"), &[4u8; 100]).await?;

    let first_hash = content_hash(&[&[1u8; 100], &[2u8; 100]]);
    let second_hash = content_hash(&[&[3u8; 100], &[4u8; 100]]);
    let (winner, loser) = if first_hash > second_hash {
        (&first, &second)
    } else {
        (&second, &first)
    };

    let parser = VolumeParser::with_default_patterns()?;
    let allocator = TempDirAllocator::new();

    // Repeated runs may list directories in any order; the outcome must not change.
    for _ in 0..3 {
        let root = walk_tree(&test_dirs.source_dir, &allocator).await?;
        let book = parser.parse_book(&root).await?;

        assert_eq!(book.volumes.len(), 2);
        assert_eq!(&book.volumes[&1].node.path, winner);
        assert_eq!(&book.volumes[&2].node.path, loser);
        assert_eq!(book.volume_count, 3);
        assert!(book.orphans().is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_identical_volumes_collapse() -> Result<()> {
    let test_dirs = setup_test_dirs("duplicates").await;
    write_pages(&test_dirs.source_dir.join("a").join("vol_2"), 3, 50, 7).await?;
    write_pages(&test_dirs.source_dir.join("b").join("Volume 2"), 3, 50, 7).await?;

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;
    let book = VolumeParser::with_default_patterns()?.parse_book(&root).await?;

    assert_eq!(book.volumes.len(), 1);
    assert!(book.volumes.contains_key(&2));
    assert_eq!(book.volume_count, 3);
    assert!(book.orphans().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_identical_orphans_collapse() -> Result<()> {
    let test_dirs = setup_test_dirs("duplicate_orphans").await;
    write_pages(&test_dirs.source_dir.join("vol_0"), 1, 10, 1).await?;
    write_pages(&test_dirs.source_dir.join("a").join("Extras"), 2, 10, 9).await?;
    write_pages(&test_dirs.source_dir.join("b").join("Extras"), 2, 10, 9).await?;

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;
    let book = VolumeParser::with_default_patterns()?.parse_book(&root).await?;

    assert_eq!(book.volumes.len(), 2);
    assert_eq!(book.volumes[&1].node.name, "Extras");
    Ok(())
}

#[tokio::test]
async fn test_more_pages_always_wins() -> Result<()> {
    let test_dirs = setup_test_dirs("page_count").await;
    let longer = test_dirs.source_dir.join("a").join("vol_1");
    let heavier = test_dirs.source_dir.join("b").join("vol_1");
    write_pages(&longer, 3, 10, 0).await?;
    write_pages(&heavier, 2, 10_000, 255).await?;

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;
    let book = VolumeParser::with_default_patterns()?.parse_book(&root).await?;

    assert_eq!(book.volumes[&1].node.path, longer);
    assert_eq!(book.volumes[&1].pages.len(), 3);
    assert_eq!(book.volumes[&2].node.path, heavier);
    Ok(())
}

#[tokio::test]
async fn test_larger_average_size_wins() -> Result<()> {
    let test_dirs = setup_test_dirs("avg_size").await;
    let small = test_dirs.source_dir.join("a").join("vol_5");
    let large = test_dirs.source_dir.join("b").join("vol_5");
    write_pages(&small, 2, 100, 0).await?;
    write_pages(&large, 2, 101, 0).await?;

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;
    let book = VolumeParser::with_default_patterns()?.parse_book(&root).await?;

    assert_eq!(book.volumes[&5].node.path, large);
    assert_eq!(book.volumes[&5].avg_size(), 101);
    assert_eq!(book.volumes[&6].node.path, small);
    assert_eq!(book.volume_count, 7);
    Ok(())
}

#[tokio::test]
async fn test_orphans_numbered_after_highest_index_by_name() -> Result<()> {
    let test_dirs = setup_test_dirs("orphans").await;
    write_pages(&test_dirs.source_dir.join("vol_0"), 1, 10, 1).await?;
    write_pages(&test_dirs.source_dir.join("vol_1"), 1, 10, 2).await?;
    write_pages(&test_dirs.source_dir.join("gamma"), 1, 10, 3).await?;
    write_pages(&test_dirs.source_dir.join("alpha"), 1, 10, 4).await?;
    write_pages(&test_dirs.source_dir.join("beta"), 1, 10, 5).await?;

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;
    let book = VolumeParser::with_default_patterns()?.parse_book(&root).await?;

    let order: Vec<(usize, &str)> = book
        .sorted_volumes()
        .into_iter()
        .map(|v| (v.index, v.node.name.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (0, "vol_0"),
            (1, "vol_1"),
            (2, "alpha"),
            (3, "beta"),
            (4, "gamma")
        ]
    );
    assert_eq!(book.volume_count, 5);
    Ok(())
}

#[tokio::test]
async fn test_images_at_root_form_a_volume() -> Result<()> {
    let test_dirs = setup_test_dirs("root_volume").await;
    write_pages(&test_dirs.source_dir, 2, 10, 1).await?;

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;
    let book = VolumeParser::with_default_patterns()?.parse_book(&root).await?;

    // "source" carries no number, so the volume is adopted as an orphan.
    assert_eq!(book.volumes.len(), 1);
    assert_eq!(book.volumes[&0].pages.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_no_images_means_no_volumes() -> Result<()> {
    let test_dirs = setup_test_dirs("no_volumes").await;
    write_file(&test_dirs.source_dir.join("vol_1").join("notes.txt"), b"x").await?;
    write_file(&test_dirs.source_dir.join("cover.pdf"), b"x").await?;

    let allocator = TempDirAllocator::new();
    let root = walk_tree(&test_dirs.source_dir, &allocator).await?;
    let result = VolumeParser::with_default_patterns()?.parse_book(&root).await;

    assert!(matches!(result, Err(Error::NoVolumesFound(_))));
    Ok(())
}
