use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::resize::{self, ResizeOutcome};
use crate::xmp::{self, EmbedOutcome};

/// Extensions the embedders handle.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// What happened to one file in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FileStatus {
    /// The file was written (or would have been, in a dry run).
    Processed,
    /// Nothing to do, with the reason.
    Skipped(String),
    /// The operation failed, with the error.
    Failed(String),
    /// Extraction found no packet.
    NoMetadata,
}

/// Per-file entry in a [`BatchSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
    /// Set when a WebP packet went to a `.xmp` sidecar instead of the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar_path: Option<PathBuf>,
}

/// Counts and per-file results for one batch run.
///
/// # Example
///
/// ```rust,no_run
/// use booru_xmp::config::Config;
/// use booru_xmp::pipeline::{collect_images, embed_from_sidecars};
/// use std::path::PathBuf;
///
/// let images = collect_images(&[PathBuf::from("./dataset/")]);
/// let summary = embed_from_sidecars(&images, &Config::default());
/// println!("{} embedded, {} failed", summary.processed, summary.failed);
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_metadata: usize,
    pub files: Vec<FileReport>,
}

impl BatchSummary {
    fn record(&mut self, report: FileReport) {
        self.total += 1;
        match report.status {
            FileStatus::Processed => self.processed += 1,
            FileStatus::Skipped(_) => self.skipped += 1,
            FileStatus::Failed(_) => self.failed += 1,
            FileStatus::NoMetadata => self.no_metadata += 1,
        }
        self.files.push(report);
    }

    fn push(&mut self, path: &Path, status: FileStatus) {
        self.record(FileReport {
            path: path.to_path_buf(),
            status,
            sidecar_path: None,
        });
    }
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks). The result is sorted with duplicates
/// removed, so a file named twice is processed once.
///
/// # Example
///
/// ```rust,no_run
/// use booru_xmp::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[
///     PathBuf::from("123.jpg"),      // single file
///     PathBuf::from("./dataset/"),   // entire directory
/// ]);
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images.sort();
    images.dedup();
    images
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Create a backup of the original file.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path).context("Failed to create backup")?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}

/// Path of the tag file that sits next to `image`, e.g. `123.jpg` → `123.txt`.
pub fn text_file_for(image: &Path, extension: &str) -> PathBuf {
    image.with_extension(extension)
}

fn has_packet(path: &Path) -> bool {
    matches!(xmp::read_packet(path), Ok(Some(_)))
}

/// Embed `text` into one image, honouring overwrite, dry-run and backup.
fn embed_one(path: &Path, text: &str, config: &Config) -> FileReport {
    let report = |status, sidecar_path| FileReport {
        path: path.to_path_buf(),
        status,
        sidecar_path,
    };

    if !config.embed.overwrite_existing && has_packet(path) {
        log::info!("  Skipping {} (already has XMP)", path.display());
        return report(FileStatus::Skipped("already has XMP".into()), None);
    }

    if config.output.dry_run {
        log::info!("  [dry run] Would embed into {}", path.display());
        return report(FileStatus::Processed, None);
    }

    if config.output.backup_originals {
        if let Err(e) = backup_file(path) {
            log::warn!("Failed to backup {}: {e}", path.display());
        }
    }

    match xmp::embed_path(path, text) {
        Ok(EmbedOutcome::Embedded) => {
            log::info!("  Embedded {}", path.display());
            report(FileStatus::Processed, None)
        }
        Ok(EmbedOutcome::Sidecar(sidecar)) => {
            log::info!("  Wrote sidecar {}", sidecar.display());
            report(FileStatus::Processed, Some(sidecar))
        }
        Err(e) => {
            log::error!("XMP embed failed for {}: {e}", path.display());
            report(FileStatus::Failed(e.to_string()), None)
        }
    }
}

/// Embed each image's tag file (`<stem>.<text_extension>`) into the image.
///
/// Images without a tag file, or whose tag file is blank, are skipped.
pub fn embed_from_sidecars(images: &[PathBuf], config: &Config) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for (i, path) in images.iter().enumerate() {
        log::info!("[{}/{}] {}", i + 1, images.len(), path.display());

        let text_path = text_file_for(path, &config.embed.text_extension);
        let text = match std::fs::read_to_string(&text_path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("  No tag file at {}", text_path.display());
                summary.push(path, FileStatus::Skipped("no tag file".into()));
                continue;
            }
            Err(e) => {
                log::error!("Failed to read {}: {e}", text_path.display());
                summary.push(path, FileStatus::Failed(format!("Failed to read tag file: {e}")));
                continue;
            }
        };

        let text = text.trim();
        if text.is_empty() {
            summary.push(path, FileStatus::Skipped("empty tag file".into()));
            continue;
        }

        summary.record(embed_one(path, text, config));
    }

    summary
}

/// Embed the same `text` into every image.
pub fn embed_text(images: &[PathBuf], text: &str, config: &Config) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for (i, path) in images.iter().enumerate() {
        log::info!("[{}/{}] {}", i + 1, images.len(), path.display());
        summary.record(embed_one(path, text, config));
    }

    summary
}

/// Write each image's embedded text to `<stem>.<text_extension>`.
///
/// Existing tag files are left alone unless `overwrite` is set.
pub fn extract_to_sidecars(images: &[PathBuf], overwrite: bool, config: &Config) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for path in images {
        let out = text_file_for(path, &config.embed.text_extension);
        if out.exists() && !overwrite {
            summary.push(path, FileStatus::Skipped(format!("{} exists", out.display())));
            continue;
        }

        let text = match xmp::read_text(path) {
            Ok(Some(text)) => text,
            Ok(None) => {
                log::debug!("  No XMP text in {}", path.display());
                summary.push(path, FileStatus::NoMetadata);
                continue;
            }
            Err(e) => {
                log::error!("Failed to read XMP from {}: {e}", path.display());
                summary.push(path, FileStatus::Failed(e.to_string()));
                continue;
            }
        };

        if config.output.dry_run {
            log::info!("  [dry run] Would write {}", out.display());
            summary.push(path, FileStatus::Processed);
            continue;
        }

        match std::fs::write(&out, text) {
            Ok(()) => {
                log::info!("  Wrote {}", out.display());
                summary.push(path, FileStatus::Processed);
            }
            Err(e) => {
                log::error!("Failed to write {}: {e}", out.display());
                summary.push(path, FileStatus::Failed(e.to_string()));
            }
        }
    }

    summary
}

/// Resize every image to its closest configured resolution.
///
/// Re-encoding drops embedded XMP, so run this before embedding.
pub fn resize_all(images: &[PathBuf], config: &Config) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for (i, path) in images.iter().enumerate() {
        log::info!("[{}/{}] Resizing {}", i + 1, images.len(), path.display());

        if config.output.dry_run {
            log::info!("  [dry run] Would resize {}", path.display());
            summary.push(path, FileStatus::Processed);
            continue;
        }

        if config.output.backup_originals {
            if let Err(e) = backup_file(path) {
                log::warn!("Failed to backup {}: {e}", path.display());
            }
        }

        match resize::resize_to_bucket(path, &config.resize) {
            Ok(ResizeOutcome::Unchanged((w, h))) => {
                summary.push(path, FileStatus::Skipped(format!("already {w}x{h}")));
            }
            Ok(ResizeOutcome::Resized { from, to }) => {
                log::info!("  {}x{} -> {}x{}", from.0, from.1, to.0, to.1);
                summary.push(path, FileStatus::Processed);
            }
            Err(e) => {
                log::error!("Resize failed for {}: {e:#}", path.display());
                summary.push(path, FileStatus::Failed(format!("{e:#}")));
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TINY_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

    // ── is_supported_image ───────────────────────────────────────────

    #[test]
    fn supported_image_extensions() {
        assert!(is_supported_image(Path::new("a.jpg")));
        assert!(is_supported_image(Path::new("a.JPEG")));
        assert!(is_supported_image(Path::new("a.png")));
        assert!(is_supported_image(Path::new("a.WebP")));
    }

    #[test]
    fn unsupported_image_extensions() {
        assert!(!is_supported_image(Path::new("a.gif")));
        assert!(!is_supported_image(Path::new("a.txt")));
        assert!(!is_supported_image(Path::new("a.xmp")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    // ── collect_images ───────────────────────────────────────────────

    #[test]
    fn collect_images_single_file() {
        let dir = TempDir::new().unwrap();
        let jpg = dir.path().join("test.jpg");
        fs::write(&jpg, b"fake").unwrap();

        let images = collect_images(&[jpg.clone()]);
        assert_eq!(images, vec![jpg]);
    }

    #[test]
    fn collect_images_skips_unsupported() {
        let dir = TempDir::new().unwrap();
        let txt = dir.path().join("readme.txt");
        fs::write(&txt, b"hello").unwrap();

        assert!(collect_images(&[txt]).is_empty());
    }

    #[test]
    fn collect_images_directory_recursive_sorted() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        fs::write(dir.path().join("b.jpg"), b"fake").unwrap();
        fs::write(sub.join("a.png"), b"fake").unwrap();
        fs::write(sub.join("c.txt"), b"fake").unwrap();
        fs::write(dir.path().join("a.webp"), b"fake").unwrap();

        let images = collect_images(&[dir.path().to_path_buf()]);
        let mut expected = images.clone();
        expected.sort();
        assert_eq!(images.len(), 3);
        assert_eq!(images, expected);
    }

    #[test]
    fn collect_images_deduplicates() {
        let dir = TempDir::new().unwrap();
        let jpg = dir.path().join("x.jpg");
        fs::write(&jpg, b"fake").unwrap();

        let images = collect_images(&[jpg.clone(), dir.path().to_path_buf(), jpg]);
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn collect_images_nonexistent_path() {
        assert!(collect_images(&[PathBuf::from("/nonexistent/path")]).is_empty());
    }

    // ── backup_file ──────────────────────────────────────────────────

    #[test]
    fn backup_keeps_first_copy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, b"v1").unwrap();

        let backup = backup_file(&path).unwrap();
        assert_eq!(backup, dir.path().join("a.jpg.bak"));

        fs::write(&path, b"v2").unwrap();
        backup_file(&path).unwrap();
        assert_eq!(fs::read(&backup).unwrap(), b"v1");
    }

    // ── embed_from_sidecars ──────────────────────────────────────────

    #[test]
    fn embed_from_sidecars_counts() {
        let dir = TempDir::new().unwrap();
        let with_tags = dir.path().join("1.jpg");
        let blank = dir.path().join("2.jpg");
        let missing = dir.path().join("3.jpg");
        let broken = dir.path().join("4.jpg");
        for p in [&with_tags, &blank, &missing] {
            fs::write(p, TINY_JPEG).unwrap();
        }
        fs::write(&broken, b"nope").unwrap();
        fs::write(dir.path().join("1.txt"), "1girl, solo\n").unwrap();
        fs::write(dir.path().join("2.txt"), "  \n").unwrap();
        fs::write(dir.path().join("4.txt"), "tag").unwrap();

        let images = collect_images(&[dir.path().to_path_buf()]);
        let summary = embed_from_sidecars(&images, &Config::default());

        assert_eq!(summary.total, 4);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(xmp::read_text(&with_tags).unwrap().as_deref(), Some("1girl, solo"));
        assert_eq!(fs::read(&broken).unwrap(), b"nope");
    }

    #[test]
    fn existing_packet_skipped_unless_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, TINY_JPEG).unwrap();
        fs::write(dir.path().join("a.txt"), "new").unwrap();
        xmp::embed_path(&path, "old").unwrap();

        let mut config = Config::default();
        let summary = embed_from_sidecars(&[path.clone()], &config);
        assert_eq!(summary.skipped, 1);
        assert_eq!(xmp::read_text(&path).unwrap().as_deref(), Some("old"));

        config.embed.overwrite_existing = true;
        let summary = embed_from_sidecars(&[path.clone()], &config);
        assert_eq!(summary.processed, 1);
        assert_eq!(xmp::read_text(&path).unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn dry_run_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, TINY_JPEG).unwrap();

        let mut config = Config::default();
        config.output.dry_run = true;
        let summary = embed_text(&[path.clone()], "tags", &config);

        assert_eq!(summary.processed, 1);
        assert_eq!(fs::read(&path).unwrap(), TINY_JPEG);
    }

    #[test]
    fn backup_written_before_embed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, TINY_JPEG).unwrap();

        let mut config = Config::default();
        config.output.backup_originals = true;
        embed_text(&[path.clone()], "tags", &config);

        assert_eq!(fs::read(dir.path().join("a.jpg.bak")).unwrap(), TINY_JPEG);
        assert_ne!(fs::read(&path).unwrap(), TINY_JPEG);
    }

    #[test]
    fn webp_fallback_reports_sidecar() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.webp");
        fs::write(&path, b"GIF89a").unwrap();

        let summary = embed_text(&[path], "tags", &Config::default());
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.files[0].sidecar_path, Some(dir.path().join("a.xmp")));
    }

    // ── extract_to_sidecars ──────────────────────────────────────────

    #[test]
    fn extract_writes_text_files() {
        let dir = TempDir::new().unwrap();
        let tagged = dir.path().join("a.jpg");
        let plain = dir.path().join("b.jpg");
        fs::write(&tagged, TINY_JPEG).unwrap();
        fs::write(&plain, TINY_JPEG).unwrap();
        xmp::embed_path(&tagged, "blue_hair, smile").unwrap();

        let summary = extract_to_sidecars(&[tagged, plain], false, &Config::default());
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.no_metadata, 1);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "blue_hair, smile");
        assert!(!dir.path().join("b.txt").exists());
    }

    #[test]
    fn extract_respects_existing_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, TINY_JPEG).unwrap();
        xmp::embed_path(&path, "embedded").unwrap();
        fs::write(dir.path().join("a.txt"), "hand edited").unwrap();

        let summary = extract_to_sidecars(&[path.clone()], false, &Config::default());
        assert_eq!(summary.skipped, 1);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hand edited");

        extract_to_sidecars(&[path], true, &Config::default());
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "embedded");
    }

    // ── resize_all ───────────────────────────────────────────────────

    #[test]
    fn resize_all_mixed_results() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("a.png");
        let exact = dir.path().join("b.png");
        let bad = dir.path().join("c.png");
        image::RgbImage::new(10, 20).save(&good).unwrap();
        image::RgbImage::new(20, 20).save(&exact).unwrap();
        fs::write(&bad, b"junk").unwrap();

        let mut config = Config::default();
        config.resize.resolutions = vec![(20, 20), (20, 40)];
        let summary = resize_all(&[good.clone(), exact, bad], &config);

        assert_eq!((summary.processed, summary.skipped, summary.failed), (1, 1, 1));
        let img = image::open(&good).unwrap();
        assert_eq!((img.width(), img.height()), (20, 40));
    }

    // ── BatchSummary ─────────────────────────────────────────────────

    #[test]
    fn summary_serializes_status() {
        let mut summary = BatchSummary::default();
        summary.push(Path::new("a.jpg"), FileStatus::Failed("boom".into()));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["failed"], 1);
        assert_eq!(json["files"][0]["status"], "failed");
        assert_eq!(json["files"][0]["detail"], "boom");
        assert!(json["files"][0].get("sidecar_path").is_none());
    }
}
