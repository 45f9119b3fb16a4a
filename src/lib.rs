//! # booru-xmp
//!
//! Embed image-board tag text into JPEG, PNG and WebP files as an XMP packet
//! (`dc:title` + `dc:description`), read it back, and batch-process datasets.
//!
//! ## Quick Start
//!
//! Single file, through the format dispatcher:
//!
//! ```rust,no_run
//! use booru_xmp::xmp;
//! use std::path::Path;
//!
//! let path = Path::new("123.jpg");
//! if xmp::embed_file(path, "1girl, blue_hair, solo") {
//!     println!("Embedded: {:?}", xmp::read_text(path).unwrap());
//! }
//! ```
//!
//! A whole directory, taking each image's text from `<stem>.txt`:
//!
//! ```rust,no_run
//! use booru_xmp::config::Config;
//! use booru_xmp::pipeline::{collect_images, embed_from_sidecars};
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let images = collect_images(&[PathBuf::from("./dataset")]);
//!
//!     let summary = embed_from_sidecars(&images, &config);
//!     println!("{} embedded, {} failed", summary.processed, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Write Strategy |
//! |--------|---------------|
//! | JPEG (`.jpg`, `.jpeg`) | APP1 segment right after SOI |
//! | PNG (`.png`) | Uncompressed iTXt chunk after IHDR |
//! | WebP (`.webp`) | `XMP ` RIFF chunk; `.xmp` sidecar if not a RIFF/WebP file |
//!
//! ## Modules
//!
//! - [`xmp`] — packet building, per-format embedders, dispatcher and read-back
//! - [`annotation`] — tags, rating and score, rendered to packet text
//! - [`config`] — configuration types and loading/saving
//! - [`resize`] — resize-and-pad to fixed target resolutions
//! - [`pipeline`] — image collection and batch embed/extract/resize

pub mod annotation;
pub mod config;
pub mod pipeline;
pub mod resize;
pub mod xmp;
