//! XMP packet building, embedding and read-back.
//!
//! - [`build_packet`] — text → XMP packet (`dc:title` + `dc:description`)
//! - [`embed_path`] / [`embed_file`] — route by extension to the JPEG, PNG or
//!   WebP embedder and rewrite the file in place
//! - [`read_packet`] / [`read_text`] — the reverse direction
//!
//! | Format | Container |
//! |--------|-----------|
//! | JPEG (`.jpg`, `.jpeg`) | APP1 segment after SOI |
//! | PNG (`.png`) | uncompressed iTXt, key `XML:com.adobe.xmp` |
//! | WebP (`.webp`) | `XMP ` RIFF chunk, or `.xmp` sidecar if not RIFF |
//!
//! Every rewrite goes through a temp file and a rename, so a failed call
//! leaves the original bytes in place.

mod dispatch;
mod error;
mod io;
pub mod jpeg;
mod packet;
pub mod png;
pub mod webp;

pub use dispatch::{EmbedOutcome, ImageKind, embed_file, embed_path, read_packet, read_text};
pub use error::{EmbedError, EmbedResult};
pub use packet::{build_packet, extract_text};

pub(crate) use io::write_atomic;
