//! PNG: XMP in an uncompressed iTXt chunk keyed `XML:com.adobe.xmp`.
//!
//! Chunk parsing, CRCs and re-encoding are handled by img-parts; this module
//! only decides which chunks go and where the new one lands (right after
//! IHDR).

use img_parts::Bytes;
use img_parts::png::{Png, PngChunk};
use std::path::Path;

use super::error::{EmbedError, EmbedResult};
use super::io::write_atomic;

const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Text-chunk keyword reserved for XMP.
pub const XMP_KEYWORD: &str = "XML:com.adobe.xmp";

const CHUNK_IHDR: [u8; 4] = *b"IHDR";
const CHUNK_ITXT: [u8; 4] = *b"iTXt";
const CHUNK_TEXT: [u8; 4] = *b"tEXt";
const CHUNK_ZTXT: [u8; 4] = *b"zTXt";

fn keyword_prefix() -> Vec<u8> {
    let mut prefix = XMP_KEYWORD.as_bytes().to_vec();
    prefix.push(0);
    prefix
}

/// Any text chunk (iTXt, tEXt, zTXt) stored under the XMP keyword.
fn is_xmp_text_chunk(chunk: &PngChunk, prefix: &[u8]) -> bool {
    let kind = chunk.kind();
    (kind == CHUNK_ITXT || kind == CHUNK_TEXT || kind == CHUNK_ZTXT)
        && chunk.contents().starts_with(prefix)
}

/// iTXt body: keyword NUL, flag 0, method 0, empty language NUL, empty
/// translated keyword NUL, text.
fn itxt_contents(packet: &str) -> Vec<u8> {
    let mut contents = keyword_prefix();
    contents.push(0); // compression flag
    contents.push(0); // compression method
    contents.push(0); // language tag
    contents.push(0); // translated keyword
    contents.extend_from_slice(packet.as_bytes());
    contents
}

fn parse(data: &[u8]) -> EmbedResult<Png> {
    if !data.starts_with(PNG_SIGNATURE) {
        return Err(EmbedError::FormatMismatch { expected: "PNG" });
    }
    let png = Png::from_bytes(Bytes::copy_from_slice(data))
        .map_err(|e| EmbedError::MalformedContainer(format!("PNG: {e}")))?;

    // IHDR must be the first chunk
    if png.chunks().first().map(|c| c.kind()) != Some(CHUNK_IHDR) {
        return Err(EmbedError::MalformedContainer("PNG: first chunk is not IHDR".to_string()));
    }
    Ok(png)
}

/// Rewrite an in-memory PNG so it carries exactly one XMP iTXt chunk.
pub fn embed_bytes(data: &[u8], packet: &str) -> EmbedResult<Vec<u8>> {
    let mut png = parse(data)?;
    let prefix = keyword_prefix();

    let chunks = png.chunks_mut();
    let before = chunks.len();
    chunks.retain(|c| !is_xmp_text_chunk(c, &prefix));
    let removed = before - chunks.len();
    if removed > 0 {
        log::debug!("Replaced {removed} existing XMP text chunk(s)");
    }

    // parse() guarantees IHDR at index 0, and retain never drops it
    chunks.insert(1, PngChunk::new(CHUNK_ITXT, Bytes::from(itxt_contents(packet))));

    let mut out = Vec::with_capacity(data.len() + packet.len() + 64);
    png.encoder().write_to(&mut out)?;
    Ok(out)
}

/// Embed `packet` into the PNG at `path`, replacing any previous packet.
pub fn embed(path: &Path, packet: &str) -> EmbedResult<()> {
    let data = std::fs::read(path)?;
    let out = embed_bytes(&data, packet)?;
    write_atomic(path, &out)?;
    Ok(())
}

/// Text of the first XMP chunk in an in-memory PNG.
pub fn read_packet_bytes(data: &[u8]) -> EmbedResult<Option<String>> {
    let png = parse(data)?;
    let prefix = keyword_prefix();

    for chunk in png.chunks() {
        if !is_xmp_text_chunk(chunk, &prefix) {
            continue;
        }
        let rest = &chunk.contents()[prefix.len()..];
        match chunk.kind() {
            CHUNK_ITXT => {
                if let Some(text) = itxt_text(rest)? {
                    return Ok(Some(text));
                }
            }
            CHUNK_TEXT => return Ok(Some(String::from_utf8_lossy(rest).into_owned())),
            _ => log::warn!("Skipping compressed zTXt XMP chunk"),
        }
    }
    Ok(None)
}

/// Decode the remainder of an iTXt chunk after its keyword.
fn itxt_text(rest: &[u8]) -> EmbedResult<Option<String>> {
    if rest.len() < 2 {
        return Err(EmbedError::MalformedContainer(
            "iTXt chunk truncated after keyword".to_string(),
        ));
    }
    if rest[0] != 0 {
        log::warn!("Skipping compressed iTXt XMP chunk");
        return Ok(None);
    }

    // Skip language tag and translated keyword, both NUL-terminated
    let mut pos = 2;
    for _ in 0..2 {
        let nul = rest[pos..].iter().position(|&b| b == 0).ok_or_else(|| {
            EmbedError::MalformedContainer("iTXt chunk missing NUL separator".to_string())
        })?;
        pos += nul + 1;
    }
    Ok(Some(String::from_utf8_lossy(&rest[pos..]).into_owned()))
}

/// Read the XMP packet from the PNG at `path`, if one is present.
pub fn read_packet(path: &Path) -> EmbedResult<Option<String>> {
    let data = std::fs::read(path)?;
    read_packet_bytes(&data)
}
