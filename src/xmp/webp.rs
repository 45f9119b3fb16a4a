//! WebP: XMP in a RIFF chunk tagged `XMP ` (trailing space included).
//!
//! ```text
//! "RIFF" | size (u32 LE, bytes after these 8) | "WEBP" | chunk*
//! chunk = fourcc | len (u32 LE, payload only) | payload | 0x00 if len is odd
//! ```
//!
//! The chunk list is parsed in full, every `XMP ` chunk dropped, a fresh one
//! appended and the container re-serialised with recomputed sizes. Files that
//! aren't RIFF/WebP get a sidecar instead.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use super::dispatch::EmbedOutcome;
use super::error::{EmbedError, EmbedResult};
use super::io::write_atomic;

const RIFF: &[u8; 4] = b"RIFF";
const WEBP: &[u8; 4] = b"WEBP";

/// Chunk id reserved for XMP.
pub const XMP_CHUNK_ID: [u8; 4] = *b"XMP ";
const VP8X_CHUNK_ID: [u8; 4] = *b"VP8X";

/// VP8X flags byte: "XMP metadata present".
const VP8X_XMP_FLAG: u8 = 0x04;

/// Extension given to the fallback sidecar.
pub const SIDECAR_EXTENSION: &str = "xmp";

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

#[derive(Debug, Clone)]
struct Chunk<'a> {
    id: [u8; 4],
    payload: Cow<'a, [u8]>,
}

/// `true` when `data` starts with a RIFF header of form type WEBP.
pub fn is_webp(data: &[u8]) -> bool {
    data.len() >= HEADER_LEN && &data[0..4] == RIFF && &data[8..12] == WEBP
}

/// Path of the sidecar written when the input isn't a RIFF/WebP container.
pub fn sidecar_path(path: &Path) -> PathBuf {
    path.with_extension(SIDECAR_EXTENSION)
}

/// Offset one past the last byte the RIFF size field covers, capped at the
/// buffer length.
fn container_end(data: &[u8]) -> usize {
    let declared = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    declared.saturating_add(8).min(data.len())
}

/// Split the chunk list following the 12-byte header.
///
/// Only bytes inside the declared RIFF size are walked; anything after that
/// is outside the container and ignored. A header or payload that runs past
/// the container end is an error; the only shortfall tolerated is the pad
/// byte of a final odd-length chunk.
fn parse_chunks(data: &[u8]) -> EmbedResult<Vec<Chunk<'_>>> {
    let limit = container_end(data);
    if limit < HEADER_LEN {
        return Err(EmbedError::MalformedContainer(format!(
            "RIFF size field declares {} bytes, form type needs 4",
            limit.saturating_sub(8)
        )));
    }

    let mut chunks = Vec::new();
    let mut pos = HEADER_LEN;

    while pos < limit {
        if pos + CHUNK_HEADER_LEN > limit {
            return Err(EmbedError::MalformedContainer(format!(
                "truncated chunk header at offset {pos} ({} trailing bytes)",
                limit - pos
            )));
        }

        let id: [u8; 4] = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
        let size =
            u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
                as usize;
        let start = pos + CHUNK_HEADER_LEN;
        let end = start
            .checked_add(size)
            .filter(|&end| end <= limit)
            .ok_or_else(|| {
                EmbedError::MalformedContainer(format!(
                    "chunk '{}' at offset {pos} claims {size} bytes, {} remain",
                    String::from_utf8_lossy(&id),
                    limit - start
                ))
            })?;

        chunks.push(Chunk {
            id,
            payload: Cow::Borrowed(&data[start..end]),
        });
        pos = end + (size & 1);
    }

    Ok(chunks)
}

/// Serialise chunks back into a complete RIFF/WebP file.
fn serialize(chunks: &[Chunk<'_>]) -> EmbedResult<Vec<u8>> {
    let body_len: usize = 4 + chunks
        .iter()
        .map(|c| CHUNK_HEADER_LEN + c.payload.len() + (c.payload.len() & 1))
        .sum::<usize>();
    if body_len > u32::MAX as usize {
        return Err(EmbedError::PacketTooLarge {
            size: body_len,
            limit: u32::MAX as usize,
        });
    }

    let mut out = Vec::with_capacity(8 + body_len);
    out.extend_from_slice(RIFF);
    out.extend_from_slice(&(body_len as u32).to_le_bytes());
    out.extend_from_slice(WEBP);
    for chunk in chunks {
        out.extend_from_slice(&chunk.id);
        out.extend_from_slice(&(chunk.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&chunk.payload);
        if chunk.payload.len() % 2 == 1 {
            out.push(0);
        }
    }
    Ok(out)
}

/// Rewrite an in-memory RIFF/WebP so it carries exactly one `XMP ` chunk,
/// appended last.
pub fn embed_bytes(data: &[u8], packet: &str) -> EmbedResult<Vec<u8>> {
    if !is_webp(data) {
        return Err(EmbedError::FormatMismatch { expected: "WebP" });
    }

    let mut chunks = parse_chunks(data)?;
    let trailing = data.len() - container_end(data);
    if trailing > 0 {
        log::warn!("Dropping {trailing} byte(s) after the end of the RIFF container");
    }
    let before = chunks.len();
    chunks.retain(|c| c.id != XMP_CHUNK_ID);
    if chunks.len() != before {
        log::debug!("Replaced {} existing XMP chunk(s)", before - chunks.len());
    }

    // Extended files advertise metadata in the VP8X flags
    if let Some(vp8x) = chunks.iter_mut().find(|c| c.id == VP8X_CHUNK_ID) {
        let flags = vp8x.payload.first().copied();
        if let Some(flags) = flags.filter(|f| f & VP8X_XMP_FLAG == 0) {
            vp8x.payload.to_mut()[0] = flags | VP8X_XMP_FLAG;
        }
    }

    chunks.push(Chunk {
        id: XMP_CHUNK_ID,
        payload: Cow::Borrowed(packet.as_bytes()),
    });
    serialize(&chunks)
}

/// Embed `packet` into the WebP at `path`.
///
/// Input that isn't a RIFF/WebP container is left untouched and the packet
/// goes to a sidecar (`<stem>.xmp`) instead; this still counts as success.
pub fn embed(path: &Path, packet: &str) -> EmbedResult<EmbedOutcome> {
    let data = std::fs::read(path)?;

    if !is_webp(&data) {
        let sidecar = sidecar_path(path);
        log::warn!(
            "{} is not a RIFF/WebP container, writing sidecar {}",
            path.display(),
            sidecar.display()
        );
        write_atomic(&sidecar, packet.as_bytes())?;
        return Ok(EmbedOutcome::Sidecar(sidecar));
    }

    let out = embed_bytes(&data, packet)?;
    write_atomic(path, &out)?;
    Ok(EmbedOutcome::Embedded)
}

/// Payload of the first `XMP ` chunk in an in-memory WebP.
pub fn read_packet_bytes(data: &[u8]) -> EmbedResult<Option<String>> {
    if !is_webp(data) {
        return Err(EmbedError::FormatMismatch { expected: "WebP" });
    }
    let chunks = parse_chunks(data)?;
    Ok(chunks
        .iter()
        .find(|c| c.id == XMP_CHUNK_ID)
        .map(|c| String::from_utf8_lossy(&c.payload).into_owned()))
}

/// Read the packet for the WebP at `path`: from the container, or from the
/// sidecar when the file isn't RIFF/WebP.
pub fn read_packet(path: &Path) -> EmbedResult<Option<String>> {
    let data = std::fs::read(path)?;
    if is_webp(&data) {
        return read_packet_bytes(&data);
    }

    let sidecar = sidecar_path(path);
    if sidecar.is_file() {
        return Ok(Some(std::fs::read_to_string(sidecar)?));
    }
    Ok(None)
}
