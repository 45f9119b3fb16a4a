//! JPEG: XMP in an APP1 segment directly after SOI.
//!
//! Layout of the segment we write:
//!
//! ```text
//! FF E1 | len (u16 BE, = 2 + 29 + packet) | "http://ns.adobe.com/xap/1.0/\0" | packet
//! ```
//!
//! Every existing XMP APP1 in the header (everything before SOS) is dropped,
//! so re-embedding replaces rather than accumulates. Entropy-coded data after
//! SOS is copied through verbatim.

use std::ops::Range;
use std::path::Path;

use super::error::{EmbedError, EmbedResult};
use super::io::write_atomic;

const SOI: [u8; 2] = [0xFF, 0xD8];
const MARKER_APP1: u8 = 0xE1;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;
const MARKER_TEM: u8 = 0x01;

/// Signature opening the body of an XMP APP1 segment (29 bytes, NUL included).
pub const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// Largest packet that fits a single APP1 segment.
pub const MAX_PACKET_LEN: usize = u16::MAX as usize - 2 - XMP_SIGNATURE.len();

/// One marker segment in the header. `body` excludes marker and length
/// field; standalone markers have an empty body.
#[derive(Debug, Clone)]
struct Segment {
    marker: u8,
    start: usize,
    body: Range<usize>,
}

impl Segment {
    fn end(&self) -> usize {
        self.body.end
    }

    fn is_xmp(&self, data: &[u8]) -> bool {
        self.marker == MARKER_APP1 && data[self.body.clone()].starts_with(XMP_SIGNATURE)
    }
}

/// Walk marker segments from just after SOI up to (not including) SOS/EOI.
///
/// Returns the segments and the offset where the untouched tail begins.
fn scan_header(data: &[u8]) -> EmbedResult<(Vec<Segment>, usize)> {
    let mut segments = Vec::new();
    let mut pos = SOI.len();

    while pos + 2 <= data.len() {
        if data[pos] != 0xFF {
            log::debug!("Non-marker byte at offset {pos}, ending header scan");
            break;
        }

        let marker = data[pos + 1];
        match marker {
            // Fill byte before a marker
            0xFF => {
                segments.push(Segment {
                    marker,
                    start: pos,
                    body: pos + 1..pos + 1,
                });
                pos += 1;
            }
            MARKER_SOS | MARKER_EOI => break,
            MARKER_TEM | 0xD0..=0xD7 => {
                segments.push(Segment {
                    marker,
                    start: pos,
                    body: pos + 2..pos + 2,
                });
                pos += 2;
            }
            _ => {
                if pos + 4 > data.len() {
                    return Err(EmbedError::MalformedContainer(format!(
                        "segment FF{marker:02X} at offset {pos} has no length field"
                    )));
                }
                let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                if len < 2 {
                    return Err(EmbedError::MalformedContainer(format!(
                        "segment FF{marker:02X} at offset {pos} declares length {len}"
                    )));
                }
                let end = pos + 2 + len;
                if end > data.len() {
                    return Err(EmbedError::MalformedContainer(format!(
                        "segment FF{marker:02X} at offset {pos} runs {} bytes past end of file",
                        end - data.len()
                    )));
                }
                segments.push(Segment {
                    marker,
                    start: pos,
                    body: pos + 4..end,
                });
                pos = end;
            }
        }
    }

    Ok((segments, pos))
}

fn check_signature(data: &[u8]) -> EmbedResult<()> {
    if data.len() < 2 || data[..2] != SOI {
        return Err(EmbedError::FormatMismatch { expected: "JPEG" });
    }
    Ok(())
}

/// Build the APP1 segment carrying `packet`.
fn build_segment(packet: &str) -> EmbedResult<Vec<u8>> {
    let packet = packet.as_bytes();
    if packet.len() > MAX_PACKET_LEN {
        return Err(EmbedError::PacketTooLarge {
            size: packet.len(),
            limit: MAX_PACKET_LEN,
        });
    }

    // Length field covers itself, the signature and the packet
    let len = (2 + XMP_SIGNATURE.len() + packet.len()) as u16;

    let mut segment = Vec::with_capacity(2 + len as usize);
    segment.extend_from_slice(&[0xFF, MARKER_APP1]);
    segment.extend_from_slice(&len.to_be_bytes());
    segment.extend_from_slice(XMP_SIGNATURE);
    segment.extend_from_slice(packet);
    Ok(segment)
}

/// Rewrite an in-memory JPEG so it carries exactly one XMP segment.
pub fn embed_bytes(data: &[u8], packet: &str) -> EmbedResult<Vec<u8>> {
    check_signature(data)?;
    let segment = build_segment(packet)?;
    let (segments, tail) = scan_header(data)?;

    let mut out = Vec::with_capacity(data.len() + segment.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&segment);

    let mut removed = 0;
    for seg in &segments {
        if seg.is_xmp(data) {
            removed += 1;
            continue;
        }
        out.extend_from_slice(&data[seg.start..seg.end()]);
    }
    out.extend_from_slice(&data[tail..]);

    if removed > 0 {
        log::debug!("Replaced {removed} existing XMP segment(s)");
    }
    Ok(out)
}

/// Embed `packet` into the JPEG at `path`, replacing any previous packet.
///
/// The file is only replaced once the new bytes are fully built and written.
pub fn embed(path: &Path, packet: &str) -> EmbedResult<()> {
    let data = std::fs::read(path)?;
    let out = embed_bytes(&data, packet)?;
    write_atomic(path, &out)?;
    Ok(())
}

/// First XMP packet in the header of an in-memory JPEG.
pub fn read_packet_bytes(data: &[u8]) -> EmbedResult<Option<String>> {
    check_signature(data)?;
    let (segments, _) = scan_header(data)?;
    Ok(segments.iter().find(|s| s.is_xmp(data)).map(|s| {
        let body = &data[s.body.clone()];
        String::from_utf8_lossy(&body[XMP_SIGNATURE.len()..]).into_owned()
    }))
}

/// Read the XMP packet from the JPEG at `path`, if one is present.
pub fn read_packet(path: &Path) -> EmbedResult<Option<String>> {
    let data = std::fs::read(path)?;
    read_packet_bytes(&data)
}
