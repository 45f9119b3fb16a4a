//! XMP packet construction and text read-back.
//!
//! The packet carries one annotation string written to both `dc:title` and
//! `dc:description`, each as an `rdf:Alt` with a single `x-default` entry.

/// Packet wrapper id fixed by the XMP specification.
const XPACKET_ID: &str = "W5M0MpCehiHzreSzNTczkc9d";

/// Build a complete XMP packet holding `text` in `dc:title` and `dc:description`.
///
/// Pure and deterministic: the same text always yields the same bytes. Empty
/// text still produces a well-formed packet with empty fields.
pub fn build_packet(text: &str) -> String {
    let esc = xml_escape(text);

    let mut xmp = String::with_capacity(640 + esc.len() * 2);
    xmp.push_str(&format!("<?xpacket begin=\"\u{feff}\" id=\"{XPACKET_ID}\"?>\n"));
    xmp.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
    xmp.push_str("  <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n");
    xmp.push_str("    <rdf:Description rdf:about=\"\"\n");
    xmp.push_str("      xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    push_alt(&mut xmp, "dc:description", &esc);
    push_alt(&mut xmp, "dc:title", &esc);
    xmp.push_str("    </rdf:Description>\n");
    xmp.push_str("  </rdf:RDF>\n");
    xmp.push_str("</x:xmpmeta>\n");
    xmp.push_str("<?xpacket end=\"w\"?>");
    xmp
}

fn push_alt(xmp: &mut String, element: &str, escaped: &str) {
    xmp.push_str(&format!("      <{element}>\n"));
    xmp.push_str("        <rdf:Alt>\n");
    xmp.push_str(&format!(
        "          <rdf:li xml:lang=\"x-default\">{escaped}</rdf:li>\n"
    ));
    xmp.push_str("        </rdf:Alt>\n");
    xmp.push_str(&format!("      </{element}>\n"));
}

/// Escape the characters that can't appear raw in element content or attributes.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Recover the annotation text from a packet.
///
/// Reads the first `rdf:li` of `dc:description`, falling back to `dc:title`.
/// The value is trimmed and unescaped; blank values yield `None`.
pub fn extract_text(packet: &str) -> Option<String> {
    first_li(packet, "dc:description").or_else(|| first_li(packet, "dc:title"))
}

/// Text of the first non-empty `<rdf:li>` inside `<element>...</element>`.
fn first_li(xml: &str, element: &str) -> Option<String> {
    let open = format!("<{element}>");
    let close = format!("</{element}>");

    let start = xml.find(&open)? + open.len();
    let end = start + xml[start..].find(&close)?;
    let body = &xml[start..end];

    let li_start = body.find("<rdf:li")?;
    let tag_end = li_start + body[li_start..].find('>')?;
    if body[..tag_end].ends_with('/') {
        return None;
    }
    let content_start = tag_end + 1;
    let content_end = content_start + body[content_start..].find("</rdf:li>")?;

    let raw = body[content_start..content_end].trim();
    if raw.is_empty() {
        return None;
    }

    let text = match quick_xml::escape::unescape(raw) {
        Ok(cow) => cow.into_owned(),
        Err(e) => {
            log::debug!("Could not unescape {element} value: {e}");
            raw.to_string()
        }
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── build_packet ─────────────────────────────────────────────────

    #[test]
    fn packet_envelope() {
        let xmp = build_packet("solo");
        assert!(xmp.starts_with("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>"));
        assert!(xmp.ends_with("<?xpacket end=\"w\"?>"));
        assert!(xmp.contains("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">"));
        assert!(xmp.contains("xmlns:dc=\"http://purl.org/dc/elements/1.1/\""));
    }

    #[test]
    fn text_lands_in_title_and_description() {
        let xmp = build_packet("1girl, blue_hair, solo");
        let li = "<rdf:li xml:lang=\"x-default\">1girl, blue_hair, solo</rdf:li>";
        assert_eq!(xmp.matches(li).count(), 2);
        assert!(xmp.contains("<dc:title>"));
        assert!(xmp.contains("<dc:description>"));
    }

    #[test]
    fn deterministic() {
        assert_eq!(build_packet("a, b"), build_packet("a, b"));
    }

    #[test]
    fn empty_text_still_well_formed() {
        let xmp = build_packet("");
        assert_eq!(xmp.matches("<rdf:li xml:lang=\"x-default\"></rdf:li>").count(), 2);
        assert!(xmp.contains("</x:xmpmeta>"));
    }

    #[test]
    fn reserved_characters_escaped() {
        let xmp = build_packet(r#"a<b>&"c""#);
        assert!(xmp.contains("a&lt;b&gt;&amp;&quot;c&quot;"));
        assert!(!xmp.contains(r#"a<b>"#));
    }

    // ── extract_text ─────────────────────────────────────────────────

    #[test]
    fn extract_roundtrip_with_escapes() {
        let text = r#"tom & jerry, <3, "quoted", 2>1"#;
        assert_eq!(extract_text(&build_packet(text)).as_deref(), Some(text));
    }

    #[test]
    fn extract_multiline() {
        let text = "line one\nline two";
        assert_eq!(extract_text(&build_packet(text)).as_deref(), Some(text));
    }

    #[test]
    fn extract_falls_back_to_title() {
        let xmp = "<dc:title><rdf:Alt><rdf:li xml:lang=\"x-default\">only title</rdf:li></rdf:Alt></dc:title>";
        assert_eq!(extract_text(xmp).as_deref(), Some("only title"));
    }

    #[test]
    fn extract_empty_is_none() {
        assert_eq!(extract_text(&build_packet("")), None);
        assert_eq!(extract_text("<x:xmpmeta/>"), None);
    }

    #[test]
    fn extract_self_closing_li_is_none() {
        let xmp = "<dc:description><rdf:Alt><rdf:li xml:lang=\"x-default\"/></rdf:Alt></dc:description>";
        assert_eq!(extract_text(xmp), None);
    }

    #[test]
    fn extract_numeric_entities() {
        let xmp = "<dc:description><rdf:Alt><rdf:li xml:lang=\"x-default\">it&#39;s &#x41;</rdf:li></rdf:Alt></dc:description>";
        assert_eq!(extract_text(xmp).as_deref(), Some("it's A"));
    }
}
