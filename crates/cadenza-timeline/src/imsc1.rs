//! Minimal IMSC1 (TTML) subtitle extraction.
//!
//! IMSC1 segments arrive as fragmented MP4 with the TTML document in the
//! `mdat`, or occasionally as a bare XML document. Only the timing-relevant
//! subset is handled here: `<p begin end>` paragraphs with clock-time or
//! offset-time expressions. Layout and styling attributes are ignored;
//! presentation is the embedder's concern.

use thiserror::Error;

use crate::cues::RawCue;

/// RFC 6381 sample entry the detector latches when a payload parses as
/// IMSC1.
pub const IMSC1_CODEC: &str = "stpp.ttml.im1t";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Imsc1Error {
    #[error("payload carries no TTML document")]
    NoDocument,

    #[error("malformed time expression: {0}")]
    BadTime(String),
}

/// Extract the TTML document out of an fMP4 payload, or accept a bare XML
/// document as-is.
fn ttml_document(payload: &[u8]) -> Option<String> {
    let mdats = cadenza_remux::find_box(payload, &[b"mdat"]);
    let xml = if mdats.is_empty() {
        String::from_utf8_lossy(payload).into_owned()
    } else {
        mdats
            .iter()
            .map(|m| String::from_utf8_lossy(m).into_owned())
            .collect::<String>()
    };
    let trimmed = xml.trim_start_matches('\u{FEFF}').trim_start();
    (trimmed.contains("<tt") && trimmed.starts_with('<')).then(|| xml)
}

/// Parse a TTML time expression into seconds.
///
/// Supported forms: `HH:MM:SS(.fff)` clock time, and `<n>(h|m|s|ms|t)`
/// offset time, with `t` scaled by `tick_rate`.
fn parse_time(value: &str, tick_rate: f64) -> Result<f64, Imsc1Error> {
    let value = value.trim();
    let bad = || Imsc1Error::BadTime(value.to_string());

    if value.contains(':') {
        let parts: Vec<&str> = value.split(':').collect();
        let [h, m, s] = parts.as_slice() else {
            return Err(bad());
        };
        let h: f64 = h.parse().map_err(|_| bad())?;
        let m: f64 = m.parse().map_err(|_| bad())?;
        let s: f64 = s.parse().map_err(|_| bad())?;
        return Ok(h * 3600.0 + m * 60.0 + s);
    }

    for (suffix, scale) in [
        ("ms", 1e-3),
        ("h", 3600.0),
        ("m", 60.0),
        ("s", 1.0),
    ] {
        if let Some(num) = value.strip_suffix(suffix) {
            return num.trim().parse::<f64>().map(|n| n * scale).map_err(|_| bad());
        }
    }
    if let Some(ticks) = value.strip_suffix('t') {
        let ticks: f64 = ticks.trim().parse().map_err(|_| bad())?;
        return Ok(ticks / tick_rate.max(1.0));
    }
    Err(bad())
}

/// Value of `attr="..."` inside an XML tag body.
fn attr_value<'a>(tag: &'a str, attr: &str) -> Option<&'a str> {
    let mut rest = tag;
    while let Some(at) = rest.find(attr) {
        let after = &rest[at + attr.len()..];
        // Guard against matching a suffix of a longer attribute name.
        let preceded_ok = at == 0
            || rest.as_bytes()[at - 1].is_ascii_whitespace()
            || rest.as_bytes()[at - 1] == b':';
        if preceded_ok {
            if let Some(q) = after.strip_prefix("=\"") {
                return q.split('"').next();
            }
        }
        rest = after;
    }
    None
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Inner text of an element body with nested tags stripped; `<br/>` becomes
/// a newline.
fn inner_text(body: &str) -> String {
    let mut out = String::new();
    let mut rest = body;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let tag = &rest[open + 1..open + close];
        if tag.trim_start().starts_with("br") {
            out.push('\n');
        }
        rest = &rest[open + close + 1..];
    }
    if !rest.contains('<') {
        out.push_str(rest);
    }
    decode_entities(out.trim())
}

/// Parse an IMSC1 payload into cues.
pub fn parse_imsc1(payload: &[u8]) -> Result<Vec<RawCue>, Imsc1Error> {
    let doc = ttml_document(payload).ok_or(Imsc1Error::NoDocument)?;

    let tick_rate = doc
        .find("tickRate=\"")
        .and_then(|at| doc[at + 10..].split('"').next())
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(1.0);

    let mut cues = Vec::new();
    let mut rest = doc.as_str();
    while let Some(open) = rest.find("<p") {
        // Require a whitespace or tag end after "<p" so "<page>" never
        // matches.
        let after = &rest[open + 2..];
        if !after.starts_with(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/') {
            rest = after;
            continue;
        }
        let Some(tag_end) = after.find('>') else {
            break;
        };
        let tag = &after[..tag_end];

        if tag.ends_with('/') {
            rest = &after[tag_end + 1..];
            continue;
        }

        let body_and_rest = &after[tag_end + 1..];
        let Some(close) = body_and_rest.find("</p>") else {
            break;
        };
        let body = &body_and_rest[..close];

        if let (Some(begin), Some(end)) = (attr_value(tag, "begin"), attr_value(tag, "end")) {
            cues.push(RawCue {
                start: parse_time(begin, tick_rate)?,
                end: parse_time(end, tick_rate)?,
                text: inner_text(body),
                id: attr_value(tag, "xml:id").map(ToString::to_string),
            });
        }
        rest = &body_and_rest[close + 4..];
    }

    Ok(cues)
}
