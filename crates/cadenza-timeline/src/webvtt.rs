//! WebVTT cue-timing parser.
//!
//! Parses the subset of WebVTT that HLS subtitle segments carry: the header,
//! the optional `X-TIMESTAMP-MAP` MPEG-TS synchronisation line, and cue
//! blocks. Styling and region blocks are skipped, cue settings after the
//! timing line are ignored.

use thiserror::Error;

use crate::cues::RawCue;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebVttError {
    #[error("payload is not UTF-8")]
    InvalidUtf8,

    #[error("missing WEBVTT header")]
    MissingHeader,

    #[error("malformed cue timing: {0}")]
    BadTiming(String),
}

/// `X-TIMESTAMP-MAP` header: anchors cue-local time onto the MPEG-TS clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampMap {
    /// MPEG-TS timestamp in 90 kHz ticks.
    pub mpegts: i64,
    /// Local cue time the timestamp corresponds to, in seconds.
    pub local: f64,
}

/// Parse result: cues in payload-local time plus the sync header, if any.
#[derive(Debug, Clone, Default)]
pub struct WebVttPayload {
    pub cues: Vec<RawCue>,
    pub timestamp_map: Option<TimestampMap>,
}

/// Parse a `HH:MM:SS.mmm` or `MM:SS.mmm` timestamp into seconds.
fn parse_timestamp(input: &str) -> Option<f64> {
    let input = input.trim();
    let (clock, millis) = input.split_once('.')?;
    let millis: f64 = if millis.len() == 3 {
        millis.parse::<u32>().ok()?.into()
    } else {
        return None;
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, s.parse::<u64>().ok()?),
        [m, s] => (0, m.parse::<u64>().ok()?, s.parse::<u64>().ok()?),
        _ => return None,
    };
    if m >= 60 || s >= 60 {
        return None;
    }
    Some((h * 3600 + m * 60 + s) as f64 + millis / 1000.0)
}

fn parse_timestamp_map(line: &str) -> Option<TimestampMap> {
    let value = line.strip_prefix("X-TIMESTAMP-MAP=")?;
    let mut mpegts = None;
    let mut local = None;
    for part in value.split(',') {
        if let Some(ts) = part.trim().strip_prefix("MPEGTS:") {
            mpegts = ts.trim().parse::<i64>().ok();
        } else if let Some(t) = part.trim().strip_prefix("LOCAL:") {
            local = parse_timestamp(t);
        }
    }
    Some(TimestampMap {
        mpegts: mpegts?,
        local: local?,
    })
}

/// Parse a WebVTT payload.
///
/// Fails when the payload is not WebVTT at all (wrong header, not UTF-8);
/// individual malformed cue blocks fail the whole payload so the caller can
/// fall back to another codec.
pub fn parse_webvtt(payload: &[u8]) -> Result<WebVttPayload, WebVttError> {
    let text = std::str::from_utf8(payload).map_err(|_| WebVttError::InvalidUtf8)?;
    let text = text.trim_start_matches('\u{FEFF}');

    let mut lines = text.lines().peekable();
    let header = lines.next().unwrap_or_default();
    if !header.starts_with("WEBVTT") {
        return Err(WebVttError::MissingHeader);
    }

    let mut result = WebVttPayload::default();

    // Header block: everything until the first blank line may carry the
    // timestamp map.
    for line in lines.by_ref() {
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if line.starts_with("X-TIMESTAMP-MAP=") {
            result.timestamp_map = parse_timestamp_map(line);
        }
    }

    while let Some(first) = lines.next() {
        let first = first.trim_end();
        if first.is_empty() {
            continue;
        }
        // NOTE/STYLE/REGION blocks are skipped wholesale.
        if first.starts_with("NOTE") || first.starts_with("STYLE") || first.starts_with("REGION") {
            for line in lines.by_ref() {
                if line.trim_end().is_empty() {
                    break;
                }
            }
            continue;
        }

        // Optional cue identifier precedes the timing line.
        let (id, timing_line) = if first.contains("-->") {
            (None, first.to_string())
        } else {
            let Some(timing) = lines.next() else {
                break;
            };
            (Some(first.to_string()), timing.trim_end().to_string())
        };

        let Some((from, to)) = timing_line.split_once("-->") else {
            return Err(WebVttError::BadTiming(timing_line.clone()));
        };
        // Cue settings may trail the end timestamp.
        let to = to.trim_start();
        let to = to.split_whitespace().next().unwrap_or_default();
        let (Some(start), Some(end)) = (parse_timestamp(from), parse_timestamp(to)) else {
            return Err(WebVttError::BadTiming(timing_line.clone()));
        };

        let mut cue_text = Vec::new();
        for line in lines.by_ref() {
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            cue_text.push(line.to_string());
        }

        result.cues.push(RawCue {
            start,
            end,
            text: cue_text.join("\n"),
            id,
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_simple_cues() {
        let payload = b"WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nhello\n\n00:00:04.500 --> 00:00:06.000\nworld\nsecond line\n";
        let parsed = parse_webvtt(payload).unwrap();
        assert_eq!(parsed.cues.len(), 2);
        assert_eq!(parsed.cues[0].start, 1.0);
        assert_eq!(parsed.cues[0].end, 3.0);
        assert_eq!(parsed.cues[0].text, "hello");
        assert_eq!(parsed.cues[1].text, "world\nsecond line");
        assert!(parsed.timestamp_map.is_none());
    }

    #[test]
    fn parses_timestamp_map() {
        let payload =
            b"WEBVTT\nX-TIMESTAMP-MAP=LOCAL:00:00:00.000,MPEGTS:900000\n\n00:01.000 --> 00:02.000\nhi\n";
        let parsed = parse_webvtt(payload).unwrap();
        let map = parsed.timestamp_map.unwrap();
        assert_eq!(map.mpegts, 900_000);
        assert_eq!(map.local, 0.0);
        assert_eq!(parsed.cues.len(), 1);
    }

    #[test]
    fn cue_identifier_is_preserved() {
        let payload = b"WEBVTT\n\ncue-7\n00:00:01.000 --> 00:00:02.000\ntext\n";
        let parsed = parse_webvtt(payload).unwrap();
        assert_eq!(parsed.cues[0].id.as_deref(), Some("cue-7"));
    }

    #[test]
    fn cue_settings_after_timing_are_ignored() {
        let payload = b"WEBVTT\n\n00:00:01.000 --> 00:00:02.000 line:85% align:center\ntext\n";
        let parsed = parse_webvtt(payload).unwrap();
        assert_eq!(parsed.cues[0].end, 2.0);
    }

    #[test]
    fn note_blocks_are_skipped() {
        let payload = b"WEBVTT\n\nNOTE this is a comment\nspanning lines\n\n00:00:01.000 --> 00:00:02.000\ntext\n";
        let parsed = parse_webvtt(payload).unwrap();
        assert_eq!(parsed.cues.len(), 1);
    }

    #[test]
    fn missing_header_is_rejected() {
        assert_eq!(
            parse_webvtt(b"<tt xmlns=\"x\"></tt>").unwrap_err(),
            WebVttError::MissingHeader
        );
    }

    #[test]
    fn non_utf8_is_rejected() {
        assert_eq!(
            parse_webvtt(&[0x00, 0x00, 0x00, 0x18, 0xFF, 0xFE]).unwrap_err(),
            WebVttError::InvalidUtf8
        );
    }

    #[test]
    fn malformed_timing_fails_payload() {
        let payload = b"WEBVTT\n\n00:00:01.000 --> bogus\ntext\n";
        assert!(matches!(
            parse_webvtt(payload),
            Err(WebVttError::BadTiming(_))
        ));
    }

    #[rstest]
    #[case("00:00:01.000", Some(1.0))]
    #[case("01:02:03.500", Some(3723.5))]
    #[case("02:03.250", Some(123.25))]
    #[case("99:59:59.999", Some(359_999.999))]
    #[case("00:61.000", None)] // seconds out of range
    #[case("1.5", None)] // no minutes component
    #[case("00:00:01", None)] // no millisecond component
    fn timestamp_grammar(#[case] input: &str, #[case] expected: Option<f64>) {
        match (parse_timestamp(input), expected) {
            (Some(got), Some(want)) => assert!((got - want).abs() < 1e-9),
            (None, None) => {}
            (got, want) => panic!("{input}: got {got:?}, want {want:?}"),
        }
    }
}
