//! Minimal ISO-BMFF box tools.
//!
//! Just enough box walking for the pass-through path: locate `moov` track
//! configuration, read fragment decode times and durations, and rewrite
//! `tfdt` base times in place. Malformed boxes terminate the walk instead of
//! erroring, so a truncated tail never invalidates what was already parsed.

use std::{collections::HashMap, ops::Range};

use tracing::trace;

/// Track family a `trak` box declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Per-track configuration extracted from an init segment.
#[derive(Debug, Clone)]
pub struct InitTrack {
    pub id: u32,
    pub timescale: u32,
    pub kind: TrackKind,
    pub codec: Option<String>,
}

/// Parsed `moov` configuration, keyed by track id.
#[derive(Debug, Clone, Default)]
pub struct InitData {
    pub tracks: HashMap<u32, InitTrack>,
}

impl InitData {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[must_use]
    pub fn audio(&self) -> Option<&InitTrack> {
        self.tracks.values().find(|t| t.kind == TrackKind::Audio)
    }

    #[must_use]
    pub fn video(&self) -> Option<&InitTrack> {
        self.tracks.values().find(|t| t.kind == TrackKind::Video)
    }
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn read_u64(data: &[u8], at: usize) -> Option<u64> {
    Some(u64::from_be_bytes(data.get(at..at + 8)?.try_into().ok()?))
}

fn write_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_be_bytes());
}

fn write_u64(data: &mut [u8], at: usize, value: u64) {
    data[at..at + 8].copy_from_slice(&value.to_be_bytes());
}

/// Payload ranges (relative to `data`) of every direct child box named
/// `fourcc` inside `range`.
fn child_ranges(data: &[u8], range: Range<usize>, fourcc: &[u8; 4]) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    let mut at = range.start;
    while at + 8 <= range.end.min(data.len()) {
        let Some(size32) = read_u32(data, at) else {
            break;
        };
        let (size, header) = match size32 {
            0 => ((range.end - at) as u64, 8),
            1 => match read_u64(data, at + 8) {
                Some(large) => (large, 16),
                None => break,
            },
            n => (u64::from(n), 8),
        };
        if size < header as u64 {
            break;
        }
        let end = at.saturating_add(size as usize);
        if end > range.end {
            break;
        }
        if &data[at + 4..at + 8] == fourcc {
            found.push(at + header..end);
        }
        at = end;
    }
    found
}

/// Payload ranges of every box matching `path`, descending from the top
/// level of `data`.
fn find_ranges(data: &[u8], path: &[&[u8; 4]]) -> Vec<Range<usize>> {
    let mut current = vec![0..data.len()];
    for fourcc in path {
        let mut next = Vec::new();
        for range in current {
            next.extend(child_ranges(data, range, fourcc));
        }
        current = next;
    }
    current
}

/// Payload slices of every box matching `path`.
#[must_use]
pub fn find_box<'a>(data: &'a [u8], path: &[&[u8; 4]]) -> Vec<&'a [u8]> {
    find_ranges(data, path)
        .into_iter()
        .map(|r| &data[r])
        .collect()
}

/// Codec string from the first `stsd` sample entry.
fn stsd_codec(stsd: &[u8]) -> Option<String> {
    // version/flags + entry_count, then the first sample entry box.
    let entry_start = 8;
    let entry_size = read_u32(stsd, entry_start)? as usize;
    if entry_size < 16 || entry_start + entry_size > stsd.len() {
        return None;
    }
    let entry = &stsd[entry_start..entry_start + entry_size];
    let fourcc = &entry[4..8];
    let name = String::from_utf8_lossy(fourcc).trim().to_string();

    match fourcc {
        b"avc1" | b"avc3" => {
            // Children of a VisualSampleEntry start after the 78-byte fixed
            // part (8-byte SampleEntry + 70-byte visual fields).
            for avcc in child_ranges(entry, 86.min(entry.len())..entry.len(), b"avcC") {
                if let (Some(profile), Some(compat), Some(level)) = (
                    entry.get(avcc.start + 1),
                    entry.get(avcc.start + 2),
                    entry.get(avcc.start + 3),
                ) {
                    return Some(format!("{name}.{profile:02x}{compat:02x}{level:02x}"));
                }
            }
            Some(name)
        }
        b"mp4a" => {
            // Children of an AudioSampleEntry start after the 36-byte fixed
            // part (8-byte SampleEntry + 28 audio fields, header included).
            for esds in child_ranges(entry, 36.min(entry.len())..entry.len(), b"esds") {
                if let Some(codec) = esds_audio_codec(&entry[esds]) {
                    return Some(codec);
                }
            }
            Some(name)
        }
        _ => Some(name),
    }
}

/// `mp4a.40.<aot>` style codec from an `esds` payload.
fn esds_audio_codec(esds: &[u8]) -> Option<String> {
    // Scan for the DecoderConfigDescriptor (tag 0x04); the byte after its
    // variable-length size field is the object type indication.
    let mut at = 4; // version/flags
    while at < esds.len() {
        let tag = esds[at];
        at += 1;
        let mut size = 0usize;
        while at < esds.len() {
            let b = esds[at];
            at += 1;
            size = (size << 7) | usize::from(b & 0x7F);
            if b & 0x80 == 0 {
                break;
            }
        }
        if tag == 0x04 {
            let oti = *esds.get(at)?;
            if oti != 0x40 {
                return Some(format!("mp4a.{oti:02x}"));
            }
            // AAC: the audio object type lives in the first five bits of the
            // DecoderSpecificInfo (tag 0x05), 13 bytes into this descriptor.
            let mut inner = at + 13;
            while inner + 1 < esds.len() {
                let inner_tag = esds[inner];
                inner += 1;
                let mut inner_size = 0usize;
                while inner < esds.len() {
                    let b = esds[inner];
                    inner += 1;
                    inner_size = (inner_size << 7) | usize::from(b & 0x7F);
                    if b & 0x80 == 0 {
                        break;
                    }
                }
                if inner_tag == 0x05 {
                    let aot = esds.get(inner)? >> 3;
                    return Some(format!("mp4a.40.{aot}"));
                }
                inner += inner_size;
            }
            return Some("mp4a.40.2".to_string());
        }
        if tag != 0x03 {
            // Only the ES descriptor (0x03) nests further descriptors we
            // care about; skip everything else wholesale.
            at += size;
        } else {
            // ES_ID + flags, then nested descriptors follow inline.
            at += 3;
        }
    }
    None
}

/// Parse track configuration out of an init segment (or a self-initialising
/// fragment that carries its own `moov`).
#[must_use]
pub fn parse_init_segment(data: &[u8]) -> InitData {
    let mut init = InitData::default();
    for trak in find_box(data, &[b"moov", b"trak"]) {
        let Some(tkhd) = find_box(trak, &[b"tkhd"]).into_iter().next() else {
            continue;
        };
        let id_at = if tkhd.first() == Some(&1) { 20 } else { 12 };
        let Some(id) = read_u32(tkhd, id_at) else {
            continue;
        };

        let Some(mdia) = find_box(trak, &[b"mdia"]).into_iter().next() else {
            continue;
        };
        let Some(mdhd) = find_box(mdia, &[b"mdhd"]).into_iter().next() else {
            continue;
        };
        let ts_at = if mdhd.first() == Some(&1) { 20 } else { 12 };
        let Some(timescale) = read_u32(mdhd, ts_at).filter(|ts| *ts > 0) else {
            continue;
        };

        let Some(hdlr) = find_box(mdia, &[b"hdlr"]).into_iter().next() else {
            continue;
        };
        let kind = match hdlr.get(8..12) {
            Some(b"soun") => TrackKind::Audio,
            Some(b"vide") => TrackKind::Video,
            _ => continue,
        };

        let codec = find_box(mdia, &[b"minf", b"stbl", b"stsd"])
            .into_iter()
            .next()
            .and_then(stsd_codec);

        trace!(id, timescale, ?kind, ?codec, "init segment track");
        init.tracks.insert(
            id,
            InitTrack {
                id,
                timescale,
                kind,
                codec,
            },
        );
    }
    init
}

/// `tfhd` track id of a `traf` payload.
fn traf_track_id(traf: &[u8]) -> Option<u32> {
    let tfhd = find_box(traf, &[b"tfhd"]).into_iter().next()?;
    read_u32(tfhd, 4)
}

/// `tfdt` base media decode time of a `traf` payload, in track timescale
/// units.
fn traf_base_time(traf: &[u8]) -> Option<u64> {
    let tfdt = find_box(traf, &[b"tfdt"]).into_iter().next()?;
    if tfdt.first() == Some(&1) {
        read_u64(tfdt, 4)
    } else {
        read_u32(tfdt, 4).map(u64::from)
    }
}

/// Earliest track decode time of the fragment, in seconds.
#[must_use]
pub fn get_start_dts(init: &InitData, data: &[u8]) -> Option<f64> {
    let mut start: Option<f64> = None;
    for traf in find_box(data, &[b"moof", b"traf"]) {
        let Some(track) = traf_track_id(traf).and_then(|id| init.tracks.get(&id)) else {
            continue;
        };
        let Some(base) = traf_base_time(traf) else {
            continue;
        };
        let dts = base as f64 / f64::from(track.timescale);
        start = Some(start.map_or(dts, |s| s.min(dts)));
    }
    start
}

/// Sum of `trun` sample durations for one `traf`, in timescale units.
fn traf_duration(traf: &[u8]) -> Option<u64> {
    let tfhd = find_box(traf, &[b"tfhd"]).into_iter().next()?;
    let tfhd_flags = read_u32(tfhd, 0)? & 0x00FF_FFFF;
    let mut default_duration = None;
    if tfhd_flags & 0x08 != 0 {
        let mut at = 8;
        if tfhd_flags & 0x01 != 0 {
            at += 8; // base_data_offset
        }
        if tfhd_flags & 0x02 != 0 {
            at += 4; // sample_description_index
        }
        default_duration = read_u32(tfhd, at);
    }

    let mut total = 0u64;
    for trun in find_box(traf, &[b"trun"]) {
        let flags = read_u32(trun, 0)? & 0x00FF_FFFF;
        let sample_count = read_u32(trun, 4)?;
        let mut at = 8;
        if flags & 0x01 != 0 {
            at += 4; // data_offset
        }
        if flags & 0x04 != 0 {
            at += 4; // first_sample_flags
        }
        if flags & 0x100 == 0 {
            total += u64::from(default_duration?) * u64::from(sample_count);
            continue;
        }
        let mut entry_size = 4;
        for bit in [0x200, 0x400, 0x800] {
            if flags & bit != 0 {
                entry_size += 4;
            }
        }
        for i in 0..sample_count as usize {
            total += u64::from(read_u32(trun, at + i * entry_size)?);
        }
    }
    Some(total)
}

/// Fragment duration in seconds: the longest per-track `trun` duration,
/// falling back to `sidx` subsegment durations.
#[must_use]
pub fn get_duration(data: &[u8], init: &InitData) -> f64 {
    let mut duration = 0f64;
    for traf in find_box(data, &[b"moof", b"traf"]) {
        let Some(track) = traf_track_id(traf).and_then(|id| init.tracks.get(&id)) else {
            continue;
        };
        if let Some(units) = traf_duration(traf) {
            duration = duration.max(units as f64 / f64::from(track.timescale));
        }
    }
    if duration > 0.0 {
        return duration;
    }
    sidx_duration(data).unwrap_or(0.0)
}

fn sidx_duration(data: &[u8]) -> Option<f64> {
    let sidx = find_box(data, &[b"sidx"]).into_iter().next()?;
    let version = *sidx.first()?;
    let timescale = read_u32(sidx, 8).filter(|ts| *ts > 0)?;
    let refs_at = if version == 0 { 12 + 8 } else { 12 + 16 };
    let count = read_u16(sidx, refs_at + 2)?;
    let mut total = 0u64;
    for i in 0..count as usize {
        total += u64::from(read_u32(sidx, refs_at + 4 + i * 12 + 4)?);
    }
    Some(total as f64 / f64::from(timescale))
}

/// Shift every track's `tfdt` base media decode time back by `offset_secs`,
/// rewriting the fragment in place. Times saturate at zero.
pub fn offset_start_dts(init: &InitData, data: &mut [u8], offset_secs: f64) {
    let traf_ranges = find_ranges(data, &[b"moof", b"traf"]);
    for traf_range in traf_ranges {
        let traf = &data[traf_range.clone()];
        let Some(track) = traf_track_id(traf).and_then(|id| init.tracks.get(&id)) else {
            continue;
        };
        let offset_units = (offset_secs * f64::from(track.timescale)).round();
        let Some(tfdt_rel) = child_ranges(traf, 0..traf.len(), b"tfdt").into_iter().next()
        else {
            continue;
        };
        let tfdt_at = traf_range.start + tfdt_rel.start;
        let version1 = data.get(tfdt_at) == Some(&1);
        if version1 {
            let Some(base) = read_u64(data, tfdt_at + 4) else {
                continue;
            };
            let shifted = (base as f64 - offset_units).max(0.0) as u64;
            write_u64(data, tfdt_at + 4, shifted);
        } else {
            let Some(base) = read_u32(data, tfdt_at + 4) else {
                continue;
            };
            let shifted = (f64::from(base) - offset_units).max(0.0) as u32;
            write_u32(data, tfdt_at + 4, shifted);
        }
    }
}

#[cfg(test)]
pub(crate) mod testbox {
    //! Synthetic box builders shared by the remux tests.

    pub fn full_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + payload.len());
        out.extend_from_slice(&(8 + payload.len() as u32).to_be_bytes());
        out.extend_from_slice(fourcc);
        out.extend_from_slice(payload);
        out
    }

    pub fn container(fourcc: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
        let payload: Vec<u8> = children.concat();
        full_box(fourcc, &payload)
    }

    pub fn tkhd(track_id: u32) -> Vec<u8> {
        let mut payload = vec![0u8; 84];
        payload[12..16].copy_from_slice(&track_id.to_be_bytes());
        full_box(b"tkhd", &payload)
    }

    pub fn mdhd(timescale: u32) -> Vec<u8> {
        let mut payload = vec![0u8; 24];
        payload[12..16].copy_from_slice(&timescale.to_be_bytes());
        full_box(b"mdhd", &payload)
    }

    pub fn hdlr(handler: &[u8; 4]) -> Vec<u8> {
        let mut payload = vec![0u8; 24];
        payload[8..12].copy_from_slice(handler);
        full_box(b"hdlr", &payload)
    }

    pub fn tfhd(track_id: u32) -> Vec<u8> {
        let mut payload = vec![0u8; 8];
        payload[4..8].copy_from_slice(&track_id.to_be_bytes());
        full_box(b"tfhd", &payload)
    }

    pub fn tfdt_v1(base: u64) -> Vec<u8> {
        let mut payload = vec![0u8; 12];
        payload[0] = 1;
        payload[4..12].copy_from_slice(&base.to_be_bytes());
        full_box(b"tfdt", &payload)
    }

    /// `trun` with per-sample durations only (flags 0x000100).
    pub fn trun(durations: &[u32]) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x0000_0100u32.to_be_bytes());
        payload.extend_from_slice(&(durations.len() as u32).to_be_bytes());
        for d in durations {
            payload.extend_from_slice(&d.to_be_bytes());
        }
        full_box(b"trun", &payload)
    }

    pub fn trak(track_id: u32, timescale: u32, handler: &[u8; 4]) -> Vec<u8> {
        container(
            b"trak",
            &[
                tkhd(track_id),
                container(b"mdia", &[mdhd(timescale), hdlr(handler)]),
            ],
        )
    }

    pub fn moov(traks: &[Vec<u8>]) -> Vec<u8> {
        container(b"moov", traks)
    }

    pub fn fragment(track_id: u32, base: u64, durations: &[u32]) -> Vec<u8> {
        let traf = container(b"traf", &[tfhd(track_id), tfdt_v1(base), trun(durations)]);
        let moof = container(b"moof", &[traf]);
        let mdat = full_box(b"mdat", &[0u8; 16]);
        [moof, mdat].concat()
    }
}

#[cfg(test)]
mod tests {
    use super::{testbox::*, *};

    #[test]
    fn parses_tracks_from_moov() {
        let data = moov(&[trak(1, 90_000, b"vide"), trak(2, 48_000, b"soun")]);
        let init = parse_init_segment(&data);
        assert_eq!(init.tracks.len(), 2);
        assert_eq!(init.video().unwrap().timescale, 90_000);
        assert_eq!(init.audio().unwrap().timescale, 48_000);
    }

    #[test]
    fn empty_payload_parses_to_no_tracks() {
        assert!(parse_init_segment(&[]).is_empty());
        assert!(parse_init_segment(&full_box(b"mdat", &[1, 2, 3])).is_empty());
    }

    #[test]
    fn start_dts_is_earliest_track_time() {
        let init = parse_init_segment(&moov(&[
            trak(1, 90_000, b"vide"),
            trak(2, 1_000, b"soun"),
        ]));
        let frag = [
            container(
                b"moof",
                &[
                    container(b"traf", &[tfhd(1), tfdt_v1(180_000), trun(&[3_000])]),
                    container(b"traf", &[tfhd(2), tfdt_v1(1_500), trun(&[100])]),
                ],
            ),
            full_box(b"mdat", &[0u8; 8]),
        ]
        .concat();

        // video at 2.0 s, audio at 1.5 s
        let start = get_start_dts(&init, &frag).unwrap();
        assert!((start - 1.5).abs() < 1e-9);
    }

    #[test]
    fn duration_is_longest_track_sum() {
        let init = parse_init_segment(&moov(&[trak(1, 90_000, b"vide")]));
        let frag = fragment(1, 0, &[90_000, 90_000, 45_000]);
        let duration = get_duration(&frag, &init);
        assert!((duration - 2.5).abs() < 1e-9);
    }

    #[test]
    fn offset_rewrites_tfdt_in_place() {
        let init = parse_init_segment(&moov(&[trak(1, 90_000, b"vide")]));
        let mut frag = fragment(1, 900_000, &[90_000]);

        offset_start_dts(&init, &mut frag, 4.0);
        let start = get_start_dts(&init, &frag).unwrap();
        assert!((start - 6.0).abs() < 1e-9);

        // Shifting past zero saturates instead of wrapping.
        offset_start_dts(&init, &mut frag, 100.0);
        assert_eq!(get_start_dts(&init, &frag).unwrap(), 0.0);
    }

    #[test]
    fn truncated_box_stops_walk_without_panic() {
        let mut data = moov(&[trak(1, 90_000, b"vide")]);
        data.truncate(data.len() - 10);
        // Whatever parses before the truncation point is fine; no panic.
        let _ = parse_init_segment(&data);
    }
}
