//! CEA-608 byte-pair extraction from A/53 user data.
//!
//! The decode of the 608 control stream (pop-on/roll-up state machines,
//! display memory) is an external collaborator behind [`Cea608Sink`]; this
//! module owns the byte-level extraction discipline and the timing handoff.

/// Consumer of extracted 608 byte pairs for one field.
pub trait Cea608Sink: Send {
    /// Deliver the pairs extracted from one user-data sample.
    fn add_data(&mut self, pts: f64, pairs: &[[u8; 2]]);

    /// Discard decode state; called across sequence-number discontinuities
    /// so stale timing cannot leak into new cues.
    fn reset(&mut self);
}

/// Byte pairs split per 608 field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub field1: Vec<[u8; 2]>,
    pub field2: Vec<[u8; 2]>,
}

/// Extract CEA-608 byte pairs from an A/53 `cc_data` payload.
///
/// Layout per sample: `byte0 & 0x1F` is the construct count, constructs
/// start at offset 2, each being `(flags, byte1, byte2)`. A construct is
/// kept when its valid bit is set, its type addresses a 608 field (0 or 1),
/// and the parity-stripped pair is not double-zero padding.
#[must_use]
pub fn extract_cea608(data: &[u8]) -> ExtractedFields {
    let mut fields = ExtractedFields::default();
    let Some(count) = data.first().map(|b| usize::from(b & 0x1F)) else {
        return fields;
    };

    let mut position = 2;
    for _ in 0..count {
        let Some(chunk) = data.get(position..position + 3) else {
            break;
        };
        let (tmp, b1, b2) = (chunk[0], chunk[1], chunk[2]);
        position += 3;

        let cc_valid = tmp & 0x04 != 0;
        let cc_type = tmp & 0x03;
        let pair = [b1 & 0x7F, b2 & 0x7F];
        if pair == [0, 0] {
            continue;
        }
        if cc_valid {
            match cc_type {
                0 => fields.field1.push(pair),
                1 => fields.field2.push(pair),
                _ => {}
            }
        }
    }
    fields
}

/// Default sink: batches the raw pair stream for an external 608 decoder to
/// drain.
#[derive(Debug, Default)]
pub struct CaptionByteStream {
    batches: Vec<(f64, Vec<[u8; 2]>)>,
}

impl CaptionByteStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand the accumulated batches to the decoder, clearing the stream.
    pub fn drain(&mut self) -> Vec<(f64, Vec<[u8; 2]>)> {
        std::mem::take(&mut self.batches)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl Cea608Sink for CaptionByteStream {
    fn add_data(&mut self, pts: f64, pairs: &[[u8; 2]]) {
        if !pairs.is_empty() {
            self.batches.push((pts, pairs.to_vec()));
        }
    }

    fn reset(&mut self) {
        self.batches.clear();
    }
}
