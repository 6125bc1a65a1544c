//! Per-discontinuity synchronisation tables.

use std::collections::HashMap;

/// Initial-PTS table: discontinuity counter to the PTS of the first main
/// track sample of that discontinuity, in 90 kHz ticks.
///
/// Populated lazily as the demuxer announces PTS anchors. All subtitle
/// parsing for a discontinuity is gated until its entry exists.
#[derive(Debug, Clone, Default)]
pub struct InitPtsTable {
    map: HashMap<u32, i64>,
}

impl InitPtsTable {
    #[must_use]
    pub fn get(&self, cc: u32) -> Option<i64> {
        self.map.get(&cc).copied()
    }

    #[must_use]
    pub fn has(&self, cc: u32) -> bool {
        self.map.contains_key(&cc)
    }

    /// Whether no discontinuity has a known anchor yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn set(&mut self, cc: u32, pts: i64) {
        self.map.insert(cc, pts);
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// One entry of the VTT continuity chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VttCc {
    /// Presentation start of the first subtitle fragment seen for this
    /// discontinuity.
    pub start: f64,
    /// Discontinuity that preceded this one, `None` for the chain root.
    pub prev_cc: Option<u32>,
    /// Freshly inserted and not yet consumed by a parser.
    pub new: bool,
}

/// VTT continuity table: chains subtitle timelines across discontinuities so
/// cue timestamps stay monotonic.
#[derive(Debug, Clone)]
pub struct VttCcTable {
    map: HashMap<u32, VttCc>,
    current_prev_cc: Option<u32>,
}

impl VttCcTable {
    #[must_use]
    pub fn new() -> Self {
        // Discontinuity 0 is pre-seeded as the chain root.
        let mut map = HashMap::new();
        map.insert(
            0,
            VttCc {
                start: 0.0,
                prev_cc: None,
                new: false,
            },
        );
        Self {
            map,
            current_prev_cc: Some(0),
        }
    }

    /// Populate the entry for `cc` if absent, chaining it behind the most
    /// recently seen discontinuity.
    pub fn ensure(&mut self, cc: u32, frag_start: f64) {
        if self.map.contains_key(&cc) {
            return;
        }
        self.map.insert(
            cc,
            VttCc {
                start: frag_start,
                prev_cc: self.current_prev_cc,
                new: true,
            },
        );
        self.current_prev_cc = Some(cc);
    }

    #[must_use]
    pub fn get(&self, cc: u32) -> Option<&VttCc> {
        self.map.get(&cc)
    }

    /// Presentation start of a discontinuity, 0 when unknown.
    #[must_use]
    pub fn start_of(&self, cc: u32) -> f64 {
        self.map.get(&cc).map_or(0.0, |e| e.start)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for VttCcTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_pts_table_gates_on_presence() {
        let mut table = InitPtsTable::default();
        assert!(table.is_empty());
        assert!(!table.has(0));

        table.set(0, 90_000);
        assert!(table.has(0));
        assert_eq!(table.get(0), Some(90_000));
        assert!(!table.has(1));
    }

    #[test]
    fn vtt_cc_chain_links_discontinuities() {
        let mut table = VttCcTable::new();
        table.ensure(1, 10.0);
        table.ensure(3, 30.0);

        let one = table.get(1).unwrap();
        assert_eq!(one.prev_cc, Some(0));
        assert_eq!(one.start, 10.0);
        assert!(one.new);

        let three = table.get(3).unwrap();
        assert_eq!(three.prev_cc, Some(1));
        assert_eq!(three.start, 30.0);
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut table = VttCcTable::new();
        table.ensure(1, 10.0);
        table.ensure(1, 99.0);
        assert_eq!(table.start_of(1), 10.0);
    }
}
