//! Live playlist reload interval.

use std::time::Duration;

use cadenza_core::{LevelDetails, LoadStats};

/// Floor for any computed reload interval.
pub const MIN_RELOAD_INTERVAL: Duration = Duration::from_millis(100);

/// Head start subtracted from LL-HLS blocking reloads so the request is in
/// flight when the server's next part lands.
pub const LOW_LATENCY_HEAD_START: Duration = Duration::from_millis(100);

/// Interval until the next live playlist reload.
///
/// Base interval is the target duration, halved when the last reload brought
/// nothing new (the edge is about to move). Time already spent loading the
/// playlist is credited against the interval, bounded so a slow load can
/// never collapse the interval below half its base.
#[must_use]
pub fn compute_reload_interval(details: &LevelDetails, stats: Option<&LoadStats>) -> Duration {
    let mut secs = details.target_duration;
    if !details.updated {
        secs /= 2.0;
    }
    if let Some(stats) = stats {
        secs = (secs - stats.load_duration().as_secs_f64()).max(secs / 2.0);
    }
    Duration::from_secs_f64(secs).max(MIN_RELOAD_INTERVAL)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use url::Url;

    use super::*;

    fn details(target_duration: f64, updated: bool) -> LevelDetails {
        LevelDetails {
            live: true,
            start_sn: 0,
            end_sn: 10,
            start_cc: 0,
            end_cc: 0,
            end_part: None,
            target_duration,
            total_duration: 0.0,
            fragments: Vec::new(),
            init_segment: None,
            playlist_type: None,
            server_control: None,
            part_target: None,
            updated,
            availability_delay: 0.0,
            url: Url::parse("https://example.com/l.m3u8").unwrap(),
            push: None,
        }
    }

    #[test]
    fn updated_playlist_reloads_at_target_duration() {
        let interval = compute_reload_interval(&details(6.0, true), None);
        assert_eq!(interval, Duration::from_secs(6));
    }

    #[test]
    fn missed_update_halves_the_interval() {
        let interval = compute_reload_interval(&details(6.0, false), None);
        assert_eq!(interval, Duration::from_secs(3));
    }

    #[test]
    fn load_duration_is_credited_with_a_floor() {
        let now = Instant::now();
        let stats = LoadStats {
            trequest: now,
            tfirst: now + Duration::from_secs(1),
            tload: now + Duration::from_secs(5),
            loaded_bytes: 1024,
        };
        // 6s target minus 5s load time would leave 1s; floored at half.
        let interval = compute_reload_interval(&details(6.0, true), Some(&stats));
        assert_eq!(interval, Duration::from_secs(3));
    }

    #[test]
    fn interval_never_drops_below_minimum() {
        let interval = compute_reload_interval(&details(0.0, false), None);
        assert_eq!(interval, MIN_RELOAD_INTERVAL);
    }
}
