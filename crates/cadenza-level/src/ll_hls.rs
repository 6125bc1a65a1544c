//! LL-HLS blocking-reload query parameters.

use cadenza_core::PushParams;
use url::Url;

/// Build the blocking playlist reload URL: the base URL with its query
/// stripped, then `_HLS_msn` (required), `_HLS_part` (requires msn),
/// `_HLS_push`, and `_HLS_skip=YES` when the server advertises delta
/// updates.
#[must_use]
pub fn build_blocking_reload_url(
    base: &Url,
    msn: u64,
    part: Option<u64>,
    push: Option<bool>,
    can_skip_until: f64,
) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("_HLS_msn", &msn.to_string());
        if let Some(part) = part {
            query.append_pair("_HLS_part", &part.to_string());
        }
        if let Some(push) = push {
            query.append_pair("_HLS_push", if push { "1" } else { "0" });
        }
        if can_skip_until > 0.0 {
            query.append_pair("_HLS_skip", "YES");
        }
    }
    url
}

/// Parse blocking-reload hints a server embedded in a playlist's own URL.
///
/// `_HLS_part` is meaningless without `_HLS_msn`, so a lone part parameter
/// yields nothing.
#[must_use]
pub fn parse_push_params(url: &Url) -> Option<PushParams> {
    let mut msn = None;
    let mut part = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "_HLS_msn" => msn = value.parse().ok(),
            "_HLS_part" => part = value.parse().ok(),
            _ => {}
        }
    }
    msn.map(|msn| PushParams { msn, part })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn msn_only() {
        let base = Url::parse("https://example.com/low/playlist.m3u8").unwrap();
        let url = build_blocking_reload_url(&base, 43, None, None, 0.0);
        assert_eq!(
            url.as_str(),
            "https://example.com/low/playlist.m3u8?_HLS_msn=43"
        );
    }

    #[test]
    fn full_parameter_set() {
        let base = Url::parse("https://example.com/p.m3u8?token=abc").unwrap();
        let url = build_blocking_reload_url(&base, 100, Some(2), Some(true), 12.0);
        assert_eq!(
            url.as_str(),
            "https://example.com/p.m3u8?_HLS_msn=100&_HLS_part=2&_HLS_push=1&_HLS_skip=YES"
        );
    }

    #[test]
    fn existing_query_is_stripped() {
        let base = Url::parse("https://example.com/p.m3u8?_HLS_msn=41&other=1").unwrap();
        let url = build_blocking_reload_url(&base, 42, None, None, 0.0);
        assert_eq!(url.query(), Some("_HLS_msn=42"));
    }

    #[rstest]
    #[case("https://e.com/p.m3u8?_HLS_msn=7", Some(7), None)]
    #[case("https://e.com/p.m3u8?_HLS_msn=7&_HLS_part=3&_HLS_push=1", Some(7), Some(3))]
    #[case("https://e.com/p.m3u8?_HLS_part=3", None, None)]
    #[case("https://e.com/p.m3u8", None, None)]
    fn push_param_parsing(
        #[case] url: &str,
        #[case] msn: Option<u64>,
        #[case] part: Option<u64>,
    ) {
        let parsed = parse_push_params(&Url::parse(url).unwrap());
        match msn {
            Some(msn) => {
                let push = parsed.unwrap();
                assert_eq!(push.msn, msn);
                assert_eq!(push.part, part);
            }
            None => assert!(parsed.is_none()),
        }
    }
}
