//! Stream-source selection: one deterministic preference order over the
//! candidates the meta service hands back for an episode.

use crate::types::{ResolvedStream, StreamKind, StreamSource};

const HLS_MARKER: &str = ".m3u8";

/// Picks one concrete stream from the candidates, first match wins:
///
/// 1. a candidate labeled with the default quality tier;
/// 2. a candidate flagged HLS;
/// 3. any candidate with a non-empty URL;
/// 4. a download URL whose extension marks a playable container.
///
/// Returns `None` when no rule matches; the caller surfaces that as a
/// no-playable-source failure and must not hand anything to the player.
pub fn select_best(candidates: &[StreamSource], download: Option<&str>) -> Option<ResolvedStream> {
    let chosen = candidates
        .iter()
        .find(|source| source.quality.as_deref() == Some("default") && !source.url.is_empty())
        .or_else(|| candidates.iter().find(|s| s.is_hls && !s.url.is_empty()))
        .or_else(|| candidates.iter().find(|s| !s.url.is_empty()));

    if let Some(source) = chosen {
        let kind = if source.is_hls || source.url.contains(HLS_MARKER) {
            StreamKind::Hls
        } else {
            StreamKind::Progressive
        };
        return Some(ResolvedStream {
            url: source.url.clone(),
            kind,
            download: download.map(str::to_string),
        });
    }

    let fallback = download.filter(|d| d.ends_with(".mp4") || d.contains(HLS_MARKER))?;
    let kind = if fallback.contains(HLS_MARKER) {
        StreamKind::Hls
    } else {
        StreamKind::Progressive
    };
    Some(ResolvedStream {
        url: fallback.to_string(),
        kind,
        download: Some(fallback.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str, is_hls: bool, quality: Option<&str>) -> StreamSource {
        StreamSource {
            url: url.to_string(),
            is_hls,
            quality: quality.map(str::to_string),
        }
    }

    #[test]
    fn default_quality_beats_every_other_tier() {
        let candidates = vec![
            source("https://x/plain.mp4", false, Some("720p")),
            source("https://x/hls.m3u8", true, Some("1080p")),
            source("https://x/default.m3u8", false, Some("default")),
        ];
        let resolved = select_best(&candidates, Some("https://x/dl.mp4")).unwrap();
        assert_eq!(resolved.url, "https://x/default.m3u8");
        // Not flagged HLS, but the manifest marker in the URL decides.
        assert_eq!(resolved.kind, StreamKind::Hls);
    }

    #[test]
    fn hls_flag_beats_plain_candidates() {
        let candidates = vec![
            source("https://x/plain.mp4", false, Some("720p")),
            source("https://x/hls", true, Some("1080p")),
        ];
        let resolved = select_best(&candidates, None).unwrap();
        assert_eq!(resolved.url, "https://x/hls");
        assert_eq!(resolved.kind, StreamKind::Hls);
    }

    #[test]
    fn any_non_empty_url_is_the_third_tier() {
        let candidates = vec![
            source("", true, Some("default")),
            source("https://x/only.mp4", false, None),
        ];
        let resolved = select_best(&candidates, None).unwrap();
        assert_eq!(resolved.url, "https://x/only.mp4");
        assert_eq!(resolved.kind, StreamKind::Progressive);
    }

    #[test]
    fn playable_download_is_the_last_resort() {
        let resolved = select_best(&[], Some("https://x/full.mp4")).unwrap();
        assert_eq!(resolved.url, "https://x/full.mp4");
        assert_eq!(resolved.kind, StreamKind::Progressive);
        assert_eq!(resolved.download.as_deref(), Some("https://x/full.mp4"));

        let hls = select_best(&[], Some("https://x/master.m3u8?token=1")).unwrap();
        assert_eq!(hls.kind, StreamKind::Hls);
    }

    #[test]
    fn unplayable_download_yields_none() {
        assert_eq!(select_best(&[], Some("https://x/page.html")), None);
        assert_eq!(select_best(&[], None), None);
        assert_eq!(select_best(&[source("", true, Some("default"))], None), None);
    }

    #[test]
    fn end_to_end_scenario_single_default_source() {
        let candidates = vec![source("https://x/1.m3u8", false, Some("default"))];
        let resolved = select_best(&candidates, None).unwrap();
        assert_eq!(
            resolved,
            ResolvedStream {
                url: String::from("https://x/1.m3u8"),
                kind: StreamKind::Hls,
                download: None,
            }
        );
    }
}
