//! Pure episode normalization: no I/O, no provider knowledge beyond the
//! shapes the meta service hands back.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{EpisodeList, EpisodeRecord, StreamingLink};

/// Marker separating a provider's title slug from the episode suffix.
const EPISODE_MARKER: &str = "-episode-";

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid literal regex"));

/// One episode as the meta service returns it. Providers disagree on which
/// field carries the number and whether it is a JSON number or a string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEpisode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub number: Option<Value>,
    #[serde(default)]
    pub episode: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Converts heterogeneous provider records into an ordered, numbered list.
///
/// Ordinal precedence: explicit `number`, then explicit `episode`, then the
/// first integer embedded in the display title. Records that yield no
/// ordinal, or an ordinal of zero, are excluded. Sort is stable, so
/// provider order breaks ties.
pub fn normalize(raw: Vec<RawEpisode>) -> EpisodeList {
    let mut records: Vec<EpisodeRecord> = raw
        .into_iter()
        .filter_map(|episode| {
            let ordinal = resolve_ordinal(&episode)?;
            Some(EpisodeRecord {
                id: episode.id.unwrap_or_default(),
                ordinal,
                title: episode.title,
                external_url: None,
            })
        })
        .collect();
    records.sort_by_key(|record| record.ordinal);
    records
}

fn resolve_ordinal(episode: &RawEpisode) -> Option<u32> {
    let direct = episode
        .number
        .as_ref()
        .and_then(numeric_field)
        .or_else(|| episode.episode.as_ref().and_then(numeric_field))
        .or_else(|| episode.title.as_deref().and_then(first_integer));
    direct.filter(|&n| n >= 1)
}

fn numeric_field(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// First integer embedded in free text, e.g. `"Episode 12 - Title"` -> 12.
pub fn first_integer(text: &str) -> Option<u32> {
    FIRST_INTEGER
        .find(text)
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Provider-scoped title slug: the first record's identifier truncated at
/// the episode marker, or used verbatim when the marker is absent.
pub fn derive_slug(list: &EpisodeList) -> Option<String> {
    let first_id = list.first().map(|record| record.id.as_str())?;
    if first_id.is_empty() {
        return None;
    }
    match first_id.find(EPISODE_MARKER) {
        Some(index) => Some(first_id[..index].to_string()),
        None => Some(first_id.to_string()),
    }
}

/// Last-resort episode list built from the catalog's externally-hosted
/// streaming links, used when every provider came back empty. These records
/// carry the external URL and bypass stream resolution; the player opens
/// them directly.
pub fn synthesize_external(links: &[StreamingLink]) -> EpisodeList {
    let mut records: Vec<EpisodeRecord> = links
        .iter()
        .enumerate()
        .map(|(index, link)| EpisodeRecord {
            id: link.url.clone(),
            ordinal: first_integer(&link.label).unwrap_or(index as u32 + 1),
            title: Some(link.label.clone()),
            external_url: Some(link.url.clone()),
        })
        .collect();
    records.sort_by_key(|record| record.ordinal);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: &str, number: Option<Value>, episode: Option<Value>, title: Option<&str>) -> RawEpisode {
        RawEpisode {
            id: Some(id.to_string()),
            number,
            episode,
            title: title.map(str::to_string),
        }
    }

    #[test]
    fn output_is_sorted_ascending_with_ordinals_resolved() {
        let input = vec![
            raw("fma-episode-3", Some(json!(3)), None, None),
            raw("fma-episode-1", None, Some(json!("1")), None),
            raw("fma-episode-2", None, None, Some("Episode 2: Day of the Beginning")),
        ];
        let list = normalize(input);
        let ordinals: Vec<u32> = list.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(list[0].id, "fma-episode-1");
    }

    #[test]
    fn records_without_an_extractable_ordinal_are_dropped() {
        let input = vec![
            raw("a", None, None, Some("Special: Recap")),
            raw("b", Some(json!(2)), None, None),
            raw("c", None, None, None),
            raw("d", Some(json!(0)), None, None),
        ];
        let list = normalize(input);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "b");
        assert!(list.iter().all(|r| r.ordinal >= 1));
    }

    #[test]
    fn explicit_number_wins_over_title_integer() {
        let input = vec![raw("x", Some(json!(5)), None, Some("Episode 9"))];
        assert_eq!(normalize(input)[0].ordinal, 5);
    }

    #[test]
    fn ties_keep_provider_order() {
        let input = vec![
            raw("first", Some(json!(1)), None, None),
            raw("second", Some(json!(1)), None, None),
        ];
        let list = normalize(input);
        assert_eq!(list[0].id, "first");
        assert_eq!(list[1].id, "second");
    }

    #[test]
    fn slug_truncates_at_marker() {
        let list = normalize(vec![raw("fma-brotherhood-episode-1", Some(json!(1)), None, None)]);
        assert_eq!(derive_slug(&list).as_deref(), Some("fma-brotherhood"));
    }

    #[test]
    fn slug_without_marker_is_verbatim() {
        let list = normalize(vec![raw("fma$12345", Some(json!(1)), None, None)]);
        assert_eq!(derive_slug(&list).as_deref(), Some("fma$12345"));
    }

    #[test]
    fn slug_of_empty_list_is_none() {
        assert_eq!(derive_slug(&Vec::new()), None);
    }

    #[test]
    fn external_links_become_numbered_records() {
        let links = vec![
            StreamingLink {
                label: String::from("Episode 3 - The First Day"),
                url: String::from("https://ext.example/3"),
            },
            StreamingLink {
                label: String::from("Opening Special"),
                url: String::from("https://ext.example/sp"),
            },
        ];
        let list = synthesize_external(&links);
        // No embedded integer in the second label: its position (2) is used,
        // which sorts it ahead of the labeled episode 3.
        assert_eq!(list[0].ordinal, 2);
        assert_eq!(list[0].title.as_deref(), Some("Opening Special"));
        assert_eq!(list[1].ordinal, 3);
        assert!(list.iter().all(|r| r.external_url.is_some()));
    }
}
