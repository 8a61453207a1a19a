use serde::{Deserialize, Serialize};

/// Subtitled vs dubbed variant of an episode list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Sub,
    Dub,
}

impl Track {
    pub fn label(self) -> &'static str {
        match self {
            Track::Sub => "Sub",
            Track::Dub => "Dub",
        }
    }
}

/// Upstream scraping source for episode lists and streams.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gogoanime,
    Zoro,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gogoanime => "gogoanime",
            Provider::Zoro => "zoro",
        }
    }

    /// The one provider not just tried; the fallback set is exactly two.
    pub fn other(self) -> Provider {
        match self {
            Provider::Gogoanime => Provider::Zoro,
            Provider::Zoro => Provider::Gogoanime,
        }
    }

    /// Known working delivery servers per provider, in preference order.
    pub fn servers(self) -> &'static [&'static str] {
        match self {
            Provider::Gogoanime => &["vidstreaming", "gogocdn", "streamsb"],
            Provider::Zoro => &["vidcloud", "streamsb", "vidstreaming"],
        }
    }

    pub fn parse(value: &str) -> Option<Provider> {
        match value.to_lowercase().as_str() {
            "gogoanime" => Some(Provider::Gogoanime),
            "zoro" => Some(Provider::Zoro),
            _ => None,
        }
    }
}

/// The three catalog name variants; any one of them may be absent, but a
/// resolved title always carries at least one.
#[derive(Debug, Clone, Default)]
pub struct TitleName {
    pub preferred: Option<String>,
    pub english: Option<String>,
    pub romanized: Option<String>,
}

impl TitleName {
    pub fn is_empty(&self) -> bool {
        self.preferred.is_none() && self.english.is_none() && self.romanized.is_none()
    }

    /// Best displayable name: preferred, then english, then romanized.
    pub fn display(&self) -> &str {
        self.preferred
            .as_deref()
            .or(self.english.as_deref())
            .or(self.romanized.as_deref())
            .unwrap_or("Unknown Title")
    }
}

/// An externally-hosted streaming link carried by the catalog response.
#[derive(Debug, Clone)]
pub struct StreamingLink {
    pub label: String,
    pub url: String,
}

/// Canonical catalog metadata for one anime title.
#[derive(Debug, Clone)]
pub struct Title {
    /// The catalog service's primary numeric id.
    pub id: i64,
    /// Cross-reference id used to correlate with the meta service.
    pub mal_id: Option<i64>,
    pub name: TitleName,
    pub synopsis: Option<String>,
    pub genres: Vec<String>,
    pub banner_image: Option<String>,
    pub cover_image: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub episodes: Option<u32>,
    pub average_score: Option<u32>,
    pub popularity: Option<u64>,
    pub streaming_links: Vec<StreamingLink>,
}

/// One playable episode from a provider, past normalization.
///
/// `external_url` is set only for records synthesized from the catalog's
/// externally-hosted links; those bypass stream resolution entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    pub id: String,
    pub ordinal: u32,
    pub title: Option<String>,
    pub external_url: Option<String>,
}

/// Ordered episode sequence for one (title, provider, track) triple.
pub type EpisodeList = Vec<EpisodeRecord>;

/// Episode lists for both tracks from one provider, plus the derived
/// per-track title slugs.
#[derive(Debug, Clone, Default)]
pub struct ProviderResult {
    pub provider: Option<&'static str>,
    pub sub: EpisodeList,
    pub dub: EpisodeList,
    pub sub_slug: Option<String>,
    pub dub_slug: Option<String>,
}

impl ProviderResult {
    /// Emptiness triggers the next rung of the provider fallback ladder.
    pub fn is_empty(&self) -> bool {
        self.sub.is_empty() && self.dub.is_empty()
    }
}

/// One candidate stream from the meta service's watch endpoint.
#[derive(Debug, Clone)]
pub struct StreamSource {
    pub url: String,
    pub is_hls: bool,
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Hls,
    Progressive,
}

impl StreamKind {
    pub fn label(self) -> &'static str {
        match self {
            StreamKind::Hls => "HLS",
            StreamKind::Progressive => "MP4",
        }
    }
}

/// The final concrete playable stream chosen for one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    pub url: String,
    pub kind: StreamKind,
    pub download: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_other_flips_between_the_two() {
        assert_eq!(Provider::Gogoanime.other(), Provider::Zoro);
        assert_eq!(Provider::Zoro.other(), Provider::Gogoanime);
    }

    #[test]
    fn title_name_display_prefers_in_order() {
        let name = TitleName {
            preferred: None,
            english: Some(String::from("Fullmetal Alchemist: Brotherhood")),
            romanized: Some(String::from("Hagane no Renkinjutsushi")),
        };
        assert_eq!(name.display(), "Fullmetal Alchemist: Brotherhood");
        assert!(!name.is_empty());
        assert!(TitleName::default().is_empty());
    }

    #[test]
    fn provider_result_empty_requires_both_tracks_empty() {
        let mut result = ProviderResult::default();
        assert!(result.is_empty());
        result.dub.push(EpisodeRecord {
            id: String::from("x-episode-1"),
            ordinal: 1,
            title: None,
            external_url: None,
        });
        assert!(!result.is_empty());
    }
}
