//! Catalog gateway: fixed GraphQL queries against the AniList endpoint,
//! mapped into the crate's `Title` model.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::error::ApiError;
use crate::history::WatchEntry;
use crate::placeholders;
use crate::transport::{HttpTransport, RetryPolicy, Transport};
use crate::types::{StreamingLink, Title, TitleName};

pub const ANILIST_ENDPOINT: &str = "https://graphql.anilist.co";

/// Free-text search and category pages share one fixed page size.
const PAGE_SIZE: u32 = 100;

const MEDIA_FIELDS: &str = r#"
    id
    idMal
    title {
      romaji
      english
      userPreferred
    }
    status
    genres
    description
    startDate { year month day }
    endDate { year month day }
    averageScore
    popularity
    favourites
    episodes
    bannerImage
    coverImage { extraLarge large }
    streamingEpisodes { title url }
"#;

/// The six sort criteria the category listings are parameterized by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySort {
    Trending,
    Airing,
    Popularity,
    Score,
    Favourites,
    Movies,
}

impl CategorySort {
    pub fn parse(value: &str) -> Option<CategorySort> {
        match value.to_lowercase().as_str() {
            "trending" => Some(CategorySort::Trending),
            "airing" => Some(CategorySort::Airing),
            "popular" | "popularity" => Some(CategorySort::Popularity),
            "top" | "score" => Some(CategorySort::Score),
            "favourite" | "favorites" | "favourites" => Some(CategorySort::Favourites),
            "movie" | "movies" => Some(CategorySort::Movies),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CategorySort::Trending => "Trending Now",
            CategorySort::Airing => "Top Airing",
            CategorySort::Popularity => "All Time Popular",
            CategorySort::Score => "Top Rated",
            CategorySort::Favourites => "Most Favourited",
            CategorySort::Movies => "Popular Movies",
        }
    }

    fn media_arguments(self) -> &'static str {
        match self {
            CategorySort::Trending => "sort: TRENDING_DESC, type: ANIME",
            CategorySort::Airing => "sort: TRENDING_DESC, status: RELEASING, type: ANIME",
            CategorySort::Popularity => "sort: POPULARITY_DESC, type: ANIME",
            CategorySort::Score => "sort: SCORE_DESC, type: ANIME",
            CategorySort::Favourites => "sort: FAVOURITES_DESC, type: ANIME",
            CategorySort::Movies => "sort: POPULARITY_DESC, type: ANIME, format: MOVIE",
        }
    }
}

pub struct CatalogClient<T: Transport> {
    transport: T,
    endpoint: String,
}

impl CatalogClient<HttpTransport> {
    pub fn new() -> Result<Self, ApiError> {
        let transport = HttpTransport::new(RetryPolicy::catalog())?;
        Ok(Self::with_transport(transport, ANILIST_ENDPOINT))
    }
}

impl<T: Transport> CatalogClient<T> {
    pub fn with_transport(transport: T, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    /// Detail-page lookup by the cross-reference (MAL) identifier.
    pub async fn find_by_id(&self, mal_id: i64) -> Result<Title, ApiError> {
        let query = format!(
            "query($id: Int) {{ Media(idMal: $id, type: ANIME) {{ {MEDIA_FIELDS} }} }}"
        );
        self.find_one(&query, mal_id).await
    }

    /// Lookup by the catalog's own primary identifier.
    pub async fn find_by_anilist_id(&self, id: i64) -> Result<Title, ApiError> {
        let query = format!("query($id: Int) {{ Media(id: $id, type: ANIME) {{ {MEDIA_FIELDS} }} }}");
        self.find_one(&query, id).await
    }

    async fn find_one(&self, query: &str, id: i64) -> Result<Title, ApiError> {
        let body = json!({ "query": query, "variables": { "id": id } });
        let response = self.transport.post_json(&self.endpoint, &body).await?;
        let envelope: MediaEnvelope = parse(response)?;
        let media = envelope
            .data
            .and_then(|data| data.media)
            .ok_or(ApiError::NotFound)?;
        let title = media.into_title();
        // A title with no name at all is unusable downstream.
        if title.name.is_empty() {
            return Err(ApiError::NotFound);
        }
        Ok(title)
    }

    pub async fn search(&self, text: &str) -> Result<Vec<Title>, ApiError> {
        let query = format!(
            "query($search: String, $page: Int, $perPage: Int) {{ \
             Page(page: $page, perPage: $perPage) {{ \
             media(search: $search, type: ANIME, sort: POPULARITY_DESC) {{ {MEDIA_FIELDS} }} }} }}"
        );
        let body = json!({
            "query": query,
            "variables": { "search": text, "page": 1, "perPage": PAGE_SIZE },
        });
        self.find_page(&body).await
    }

    /// Batch lookup used to hydrate the watch ledger. Result order is not
    /// guaranteed to match the input; see [`match_ledger`].
    pub async fn find_batch(&self, mal_ids: &[i64]) -> Result<Vec<Title>, ApiError> {
        if mal_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "query($ids: [Int], $page: Int, $perPage: Int) {{ \
             Page(page: $page, perPage: $perPage) {{ \
             media(idMal_in: $ids, type: ANIME) {{ {MEDIA_FIELDS} }} }} }}"
        );
        let body = json!({
            "query": query,
            "variables": { "ids": mal_ids, "page": 1, "perPage": PAGE_SIZE },
        });
        self.find_page(&body).await
    }

    pub async fn category(
        &self,
        sort: CategorySort,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Title>, ApiError> {
        let query = format!(
            "query($page: Int, $perPage: Int) {{ \
             Page(page: $page, perPage: $perPage) {{ \
             media({args}) {{ {MEDIA_FIELDS} }} }} }}",
            args = sort.media_arguments(),
        );
        let body = json!({
            "query": query,
            "variables": { "page": page, "perPage": per_page },
        });
        self.find_page(&body).await
    }

    /// Category page with first-class placeholder substitution: a failed
    /// query or an empty page yields the curated constants instead.
    pub async fn category_or_placeholders(
        &self,
        sort: CategorySort,
        page: u32,
        per_page: u32,
    ) -> Vec<Title> {
        match self.category(sort, page, per_page).await {
            Ok(titles) if !titles.is_empty() => titles,
            Ok(_) => {
                warn!("catalog returned no media for {sort:?}; using placeholders");
                placeholders::for_category(sort)
            }
            Err(err) => {
                warn!("category query {sort:?} failed: {err}; using placeholders");
                placeholders::for_category(sort)
            }
        }
    }

    async fn find_page(&self, body: &Value) -> Result<Vec<Title>, ApiError> {
        let response = self.transport.post_json(&self.endpoint, body).await?;
        let envelope: PageEnvelope = parse(response)?;
        let media = envelope
            .data
            .and_then(|data| data.page)
            .map(|page| page.media)
            .unwrap_or_default();
        Ok(media
            .into_iter()
            .map(RawMedia::into_title)
            .filter(|title| !title.name.is_empty())
            .collect())
    }
}

/// Re-associates batch results to ledger entries by the cross-reference
/// identifier, preserving ledger order and dropping entries with no match.
pub fn match_ledger(entries: &[WatchEntry], titles: &[Title]) -> Vec<(WatchEntry, Title)> {
    entries
        .iter()
        .filter_map(|entry| {
            titles
                .iter()
                .find(|title| title.mal_id == Some(entry.title_id))
                .map(|title| (entry.clone(), title.clone()))
        })
        .collect()
}

fn parse<D: for<'de> Deserialize<'de>>(value: Value) -> Result<D, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::Network(format!("unexpected catalog response shape: {err}")))
}

// --- GraphQL response structs ---

#[derive(Debug, Deserialize)]
struct MediaEnvelope {
    data: Option<MediaData>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    data: Option<PageData>,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: Option<RawPage>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    media: Vec<RawMedia>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawMedia {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    id_mal: Option<i64>,
    #[serde(default)]
    title: Option<RawTitleName>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    genres: Option<Vec<String>>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    start_date: Option<RawDate>,
    #[serde(default)]
    end_date: Option<RawDate>,
    #[serde(default)]
    average_score: Option<u32>,
    #[serde(default)]
    popularity: Option<u64>,
    #[serde(default)]
    favourites: Option<u64>,
    #[serde(default)]
    episodes: Option<u32>,
    #[serde(default)]
    banner_image: Option<String>,
    #[serde(default)]
    cover_image: Option<RawCover>,
    #[serde(default)]
    streaming_episodes: Option<Vec<RawStreamingEpisode>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawTitleName {
    #[serde(default)]
    user_preferred: Option<String>,
    #[serde(default)]
    english: Option<String>,
    #[serde(default)]
    romaji: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawCover {
    #[serde(default)]
    extra_large: Option<String>,
    #[serde(default)]
    large: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawDate {
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    month: Option<u32>,
    #[serde(default)]
    day: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawStreamingEpisode {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl RawDate {
    fn format(&self) -> Option<String> {
        let year = self.year?;
        match (self.month, self.day) {
            (Some(month), Some(day)) => Some(format!("{year}-{month:02}-{day:02}")),
            (Some(month), None) => Some(format!("{year}-{month:02}")),
            _ => Some(year.to_string()),
        }
    }
}

impl RawMedia {
    fn into_title(self) -> Title {
        let name = self
            .title
            .map(|raw| TitleName {
                preferred: raw.user_preferred,
                english: raw.english,
                romanized: raw.romaji,
            })
            .unwrap_or_default();
        let cover = self
            .cover_image
            .and_then(|c| c.extra_large.or(c.large));
        let streaming_links = self
            .streaming_episodes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|episode| {
                let url = episode.url?;
                Some(StreamingLink {
                    label: episode.title.unwrap_or_default(),
                    url,
                })
            })
            .collect();
        Title {
            id: self.id.or(self.id_mal).unwrap_or_default(),
            mal_id: self.id_mal,
            name,
            synopsis: self.description,
            genres: self.genres.unwrap_or_default(),
            banner_image: self.banner_image,
            cover_image: cover,
            status: self.status,
            start_date: self.start_date.and_then(|d| d.format()),
            end_date: self.end_date.and_then(|d| d.format()),
            episodes: self.episodes,
            average_score: self.average_score,
            popularity: self.popularity.or(self.favourites),
            streaming_links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::WatchEntry;
    use crate::types::Track;
    use chrono::Utc;
    use std::cell::RefCell;

    /// Scripted transport: pops one canned response per POST.
    struct ScriptedTransport {
        responses: RefCell<Vec<Result<Value, ApiError>>>,
    }

    impl ScriptedTransport {
        fn new(mut responses: Vec<Result<Value, ApiError>>) -> Self {
            responses.reverse();
            Self {
                responses: RefCell::new(responses),
            }
        }
    }

    impl Transport for ScriptedTransport {
        async fn get_json(
            &self,
            _url: &str,
            _params: &[(String, String)],
        ) -> Result<Value, ApiError> {
            unreachable!("catalog queries are POSTs")
        }

        async fn post_json(&self, _url: &str, _body: &Value) -> Result<Value, ApiError> {
            self.responses
                .borrow_mut()
                .pop()
                .expect("unexpected extra request")
        }
    }

    fn media_json(id: i64, mal_id: i64, english: &str) -> Value {
        json!({
            "id": id,
            "idMal": mal_id,
            "title": { "english": english, "romaji": null, "userPreferred": english },
            "episodes": 64,
        })
    }

    fn entry(title_id: i64, slug: &str, episode: u32) -> WatchEntry {
        WatchEntry {
            slug: slug.to_string(),
            episode,
            title_id,
            track: Track::Sub,
            watched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn find_by_id_maps_the_media_payload() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "data": { "Media": media_json(5114, 5114, "Fullmetal Alchemist: Brotherhood") }
        }))]);
        let client = CatalogClient::with_transport(transport, "https://test/graphql");
        let title = client.find_by_id(5114).await.unwrap();
        assert_eq!(title.id, 5114);
        assert_eq!(title.mal_id, Some(5114));
        assert_eq!(title.name.display(), "Fullmetal Alchemist: Brotherhood");
        assert_eq!(title.episodes, Some(64));
    }

    #[tokio::test]
    async fn missing_media_is_not_found() {
        let transport = ScriptedTransport::new(vec![Ok(json!({ "data": { "Media": null } }))]);
        let client = CatalogClient::with_transport(transport, "https://test/graphql");
        assert!(matches!(client.find_by_id(1).await, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn a_title_with_all_names_null_is_not_found() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "data": { "Media": { "id": 9, "title": { "english": null, "romaji": null, "userPreferred": null } } }
        }))]);
        let client = CatalogClient::with_transport(transport, "https://test/graphql");
        assert!(matches!(client.find_by_id(9).await, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn category_failure_substitutes_placeholders() {
        let transport =
            ScriptedTransport::new(vec![Err(ApiError::Http { status: 500 })]);
        let client = CatalogClient::with_transport(transport, "https://test/graphql");
        let titles = client
            .category_or_placeholders(CategorySort::Trending, 1, 15)
            .await;
        assert!(!titles.is_empty());
        assert_eq!(titles[0].id, 5114);
    }

    #[tokio::test]
    async fn empty_category_page_substitutes_placeholders() {
        let transport = ScriptedTransport::new(vec![Ok(json!({
            "data": { "Page": { "media": [] } }
        }))]);
        let client = CatalogClient::with_transport(transport, "https://test/graphql");
        let titles = client
            .category_or_placeholders(CategorySort::Movies, 1, 15)
            .await;
        assert_eq!(titles[0].id, 2236);
    }

    #[tokio::test]
    async fn batch_lookup_skips_the_request_for_no_ids() {
        let transport = ScriptedTransport::new(vec![]);
        let client = CatalogClient::with_transport(transport, "https://test/graphql");
        assert!(client.find_batch(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn ledger_matching_reassociates_and_drops() {
        let titles = vec![
            media_to_title(media_json(2, 200, "Second")),
            media_to_title(media_json(1, 100, "First")),
        ];
        let entries = vec![
            entry(100, "first-slug", 3),
            entry(999, "gone-slug", 1),
            entry(200, "second-slug", 7),
        ];
        let matched = match_ledger(&entries, &titles);
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].0.slug, "first-slug");
        assert_eq!(matched[0].1.name.display(), "First");
        assert_eq!(matched[1].0.slug, "second-slug");
    }

    fn media_to_title(value: Value) -> Title {
        let raw: RawMedia = serde_json::from_value(value).unwrap();
        raw.into_title()
    }
}
