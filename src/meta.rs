//! Meta-service resolver: episode lists and stream sources with the full
//! provider / base-URL / delivery-server fallback ladder.
//!
//! Every rung issues its own transport request (which carries the inner
//! transient-retry policy); the ladder itself is the outer retry dimension.
//! Rungs run strictly sequentially and a rung only runs when the previous
//! one came back empty. Failed rungs are absorbed and logged, never
//! surfaced individually.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::episodes::{self, RawEpisode};
use crate::error::ApiError;
use crate::stream::select_best;
use crate::transport::{HttpTransport, RetryPolicy, Transport};
use crate::types::{Provider, ProviderResult, ResolvedStream, StreamSource};

/// Public aggregation service, also the fallback when a custom backend is
/// configured.
pub const DEFAULT_META_BASE: &str = "https://api.consumet.org";

const META_PATH: &str = "/meta/anilist";

pub struct MetaResolver<T: Transport> {
    transport: T,
    base_url: String,
    fallback_base: String,
}

impl MetaResolver<HttpTransport> {
    pub fn new(base_override: Option<&str>) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(RetryPolicy::meta())?;
        let base = base_override
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_META_BASE.to_string());
        Ok(Self::with_transport(transport, base, DEFAULT_META_BASE))
    }
}

impl<T: Transport> MetaResolver<T> {
    pub fn with_transport(
        transport: T,
        base_url: impl Into<String>,
        fallback_base: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            fallback_base: fallback_base.into(),
        }
    }

    /// Configured base first; the public default only when it differs.
    fn bases(&self) -> Vec<&str> {
        let mut bases = vec![self.base_url.as_str()];
        if self.fallback_base != self.base_url {
            bases.push(self.fallback_base.as_str());
        }
        bases
    }

    /// Resolves the episode lists for a title: preferred provider, then the
    /// other provider, then both again at the fallback base URL. First
    /// non-empty result wins; an all-empty ladder returns an empty
    /// `ProviderResult` and the caller falls back to external links.
    pub async fn resolve_episodes(&self, anilist_id: i64, preference: Provider) -> ProviderResult {
        let mut rungs = Vec::new();
        for base in self.bases() {
            rungs.push((base, preference));
            rungs.push((base, preference.other()));
        }

        for (base, provider) in rungs {
            match self.fetch_info(base, anilist_id, provider).await {
                Ok(result) if !result.is_empty() => {
                    debug!(
                        "episodes for {anilist_id}: provider {} at {base} ({} sub / {} dub)",
                        provider.as_str(),
                        result.sub.len(),
                        result.dub.len(),
                    );
                    return result;
                }
                Ok(_) => {
                    debug!(
                        "provider {} at {base} has no episodes for {anilist_id}",
                        provider.as_str()
                    );
                }
                Err(err) => {
                    warn!(
                        "info query failed for {} at {base}: {err}",
                        provider.as_str()
                    );
                }
            }
        }
        ProviderResult::default()
    }

    /// Resolves one episode to a concrete stream: default server, fallback
    /// base, then each named delivery server at both bases. Stops at the
    /// first response carrying a candidate source. `None` means no playable
    /// source anywhere; the caller must not present a player.
    pub async fn resolve_stream(
        &self,
        episode_id: &str,
        provider: Provider,
    ) -> Option<ResolvedStream> {
        let mut rungs: Vec<(&str, Option<&str>)> =
            self.bases().into_iter().map(|base| (base, None)).collect();
        for server in provider.servers() {
            for base in self.bases() {
                rungs.push((base, Some(server)));
            }
        }

        // The first sourceless-but-successful response is kept: its download
        // link can still resolve through the selector's last tier.
        let mut sourceless: Option<WatchResponse> = None;

        for (base, server) in rungs {
            match self.fetch_watch(base, episode_id, provider, server).await {
                Ok(watch) if !watch.sources.is_empty() => {
                    let candidates = watch.candidates();
                    return select_best(&candidates, watch.download.as_deref());
                }
                Ok(watch) => {
                    debug!(
                        "no sources for {episode_id} at {base} (server {})",
                        server.unwrap_or("default")
                    );
                    sourceless.get_or_insert(watch);
                }
                Err(err) => {
                    warn!(
                        "watch query failed for {episode_id} at {base} (server {}): {err}",
                        server.unwrap_or("default")
                    );
                }
            }
        }

        let watch = sourceless?;
        select_best(&[], watch.download.as_deref())
    }

    async fn fetch_info(
        &self,
        base: &str,
        anilist_id: i64,
        provider: Provider,
    ) -> Result<ProviderResult, ApiError> {
        let url = format!("{base}{META_PATH}/info/{anilist_id}");
        let params = vec![(String::from("provider"), provider.as_str().to_string())];
        let value = self.transport.get_json(&url, &params).await?;
        let info: InfoResponse = parse(value)?;

        let sub = episodes::normalize(info.episodes);
        let dub = episodes::normalize(info.episodes_dub);
        let sub_slug = episodes::derive_slug(&sub);
        let dub_slug = episodes::derive_slug(&dub);
        Ok(ProviderResult {
            provider: Some(provider.as_str()),
            sub,
            dub,
            sub_slug,
            dub_slug,
        })
    }

    async fn fetch_watch(
        &self,
        base: &str,
        episode_id: &str,
        provider: Provider,
        server: Option<&str>,
    ) -> Result<WatchResponse, ApiError> {
        let url = format!("{base}{META_PATH}/watch/{episode_id}");
        let mut params = vec![(String::from("provider"), provider.as_str().to_string())];
        if let Some(server) = server {
            params.push((String::from("server"), server.to_string()));
        }
        let value = self.transport.get_json(&url, &params).await?;
        parse(value)
    }
}

fn parse<D: for<'de> Deserialize<'de>>(value: Value) -> Result<D, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::Network(format!("unexpected meta response shape: {err}")))
}

// --- Meta service response structs ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    #[serde(default)]
    episodes: Vec<RawEpisode>,
    #[serde(default)]
    episodes_dub: Vec<RawEpisode>,
}

#[derive(Debug, Default, Deserialize)]
struct WatchResponse {
    #[serde(default)]
    sources: Vec<RawSource>,
    #[serde(default)]
    download: Option<String>,
}

impl WatchResponse {
    fn candidates(&self) -> Vec<StreamSource> {
        self.sources
            .iter()
            .map(|source| StreamSource {
                url: source
                    .url
                    .clone()
                    .or_else(|| source.file.clone())
                    .unwrap_or_default(),
                is_hls: source.is_m3u8,
                quality: source.quality.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default, rename = "isM3U8")]
    is_m3u8: bool,
    #[serde(default)]
    quality: Option<String>,
}
