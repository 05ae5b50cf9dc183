//! Gogoanime through a consumet-compatible JSON API.
//!
//! The API exposes search, info and watch endpoints under
//! `/anime/gogoanime`. Dubbed releases are separate entries whose titles end
//! in `(Dub)`, so no translation handling is needed here.

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use url::Url;

use super::{AnimeProvider, USER_AGENT};
use crate::error::ProviderError;
use crate::types::{ProviderCandidate, ProviderEpisodeId, VideoSource};

const PROVIDER: &str = "gogoanime";
pub const DEFAULT_BASE_URL: &str = "https://api.consumet.org";

pub struct GogoanimeClient {
    client: Client,
    base_url: Url,
}

impl GogoanimeClient {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, ProviderError> {
        let base_url = Url::parse(base_url).map_err(|_| ProviderError::BaseUrl {
            provider: PROVIDER,
            url: base_url.to_string(),
        })?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| ProviderError::Http {
                provider: PROVIDER,
                source,
            })?;
        Ok(Self { client, base_url })
    }

    /// `{base}/anime/gogoanime/{segments...}` with each segment escaped.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::BaseUrl {
                provider: PROVIDER,
                url: self.base_url.to_string(),
            })?
            .pop_if_empty()
            .extend(["anime", "gogoanime"])
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        what: &'static str,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: PROVIDER,
                source,
            })?;
        let status = response.status();
        let text = response.text().await.map_err(|source| ProviderError::Http {
            provider: PROVIDER,
            source,
        })?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status,
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|source| ProviderError::Decode {
            provider: PROVIDER,
            what,
            source,
        })
    }
}

impl AnimeProvider for GogoanimeClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> Result<Vec<ProviderCandidate>, ProviderError> {
        let url = self.endpoint(&[query])?;
        let page: SearchPage = self.get_json(url, "search results").await?;
        Ok(page
            .results
            .into_iter()
            .enumerate()
            .map(|(position, result)| ProviderCandidate {
                anime_id: result.id,
                title: result.title,
                position,
            })
            .collect())
    }

    async fn fetch_episodes(
        &self,
        anime_id: &str,
    ) -> Result<Vec<ProviderEpisodeId>, ProviderError> {
        let url = self.endpoint(&["info", anime_id])?;
        let info: AnimeInfo = self.get_json(url, "anime info").await?;
        Ok(info.episodes.into_iter().map(|episode| episode.id).collect())
    }

    async fn resolve_sources(
        &self,
        episode_id: &str,
    ) -> Result<Vec<VideoSource>, ProviderError> {
        let url = self.endpoint(&["watch", episode_id])?;
        let watch: WatchResponse = self.get_json(url, "episode sources").await?;
        let headers = watch.headers;
        Ok(watch
            .sources
            .into_iter()
            .map(|source| VideoSource {
                url: source.url,
                is_playlist: source.is_m3u8,
                quality: source.quality,
                headers: headers.clone(),
                subtitle: None,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct AnimeInfo {
    #[serde(default)]
    episodes: Vec<EpisodeEntry>,
}

#[derive(Debug, Deserialize)]
struct EpisodeEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WatchResponse {
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    sources: Vec<WatchSource>,
}

#[derive(Debug, Deserialize)]
struct WatchSource {
    url: String,
    #[serde(rename = "isM3U8")]
    #[serde(default)]
    is_m3u8: bool,
    #[serde(default)]
    quality: Option<String>,
}
