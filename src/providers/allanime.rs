use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use super::{AnimeProvider, USER_AGENT};
use crate::error::ProviderError;
use crate::types::{ProviderCandidate, ProviderEpisodeId, Translation, VideoSource};

const PROVIDER: &str = "allanime";
const ALLANIME_API_URL: &str = "https://api.allanime.day/api";
const ALLANIME_BASE_URL: &str = "https://allanime.day";
const ALLANIME_REFERER: &str = "https://allmanga.to";
const ALLANIME_ORIGIN: &str = "https://allanime.day";
const PREFERRED_SOURCES: &[&str] = &["Default", "S-mp4", "Luf-Mp4", "Yt-mp4"];
const SEARCH_LIMIT: usize = 25;

static DUB_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\(dub\)\s*$").expect("valid dub suffix pattern"));

pub struct AllAnimeClient {
    client: Client,
    api_url: String,
    base_url: String,
}

impl AllAnimeClient {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_urls(ALLANIME_API_URL, ALLANIME_BASE_URL)
    }

    /// Point the client at another GraphQL endpoint and clock host.
    pub fn with_base_urls(
        api_url: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| ProviderError::Http {
                provider: PROVIDER,
                source,
            })?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            base_url: base_url.into(),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
        what: &'static str,
    ) -> Result<T, ProviderError> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let response = self
            .client
            .post(&self.api_url)
            .header("Referer", ALLANIME_REFERER)
            .header("Origin", ALLANIME_ORIGIN)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;
        let status = response.status();
        let text = response.text().await.map_err(http_error)?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status,
                body: text,
            });
        }
        let envelope: GraphQlEnvelope<T> =
            serde_json::from_str(&text).map_err(|source| ProviderError::Decode {
                provider: PROVIDER,
                what,
                source,
            })?;
        Self::extract_data(envelope)
    }

    async fn fetch_show_detail(&self, show_id: &str) -> Result<ShowDetail, ProviderError> {
        let payload: ShowDetailPayload = self
            .query(
                SHOW_DETAIL_QUERY,
                serde_json::json!({ "showId": show_id }),
                "show detail",
            )
            .await?;
        Ok(payload.show)
    }

    async fn fetch_source_descriptors(
        &self,
        episode: &EpisodeRef,
    ) -> Result<Vec<SourceDescriptor>, ProviderError> {
        let payload: EpisodePayload = self
            .query(
                EPISODE_SOURCES_QUERY,
                serde_json::json!({
                    "showId": episode.show.show_id,
                    "translationType": episode.show.translation.as_str(),
                    "episodeString": episode.label
                }),
                "episode sources",
            )
            .await?;
        Ok(payload.episode.source_urls)
    }

    async fn fetch_clock_json(&self, path: &str) -> Result<ClockResponse, ProviderError> {
        let url = if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        };
        let response = self
            .client
            .get(&url)
            .header("Referer", ALLANIME_REFERER)
            .header("Origin", ALLANIME_ORIGIN)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(http_error)?;
        let status = response.status();
        let text = response.text().await.map_err(http_error)?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status,
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|source| ProviderError::Decode {
            provider: PROVIDER,
            what: "clock response",
            source,
        })
    }

    fn extract_data<T>(envelope: GraphQlEnvelope<T>) -> Result<T, ProviderError> {
        if let Some(errors) = envelope.errors {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderError::Api {
                provider: PROVIDER,
                message,
            });
        }
        envelope.data.ok_or_else(|| ProviderError::Api {
            provider: PROVIDER,
            message: "empty response".to_string(),
        })
    }
}

impl AnimeProvider for AllAnimeClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    /// AllAnime keeps sub and dub under one show, so a trailing `(Dub)` in
    /// the query switches the translation instead of being searched for.
    async fn search(&self, query: &str) -> Result<Vec<ProviderCandidate>, ProviderError> {
        let (query, translation) = split_dub_suffix(query);
        let payload: SearchPayload = self
            .query(
                SEARCH_SHOWS_QUERY,
                serde_json::json!({
                    "search": {
                        "allowAdult": false,
                        "allowUnknown": false,
                        "query": query,
                    },
                    "limit": SEARCH_LIMIT,
                    "page": 1,
                    "translationType": translation.as_str(),
                    "countryOrigin": "ALL"
                }),
                "search",
            )
            .await?;
        Ok(payload
            .shows
            .edges
            .into_iter()
            .enumerate()
            .map(|(position, edge)| ProviderCandidate {
                anime_id: ShowRef {
                    show_id: edge.id,
                    translation,
                }
                .to_string(),
                title: edge.name,
                position,
            })
            .collect())
    }

    /// Episode labels for the candidate's translation, ascending.
    async fn fetch_episodes(
        &self,
        anime_id: &str,
    ) -> Result<Vec<ProviderEpisodeId>, ProviderError> {
        let show = ShowRef::parse(anime_id)?;
        let detail = self.fetch_show_detail(&show.show_id).await?;
        let labels = match show.translation {
            Translation::Sub => detail.available_episodes_detail.sub,
            Translation::Dub => detail.available_episodes_detail.dub,
        };
        Ok(sorted_episode_labels(&labels)
            .into_iter()
            .map(|label| {
                EpisodeRef {
                    show: show.clone(),
                    label,
                }
                .to_string()
            })
            .collect())
    }

    async fn resolve_sources(
        &self,
        episode_id: &str,
    ) -> Result<Vec<VideoSource>, ProviderError> {
        let episode = EpisodeRef::parse(episode_id)?;
        let descriptors = self.fetch_source_descriptors(&episode).await?;
        let mut last_err = None;
        let mut answered = false;

        for name in PREFERRED_SOURCES {
            let Some(descriptor) = descriptors.iter().find(|d| d.source_name == *name) else {
                continue;
            };
            let Some(path) = decode_provider_path(&descriptor.source_url) else {
                tracing::debug!(source = name, "undecodable source path");
                continue;
            };
            let response = match self.fetch_clock_json(&path).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::debug!(source = name, error = %err, "clock lookup failed");
                    last_err = Some(err);
                    continue;
                }
            };

            answered = true;
            let mut sources: Vec<(i32, VideoSource)> =
                response.links.into_iter().map(build_video_source).collect();
            if !sources.is_empty() {
                sources.sort_by(|a, b| b.0.cmp(&a.0));
                return Ok(sources.into_iter().map(|(_, source)| source).collect());
            }
        }

        // Empty only when a source answered with no links, or none was usable.
        match last_err {
            Some(err) if !answered => Err(err),
            _ => Ok(Vec::new()),
        }
    }
}

// --- Identifiers ---

/// Provider anime id: `{show_id}:{translation}`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ShowRef {
    show_id: String,
    translation: Translation,
}

impl ShowRef {
    fn parse(raw: &str) -> Result<Self, ProviderError> {
        let invalid = || ProviderError::InvalidId {
            provider: PROVIDER,
            id: raw.to_string(),
        };
        let (show_id, translation) = raw.split_once(':').ok_or_else(invalid)?;
        let translation = Translation::parse(translation).ok_or_else(invalid)?;
        if show_id.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            show_id: show_id.to_string(),
            translation,
        })
    }
}

impl fmt::Display for ShowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.show_id, self.translation.as_str())
    }
}

/// Provider episode id: `{show_id}:{translation}:{episode_label}`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EpisodeRef {
    show: ShowRef,
    label: String,
}

impl EpisodeRef {
    fn parse(raw: &str) -> Result<Self, ProviderError> {
        let (show, label) = raw.rsplit_once(':').ok_or_else(|| ProviderError::InvalidId {
            provider: PROVIDER,
            id: raw.to_string(),
        })?;
        Ok(Self {
            show: ShowRef::parse(show)?,
            label: label.to_string(),
        })
    }
}

impl fmt::Display for EpisodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.show, self.label)
    }
}

// --- Helper Functions ---

fn http_error(source: reqwest::Error) -> ProviderError {
    ProviderError::Http {
        provider: PROVIDER,
        source,
    }
}

fn split_dub_suffix(query: &str) -> (&str, Translation) {
    match DUB_SUFFIX.find(query) {
        Some(m) => (&query[..m.start()], Translation::Dub),
        None => (query, Translation::Sub),
    }
}

fn compare_episode_labels(left: &str, right: &str) -> Ordering {
    let l = parse_episode_key(left);
    let r = parse_episode_key(right);
    l.partial_cmp(&r).unwrap_or(Ordering::Equal)
}

fn parse_episode_key(label: &str) -> f32 {
    label.parse::<f32>().unwrap_or(0.0)
}

fn sorted_episode_labels(episodes: &[String]) -> Vec<String> {
    let mut sorted = episodes.to_vec();
    sorted.sort_by(|a, b| compare_episode_labels(a, b));
    sorted.dedup();
    sorted
}

fn build_video_source(link: ClockLink) -> (i32, VideoSource) {
    let quality = link.resolution.unwrap_or_else(|| String::from("auto"));
    let rank = quality_rank(&quality);
    let subtitle = link
        .subtitles
        .iter()
        .find(|sub| sub.lang.as_deref() == Some("en") || sub.label.as_deref() == Some("English"))
        .map(|sub| sub.src.clone());

    let mut headers = link.headers;
    if !headers.keys().any(|k| k.eq_ignore_ascii_case("referer")) {
        headers.insert("Referer".to_string(), ALLANIME_REFERER.to_string());
    }

    let source = VideoSource {
        url: link.link,
        is_playlist: link.hls,
        quality: Some(quality),
        headers,
        subtitle,
    };
    (rank, source)
}

fn quality_rank(label: &str) -> i32 {
    if label.eq_ignore_ascii_case("auto") {
        return 10_000;
    }
    label.trim_end_matches('p').parse::<i32>().unwrap_or(0)
}

fn decode_provider_path(raw: &str) -> Option<String> {
    if !raw.starts_with("--") {
        return None;
    }
    let bytes = raw.trim_start_matches("--");
    if bytes.len() % 2 != 0 {
        return None;
    }
    let mut decoded = String::with_capacity(bytes.len() / 2);
    for chunk in bytes.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(chunk).ok()?;
        let byte = u8::from_str_radix(pair, 16).ok()?;
        let ch = char::from(byte ^ 0x38);
        if !ch.is_ascii_graphic() {
            return None;
        }
        decoded.push(ch);
    }
    if decoded.contains("/clock") && !decoded.contains(".json") {
        decoded = decoded.replacen("/clock", "/clock.json", 1);
    }
    Some(decoded)
}

// --- GraphQL Structs ---

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    shows: SearchShows,
}

#[derive(Debug, Deserialize)]
struct SearchShows {
    edges: Vec<SearchEdge>,
}

#[derive(Debug, Deserialize)]
struct SearchEdge {
    #[serde(rename = "_id")]
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ShowDetailPayload {
    show: ShowDetail,
}

#[derive(Debug, Deserialize)]
struct ShowDetail {
    #[serde(rename = "availableEpisodesDetail")]
    #[serde(default)]
    available_episodes_detail: EpisodeDetail,
}

#[derive(Debug, Deserialize, Default)]
struct EpisodeDetail {
    #[serde(default)]
    sub: Vec<String>,
    #[serde(default)]
    dub: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodePayload {
    episode: EpisodeSources,
}

#[derive(Debug, Deserialize)]
struct EpisodeSources {
    #[serde(rename = "sourceUrls")]
    #[serde(default)]
    source_urls: Vec<SourceDescriptor>,
}

#[derive(Debug, Deserialize)]
struct SourceDescriptor {
    #[serde(rename = "sourceUrl")]
    source_url: String,
    #[serde(rename = "sourceName")]
    source_name: String,
}

#[derive(Debug, Deserialize)]
struct ClockResponse {
    #[serde(default)]
    links: Vec<ClockLink>,
}

#[derive(Debug, Deserialize)]
struct ClockLink {
    link: String,
    #[serde(rename = "resolutionStr")]
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    hls: bool,
    #[serde(default)]
    subtitles: Vec<ClockSubtitle>,
    #[serde(default)]
    headers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ClockSubtitle {
    src: String,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

// --- Queries ---

const SEARCH_SHOWS_QUERY: &str = r#"query($search: SearchInput, $limit: Int, $page: Int, $translationType: VaildTranslationTypeEnumType, $countryOrigin: VaildCountryOriginEnumType) {
  shows(search: $search, limit: $limit, page: $page, translationType: $translationType, countryOrigin: $countryOrigin) {
    edges {
      _id
      name
      availableEpisodes
    }
  }
}"#;

const SHOW_DETAIL_QUERY: &str = r#"query($showId: String!) {
  show(_id: $showId) {
    _id
    name
    availableEpisodesDetail
  }
}"#;

const EPISODE_SOURCES_QUERY: &str = r#"query($showId: String!, $translationType: VaildTranslationTypeEnumType!, $episodeString: String!) {
  episode(showId: $showId, translationType: $translationType, episodeString: $episodeString) {
    episodeString
    sourceUrls
  }
}"#;
