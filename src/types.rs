use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Suffix appended to a title when searching for the dubbed release.
pub const DUB_MARKER: &str = "(Dub)";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Translation {
    Sub,
    Dub,
}

impl Translation {
    pub fn as_str(self) -> &'static str {
        match self {
            Translation::Sub => "sub",
            Translation::Dub => "dub",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sub" => Some(Translation::Sub),
            "dub" => Some(Translation::Dub),
            _ => None,
        }
    }
}

/// The names a catalog knows an anime by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTitles {
    pub romaji: Option<String>,
    pub english: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// One search hit on a provider. Only lives for the duration of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCandidate {
    pub anime_id: String,
    pub title: String,
    pub position: usize,
}

/// Opaque provider-side episode handle, scoped to the anime id it came from.
pub type ProviderEpisodeId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSource {
    pub url: String,
    pub is_playlist: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

impl VideoSource {
    pub fn new(url: impl Into<String>, is_playlist: bool) -> Self {
        Self {
            url: url.into(),
            is_playlist,
            quality: None,
            headers: HashMap::new(),
            subtitle: None,
        }
    }

    pub fn label(&self) -> String {
        let kind = if self.is_playlist { "HLS" } else { "MP4" };
        format!("{} ({})", self.quality.as_deref().unwrap_or("auto"), kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub title_variants: Vec<String>,
    /// 1-based; anything below 1 is rejected by the resolver.
    pub episode: i64,
    pub dubbed: bool,
}

impl ResolutionRequest {
    pub fn new(title_variants: Vec<String>, episode: i64, dubbed: bool) -> Self {
        Self {
            title_variants,
            episode,
            dubbed,
        }
    }
}

/// Per-call knobs for a resolution. Supplied by the caller, never read from
/// global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Search result position used when not resolving a dub.
    pub index: usize,
    /// Upper bound on each individual provider call.
    pub timeout: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            index: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Vec<VideoSource>),
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn sources(&self) -> &[VideoSource] {
        match self {
            Resolution::Found(sources) => sources,
            Resolution::NotFound => &[],
        }
    }
}
