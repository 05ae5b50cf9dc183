use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::{ProviderCandidate, ProviderEpisodeId, VideoSource};

pub mod allanime;
pub mod gogoanime;

pub use allanime::AllAnimeClient;
pub use gogoanime::GogoanimeClient;

pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

/// The three calls the resolver needs from a content provider.
///
/// Each call is a single round trip. "Nothing there" is an empty `Ok`, a
/// transport or decoding failure is an `Err`.
///
/// Futures are awaited in place by the resolver and never spawned, so no
/// `Send` bound is declared on them.
#[allow(async_fn_in_trait)]
pub trait AnimeProvider {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Candidates for `query`, in the order the provider ranked them.
    async fn search(&self, query: &str) -> Result<Vec<ProviderCandidate>, ProviderError>;

    /// Every episode of `anime_id` in the provider's list order.
    async fn fetch_episodes(&self, anime_id: &str)
    -> Result<Vec<ProviderEpisodeId>, ProviderError>;

    async fn resolve_sources(
        &self,
        episode_id: &str,
    ) -> Result<Vec<VideoSource>, ProviderError>;

    /// Map a 1-based episode number onto the provider's episode list by
    /// position. Returns `None` when the list is too short.
    async fn locate_episode(
        &self,
        anime_id: &str,
        episode: u32,
    ) -> Result<Option<ProviderEpisodeId>, ProviderError> {
        if episode == 0 {
            return Ok(None);
        }
        let episodes = self.fetch_episodes(anime_id).await?;
        Ok(episodes.into_iter().nth(episode as usize - 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(name = "allanime")]
    AllAnime,
    #[value(name = "gogoanime")]
    Gogoanime,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::AllAnime => "allanime",
            ProviderKind::Gogoanime => "gogoanime",
        }
    }
}

/// A configured backend. Chosen once from settings, then used through
/// `AnimeProvider` like any other provider.
pub enum Provider {
    AllAnime(AllAnimeClient),
    Gogoanime(GogoanimeClient),
}

impl AnimeProvider for Provider {
    fn name(&self) -> &'static str {
        match self {
            Provider::AllAnime(client) => client.name(),
            Provider::Gogoanime(client) => client.name(),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<ProviderCandidate>, ProviderError> {
        match self {
            Provider::AllAnime(client) => client.search(query).await,
            Provider::Gogoanime(client) => client.search(query).await,
        }
    }

    async fn fetch_episodes(
        &self,
        anime_id: &str,
    ) -> Result<Vec<ProviderEpisodeId>, ProviderError> {
        match self {
            Provider::AllAnime(client) => client.fetch_episodes(anime_id).await,
            Provider::Gogoanime(client) => client.fetch_episodes(anime_id).await,
        }
    }

    async fn resolve_sources(
        &self,
        episode_id: &str,
    ) -> Result<Vec<VideoSource>, ProviderError> {
        match self {
            Provider::AllAnime(client) => client.resolve_sources(episode_id).await,
            Provider::Gogoanime(client) => client.resolve_sources(episode_id).await,
        }
    }
}
