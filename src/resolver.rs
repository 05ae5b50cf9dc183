//! Episode source resolution.
//!
//! Walks the title variants of a request in order against one provider and
//! stops at the first variant that yields playable sources. Every failure
//! along the way (no search hit, short episode list, empty source set,
//! provider error or timeout) only skips the current variant.

use std::future::Future;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, ResolveError};
use crate::providers::AnimeProvider;
use crate::types::{
    DUB_MARKER, ProviderCandidate, Resolution, ResolutionRequest, ResolveOptions, VideoSource,
};

/// Why a single title variant produced nothing.
#[derive(Debug)]
pub enum VariantMiss {
    NoCandidate { index: usize },
    EpisodeNotLocatable { anime_id: String },
    EmptySourceSet { episode_id: String },
    ProviderUnavailable(ProviderError),
}

impl From<ProviderError> for VariantMiss {
    fn from(err: ProviderError) -> Self {
        VariantMiss::ProviderUnavailable(err)
    }
}

pub struct EpisodeResolver<P> {
    provider: P,
}

impl<P: AnimeProvider> EpisodeResolver<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn resolve(
        &self,
        request: &ResolutionRequest,
        options: &ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        self.resolve_with_cancel(request, options, &CancellationToken::new())
            .await
    }

    /// Resolve several independent requests concurrently. Results come back
    /// in request order.
    pub async fn resolve_many(
        &self,
        requests: &[ResolutionRequest],
        options: &ResolveOptions,
    ) -> Vec<Result<Resolution, ResolveError>> {
        join_all(requests.iter().map(|request| self.resolve(request, options))).await
    }

    /// Like [`resolve`](Self::resolve), but gives up with
    /// `ResolveError::Cancelled` once `cancel` fires. The token is checked
    /// before every provider call and raced against the call in flight.
    pub async fn resolve_with_cancel(
        &self,
        request: &ResolutionRequest,
        options: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> Result<Resolution, ResolveError> {
        let episode = validate(request)?;
        if request.title_variants.is_empty() {
            tracing::debug!("no title variants to search");
            return Ok(Resolution::NotFound);
        }

        // A dub query is expected to put the right show first.
        let index = if request.dubbed { 0 } else { options.index };
        tracing::info!(
            provider = self.provider.name(),
            episode,
            dubbed = request.dubbed,
            index,
            variants = request.title_variants.len(),
            "resolving episode sources"
        );

        for variant in &request.title_variants {
            let query = if request.dubbed {
                format!("{variant} {DUB_MARKER}")
            } else {
                variant.clone()
            };

            match self
                .try_variant(&query, index, episode, options, cancel)
                .await?
            {
                Ok(sources) => {
                    tracing::info!(
                        provider = self.provider.name(),
                        query = %query,
                        count = sources.len(),
                        "found episode sources"
                    );
                    return Ok(Resolution::Found(sources));
                }
                Err(VariantMiss::ProviderUnavailable(err)) => {
                    tracing::warn!(query = %query, error = %err, "provider unavailable, trying next title");
                }
                Err(miss) => {
                    tracing::debug!(query = %query, ?miss, "no sources for title variant");
                }
            }
        }

        tracing::info!(
            provider = self.provider.name(),
            episode,
            "no sources found for any title variant"
        );
        Ok(Resolution::NotFound)
    }

    /// The outer `Result` aborts the whole resolution; the inner one only
    /// this variant.
    async fn try_variant(
        &self,
        query: &str,
        index: usize,
        episode: u32,
        options: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> Result<Result<Vec<VideoSource>, VariantMiss>, ResolveError> {
        let candidates = match self
            .call(options, cancel, self.provider.search(query))
            .await?
        {
            Ok(candidates) => candidates,
            Err(err) => return Ok(Err(err.into())),
        };
        let Some(candidate) = pick_candidate(candidates, index) else {
            return Ok(Err(VariantMiss::NoCandidate { index }));
        };
        tracing::debug!(query, anime_id = %candidate.anime_id, title = %candidate.title, "picked candidate");

        let located = self
            .call(
                options,
                cancel,
                self.provider.locate_episode(&candidate.anime_id, episode),
            )
            .await?;
        let episode_id = match located {
            Ok(Some(episode_id)) => episode_id,
            Ok(None) => {
                return Ok(Err(VariantMiss::EpisodeNotLocatable {
                    anime_id: candidate.anime_id,
                }));
            }
            Err(err) => return Ok(Err(err.into())),
        };

        let sources = match self
            .call(options, cancel, self.provider.resolve_sources(&episode_id))
            .await?
        {
            Ok(sources) => sources,
            Err(err) => return Ok(Err(err.into())),
        };
        if sources.is_empty() {
            return Ok(Err(VariantMiss::EmptySourceSet { episode_id }));
        }
        Ok(Ok(sources))
    }

    /// Run one provider call under the per-call timeout. A timeout becomes a
    /// `ProviderError` like any other provider failure.
    async fn call<T>(
        &self,
        options: &ResolveOptions,
        cancel: &CancellationToken,
        fut: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<Result<T, ProviderError>, ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ResolveError::Cancelled),
            outcome = tokio::time::timeout(options.timeout, fut) => Ok(match outcome {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    provider: self.provider.name(),
                    timeout: options.timeout,
                }),
            }),
        }
    }
}

fn validate(request: &ResolutionRequest) -> Result<u32, ResolveError> {
    if request.episode < 1 {
        return Err(ResolveError::InvalidRequest(format!(
            "episode must be at least 1, got {}",
            request.episode
        )));
    }
    let episode = u32::try_from(request.episode).map_err(|_| {
        ResolveError::InvalidRequest(format!("episode {} is out of range", request.episode))
    })?;
    if let Some(pos) = request
        .title_variants
        .iter()
        .position(|variant| variant.trim().is_empty())
    {
        return Err(ResolveError::InvalidRequest(format!(
            "title variant {pos} is empty"
        )));
    }
    Ok(episode)
}

// TODO: positional selection breaks silently if the provider reorders its
// results; matching candidate titles against the variant would catch that.
fn pick_candidate(candidates: Vec<ProviderCandidate>, index: usize) -> Option<ProviderCandidate> {
    candidates.into_iter().nth(index)
}
