//! Resolver behaviour against a scripted in-memory provider.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anisource::{
    AnimeProvider, CanonicalTitles, EpisodeResolver, ProviderCandidate, ProviderEpisodeId,
    ProviderError, Resolution, ResolutionRequest, ResolveError, ResolveOptions, VideoSource,
    generate_variants,
};
use tokio_util::sync::CancellationToken;

// =============================================================================
// Scripted provider
// =============================================================================

#[derive(Default)]
struct ScriptedProvider {
    /// query -> candidate ids; missing query means provider error
    searches: HashMap<String, Vec<&'static str>>,
    /// anime id -> episode ids
    episodes: HashMap<String, Vec<String>>,
    /// episode id -> source urls
    sources: HashMap<String, Vec<&'static str>>,
    /// queries that hang until the timeout fires
    slow: Vec<String>,
    calls: Mutex<Vec<String>>,
    /// cancelled from inside the provider after the first search
    cancel_after_search: Option<CancellationToken>,
}

impl ScriptedProvider {
    fn with_search(mut self, query: &str, ids: &[&'static str]) -> Self {
        self.searches.insert(query.to_string(), ids.to_vec());
        self
    }

    fn with_episodes(mut self, anime_id: &str, count: usize) -> Self {
        let ids = (1..=count).map(|n| format!("{anime_id}-ep{n}")).collect();
        self.episodes.insert(anime_id.to_string(), ids);
        self
    }

    fn with_sources(mut self, episode_id: &str, urls: &[&'static str]) -> Self {
        self.sources.insert(episode_id.to_string(), urls.to_vec());
        self
    }

    fn with_slow_search(mut self, query: &str) -> Self {
        self.slow.push(query.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn unavailable() -> ProviderError {
        ProviderError::Api {
            provider: "scripted",
            message: "unavailable".to_string(),
        }
    }
}

impl AnimeProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, query: &str) -> Result<Vec<ProviderCandidate>, ProviderError> {
        self.record(format!("search:{query}"));
        if let Some(token) = &self.cancel_after_search {
            token.cancel();
        }
        if self.slow.iter().any(|q| q == query) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        let ids = self.searches.get(query).ok_or_else(Self::unavailable)?;
        Ok(ids
            .iter()
            .enumerate()
            .map(|(position, id)| ProviderCandidate {
                anime_id: id.to_string(),
                title: id.to_string(),
                position,
            })
            .collect())
    }

    async fn fetch_episodes(
        &self,
        anime_id: &str,
    ) -> Result<Vec<ProviderEpisodeId>, ProviderError> {
        self.record(format!("episodes:{anime_id}"));
        self.episodes
            .get(anime_id)
            .cloned()
            .ok_or_else(Self::unavailable)
    }

    async fn resolve_sources(
        &self,
        episode_id: &str,
    ) -> Result<Vec<VideoSource>, ProviderError> {
        self.record(format!("sources:{episode_id}"));
        let urls = self.sources.get(episode_id).ok_or_else(Self::unavailable)?;
        Ok(urls
            .iter()
            .map(|url| VideoSource::new(*url, url.ends_with(".m3u8")))
            .collect())
    }
}

fn titan_variants() -> Vec<String> {
    vec![
        "Shingeki no Kyojin".to_string(),
        "Attack on Titan".to_string(),
        "AoT".to_string(),
    ]
}

fn options() -> ResolveOptions {
    ResolveOptions {
        index: 0,
        timeout: Duration::from_secs(5),
    }
}

// =============================================================================
// Request validation
// =============================================================================

#[tokio::test]
async fn test_zero_variants_is_not_found_without_calls() {
    let resolver = EpisodeResolver::new(ScriptedProvider::default());
    let request = ResolutionRequest::new(Vec::new(), 1, false);

    let result = resolver.resolve(&request, &options()).await;

    assert_eq!(result, Ok(Resolution::NotFound));
    assert!(resolver.provider().calls().is_empty());
}

#[tokio::test]
async fn test_non_positive_episode_is_invalid_without_calls() {
    for episode in [0, -3] {
        let resolver = EpisodeResolver::new(ScriptedProvider::default());
        let request = ResolutionRequest::new(titan_variants(), episode, false);

        let result = resolver.resolve(&request, &options()).await;

        assert!(matches!(result, Err(ResolveError::InvalidRequest(_))));
        assert!(resolver.provider().calls().is_empty());
    }
}

#[tokio::test]
async fn test_blank_variant_is_invalid() {
    let resolver = EpisodeResolver::new(ScriptedProvider::default());
    let request = ResolutionRequest::new(vec!["Bleach".into(), "".into()], 1, false);

    let result = resolver.resolve(&request, &options()).await;

    assert!(matches!(result, Err(ResolveError::InvalidRequest(_))));
    assert!(resolver.provider().calls().is_empty());
}

// =============================================================================
// Variant iteration
// =============================================================================

#[tokio::test]
async fn test_first_variant_success_short_circuits() {
    let provider = ScriptedProvider::default()
        .with_search("Shingeki no Kyojin", &["c1"])
        .with_episodes("c1", 25)
        .with_sources("c1-ep5", &["http://x/e5.m3u8"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(titan_variants(), 5, false);

    let result = resolver.resolve(&request, &options()).await.unwrap();

    assert_eq!(
        result,
        Resolution::Found(vec![VideoSource::new("http://x/e5.m3u8", true)])
    );
    assert_eq!(
        resolver.provider().calls(),
        vec![
            "search:Shingeki no Kyojin",
            "episodes:c1",
            "sources:c1-ep5"
        ]
    );
}

#[tokio::test]
async fn test_falls_through_to_later_variants() {
    let provider = ScriptedProvider::default()
        .with_search("Shingeki no Kyojin", &[])
        .with_search("Attack on Titan", &["c2"])
        .with_episodes("c2", 3)
        .with_search("AoT", &["c3"])
        .with_episodes("c3", 12)
        .with_sources("c3-ep5", &["http://x/aot5.mp4"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(titan_variants(), 5, false);

    let result = resolver.resolve(&request, &options()).await.unwrap();

    assert_eq!(result.sources()[0].url, "http://x/aot5.mp4");
    let calls = resolver.provider().calls();
    assert_eq!(
        calls,
        vec![
            "search:Shingeki no Kyojin",
            "search:Attack on Titan",
            "episodes:c2",
            "search:AoT",
            "episodes:c3",
            "sources:c3-ep5",
        ]
    );
    assert_eq!(calls.iter().filter(|c| c.starts_with("search:")).count(), 3);
}

#[tokio::test]
async fn test_all_variants_exhausted_in_order() {
    let provider = ScriptedProvider::default()
        .with_search("Shingeki no Kyojin", &[])
        .with_search("Attack on Titan", &["c2"])
        .with_episodes("c2", 3)
        .with_search("AoT", &["c3"])
        .with_episodes("c3", 12)
        .with_sources("c3-ep5", &[]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(titan_variants(), 5, false);

    let result = resolver.resolve(&request, &options()).await;

    assert_eq!(result, Ok(Resolution::NotFound));
    let searches: Vec<String> = resolver
        .provider()
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("search:"))
        .collect();
    assert_eq!(
        searches,
        vec![
            "search:Shingeki no Kyojin",
            "search:Attack on Titan",
            "search:AoT"
        ]
    );
}

#[tokio::test]
async fn test_no_calls_after_successful_variant() {
    let provider = ScriptedProvider::default()
        .with_search("A", &[])
        .with_search("B", &["b"])
        .with_episodes("b", 1)
        .with_sources("b-ep1", &["http://x/s.m3u8"])
        .with_search("C", &["c"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(vec!["A".into(), "B".into(), "C".into()], 1, false);

    let result = resolver.resolve(&request, &options()).await.unwrap();

    assert_eq!(result.sources().len(), 1);
    assert_eq!(
        resolver.provider().calls(),
        vec!["search:A", "search:B", "episodes:b", "sources:b-ep1"]
    );
}

#[tokio::test]
async fn test_provider_errors_do_not_abort() {
    // "Down" has no scripted search, so the provider errors for it.
    let provider = ScriptedProvider::default()
        .with_search("Up", &["u"])
        .with_episodes("u", 2)
        .with_sources("u-ep2", &["http://x/u2.mp4"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(vec!["Down".into(), "Up".into()], 2, false);

    let result = resolver.resolve(&request, &options()).await.unwrap();

    assert!(result.is_found());
    assert_eq!(resolver.provider().calls()[0], "search:Down");
}

#[tokio::test]
async fn test_generated_variants_with_marker_only_synonym_resolve() {
    let titles = CanonicalTitles {
        romaji: Some("Gintama".to_string()),
        english: None,
        synonyms: vec![":".to_string()],
    };
    let provider = ScriptedProvider::default()
        .with_search("Gintama", &["g"])
        .with_episodes("g", 3)
        .with_sources("g-ep3", &["http://x/g3.mp4"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(generate_variants(&titles), 3, false);

    let result = resolver.resolve(&request, &options()).await.unwrap();

    assert_eq!(result.sources()[0].url, "http://x/g3.mp4");
}

#[tokio::test]
async fn test_source_errors_do_not_abort() {
    let provider = ScriptedProvider::default()
        .with_search("First", &["f"])
        .with_episodes("f", 1)
        .with_search("Second", &["s"])
        .with_episodes("s", 1)
        .with_sources("s-ep1", &["http://x/s1.mp4"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(vec!["First".into(), "Second".into()], 1, false);

    let result = resolver.resolve(&request, &options()).await.unwrap();

    assert_eq!(result.sources()[0].url, "http://x/s1.mp4");
}

#[tokio::test]
async fn test_timeout_advances_to_next_variant() {
    let provider = ScriptedProvider::default()
        .with_slow_search("Slow")
        .with_search("Fast", &["f"])
        .with_episodes("f", 1)
        .with_sources("f-ep1", &["http://x/f1.mp4"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(vec!["Slow".into(), "Fast".into()], 1, false);
    let options = ResolveOptions {
        index: 0,
        timeout: Duration::from_millis(50),
    };

    let result = resolver.resolve(&request, &options).await.unwrap();

    assert_eq!(result.sources()[0].url, "http://x/f1.mp4");
    assert_eq!(resolver.provider().calls()[..2], ["search:Slow", "search:Fast"]);
}

// =============================================================================
// Candidate selection
// =============================================================================

#[tokio::test]
async fn test_index_selects_candidate_when_subbed() {
    let provider = ScriptedProvider::default()
        .with_search("Monogatari", &["first", "second"])
        .with_episodes("second", 2)
        .with_sources("second-ep2", &["http://x/m2.mp4"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(vec!["Monogatari".into()], 2, false);
    let options = ResolveOptions {
        index: 1,
        ..options()
    };

    let result = resolver.resolve(&request, &options).await.unwrap();

    assert!(result.is_found());
    assert_eq!(resolver.provider().calls()[1], "episodes:second");
}

#[tokio::test]
async fn test_index_past_results_is_a_miss() {
    let provider = ScriptedProvider::default().with_search("Monogatari", &["only"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(vec!["Monogatari".into()], 1, false);
    let options = ResolveOptions {
        index: 3,
        ..options()
    };

    let result = resolver.resolve(&request, &options).await;

    assert_eq!(result, Ok(Resolution::NotFound));
    assert_eq!(resolver.provider().calls(), vec!["search:Monogatari"]);
}

#[tokio::test]
async fn test_dub_appends_marker_and_ignores_index() {
    let provider = ScriptedProvider::default()
        .with_search("Attack on Titan (Dub)", &["dub0", "dub1"])
        .with_episodes("dub0", 5)
        .with_sources("dub0-ep5", &["http://x/dub5.m3u8"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(vec!["Attack on Titan".into()], 5, true);
    let options = ResolveOptions {
        index: 1,
        ..options()
    };

    let result = resolver.resolve(&request, &options).await.unwrap();

    assert_eq!(result.sources()[0].url, "http://x/dub5.m3u8");
    assert_eq!(
        resolver.provider().calls(),
        vec![
            "search:Attack on Titan (Dub)",
            "episodes:dub0",
            "sources:dub0-ep5"
        ]
    );
}

// =============================================================================
// Cancellation and concurrency
// =============================================================================

#[tokio::test]
async fn test_cancelled_token_makes_no_calls() {
    let resolver = EpisodeResolver::new(ScriptedProvider::default().with_search("A", &["a"]));
    let request = ResolutionRequest::new(vec!["A".into()], 1, false);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = resolver
        .resolve_with_cancel(&request, &options(), &cancel)
        .await;

    assert_eq!(result, Err(ResolveError::Cancelled));
    assert!(resolver.provider().calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_before_next_step() {
    let cancel = CancellationToken::new();
    let provider = ScriptedProvider {
        cancel_after_search: Some(cancel.clone()),
        ..ScriptedProvider::default()
    }
    .with_search("A", &["a"])
    .with_episodes("a", 1)
    .with_sources("a-ep1", &["http://x/a1.mp4"]);
    let resolver = EpisodeResolver::new(provider);
    let request = ResolutionRequest::new(vec!["A".into(), "B".into()], 1, false);

    let result = resolver
        .resolve_with_cancel(&request, &options(), &cancel)
        .await;

    assert_eq!(result, Err(ResolveError::Cancelled));
    assert_eq!(resolver.provider().calls(), vec!["search:A"]);
}

#[tokio::test]
async fn test_resolve_many_keeps_request_order() {
    let provider = ScriptedProvider::default()
        .with_search("Show", &["s"])
        .with_episodes("s", 2)
        .with_sources("s-ep1", &["http://x/1.mp4"])
        .with_sources("s-ep2", &["http://x/2.mp4"]);
    let resolver = EpisodeResolver::new(provider);
    let requests = vec![
        ResolutionRequest::new(vec!["Show".into()], 1, false),
        ResolutionRequest::new(vec!["Show".into()], 2, false),
        ResolutionRequest::new(vec!["Show".into()], 3, false),
        ResolutionRequest::new(vec!["Show".into()], 0, false),
    ];

    let results = resolver.resolve_many(&requests, &options()).await;

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().sources()[0].url, "http://x/1.mp4");
    assert_eq!(results[1].as_ref().unwrap().sources()[0].url, "http://x/2.mp4");
    assert_eq!(results[2], Ok(Resolution::NotFound));
    assert!(matches!(results[3], Err(ResolveError::InvalidRequest(_))));
}
