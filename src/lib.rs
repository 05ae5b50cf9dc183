//! anisource - find playable episode streams for an anime.
//!
//! Given the names a catalog knows a show by, an episode number and a dub
//! preference, search a content provider under each title variant until one
//! of them leads to playable sources.

pub mod catalog;
pub mod config;
pub mod error;
pub mod player;
pub mod providers;
pub mod resolver;
pub mod titles;
pub mod types;

pub use error::{ProviderError, ResolveError};
pub use providers::{AnimeProvider, Provider, ProviderKind};
pub use resolver::{EpisodeResolver, VariantMiss};
pub use titles::generate_variants;
pub use types::{
    CanonicalTitles, ProviderCandidate, ProviderEpisodeId, Resolution, ResolutionRequest,
    ResolveOptions, VideoSource,
};
