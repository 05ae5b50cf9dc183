//! Catalog media entries as handed over by the metadata side.
//!
//! Only the fields resolution needs are modelled; everything else in the
//! document is ignored.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::titles::generate_variants;
use crate::types::CanonicalTitles;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntry {
    pub id: Option<u64>,
    pub title: Option<MediaTitle>,
    #[serde(default)]
    pub synonyms: Option<Vec<String>>,
    pub episodes: Option<u32>,
    pub next_airing_episode: Option<AiringEpisode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiringEpisode {
    pub episode: u32,
}

impl MediaEntry {
    /// Read an entry from a JSON file. Accepts either the bare media object
    /// or a GraphQL response shaped like `{"data": {"Media": {...}}}`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read media file {}", path.display()))?;
        Self::from_json(&data)
            .with_context(|| format!("failed to parse media file {}", path.display()))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(data)?;
        let media = match value.pointer("/data/Media") {
            Some(media) => media.clone(),
            None => value,
        };
        Ok(serde_json::from_value(media)?)
    }

    /// Titles without a `title` block yield no names at all, synonyms
    /// included.
    pub fn canonical_titles(&self) -> CanonicalTitles {
        let Some(title) = &self.title else {
            return CanonicalTitles::default();
        };
        CanonicalTitles {
            romaji: title.romaji.clone(),
            english: title.english.clone(),
            synonyms: self.synonyms.clone().unwrap_or_default(),
        }
    }

    pub fn title_variants(&self) -> Vec<String> {
        generate_variants(&self.canonical_titles())
    }

    /// Episodes that have aired so far: one before the next airing episode
    /// while the show is running, otherwise the total count.
    pub fn available_episodes(&self) -> Option<u32> {
        match &self.next_airing_episode {
            Some(next) => Some(next.episode.saturating_sub(1)),
            None => self.episodes,
        }
    }

    /// Display name, English first.
    pub fn display_title(&self) -> String {
        self.title
            .as_ref()
            .and_then(|t| t.english.clone().or_else(|| t.romaji.clone()))
            .unwrap_or_default()
    }
}
