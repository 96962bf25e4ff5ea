//! Host-facing item model and identity fingerprinting.

use crate::config::EpisodeStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
    Episode,
}

/// One on-screen item as the host reports it. `tmdb_id`/`imdb_id` are hints
/// the host already knows (media servers carry them in item metadata); the
/// remaining provider identifiers are resolved by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub title: String,
    pub year: Option<i32>,
    pub series_title: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Host-assigned stable id, preferred for identity when present.
    pub host_item_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub imdb_id: Option<String>,
}

impl MediaItem {
    pub fn movie(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            kind: MediaKind::Movie,
            title: title.into(),
            year,
            series_title: None,
            season: None,
            episode: None,
            host_item_id: None,
            tmdb_id: None,
            imdb_id: None,
        }
    }

    /// Stable fingerprint used to recognize "same logical item" across
    /// re-renders and to memoize resolution.
    pub fn identity_key(&self) -> IdentityKey {
        if let Some(id) = &self.host_item_id {
            return IdentityKey(format!("host:{}", id));
        }
        let kind = match self.kind {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
            MediaKind::Episode => "episode",
        };
        IdentityKey(format!(
            "{}|{}|{}|{}|{}|{}",
            kind,
            self.series_title.as_deref().unwrap_or(""),
            self.title,
            self.year.map(|y| y.to_string()).unwrap_or_default(),
            self.season.map(|s| s.to_string()).unwrap_or_default(),
            self.episode.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    /// Apply the episode strategy: with `Series`, an episode observation is
    /// rated as its parent series. The host-assigned id is dropped in that
    /// case so every episode of one series shares an identity.
    pub fn folded(&self, strategy: EpisodeStrategy) -> MediaItem {
        if self.kind != MediaKind::Episode || strategy != EpisodeStrategy::Series {
            return self.clone();
        }
        MediaItem {
            kind: MediaKind::Series,
            title: self
                .series_title
                .clone()
                .unwrap_or_else(|| self.title.clone()),
            year: self.year,
            series_title: None,
            season: None,
            episode: None,
            host_item_id: None,
            tmdb_id: self.tmdb_id.clone(),
            imdb_id: self.imdb_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey(pub String);

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
