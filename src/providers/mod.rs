//! Rating backends.
//!
//! Each adapter turns one upstream wire format into `RawRating`s through the
//! resilient client. An adapter with nothing for an item returns an empty
//! vec — a normal outcome, distinct from a transport failure.

pub mod anilist;
pub mod jikan;
pub mod mdblist;
pub mod rotten_tomatoes;
pub mod wikidata;

pub use anilist::AniListProvider;
pub use jikan::JikanProvider;
pub use mdblist::MdblistProvider;
pub use rotten_tomatoes::RottenTomatoesProvider;
pub use wikidata::WikidataResolver;

use crate::media::MediaItem;
use crate::shared::errors::EngineResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Imdb,
    Tmdb,
    Trakt,
    Letterboxd,
    RottenTomatoesCritic,
    RottenTomatoesAudience,
    MetacriticCritic,
    MetacriticUser,
    RogerEbert,
    #[serde(rename = "anilist")]
    AniList,
    #[serde(rename = "myanimelist")]
    MyAnimeList,
}

impl ProviderId {
    /// Fixed multiplier taking this provider's native scale to ~0-100.
    pub fn scale(self) -> f64 {
        match self {
            ProviderId::Imdb => 10.0,
            ProviderId::Tmdb => 10.0,
            ProviderId::Trakt => 1.0,
            ProviderId::Letterboxd => 20.0,
            ProviderId::RottenTomatoesCritic => 1.0,
            ProviderId::RottenTomatoesAudience => 1.0,
            ProviderId::MetacriticCritic => 1.0,
            ProviderId::MetacriticUser => 10.0,
            ProviderId::RogerEbert => 25.0,
            ProviderId::AniList => 1.0,
            ProviderId::MyAnimeList => 10.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProviderId::Imdb => "IMDb",
            ProviderId::Tmdb => "TMDb",
            ProviderId::Trakt => "Trakt",
            ProviderId::Letterboxd => "Letterboxd",
            ProviderId::RottenTomatoesCritic => "RT Critic",
            ProviderId::RottenTomatoesAudience => "RT Audience",
            ProviderId::MetacriticCritic => "Metascore",
            ProviderId::MetacriticUser => "Metacritic User",
            ProviderId::RogerEbert => "Roger Ebert",
            ProviderId::AniList => "AniList",
            ProviderId::MyAnimeList => "MAL",
        }
    }
}

/// Provider-specific external ids for one item. The tmdb/imdb hints come
/// from the host; the rest are resolved once and cached long-term since
/// title→id mappings rarely change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIds {
    pub tmdb: Option<String>,
    pub imdb: Option<String>,
    pub anilist: Option<String>,
    pub mal: Option<String>,
    /// Rotten Tomatoes path, e.g. `m/the_matrix`.
    pub rotten_tomatoes: Option<String>,
}

/// One provider's score before scale conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRating {
    pub provider: ProviderId,
    pub raw_value: f64,
    pub vote_count: Option<u64>,
    pub link: Option<String>,
}

#[async_trait]
pub trait RatingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch whatever this backend knows about the item. Empty vec means
    /// "no data", not failure.
    async fn fetch_ratings(
        &self,
        item: &MediaItem,
        ids: &ProviderIds,
    ) -> EngineResult<Vec<RawRating>>;
}

/// URL slug in the shape critic sites use: lowercase, alphanumeric runs
/// joined by single dashes.
pub(crate) fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_match_provider_docs() {
        assert_eq!(ProviderId::Imdb.scale(), 10.0);
        assert_eq!(ProviderId::Letterboxd.scale(), 20.0);
        assert_eq!(ProviderId::RogerEbert.scale(), 25.0);
        assert_eq!(ProviderId::AniList.scale(), 1.0);
    }

    #[test]
    fn slug_collapses_punctuation() {
        assert_eq!(slug("The Matrix"), "the-matrix");
        assert_eq!(slug("  Blade Runner: 2049!"), "blade-runner-2049");
        assert_eq!(slug("---"), "");
    }

    #[test]
    fn display_labels() {
        assert_eq!(ProviderId::RottenTomatoesCritic.label(), "RT Critic");
        assert_eq!(ProviderId::MetacriticCritic.label(), "Metascore");
        assert_eq!(ProviderId::MyAnimeList.label(), "MAL");
    }

    #[test]
    fn provider_id_serde_names() {
        assert_eq!(
            serde_json::to_string(&ProviderId::RottenTomatoesCritic).unwrap(),
            "\"rotten_tomatoes_critic\""
        );
        assert_eq!(
            serde_json::from_str::<ProviderId>("\"myanimelist\"").unwrap(),
            ProviderId::MyAnimeList
        );
    }
}
