//! Random playable track resolution over a fixed three-tier fallback chain
//!
//! 1. the curated playlist,
//! 2. a genre/year search,
//! 3. a broader "new + genre" search.
//!
//! A tier only falls through when it yields zero playable candidates. A
//! failed request aborts the chain instead of being treated as "empty".

use rand::Rng;

use crate::config::CatalogConfig;
use super::api::{ApiFailure, CatalogApi, CatalogTrack};
use super::error::GameError;
use super::types::{Credential, Track};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Playlist,
    GenreYearSearch,
    NewGenreSearch,
}

impl Tier {
    pub const CHAIN: [Tier; 3] = [Tier::Playlist, Tier::GenreYearSearch, Tier::NewGenreSearch];

    fn label(self) -> &'static str {
        match self {
            Tier::Playlist => "playlist",
            Tier::GenreYearSearch => "genre-year search",
            Tier::NewGenreSearch => "new-genre search",
        }
    }
}

pub struct TrackCatalogResolver<C> {
    catalog: C,
    config: CatalogConfig,
}

impl<C: CatalogApi> TrackCatalogResolver<C> {
    pub fn new(catalog: C, config: CatalogConfig) -> Self {
        Self { catalog, config }
    }

    pub async fn resolve(&self, credential: &Credential) -> Result<Track, GameError> {
        if !credential.has_access_token() {
            return Err(GameError::NotSignedIn);
        }

        for tier in Tier::CHAIN {
            let candidates = self
                .fetch(tier, &credential.access_token)
                .await
                .map_err(|failure| {
                    tracing::error!(tier = tier.label(), status = ?failure.status, error = %failure, "Track fetch failed");
                    GameError::from_catalog(failure)
                })?;

            let total = candidates.len();
            let playable: Vec<CatalogTrack> = candidates.into_iter().filter(CatalogTrack::is_playable).collect();
            tracing::info!(tier = tier.label(), total, playable = playable.len(), "Fetched candidate tracks");

            let picked = pick_random(playable, &mut rand::thread_rng());
            if let Some(candidate) = picked {
                let track = candidate.into_track();
                tracing::info!(tier = tier.label(), track_id = %track.id, "Resolved track");
                return Ok(track);
            }
        }

        tracing::warn!("No playable track in any tier");
        Err(GameError::NoPlayableTrack)
    }

    async fn fetch(&self, tier: Tier, access_token: &str) -> Result<Vec<CatalogTrack>, ApiFailure> {
        let market = self.config.market.as_str();
        let limit = self.config.candidate_limit;
        match tier {
            Tier::Playlist => {
                self.catalog
                    .playlist_tracks(access_token, &self.config.playlist_id, market, limit)
                    .await
            }
            Tier::GenreYearSearch => {
                self.catalog
                    .search_tracks(access_token, &self.config.genre_year_query, market, limit)
                    .await
            }
            Tier::NewGenreSearch => {
                self.catalog
                    .search_tracks(access_token, &self.config.new_genre_query, market, limit)
                    .await
            }
        }
    }
}

/// Uniform pick over the pool
pub fn pick_random<T, R: Rng + ?Sized>(mut pool: Vec<T>, rng: &mut R) -> Option<T> {
    if pool.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..pool.len());
    Some(pool.swap_remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candidates, FakeCatalog};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn resolver(catalog: FakeCatalog) -> TrackCatalogResolver<FakeCatalog> {
        TrackCatalogResolver::new(catalog, CatalogConfig::default())
    }

    #[tokio::test]
    async fn first_tier_with_playable_tracks_wins() {
        let catalog = FakeCatalog::new()
            .with_playlist(Ok(candidates("p", 50, 5)))
            .with_search("genre:turkish-pop year:2024", Ok(candidates("s", 50, 50)));
        let resolver = resolver(catalog.clone());

        let track = resolver.resolve(&Credential::new("token")).await.unwrap();

        assert!(track.id.starts_with("p-"));
        assert_eq!(catalog.playlist_calls(), 1);
        assert!(catalog.search_calls().is_empty());
    }

    #[tokio::test]
    async fn falls_through_to_second_tier_and_skips_third() {
        let catalog = FakeCatalog::new()
            .with_playlist(Ok(candidates("p", 50, 0)))
            .with_search("genre:turkish-pop year:2024", Ok(candidates("s", 50, 3)))
            .with_search("tag:new genre:pop market:TR", Ok(candidates("n", 50, 50)));
        let resolver = resolver(catalog.clone());

        let track = resolver.resolve(&Credential::new("token")).await.unwrap();

        assert!(["s-0", "s-1", "s-2"].contains(&track.id.as_str()));
        assert_eq!(catalog.search_calls(), vec!["genre:turkish-pop year:2024".to_string()]);
    }

    #[tokio::test]
    async fn third_tier_is_last_resort() {
        let catalog = FakeCatalog::new()
            .with_playlist(Ok(Vec::new()))
            .with_search("genre:turkish-pop year:2024", Ok(candidates("s", 20, 0)))
            .with_search("tag:new genre:pop market:TR", Ok(candidates("n", 10, 1)));

        let track = resolver(catalog).resolve(&Credential::new("token")).await.unwrap();
        assert_eq!(track.id, "n-0");
        assert_eq!(track.play_uri, "spotify:track:n-0");
    }

    #[tokio::test]
    async fn all_tiers_empty_is_no_playable_track() {
        let catalog = FakeCatalog::new()
            .with_playlist(Ok(candidates("p", 50, 0)))
            .with_search("genre:turkish-pop year:2024", Ok(candidates("s", 50, 0)))
            .with_search("tag:new genre:pop market:TR", Ok(Vec::new()));

        let err = resolver(catalog).resolve(&Credential::new("token")).await.unwrap_err();
        assert_eq!(err, GameError::NoPlayableTrack);
    }

    #[tokio::test]
    async fn unauthorized_short_circuits_remaining_tiers() {
        let catalog = FakeCatalog::new()
            .with_playlist(Err(ApiFailure::status(401, "Invalid access token")))
            .with_search("genre:turkish-pop year:2024", Ok(candidates("s", 5, 5)));

        let err = resolver(catalog.clone()).resolve(&Credential::new("token")).await.unwrap_err();

        assert!(err.is_auth());
        assert!(catalog.search_calls().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_propagates_instead_of_falling_through() {
        let catalog = FakeCatalog::new()
            .with_playlist(Ok(Vec::new()))
            .with_search("genre:turkish-pop year:2024", Err(ApiFailure::status(500, "Server error")))
            .with_search("tag:new genre:pop market:TR", Ok(candidates("n", 5, 5)));

        let err = resolver(catalog.clone()).resolve(&Credential::new("token")).await.unwrap_err();

        assert_eq!(err, GameError::Catalog { status: Some(500), message: "Server error".into() });
        assert_eq!(catalog.search_calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_token_is_rejected_without_network() {
        let catalog = FakeCatalog::new();
        let err = resolver(catalog.clone()).resolve(&Credential::new("")).await.unwrap_err();
        assert_eq!(err, GameError::NotSignedIn);
        assert_eq!(catalog.playlist_calls(), 0);
    }

    #[test]
    fn selection_is_uniform_over_the_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0usize; 4];
        let trials = 40_000;
        for _ in 0..trials {
            let picked = pick_random(vec![0usize, 1, 2, 3], &mut rng).unwrap();
            counts[picked] += 1;
        }
        for count in counts {
            let frequency = count as f64 / trials as f64;
            assert!((frequency - 0.25).abs() < 0.02, "frequency {} too far from 1/4", frequency);
        }
        assert_eq!(pick_random(Vec::<u8>::new(), &mut rng), None);
    }
}
