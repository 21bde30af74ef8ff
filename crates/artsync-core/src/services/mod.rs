//! Destination-service boundary: the capability interface the engine and
//! the CLI drive, plus the Jellyfin and Plex implementations.

pub mod jellyfin;
pub mod plex;

use std::path::Path;

use crate::error::ServiceError;
use crate::media::{Collection, Episode, Movie, Season, Show};

pub use jellyfin::Jellyfin;
pub use plex::Plex;

/// One media-server backend. Shows come back with their season/episode
/// trees populated so the engine can match provider files by number.
pub trait MediaService {
    /// Stable lowercase name, also used for the provenance database file.
    fn name(&self) -> &'static str;

    fn list_shows(&self, skip_libraries: &[String]) -> Result<Vec<Show>, ServiceError>;
    fn get_show(&self, tmdb_id: i64) -> Result<Option<Show>, ServiceError>;
    fn list_seasons(&self, show_id: &str) -> Result<Vec<Season>, ServiceError>;
    fn list_episodes(&self, show_id: &str, season_id: &str)
        -> Result<Vec<Episode>, ServiceError>;

    fn list_movies(&self, skip_libraries: &[String]) -> Result<Vec<Movie>, ServiceError>;
    fn get_movie(&self, tmdb_id: i64) -> Result<Option<Movie>, ServiceError>;

    fn list_collections(&self, skip_libraries: &[String])
        -> Result<Vec<Collection>, ServiceError>;
    fn get_collection(&self, tmdb_id: i64) -> Result<Option<Collection>, ServiceError>;
    fn list_collection_movies(&self, collection_id: &str) -> Result<Vec<Movie>, ServiceError>;

    /// Upload a staged image to an object. Filenames ending in `backdrop`
    /// land in the backdrop/art slot, everything else in the poster slot.
    /// With `kometa_integration` the service also clears any "Overlay"
    /// label so overlay tooling reprocesses the fresh base image.
    fn upload_image(
        &self,
        object_id: &str,
        image: &Path,
        kometa_integration: bool,
    ) -> Result<(), ServiceError>;
}

/// Shared convention for picking the destination slot from the staged
/// filename ("backdrop" / "<movie>-backdrop" vs everything else).
pub(crate) fn is_backdrop(image: &Path) -> bool {
    image
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem.ends_with("backdrop"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_backdrop_by_stem() {
        assert!(is_backdrop(Path::new("/c/shows/x/backdrop.jpg")));
        assert!(is_backdrop(Path::new("/c/collections/x/some-movie-backdrop.jpg")));
        assert!(!is_backdrop(Path::new("/c/shows/x/poster.jpg")));
        assert!(!is_backdrop(Path::new("/c/shows/x/season-01.jpg")));
    }
}
