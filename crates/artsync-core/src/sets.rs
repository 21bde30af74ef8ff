//! Provider-side view of one community artwork submission: a set of files,
//! each targeting exactly one show/season/episode/collection/movie, plus the
//! provider's own entity tree so files can be matched to destination objects
//! by season/episode number and movie tmdb id.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Image slot category. The string tags double as the provenance-table
/// `type` column, so they must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Poster,
    Backdrop,
    TitleCard,
    Logo,
    Misc,
    Album,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Poster => "poster",
            FileType::Backdrop => "backdrop",
            FileType::TitleCard => "titlecard",
            FileType::Logo => "logo",
            FileType::Misc => "misc",
            FileType::Album => "album",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single provider entity a file applies to. Ids are provider-side:
/// opaque for shows/seasons/episodes, tmdb ids for movies and collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef {
    Show(i64),
    Season(i64),
    Episode(i64),
    Collection(i64),
    Movie(i64),
}

#[derive(Debug, Clone)]
pub struct ArtFile {
    /// Opaque asset handle, used to download the image bytes.
    pub id: String,
    pub file_type: FileType,
    pub target: TargetRef,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SetEpisode {
    pub id: i64,
    pub number: u32,
}

#[derive(Debug, Clone)]
pub struct SetSeason {
    pub id: i64,
    pub number: u32,
    pub episodes: Vec<SetEpisode>,
}

#[derive(Debug, Clone)]
pub struct SetShow {
    pub tmdb_id: i64,
    pub title: String,
    pub seasons: Vec<SetSeason>,
}

#[derive(Debug, Clone)]
pub struct SetMovie {
    pub tmdb_id: i64,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct SetCollection {
    pub tmdb_id: i64,
    pub title: String,
    pub movies: Vec<SetMovie>,
}

/// One community submission, already scoped to a single show, movie, or
/// collection by the provider query that produced it.
#[derive(Debug, Clone)]
pub struct ArtSet {
    pub id: i64,
    /// Creator username; input to the priority ranking.
    pub username: String,
    pub title: String,
    pub files: Vec<ArtFile>,
    pub show: Option<SetShow>,
    pub movie: Option<SetMovie>,
    pub collection: Option<SetCollection>,
}

impl ArtSet {
    /// File of the given type targeting the set's show.
    pub fn show_file(&self, file_type: FileType) -> Option<&ArtFile> {
        self.files
            .iter()
            .find(|f| f.file_type == file_type && matches!(f.target, TargetRef::Show(_)))
    }

    /// Season poster for a provider-side season id.
    pub fn season_file(&self, season_id: i64) -> Option<&ArtFile> {
        self.files.iter().find(|f| {
            f.file_type == FileType::Poster && f.target == TargetRef::Season(season_id)
        })
    }

    /// Episode title card for a provider-side episode id.
    pub fn episode_file(&self, episode_id: i64) -> Option<&ArtFile> {
        self.files.iter().find(|f| {
            f.file_type == FileType::TitleCard && f.target == TargetRef::Episode(episode_id)
        })
    }

    /// File of the given type targeting the set's collection.
    pub fn collection_file(&self, file_type: FileType) -> Option<&ArtFile> {
        self.files
            .iter()
            .find(|f| f.file_type == file_type && matches!(f.target, TargetRef::Collection(_)))
    }

    /// File of the given type for a movie, matched by tmdb id.
    pub fn movie_file(&self, tmdb_id: i64, file_type: FileType) -> Option<&ArtFile> {
        self.files
            .iter()
            .find(|f| f.file_type == file_type && f.target == TargetRef::Movie(tmdb_id))
    }
}
