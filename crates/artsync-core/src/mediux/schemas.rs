//! Wire types for the MediUX GraphQL API, plus conversion into the neutral
//! [`ArtSet`] model the engine consumes. The API is Directus-backed, so ids
//! arrive as numbers or strings and timestamps with or without an offset;
//! the deserializers here accept both.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{Deserializer, Error as _};
use serde::Deserialize;

use crate::sets::{
    ArtFile, ArtSet, FileType, SetCollection, SetEpisode, SetMovie, SetSeason, SetShow, TargetRef,
};

pub(super) fn flexible_i64<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }
    match NumberOrString::deserialize(de)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid id '{s}'"))),
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Directus sometimes omits the offset.
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn flexible_datetime_opt<'de, D: Deserializer<'de>>(
    de: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value: Option<String> = Option::deserialize(de)?;
    match value {
        None => Ok(None),
        Some(s) => parse_datetime(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{s}'"))),
    }
}

/// GraphQL response envelope. Errors arrive alongside (or instead of) data.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GqlError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GqlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ShowSetsData {
    #[serde(default)]
    pub show_sets: Vec<RawShowSet>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ShowSetByIdData {
    pub show_sets_by_id: Option<RawShowSet>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MovieSetsData {
    #[serde(default)]
    pub movie_sets: Vec<RawMovieSet>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MovieSetByIdData {
    pub movie_sets_by_id: Option<RawMovieSet>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CollectionSetsData {
    #[serde(default)]
    pub collection_sets: Vec<RawCollectionSet>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CollectionSetByIdData {
    pub collection_sets_by_id: Option<RawCollectionSet>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawIdRef {
    #[serde(deserialize_with = "flexible_i64")]
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawUser {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawFile {
    pub id: String,
    pub file_type: FileType,
    #[serde(default, deserialize_with = "flexible_datetime_opt")]
    pub modified_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub show: Option<RawIdRef>,
    #[serde(default)]
    pub season: Option<RawIdRef>,
    #[serde(default)]
    pub episode: Option<RawIdRef>,
    #[serde(default)]
    pub movie: Option<RawIdRef>,
    #[serde(default)]
    pub collection: Option<RawIdRef>,
}

impl RawFile {
    /// A file targets exactly one entity; files without any target (some
    /// logos and misc art) are dropped during conversion.
    fn target(&self) -> Option<TargetRef> {
        if let Some(r) = &self.episode {
            Some(TargetRef::Episode(r.id))
        } else if let Some(r) = &self.season {
            Some(TargetRef::Season(r.id))
        } else if let Some(r) = &self.show {
            Some(TargetRef::Show(r.id))
        } else if let Some(r) = &self.movie {
            Some(TargetRef::Movie(r.id))
        } else if let Some(r) = &self.collection {
            Some(TargetRef::Collection(r.id))
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RawEpisode {
    #[serde(deserialize_with = "flexible_i64")]
    pub id: i64,
    pub episode_number: u32,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawSeason {
    #[serde(deserialize_with = "flexible_i64")]
    pub id: i64,
    pub season_number: u32,
    #[serde(default)]
    pub episodes: Vec<RawEpisode>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawShow {
    #[serde(rename = "id", deserialize_with = "flexible_i64")]
    pub tmdb_id: i64,
    pub title: String,
    #[serde(default)]
    pub seasons: Vec<RawSeason>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawMovie {
    #[serde(rename = "id", deserialize_with = "flexible_i64")]
    pub tmdb_id: i64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawCollection {
    #[serde(rename = "id", deserialize_with = "flexible_i64")]
    pub tmdb_id: i64,
    #[serde(rename = "collection_name")]
    pub title: String,
    #[serde(default)]
    pub movies: Vec<RawMovie>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawShowSet {
    #[serde(deserialize_with = "flexible_i64")]
    pub id: i64,
    pub set_title: String,
    #[serde(default, deserialize_with = "flexible_datetime_opt")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_datetime_opt")]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<RawFile>,
    #[serde(rename = "show_id")]
    pub show: RawShow,
    pub user_created: RawUser,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawMovieSet {
    #[serde(deserialize_with = "flexible_i64")]
    pub id: i64,
    pub set_title: String,
    #[serde(default, deserialize_with = "flexible_datetime_opt")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_datetime_opt")]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<RawFile>,
    #[serde(rename = "movie_id")]
    pub movie: RawMovie,
    pub user_created: RawUser,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawCollectionSet {
    #[serde(deserialize_with = "flexible_i64")]
    pub id: i64,
    pub set_title: String,
    #[serde(default, deserialize_with = "flexible_datetime_opt")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_datetime_opt")]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<RawFile>,
    #[serde(rename = "collection_id")]
    pub collection: RawCollection,
    pub user_created: RawUser,
}

fn convert_files(
    files: Vec<RawFile>,
    date_updated: Option<DateTime<Utc>>,
    date_created: Option<DateTime<Utc>>,
) -> Vec<ArtFile> {
    // Per-file revision stamp, falling back to the set's own timestamps.
    let set_stamp = date_updated
        .or(date_created)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    files
        .into_iter()
        .filter_map(|f| {
            let target = f.target()?;
            Some(ArtFile {
                id: f.id,
                file_type: f.file_type,
                target,
                last_modified: f.modified_on.unwrap_or(set_stamp),
            })
        })
        .collect()
}

impl From<RawShowSet> for ArtSet {
    fn from(raw: RawShowSet) -> Self {
        ArtSet {
            id: raw.id,
            username: raw.user_created.username,
            title: raw.set_title,
            files: convert_files(raw.files, raw.date_updated, raw.date_created),
            show: Some(SetShow {
                tmdb_id: raw.show.tmdb_id,
                title: raw.show.title,
                seasons: raw
                    .show
                    .seasons
                    .into_iter()
                    .map(|s| SetSeason {
                        id: s.id,
                        number: s.season_number,
                        episodes: s
                            .episodes
                            .into_iter()
                            .map(|e| SetEpisode {
                                id: e.id,
                                number: e.episode_number,
                            })
                            .collect(),
                    })
                    .collect(),
            }),
            movie: None,
            collection: None,
        }
    }
}

impl From<RawMovieSet> for ArtSet {
    fn from(raw: RawMovieSet) -> Self {
        ArtSet {
            id: raw.id,
            username: raw.user_created.username,
            title: raw.set_title,
            files: convert_files(raw.files, raw.date_updated, raw.date_created),
            show: None,
            movie: Some(SetMovie {
                tmdb_id: raw.movie.tmdb_id,
                title: raw.movie.title,
            }),
            collection: None,
        }
    }
}

impl From<RawCollectionSet> for ArtSet {
    fn from(raw: RawCollectionSet) -> Self {
        ArtSet {
            id: raw.id,
            username: raw.user_created.username,
            title: raw.set_title,
            files: convert_files(raw.files, raw.date_updated, raw.date_created),
            show: None,
            movie: None,
            collection: Some(SetCollection {
                tmdb_id: raw.collection.tmdb_id,
                title: raw.collection.title,
                movies: raw
                    .collection
                    .movies
                    .into_iter()
                    .map(|m| SetMovie {
                        tmdb_id: m.tmdb_id,
                        title: m.title,
                    })
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_set_from_wire() {
        let json = r#"{
            "id": "28831",
            "set_title": "Downton Abbey (2010) Set",
            "date_created": "2023-06-11T13:26:58.000Z",
            "date_updated": "2024-01-05T09:00:00.000",
            "files": [
                {
                    "id": "05f1a0a7-18f6-495c-8193-42400d74e4cc",
                    "file_type": "titlecard",
                    "modified_on": "2024-02-01T00:00:00Z",
                    "episode": {"id": 1106251}
                },
                {
                    "id": "poster-asset",
                    "file_type": "poster",
                    "show": {"id": "33907"}
                },
                {
                    "id": "orphan-logo",
                    "file_type": "logo"
                }
            ],
            "show_id": {
                "id": 33907,
                "title": "Downton Abbey",
                "seasons": [
                    {
                        "id": 44727,
                        "season_number": 0,
                        "episodes": [{"id": 779832, "episode_number": 2}]
                    }
                ]
            },
            "user_created": {"username": "JackTaylor803"}
        }"#;

        let raw: RawShowSet = serde_json::from_str(json).unwrap();
        let set: ArtSet = raw.into();

        assert_eq!(set.id, 28831);
        assert_eq!(set.username, "JackTaylor803");
        // Target-less files are dropped.
        assert_eq!(set.files.len(), 2);
        assert_eq!(set.files[0].target, TargetRef::Episode(1106251));
        assert_eq!(set.files[1].target, TargetRef::Show(33907));
        // Per-file stamp when present, set-level fallback otherwise.
        assert_eq!(set.files[0].last_modified.to_rfc3339(), "2024-02-01T00:00:00+00:00");
        assert_eq!(set.files[1].last_modified.to_rfc3339(), "2024-01-05T09:00:00+00:00");

        let show = set.show.unwrap();
        assert_eq!(show.tmdb_id, 33907);
        assert_eq!(show.seasons[0].number, 0);
        assert_eq!(show.seasons[0].episodes[0].id, 779832);
    }

    #[test]
    fn test_collection_set_from_wire() {
        let json = r#"{
            "id": 24404,
            "set_title": "Spider-Verse",
            "date_created": "2023-01-01T00:00:00Z",
            "files": [
                {"id": "c1", "file_type": "poster", "collection": {"id": 573436}},
                {"id": "m1", "file_type": "poster", "movie": {"id": 324857}}
            ],
            "collection_id": {
                "id": 573436,
                "collection_name": "Spider-Man: Spider-Verse Collection",
                "movies": [{"id": 324857, "title": "Spider-Man: Into the Spider-Verse"}]
            },
            "user_created": {"username": "alice"}
        }"#;

        let raw: RawCollectionSet = serde_json::from_str(json).unwrap();
        let set: ArtSet = raw.into();
        assert_eq!(set.collection_file(FileType::Poster).unwrap().id, "c1");
        assert_eq!(set.movie_file(324857, FileType::Poster).unwrap().id, "m1");
        let coll = set.collection.unwrap();
        assert_eq!(coll.movies[0].tmdb_id, 324857);
        // No per-file stamp: falls back to date_created.
        assert_eq!(set.files[0].last_modified.to_rfc3339(), "2023-01-01T00:00:00+00:00");
    }
}
