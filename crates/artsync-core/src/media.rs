//! Destination-side view of a library: shows with their seasons and
//! episodes, movies, and collections of movies. Each object that can carry
//! artwork tracks one `*_uploaded` flag per image slot;
//! `all_posters_uploaded` is always derived bottom-up, never stored.

use std::fmt;

/// Which top-level library object a set or entity refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Show,
    Movie,
    Collection,
}

impl MediaKind {
    /// Subdirectory below `covers/` used for staging downloads.
    pub fn cover_dir(&self) -> &'static str {
        match self {
            MediaKind::Show => "shows",
            MediaKind::Movie => "movies",
            MediaKind::Collection => "collections",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Show => "show",
            MediaKind::Movie => "movie",
            MediaKind::Collection => "collection",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Episode {
    /// Destination-service object id (Plex ratingKey / Jellyfin item id).
    pub id: String,
    pub number: u32,
    pub name: String,
    pub title_card_uploaded: bool,
}

impl Episode {
    pub fn new(id: impl Into<String>, number: u32, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            number,
            name: name.into(),
            title_card_uploaded: false,
        }
    }

    pub fn all_posters_uploaded(&self) -> bool {
        self.title_card_uploaded
    }
}

#[derive(Debug, Clone)]
pub struct Season {
    pub id: String,
    pub number: u32,
    pub name: String,
    pub episodes: Vec<Episode>,
    pub poster_uploaded: bool,
}

impl Season {
    pub fn new(id: impl Into<String>, number: u32, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            number,
            name: name.into(),
            episodes: Vec::new(),
            poster_uploaded: false,
        }
    }

    pub fn all_posters_uploaded(&self) -> bool {
        self.poster_uploaded && self.episodes.iter().all(Episode::all_posters_uploaded)
    }
}

#[derive(Debug, Clone)]
pub struct Show {
    pub id: String,
    pub name: String,
    pub year: Option<i32>,
    /// TMDB correlation key shared with the provider.
    pub tmdb_id: i64,
    pub seasons: Vec<Season>,
    pub poster_uploaded: bool,
    pub backdrop_uploaded: bool,
}

impl Show {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        year: Option<i32>,
        tmdb_id: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            year,
            tmdb_id,
            seasons: Vec::new(),
            poster_uploaded: false,
            backdrop_uploaded: false,
        }
    }

    pub fn display_name(&self) -> String {
        display_with_year(&self.name, self.year)
    }

    pub fn all_posters_uploaded(&self) -> bool {
        self.poster_uploaded
            && self.backdrop_uploaded
            && self.seasons.iter().all(Season::all_posters_uploaded)
    }
}

#[derive(Debug, Clone)]
pub struct Movie {
    pub id: String,
    pub name: String,
    pub year: Option<i32>,
    pub tmdb_id: i64,
    pub poster_uploaded: bool,
    pub backdrop_uploaded: bool,
}

impl Movie {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        year: Option<i32>,
        tmdb_id: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            year,
            tmdb_id,
            poster_uploaded: false,
            backdrop_uploaded: false,
        }
    }

    pub fn display_name(&self) -> String {
        display_with_year(&self.name, self.year)
    }

    pub fn all_posters_uploaded(&self) -> bool {
        self.poster_uploaded && self.backdrop_uploaded
    }
}

#[derive(Debug, Clone)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub tmdb_id: i64,
    pub movies: Vec<Movie>,
    pub poster_uploaded: bool,
    pub backdrop_uploaded: bool,
}

impl Collection {
    pub fn new(id: impl Into<String>, name: impl Into<String>, tmdb_id: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tmdb_id,
            movies: Vec::new(),
            poster_uploaded: false,
            backdrop_uploaded: false,
        }
    }

    pub fn all_posters_uploaded(&self) -> bool {
        self.poster_uploaded
            && self.backdrop_uploaded
            && self.movies.iter().all(Movie::all_posters_uploaded)
    }
}

/// One reconcilable entity, tagged by kind.
#[derive(Debug, Clone)]
pub enum Media {
    Show(Show),
    Movie(Movie),
    Collection(Collection),
}

impl Media {
    pub fn kind(&self) -> MediaKind {
        match self {
            Media::Show(_) => MediaKind::Show,
            Media::Movie(_) => MediaKind::Movie,
            Media::Collection(_) => MediaKind::Collection,
        }
    }

    pub fn tmdb_id(&self) -> i64 {
        match self {
            Media::Show(s) => s.tmdb_id,
            Media::Movie(m) => m.tmdb_id,
            Media::Collection(c) => c.tmdb_id,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Media::Show(s) => s.display_name(),
            Media::Movie(m) => m.display_name(),
            Media::Collection(c) => c.name.clone(),
        }
    }

    pub fn all_posters_uploaded(&self) -> bool {
        match self {
            Media::Show(s) => s.all_posters_uploaded(),
            Media::Movie(m) => m.all_posters_uploaded(),
            Media::Collection(c) => c.all_posters_uploaded(),
        }
    }
}

fn display_with_year(name: &str, year: Option<i32>) -> String {
    match year {
        Some(year) if !name.ends_with(&format!("({year})")) => format!("{name} ({year})"),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let show = Show::new("1", "Downton Abbey", Some(2010), 33907);
        assert_eq!(show.display_name(), "Downton Abbey (2010)");

        let show = Show::new("1", "Downton Abbey (2010)", Some(2010), 33907);
        assert_eq!(show.display_name(), "Downton Abbey (2010)");

        let movie = Movie::new("2", "Unknown Year", None, 1);
        assert_eq!(movie.display_name(), "Unknown Year");
    }

    #[test]
    fn test_all_posters_uploaded_is_bottom_up() {
        let mut show = Show::new("1", "Test", Some(2020), 1);
        let mut season = Season::new("2", 1, "Season 1");
        season.episodes.push(Episode::new("3", 1, "Pilot"));
        show.seasons.push(season);

        assert!(!show.all_posters_uploaded());
        show.poster_uploaded = true;
        show.backdrop_uploaded = true;
        assert!(!show.all_posters_uploaded());
        show.seasons[0].poster_uploaded = true;
        assert!(!show.all_posters_uploaded());
        show.seasons[0].episodes[0].title_card_uploaded = true;
        assert!(show.all_posters_uploaded());
    }

    #[test]
    fn test_collection_tracks_member_movies() {
        let mut coll = Collection::new("1", "Spider-Verse", 573436);
        coll.poster_uploaded = true;
        coll.backdrop_uploaded = true;
        assert!(coll.all_posters_uploaded());

        coll.movies.push(Movie::new("2", "Into the Spider-Verse", Some(2018), 324857));
        assert!(!coll.all_posters_uploaded());
        coll.movies[0].poster_uploaded = true;
        coll.movies[0].backdrop_uploaded = true;
        assert!(coll.all_posters_uploaded());
    }
}
