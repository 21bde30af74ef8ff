//! Plex client (raw HTTP, JSON responses). Shows and movies are correlated
//! via their `tmdb://` Guid entries, collections via `tmdb-<id>` labels.
//! Uploads go to `/library/metadata/{id}/posters` or `/arts`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::error::ServiceError;
use crate::media::{Collection, Episode, Movie, Season, Show};
use crate::ratelimit::RateLimiter;
use crate::services::{is_backdrop, MediaService};
use crate::settings::PlexSettings;

// Plex tolerates far less chatter than the provider.
const CALLS: usize = 30;
const PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MediaContainerEnvelope {
    #[serde(rename = "MediaContainer")]
    container: MediaContainer,
}

#[derive(Debug, Default, Deserialize)]
struct MediaContainer {
    #[serde(default, rename = "Directory")]
    directories: Vec<Directory>,
    #[serde(default, rename = "Metadata")]
    metadata: Vec<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Directory {
    key: String,
    title: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    index: Option<u32>,
    #[serde(default, rename = "Guid")]
    guids: Vec<Guid>,
    #[serde(default, rename = "Label")]
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Label {
    tag: String,
}

impl Metadata {
    /// `tmdb://603` Guid entries on shows, movies, seasons, episodes.
    fn guid_tmdb_id(&self) -> Option<i64> {
        self.guids
            .iter()
            .find_map(|g| g.id.strip_prefix("tmdb://"))
            .and_then(|id| id.parse().ok())
    }

    /// Collections carry no Guids; Kometa-style `tmdb-<id>` labels do.
    fn label_tmdb_id(&self) -> Option<i64> {
        self.labels
            .iter()
            .find_map(|l| l.tag.to_lowercase().strip_prefix("tmdb-").map(str::to_string))
            .and_then(|id| id.parse().ok())
    }
}

pub struct Plex {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl Plex {
    pub fn new(settings: &PlexSettings) -> Result<Self, ServiceError> {
        let token = settings
            .token
            .as_deref()
            .ok_or_else(|| ServiceError::Validation("plex token is not configured".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            "X-Plex-Token",
            HeaderValue::from_str(token)
                .map_err(|_| ServiceError::Validation("plex token is not valid ASCII".into()))?,
        );
        let ua = format!(
            "artsync/{}/{}",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        );
        headers.insert(USER_AGENT, HeaderValue::from_str(&ua).expect("static UA"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(CALLS, PERIOD),
        })
    }

    pub fn validate(&self) -> bool {
        match self.list_libraries("movie", &[]) {
            Ok(_) => true,
            Err(err) => {
                warn!("[Plex] {err}");
                false
            }
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        self.limiter.acquire();
        let response = self
            .client
            .get(format!("{}{endpoint}", self.base_url))
            .query(params)
            .send()
            .map_err(ServiceError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), message));
        }
        response
            .json()
            .map_err(|err| ServiceError::Validation(err.to_string()))
    }

    fn list_libraries(
        &self,
        kind: &str,
        skip_libraries: &[String],
    ) -> Result<Vec<Directory>, ServiceError> {
        let envelope: MediaContainerEnvelope = self.get_json("/library/sections", &[])?;
        Ok(envelope
            .container
            .directories
            .into_iter()
            .filter(|d| d.kind == kind)
            .filter(|d| !skip_libraries.contains(&d.title))
            .collect())
    }

    fn children(&self, rating_key: &str) -> Result<Vec<Metadata>, ServiceError> {
        let envelope: MediaContainerEnvelope = self.get_json(
            &format!("/library/metadata/{rating_key}/children"),
            &[("includeGuids", "1".to_string())],
        )?;
        Ok(envelope.container.metadata)
    }

    fn build_show(&self, meta: Metadata, tmdb: i64) -> Result<Show, ServiceError> {
        let mut show = Show::new(meta.rating_key, meta.title, meta.year, tmdb);
        for mut season in self.list_seasons(&show.id)? {
            season.episodes = self.list_episodes(&show.id, &season.id)?;
            show.seasons.push(season);
        }
        Ok(show)
    }

    fn shows(
        &self,
        skip_libraries: &[String],
        tmdb_id: Option<i64>,
    ) -> Result<Vec<Show>, ServiceError> {
        let mut output = Vec::new();
        for library in self.list_libraries("show", skip_libraries)? {
            let envelope: MediaContainerEnvelope = self.get_json(
                &format!("/library/sections/{}/all", library.key),
                &[("includeGuids", "1".to_string())],
            )?;
            for meta in envelope.container.metadata {
                let Some(tmdb) = meta.guid_tmdb_id() else {
                    continue;
                };
                if tmdb_id.is_some_and(|wanted| wanted != tmdb) {
                    continue;
                }
                output.push(self.build_show(meta, tmdb)?);
            }
        }
        Ok(output)
    }

    fn movies(
        &self,
        skip_libraries: &[String],
        tmdb_id: Option<i64>,
    ) -> Result<Vec<Movie>, ServiceError> {
        let mut output = Vec::new();
        for library in self.list_libraries("movie", skip_libraries)? {
            let envelope: MediaContainerEnvelope = self.get_json(
                &format!("/library/sections/{}/all", library.key),
                &[("includeGuids", "1".to_string())],
            )?;
            for meta in envelope.container.metadata {
                let Some(tmdb) = meta.guid_tmdb_id() else {
                    continue;
                };
                if tmdb_id.is_some_and(|wanted| wanted != tmdb) {
                    continue;
                }
                output.push(Movie::new(meta.rating_key, meta.title, meta.year, tmdb));
            }
        }
        Ok(output)
    }

    fn collections(
        &self,
        skip_libraries: &[String],
        tmdb_id: Option<i64>,
    ) -> Result<Vec<Collection>, ServiceError> {
        let mut output = Vec::new();
        for library in self.list_libraries("movie", skip_libraries)? {
            let envelope: MediaContainerEnvelope = self.get_json(
                &format!("/library/sections/{}/collections", library.key),
                &[("includeGuids", "1".to_string())],
            )?;
            for meta in envelope.container.metadata {
                let Some(tmdb) = meta.label_tmdb_id() else {
                    continue;
                };
                if tmdb_id.is_some_and(|wanted| wanted != tmdb) {
                    continue;
                }
                let mut collection = Collection::new(meta.rating_key, meta.title, tmdb);
                collection.movies = self.list_collection_movies(&collection.id)?;
                output.push(collection);
            }
        }
        Ok(output)
    }
}

impl MediaService for Plex {
    fn name(&self) -> &'static str {
        "plex"
    }

    fn list_shows(&self, skip_libraries: &[String]) -> Result<Vec<Show>, ServiceError> {
        self.shows(skip_libraries, None)
    }

    fn get_show(&self, tmdb_id: i64) -> Result<Option<Show>, ServiceError> {
        Ok(self.shows(&[], Some(tmdb_id))?.into_iter().next())
    }

    fn list_seasons(&self, show_id: &str) -> Result<Vec<Season>, ServiceError> {
        Ok(self
            .children(show_id)?
            .into_iter()
            .filter_map(|meta| {
                meta.index
                    .map(|number| Season::new(meta.rating_key, number, meta.title))
            })
            .collect())
    }

    fn list_episodes(
        &self,
        _show_id: &str,
        season_id: &str,
    ) -> Result<Vec<Episode>, ServiceError> {
        Ok(self
            .children(season_id)?
            .into_iter()
            .filter_map(|meta| {
                meta.index
                    .map(|number| Episode::new(meta.rating_key, number, meta.title))
            })
            .collect())
    }

    fn list_movies(&self, skip_libraries: &[String]) -> Result<Vec<Movie>, ServiceError> {
        self.movies(skip_libraries, None)
    }

    fn get_movie(&self, tmdb_id: i64) -> Result<Option<Movie>, ServiceError> {
        Ok(self.movies(&[], Some(tmdb_id))?.into_iter().next())
    }

    fn list_collections(
        &self,
        skip_libraries: &[String],
    ) -> Result<Vec<Collection>, ServiceError> {
        self.collections(skip_libraries, None)
    }

    fn get_collection(&self, tmdb_id: i64) -> Result<Option<Collection>, ServiceError> {
        Ok(self.collections(&[], Some(tmdb_id))?.into_iter().next())
    }

    fn list_collection_movies(&self, collection_id: &str) -> Result<Vec<Movie>, ServiceError> {
        Ok(self
            .children(collection_id)?
            .into_iter()
            .filter_map(|meta| {
                meta.guid_tmdb_id()
                    .map(|tmdb| Movie::new(meta.rating_key, meta.title, meta.year, tmdb))
            })
            .collect())
    }

    fn upload_image(
        &self,
        object_id: &str,
        image: &Path,
        kometa_integration: bool,
    ) -> Result<(), ServiceError> {
        let endpoint = if is_backdrop(image) { "arts" } else { "posters" };
        let body = fs::read(image)?;

        self.limiter.acquire();
        let response = self
            .client
            .post(format!(
                "{}/library/metadata/{object_id}/{endpoint}",
                self.base_url
            ))
            .body(body)
            .send()
            .map_err(ServiceError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), message));
        }

        if kometa_integration {
            // Clear Kometa's marker so the fresh base image gets reprocessed
            // instead of staying hidden under a stale overlay.
            self.limiter.acquire();
            let response = self
                .client
                .put(format!("{}/library/metadata/{object_id}", self.base_url))
                .query(&[("label[].tag.tag-", "Overlay")])
                .send()
                .map_err(ServiceError::from_transport)?;
            if !response.status().is_success() {
                warn!(
                    "[Plex] failed to clear Overlay label on {object_id}: HTTP {}",
                    response.status()
                );
            }
        }
        Ok(())
    }
}
