//! Jellyfin client. Items are correlated to the provider via the `Tmdb`
//! entry in `ProviderIds`; images are uploaded base64-encoded to the
//! `Primary`/`Backdrop` image endpoints.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::error::ServiceError;
use crate::media::{Collection, Episode, Movie, Season, Show};
use crate::services::{is_backdrop, MediaService};
use crate::settings::JellyfinSettings;

#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default, rename = "Items")]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Item {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    production_year: Option<i32>,
    #[serde(default)]
    index_number: Option<u32>,
    #[serde(default)]
    provider_ids: HashMap<String, String>,
    #[serde(default)]
    collection_type: Option<String>,
}

impl Item {
    fn tmdb_id(&self) -> Option<i64> {
        self.provider_ids.get("Tmdb")?.parse().ok()
    }
}

pub struct Jellyfin {
    client: Client,
    base_url: String,
}

impl Jellyfin {
    pub fn new(settings: &JellyfinSettings) -> Result<Self, ServiceError> {
        let token = settings
            .token
            .as_deref()
            .ok_or_else(|| ServiceError::Validation("jellyfin token is not configured".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            "X-Emby-Token",
            HeaderValue::from_str(token)
                .map_err(|_| ServiceError::Validation("jellyfin token is not valid ASCII".into()))?,
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
        })
    }

    pub fn validate(&self) -> bool {
        match self.list_libraries("movies", &[]) {
            Ok(_) => true,
            Err(err) => {
                warn!("[Jellyfin] {err}");
                false
            }
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, ServiceError> {
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
        collection_type: &str,
        skip_libraries: &[String],
    ) -> Result<Vec<Item>, ServiceError> {
        let page: ItemsPage = self.get_json("/Library/MediaFolders", &[])?;
        Ok(page
            .items
            .into_iter()
            .filter(|item| item.collection_type.as_deref() == Some(collection_type))
            .filter(|item| !skip_libraries.contains(&item.name))
            .collect())
    }

    fn list_items(
        &self,
        library_id: &str,
        item_type: &str,
        tmdb_id: Option<i64>,
    ) -> Result<Vec<(Item, i64)>, ServiceError> {
        let page: ItemsPage = self.get_json(
            "/Items",
            &[
                ("hasTmdbId", "true".to_string()),
                ("fields", "ProviderIds".to_string()),
                ("ParentId", library_id.to_string()),
                ("Recursive", "true".to_string()),
                ("IncludeItemTypes", item_type.to_string()),
            ],
        )?;
        Ok(page
            .items
            .into_iter()
            .filter_map(|item| item.tmdb_id().map(|tmdb| (item, tmdb)))
            .filter(|(_, tmdb)| tmdb_id.map_or(true, |wanted| *tmdb == wanted))
            .collect())
    }

    fn build_show(&self, item: Item, tmdb: i64) -> Result<Show, ServiceError> {
        let mut show = Show::new(item.id, item.name, item.production_year, tmdb);
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
        for library in self.list_libraries("tvshows", skip_libraries)? {
            for (item, tmdb) in self.list_items(&library.id, "Series", tmdb_id)? {
                output.push(self.build_show(item, tmdb)?);
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
        for library in self.list_libraries("movies", skip_libraries)? {
            for (item, tmdb) in self.list_items(&library.id, "Movie", tmdb_id)? {
                output.push(Movie::new(item.id, item.name, item.production_year, tmdb));
            }
        }
        Ok(output)
    }
}

impl MediaService for Jellyfin {
    fn name(&self) -> &'static str {
        "jellyfin"
    }

    fn list_shows(&self, skip_libraries: &[String]) -> Result<Vec<Show>, ServiceError> {
        self.shows(skip_libraries, None)
    }

    fn get_show(&self, tmdb_id: i64) -> Result<Option<Show>, ServiceError> {
        Ok(self.shows(&[], Some(tmdb_id))?.into_iter().next())
    }

    fn list_seasons(&self, show_id: &str) -> Result<Vec<Season>, ServiceError> {
        let page: ItemsPage = self.get_json(
            &format!("/Shows/{show_id}/Seasons"),
            &[("fields", "ProviderIds".to_string())],
        )?;
        // Items without an index can't be matched by number; skip them.
        Ok(page
            .items
            .into_iter()
            .filter_map(|item| {
                item.index_number
                    .map(|number| Season::new(item.id, number, item.name))
            })
            .collect())
    }

    fn list_episodes(
        &self,
        show_id: &str,
        season_id: &str,
    ) -> Result<Vec<Episode>, ServiceError> {
        let page: ItemsPage = self.get_json(
            &format!("/Shows/{show_id}/Episodes"),
            &[
                ("seasonId", season_id.to_string()),
                ("fields", "ProviderIds".to_string()),
            ],
        )?;
        Ok(page
            .items
            .into_iter()
            .filter_map(|item| {
                item.index_number
                    .map(|number| Episode::new(item.id, number, item.name))
            })
            .collect())
    }

    fn list_movies(&self, skip_libraries: &[String]) -> Result<Vec<Movie>, ServiceError> {
        self.movies(skip_libraries, None)
    }

    fn get_movie(&self, tmdb_id: i64) -> Result<Option<Movie>, ServiceError> {
        Ok(self.movies(&[], Some(tmdb_id))?.into_iter().next())
    }

    // Jellyfin has no collection surface worth driving here; mirror the
    // movie-library behavior with empty results.
    fn list_collections(&self, _skip_libraries: &[String]) -> Result<Vec<Collection>, ServiceError> {
        Ok(Vec::new())
    }

    fn get_collection(&self, _tmdb_id: i64) -> Result<Option<Collection>, ServiceError> {
        Ok(None)
    }

    fn list_collection_movies(&self, _collection_id: &str) -> Result<Vec<Movie>, ServiceError> {
        Ok(Vec::new())
    }

    fn upload_image(
        &self,
        object_id: &str,
        image: &Path,
        _kometa_integration: bool,
    ) -> Result<(), ServiceError> {
        let image_type = if is_backdrop(image) { "Backdrop" } else { "Primary" };
        let mime = mime_guess::from_path(image)
            .first_or(mime_guess::mime::IMAGE_JPEG)
            .to_string();
        let body = BASE64.encode(fs::read(image)?);

        let response = self
            .client
            .post(format!(
                "{}/Items/{object_id}/Images/{image_type}",
                self.base_url
            ))
            .header(CONTENT_TYPE, mime)
            .body(body)
            .send()
            .map_err(ServiceError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), message));
        }
        Ok(())
    }
}
