//! MediUX provider client: ranked set listings over GraphQL and asset
//! downloads to the local staging directory.

mod schemas;

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::ServiceError;
use crate::media::MediaKind;
use crate::sets::ArtSet;
use crate::settings::MediuxSettings;
use crate::ratelimit::RateLimiter;

use schemas::{
    CollectionSetByIdData, CollectionSetsData, Envelope, MovieSetByIdData, MovieSetsData,
    ShowSetByIdData, ShowSetsData,
};

// 60 calls per minute, matching the provider's published limit.
const CALLS: usize = 60;
const PERIOD: Duration = Duration::from_secs(60);

const SHOW_FIELDS: &str = "\
date_created date_updated id set_title \
files { id file_type modified_on show { id } season { id } episode { id } } \
show_id { id title seasons { id season_number episodes { id episode_number } } } \
user_created { username }";

const MOVIE_FIELDS: &str = "\
date_created date_updated id set_title \
files { id file_type modified_on movie { id } } \
movie_id { id title } \
user_created { username }";

const COLLECTION_FIELDS: &str = "\
date_created date_updated id set_title \
files { id file_type modified_on movie { id } collection { id } } \
collection_id { id collection_name movies { id title } } \
user_created { username }";

/// Metadata-provider boundary consumed by the reconciliation engine.
pub trait ArtProvider {
    fn list_sets(
        &self,
        kind: MediaKind,
        tmdb_id: i64,
        exclude_usernames: &[String],
    ) -> Result<Vec<ArtSet>, ServiceError>;

    fn get_set(&self, kind: MediaKind, set_id: i64) -> Result<Option<ArtSet>, ServiceError>;

    /// Stream an asset's bytes to `output`, replacing any stale copy.
    fn download_asset(&self, file_id: &str, output: &Path) -> Result<(), ServiceError>;
}

pub struct Mediux {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl Mediux {
    pub fn new(settings: &MediuxSettings) -> Result<Self, ServiceError> {
        let api_key = settings
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::Validation("mediux api key is not configured".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let auth = format!("Bearer {api_key}");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ServiceError::Validation("api key is not valid ASCII".into()))?,
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

    /// Cheap connectivity/auth probe: list sets for a known movie.
    pub fn validate(&self) -> bool {
        match self.list_movie_sets(324857, &[]) {
            Ok(results) => !results.is_empty(),
            Err(err) => {
                warn!("[Mediux] {err}");
                false
            }
        }
    }

    fn graphql<T: DeserializeOwned>(&self, query: String) -> Result<T, ServiceError> {
        self.limiter.acquire();
        let response = self
            .client
            .post(format!("{}/graphql", self.base_url))
            .json(&serde_json::json!({ "query": query }))
            .send()
            .map_err(ServiceError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), message));
        }

        let envelope: Envelope<T> = response
            .json()
            .map_err(|err| ServiceError::Validation(err.to_string()))?;
        if let Some(err) = envelope.errors.first() {
            return Err(ServiceError::Validation(err.message.clone()));
        }
        envelope
            .data
            .ok_or_else(|| ServiceError::Validation("response carried no data".into()))
    }

    fn list_query(
        sets_field: &str,
        id_field: &str,
        fields: &str,
        tmdb_id: i64,
        exclude_usernames: &[String],
    ) -> String {
        let mut filter = format!(r#"{id_field}: {{ id: {{ _eq: "{tmdb_id}" }} }}"#);
        if !exclude_usernames.is_empty() {
            let names = serde_json::to_string(exclude_usernames).expect("string list");
            filter.push_str(&format!(
                r#", user_created: {{ username: {{ _nin: {names} }} }}"#
            ));
        }
        format!("query {{ {sets_field}(filter: {{ {filter} }}) {{ {fields} }} }}")
    }

    fn get_query(by_id_field: &str, fields: &str, set_id: i64) -> String {
        format!("query {{ {by_id_field}(id: {set_id}) {{ {fields} }} }}")
    }

    pub fn list_show_sets(
        &self,
        tmdb_id: i64,
        exclude_usernames: &[String],
    ) -> Result<Vec<ArtSet>, ServiceError> {
        let query =
            Self::list_query("show_sets", "show_id", SHOW_FIELDS, tmdb_id, exclude_usernames);
        let data: ShowSetsData = self.graphql(query)?;
        Ok(data.show_sets.into_iter().map(ArtSet::from).collect())
    }

    pub fn get_show_set(&self, set_id: i64) -> Result<Option<ArtSet>, ServiceError> {
        let query = Self::get_query("show_sets_by_id", SHOW_FIELDS, set_id);
        let data: ShowSetByIdData = self.graphql(query)?;
        Ok(data.show_sets_by_id.map(ArtSet::from))
    }

    pub fn list_movie_sets(
        &self,
        tmdb_id: i64,
        exclude_usernames: &[String],
    ) -> Result<Vec<ArtSet>, ServiceError> {
        let query = Self::list_query(
            "movie_sets",
            "movie_id",
            MOVIE_FIELDS,
            tmdb_id,
            exclude_usernames,
        );
        let data: MovieSetsData = self.graphql(query)?;
        Ok(data.movie_sets.into_iter().map(ArtSet::from).collect())
    }

    pub fn get_movie_set(&self, set_id: i64) -> Result<Option<ArtSet>, ServiceError> {
        let query = Self::get_query("movie_sets_by_id", MOVIE_FIELDS, set_id);
        let data: MovieSetByIdData = self.graphql(query)?;
        Ok(data.movie_sets_by_id.map(ArtSet::from))
    }

    pub fn list_collection_sets(
        &self,
        tmdb_id: i64,
        exclude_usernames: &[String],
    ) -> Result<Vec<ArtSet>, ServiceError> {
        let query = Self::list_query(
            "collection_sets",
            "collection_id",
            COLLECTION_FIELDS,
            tmdb_id,
            exclude_usernames,
        );
        let data: CollectionSetsData = self.graphql(query)?;
        Ok(data.collection_sets.into_iter().map(ArtSet::from).collect())
    }

    pub fn get_collection_set(&self, set_id: i64) -> Result<Option<ArtSet>, ServiceError> {
        let query = Self::get_query("collection_sets_by_id", COLLECTION_FIELDS, set_id);
        let data: CollectionSetByIdData = self.graphql(query)?;
        Ok(data.collection_sets_by_id.map(ArtSet::from))
    }
}

impl ArtProvider for Mediux {
    fn list_sets(
        &self,
        kind: MediaKind,
        tmdb_id: i64,
        exclude_usernames: &[String],
    ) -> Result<Vec<ArtSet>, ServiceError> {
        match kind {
            MediaKind::Show => self.list_show_sets(tmdb_id, exclude_usernames),
            MediaKind::Movie => self.list_movie_sets(tmdb_id, exclude_usernames),
            MediaKind::Collection => self.list_collection_sets(tmdb_id, exclude_usernames),
        }
    }

    fn get_set(&self, kind: MediaKind, set_id: i64) -> Result<Option<ArtSet>, ServiceError> {
        match kind {
            MediaKind::Show => self.get_show_set(set_id),
            MediaKind::Movie => self.get_movie_set(set_id),
            MediaKind::Collection => self.get_collection_set(set_id),
        }
    }

    fn download_asset(&self, file_id: &str, output: &Path) -> Result<(), ServiceError> {
        self.limiter.acquire();
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        if output.exists() {
            fs::remove_file(output)?;
        }

        let response = self
            .client
            .get(format!("{}/assets/{file_id}", self.base_url))
            .send()
            .map_err(ServiceError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::from_status(
                status.as_u16(),
                format!("downloading asset '{file_id}'"),
            ));
        }

        let total = response.content_length().unwrap_or(0);
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40}] {bytes}/{total_bytes} {msg}")
                .unwrap(),
        );
        pb.set_message(output.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());

        let mut reader = pb.wrap_read(response);
        let mut file = File::create(output)?;
        io::copy(&mut reader, &mut file)?;
        pb.finish_and_clear();
        Ok(())
    }
}
