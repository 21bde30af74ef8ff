//! Core library for artsync: community artwork reconciliation between a
//! metadata provider and Plex/Jellyfin media servers.
//!
//! The pipeline is synchronous end to end. The CLI lists entities from a
//! destination service, pulls ranked artwork sets from the provider, and
//! hands both to [`reconcile::Reconciler`], which settles each image slot
//! against the provenance recorded in a per-service SQLite database.

pub mod error;
pub mod media;
pub mod mediux;
pub mod paths;
pub mod provenance;
pub mod ranking;
pub mod ratelimit;
pub mod reconcile;
pub mod services;
pub mod sets;
pub mod settings;

pub use error::ServiceError;
pub use media::{Collection, Episode, Media, MediaKind, Movie, Season, Show};
pub use mediux::{ArtProvider, Mediux};
pub use provenance::{ProvenanceCache, ProvenanceRecord};
pub use ranking::PriorityRanking;
pub use reconcile::{Reconciler, MAX_IMAGE_SIZE};
pub use services::{Jellyfin, MediaService, Plex};
pub use sets::{ArtFile, ArtSet, FileType};
pub use settings::Settings;
