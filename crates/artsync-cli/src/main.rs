use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use artsync_core::media::MediaKind;
use artsync_core::mediux::{ArtProvider, Mediux};
use artsync_core::paths;
use artsync_core::ranking::PriorityRanking;
use artsync_core::reconcile::Reconciler;
use artsync_core::services::{Jellyfin, MediaService, Plex};
use artsync_core::sets::ArtSet;
use artsync_core::{Media, ProvenanceCache, ServiceError, Settings};

#[derive(Parser)]
#[command(name = "artsync", version, about = "Sync community artwork sets to Plex and Jellyfin")]
struct Cli {
    /// Verbose diagnostics
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk every library and reconcile artwork for all entities
    Sync(SyncArgs),
    /// Apply specific artwork sets by id or URL
    Set(SetArgs),
    /// Inspect the configuration file
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(clap::Args)]
struct SyncArgs {
    /// Leave shows alone
    #[arg(long)]
    skip_shows: bool,

    /// Leave movies alone
    #[arg(long)]
    skip_movies: bool,

    /// Leave collections alone
    #[arg(long)]
    skip_collections: bool,

    /// Reapply artwork even when provenance says it is current
    #[arg(long)]
    force: bool,

    /// Wipe staged covers and provenance before syncing
    #[arg(long)]
    clean: bool,
}

#[derive(clap::Args)]
struct SetArgs {
    /// Set ids or URLs like https://mediux.pro/sets/28831
    urls: Vec<String>,

    /// File with one set id or URL per line
    #[arg(long)]
    file: Option<PathBuf>,

    /// Reapply artwork even when provenance says it is current
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the current configuration
    View,
    /// Print the configuration file path
    Locate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.debug { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings_path = Settings::default_path();
    let settings =
        Settings::load_or_create(&settings_path).context("failed to load settings")?;

    match cli.command {
        Command::Sync(args) => cmd_sync(&settings, &args),
        Command::Set(args) => cmd_set(&settings, &args),
        Command::Settings { command } => cmd_settings(&settings_path, &command),
    }
}

fn cmd_settings(path: &Path, command: &SettingsCommand) -> anyhow::Result<()> {
    match command {
        SettingsCommand::View => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            print!("{content}");
        }
        SettingsCommand::Locate => println!("{}", path.display()),
    }
    Ok(())
}

fn cmd_sync(settings: &Settings, args: &SyncArgs) -> anyhow::Result<()> {
    if args.clean {
        info!("Cleaning cache at {}", paths::cache_root().display());
        paths::delete_folder(&paths::cache_root()).context("failed to clean cache")?;
    }

    let provider = Mediux::new(&settings.mediux).context("mediux is not configured")?;
    let ranking = PriorityRanking::new(
        settings.mediux.priority_usernames.clone(),
        settings.mediux.only_priority_usernames,
    );
    let cover_root = paths::cache_root().join("covers");

    if settings.jellyfin.token.is_some() {
        let jellyfin = Jellyfin::new(&settings.jellyfin)?;
        if jellyfin.validate() {
            sync_service(
                &provider,
                &jellyfin,
                &settings.jellyfin.skip_libraries,
                settings.jellyfin.kometa_integration,
                &ranking,
                &settings.mediux.exclude_usernames,
                &cover_root,
                args,
            )?;
        } else {
            warn!("[Jellyfin] validation failed, skipping");
        }
    }
    if settings.plex.token.is_some() {
        let plex = Plex::new(&settings.plex)?;
        if plex.validate() {
            sync_service(
                &provider,
                &plex,
                &settings.plex.skip_libraries,
                settings.plex.kometa_integration,
                &ranking,
                &settings.mediux.exclude_usernames,
                &cover_root,
                args,
            )?;
        } else {
            warn!("[Plex] validation failed, skipping");
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn sync_service<S: MediaService>(
    provider: &Mediux,
    service: &S,
    skip_libraries: &[String],
    kometa_integration: bool,
    ranking: &PriorityRanking,
    exclude_usernames: &[String],
    cover_root: &Path,
    args: &SyncArgs,
) -> anyhow::Result<()> {
    let cache = ProvenanceCache::for_service(&paths::cache_root(), service.name())?;
    let reconciler = Reconciler::new(
        provider,
        service,
        &cache,
        ranking,
        cover_root.to_path_buf(),
        kometa_integration,
    );

    let mut media = Vec::new();
    if !args.skip_shows {
        match service.list_shows(skip_libraries) {
            Ok(shows) => media.extend(shows.into_iter().map(Media::Show)),
            Err(err) => error!("[{}] failed to list shows: {err}", service.name()),
        }
    }
    if !args.skip_movies {
        match service.list_movies(skip_libraries) {
            Ok(movies) => media.extend(movies.into_iter().map(Media::Movie)),
            Err(err) => error!("[{}] failed to list movies: {err}", service.name()),
        }
    }
    if !args.skip_collections {
        match service.list_collections(skip_libraries) {
            Ok(collections) => media.extend(collections.into_iter().map(Media::Collection)),
            Err(err) => error!("[{}] failed to list collections: {err}", service.name()),
        }
    }
    info!("[{}] reconciling {} entities", service.name(), media.len());

    for mut entity in media {
        let sets = match provider.list_sets(entity.kind(), entity.tmdb_id(), exclude_usernames) {
            Ok(sets) => sets,
            Err(err) => {
                error!(
                    "[{}] {}: failed to list sets: {err}",
                    service.name(),
                    entity.display_name()
                );
                continue;
            }
        };
        reconciler.reconcile(&mut entity, ranking.order(sets), args.force);
    }
    Ok(())
}

fn cmd_set(settings: &Settings, args: &SetArgs) -> anyhow::Result<()> {
    let provider = Mediux::new(&settings.mediux).context("mediux is not configured")?;
    let ranking = PriorityRanking::new(
        settings.mediux.priority_usernames.clone(),
        settings.mediux.only_priority_usernames,
    );
    let cover_root = paths::cache_root().join("covers");

    let mut ids = Vec::new();
    for value in &args.urls {
        match parse_set_id(value) {
            Some(id) => ids.push(id),
            None => warn!("Ignoring unparseable set reference '{value}'"),
        }
    }
    if let Some(file) = &args.file {
        let content = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match parse_set_id(line) {
                Some(id) => ids.push(id),
                None => warn!("Ignoring unparseable set reference '{line}'"),
            }
        }
    }
    anyhow::ensure!(!ids.is_empty(), "no set ids given");

    for id in ids {
        let set = match fetch_set(&provider, id) {
            Ok(Some(set)) => set,
            Ok(None) => {
                warn!("Set {id} not found");
                continue;
            }
            Err(err) => {
                error!("Failed to fetch set {id}: {err}");
                continue;
            }
        };

        if settings.jellyfin.token.is_some() {
            let jellyfin = Jellyfin::new(&settings.jellyfin)?;
            apply_set(
                &provider,
                &jellyfin,
                settings.jellyfin.kometa_integration,
                &ranking,
                &cover_root,
                &set,
                args.force,
            )?;
        }
        if settings.plex.token.is_some() {
            let plex = Plex::new(&settings.plex)?;
            apply_set(
                &provider,
                &plex,
                settings.plex.kometa_integration,
                &ranking,
                &cover_root,
                &set,
                args.force,
            )?;
        }
    }
    Ok(())
}

/// Look the set up as a show set first, then collection, then movie. The
/// provider keys each flavor under a different query, so the misses are
/// cheap empty responses.
fn fetch_set(provider: &Mediux, set_id: i64) -> Result<Option<ArtSet>, ServiceError> {
    for kind in [MediaKind::Show, MediaKind::Collection, MediaKind::Movie] {
        if let Some(set) = provider.get_set(kind, set_id)? {
            return Ok(Some(set));
        }
    }
    Ok(None)
}

fn apply_set<S: MediaService>(
    provider: &Mediux,
    service: &S,
    kometa_integration: bool,
    ranking: &PriorityRanking,
    cover_root: &Path,
    set: &ArtSet,
    force: bool,
) -> anyhow::Result<()> {
    let entity = match resolve_media(service, set) {
        Ok(Some(entity)) => entity,
        Ok(None) => {
            warn!(
                "[{}] no library entity matches set {} ('{}')",
                service.name(),
                set.id,
                set.title
            );
            return Ok(());
        }
        Err(err) => {
            error!("[{}] failed to resolve set {}: {err}", service.name(), set.id);
            return Ok(());
        }
    };

    let cache = ProvenanceCache::for_service(&paths::cache_root(), service.name())?;
    let reconciler = Reconciler::new(
        provider,
        service,
        &cache,
        ranking,
        cover_root.to_path_buf(),
        kometa_integration,
    );
    let mut entity = entity;
    reconciler.reconcile_set(&mut entity, set, force);
    Ok(())
}

/// Find the destination entity the set's own tmdb id points at.
fn resolve_media<S: MediaService>(
    service: &S,
    set: &ArtSet,
) -> Result<Option<Media>, ServiceError> {
    if let Some(show) = &set.show {
        return Ok(service.get_show(show.tmdb_id)?.map(Media::Show));
    }
    if let Some(collection) = &set.collection {
        return Ok(service.get_collection(collection.tmdb_id)?.map(Media::Collection));
    }
    if let Some(movie) = &set.movie {
        return Ok(service.get_movie(movie.tmdb_id)?.map(Media::Movie));
    }
    Ok(None)
}

/// Accept bare ids, set URLs, and trailing-slash variants.
fn parse_set_id(value: &str) -> Option<i64> {
    value
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_id() {
        assert_eq!(parse_set_id("28831"), Some(28831));
        assert_eq!(parse_set_id("https://mediux.pro/sets/28831"), Some(28831));
        assert_eq!(parse_set_id("https://mediux.pro/sets/28831/"), Some(28831));
        assert_eq!(parse_set_id(" 24404 "), Some(24404));
        assert_eq!(parse_set_id("https://mediux.pro/sets/"), None);
        assert_eq!(parse_set_id("not-a-set"), None);
    }
}
