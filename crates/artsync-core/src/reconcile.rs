//! Reconciliation engine: walks one entity's image slots against a ranked
//! stream of submissions, decides per slot whether the candidate beats the
//! recorded owner, then stages and uploads what won.
//!
//! The engine never aborts a run. Every failure is logged and the slot is
//! left open for a later submission or the next run.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::media::{Collection, Media, MediaKind, Movie, Show};
use crate::mediux::ArtProvider;
use crate::paths::{cover_path, slugify};
use crate::provenance::ProvenanceCache;
use crate::ranking::PriorityRanking;
use crate::services::MediaService;
use crate::sets::{ArtFile, ArtSet, FileType};

/// Images at or above this size are rejected before upload; both Plex and
/// Jellyfin choke on anything bigger.
pub const MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024;

/// Per-set bookkeeping so each submission is announced at most once per
/// entity, no matter how many of its slots end up applied.
struct SetState {
    announced: bool,
}

pub struct Reconciler<'a, P: ArtProvider, S: MediaService> {
    provider: &'a P,
    service: &'a S,
    cache: &'a ProvenanceCache,
    ranking: &'a PriorityRanking,
    cover_root: PathBuf,
    kometa_integration: bool,
}

impl<'a, P: ArtProvider, S: MediaService> Reconciler<'a, P, S> {
    pub fn new(
        provider: &'a P,
        service: &'a S,
        cache: &'a ProvenanceCache,
        ranking: &'a PriorityRanking,
        cover_root: PathBuf,
        kometa_integration: bool,
    ) -> Self {
        Self {
            provider,
            service,
            cache,
            ranking,
            cover_root,
            kometa_integration,
        }
    }

    /// Drain `sets` in ranked order until every slot of `media` is settled.
    /// Sets past that point are never pulled from the iterator.
    pub fn reconcile(
        &self,
        media: &mut Media,
        sets: impl IntoIterator<Item = ArtSet>,
        force: bool,
    ) {
        for set in sets {
            if !self.reconcile_set(media, &set, force) {
                break;
            }
        }
    }

    /// Apply one submission to `media`. Returns whether further sets are
    /// still worth consuming (false once every slot is settled).
    pub fn reconcile_set(&self, media: &mut Media, set: &ArtSet, force: bool) -> bool {
        if media.all_posters_uploaded() {
            return false;
        }
        let mut state = SetState { announced: false };
        match media {
            Media::Show(show) => self.reconcile_show(show, set, force, &mut state),
            Media::Movie(movie) => self.reconcile_movie(movie, set, force, &mut state),
            Media::Collection(collection) => {
                self.reconcile_collection(collection, set, force, &mut state)
            }
        }
        !media.all_posters_uploaded()
    }

    fn reconcile_show(&self, show: &mut Show, set: &ArtSet, force: bool, state: &mut SetState) {
        let Some(set_show) = set.show.as_ref() else {
            return;
        };
        let entity = show.display_name();

        self.apply_slot(
            &show.id,
            &entity,
            MediaKind::Show,
            &entity,
            "poster",
            FileType::Poster,
            set.show_file(FileType::Poster),
            set,
            force,
            &mut show.poster_uploaded,
            state,
        );
        self.apply_slot(
            &show.id,
            &entity,
            MediaKind::Show,
            &entity,
            "backdrop",
            FileType::Backdrop,
            set.show_file(FileType::Backdrop),
            set,
            force,
            &mut show.backdrop_uploaded,
            state,
        );

        for season in &mut show.seasons {
            // Provider and destination ids never line up; numbers do.
            let Some(set_season) = set_show.seasons.iter().find(|s| s.number == season.number)
            else {
                continue;
            };
            let stem = format!("season-{:02}", season.number);
            self.apply_slot(
                &season.id,
                &entity,
                MediaKind::Show,
                &entity,
                &stem,
                FileType::Poster,
                set.season_file(set_season.id),
                set,
                force,
                &mut season.poster_uploaded,
                state,
            );

            let season_number = season.number;
            for episode in &mut season.episodes {
                let Some(set_episode) = set_season
                    .episodes
                    .iter()
                    .find(|e| e.number == episode.number)
                else {
                    continue;
                };
                let stem = format!("s{:02}e{:02}", season_number, episode.number);
                self.apply_slot(
                    &episode.id,
                    &entity,
                    MediaKind::Show,
                    &entity,
                    &stem,
                    FileType::TitleCard,
                    set.episode_file(set_episode.id),
                    set,
                    force,
                    &mut episode.title_card_uploaded,
                    state,
                );
            }
        }
    }

    fn reconcile_movie(&self, movie: &mut Movie, set: &ArtSet, force: bool, state: &mut SetState) {
        let entity = movie.display_name();

        self.apply_slot(
            &movie.id,
            &entity,
            MediaKind::Movie,
            &entity,
            "poster",
            FileType::Poster,
            set.movie_file(movie.tmdb_id, FileType::Poster),
            set,
            force,
            &mut movie.poster_uploaded,
            state,
        );
        self.apply_slot(
            &movie.id,
            &entity,
            MediaKind::Movie,
            &entity,
            "backdrop",
            FileType::Backdrop,
            set.movie_file(movie.tmdb_id, FileType::Backdrop),
            set,
            force,
            &mut movie.backdrop_uploaded,
            state,
        );
    }

    fn reconcile_collection(
        &self,
        collection: &mut Collection,
        set: &ArtSet,
        force: bool,
        state: &mut SetState,
    ) {
        let entity = collection.name.clone();

        self.apply_slot(
            &collection.id,
            &entity,
            MediaKind::Collection,
            &entity,
            "poster",
            FileType::Poster,
            set.collection_file(FileType::Poster),
            set,
            force,
            &mut collection.poster_uploaded,
            state,
        );
        self.apply_slot(
            &collection.id,
            &entity,
            MediaKind::Collection,
            &entity,
            "backdrop",
            FileType::Backdrop,
            set.collection_file(FileType::Backdrop),
            set,
            force,
            &mut collection.backdrop_uploaded,
            state,
        );

        for movie in &mut collection.movies {
            let slug = slugify(&movie.display_name());
            let stem = format!("{slug}-poster");
            self.apply_slot(
                &movie.id,
                &entity,
                MediaKind::Collection,
                &entity,
                &stem,
                FileType::Poster,
                set.movie_file(movie.tmdb_id, FileType::Poster),
                set,
                force,
                &mut movie.poster_uploaded,
                state,
            );
            let stem = format!("{slug}-backdrop");
            self.apply_slot(
                &movie.id,
                &entity,
                MediaKind::Collection,
                &entity,
                &stem,
                FileType::Backdrop,
                set.movie_file(movie.tmdb_id, FileType::Backdrop),
                set,
                force,
                &mut movie.backdrop_uploaded,
                state,
            );
        }
    }

    /// Settle a single slot for one candidate file. `uploaded` flips to true
    /// when the slot needs no further attention this run, whether because the
    /// upload succeeded, the recorded owner outranks the candidate, or the
    /// recorded image is already current.
    #[allow(clippy::too_many_arguments)]
    fn apply_slot(
        &self,
        object_id: &str,
        entity: &str,
        kind: MediaKind,
        folder: &str,
        stem: &str,
        file_type: FileType,
        file: Option<&ArtFile>,
        set: &ArtSet,
        force: bool,
        uploaded: &mut bool,
        state: &mut SetState,
    ) {
        if *uploaded {
            return;
        }
        let Some(file) = file else {
            return;
        };

        if !force {
            match self.cache.select(object_id, file_type) {
                Ok(Some(record)) => {
                    let new_rank = self.ranking.rank(&set.username);
                    let existing_rank = self.ranking.rank(&record.creator);
                    if new_rank > existing_rank
                        || (new_rank == existing_rank && set.id != record.set_id)
                    {
                        debug!(
                            "[{}] {entity}: {stem} kept, owned by {} (set {})",
                            self.service.name(),
                            record.creator,
                            record.set_id
                        );
                        *uploaded = true;
                        return;
                    }
                    if set.id == record.set_id && file.last_modified <= record.last_updated {
                        debug!(
                            "[{}] {entity}: {stem} already up to date",
                            self.service.name()
                        );
                        *uploaded = true;
                        return;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    // Unreadable provenance is treated as an empty slot.
                    warn!(
                        "[{}] {entity}: failed to read provenance for {stem}: {err}",
                        self.service.name()
                    );
                }
            }
        }

        if !state.announced {
            info!(
                "[{}] {entity}: downloading art from '{}' by {}",
                self.service.name(),
                set.title,
                set.username
            );
            state.announced = true;
        }

        let image = cover_path(&self.cover_root, kind.cover_dir(), folder, stem);
        if let Err(err) = self.provider.download_asset(&file.id, &image) {
            warn!(
                "[{}] {entity}: failed to download {stem}: {err}",
                self.service.name()
            );
            return;
        }
        match fs::metadata(&image) {
            Ok(meta) if meta.len() >= MAX_IMAGE_SIZE => {
                warn!(
                    "[{}] {entity}: {stem} is {} bytes, too large to upload",
                    self.service.name(),
                    meta.len()
                );
                return;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    "[{}] {entity}: failed to stat {stem}: {err}",
                    self.service.name()
                );
                return;
            }
        }

        match self
            .service
            .upload_image(object_id, &image, self.kometa_integration)
        {
            Ok(()) => {
                *uploaded = true;
                if let Err(err) = self.cache.insert(
                    object_id,
                    file_type,
                    &set.username,
                    set.id,
                    file.last_modified,
                ) {
                    warn!(
                        "[{}] {entity}: failed to record provenance for {stem}: {err}",
                        self.service.name()
                    );
                }
            }
            Err(err) => {
                warn!(
                    "[{}] {entity}: failed to upload {stem}: {err}",
                    self.service.name()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;

    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};

    use crate::error::ServiceError;
    use crate::media::{Episode, Season};
    use crate::sets::{SetEpisode, SetSeason, SetShow, TargetRef};

    struct FakeProvider {
        assets: HashMap<String, Vec<u8>>,
        downloads: RefCell<Vec<String>>,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                assets: HashMap::new(),
                downloads: RefCell::new(Vec::new()),
            }
        }

        fn with_asset(mut self, file_id: &str, bytes: Vec<u8>) -> Self {
            self.assets.insert(file_id.to_string(), bytes);
            self
        }
    }

    impl ArtProvider for FakeProvider {
        fn list_sets(
            &self,
            _kind: MediaKind,
            _tmdb_id: i64,
            _exclude_usernames: &[String],
        ) -> Result<Vec<ArtSet>, ServiceError> {
            Ok(Vec::new())
        }

        fn get_set(
            &self,
            _kind: MediaKind,
            _set_id: i64,
        ) -> Result<Option<ArtSet>, ServiceError> {
            Ok(None)
        }

        fn download_asset(&self, file_id: &str, output: &Path) -> Result<(), ServiceError> {
            let bytes = self
                .assets
                .get(file_id)
                .cloned()
                .unwrap_or_else(|| b"image".to_vec());
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(output, bytes)?;
            self.downloads.borrow_mut().push(file_id.to_string());
            Ok(())
        }
    }

    struct FakeService {
        uploads: RefCell<Vec<(String, String)>>,
        fail_uploads: bool,
    }

    impl FakeService {
        fn new() -> Self {
            Self {
                uploads: RefCell::new(Vec::new()),
                fail_uploads: false,
            }
        }

        fn failing() -> Self {
            Self {
                uploads: RefCell::new(Vec::new()),
                fail_uploads: true,
            }
        }

        fn upload_stems(&self) -> Vec<String> {
            self.uploads.borrow().iter().map(|(_, s)| s.clone()).collect()
        }
    }

    impl MediaService for FakeService {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn list_shows(&self, _skip: &[String]) -> Result<Vec<Show>, ServiceError> {
            Ok(Vec::new())
        }

        fn get_show(&self, _tmdb_id: i64) -> Result<Option<Show>, ServiceError> {
            Ok(None)
        }

        fn list_seasons(&self, _show_id: &str) -> Result<Vec<Season>, ServiceError> {
            Ok(Vec::new())
        }

        fn list_episodes(
            &self,
            _show_id: &str,
            _season_id: &str,
        ) -> Result<Vec<Episode>, ServiceError> {
            Ok(Vec::new())
        }

        fn list_movies(&self, _skip: &[String]) -> Result<Vec<Movie>, ServiceError> {
            Ok(Vec::new())
        }

        fn get_movie(&self, _tmdb_id: i64) -> Result<Option<Movie>, ServiceError> {
            Ok(None)
        }

        fn list_collections(&self, _skip: &[String]) -> Result<Vec<Collection>, ServiceError> {
            Ok(Vec::new())
        }

        fn get_collection(&self, _tmdb_id: i64) -> Result<Option<Collection>, ServiceError> {
            Ok(None)
        }

        fn list_collection_movies(&self, _id: &str) -> Result<Vec<Movie>, ServiceError> {
            Ok(Vec::new())
        }

        fn upload_image(
            &self,
            object_id: &str,
            image: &Path,
            _kometa_integration: bool,
        ) -> Result<(), ServiceError> {
            if self.fail_uploads {
                return Err(ServiceError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            let stem = image
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap()
                .to_string();
            self.uploads
                .borrow_mut()
                .push((object_id.to_string(), stem));
            Ok(())
        }
    }

    struct Fixture {
        provider: FakeProvider,
        service: FakeService,
        cache: ProvenanceCache,
        ranking: PriorityRanking,
        _dir: TempDir,
        cover_root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with(FakeProvider::new(), FakeService::new(), PriorityRanking::new(Vec::new(), false))
        }

        fn with(provider: FakeProvider, service: FakeService, ranking: PriorityRanking) -> Self {
            let dir = tempdir().unwrap();
            let cover_root = dir.path().to_path_buf();
            Self {
                provider,
                service,
                cache: ProvenanceCache::open_in_memory().unwrap(),
                ranking,
                _dir: dir,
                cover_root,
            }
        }

        fn reconciler(&self) -> Reconciler<'_, FakeProvider, FakeService> {
            Reconciler::new(
                &self.provider,
                &self.service,
                &self.cache,
                &self.ranking,
                self.cover_root.clone(),
                false,
            )
        }
    }

    fn stamp(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn file(id: &str, file_type: FileType, target: TargetRef, day: u32) -> ArtFile {
        ArtFile {
            id: id.to_string(),
            file_type,
            target,
            last_modified: stamp(day),
        }
    }

    /// One-season, one-episode show on the destination side. Destination ids
    /// deliberately differ from the provider-side ids in `show_set`.
    fn show() -> Media {
        let mut season = Season::new("42", 1, "Season 1");
        season.episodes.push(Episode::new("43", 1, "Pilot"));
        let mut show = Show::new("10", "Downton Abbey", Some(2010), 33907);
        show.seasons.push(season);
        Media::Show(show)
    }

    fn show_set(id: i64, username: &str, day: u32) -> ArtSet {
        ArtSet {
            id,
            username: username.to_string(),
            title: format!("Set {id}"),
            files: vec![
                file("f-poster", FileType::Poster, TargetRef::Show(1), day),
                file("f-backdrop", FileType::Backdrop, TargetRef::Show(1), day),
                file("f-season", FileType::Poster, TargetRef::Season(999), day),
                file("f-episode", FileType::TitleCard, TargetRef::Episode(777), day),
            ],
            show: Some(SetShow {
                tmdb_id: 33907,
                title: "Downton Abbey".to_string(),
                seasons: vec![SetSeason {
                    id: 999,
                    number: 1,
                    episodes: vec![SetEpisode { id: 777, number: 1 }],
                }],
            }),
            movie: None,
            collection: None,
        }
    }

    #[test]
    fn test_first_apply_uploads_every_slot() {
        let fx = Fixture::new();
        let mut media = show();
        let set = show_set(1, "alice", 1);

        fx.reconciler().reconcile(&mut media, vec![set], false);

        assert!(media.all_posters_uploaded());
        let mut stems = fx.service.upload_stems();
        stems.sort();
        assert_eq!(stems, vec!["backdrop", "poster", "s01e01", "season-01"]);

        // Show poster provenance recorded against the destination object id.
        let rec = fx.cache.select("10", FileType::Poster).unwrap().unwrap();
        assert_eq!(rec.creator, "alice");
        assert_eq!(rec.set_id, 1);
        assert_eq!(rec.last_updated, stamp(1));
        // Season and episode records keyed by their own object ids.
        assert!(fx.cache.select("42", FileType::Poster).unwrap().is_some());
        assert!(fx.cache.select("43", FileType::TitleCard).unwrap().is_some());
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let fx = Fixture::new();

        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "alice", 1)], false);
        assert_eq!(fx.service.uploads.borrow().len(), 4);

        // Fresh entity tree, same cache: nothing moves.
        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "alice", 1)], false);
        assert_eq!(fx.service.uploads.borrow().len(), 4);
        assert_eq!(fx.provider.downloads.borrow().len(), 4);
        assert!(media.all_posters_uploaded());
    }

    #[test]
    fn test_priority_author_replaces_lower_ranked_owner() {
        let ranking = PriorityRanking::new(vec!["alice".to_string()], false);
        let fx = Fixture::with(FakeProvider::new(), FakeService::new(), ranking);

        // bob currently owns every slot.
        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "bob", 1)], false);
        assert_eq!(fx.service.uploads.borrow().len(), 4);

        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(2, "alice", 1)], false);
        assert_eq!(fx.service.uploads.borrow().len(), 8);
        assert_eq!(
            fx.cache.select("10", FileType::Poster).unwrap().unwrap().creator,
            "alice"
        );
    }

    #[test]
    fn test_lower_ranked_author_never_replaces_priority_owner() {
        let ranking = PriorityRanking::new(vec!["alice".to_string()], false);
        let fx = Fixture::with(FakeProvider::new(), FakeService::new(), ranking);

        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "alice", 1)], false);
        assert_eq!(fx.service.uploads.borrow().len(), 4);

        // bob's set is newer but outranked; slots still count as settled.
        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(2, "bob", 9)], false);
        assert_eq!(fx.service.uploads.borrow().len(), 4);
        assert!(media.all_posters_uploaded());
        assert_eq!(
            fx.cache.select("10", FileType::Poster).unwrap().unwrap().creator,
            "alice"
        );
    }

    #[test]
    fn test_equal_rank_different_set_keeps_existing() {
        let fx = Fixture::new();

        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "alice", 1)], false);

        // Same (unranked) tier, different set: first writer wins.
        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(2, "bob", 9)], false);
        assert_eq!(fx.service.uploads.borrow().len(), 4);
        assert_eq!(fx.cache.select("10", FileType::Poster).unwrap().unwrap().set_id, 1);
    }

    #[test]
    fn test_same_set_reapplies_only_when_newer() {
        let fx = Fixture::new();

        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "alice", 5)], false);
        assert_eq!(fx.service.uploads.borrow().len(), 4);

        // Same files, same timestamps: up to date.
        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "alice", 5)], false);
        assert_eq!(fx.service.uploads.borrow().len(), 4);

        // The creator revised the set: newer files reapply.
        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "alice", 6)], false);
        assert_eq!(fx.service.uploads.borrow().len(), 8);
        assert_eq!(
            fx.cache.select("10", FileType::Poster).unwrap().unwrap().last_updated,
            stamp(6)
        );
    }

    #[test]
    fn test_force_bypasses_provenance() {
        let fx = Fixture::new();

        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "alice", 5)], false);

        // Identical set, force on: everything reapplies.
        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "alice", 5)], true);
        assert_eq!(fx.service.uploads.borrow().len(), 8);
    }

    #[test]
    fn test_seasons_and_episodes_match_by_number() {
        let fx = Fixture::new();
        // Destination season id 42 vs provider season id 999; only the
        // numbers agree.
        let mut media = show();
        fx.reconciler()
            .reconcile(&mut media, vec![show_set(1, "alice", 1)], false);

        let uploads = fx.service.uploads.borrow();
        assert!(uploads.contains(&("42".to_string(), "season-01".to_string())));
        assert!(uploads.contains(&("43".to_string(), "s01e01".to_string())));
    }

    #[test]
    fn test_oversized_image_is_rejected_at_the_boundary() {
        let provider = FakeProvider::new()
            .with_asset("f-poster", vec![0u8; (MAX_IMAGE_SIZE - 1) as usize])
            .with_asset("f-backdrop", vec![0u8; MAX_IMAGE_SIZE as usize]);
        let fx = Fixture::with(provider, FakeService::new(), PriorityRanking::new(Vec::new(), false));

        let movie = Movie::new("20", "Big Art", Some(2023), 900);
        let mut media = Media::Movie(movie);
        let set = ArtSet {
            id: 1,
            username: "alice".to_string(),
            title: "Big Art Set".to_string(),
            files: vec![
                file("f-poster", FileType::Poster, TargetRef::Movie(900), 1),
                file("f-backdrop", FileType::Backdrop, TargetRef::Movie(900), 1),
            ],
            show: None,
            movie: None,
            collection: None,
        };
        fx.reconciler().reconcile_set(&mut media, &set, false);

        // One byte under the cap uploads, at the cap is refused.
        assert_eq!(fx.service.upload_stems(), vec!["poster"]);
        assert!(fx.cache.select("20", FileType::Poster).unwrap().is_some());
        assert!(fx.cache.select("20", FileType::Backdrop).unwrap().is_none());

        let Media::Movie(movie) = &media else {
            unreachable!()
        };
        assert!(movie.poster_uploaded);
        assert!(!movie.backdrop_uploaded);
    }

    #[test]
    fn test_upload_failure_leaves_slot_open() {
        let fx = Fixture::with(
            FakeProvider::new(),
            FakeService::failing(),
            PriorityRanking::new(Vec::new(), false),
        );

        let mut media = show();
        let keep_going = fx
            .reconciler()
            .reconcile_set(&mut media, &show_set(1, "alice", 1), false);

        assert!(keep_going);
        assert!(!media.all_posters_uploaded());
        assert!(fx.cache.select("10", FileType::Poster).unwrap().is_none());
    }

    #[test]
    fn test_missing_candidate_leaves_slot_for_later_sets() {
        let fx = Fixture::new();

        let mut partial = show_set(1, "alice", 1);
        partial.files.retain(|f| f.file_type != FileType::Backdrop);
        let full = show_set(2, "bob", 1);

        let mut media = show();
        fx.reconciler().reconcile(&mut media, vec![partial, full], false);

        assert!(media.all_posters_uploaded());
        // alice filled three slots, bob only the backdrop she lacked.
        let rec = fx.cache.select("10", FileType::Backdrop).unwrap().unwrap();
        assert_eq!(rec.creator, "bob");
        let rec = fx.cache.select("10", FileType::Poster).unwrap().unwrap();
        assert_eq!(rec.creator, "alice");
        assert_eq!(fx.service.uploads.borrow().len(), 5);
    }

    #[test]
    fn test_stops_pulling_sets_once_settled() {
        let fx = Fixture::new();
        let mut media = show();

        let mut pulled = 0;
        let sets = std::iter::from_fn(|| {
            pulled += 1;
            Some(show_set(pulled, "alice", 1))
        })
        .take(50);
        fx.reconciler().reconcile(&mut media, sets, false);

        assert!(media.all_posters_uploaded());
        // The first set settles everything; only the check against the
        // second one should pull it from the iterator.
        assert!(pulled <= 2);
    }

    #[test]
    fn test_collection_members_match_by_tmdb_id() {
        let fx = Fixture::new();

        let mut collection = Collection::new("30", "Spider-Verse Collection", 573436);
        collection
            .movies
            .push(Movie::new("31", "Into the Spider-Verse", Some(2018), 324857));
        let mut media = Media::Collection(collection);

        let set = ArtSet {
            id: 5,
            username: "carol".to_string(),
            title: "Spider-Verse".to_string(),
            files: vec![
                file("c-poster", FileType::Poster, TargetRef::Collection(80), 1),
                file("c-backdrop", FileType::Backdrop, TargetRef::Collection(80), 1),
                file("m-poster", FileType::Poster, TargetRef::Movie(324857), 1),
                file("m-backdrop", FileType::Backdrop, TargetRef::Movie(324857), 1),
            ],
            show: None,
            movie: None,
            collection: None,
        };
        fx.reconciler().reconcile(&mut media, vec![set], false);

        assert!(media.all_posters_uploaded());
        let mut stems = fx.service.upload_stems();
        stems.sort();
        assert_eq!(
            stems,
            vec![
                "backdrop",
                "into-the-spider-verse-2018-backdrop",
                "into-the-spider-verse-2018-poster",
                "poster",
            ]
        );
    }
}
