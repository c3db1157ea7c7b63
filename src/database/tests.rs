// Catalog database tests: record lifecycle, metadata reconciliation, bulk edits and merges.
// Run with: cargo test --lib database::tests

#[cfg(test)]
mod record_tests {
    use crate::database::{Database, MediaType, RecordPatch, RecordTable, UpdateRequest};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_add_new_movie_returns_fresh_id() {
        let (db, _temp) = setup_test_db();
        let first = db.add_new_media(MediaType::Movie, "Memento").unwrap();
        let id = db.add_new_media(MediaType::Movie, "Inception").unwrap();
        assert!(id > first);

        let movie = db.get_movie(id).unwrap().unwrap();
        assert_eq!(movie.title, "Inception");
        assert!(!movie.watched);
        assert_eq!(db.get_media_count(MediaType::Movie).unwrap(), 2);
    }

    #[test]
    fn test_add_new_media_rejects_blank_title() {
        let (db, _temp) = setup_test_db();
        let err: crate::error::AppError = db.add_new_media(MediaType::Series, "   ").unwrap_err().into();
        assert_eq!(err.kind(), "validation");
        assert_eq!(db.get_media_count(MediaType::Series).unwrap(), 0);
    }

    #[test]
    fn test_add_new_titles_skips_blank_lines() {
        let (db, _temp) = setup_test_db();
        let titles = vec!["Alien".to_string(), "".to_string(), " Aliens ".to_string()];
        let report = db.add_new_titles(MediaType::Movie, &titles).unwrap();
        assert_eq!(report.added.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(report.added[1].0, "Aliens");
    }

    #[test]
    fn test_update_record_writes_typed_fields() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Movie, "2001").unwrap();

        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set_loose("year", "1968").unwrap();
        patch.set_loose("title", "2001").unwrap();
        patch.set("watched", true).unwrap();
        patch.set_loose("plot", "None").unwrap();
        db.update_record(MediaType::Movie, id, &UpdateRequest::new(patch))
            .unwrap();

        let movie = db.get_movie(id).unwrap().unwrap();
        assert_eq!(movie.title, "2001");
        assert_eq!(movie.year, Some(1968));
        assert!(movie.watched);
        assert_eq!(movie.plot, None);
        assert!(movie.updated_date.is_some());
    }

    #[test]
    fn test_update_record_sets_lookup_source() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Series, "Dark").unwrap();

        let mut patch = RecordPatch::new(RecordTable::Series);
        patch.set("seasons", 3i64).unwrap();
        let request = UpdateRequest::new(patch).source(crate::database::SourceInfo {
            lookup_source: "TMDb".to_string(),
            source_url: "https://www.themoviedb.org/tv/70523".to_string(),
        });
        db.update_record(MediaType::Series, id, &request).unwrap();

        let series = db.get_series(id).unwrap().unwrap();
        assert_eq!(series.seasons, Some(3));
        assert_eq!(series.lookup_source.as_deref(), Some("TMDb"));
    }

    #[test]
    fn test_update_missing_record_is_not_found() {
        let (db, _temp) = setup_test_db();
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set("rating", 8.0).unwrap();
        let err: crate::error::AppError = db
            .update_record(MediaType::Movie, 404, &UpdateRequest::new(patch))
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "not found");
    }

    #[test]
    fn test_failed_save_rolls_back_every_step() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Movie, "Heat").unwrap();

        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set("rating", 9.0).unwrap();
        // Episode patches are rejected for movies after the field update ran.
        let request = UpdateRequest::new(patch)
            .genres(vec!["Crime".to_string()])
            .episode(1, RecordPatch::new(RecordTable::Episodes));
        assert!(db.update_record(MediaType::Movie, id, &request).is_err());

        let movie = db.get_movie(id).unwrap().unwrap();
        assert_eq!(movie.rating, None);
        assert!(db
            .get_record_meta(MediaType::Movie, id, crate::database::MetaKind::Genre)
            .unwrap()
            .is_empty());
    }
}

#[cfg(test)]
mod reconcile_tests {
    use crate::database::{Database, MediaType, MetaKind, RecordPatch, RecordTable, UpdateRequest};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_inception_genres_converge() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Movie, "Inception").unwrap();
        let (list, _) = db
            .get_media(MediaType::Movie, &Default::default())
            .unwrap();
        assert_eq!(list.iter().filter(|m| m.title == "Inception").count(), 1);

        let first = db
            .reconcile_meta(MediaType::Movie, id, MetaKind::Genre, Some(names(&["Sci-Fi", "Thriller"])))
            .unwrap();
        assert_eq!((first.added, first.removed), (2, 0));

        let second = db
            .reconcile_meta(MediaType::Movie, id, MetaKind::Genre, Some(names(&["Thriller"])))
            .unwrap();
        assert_eq!((second.added, second.removed), (0, 1));

        let genres = db.get_record_meta(MediaType::Movie, id, MetaKind::Genre).unwrap();
        assert_eq!(genres, vec!["Thriller"]);

        // The genre value itself exists exactly once.
        let all = db.get_meta_values(MetaKind::Genre).unwrap();
        assert_eq!(all.iter().filter(|g| g.name == "Thriller").count(), 1);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Series, "Twin Peaks").unwrap();
        let desired = names(&["English", "French"]);

        db.reconcile_meta(MediaType::Series, id, MetaKind::Language, Some(desired.clone()))
            .unwrap();
        let again = db
            .reconcile_meta(MediaType::Series, id, MetaKind::Language, Some(desired.clone()))
            .unwrap();
        assert_eq!((again.added, again.removed), (0, 0));
    }

    #[test]
    fn test_reconcile_counts_match_set_difference() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Movie, "Amelie").unwrap();
        db.reconcile_meta(MediaType::Movie, id, MetaKind::Genre, Some(names(&["A", "B", "C"])))
            .unwrap();

        let outcome = db
            .reconcile_meta(MediaType::Movie, id, MetaKind::Genre, Some(names(&["B", "D", "E", "D"])))
            .unwrap();
        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.added, 2);

        let mut genres = db.get_record_meta(MediaType::Movie, id, MetaKind::Genre).unwrap();
        genres.sort();
        assert_eq!(genres, vec!["B", "D", "E"]);
    }

    #[test]
    fn test_none_leaves_associations_and_empty_clears() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Movie, "Ran").unwrap();
        db.reconcile_meta(MediaType::Movie, id, MetaKind::Genre, Some(names(&["Drama"])))
            .unwrap();

        let untouched = db
            .reconcile_meta(MediaType::Movie, id, MetaKind::Genre, None)
            .unwrap();
        assert_eq!((untouched.added, untouched.removed), (0, 0));
        assert_eq!(db.get_record_meta(MediaType::Movie, id, MetaKind::Genre).unwrap().len(), 1);

        db.reconcile_meta(MediaType::Movie, id, MetaKind::Genre, Some(vec![]))
            .unwrap();
        assert!(db.get_record_meta(MediaType::Movie, id, MetaKind::Genre).unwrap().is_empty());
    }

    #[test]
    fn test_update_record_reconciles_both_lists() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Movie, "Roma").unwrap();
        let request = UpdateRequest::new(RecordPatch::new(RecordTable::Movies))
            .genres(names(&["Drama"]))
            .languages(names(&["Spanish", "Mixtec"]));
        let outcome = db.update_record(MediaType::Movie, id, &request).unwrap();
        assert_eq!(outcome.genres.added, 1);
        assert_eq!(outcome.languages.added, 2);

        let details = db.get_movie_details(id).unwrap();
        assert_eq!(details.genres, vec!["Drama"]);
        assert_eq!(details.languages, vec!["Spanish", "Mixtec"]);
    }
}

#[cfg(test)]
mod bulk_tests {
    use crate::database::{BulkUpdate, Database, MediaType, MetaKind, RecordPatch, RecordTable};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_bulk_update_touches_only_selected() {
        let (db, _temp) = setup_test_db();
        let a = db.add_new_media(MediaType::Movie, "A").unwrap();
        let b = db.add_new_media(MediaType::Movie, "B").unwrap();
        let c = db.add_new_media(MediaType::Movie, "C").unwrap();

        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set("backup_disc", "DVD-07").unwrap();
        patch.set("to_burn", false).unwrap();
        let outcome = db
            .bulk_update(
                MediaType::Movie,
                &BulkUpdate {
                    ids: vec![c, a],
                    patch,
                    genre: None,
                },
            )
            .unwrap();
        assert_eq!(outcome.updated, 2);

        assert_eq!(db.get_movie(a).unwrap().unwrap().backup_disc.as_deref(), Some("DVD-07"));
        assert_eq!(db.get_movie(c).unwrap().unwrap().backup_disc.as_deref(), Some("DVD-07"));
        assert_eq!(db.get_movie(b).unwrap().unwrap().backup_disc, None);
        assert_eq!(db.get_others_on_disc(a).unwrap(), vec!["C"]);
    }

    #[test]
    fn test_bulk_genre_attach_does_not_duplicate() {
        let (db, _temp) = setup_test_db();
        let a = db.add_new_media(MediaType::Movie, "A").unwrap();
        let b = db.add_new_media(MediaType::Movie, "B").unwrap();
        db.reconcile_meta(MediaType::Movie, a, MetaKind::Genre, Some(vec!["Horror".to_string()]))
            .unwrap();

        let outcome = db
            .bulk_update(
                MediaType::Movie,
                &BulkUpdate {
                    ids: vec![a, b],
                    patch: RecordPatch::new(RecordTable::Movies),
                    genre: Some("Horror".to_string()),
                },
            )
            .unwrap();
        assert_eq!(outcome.genre_attached, 1);
        assert_eq!(db.get_record_meta(MediaType::Movie, a, MetaKind::Genre).unwrap(), vec!["Horror"]);
        assert_eq!(db.get_record_meta(MediaType::Movie, b, MetaKind::Genre).unwrap(), vec!["Horror"]);
    }

    #[test]
    fn test_bulk_update_requires_selection() {
        let (db, _temp) = setup_test_db();
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set("watched", true).unwrap();
        let result = db.bulk_update(
            MediaType::Movie,
            &BulkUpdate {
                ids: vec![],
                patch,
                genre: None,
            },
        );
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod filter_tests {
    use crate::database::{
        Database, FilterCriterion, MediaFilters, MediaType, MetaKind, NewEpisode, RecordPatch,
        RecordTable, UpdateRequest,
    };
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_title_and_genre_filters() {
        let (db, _temp) = setup_test_db();
        let matrix = db.add_new_media(MediaType::Movie, "The Matrix").unwrap();
        db.add_new_media(MediaType::Movie, "The Matrix Reloaded").unwrap();
        db.add_new_media(MediaType::Movie, "Speed").unwrap();
        db.reconcile_meta(MediaType::Movie, matrix, MetaKind::Genre, Some(vec!["Action".to_string()]))
            .unwrap();
        let action = db.get_meta_values(MetaKind::Genre).unwrap()[0].id;

        let (by_title, total) = db
            .get_media(
                MediaType::Movie,
                &MediaFilters::new().with(FilterCriterion::Title("matrix".into())),
            )
            .unwrap();
        assert_eq!(by_title.len(), 2);
        assert_eq!(total, 3);

        let (both, _) = db
            .get_media(
                MediaType::Movie,
                &MediaFilters::new()
                    .with(FilterCriterion::Title("Matrix".into()))
                    .with(FilterCriterion::Genre(action)),
            )
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, matrix);
    }

    #[test]
    fn test_watched_filter_and_quote_in_title() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Movie, "Schindler's List").unwrap();
        db.add_new_media(MediaType::Movie, "Jaws").unwrap();
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set("watched", true).unwrap();
        db.update_record(MediaType::Movie, id, &UpdateRequest::new(patch))
            .unwrap();

        let (watched, _) = db
            .get_media(
                MediaType::Movie,
                &MediaFilters::new()
                    .with(FilterCriterion::Watched(true))
                    .with(FilterCriterion::Title("'s".into())),
            )
            .unwrap();
        assert_eq!(watched.len(), 1);
        assert!(watched[0].watched);
    }

    #[test]
    fn test_series_to_burn_comes_from_episodes() {
        let (db, _temp) = setup_test_db();
        let lost = db.add_new_media(MediaType::Series, "Lost").unwrap();
        db.add_new_media(MediaType::Series, "Fringe").unwrap();
        let ep = db
            .add_new_episode(
                lost,
                &NewEpisode {
                    season: 1,
                    episode: 1,
                    title: Some("Pilot".into()),
                    plot: None,
                    release_date: None,
                },
            )
            .unwrap();
        let mut patch = RecordPatch::new(RecordTable::Episodes);
        patch.set("to_burn", true).unwrap();
        patch.set("backup_disc", "BD-1").unwrap();
        db.update_episode(ep, &patch).unwrap();

        let (burn, _) = db
            .get_media(MediaType::Series, &MediaFilters::new().with(FilterCriterion::ToBurn(true)))
            .unwrap();
        assert_eq!(burn.len(), 1);
        assert!(burn[0].to_burn);

        let (on_disc, _) = db
            .get_media(
                MediaType::Series,
                &MediaFilters::new().with(FilterCriterion::BackupDisc("BD-1".into())),
            )
            .unwrap();
        assert_eq!(on_disc.len(), 1);
        assert_eq!(db.get_discs(MediaType::Series).unwrap(), vec!["BD-1"]);
    }
}

#[cfg(test)]
mod series_tests {
    use crate::database::{CastMember, Database, MediaType, MetaKind, NewEpisode, SourceInfo};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    fn ep(season: i64, episode: i64, title: &str) -> NewEpisode {
        NewEpisode {
            season,
            episode,
            title: Some(title.to_string()),
            plot: None,
            release_date: None,
        }
    }

    #[test]
    fn test_merge_episodes_inserts_new_and_updates_existing() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Series, "Chernobyl").unwrap();
        db.add_new_episode(id, &ep(1, 1, "Episode 1")).unwrap();
        db.add_new_episode(id, &ep(1, 2, "Episode 2")).unwrap();

        let fetched = vec![
            ep(1, 1, "1:23:45"),
            ep(1, 2, "Please Remain Calm"),
            ep(1, 3, "Open Wide, O Earth"),
        ];
        let outcome = db.merge_episodes(id, &fetched).unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.updated, 2);

        let episodes = db.get_series_episodes(id, None).unwrap();
        assert_eq!(episodes.len(), 3);
        assert_eq!(episodes[0].title.as_deref(), Some("1:23:45"));

        // Merging again changes titles in place only.
        let again = db.merge_episodes(id, &fetched).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(db.get_series_episodes(id, None).unwrap().len(), 3);
    }

    #[test]
    fn test_episode_for_missing_series_is_not_found() {
        let (db, _temp) = setup_test_db();
        let err: crate::error::AppError = db.add_new_episode(77, &ep(1, 1, "x")).unwrap_err().into();
        assert_eq!(err.kind(), "not found");
    }

    #[test]
    fn test_season_filter_on_episode_list() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Series, "Fargo").unwrap();
        db.add_new_episode(id, &ep(1, 1, "a")).unwrap();
        db.add_new_episode(id, &ep(2, 1, "b")).unwrap();
        db.add_new_episode(id, &ep(2, 2, "c")).unwrap();
        assert_eq!(db.get_series_episodes(id, Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_replace_cast_reuses_actors() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Series, "Succession").unwrap();
        let source = SourceInfo {
            lookup_source: "TMDb".into(),
            source_url: "https://www.themoviedb.org".into(),
        };
        let cast = vec![
            CastMember {
                online_id: Some("1".into()),
                name: "Brian Cox".into(),
                character: Some("Logan Roy".into()),
                episodes: Some("39".into()),
            },
            CastMember {
                online_id: Some("2".into()),
                name: "Jeremy Strong".into(),
                character: Some("Kendall Roy".into()),
                episodes: Some("39".into()),
            },
        ];
        assert_eq!(db.replace_cast(MediaType::Series, id, &cast, Some(&source)).unwrap(), 2);
        assert_eq!(db.replace_cast(MediaType::Series, id, &cast[..1], Some(&source)).unwrap(), 1);

        let entries = db.get_cast(MediaType::Series, id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].episodes.as_deref(), Some("39"));
        assert_eq!(db.get_actors().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_series_cascades() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Series, "Deadwood").unwrap();
        db.add_new_episode(id, &ep(1, 1, "Deadwood")).unwrap();
        db.reconcile_meta(MediaType::Series, id, MetaKind::Genre, Some(vec!["Western".to_string()]))
            .unwrap();
        db.replace_cast(
            MediaType::Series,
            id,
            &[CastMember {
                online_id: None,
                name: "Ian McShane".into(),
                character: Some("Al Swearengen".into()),
                episodes: None,
            }],
            None,
        )
        .unwrap();

        assert!(db.delete_media(MediaType::Series, id).unwrap());
        assert!(db.get_series(id).unwrap().is_none());
        assert!(db.get_series_episodes(id, None).unwrap().is_empty());
        assert!(db.get_cast(MediaType::Series, id).unwrap().is_empty());
        assert!(db.get_record_meta(MediaType::Series, id, MetaKind::Genre).unwrap().is_empty());
        assert!(!db.delete_media(MediaType::Series, id).unwrap());
    }

    #[test]
    fn test_delete_episodes_by_id() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Series, "Rome").unwrap();
        let a = db.add_new_episode(id, &ep(1, 1, "a")).unwrap();
        let b = db.add_new_episode(id, &ep(1, 2, "b")).unwrap();
        db.add_new_episode(id, &ep(1, 3, "c")).unwrap();
        assert_eq!(db.delete_episodes(&[a, b]).unwrap(), 2);
        assert_eq!(db.get_series_episodes(id, None).unwrap().len(), 1);
    }

    #[test]
    fn test_set_episodes_watched_and_series() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Series, "Deadwood").unwrap();
        let a = db.add_new_episode(id, &ep(1, 1, "Deadwood")).unwrap();
        let b = db.add_new_episode(id, &ep(1, 2, "Deep Water")).unwrap();
        db.add_new_episode(id, &ep(1, 3, "Reconnoitering the Rim")).unwrap();

        let outcome = db.set_episodes_watched(id, &[a, b], true, false).unwrap();
        assert_eq!(outcome.episodes, 2);
        assert!(!outcome.series_updated);
        let watched: Vec<bool> = db.get_series_episodes(id, None).unwrap().iter().map(|e| e.watched).collect();
        assert_eq!(watched, vec![true, true, false]);
        assert!(!db.get_series(id).unwrap().unwrap().watched);

        db.set_episodes_watched(id, &[], true, true).unwrap();
        assert!(db.get_series(id).unwrap().unwrap().watched);

        db.set_episodes_watched(id, &[b], false, true).unwrap();
        assert!(!db.get_episode(b).unwrap().unwrap().watched);
        assert!(!db.get_series(id).unwrap().unwrap().watched);
    }

    #[test]
    fn test_set_episodes_watched_rolls_back_foreign_episode() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Series, "Rome").unwrap();
        let other = db.add_new_media(MediaType::Series, "Dark").unwrap();
        let mine = db.add_new_episode(id, &ep(1, 1, "mine")).unwrap();
        let theirs = db.add_new_episode(other, &ep(1, 1, "theirs")).unwrap();

        assert!(db.set_episodes_watched(id, &[mine, theirs], true, true).is_err());
        assert!(!db.get_episode(mine).unwrap().unwrap().watched);
        assert!(!db.get_episode(theirs).unwrap().unwrap().watched);
        assert!(!db.get_series(id).unwrap().unwrap().watched);
        assert!(db.set_episodes_watched(999, &[mine], true, false).is_err());
        assert!(db.set_episodes_watched(id, &[], true, false).is_err());
    }
}

#[cfg(test)]
mod meta_tests {
    use crate::database::{Database, MediaType, MetaKind, RecordPatch, RecordTable, UpdateRequest};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_add_meta_value_is_unique_per_kind() {
        let (db, _temp) = setup_test_db();
        let a = db.add_meta_value(MetaKind::Quality, "1080p").unwrap();
        let b = db.add_meta_value(MetaKind::Quality, " 1080p ").unwrap();
        assert_eq!(a, b);
        assert_eq!(db.get_meta_values(MetaKind::Quality).unwrap().len(), 1);
    }

    #[test]
    fn test_meta_values_record_created_date() {
        let (db, _temp) = setup_test_db();
        for kind in MetaKind::ALL {
            db.add_meta_value(kind, "Stamped").unwrap();
            let conn = db.lock().unwrap();
            let created: Option<String> = conn
                .query_row(
                    &format!("SELECT created_date FROM {} WHERE name = 'Stamped'", kind.table()),
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(created.is_some(), "{} has no created_date", kind);
        }
    }

    #[test]
    fn test_reopening_catalog_keeps_value_tables() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        Database::new(&db_path).unwrap().add_meta_value(MetaKind::Genre, "Noir").unwrap();
        let db = Database::new(&db_path).unwrap();
        assert_eq!(db.get_meta_values(MetaKind::Genre).unwrap()[0].name, "Noir");
    }

    #[test]
    fn test_removing_source_clears_references() {
        let (db, _temp) = setup_test_db();
        let source = db.add_meta_value(MetaKind::Source, "Blu-ray").unwrap();
        let id = db.add_new_media(MediaType::Movie, "Dune").unwrap();
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set("source_id", source).unwrap();
        db.update_record(MediaType::Movie, id, &UpdateRequest::new(patch))
            .unwrap();
        assert_eq!(db.get_movie(id).unwrap().unwrap().source.as_deref(), Some("Blu-ray"));

        assert!(db.remove_meta_value(MetaKind::Source, "Blu-ray").unwrap());
        assert_eq!(db.get_movie(id).unwrap().unwrap().source, None);
    }

    #[test]
    fn test_sync_meta_values_converges_table() {
        let (db, _temp) = setup_test_db();
        let id = db.add_new_media(MediaType::Movie, "Up").unwrap();
        db.reconcile_meta(
            MediaType::Movie,
            id,
            MetaKind::Genre,
            Some(vec!["Animation".to_string(), "Family".to_string()]),
        )
        .unwrap();

        let diff = db
            .sync_meta_values(MetaKind::Genre, &["Animation".to_string(), "Comedy".to_string()])
            .unwrap();
        assert_eq!(diff.to_remove, vec!["Family"]);
        assert_eq!(diff.to_add, vec!["Comedy"]);
        assert_eq!(db.get_record_meta(MediaType::Movie, id, MetaKind::Genre).unwrap(), vec!["Animation"]);
    }

    #[test]
    fn test_settings_round_trip() {
        let (db, _temp) = setup_test_db();
        assert_eq!(db.get_setting("lookup_template").unwrap(), None);
        db.set_setting("lookup_template", "TMDb").unwrap();
        db.set_setting("lookup_template", "Offline").unwrap();
        assert_eq!(db.get_setting("lookup_template").unwrap().as_deref(), Some("Offline"));
        assert_eq!(db.get_all_settings().unwrap().len(), 1);
    }
}
