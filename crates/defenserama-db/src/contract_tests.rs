//! Behavior every `Store` backend must share.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::models::{
    CharacterFilter, NewAccusation, NewCharacter, NewTrial, NewUser, NewVote, TrialFilter,
};
use crate::{Database, MemoryStore, Store, StoreError};

fn for_each_store(check: impl Fn(&dyn Store)) {
    check(&MemoryStore::new());
    check(&Database::open_in_memory().unwrap());
}

fn user(store: &dyn Store, name: &str) -> i64 {
    store
        .create_user(NewUser {
            username: name.into(),
            password: "$argon2id$stub".into(),
            text_avatar: None,
        })
        .unwrap()
        .id
}

fn character(store: &dyn Store, name: &str, owner: Option<i64>) -> i64 {
    store
        .create_character(NewCharacter {
            name: name.into(),
            kind: "HERO".into(),
            description: format!("{name} stands accused"),
            text_avatar: "(o_o)".into(),
            user_id: owner,
        })
        .unwrap()
        .id
}

fn accusation(store: &dyn Store) -> i64 {
    store
        .create_accusation(NewAccusation {
            content: "selling fake Time Turner watches".into(),
            is_custom: true,
            created_by: None,
        })
        .unwrap()
        .id
}

fn trial(store: &dyn Store, character_id: i64, accusation_id: i64) -> i64 {
    store
        .create_trial(NewTrial {
            character_id,
            accusation_id,
            defense_title: "Objection".into(),
            defense_content: "Hearsay, all of it".into(),
            user_id: None,
        })
        .unwrap()
        .id
}

fn vote(store: &dyn Store, user_id: i64, trial_id: i64, is_innocent: bool) -> Result<(), StoreError> {
    store
        .cast_vote(NewVote {
            user_id,
            trial_id,
            is_innocent,
        })
        .map(|_| ())
}

#[test]
fn new_rows_get_defaults() {
    for_each_store(|store| {
        assert!(store.is_empty().unwrap());

        let u = store
            .create_user(NewUser {
                username: "judge".into(),
                password: "hash".into(),
                text_avatar: None,
            })
            .unwrap();
        assert_eq!(u.karma, 0);
        assert_eq!(u.text_avatar, "(⌐□_□)");

        let c = character(store, "Gandalf", None);
        let a = accusation(store);
        let t = store.get_trial(trial(store, c, a)).unwrap().unwrap();
        assert!(t.is_active);
        assert_eq!((t.karma_innocent, t.karma_guilty), (0, 0));
        assert_eq!(t.end_time - t.created_at, chrono::Duration::days(3));
        assert!(!store.is_empty().unwrap());
    });
}

#[test]
fn lookups_miss_cleanly() {
    for_each_store(|store| {
        assert!(store.get_user(9).unwrap().is_none());
        assert!(store.get_user_by_username("nobody").unwrap().is_none());
        assert!(store.get_character(9).unwrap().is_none());
        assert!(store.get_accusation(9).unwrap().is_none());
        assert!(store.get_trial(9).unwrap().is_none());
        assert!(store.get_trial_detail(9).unwrap().is_none());
        assert!(store.list_votes_for_trial(9).unwrap().is_empty());
    });
}

#[test]
fn usernames_are_unique() {
    for_each_store(|store| {
        user(store, "sherlock");
        let err = store
            .create_user(NewUser {
                username: "sherlock".into(),
                password: "other".into(),
                text_avatar: Some("🔍".into()),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(
            store.get_user_by_username("sherlock").unwrap().unwrap().password,
            "$argon2id$stub"
        );
    });
}

#[test]
fn references_must_exist() {
    for_each_store(|store| {
        let c = character(store, "Vader", None);
        let a = accusation(store);

        let err = store
            .create_trial(NewTrial {
                character_id: c,
                accusation_id: a + 100,
                defense_title: "t".into(),
                defense_content: "c".into(),
                user_id: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "accusation", .. }));

        let err = store
            .create_character(NewCharacter {
                name: "Orphan".into(),
                kind: "HERO".into(),
                description: "d".into(),
                text_avatar: "a".into(),
                user_id: Some(42),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "user", id: 42 }));
    });
}

#[test]
fn characters_filter_by_owner() {
    for_each_store(|store| {
        let owner = user(store, "owner");
        character(store, "System", None);
        let mine = character(store, "Mine", Some(owner));

        let all = store.list_characters(&CharacterFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let owned = store
            .list_characters(&CharacterFilter {
                user_id: Some(owner),
            })
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, mine);
    });
}

#[test]
fn vote_scenario() {
    for_each_store(|store| {
        let u1 = user(store, "first");
        let u2 = user(store, "second");
        let c = character(store, "Captain America", None);
        let t = trial(store, c, accusation(store));

        vote(store, u1, t, true).unwrap();
        let after_first = store.get_trial(t).unwrap().unwrap();
        assert_eq!(after_first.karma_innocent, 1);
        assert_eq!(store.get_character(c).unwrap().unwrap().karma, 1);

        let err = vote(store, u1, t, false).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.get_trial(t).unwrap().unwrap(), after_first);
        assert_eq!(store.get_character(c).unwrap().unwrap().karma, 1);

        vote(store, u2, t, false).unwrap();
        let after_second = store.get_trial(t).unwrap().unwrap();
        assert_eq!(after_second.karma_guilty, 1);
        assert_eq!(store.get_character(c).unwrap().unwrap().karma, 0);

        let votes = store.list_votes_for_trial(t).unwrap();
        assert_eq!(votes.len() as i64, after_second.total_votes());
        let net: i64 = votes.iter().map(|v| v.karma_delta()).sum();
        assert_eq!(net, 0);

        let first = store.get_vote_by_user_and_trial(u1, t).unwrap().unwrap();
        assert!(first.is_innocent);
        assert_eq!(store.get_vote(first.id).unwrap(), Some(first));
        assert_eq!(store.get_vote(9_999).unwrap(), None);
        assert!(store.get_vote_by_user_and_trial(u2 + 1, t).unwrap().is_none());
    });
}

#[test]
fn votes_on_unknown_rows_change_nothing() {
    for_each_store(|store| {
        let u = user(store, "voter");
        let c = character(store, "Wonder Woman", None);
        let t = trial(store, c, accusation(store));

        let err = vote(store, u, t + 1, true).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "trial", .. }));

        let err = vote(store, u + 1, t, true).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "user", .. }));

        assert!(store.list_votes_for_trial(t).unwrap().is_empty());
        assert_eq!(store.get_trial(t).unwrap().unwrap().total_votes(), 0);
        assert_eq!(store.get_character(c).unwrap().unwrap().karma, 0);
    });
}

#[test]
fn counters_track_votes_across_trials() {
    for_each_store(|store| {
        let voters: Vec<i64> = (0..5).map(|i| user(store, &format!("voter{i}"))).collect();
        let c = character(store, "Sherlock", None);
        let a = accusation(store);
        let t1 = trial(store, c, a);
        let t2 = trial(store, c, a);

        for (i, v) in voters.iter().enumerate() {
            vote(store, *v, t1, i % 2 == 0).unwrap();
            vote(store, *v, t2, true).unwrap();
        }

        for t in [t1, t2] {
            let trial = store.get_trial(t).unwrap().unwrap();
            assert_eq!(trial.total_votes(), store.list_votes_for_trial(t).unwrap().len() as i64);
        }
        // t1: 3 innocent, 2 guilty; t2: 5 innocent
        assert_eq!(store.get_character(c).unwrap().unwrap().karma, 6);
    });
}

#[test]
fn ending_a_trial_is_idempotent() {
    for_each_store(|store| {
        let c = character(store, "Gandalf", None);
        let t = trial(store, c, accusation(store));

        assert!(!store.end_trial(t).unwrap().is_active);
        assert!(!store.end_trial(t).unwrap().is_active);
        assert!(matches!(
            store.end_trial(t + 1).unwrap_err(),
            StoreError::NotFound { entity: "trial", .. }
        ));
    });
}

#[test]
fn closed_trials_still_accept_votes() {
    for_each_store(|store| {
        let u = user(store, "late");
        let c = character(store, "Gandalf", None);
        let t = trial(store, c, accusation(store));
        store.end_trial(t).unwrap();

        vote(store, u, t, true).unwrap();
        assert_eq!(store.get_trial(t).unwrap().unwrap().karma_innocent, 1);
    });
}

#[test]
fn trial_details_join_and_filter() {
    for_each_store(|store| {
        let owner = user(store, "author");
        let c1 = character(store, "Vader", None);
        let c2 = character(store, "Holmes", None);
        let a = accusation(store);
        let t1 = trial(store, c1, a);
        let t2 = store
            .create_trial(NewTrial {
                character_id: c2,
                accusation_id: a,
                defense_title: "Elementary".into(),
                defense_content: "The butler did it".into(),
                user_id: Some(owner),
            })
            .unwrap()
            .id;
        store.end_trial(t1).unwrap();

        let active = store.trial_details(&TrialFilter::active()).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].trial.id, t2);
        assert_eq!(active[0].character.name, "Holmes");
        assert_eq!(active[0].accusation.id, a);
        assert!(!active[0].is_expired);

        let all = store.trial_details(&TrialFilter::default()).unwrap();
        assert_eq!(all.iter().map(|d| d.trial.id).collect::<Vec<_>>(), [t1, t2]);

        let by_character = store
            .trial_details(&TrialFilter {
                character_id: Some(c1),
                ..TrialFilter::default()
            })
            .unwrap();
        assert_eq!(by_character.len(), 1);
        assert_eq!(by_character[0].trial.id, t1);

        let by_user = store
            .trial_details(&TrialFilter {
                user_id: Some(owner),
                ..TrialFilter::default()
            })
            .unwrap();
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].trial.user_id, Some(owner));

        let detail = store.get_trial_detail(t1).unwrap().unwrap();
        assert_eq!(detail.character.id, c1);
        assert!(!detail.trial.is_active);
    });
}

#[test]
fn leaderboards_reflect_votes() {
    for_each_store(|store| {
        let voters: Vec<i64> = (0..3).map(|i| user(store, &format!("juror{i}"))).collect();
        let a = accusation(store);
        let hero = character(store, "Hero", None);
        let villain = character(store, "Villain", None);
        let plain = character(store, "Plain", None);

        let t_hero = trial(store, hero, a);
        let t_villain = trial(store, villain, a);
        for v in &voters {
            vote(store, *v, t_hero, true).unwrap();
            vote(store, *v, t_villain, false).unwrap();
        }

        let top = store.top_defenders(10).unwrap();
        assert_eq!(top.iter().map(|c| c.id).collect::<Vec<_>>(), [hero, plain, villain]);
        assert_eq!(top[0].karma, 3);

        let hall = store.hall_of_plain(2).unwrap();
        assert_eq!(hall.iter().map(|c| c.id).collect::<Vec<_>>(), [plain, hero]);
    });
}

#[test]
fn random_accusation_handles_empty_store() {
    for_each_store(|store| {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(store.random_accusation(&mut rng).unwrap().is_none());

        let a = accusation(store);
        let picked = store.random_accusation(&mut rng).unwrap().unwrap();
        assert_eq!(picked.id, a);
    });
}

#[test]
fn trial_listing_filters() {
    for_each_store(|store| {
        let owner = user(store, "filer");
        let c1 = character(store, "Vader", None);
        let c2 = character(store, "Diana", None);
        let a = accusation(store);
        let closed = trial(store, c1, a);
        let open = trial(store, c1, a);
        let owned = store
            .create_trial(NewTrial {
                character_id: c2,
                accusation_id: a,
                defense_title: "Lasso says no".into(),
                defense_content: "Ask me anything".into(),
                user_id: Some(owner),
            })
            .unwrap()
            .id;
        store.end_trial(closed).unwrap();

        let ids = |filter: TrialFilter| -> Vec<i64> {
            store
                .list_trials(&filter)
                .unwrap()
                .iter()
                .map(|t| t.id)
                .collect()
        };

        assert_eq!(ids(TrialFilter::default()), [closed, open, owned]);
        assert_eq!(ids(TrialFilter::active()), [open, owned]);
        assert_eq!(
            ids(TrialFilter {
                character_id: Some(c1),
                ..TrialFilter::default()
            }),
            [closed, open]
        );
        assert_eq!(
            ids(TrialFilter {
                active_only: true,
                user_id: Some(owner),
                ..TrialFilter::default()
            }),
            [owned]
        );
    });
}

#[test]
fn trial_snapshot_tally_matches_votes_under_concurrent_casts() {
    for_each_store(|store| {
        let voters: Vec<i64> = (0..300).map(|i| user(store, &format!("juror{i}"))).collect();
        let c = character(store, "Darth Vader", None);
        let t = trial(store, c, accusation(store));
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                for (i, v) in voters.iter().enumerate() {
                    vote(store, *v, t, i % 3 != 0).unwrap();
                }
                done.store(true, Ordering::Release);
            });

            let mut reads = 0;
            while !done.load(Ordering::Acquire) || reads == 0 {
                let snapshot = store.get_trial_with_votes(t).unwrap().unwrap();
                assert_eq!(
                    snapshot.detail.trial.total_votes(),
                    snapshot.votes.len() as i64
                );
                let net: i64 = snapshot.votes.iter().map(|v| v.karma_delta()).sum();
                assert_eq!(snapshot.detail.character.karma, net);
                reads += 1;
            }
        });

        let last = store.get_trial_with_votes(t).unwrap().unwrap();
        assert_eq!(last.votes.len(), voters.len());
        assert_eq!(last.detail.trial.total_votes(), voters.len() as i64);
        assert!(store.get_trial_with_votes(t + 1).unwrap().is_none());
    });
}
