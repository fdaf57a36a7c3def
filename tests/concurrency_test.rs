//! Concurrent callers on separate connections to one database file

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use progression_engine::store::{ProgressionDb, StaticFacts};
use progression_engine::ProgressionError;

use common::*;

#[test]
fn test_concurrent_completion_rewards_once() {
    let (_dir, path) = temp_db();
    let db = ProgressionDb::open(&path).unwrap();
    let ids = seed_achievements(&db, &[achievement("race", "friends_count", 1000, 60, 10)]);
    let achievement_id = ids[0];

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            thread::spawn(move || {
                let db = ProgressionDb::open(&path).unwrap();
                let (coordinator, _sink) =
                    coordinator_with(&db, test_settings(), Arc::new(StaticFacts::new()));
                barrier.wait();
                coordinator.complete_achievement(1, achievement_id)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(ProgressionError::AlreadyCompleted(_))))
        .count();
    assert_eq!((succeeded, refused), (1, 1));

    let (coordinator, _sink) = coordinator(&db);
    let level = coordinator.query().get_user_level(1).unwrap();
    assert_eq!(level.total_xp, 60);
    assert_eq!(level.level, 1);
    assert_eq!(level.total_points, 10);
    assert_eq!(level.total_achievements, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM user_activity_log"), 2);
    // The reward stays below the level-2 threshold, so the unlock is the only notification
    assert_eq!(count(&db, "SELECT COUNT(*) FROM achievement_notifications"), 1);
}

#[test]
fn test_concurrent_awards_add_up() {
    let (_dir, path) = temp_db();
    let threads = 4;
    let awards_per_thread = 10;

    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            thread::spawn(move || {
                let db = ProgressionDb::open(&path).unwrap();
                let (coordinator, _sink) = coordinator(&db);
                barrier.wait();
                for _ in 0..awards_per_thread {
                    coordinator.award_xp(9, 7, "manual", None).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let db = ProgressionDb::open(&path).unwrap();
    let (coordinator, _sink) = coordinator(&db);
    let level = coordinator.query().get_user_level(9).unwrap();
    assert_eq!(level.total_xp, 7 * (threads * awards_per_thread) as i64);
    assert_eq!(
        count(&db, "SELECT COUNT(*) FROM user_activity_log"),
        (threads * awards_per_thread) as i64
    );
}
