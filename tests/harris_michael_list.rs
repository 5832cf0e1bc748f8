//! Concurrent suites for the conservative flavor and its red-black retire
//! index.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::scope;

use hp_list::HMList;
use rand::prelude::*;

#[test]
fn smoke() {
    const THREADS: usize = 16;
    const ELEMENTS_PER_THREAD: usize = 512;

    let keys_of = |t: usize| -> Vec<usize> {
        (0..ELEMENTS_PER_THREAD)
            .map(|k| k * THREADS + t + 1)
            .collect()
    };
    let set = &HMList::new();

    scope(|s| {
        for t in 0..THREADS {
            s.spawn(move || {
                let mut rng = rand::thread_rng();
                let mut keys = keys_of(t);
                keys.shuffle(&mut rng);
                for key in keys {
                    assert!(set.insert(key));
                }
            });
        }
    });

    scope(|s| {
        for t in 0..THREADS / 2 {
            s.spawn(move || {
                let mut rng = rand::thread_rng();
                let mut keys = keys_of(t);
                keys.shuffle(&mut rng);
                for key in keys {
                    assert!(set.remove(key));
                }
            });
        }
    });

    scope(|s| {
        for t in THREADS / 2..THREADS {
            s.spawn(move || {
                let mut rng = rand::thread_rng();
                let mut keys = keys_of(t);
                keys.shuffle(&mut rng);
                for key in keys {
                    assert!(set.contains(key));
                }
            });
        }
    });
}

/// The retire-index variant under the paired-range workload. Exercises the
/// slot-major scan (and, in debug builds, the index's no-duplicate
/// assertion) while checking the success-count accounting.
#[test]
fn paired_ranges() {
    const PAIRS: usize = 16;
    const RANGE: usize = 128;

    let set = HMList::new();
    let inserts = AtomicU64::new(0);
    let deletes = AtomicU64::new(0);

    scope(|s| {
        for pair in 0..PAIRS {
            let (set, inserts, deletes) = (&set, &inserts, &deletes);
            let base = pair * RANGE;
            s.spawn(move || {
                let mut rng = rand::thread_rng();
                let mut keys: Vec<usize> = (1..=RANGE).map(|k| base + k).collect();
                keys.shuffle(&mut rng);
                for key in keys {
                    if set.insert(key) {
                        inserts.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
            s.spawn(move || {
                let mut rng = rand::thread_rng();
                let mut keys: Vec<usize> = (1..=RANGE).map(|k| base + k).collect();
                keys.shuffle(&mut rng);
                for key in keys {
                    if set.remove(key) {
                        deletes.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let present = (1..=PAIRS * RANGE).filter(|&k| set.contains(k)).count() as u64;
    assert_eq!(
        inserts.load(Ordering::Relaxed) - deletes.load(Ordering::Relaxed),
        present
    );

    #[cfg(feature = "stats")]
    {
        let counters = set.counters();
        drop(set);
        assert_eq!(counters.nodes_created(), counters.nodes_destroyed());
    }
}

/// Two deleters race over a prefilled range. Each key is *unlinked* exactly
/// once, but `remove()` may report success from both racing callers: the
/// loser of the mark CAS observes the mark and reports the key gone too.
#[test]
fn concurrent_duplicate_deletes() {
    const RANGE: usize = 512;

    let set = HMList::new();
    for key in 1..=RANGE {
        assert!(set.insert(key));
    }

    let wins = AtomicU64::new(0);
    scope(|s| {
        for _ in 0..2 {
            let (set, wins) = (&set, &wins);
            s.spawn(move || {
                for key in 1..=RANGE {
                    if set.remove(key) {
                        wins.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let wins = wins.load(Ordering::Relaxed);
    assert!(wins >= RANGE as u64);
    assert!(wins <= 2 * RANGE as u64);
    for key in 1..=RANGE {
        assert!(!set.contains(key));
    }

    #[cfg(feature = "stats")]
    {
        let counters = set.counters();
        drop(set);
        // One construction and one destruction per node (sentinels
        // included): no node was unlinked or freed twice.
        assert_eq!(counters.nodes_created(), RANGE as u64 + 2);
        assert_eq!(counters.nodes_destroyed(), RANGE as u64 + 2);
    }
}
