//! Single-flight properties, exhaustively checked with `--features check-loom`.

mod mock;

use std::time::Duration;

use mock::sync::atomic::{AtomicUsize, Ordering};
use mock::sync::Arc;
use mock::thread;
use ttl_dedup::Coalescer;

const TTL: Duration = Duration::from_secs(3600);

#[test]
fn single_flight() {
    mock::model(|| {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = {
            let calls = calls.clone();
            Arc::new(Coalescer::new(TTL, move |key: &u32| {
                let _ = calls.fetch_add(1, Ordering::Relaxed);
                Ok::<_, ()>(*key * 2)
            }))
        };

        let handles = (0..2)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.resolve(21))
            })
            .collect::<Vec<_>>();
        let results = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();

        assert_eq!(results, vec![Ok(42), Ok(42)]);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    });
}

#[test]
fn failed_computation_is_retried_once() {
    mock::model(|| {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = {
            let calls = calls.clone();
            Arc::new(Coalescer::new(TTL, move |key: &u32| {
                if calls.fetch_add(1, Ordering::Relaxed) == 0 {
                    Err("first attempt fails")
                } else {
                    Ok(*key)
                }
            }))
        };

        let other = {
            let cache = cache.clone();
            thread::spawn(move || cache.resolve(7))
        };
        let mine = cache.resolve(7);
        let theirs = other.join().unwrap();

        let failures = [mine, theirs].iter().filter(|r| r.is_err()).count();
        assert_eq!(failures, 1);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert!(cache.is_fresh(&7));
    });
}

#[test]
fn distinct_keys_compute_separately() {
    mock::model(|| {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = {
            let calls = calls.clone();
            Arc::new(Coalescer::new(TTL, move |key: &u32| {
                let _ = calls.fetch_add(1, Ordering::Relaxed);
                Ok::<_, ()>(*key)
            }))
        };

        let other = {
            let cache = cache.clone();
            thread::spawn(move || cache.resolve(1))
        };
        assert_eq!(cache.resolve(2), Ok(2));
        assert_eq!(other.join().unwrap(), Ok(1));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(cache.len(), 2);
    });
}
