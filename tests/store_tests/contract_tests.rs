//! Store contract tests
//!
//! Every backend runs the same checks. These tests verify:
//! - set/get round-trips and overwrites
//! - NotFound for absent and deleted keys
//! - Scan completeness, prefix filtering, limits and early stop
//! - Visitor errors abort the scan
//! - Cancellation and deadlines
//! - Close behaviour
//! - Concurrent writers and readers

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tandemkv::config::{EngineConfig, WalSyncStrategy};
use tandemkv::context::Interrupted;
use tandemkv::{
    BackendKind, Backend, CallContext, MemoryStore, PersistentStore, ScanOptions, Store,
    StoreError, TandemError, Visit,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_persistent() -> (TempDir, PersistentStore) {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig {
        data_dir: temp_dir.path().join("data"),
        wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
        memtable_size_limit: 16 * 1024,
    };
    let store = PersistentStore::open(config, tracing::Span::none()).unwrap();
    (temp_dir, store)
}

fn ctx() -> CallContext {
    CallContext::background()
}

fn collect<S: Store>(store: &S, opts: &ScanOptions) -> HashMap<Vec<u8>, Vec<u8>> {
    let mut seen = HashMap::new();
    store
        .scan(&ctx(), opts, |k: &[u8], v: &[u8]| -> Result<Visit, StoreError> {
            assert!(seen.insert(k.to_vec(), v.to_vec()).is_none(), "key visited twice");
            Ok(Visit::Continue)
        })
        .unwrap();
    seen
}

fn fill<S: Store>(store: &S, prefix: &str, count: usize) {
    for i in 0..count {
        store
            .set(
                &ctx(),
                format!("{}{:03}", prefix, i).as_bytes(),
                Bytes::from(format!("value-{}", i)),
            )
            .unwrap();
    }
}

// =============================================================================
// Contract Checks
// =============================================================================

fn check_round_trip<S: Store>(store: &S) {
    store.set(&ctx(), b"key", Bytes::from_static(b"value")).unwrap();
    assert_eq!(store.get(&ctx(), b"key").unwrap(), Bytes::from_static(b"value"));

    store.set(&ctx(), b"key", Bytes::from_static(b"other")).unwrap();
    assert_eq!(store.get(&ctx(), b"key").unwrap(), Bytes::from_static(b"other"));

    store.set(&ctx(), b"empty", Bytes::new()).unwrap();
    assert_eq!(store.get(&ctx(), b"empty").unwrap(), Bytes::new());

    let binary = Bytes::from(vec![0u8, 255, 1, 254, 0]);
    store.set(&ctx(), &[0xff, 0x00], binary.clone()).unwrap();
    assert_eq!(store.get(&ctx(), &[0xff, 0x00]).unwrap(), binary);
}

fn check_not_found<S: Store>(store: &S) {
    assert!(store.get(&ctx(), b"missing").unwrap_err().is_not_found());

    store.set(&ctx(), b"doomed", Bytes::from_static(b"v")).unwrap();
    store.delete(&ctx(), b"doomed").unwrap();
    assert!(store.get(&ctx(), b"doomed").unwrap_err().is_not_found());

    // Deleting an absent key succeeds
    store.delete(&ctx(), b"never-existed").unwrap();
}

fn check_scan_completeness<S: Store>(store: &S) {
    fill(store, "k", 50);
    store.delete(&ctx(), b"k007").unwrap();

    let seen = collect(store, &ScanOptions::new());

    assert_eq!(seen.len(), 49);
    assert!(!seen.contains_key(b"k007".as_slice()));
    assert_eq!(seen[b"k010".as_slice()], b"value-10".to_vec());
}

fn check_scan_early_stop<S: Store>(store: &S) {
    fill(store, "item", 100);

    let mut visited = 0;
    store
        .scan(&ctx(), &ScanOptions::new(), |_: &[u8], _: &[u8]| -> Result<Visit, StoreError> {
            visited += 1;
            Ok(if visited == 10 { Visit::Stop } else { Visit::Continue })
        })
        .unwrap();

    assert_eq!(visited, 10);
}

fn check_scan_prefix<S: Store>(store: &S) {
    for key in ["a/1", "a/2", "b/1", "c", "d/a/1"] {
        store.set(&ctx(), key.as_bytes(), Bytes::from_static(b"v")).unwrap();
    }

    let a = collect(store, &ScanOptions::new().with_prefix("a/"));
    let mut keys: Vec<_> = a.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec![b"a/1".to_vec(), b"a/2".to_vec()]);

    assert_eq!(collect(store, &ScanOptions::new().with_prefix("c")).len(), 1);
    assert_eq!(collect(store, &ScanOptions::new().with_prefix("d/")).len(), 1);
    assert!(collect(store, &ScanOptions::new().with_prefix("zz")).is_empty());
    assert_eq!(collect(store, &ScanOptions::new()).len(), 5);
}

fn check_scan_limit<S: Store>(store: &S) {
    fill(store, "row", 40);

    assert_eq!(collect(store, &ScanOptions::new().with_limit(10)).len(), 10);
    assert_eq!(collect(store, &ScanOptions::new().with_limit(100)).len(), 40);
    assert_eq!(collect(store, &ScanOptions::new().with_limit(0)).len(), 40);
}

fn check_visitor_error_aborts<S: Store>(store: &S) {
    fill(store, "e", 20);

    #[derive(Debug)]
    enum VisitError {
        Boom,
        Store(StoreError),
    }
    impl From<StoreError> for VisitError {
        fn from(err: StoreError) -> Self {
            VisitError::Store(err)
        }
    }

    let mut visited = 0;
    let result = store.scan(&ctx(), &ScanOptions::new(), |_: &[u8], _: &[u8]| {
        visited += 1;
        if visited == 3 {
            Err(VisitError::Boom)
        } else {
            Ok(Visit::Continue)
        }
    });

    assert!(matches!(result, Err(VisitError::Boom)));
    assert_eq!(visited, 3);

    // The store is still usable: locks were released
    store.set(&ctx(), b"after", Bytes::from_static(b"ok")).unwrap();
    assert!(matches!(
        store.scan(&ctx(), &ScanOptions::new().with_prefix("after"), |_: &[u8], _: &[u8]| {
            Ok::<_, VisitError>(Visit::Continue)
        }),
        Ok(())
    ));
}

fn check_interrupted<S: Store>(store: &S) {
    let cancelled = CallContext::background();
    cancelled.cancel();
    assert!(matches!(
        store.set(&cancelled, b"k", Bytes::from_static(b"v")),
        Err(StoreError::Interrupted(Interrupted::Cancelled))
    ));
    assert!(store.get(&ctx(), b"k").unwrap_err().is_not_found());

    let expired = CallContext::with_deadline(Instant::now() - Duration::from_millis(1));
    assert!(matches!(
        store.get(&expired, b"k"),
        Err(StoreError::Interrupted(Interrupted::DeadlineExceeded))
    ));

    fill(store, "c", 10);
    let scan_ctx = CallContext::background();
    let mut visited = 0;
    let result = store.scan(&scan_ctx, &ScanOptions::new(), |_: &[u8], _: &[u8]| -> Result<Visit, StoreError> {
        visited += 1;
        scan_ctx.cancel();
        Ok(Visit::Continue)
    });
    assert!(matches!(result, Err(StoreError::Interrupted(Interrupted::Cancelled))));
    assert_eq!(visited, 1);
}

fn check_closed<S: Store>(store: &S) {
    store.set(&ctx(), b"k", Bytes::from_static(b"v")).unwrap();
    store.close().unwrap();

    assert!(matches!(store.get(&ctx(), b"k"), Err(StoreError::Io(TandemError::Closed))));
    assert!(matches!(
        store.set(&ctx(), b"k", Bytes::from_static(b"v")),
        Err(StoreError::Io(TandemError::Closed))
    ));
    assert!(store.close().is_ok());
}

fn check_concurrent<S: Store + 'static>(store: Arc<S>) {
    let mut handles = Vec::new();

    for t in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let key = format!("w{}/{:03}", t, i);
                store.set(&ctx(), key.as_bytes(), Bytes::from(key.clone())).unwrap();
            }
        }));
    }
    for _ in 0..2 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for _ in 0..20 {
                store
                    .scan(&ctx(), &ScanOptions::new().with_prefix("w"), |k: &[u8], v: &[u8]| -> Result<Visit, StoreError> {
                        // Readers never observe a torn pair
                        assert_eq!(k, v);
                        Ok(Visit::Continue)
                    })
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(collect(&*store, &ScanOptions::new().with_prefix("w")).len(), 400);
    for t in 0..4 {
        let key = format!("w{}/099", t);
        assert_eq!(store.get(&ctx(), key.as_bytes()).unwrap(), Bytes::from(key));
    }
}

/// Writers finish first, then every reader checks every written key
fn check_writes_visible_to_all_readers<S: Store + 'static>(store: Arc<S>) {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 250;

    let writers: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let key = format!("t{}/{:04}", t, i);
                    let value = format!("value-{}-{}", t, i);
                    store.set(&ctx(), key.as_bytes(), Bytes::from(value)).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let readers: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for t in 0..THREADS {
                    for i in 0..PER_THREAD {
                        let key = format!("t{}/{:04}", t, i);
                        let expected = format!("value-{}-{}", t, i);
                        assert_eq!(
                            store.get(&ctx(), key.as_bytes()).unwrap(),
                            Bytes::from(expected)
                        );
                    }
                }
            })
        })
        .collect();
    for reader in readers {
        reader.join().unwrap();
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

#[test]
fn test_memory_round_trip() {
    check_round_trip(&MemoryStore::default());
}

#[test]
fn test_memory_not_found() {
    check_not_found(&MemoryStore::default());
}

#[test]
fn test_memory_scan_completeness() {
    check_scan_completeness(&MemoryStore::default());
}

#[test]
fn test_memory_scan_early_stop() {
    check_scan_early_stop(&MemoryStore::default());
}

#[test]
fn test_memory_scan_prefix() {
    check_scan_prefix(&MemoryStore::default());
}

#[test]
fn test_memory_scan_limit() {
    check_scan_limit(&MemoryStore::default());
}

#[test]
fn test_memory_visitor_error_aborts() {
    check_visitor_error_aborts(&MemoryStore::default());
}

#[test]
fn test_memory_interrupted() {
    check_interrupted(&MemoryStore::default());
}

#[test]
fn test_memory_closed() {
    check_closed(&MemoryStore::default());
}

#[test]
fn test_memory_concurrent() {
    check_concurrent(Arc::new(MemoryStore::default()));
}

#[test]
fn test_memory_writes_visible_to_all_readers() {
    check_writes_visible_to_all_readers(Arc::new(MemoryStore::default()));
}

#[test]
fn test_memory_len() {
    let store = MemoryStore::default();
    assert!(store.is_empty());
    fill(&store, "x", 3);
    assert_eq!(store.len(), 3);
}

// =============================================================================
// PersistentStore
// =============================================================================

#[test]
fn test_persistent_round_trip() {
    let (_temp, store) = setup_temp_persistent();
    check_round_trip(&store);
}

#[test]
fn test_persistent_not_found() {
    let (_temp, store) = setup_temp_persistent();
    check_not_found(&store);
}

#[test]
fn test_persistent_scan_completeness() {
    let (_temp, store) = setup_temp_persistent();
    check_scan_completeness(&store);
}

#[test]
fn test_persistent_scan_early_stop() {
    let (_temp, store) = setup_temp_persistent();
    check_scan_early_stop(&store);
}

#[test]
fn test_persistent_scan_prefix() {
    let (_temp, store) = setup_temp_persistent();
    check_scan_prefix(&store);
}

#[test]
fn test_persistent_scan_limit() {
    let (_temp, store) = setup_temp_persistent();
    check_scan_limit(&store);
}

#[test]
fn test_persistent_visitor_error_aborts() {
    let (_temp, store) = setup_temp_persistent();
    check_visitor_error_aborts(&store);
}

#[test]
fn test_persistent_interrupted() {
    let (_temp, store) = setup_temp_persistent();
    check_interrupted(&store);
}

#[test]
fn test_persistent_closed() {
    let (_temp, store) = setup_temp_persistent();
    check_closed(&store);
}

#[test]
fn test_persistent_concurrent() {
    let (_temp, store) = setup_temp_persistent();
    check_concurrent(Arc::new(store));
}

#[test]
fn test_persistent_writes_visible_to_all_readers() {
    let (_temp, store) = setup_temp_persistent();
    check_writes_visible_to_all_readers(Arc::new(store));
}

#[test]
fn test_persistent_scan_spans_flushed_tables() {
    let (_temp, store) = setup_temp_persistent();

    fill(&store, "p", 30);
    store.engine().flush().unwrap();
    fill(&store, "q", 5);
    store.delete(&ctx(), b"p000").unwrap();

    assert_eq!(collect(&store, &ScanOptions::new().with_prefix("p")).len(), 29);
    assert_eq!(collect(&store, &ScanOptions::new()).len(), 34);
}

#[test]
fn test_persistent_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig {
        data_dir: temp_dir.path().join("data"),
        ..EngineConfig::default()
    };

    {
        let store = PersistentStore::open(config.clone(), tracing::Span::none()).unwrap();
        fill(&store, "durable", 10);
        store.close().unwrap();
    }

    let store = PersistentStore::open(config, tracing::Span::none()).unwrap();
    assert_eq!(collect(&store, &ScanOptions::new()).len(), 10);
}

// =============================================================================
// Backend
// =============================================================================

#[test]
fn test_backend_open_by_kind() {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig {
        data_dir: temp_dir.path().join("data"),
        ..EngineConfig::default()
    };

    let memory = Backend::open(BackendKind::Memory, &config, tracing::Span::none()).unwrap();
    assert_eq!(memory.kind(), BackendKind::Memory);
    assert!(!config.data_dir.exists());

    let persistent = Backend::open(BackendKind::Persistent, &config, tracing::Span::none()).unwrap();
    assert_eq!(persistent.kind(), BackendKind::Persistent);
    check_round_trip(&persistent);
}

#[test]
fn test_backend_kind_parses() {
    assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
    assert_eq!("persistent".parse::<BackendKind>().unwrap(), BackendKind::Persistent);
    assert!("redis".parse::<BackendKind>().is_err());
}
