use std::{
    mem,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use tempfile::TempDir;

use pairvote::{
    config::{CoordinatorConfig, LockConfig, SqliteConfig},
    coordinator::Coordinator,
    core::lock::{LockManager, ballot_scope, event_scope, queue_scope},
    error::{Error, ErrorKind},
    identity::StaticDirectory,
    core::pairing::PairingOutcome,
    persist::{KvStore, memory::MemoryKv, sqlite::SqliteKv},
    types::Category,
};

fn quick_locks() -> LockConfig {
    LockConfig {
        retry_interval_ms: 1,
        acquire_timeout_ms: 30,
        lease_ms: 10_000,
    }
}

#[test]
fn empty_toml_yields_defaults() {
    let config = CoordinatorConfig::from_toml_str("").expect("parse");
    assert_eq!(config, CoordinatorConfig::default());
    assert_eq!(config.lock.retry_interval_ms, 2);
    assert_eq!(config.lock.acquire_timeout_ms, 2_000);
    assert_eq!(config.lock.lease_ms, 30_000);
    assert_eq!(config.runtime.event_channel_capacity, 1024);
    assert_eq!(config.sqlite.path, None);
    assert!(config.sqlite.wal);
}

#[test]
fn partial_toml_overrides_only_named_keys() {
    let config = CoordinatorConfig::from_toml_str(
        r#"
        [lock]
        acquire_timeout_ms = 250

        [sqlite]
        path = "/var/lib/pairvote/state.db"
        wal = false
        "#,
    )
    .expect("parse");

    assert_eq!(config.lock.acquire_timeout_ms, 250);
    assert_eq!(config.lock.retry_interval_ms, 2);
    assert_eq!(config.lock.lease_ms, 30_000);
    assert_eq!(
        config.sqlite.path.as_deref(),
        Some(std::path::Path::new("/var/lib/pairvote/state.db"))
    );
    assert!(!config.sqlite.wal);
    assert_eq!(config.runtime.event_channel_capacity, 1024);
}

#[test]
fn malformed_toml_is_rejected() {
    assert!(CoordinatorConfig::from_toml_str("[lock]\nacquire_timeout_ms = \"soon\"").is_err());
}

#[test]
fn guard_release_frees_the_scope() {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
    let locks = LockManager::new(Arc::clone(&kv), quick_locks());

    let guard = locks.acquire(queue_scope()).expect("acquire");
    assert!(locks.is_held(queue_scope()).expect("held"));
    drop(guard);
    assert!(!locks.is_held(queue_scope()).expect("held"));

    // Scopes are independent of each other.
    let _event = locks.acquire(&event_scope(1)).expect("event");
    let _time = locks.acquire(&ballot_scope(1, Category::Time)).expect("time");
    let _location = locks.acquire(&ballot_scope(1, Category::Location)).expect("location");
}

#[test]
fn held_scope_times_out_as_busy() {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
    let locks = LockManager::new(Arc::clone(&kv), quick_locks());

    let _held = locks.acquire(&event_scope(7)).expect("acquire");
    let started = Instant::now();
    let err = match locks.acquire(&event_scope(7)) {
        Ok(_) => panic!("lock is not reentrant"),
        Err(err) => err,
    };
    assert!(started.elapsed() >= quick_locks().acquire_timeout());
    assert!(matches!(err, Error::LockTimeout(ref scope) if scope == "event/7"));
    assert_eq!(err.kind(), ErrorKind::Busy);
}

#[test]
fn coordinator_operation_fails_busy_while_queue_is_held() {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
    let config = CoordinatorConfig {
        lock: quick_locks(),
        ..CoordinatorConfig::default()
    };
    let coord = Coordinator::new(Arc::clone(&kv), Arc::new(StaticDirectory::new()), &config);
    let locks = LockManager::new(kv, quick_locks());

    let held = locks.acquire(queue_scope()).expect("acquire");
    let err = coord.pairing().request_pairing("ada").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    // Nothing was written.
    assert_eq!(coord.pairing().status_of("ada").expect("status"), None);

    drop(held);
    coord.pairing().request_pairing("ada").expect("join");
}

#[test]
fn tracing_installs_once() {
    use pairvote::telemetry::{LogFormat, init_tracing};

    assert!(init_tracing(LogFormat::Compact, true));
    assert!(!init_tracing(LogFormat::Json, false));
}

fn short_lease() -> LockConfig {
    LockConfig {
        retry_interval_ms: 2,
        acquire_timeout_ms: 1_000,
        lease_ms: 50,
    }
}

#[test]
fn abandoned_queue_lock_is_recovered_after_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("pairvote.db");

    {
        let kv: Arc<dyn KvStore> = Arc::new(SqliteKv::open(&path, true).expect("open sqlite"));
        let locks = LockManager::new(kv, short_lease());
        // Simulates a process dying inside the critical section.
        mem::forget(locks.acquire(queue_scope()).expect("acquire"));
        assert!(locks.is_held(queue_scope()).expect("held"));
    }

    let config = CoordinatorConfig {
        lock: short_lease(),
        sqlite: SqliteConfig {
            path: Some(path),
            wal: true,
        },
        ..CoordinatorConfig::default()
    };
    let coord = Coordinator::open_sqlite(Arc::new(StaticDirectory::new()), &config).expect("reopen");
    assert_eq!(
        coord.pairing().request_pairing("ada").expect("join after lease expiry"),
        PairingOutcome::Waiting
    );
    assert!(matches!(
        coord.pairing().request_pairing("bob").expect("join"),
        PairingOutcome::Paired { .. }
    ));
}

#[test]
fn expired_holder_cannot_release_the_new_holder() {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
    let locks = LockManager::new(kv, short_lease());

    let stale = locks.acquire(&event_scope(3)).expect("first holder");
    thread::sleep(Duration::from_millis(80));
    assert!(!locks.is_held(&event_scope(3)).expect("held"));

    let current = locks.acquire(&event_scope(3)).expect("take over");
    drop(stale);
    assert!(locks.is_held(&event_scope(3)).expect("held"));

    drop(current);
    assert!(!locks.is_held(&event_scope(3)).expect("held"));
}
