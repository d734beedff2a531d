//! On-disk behaviour of the SQLite cache: reopening, external damage, and
//! unusable paths.

use rusqlite::Connection;
use zrtp_cache::{
    flags, CacheBackend, CacheConfig, Error, Identifier, NameBinding, RemoteTrustRecord,
    RetainedSecret, Secret, SqliteCache,
};

fn record(flags: u32, secure_since: i64) -> RemoteTrustRecord {
    RemoteTrustRecord {
        flags,
        rs1: RetainedSecret {
            value: Secret::new([0x5a; 32]),
            last_used: secure_since,
            time_to_live: secure_since + 86_400,
        },
        secure_since,
        ..Default::default()
    }
}

#[test]
fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.db");
    let remote = Identifier::new(*b"remote-peer1");

    let local = {
        let cache = SqliteCache::open(&path).unwrap();
        let local = cache.read_or_create_local_identity(None).unwrap();
        cache
            .insert_remote_trust(&remote, &local, &record(flags::VALID, 1_700_000_000))
            .unwrap();
        cache
            .insert_name_binding(&remote, &local, None, &NameBinding::new(flags::NAME_VALID, Some("Bob")))
            .unwrap();
        local
    };

    let cache = SqliteCache::open(&path).unwrap();
    assert_eq!(cache.read_or_create_local_identity(None).unwrap(), local);
    assert_eq!(
        cache.read_remote_trust(&remote, &local).unwrap(),
        Some(record(flags::VALID, 1_700_000_000))
    );
    let binding = cache
        .read_name_binding(&remote, &local, None)
        .unwrap()
        .unwrap();
    assert_eq!(binding.name.as_deref(), Some("Bob"));
}

#[test]
fn test_missing_identity_table_resets_remote_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.db");
    let remote = Identifier::new(*b"remote-peer2");

    let old_local = {
        let cache = SqliteCache::open(&path).unwrap();
        let local = cache.read_or_create_local_identity(None).unwrap();
        cache
            .insert_remote_trust(&remote, &local, &record(flags::VALID, 100))
            .unwrap();
        local
    };

    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("DROP TABLE local_identity").unwrap();
    }

    let cache = SqliteCache::open(&path).unwrap();
    let new_local = cache.read_or_create_local_identity(None).unwrap();
    assert_ne!(new_local, old_local);
    assert_eq!(cache.remote_trust_count().unwrap(), 0);
    assert!(cache.read_remote_trust(&remote, &old_local).unwrap().is_none());
}

#[test]
fn test_missing_remote_table_is_recreated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.db");

    let local = {
        let cache = SqliteCache::open(&path).unwrap();
        cache.read_or_create_local_identity(None).unwrap()
    };

    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("DROP TABLE remote_trust").unwrap();
    }

    let cache = SqliteCache::open(&path).unwrap();
    assert_eq!(cache.read_or_create_local_identity(None).unwrap(), local);

    let remote = Identifier::new(*b"remote-peer3");
    cache
        .insert_remote_trust(&remote, &local, &record(flags::VALID, 100))
        .unwrap();
    assert_eq!(cache.remote_trust_count().unwrap(), 1);
}

#[test]
fn test_open_in_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("zid.db");

    let err = SqliteCache::open(&path).err().unwrap();
    assert!(matches!(err, Error::StorageUnavailable(_)), "{:?}", err);
    assert_eq!(err.code(), 100);
}

#[test]
fn test_open_non_database_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zid.db");
    std::fs::write(&path, vec![0x42u8; 4096]).unwrap();

    let err = SqliteCache::open_with_config(CacheConfig::with_path(&path))
        .err()
        .unwrap();
    assert!(matches!(err, Error::StorageUnavailable(_)), "{:?}", err);
}

#[test]
fn test_backend_as_trait_object() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache: Box<dyn CacheBackend> =
        Box::new(SqliteCache::open(dir.path().join("zid.db")).unwrap());

    let local = cache.read_or_create_local_identity(Some("alice")).unwrap();
    for (n, since) in [(1u8, 10i64), (2, 30), (3, 20)] {
        let remote = Identifier::new([n; 12]);
        cache
            .insert_remote_trust(&remote, &local, &record(flags::VALID, since))
            .unwrap();
    }

    let order: Vec<i64> = cache
        .open_enumeration()
        .unwrap()
        .map(|entry| entry.map(|(_, record)| record.secure_since))
        .collect::<zrtp_cache::Result<_>>()
        .unwrap();
    assert_eq!(order, vec![30, 20, 10]);

    cache.close();
    assert!(matches!(cache.clear(), Err(Error::CacheClosed)));
}
