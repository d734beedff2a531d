//! # Trust Cache Example
//!
//! Walks through one peer's trust history: provisioning our identifier,
//! the first handshake, a verified SAS, and listing known peers.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example trust_cache_demo
//! ```

use zrtp_cache::{
    flags, CacheBackend, Identifier, NameBinding, RemoteTrustRecord, RetainedSecret, Secret,
    SqliteCache,
};

fn main() {
    println!("=== ZRTP Cache: Trust Cache Example ===\n");

    let dir = std::env::temp_dir().join("zrtp-cache-demo");
    std::fs::create_dir_all(&dir).expect("Failed to create demo directory");
    let path = dir.join("zid.db");

    // Step 1: Open the cache and provision our identifier
    println!("Step 1: Opening cache at {}", path.display());
    let cache = SqliteCache::open(&path).expect("Failed to open cache");
    let local = cache
        .read_or_create_local_identity(None)
        .expect("Failed to provision local identity");
    println!("  Local ZID: {}", local);
    println!();

    // Step 2: First contact with a peer
    let remote = Identifier::generate();
    println!("Step 2: First handshake with {}", remote);
    match cache
        .read_remote_trust(&remote, &local)
        .expect("Failed to read trust")
    {
        Some(record) => println!("  Known peer, flags {:#04x}", record.flags),
        None => println!("  No prior trust"),
    }

    let now = zrtp_cache::time::now_timestamp();
    let record = RemoteTrustRecord {
        flags: flags::VALID | flags::RS1_VALID,
        rs1: RetainedSecret {
            value: Secret::new([0x11; 32]),
            last_used: now,
            time_to_live: now + 30 * 86_400,
        },
        secure_since: now,
        ..Default::default()
    };
    cache
        .insert_remote_trust(&remote, &local, &record)
        .expect("Failed to store trust");
    println!("  Stored retained secret, valid for 30 days");
    println!();

    // Step 3: Users compare the SAS and confirm it
    println!("Step 3: SAS verified, binding a name");
    let verified = RemoteTrustRecord {
        flags: record.flags | flags::SAS_VERIFIED,
        ..record
    };
    cache
        .update_remote_trust(&remote, &local, &verified)
        .expect("Failed to update trust");
    cache
        .insert_name_binding(
            &remote,
            &local,
            None,
            &NameBinding::new(flags::NAME_VALID, Some("Bob")),
        )
        .expect("Failed to bind name");
    println!();

    // Step 4: List known peers, most recently trusted first
    println!("Step 4: Known peers");
    let cursor = cache.open_enumeration().expect("Failed to start enumeration");
    for entry in cursor {
        let (peer, record) = entry.expect("Failed to read trust record");
        let name = cache
            .read_name_binding(&peer, &local, None)
            .expect("Failed to read name")
            .and_then(|binding| binding.name)
            .unwrap_or_else(|| "<unnamed>".to_string());
        println!(
            "  {} {:12} since {} sas_verified={}",
            peer,
            name,
            record.secure_since,
            record.has_flags(flags::SAS_VERIFIED)
        );
    }
    println!();

    println!("=== Example Complete ===");
}
