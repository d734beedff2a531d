//! Time helpers.
//!
//! Every timestamp in the cache is a Unix time in whole seconds, which is the
//! precision the protocol layer works with.

/// Returns the current Unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_matches_system_clock() {
        let system = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let ts = now_timestamp();
        assert!((ts - system).abs() <= 1, "{} drifted from {}", ts, system);
    }
}
