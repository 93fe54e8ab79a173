// Playback counters: engine loads, session lifetimes, discarded stale results.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStatsSnapshot {
    pub loads_started: u64,
    pub unloads: u64,
    pub sessions_created: u64,
    pub sessions_destroyed: u64,
    pub stale_discarded: u64,
    pub failures: u64,
}

impl PlaybackStatsSnapshot {
    /// Sessions created and not yet destroyed.
    pub fn live_sessions(&self) -> u64 {
        self.sessions_created.saturating_sub(self.sessions_destroyed)
    }
}

#[derive(Debug, Default)]
pub struct PlaybackStats {
    loads_started: AtomicU64,
    unloads: AtomicU64,
    sessions_created: AtomicU64,
    sessions_destroyed: AtomicU64,
    stale_discarded: AtomicU64,
    failures: AtomicU64,
}

impl PlaybackStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_load_started(&self) {
        self.loads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unload(&self) {
        self.unloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_destroyed(&self) {
        self.sessions_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// A load or event arrived for a generation that was already superseded.
    pub fn record_stale(&self) {
        self.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PlaybackStatsSnapshot {
        PlaybackStatsSnapshot {
            loads_started: self.loads_started.load(Ordering::Relaxed),
            unloads: self.unloads.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_destroyed: self.sessions_destroyed.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_basic() {
        let stats = PlaybackStats::new();
        stats.record_load_started();
        stats.record_session_created();
        stats.record_session_created();
        stats.record_session_destroyed();
        stats.record_stale();

        let snap = stats.snapshot();
        assert_eq!(snap.loads_started, 1);
        assert_eq!(snap.live_sessions(), 1);
        assert_eq!(snap.stale_discarded, 1);
        assert_eq!(snap.failures, 0);
    }
}
