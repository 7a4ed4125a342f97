//! Global atomic counters for codec activity.
//!
//! Call [`Metrics::flush`] to emit current values as one `info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    events_encoded: AtomicU64,
    events_decoded: AtomicU64,
    decode_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            events_encoded: AtomicU64::new(0),
            events_decoded: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_events_encoded(&self) {
        self.events_encoded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_encoded", "counter incremented");
    }

    pub fn inc_events_decoded(&self) {
        self.events_decoded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_decoded", "counter incremented");
    }

    pub fn inc_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "decode_failures", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            events_encoded = self.events_encoded(),
            events_decoded = self.events_decoded(),
            decode_failures = self.decode_failures(),
        );
    }

    pub fn events_encoded(&self) -> u64 {
        self.events_encoded.load(Ordering::Relaxed)
    }

    pub fn events_decoded(&self) -> u64 {
        self.events_decoded.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.events_encoded.store(0, Ordering::Relaxed);
        self.events_decoded.store(0, Ordering::Relaxed);
        self.decode_failures.store(0, Ordering::Relaxed);
    }
}
