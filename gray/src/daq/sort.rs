//! Sliding-window time-ordering stage.

use super::{Stage, StageStats};
use crate::photon::Interaction;

/// Re-establishes time order on a stream that may arrive slightly
/// out-of-order (e.g. after a blur stage jitters individual event times).
/// Buffers events in a time-sorted list and releases everything more than
/// `window` seconds behind the latest event seen so far; a new event can
/// never land earlier than that, so anything released stays final.
pub struct Sort {
    window_s: f64,
    buffer: Vec<Interaction>,
    stats: StageStats,
}

impl Sort {
    /// Builds a sort stage with the given window, seconds.
    #[must_use]
    pub fn new(window_s: f64) -> Self {
        Self {
            window_s,
            buffer: Vec::new(),
            stats: StageStats::default(),
        }
    }
}

impl Stage for Sort {
    fn process(&mut self, events: Vec<Interaction>) -> Vec<Interaction> {
        for event in events {
            let pos = self.buffer.partition_point(|e| e.time <= event.time);
            self.buffer.insert(pos, event);
        }

        let Some(latest) = self.buffer.last().map(|e| e.time) else {
            return Vec::new();
        };
        let release_before = latest - self.window_s;
        let split = self.buffer.partition_point(|e| e.time <= release_before);
        let released: Vec<_> = self.buffer.drain(..split).collect();
        for e in &released {
            self.stats.record(e.dropped);
        }
        released
    }

    fn stop(&mut self) -> Vec<Interaction> {
        let released = std::mem::take(&mut self.buffer);
        for e in &released {
            self.stats.record(e.dropped);
        }
        released
    }

    fn stats(&self) -> StageStats {
        self.stats
    }
}
