//! Coincidence-window grouping: the final stage that turns a stream of
//! single detector events into tagged pairs, multiples, and singles.

use super::{Stage, StageStats};
use crate::photon::{CoincidenceState, Interaction};

/// Groups events into windows and tags each member with a
/// [`CoincidenceState`]. A window opens at the first ungrouped,
/// non-dropped event's time `t` and initially spans the half-open
/// interval `[t + offset, t + offset + window)`; every event admitted
/// into the window re-extends its close to `event.time + window`
/// (paralyzable: a late member can keep the window open past where it
/// would otherwise have closed). A window containing exactly one event is
/// a single; if `require_pairs` is set, singles are marked dropped rather
/// than grouped. A window containing exactly two events is a pair. Three
/// or more is a "multiples" group: grouped the same as a pair unless
/// `reject_multiples` is set, in which case every member is marked
/// dropped instead.
///
/// An event arriving before the window has opened (`event.time <
/// first.time + offset`) can never join the currently open window and is
/// dropped on its own, since this stage tracks only one open window at a
/// time.
pub struct Coincidence {
    window_s: f64,
    offset_s: f64,
    reject_multiples: bool,
    require_pairs: bool,
    pending: Vec<Interaction>,
    window_end: f64,
    next_group_id: u64,
    stats: StageStats,
}

impl Coincidence {
    /// Builds a coincidence stage.
    #[must_use]
    pub fn new(window_s: f64, offset_s: f64, reject_multiples: bool, require_pairs: bool) -> Self {
        Self {
            window_s,
            offset_s,
            reject_multiples,
            require_pairs,
            pending: Vec::new(),
            window_end: 0.0,
            next_group_id: 0,
            stats: StageStats::default(),
        }
    }

    fn flush_window(&mut self) -> Vec<Interaction> {
        let mut group = std::mem::take(&mut self.pending);
        if group.is_empty() {
            return group;
        }

        let dropped = (group.len() == 1 && self.require_pairs) || (group.len() >= 3 && self.reject_multiples);
        let state = if dropped {
            CoincidenceState::Dropped
        } else {
            CoincidenceState::Group(self.next_group_id)
        };
        self.next_group_id += 1;

        for e in &mut group {
            e.coincidence = state;
            if dropped {
                e.dropped = true;
            }
            self.stats.record(e.dropped);
        }
        group
    }
}

impl Stage for Coincidence {
    fn process(&mut self, events: Vec<Interaction>) -> Vec<Interaction> {
        let mut out = Vec::new();
        for mut event in events {
            if event.dropped {
                self.stats.record(true);
                out.push(event);
                continue;
            }

            let first_time = self.pending.first().map(|e| e.time);
            if let Some(first_time) = first_time {
                if event.time >= self.window_end {
                    out.extend(self.flush_window());
                } else if event.time < first_time + self.offset_s {
                    event.coincidence = CoincidenceState::Dropped;
                    event.dropped = true;
                    self.stats.record(true);
                    out.push(event);
                    continue;
                }
            }

            self.window_end = if self.pending.is_empty() {
                event.time + self.offset_s + self.window_s
            } else {
                self.window_end.max(event.time + self.window_s)
            };
            self.pending.push(event);
        }
        out
    }

    fn stop(&mut self) -> Vec<Interaction> {
        self.flush_window()
    }

    fn stats(&self) -> StageStats {
        self.stats
    }
}
