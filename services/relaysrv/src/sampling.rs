//! Fixed-depth sample ring
//!
//! D slots of quantum Q milliseconds each. Slot `(now / Q) mod D` holds
//! one sample per sampled point plus the millisecond at which the slot was
//! written. Slots skipped by a late tick are cleared, so walking forward
//! from the slot after the last write always yields increasing timestamps.

/// Samples extracted from the ring for a change report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingWindow {
    /// Timestamp of the first slot in the window, 0 when empty
    pub start: i64,
    /// Last slot timestamp minus `start`
    pub end: i64,
    /// Whole retained ring (true) or an incremental walk (false)
    pub full: bool,
    /// Ring point position and its samples, oldest first
    pub runs: Vec<(usize, Vec<bool>)>,
}

#[derive(Debug, Clone)]
pub struct SampleRing {
    depth: usize,
    quantum_ms: i64,
    timestamps: Vec<Option<i64>>,
    sequences: Vec<Vec<bool>>,
    last: Option<usize>,
}

impl SampleRing {
    pub fn new(depth: usize, quantum_ms: u64, points: usize) -> Self {
        let depth = depth.max(2);
        Self {
            depth,
            quantum_ms: quantum_ms.max(1) as i64,
            timestamps: vec![None; depth],
            sequences: vec![vec![false; depth]; points],
            last: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn quantum_ms(&self) -> u64 {
        self.quantum_ms as u64
    }

    /// Number of sampled points
    pub fn points(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    /// Retained span D x Q
    pub fn span_ms(&self) -> i64 {
        self.depth as i64 * self.quantum_ms
    }

    pub fn slot_for(&self, now_ms: i64) -> usize {
        now_ms
            .div_euclid(self.quantum_ms)
            .rem_euclid(self.depth as i64) as usize
    }

    /// Index of the last written slot
    pub fn last_slot(&self) -> Option<usize> {
        self.last
    }

    /// Timestamp of the last written slot
    pub fn latest(&self) -> Option<i64> {
        self.last.and_then(|slot| self.timestamps[slot])
    }

    /// Oldest retained timestamp
    pub fn oldest(&self) -> Option<i64> {
        self.ordered_slots()
            .first()
            .and_then(|&slot| self.timestamps[slot])
    }

    /// Forget every sample
    pub fn reset(&mut self) {
        self.timestamps.fill(None);
        for sequence in &mut self.sequences {
            sequence.fill(false);
        }
        self.last = None;
    }

    /// Resize for a new set of sampled points; clears the ring
    pub fn set_points(&mut self, points: usize) {
        self.sequences = vec![vec![false; self.depth]; points];
        self.reset();
    }

    /// Write one sample per point into the slot for `now_ms`.
    ///
    /// A clock step backwards, or a gap of a whole lap, restarts the ring.
    pub fn advance(&mut self, now_ms: i64, values: &[bool]) {
        let slot = self.slot_for(now_ms);

        if let Some(last) = self.last {
            let last_ts = self.timestamps[last].unwrap_or(now_ms);
            let steps = now_ms.div_euclid(self.quantum_ms) - last_ts.div_euclid(self.quantum_ms);
            if now_ms < last_ts || steps >= self.depth as i64 {
                self.reset();
            } else {
                for k in 1..steps as usize {
                    self.timestamps[(last + k) % self.depth] = None;
                }
            }
        }

        self.timestamps[slot] = Some(now_ms);
        for (sequence, value) in self.sequences.iter_mut().zip(values) {
            sequence[slot] = *value;
        }
        self.last = Some(slot);
    }

    /// Written slots from oldest to the last write
    fn ordered_slots(&self) -> Vec<usize> {
        let Some(last) = self.last else {
            return Vec::new();
        };
        (1..=self.depth)
            .map(|k| (last + k) % self.depth)
            .filter(|&slot| self.timestamps[slot].is_some())
            .collect()
    }

    /// Samples since `since_ms`.
    ///
    /// Zero, a timestamp older than the ring, or one that matches no slot
    /// exactly yields the full ring. Otherwise the walk starts at the
    /// matching slot and only points whose value changed are returned.
    pub fn window(&self, since_ms: i64) -> RingWindow {
        let slots = self.ordered_slots();
        if since_ms > 0 {
            if let Some(pos) = slots
                .iter()
                .position(|&slot| self.timestamps[slot] == Some(since_ms))
            {
                return self.extract(&slots[pos..], false);
            }
        }
        self.extract(&slots, true)
    }

    fn extract(&self, slots: &[usize], full: bool) -> RingWindow {
        let start = slots
            .first()
            .and_then(|&slot| self.timestamps[slot])
            .unwrap_or(0);
        let last = slots
            .last()
            .and_then(|&slot| self.timestamps[slot])
            .unwrap_or(start);

        let runs = self
            .sequences
            .iter()
            .enumerate()
            .filter_map(|(point, sequence)| {
                let run: Vec<bool> = slots.iter().map(|&slot| sequence[slot]).collect();
                let changed = run.windows(2).any(|pair| pair[0] != pair[1]);
                (full || changed).then_some((point, run))
            })
            .collect();

        RingWindow {
            start,
            end: last - start,
            full,
            runs,
        }
    }
}
