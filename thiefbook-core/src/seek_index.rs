//! Sparse line-number to byte-offset checkpoints.
//!
//! Offsets are sampled every `interval` lines so a seek never has to scan more
//! than one interval's worth of lines once the index is built.

use std::collections::BTreeMap;

/// Spacing used when the configuration does not set one.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 200;

/// Below this many checkpoints the index is treated as not built.
pub const MIN_CHECKPOINTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekIndex {
    interval: usize,
    checkpoints: BTreeMap<usize, u64>,
}

impl SeekIndex {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            checkpoints: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn interval(&self) -> usize {
        self.interval
    }

    /// Returns `true` if `line` falls on a checkpoint boundary.
    #[inline]
    pub fn is_boundary(&self, line: usize) -> bool {
        line % self.interval == 0
    }

    /// Inserts or overwrites the checkpoint for `line`.
    pub fn record(&mut self, line: usize, offset: u64) {
        debug_assert!(
            self.is_boundary(line),
            "line {} is not a multiple of {}",
            line,
            self.interval
        );
        self.checkpoints.insert(line, offset);
    }

    /// Greatest recorded checkpoint at or below `target_line`, or the origin when
    /// nothing below it was recorded.
    ///
    /// Only keys that were actually recorded are considered, so a partially
    /// populated index still yields a valid anchor.
    pub fn nearest_checkpoint_at_or_below(&self, target_line: usize) -> (usize, u64) {
        self.checkpoints
            .range(..=target_line)
            .next_back()
            .map(|(line, offset)| (*line, *offset))
            .unwrap_or((0, 0))
    }

    pub fn clear(&mut self) {
        self.checkpoints.clear();
    }

    /// True when the index holds too few checkpoints for a file of
    /// `current_total_lines` lines and should be rebuilt.
    pub fn is_sparse_enough(&self, min_checkpoints: usize, current_total_lines: usize) -> bool {
        if current_total_lines == 0 {
            return true;
        }
        let expected = current_total_lines / self.interval + 1;
        self.checkpoints.len() < expected.min(min_checkpoints)
    }

    #[inline]
    pub fn contains(&self, line: usize) -> bool {
        self.checkpoints.contains_key(&line)
    }

    #[inline]
    pub fn get(&self, line: usize) -> Option<u64> {
        self.checkpoints.get(&line).copied()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Checkpoints in ascending line order.
    pub fn checkpoints(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.checkpoints.iter().map(|(line, offset)| (*line, *offset))
    }
}

impl Default for SeekIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_INTERVAL)
    }
}
