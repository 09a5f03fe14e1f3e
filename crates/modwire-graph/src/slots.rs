//! Mixer slot allocation.
//!
//! First-fit search for a contiguous free run over a mixer's input
//! channel bitmap. Capacities never exceed 32 channels, so a `u32` mask
//! holds the whole map. Occupancy is always derived from the wires
//! currently terminating at the mixer, so disconnecting a wire frees its
//! slot by construction.

use modwire_core::Width;

/// Occupancy bitmap over one mixer's input channel indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    bits: u32,
    capacity: usize,
}

impl Occupancy {
    /// Empty bitmap over `capacity` channels (at most 32)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity <= 32);
        Self { bits: 0, capacity }
    }

    /// Build a bitmap from `(start, width)` occupied spans
    #[must_use]
    pub fn from_spans(capacity: usize, spans: impl IntoIterator<Item = (usize, Width)>) -> Self {
        let mut map = Self::new(capacity);
        for (start, width) in spans {
            map.mark(start, width);
        }
        map
    }

    fn run_mask(start: usize, width: Width) -> u32 {
        let ones = if width >= 32 {
            u32::MAX
        } else {
            (1u32 << width) - 1
        };
        ones << start
    }

    /// Mark `[start, start + width)` as occupied
    pub fn mark(&mut self, start: usize, width: Width) {
        debug_assert!(start + width <= self.capacity);
        self.bits |= Self::run_mask(start, width);
    }

    /// Whether `[start, start + width)` is entirely free
    #[must_use]
    pub fn is_free(&self, start: usize, width: Width) -> bool {
        start + width <= self.capacity && self.bits & Self::run_mask(start, width) == 0
    }

    /// Whether a single channel index is occupied
    #[must_use]
    pub fn occupied(&self, index: usize) -> bool {
        index < self.capacity && self.bits & (1 << index) != 0
    }

    /// Number of occupied channel indices
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Lowest-indexed contiguous free run of `width` channels
    #[must_use]
    pub fn first_fit(&self, width: Width) -> Option<usize> {
        if width == 0 || width > self.capacity {
            return None;
        }
        (0..=self.capacity - width).find(|&start| self.is_free(start, width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pattern(pattern: &[u8]) -> Occupancy {
        let mut map = Occupancy::new(pattern.len());
        for (index, &bit) in pattern.iter().enumerate() {
            if bit != 0 {
                map.mark(index, 1);
            }
        }
        map
    }

    #[test]
    fn test_first_fit_is_deterministic() {
        // Occupancy [1,1,0,0,1,0,0,0], request width 2: lowest run is at
        // index 2, not 5.
        let mut map = from_pattern(&[1, 1, 0, 0, 1, 0, 0, 0]);
        assert_eq!(map.first_fit(2), Some(2));

        // After reserving it, the next same-width request lands at 5
        map.mark(2, 2);
        assert_eq!(map.first_fit(2), Some(5));

        map.mark(5, 2);
        assert_eq!(map.first_fit(2), None);
        // A single free channel remains at index 7
        assert_eq!(map.first_fit(1), Some(7));
    }

    #[test]
    fn test_runs_must_be_contiguous() {
        // Free channels at 1 and 3 are not a run of 2
        let map = from_pattern(&[1, 0, 1, 0]);
        assert_eq!(map.first_fit(2), None);
        assert_eq!(map.first_fit(1), Some(1));
    }

    #[test]
    fn test_empty_and_full() {
        let empty = Occupancy::new(8);
        assert_eq!(empty.first_fit(1), Some(0));
        assert_eq!(empty.first_fit(8), Some(0));
        assert_eq!(empty.count(), 0);

        let full = Occupancy::from_spans(4, [(0, 4)]);
        assert_eq!(full.first_fit(1), None);
        assert_eq!(full.count(), 4);
    }

    #[test]
    fn test_width_wider_than_capacity() {
        let map = Occupancy::new(4);
        assert_eq!(map.first_fit(5), None);
        assert_eq!(map.first_fit(0), None);
    }

    #[test]
    fn test_from_spans_matches_marks() {
        let spans = Occupancy::from_spans(8, [(0, 2), (4, 2)]);
        assert!(spans.occupied(0));
        assert!(spans.occupied(1));
        assert!(!spans.occupied(2));
        assert!(spans.occupied(5));
        assert_eq!(spans.first_fit(2), Some(2));
    }

    #[test]
    fn test_full_width_32() {
        let mut map = Occupancy::new(32);
        map.mark(0, 31);
        assert_eq!(map.first_fit(1), Some(31));
        map.mark(31, 1);
        assert_eq!(map.first_fit(1), None);
    }
}
