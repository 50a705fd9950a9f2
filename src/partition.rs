use std::num::NonZeroUsize;

/// A contiguous slice of the work-item index space assigned to one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkRange {
    pub start: usize,
    pub count: usize,
}

impl WorkRange {
    pub const fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    /// One past the last index.
    pub const fn end(&self) -> usize {
        self.start + self.count
    }

    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Splits `total` items into `workers` contiguous ranges.
///
/// Every range but the last gets `total / workers` items; the last one
/// absorbs the remainder. With more workers than items the leading ranges
/// are empty, which dispatches as a no-op.
pub fn partition(total: usize, workers: NonZeroUsize) -> Vec<WorkRange> {
    let workers = workers.get();
    let base = total / workers;
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for _ in 0..workers - 1 {
        ranges.push(WorkRange::new(start, base));
        start += base;
    }
    ranges.push(WorkRange::new(start, total - base * (workers - 1)));
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn assert_well_formed(total: usize, workers: usize) {
        let ranges = partition(total, nz(workers));
        assert_eq!(ranges.len(), workers);
        let mut next = 0;
        for range in &ranges {
            assert_eq!(range.start, next, "gap before {range:?}");
            next = range.end();
        }
        assert_eq!(next, total);
        assert_eq!(ranges.iter().map(|r| r.count).sum::<usize>(), total);
    }

    #[test]
    fn ranges_cover_total_without_gaps() {
        for total in [0, 1, 2, 7, 10, 99, 100, 1000, 40_000, 123_457] {
            for workers in [1, 2, 3, 4, 7, 16, 64] {
                assert_well_formed(total, workers);
            }
        }
    }

    #[test]
    fn last_range_absorbs_remainder() {
        let ranges = partition(10, nz(4));
        assert_eq!(
            ranges,
            vec![
                WorkRange::new(0, 2),
                WorkRange::new(2, 2),
                WorkRange::new(4, 2),
                WorkRange::new(6, 4),
            ]
        );
    }

    #[test]
    fn more_workers_than_items_yields_empty_ranges() {
        let ranges = partition(3, nz(5));
        assert_eq!(ranges.iter().filter(|r| r.is_empty()).count(), 4);
        assert_eq!(ranges.last(), Some(&WorkRange::new(0, 3)));
    }

    #[test]
    fn zero_total_is_legal() {
        let ranges = partition(0, nz(3));
        assert!(ranges.iter().all(WorkRange::is_empty));
    }

    #[test]
    fn single_worker_takes_everything() {
        assert_eq!(partition(42, nz(1)), vec![WorkRange::new(0, 42)]);
    }
}
