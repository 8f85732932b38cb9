use std::num::NonZeroUsize;

use rand::{Rng, seq::SliceRandom};

/// Partitions a reshuffled permutation of the tuning set into fixed-size batches.
#[derive(Debug)]
pub struct BatchPlanner<R: Rng> {
    indices: Vec<usize>,
    batch_size: NonZeroUsize,
    rng: R,
}

impl<R: Rng> BatchPlanner<R> {
    /// Creates a new `BatchPlanner`.
    ///
    /// # Arguments
    /// * `len` - The amount of items in the tuning set.
    /// * `batch_size` - The maximum amount of items per batch.
    /// * `rng` - The random number generator driving the shuffles.
    pub fn new(len: usize, batch_size: NonZeroUsize, rng: R) -> Self {
        Self {
            indices: (0..len).collect(),
            batch_size,
            rng,
        }
    }

    /// The amount of batches in every epoch, the last one may be shorter.
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size.get())
    }

    /// Reshuffles the permutation in place and slices it into the next epoch's batches.
    ///
    /// # Returns
    /// `num_batches` disjoint batches covering every index exactly once.
    pub fn plan_epoch(&mut self) -> Vec<Vec<usize>> {
        self.indices.shuffle(&mut self.rng);
        self.indices
            .chunks(self.batch_size.get())
            .map(<[usize]>::to_vec)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn planner(len: usize, batch_size: usize) -> BatchPlanner<StdRng> {
        let batch_size = NonZeroUsize::new(batch_size).unwrap();
        BatchPlanner::new(len, batch_size, StdRng::seed_from_u64(42))
    }

    #[test]
    fn batches_are_a_strict_cover() {
        let mut planner = planner(10, 3);

        for _ in 0..5 {
            let batches = planner.plan_epoch();
            assert_eq!(batches.len(), planner.num_batches());
            assert_eq!(batches.len(), 4);
            assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 10);
            assert_eq!(batches.last().map(Vec::len), Some(1));

            let mut seen: Vec<usize> = batches.concat();
            seen.sort_unstable();
            assert_eq!(seen, (0..10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn batch_size_sets_granularity() {
        assert_eq!(planner(8, 1).num_batches(), 8);
        assert_eq!(planner(8, 4).num_batches(), 2);
        assert_eq!(planner(8, 100).num_batches(), 1);
    }

    #[test]
    fn epochs_are_reshuffled() {
        let mut planner = planner(50, 50);
        let first = planner.plan_epoch();
        let second = planner.plan_epoch();
        assert_ne!(first, second);
    }
}
